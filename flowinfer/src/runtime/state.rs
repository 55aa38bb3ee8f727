use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::graph::{Graph, OpKind, VarId, VarKind};
use crate::tensor::TensorValue;

use super::frames::{FrameIter, FrameTracker};

/// Values recorded during one run, keyed by variable and context.
///
/// Placeholders and constants live outside any frame and are visible from
/// every context.
#[derive(Debug, Default)]
pub struct ValueTable {
    globals: HashMap<VarId, Arc<TensorValue>>,
    values: HashMap<(VarId, FrameIter), Arc<TensorValue>>,
    latest: HashMap<VarId, Arc<TensorValue>>,
    // Values recorded once at iteration 0 and visible in every iteration.
    loop_invariant: HashSet<VarId>,
}

impl ValueTable {
    pub fn new(graph: &Graph) -> Self {
        let mut table = Self::default();
        for decl in graph.vars() {
            if let VarKind::Constant { value } = &decl.kind {
                if let Some(id) = graph.var_id(&decl.name) {
                    table.globals.insert(id, Arc::clone(value));
                }
            }
        }
        for op in graph.ops() {
            if let OpKind::Enter {
                is_constant: true, ..
            } = &op.kind
            {
                table.mark_invariant(graph, &op.outputs);
            }
        }
        // Pure ops fed only by loop invariants and graph inputs run once, at
        // iteration 0, so their outputs are invariant too.
        let mut changed = true;
        while changed {
            changed = false;
            for op in graph.ops() {
                if !matches!(op.kind, OpKind::Ordinary { .. } | OpKind::Identity) {
                    continue;
                }
                let already = op
                    .outputs
                    .iter()
                    .filter_map(|name| graph.var_id(name))
                    .all(|id| table.loop_invariant.contains(&id));
                if already {
                    continue;
                }
                let mut saw_invariant = false;
                let mut derived = true;
                for input in op.data_inputs() {
                    match graph.var_id(&input.var) {
                        Some(id) if table.loop_invariant.contains(&id) => saw_invariant = true,
                        Some(id) if !matches!(graph.var(id).kind, VarKind::Computed { .. }) => {}
                        _ => {
                            derived = false;
                            break;
                        }
                    }
                }
                if derived && saw_invariant {
                    table.mark_invariant(graph, &op.outputs);
                    changed = true;
                }
            }
        }
        table
    }

    fn mark_invariant(&mut self, graph: &Graph, outputs: &[String]) {
        for output in outputs {
            if let Some(id) = graph.var_id(output) {
                self.loop_invariant.insert(id);
            }
        }
    }

    pub fn bind(&mut self, var: VarId, value: TensorValue) {
        self.globals.insert(var, Arc::new(value));
    }

    pub fn record(&mut self, var: VarId, ctx: FrameIter, value: Arc<TensorValue>) {
        self.latest.insert(var, Arc::clone(&value));
        self.values.insert((var, ctx), value);
    }

    pub fn has_exact(&self, var: VarId, ctx: FrameIter) -> bool {
        self.values.contains_key(&(var, ctx))
    }

    /// Value of `var` as seen from `ctx`: the exact context first, then
    /// enclosing contexts, then graph inputs.
    pub fn lookup(
        &self,
        frames: &FrameTracker,
        var: VarId,
        ctx: FrameIter,
    ) -> Option<&Arc<TensorValue>> {
        let mut cursor = Some(ctx);
        while let Some(at) = cursor {
            if let Some(value) = self.values.get(&(var, at)) {
                return Some(value);
            }
            if at.iteration > 0 && self.loop_invariant.contains(&var) {
                if let Some(value) = self.values.get(&(var, FrameIter::new(at.frame, 0))) {
                    return Some(value);
                }
            }
            cursor = frames.parent(at.frame);
        }
        self.globals.get(&var)
    }

    pub fn is_available(&self, frames: &FrameTracker, var: VarId, ctx: FrameIter) -> bool {
        self.lookup(frames, var, ctx).is_some()
    }

    pub fn latest(&self, var: VarId) -> Option<&Arc<TensorValue>> {
        self.latest.get(&var).or_else(|| self.globals.get(&var))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}
