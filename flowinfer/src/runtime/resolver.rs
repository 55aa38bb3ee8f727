//! Backward reachability from requested outputs to the ops that must run.
use std::collections::{HashMap, HashSet};

use anyhow::Result;

use crate::error::SessionError;
use crate::graph::{Graph, OpId, VarId, VarKind};
use crate::tensor::TensorValue;

/// Static portion of one `output` call: what to run and what must be bound.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Requested names in call order with their variables. Duplicates are
    /// collapsed.
    pub requested: Vec<(String, VarId)>,
    pub ops: Vec<OpId>,
    pub placeholders: Vec<VarId>,
    needed: Vec<bool>,
}

impl ExecutionPlan {
    pub fn contains(&self, op: OpId) -> bool {
        self.needed.get(op.0).copied().unwrap_or(false)
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }
}

pub fn resolve<S: AsRef<str>>(graph: &Graph, requested: &[S]) -> Result<ExecutionPlan> {
    let mut requested_vars = Vec::new();
    let mut seen_names = HashSet::new();
    for name in requested {
        let name = name.as_ref();
        let var = graph.var_id(name).ok_or_else(|| SessionError::UnknownOutputName {
            name: name.to_string(),
        })?;
        if seen_names.insert(name.to_string()) {
            requested_vars.push((name.to_string(), var));
        }
    }

    let mut needed = vec![false; graph.ops().len()];
    let mut placeholder_seen = vec![false; graph.vars().len()];
    let mut stack: Vec<VarId> = requested_vars.iter().map(|(_, var)| *var).collect();
    while let Some(var) = stack.pop() {
        match &graph.var(var).kind {
            VarKind::Placeholder { .. } => placeholder_seen[var.0] = true,
            VarKind::Constant { .. } => {}
            VarKind::Computed { producer, .. } => {
                if needed[producer.0] {
                    continue;
                }
                needed[producer.0] = true;
                let op = graph.op(*producer);
                for input in &op.inputs {
                    let input_var = graph.var_id(&input.var).ok_or_else(|| {
                        SessionError::invalid_graph(format!(
                            "op `{}` reads undeclared variable `{}`",
                            op.name, input.var
                        ))
                    })?;
                    stack.push(input_var);
                }
            }
        }
    }

    let ops = needed
        .iter()
        .enumerate()
        .filter(|(_, hit)| **hit)
        .map(|(idx, _)| OpId(idx))
        .collect();
    let placeholders = placeholder_seen
        .iter()
        .enumerate()
        .filter(|(_, hit)| **hit)
        .map(|(idx, _)| VarId(idx))
        .collect();
    Ok(ExecutionPlan {
        requested: requested_vars,
        ops,
        placeholders,
        needed,
    })
}

/// Check that every placeholder in `plan` is bound to a matching tensor.
pub fn check_bindings(
    graph: &Graph,
    plan: &ExecutionPlan,
    inputs: &HashMap<String, TensorValue>,
) -> Result<()> {
    for var in &plan.placeholders {
        let decl = graph.var(*var);
        let value = inputs
            .get(&decl.name)
            .ok_or_else(|| SessionError::UnboundPlaceholder {
                name: decl.name.clone(),
            })?;
        decl.check_binding(value)
            .map_err(|detail| SessionError::PlaceholderMismatch {
                name: decl.name.clone(),
                detail,
            })?;
    }
    for name in inputs.keys() {
        match graph.var_by_name(name) {
            Some(decl) if decl.is_placeholder() => {}
            Some(_) => crate::warning!("binding `{}` is not a placeholder; ignored", name),
            None => crate::warning!("binding `{}` is not a graph variable; ignored", name),
        }
    }
    Ok(())
}
