//! Graph model: variables, operations and read-only accessors.
//!
//! Graphs are built once (by an importer or by hand) and then shared
//! immutably by any number of sessions.
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use uuid::Uuid;

use crate::tensor::{DType, TensorValue};

use super::node::describe_op;
use super::types::{Input, OpAttrs, OpId, OpKind, OpTag, Operation, VarId};
use super::var::{VarDecl, VarKind};

#[derive(Debug, Clone, Default)]
pub struct Graph {
    vars: Vec<VarDecl>,
    ops: Vec<Operation>,
    var_ids: HashMap<String, VarId>,
    op_ids: HashMap<String, OpId>,
    // Keyed by name so operations may reference variables declared later.
    consumers: HashMap<String, Vec<OpId>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_placeholder(
        &mut self,
        name: impl Into<String>,
        dtype: DType,
        shape: &[usize],
    ) -> Result<VarId> {
        let shape = shape.iter().copied().map(Some).collect();
        self.add_placeholder_dynamic(name, dtype, shape)
    }

    /// Declare a placeholder whose `None` dimensions accept any size.
    pub fn add_placeholder_dynamic(
        &mut self,
        name: impl Into<String>,
        dtype: DType,
        shape: Vec<Option<usize>>,
    ) -> Result<VarId> {
        self.declare_var(name.into(), VarKind::Placeholder { dtype, shape })
    }

    pub fn add_constant(&mut self, name: impl Into<String>, value: TensorValue) -> Result<VarId> {
        self.declare_var(
            name.into(),
            VarKind::Constant {
                value: Arc::new(value),
            },
        )
    }

    /// Add an operation and declare one computed variable per output.
    ///
    /// Inputs may name variables that do not exist yet; `validate` checks
    /// the finished graph.
    pub fn add_op(
        &mut self,
        name: impl Into<String>,
        kind: OpKind,
        inputs: Vec<Input>,
        outputs: &[&str],
    ) -> Result<OpId> {
        let name = name.into();
        if self.op_ids.contains_key(&name) {
            return Err(anyhow!("duplicate operation name: {}", name));
        }
        if outputs.is_empty() {
            return Err(anyhow!("operation {} declares no outputs", name));
        }
        for (pos, output) in outputs.iter().enumerate() {
            if outputs[..pos].contains(output) {
                return Err(anyhow!("operation {} lists output {} twice", name, output));
            }
            if self.var_ids.contains_key(*output) {
                return Err(anyhow!(
                    "variable {} already has a producer or is a graph input",
                    output
                ));
            }
        }
        let id = OpId(self.ops.len());
        for (output_index, output) in outputs.iter().enumerate() {
            self.declare_var(
                (*output).to_string(),
                VarKind::Computed {
                    producer: id,
                    output_index,
                },
            )?;
        }
        for input in &inputs {
            let entry = self.consumers.entry(input.var.clone()).or_default();
            if !entry.contains(&id) {
                entry.push(id);
            }
        }
        self.op_ids.insert(name.clone(), id);
        self.ops.push(Operation {
            id,
            uuid: Uuid::new_v4(),
            name,
            kind,
            inputs,
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        });
        Ok(id)
    }

    pub fn add_ordinary(
        &mut self,
        name: impl Into<String>,
        op_type: impl Into<String>,
        attrs: OpAttrs,
        inputs: &[&str],
        output: &str,
    ) -> Result<OpId> {
        let kind = OpKind::Ordinary {
            op_type: op_type.into(),
            attrs,
        };
        self.add_op(name, kind, to_inputs(inputs), &[output])
    }

    /// Outputs are ordered `(false_branch, true_branch)`.
    pub fn add_switch(
        &mut self,
        name: impl Into<String>,
        data: &str,
        predicate: &str,
        outputs: (&str, &str),
    ) -> Result<OpId> {
        self.add_op(
            name,
            OpKind::Switch,
            to_inputs(&[data, predicate]),
            &[outputs.0, outputs.1],
        )
    }

    pub fn add_merge(&mut self, name: impl Into<String>, inputs: &[&str], output: &str) -> Result<OpId> {
        self.add_op(name, OpKind::Merge, to_inputs(inputs), &[output])
    }

    pub fn add_enter(
        &mut self,
        name: impl Into<String>,
        input: &str,
        frame_name: &str,
        is_constant: bool,
        output: &str,
    ) -> Result<OpId> {
        let kind = OpKind::Enter {
            frame_name: frame_name.to_string(),
            is_constant,
        };
        self.add_op(name, kind, to_inputs(&[input]), &[output])
    }

    pub fn add_exit(&mut self, name: impl Into<String>, input: &str, output: &str) -> Result<OpId> {
        self.add_op(name, OpKind::Exit, to_inputs(&[input]), &[output])
    }

    pub fn add_next_iteration(
        &mut self,
        name: impl Into<String>,
        input: &str,
        output: &str,
    ) -> Result<OpId> {
        self.add_op(name, OpKind::NextIteration, to_inputs(&[input]), &[output])
    }

    pub fn add_loop_cond(&mut self, name: impl Into<String>, input: &str, output: &str) -> Result<OpId> {
        self.add_op(name, OpKind::LoopCond, to_inputs(&[input]), &[output])
    }

    pub fn add_identity(&mut self, name: impl Into<String>, input: &str, output: &str) -> Result<OpId> {
        self.add_op(name, OpKind::Identity, to_inputs(&[input]), &[output])
    }

    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    pub fn op(&self, id: OpId) -> &Operation {
        &self.ops[id.0]
    }

    pub fn op_by_name(&self, name: &str) -> Option<&Operation> {
        self.op_ids.get(name).map(|id| &self.ops[id.0])
    }

    pub fn vars(&self) -> &[VarDecl] {
        &self.vars
    }

    pub fn var(&self, id: VarId) -> &VarDecl {
        &self.vars[id.0]
    }

    pub fn var_id(&self, name: &str) -> Option<VarId> {
        self.var_ids.get(name).copied()
    }

    pub fn var_by_name(&self, name: &str) -> Option<&VarDecl> {
        self.var_id(name).map(|id| &self.vars[id.0])
    }

    /// Producing operation and output slot of a computed variable.
    pub fn producer_of(&self, var: VarId) -> Option<(OpId, usize)> {
        self.vars[var.0].producer()
    }

    pub fn consumers_of(&self, var: &str) -> &[OpId] {
        self.consumers.get(var).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ops_of_kind(&self, tag: OpTag) -> Vec<OpId> {
        self.ops
            .iter()
            .filter(|op| op.tag() == tag)
            .map(|op| op.id)
            .collect()
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &VarDecl> {
        self.vars.iter().filter(|var| var.is_placeholder())
    }

    pub fn describe_op(&self, id: OpId) -> String {
        describe_op(self.op(id))
    }

    fn declare_var(&mut self, name: String, kind: VarKind) -> Result<VarId> {
        if self.var_ids.contains_key(&name) {
            return Err(anyhow!("duplicate variable name: {}", name));
        }
        let id = VarId(self.vars.len());
        self.var_ids.insert(name.clone(), id);
        self.vars.push(VarDecl { name, kind });
        Ok(id)
    }
}

fn to_inputs(names: &[&str]) -> Vec<Input> {
    names.iter().map(|name| Input::data(*name)).collect()
}
