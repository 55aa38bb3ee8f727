use anyhow::Result;

use crate::error::SessionError;

use super::model::Graph;
use super::types::{OpKind, Operation};

impl Graph {
    /// Structural checks run once when a session binds the graph.
    pub fn validate(&self) -> Result<()> {
        for op in self.ops() {
            validate_inputs(self, op)?;
            validate_arity(op)?;
        }
        Ok(())
    }
}

fn validate_inputs(graph: &Graph, op: &Operation) -> Result<()> {
    for input in &op.inputs {
        let Some(var) = graph.var_id(&input.var) else {
            return Err(SessionError::invalid_graph(format!(
                "op {} reads unknown variable {}",
                op.name, input.var
            ))
            .into());
        };
        let Some(expected) = input.output_index else {
            continue;
        };
        match graph.producer_of(var) {
            Some((_, actual)) if actual == expected => {}
            Some((producer, actual)) => {
                return Err(SessionError::invalid_graph(format!(
                    "op {} expects {} at output {} of {}, found output {}",
                    op.name,
                    input.var,
                    expected,
                    graph.op(producer).name,
                    actual
                ))
                .into());
            }
            None => {
                return Err(SessionError::invalid_graph(format!(
                    "op {} addresses output {} of {}, which has no producer",
                    op.name, expected, input.var
                ))
                .into());
            }
        }
    }
    Ok(())
}

fn validate_arity(op: &Operation) -> Result<()> {
    let data = op.data_inputs().count();
    let outputs = op.outputs.len();
    let (data_ok, outputs_ok, rule) = match &op.kind {
        OpKind::Ordinary { .. } => (true, true, ""),
        OpKind::Switch => (data == 2, outputs == 2, "2 inputs (data, predicate) and 2 outputs"),
        OpKind::Merge => (data >= 1, outputs == 1 || outputs == 2, "at least 1 input and 1-2 outputs"),
        OpKind::Enter { frame_name, .. } => {
            if frame_name.is_empty() {
                return Err(SessionError::invalid_graph(format!(
                    "enter op {} has an empty frame name",
                    op.name
                ))
                .into());
            }
            (data == 1, outputs == 1, "1 input and 1 output")
        }
        OpKind::Exit | OpKind::NextIteration | OpKind::LoopCond | OpKind::Identity => {
            (data == 1, outputs == 1, "1 input and 1 output")
        }
    };
    if data_ok && outputs_ok {
        return Ok(());
    }
    Err(SessionError::invalid_graph(format!(
        "{} op {} requires {}, got {} inputs and {} outputs",
        op.tag(),
        op.name,
        rule,
        data,
        outputs
    ))
    .into())
}
