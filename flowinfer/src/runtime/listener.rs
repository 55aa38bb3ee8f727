use crate::graph::{OpId, OpTag};
use crate::tensor::TensorValue;

/// One node instance as seen by listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpExecution {
    pub op: OpId,
    pub op_name: String,
    pub tag: OpTag,
    pub op_type: Option<String>,
    pub frame: String,
    pub iteration: usize,
}

/// Observer hooks around every node instance.
///
/// Listeners see values but cannot change them; a run produces the same
/// outputs with or without listeners attached.
pub trait ExecutionListener {
    fn op_started(&mut self, _execution: &OpExecution) {}

    /// `outputs` holds only the values the instance actually produced, so a
    /// switch reports a single output.
    fn op_finished(&mut self, _execution: &OpExecution, _outputs: &[(String, &TensorValue)]) {}
}

/// Records every finished instance in order; handy for tests and debugging.
#[derive(Debug, Default, Clone)]
pub struct RecordingListener {
    pub started: Vec<OpExecution>,
    pub finished: Vec<(OpExecution, Vec<String>)>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finished_names(&self) -> Vec<&str> {
        self.finished
            .iter()
            .map(|(execution, _)| execution.op_name.as_str())
            .collect()
    }

    pub fn count(&self, op_name: &str) -> usize {
        self.finished
            .iter()
            .filter(|(execution, _)| execution.op_name == op_name)
            .count()
    }
}

impl ExecutionListener for RecordingListener {
    fn op_started(&mut self, execution: &OpExecution) {
        self.started.push(execution.clone());
    }

    fn op_finished(&mut self, execution: &OpExecution, outputs: &[(String, &TensorValue)]) {
        let names = outputs.iter().map(|(name, _)| name.clone()).collect();
        self.finished.push((execution.clone(), names));
    }
}
