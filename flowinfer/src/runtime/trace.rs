use std::fmt;
use std::time::Duration;

use serde::ser::{SerializeStruct, Serializer};
use uuid::Uuid;

use crate::graph::OpTag;

/// Kind of trace event emitted during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TraceEventKind {
    OpExecute,
    Switch,
    Merge,
    Enter,
    Exit,
    NextIteration,
    LoopCond,
    Identity,
}

impl TraceEventKind {
    pub fn for_tag(tag: OpTag) -> Self {
        match tag {
            OpTag::Ordinary => TraceEventKind::OpExecute,
            OpTag::Switch => TraceEventKind::Switch,
            OpTag::Merge => TraceEventKind::Merge,
            OpTag::Enter => TraceEventKind::Enter,
            OpTag::Exit => TraceEventKind::Exit,
            OpTag::NextIteration => TraceEventKind::NextIteration,
            OpTag::LoopCond => TraceEventKind::LoopCond,
            OpTag::Identity => TraceEventKind::Identity,
        }
    }
}

impl fmt::Display for TraceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEventKind::OpExecute => write!(f, "OpExecute"),
            TraceEventKind::Switch => write!(f, "Switch"),
            TraceEventKind::Merge => write!(f, "Merge"),
            TraceEventKind::Enter => write!(f, "Enter"),
            TraceEventKind::Exit => write!(f, "Exit"),
            TraceEventKind::NextIteration => write!(f, "NextIteration"),
            TraceEventKind::LoopCond => write!(f, "LoopCond"),
            TraceEventKind::Identity => write!(f, "Identity"),
        }
    }
}

/// Execution trace record for a single node instance.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub kind: TraceEventKind,
    pub op_index: usize,
    pub op_uuid: Uuid,
    pub op_name: String,
    pub frame: String,
    pub iteration: usize,
    pub op_desc: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub micros: String,
    pub micros_parts: [u64; 3],
}

impl serde::Serialize for TraceEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("TraceEvent", 9)?;
        state.serialize_field("frame", &self.frame)?;
        state.serialize_field("iteration", &self.iteration)?;
        state.serialize_field("op_index", &self.op_index)?;
        state.serialize_field("op_uuid", &self.op_uuid)?;
        state.serialize_field("op_name", &self.op_name)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("inputs", &self.inputs)?;
        state.serialize_field("outputs", &self.outputs)?;
        state.serialize_field("micros", &self.micros_parts)?;
        state.end()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TraceTiming {
    pub micros: String,
    pub micros_parts: [u64; 3],
}

pub(crate) fn format_trace_timing(duration: Duration) -> TraceTiming {
    let total_ns = duration.as_nanos();
    let ms = (total_ns / 1_000_000) as u64;
    let us = ((total_ns / 1_000) % 1_000) as u64;
    let ns = (total_ns % 1_000) as u64;
    TraceTiming {
        micros: format!("{ms}ms {us}us {ns}ns"),
        micros_parts: [ms, us, ns],
    }
}

pub(crate) fn log_trace_event(event: &TraceEvent) {
    crate::trace!(
        "{} {} [{}] -- {} -- ({})",
        event.op_index,
        event.op_uuid,
        event.frame_context(),
        event.op_desc,
        event.micros
    );
}

impl TraceEvent {
    /// `frame@iteration`, or just the frame for the root context.
    pub fn frame_context(&self) -> String {
        if self.frame == "root" {
            self.frame.clone()
        } else {
            format!("{}@{}", self.frame, self.iteration)
        }
    }
}
