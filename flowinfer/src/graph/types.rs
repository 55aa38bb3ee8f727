//! Core graph data types.
//!
//! A graph is a flat set of operations connected through named variables.
//! Control-flow operations are ordinary nodes with a distinguishing kind; the
//! session gives them their special readiness and routing rules.
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Stable index of an operation inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OpId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(pub usize);

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var#{}", self.0)
    }
}

/// Attribute value handed to kernels untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Float(f32),
    Double(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    IntList(Vec<i64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpAttr {
    pub name: String,
    pub value: AttrValue,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpAttrs {
    pub items: Vec<OpAttr>,
}

impl OpAttrs {
    pub fn none() -> Self {
        Self { items: Vec::new() }
    }

    pub fn with(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.items.push(OpAttr {
            name: name.into(),
            value,
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.items
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| &attr.value)
    }
}

/// Behaviour class of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    Ordinary { op_type: String, attrs: OpAttrs },
    /// Routes `data` to output 0 (false) or output 1 (true).
    Switch,
    Merge,
    /// Moves a value into the child frame named `frame_name`.
    Enter { frame_name: String, is_constant: bool },
    Exit,
    NextIteration,
    LoopCond,
    Identity,
}

/// Field-less tag of `OpKind`, used for graph queries and trace records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OpTag {
    Ordinary,
    Switch,
    Merge,
    Enter,
    Exit,
    NextIteration,
    LoopCond,
    Identity,
}

impl OpKind {
    pub fn tag(&self) -> OpTag {
        match self {
            OpKind::Ordinary { .. } => OpTag::Ordinary,
            OpKind::Switch => OpTag::Switch,
            OpKind::Merge => OpTag::Merge,
            OpKind::Enter { .. } => OpTag::Enter,
            OpKind::Exit => OpTag::Exit,
            OpKind::NextIteration => OpTag::NextIteration,
            OpKind::LoopCond => OpTag::LoopCond,
            OpKind::Identity => OpTag::Identity,
        }
    }

    pub fn is_control_flow(&self) -> bool {
        !matches!(self, OpKind::Ordinary { .. } | OpKind::Identity)
    }
}

impl OpTag {
    pub fn as_str(self) -> &'static str {
        match self {
            OpTag::Ordinary => "ordinary",
            OpTag::Switch => "switch",
            OpTag::Merge => "merge",
            OpTag::Enter => "enter",
            OpTag::Exit => "exit",
            OpTag::NextIteration => "next_iteration",
            OpTag::LoopCond => "loop_cond",
            OpTag::Identity => "identity",
        }
    }
}

impl fmt::Display for OpTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference from an operation to one of the variables it reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub var: String,
    /// Expected output slot of the producer, checked by validation.
    pub output_index: Option<usize>,
    /// Control inputs only order execution; their value is never read.
    pub control: bool,
}

impl Input {
    pub fn data(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            output_index: None,
            control: false,
        }
    }

    pub fn at(var: impl Into<String>, output_index: usize) -> Self {
        Self {
            var: var.into(),
            output_index: Some(output_index),
            control: false,
        }
    }

    pub fn control(var: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            output_index: None,
            control: true,
        }
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::data(value)
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::data(value)
    }
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub id: OpId,
    pub uuid: Uuid,
    pub name: String,
    pub kind: OpKind,
    pub inputs: Vec<Input>,
    pub outputs: Vec<String>,
}

impl Operation {
    pub fn data_inputs(&self) -> impl Iterator<Item = &Input> {
        self.inputs.iter().filter(|input| !input.control)
    }

    pub fn control_inputs(&self) -> impl Iterator<Item = &Input> {
        self.inputs.iter().filter(|input| input.control)
    }

    pub fn tag(&self) -> OpTag {
        self.kind.tag()
    }
}
