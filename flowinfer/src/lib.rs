//! Execution sessions for static dataflow graphs.
//!
//! A [`Graph`] holds placeholders, constants and operations. Ordinary
//! operations call kernels through a [`KernelDispatcher`]; switch/merge
//! route values between branches and enter/exit/next-iteration/loop-cond
//! build loops whose trip count is only known at run time. A [`Session`]
//! computes the requested outputs from a set of bindings, running only the
//! operations those outputs depend on.

pub mod logging;
mod macros;

#[doc(hidden)]
pub use anyhow as __anyhow;

mod backend;
mod error;
mod graph;
mod ops;
mod runtime;
mod tensor;

pub use backend::{CpuBackend, KernelDispatcher};
pub use error::SessionError;
pub use graph::{
    describe_op, AttrValue, Graph, Input, OpAttr, OpAttrs, OpId, OpKind, OpTag, Operation, VarDecl,
    VarId, VarKind,
};
pub use ops::{kernel_names, lookup_kernel, HostKernel};
pub use runtime::{
    check_bindings, resolve, ExecState, ExecutionListener, ExecutionPlan, FrameId, FrameIter,
    FrameTracker, OpExecution, RecordingListener, Session, SessionOptions, TraceEvent,
    TraceEventKind, WavePool,
};
pub use tensor::{
    compute_strides, numel, tensor_to_bool, tensor_to_i64, DType, Tensor, TensorElement,
    TensorOptions, TensorValue,
};
