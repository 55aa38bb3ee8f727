use std::fmt;

use anyhow::{anyhow, Result};

use crate::graph::OpAttrs;
use crate::ops::lookup_kernel;
use crate::tensor::TensorValue;

/// Computes the outputs of an ordinary operation.
///
/// The engine treats kernels as opaque: it only checks that the number of
/// returned values matches the operation's declared outputs. Implementations
/// must be deterministic for identical inputs and attributes, and must be
/// callable from several threads at once when a session runs in parallel mode.
pub trait KernelDispatcher: Send + Sync {
    fn invoke(
        &self,
        op_type: &str,
        attrs: &OpAttrs,
        inputs: &[&TensorValue],
    ) -> Result<Vec<TensorValue>>;
}

/// Reference host backend backed by the built-in CPU kernel registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl KernelDispatcher for CpuBackend {
    fn invoke(
        &self,
        op_type: &str,
        attrs: &OpAttrs,
        inputs: &[&TensorValue],
    ) -> Result<Vec<TensorValue>> {
        let kernel = lookup_kernel(op_type)
            .ok_or_else(|| anyhow!("no cpu kernel registered for op type `{}`", op_type))?;
        kernel(attrs, inputs)
    }
}

impl fmt::Display for CpuBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("cpu")
    }
}
