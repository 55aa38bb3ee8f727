use anyhow::{anyhow, Result};

use crate::tensor::TensorValue;

pub mod arithmetic;
pub mod broadcast;
pub mod compare;
pub mod matmul;

pub(crate) fn expect_unary<'a>(op: &str, inputs: &[&'a TensorValue]) -> Result<&'a TensorValue> {
    match inputs {
        [a] => Ok(a),
        _ => Err(anyhow!("{} op expects 1 input, got {}", op, inputs.len())),
    }
}

pub(crate) fn expect_binary<'a>(
    op: &str,
    inputs: &[&'a TensorValue],
) -> Result<(&'a TensorValue, &'a TensorValue)> {
    match inputs {
        [a, b] => Ok((a, b)),
        _ => Err(anyhow!("{} op expects 2 inputs, got {}", op, inputs.len())),
    }
}
