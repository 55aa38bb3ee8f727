use anyhow::{anyhow, Result};

use crate::graph::OpAttrs;
use crate::ops::cpu::broadcast::broadcast_binary;
use crate::tensor::TensorValue;

use super::expect_binary;

macro_rules! compare_kernel {
    ($name:ident, $label:expr, $cmp:tt) => {
        pub fn $name(_attrs: &OpAttrs, inputs: &[&TensorValue]) -> Result<Vec<TensorValue>> {
            let (a, b) = expect_binary($label, inputs)?;
            let out = match (a, b) {
                (TensorValue::F32(a), TensorValue::F32(b)) => broadcast_binary(a, b, |x, y| Ok(x $cmp y))?,
                (TensorValue::F64(a), TensorValue::F64(b)) => broadcast_binary(a, b, |x, y| Ok(x $cmp y))?,
                (TensorValue::I32(a), TensorValue::I32(b)) => broadcast_binary(a, b, |x, y| Ok(x $cmp y))?,
                (TensorValue::I64(a), TensorValue::I64(b)) => broadcast_binary(a, b, |x, y| Ok(x $cmp y))?,
                (TensorValue::Bool(a), TensorValue::Bool(b)) => broadcast_binary(a, b, |x, y| Ok(x $cmp y))?,
                _ => {
                    return Err(anyhow!(
                        "{} expects inputs of one dtype, got {} and {}",
                        $label,
                        a.dtype(),
                        b.dtype()
                    ))
                }
            };
            Ok(vec![TensorValue::Bool(out)])
        }
    };
}

compare_kernel!(less, "less", <);
compare_kernel!(less_equal, "less_equal", <=);
compare_kernel!(greater, "greater", >);
compare_kernel!(greater_equal, "greater_equal", >=);
compare_kernel!(equal, "equal", ==);
