use anyhow::{anyhow, Result};

use crate::graph::OpAttrs;
use crate::ops::cpu::broadcast::broadcast_binary;
use crate::tensor::TensorValue;

use super::{expect_binary, expect_unary};

macro_rules! binary_kernel {
    ($name:ident, $label:expr, $float:expr, $int:ident) => {
        pub fn $name(_attrs: &OpAttrs, inputs: &[&TensorValue]) -> Result<Vec<TensorValue>> {
            let (a, b) = expect_binary($label, inputs)?;
            let out = match (a, b) {
                (TensorValue::F32(a), TensorValue::F32(b)) => {
                    TensorValue::F32(broadcast_binary(a, b, |x, y| Ok($float(x, y)))?)
                }
                (TensorValue::F64(a), TensorValue::F64(b)) => {
                    TensorValue::F64(broadcast_binary(a, b, |x, y| Ok($float(x, y)))?)
                }
                (TensorValue::I32(a), TensorValue::I32(b)) => {
                    TensorValue::I32(broadcast_binary(a, b, |x: i32, y| Ok(x.$int(y)))?)
                }
                (TensorValue::I64(a), TensorValue::I64(b)) => {
                    TensorValue::I64(broadcast_binary(a, b, |x: i64, y| Ok(x.$int(y)))?)
                }
                _ => {
                    return Err(anyhow!(
                        "{} expects two numeric inputs of one dtype, got {} and {}",
                        $label,
                        a.dtype(),
                        b.dtype()
                    ))
                }
            };
            Ok(vec![out])
        }
    };
}

binary_kernel!(add, "add", |x, y| x + y, wrapping_add);
binary_kernel!(sub, "sub", |x, y| x - y, wrapping_sub);
binary_kernel!(mul, "mul", |x, y| x * y, wrapping_mul);

pub fn div(_attrs: &OpAttrs, inputs: &[&TensorValue]) -> Result<Vec<TensorValue>> {
    let (a, b) = expect_binary("div", inputs)?;
    let out = match (a, b) {
        (TensorValue::F32(a), TensorValue::F32(b)) => {
            TensorValue::F32(broadcast_binary(a, b, |x, y| Ok(x / y))?)
        }
        (TensorValue::F64(a), TensorValue::F64(b)) => {
            TensorValue::F64(broadcast_binary(a, b, |x, y| Ok(x / y))?)
        }
        (TensorValue::I32(a), TensorValue::I32(b)) => TensorValue::I32(broadcast_binary(
            a,
            b,
            |x: i32, y| x.checked_div(y).ok_or_else(|| anyhow!("integer division by zero")),
        )?),
        (TensorValue::I64(a), TensorValue::I64(b)) => TensorValue::I64(broadcast_binary(
            a,
            b,
            |x: i64, y| x.checked_div(y).ok_or_else(|| anyhow!("integer division by zero")),
        )?),
        _ => {
            return Err(anyhow!(
                "div expects two numeric inputs of one dtype, got {} and {}",
                a.dtype(),
                b.dtype()
            ))
        }
    };
    Ok(vec![out])
}

pub fn neg(_attrs: &OpAttrs, inputs: &[&TensorValue]) -> Result<Vec<TensorValue>> {
    let out = match expect_unary("neg", inputs)? {
        TensorValue::F32(t) => TensorValue::F32(t.map(|v| -v)),
        TensorValue::F64(t) => TensorValue::F64(t.map(|v| -v)),
        TensorValue::I32(t) => TensorValue::I32(t.map(|v| v.wrapping_neg())),
        TensorValue::I64(t) => TensorValue::I64(t.map(|v| v.wrapping_neg())),
        TensorValue::Bool(_) => return Err(anyhow!("neg does not support bool")),
    };
    Ok(vec![out])
}

/// Forwards every input unchanged.
pub fn identity(_attrs: &OpAttrs, inputs: &[&TensorValue]) -> Result<Vec<TensorValue>> {
    if inputs.is_empty() {
        return Err(anyhow!("identity expects at least 1 input"));
    }
    Ok(inputs.iter().map(|v| (*v).clone()).collect())
}
