use anyhow::{anyhow, Result};

use crate::graph::OpAttrs;
use crate::tensor::{Tensor, TensorValue};

use super::expect_binary;

pub(crate) fn matmul_dims(a_shape: &[usize], b_shape: &[usize]) -> Result<(usize, usize, usize)> {
    if a_shape.len() != 2 || b_shape.len() != 2 {
        return Err(anyhow!(
            "matmul expects 2D inputs, got {:?} and {:?}",
            a_shape,
            b_shape
        ));
    }
    let (m, k) = (a_shape[0], a_shape[1]);
    let (k2, n) = (b_shape[0], b_shape[1]);
    if k != k2 {
        return Err(anyhow!(
            "matmul inner dims must match, got {:?} and {:?}",
            a_shape,
            b_shape
        ));
    }
    Ok((m, k, n))
}

fn matmul_typed<T: Copy>(
    a: &Tensor<T>,
    b: &Tensor<T>,
    zero: T,
    mul_add: impl Fn(T, T, T) -> T,
) -> Result<Tensor<T>> {
    let (m, k, n) = matmul_dims(a.shape(), b.shape())?;
    let (a_rs, a_cs) = (a.strides()[0], a.strides()[1]);
    let (b_rs, b_cs) = (b.strides()[0], b.strides()[1]);
    let mut out = Vec::with_capacity(m * n);
    for i in 0..m {
        for j in 0..n {
            let mut acc = zero;
            for p in 0..k {
                acc = mul_add(acc, a.data[i * a_rs + p * a_cs], b.data[p * b_rs + j * b_cs]);
            }
            out.push(acc);
        }
    }
    Tensor::with_shape(out, &[m, n])
}

pub fn matmul(_attrs: &OpAttrs, inputs: &[&TensorValue]) -> Result<Vec<TensorValue>> {
    let (a, b) = expect_binary("matmul", inputs)?;
    let out = match (a, b) {
        (TensorValue::F32(a), TensorValue::F32(b)) => TensorValue::F32(matmul_typed(
            a,
            b,
            0.0,
            |acc: f32, x: f32, y: f32| acc + x * y,
        )?),
        (TensorValue::F64(a), TensorValue::F64(b)) => TensorValue::F64(matmul_typed(
            a,
            b,
            0.0,
            |acc: f64, x: f64, y: f64| acc + x * y,
        )?),
        (TensorValue::I32(a), TensorValue::I32(b)) => TensorValue::I32(matmul_typed(
            a,
            b,
            0,
            |acc: i32, x: i32, y: i32| acc.wrapping_add(x.wrapping_mul(y)),
        )?),
        (TensorValue::I64(a), TensorValue::I64(b)) => TensorValue::I64(matmul_typed(
            a,
            b,
            0,
            |acc: i64, x: i64, y: i64| acc.wrapping_add(x.wrapping_mul(y)),
        )?),
        _ => {
            return Err(anyhow!(
                "matmul expects two numeric inputs of one dtype, got {} and {}",
                a.dtype(),
                b.dtype()
            ))
        }
    };
    Ok(vec![out])
}
