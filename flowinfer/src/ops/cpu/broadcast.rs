use anyhow::{anyhow, Result};

use crate::tensor::Tensor;

pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let out_rank = a.len().max(b.len());
    let mut out = vec![1usize; out_rank];
    for (i, slot) in out.iter_mut().enumerate() {
        let a_dim = dim_from_right(a, out_rank, i);
        let b_dim = dim_from_right(b, out_rank, i);
        if a_dim == b_dim || a_dim == 1 || b_dim == 1 {
            *slot = if a_dim == 1 { b_dim } else { a_dim };
        } else {
            return Err(anyhow!(
                "incompatible broadcast dims {} and {} (shapes {:?} and {:?})",
                a_dim,
                b_dim,
                a,
                b
            ));
        }
    }
    Ok(out)
}

pub fn broadcast_strides(shape: &[usize], strides: &[usize], out_rank: usize) -> Vec<usize> {
    let mut out = vec![0usize; out_rank];
    let offset = out_rank.saturating_sub(shape.len());
    for (i, slot) in out.iter_mut().enumerate().skip(offset) {
        let src_i = i - offset;
        *slot = if shape[src_i] == 1 { 0 } else { strides[src_i] };
    }
    out
}

pub fn for_each_broadcast_index(
    out_shape: &[usize],
    a_strides: &[usize],
    b_strides: &[usize],
    mut f: impl FnMut(usize, usize),
) {
    if out_shape.is_empty() {
        f(0, 0);
        return;
    }
    let mut index = vec![0usize; out_shape.len()];
    let total = out_shape.iter().copied().product::<usize>();
    for _ in 0..total {
        f(linear_offset(&index, a_strides), linear_offset(&index, b_strides));
        bump_index(&mut index, out_shape);
    }
}

/// Elementwise binary op with NumPy-style broadcasting; output is row-major.
pub fn broadcast_binary<A: Copy, B>(
    a: &Tensor<A>,
    b: &Tensor<A>,
    f: impl Fn(A, A) -> Result<B>,
) -> Result<Tensor<B>> {
    let out_shape = broadcast_shape(a.shape(), b.shape())?;
    let rank = out_shape.len();
    let a_strides = broadcast_strides(a.shape(), a.strides(), rank);
    let b_strides = broadcast_strides(b.shape(), b.strides(), rank);
    let mut out = Vec::with_capacity(out_shape.iter().product());
    let mut failure = None;
    for_each_broadcast_index(&out_shape, &a_strides, &b_strides, |a_off, b_off| {
        if failure.is_some() {
            return;
        }
        match f(a.data[a_off], b.data[b_off]) {
            Ok(value) => out.push(value),
            Err(err) => failure = Some(err),
        }
    });
    if let Some(err) = failure {
        return Err(err);
    }
    Tensor::with_shape(out, &out_shape)
}

fn dim_from_right(shape: &[usize], out_rank: usize, idx: usize) -> usize {
    let offset = out_rank.saturating_sub(shape.len());
    if idx < offset {
        1
    } else {
        shape[idx - offset]
    }
}

fn linear_offset(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(i, s)| i.saturating_mul(*s))
        .sum()
}

fn bump_index(index: &mut [usize], shape: &[usize]) {
    for (i, dim) in shape.iter().enumerate().rev() {
        index[i] += 1;
        if index[i] < *dim {
            return;
        }
        index[i] = 0;
    }
}
