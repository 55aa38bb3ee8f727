//! Tensor container.
//!
//! `Tensor<T>` owns flat storage with shape/stride metadata. The engine never
//! looks inside it; kernels and callers do.
use anyhow::{anyhow, Result};

use super::shape::{compute_strides, numel, offset_for};

/// Tensor construction options (shape/stride overrides).
#[derive(Debug, Clone, Default)]
pub struct TensorOptions {
    pub shape: Option<Vec<usize>>,
    pub strides: Option<Vec<usize>>,
}

/// Owned tensor container with shape and stride metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub data: Vec<T>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl<T> Tensor<T> {
    /// Build a rank-1 tensor from a flat data vector.
    ///
    /// # Example
    /// ```
    /// # use flowinfer::Tensor;
    /// # fn main() -> anyhow::Result<()> {
    /// let t = Tensor::from_vec(vec![1.0f32, 2.0, 3.0])?;
    /// assert_eq!(t.shape(), &[3]);
    /// # Ok(()) }
    /// ```
    pub fn from_vec(data: Vec<T>) -> Result<Self> {
        Self::from_vec_with_opts(data, TensorOptions::default())
    }

    /// Build a tensor with explicit options.
    ///
    /// # Example
    /// ```
    /// # use flowinfer::{Tensor, TensorOptions};
    /// # fn main() -> anyhow::Result<()> {
    /// let t = Tensor::from_vec_with_opts(
    ///     vec![1.0f32, 2.0, 3.0, 4.0],
    ///     TensorOptions { shape: Some(vec![2, 2]), ..TensorOptions::default() },
    /// )?;
    /// assert_eq!(*t.at(&[1, 0]), 3.0);
    /// # Ok(()) }
    /// ```
    pub fn from_vec_with_opts(data: Vec<T>, opts: TensorOptions) -> Result<Self> {
        let shape = match opts.shape {
            Some(shape) => shape,
            None => vec![data.len()],
        };
        let expected = numel(&shape);
        if expected != data.len() {
            return Err(anyhow!(
                "tensor shape {:?} expects {} values, got {}",
                shape,
                expected,
                data.len()
            ));
        }
        let strides = match opts.strides {
            Some(strides) => {
                if strides.len() != shape.len() {
                    return Err(anyhow!(
                        "tensor strides length {} does not match shape length {}",
                        strides.len(),
                        shape.len()
                    ));
                }
                strides
            }
            None => compute_strides(&shape),
        };
        Ok(Self {
            data,
            shape,
            strides,
        })
    }

    /// Build a tensor with the given shape.
    pub fn with_shape(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        Self::from_vec_with_opts(
            data,
            TensorOptions {
                shape: Some(shape.to_vec()),
                ..TensorOptions::default()
            },
        )
    }

    /// Create a scalar (rank-0) tensor from a single value.
    pub fn from_scalar(value: T) -> Self {
        Self {
            data: vec![value],
            shape: Vec::new(),
            strides: Vec::new(),
        }
    }

    /// Tensor of `shape` with every element set to `value`.
    pub fn filled(value: T, shape: &[usize]) -> Self
    where
        T: Clone,
    {
        Self {
            data: vec![value; numel(shape)],
            shape: shape.to_vec(),
            strides: compute_strides(shape),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn numel(&self) -> usize {
        numel(&self.shape)
    }

    /// Access a value by multidimensional indices.
    pub fn at(&self, indices: &[usize]) -> &T {
        let offset = offset_for(&self.shape, &self.strides, indices)
            .unwrap_or_else(|err| panic!("tensor index error: {}", err));
        &self.data[offset]
    }

    /// Reinterpret the data under a new shape with the same element count.
    pub fn reshape(self, shape: &[usize]) -> Result<Self> {
        if numel(shape) != self.data.len() {
            return Err(anyhow!(
                "cannot reshape {} values into {:?}",
                self.data.len(),
                shape
            ));
        }
        Ok(Self {
            data: self.data,
            shape: shape.to_vec(),
            strides: compute_strides(shape),
        })
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Tensor<U> {
        Tensor {
            data: self.data.iter().map(f).collect(),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.data.clone()
    }
}

impl<T> From<Vec<T>> for Tensor<T> {
    fn from(value: Vec<T>) -> Self {
        let shape = vec![value.len()];
        Self {
            data: value,
            strides: compute_strides(&shape),
            shape,
        }
    }
}
