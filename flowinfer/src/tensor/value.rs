use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use super::Tensor;

/// Element type of a tensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
    Bool,
}

impl DType {
    pub fn as_str(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::Bool => "bool",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element type that can be converted to/from `TensorValue`.
pub trait TensorElement: Sized + Clone {
    const DTYPE: DType;
    fn from_value(value: &TensorValue) -> Option<Tensor<Self>>;
    fn into_value(tensor: Tensor<Self>) -> TensorValue;
}

macro_rules! impl_tensor_element {
    ($ty:ty, $variant:ident) => {
        impl TensorElement for $ty {
            const DTYPE: DType = DType::$variant;

            fn from_value(value: &TensorValue) -> Option<Tensor<Self>> {
                match value {
                    TensorValue::$variant(tensor) => Some(tensor.clone()),
                    _ => None,
                }
            }

            fn into_value(tensor: Tensor<Self>) -> TensorValue {
                TensorValue::$variant(tensor)
            }
        }

        impl From<Tensor<$ty>> for TensorValue {
            fn from(value: Tensor<$ty>) -> Self {
                TensorValue::$variant(value)
            }
        }

        impl TryFrom<&TensorValue> for Tensor<$ty> {
            type Error = anyhow::Error;

            fn try_from(value: &TensorValue) -> Result<Self> {
                value.as_tensor::<$ty>()
            }
        }
    };
}

impl_tensor_element!(f32, F32);
impl_tensor_element!(f64, F64);
impl_tensor_element!(i32, I32);
impl_tensor_element!(i64, I64);
impl_tensor_element!(bool, Bool);

/// Dynamically typed tensor routed through the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorValue {
    F32(Tensor<f32>),
    F64(Tensor<f64>),
    I32(Tensor<i32>),
    I64(Tensor<i64>),
    Bool(Tensor<bool>),
}

impl TensorValue {
    pub fn dtype(&self) -> DType {
        match self {
            TensorValue::F32(_) => DType::F32,
            TensorValue::F64(_) => DType::F64,
            TensorValue::I32(_) => DType::I32,
            TensorValue::I64(_) => DType::I64,
            TensorValue::Bool(_) => DType::Bool,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            TensorValue::F32(t) => t.shape(),
            TensorValue::F64(t) => t.shape(),
            TensorValue::I32(t) => t.shape(),
            TensorValue::I64(t) => t.shape(),
            TensorValue::Bool(t) => t.shape(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorValue::F32(t) => t.len(),
            TensorValue::F64(t) => t.len(),
            TensorValue::I32(t) => t.len(),
            TensorValue::I64(t) => t.len(),
            TensorValue::Bool(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn zeros(dtype: DType, shape: &[usize]) -> Self {
        match dtype {
            DType::F32 => TensorValue::F32(Tensor::filled(0.0, shape)),
            DType::F64 => TensorValue::F64(Tensor::filled(0.0, shape)),
            DType::I32 => TensorValue::I32(Tensor::filled(0, shape)),
            DType::I64 => TensorValue::I64(Tensor::filled(0, shape)),
            DType::Bool => TensorValue::Bool(Tensor::filled(false, shape)),
        }
    }

    /// Typed view of this value, when the element type matches.
    pub fn as_tensor<T: TensorElement>(&self) -> Result<Tensor<T>> {
        T::from_value(self).ok_or_else(|| {
            anyhow!(
                "expected {} tensor, got {}",
                T::DTYPE.as_str(),
                self.dtype().as_str()
            )
        })
    }

    pub fn scalar<T: TensorElement>(value: T) -> Self {
        T::into_value(Tensor::from_scalar(value))
    }
}

impl fmt::Display for TensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims = self
            .shape()
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}[{}]", self.dtype(), dims)
    }
}

pub fn tensor_to_i64(value: &TensorValue) -> Result<i64> {
    if value.len() != 1 {
        return Err(anyhow!("expected scalar value, got {}", value));
    }
    match value {
        TensorValue::I32(t) => Ok(t.data[0] as i64),
        TensorValue::I64(t) => Ok(t.data[0]),
        TensorValue::Bool(t) => Ok(if t.data[0] { 1 } else { 0 }),
        TensorValue::F32(t) => Ok(t.data[0] as i64),
        TensorValue::F64(t) => Ok(t.data[0] as i64),
    }
}

pub fn tensor_to_bool(value: &TensorValue) -> Result<bool> {
    if value.len() != 1 {
        return Err(anyhow!("expected scalar value, got {}", value));
    }
    match value {
        TensorValue::Bool(t) => Ok(t.data[0]),
        TensorValue::I32(t) => Ok(t.data[0] != 0),
        TensorValue::I64(t) => Ok(t.data[0] != 0),
        TensorValue::F32(t) => Ok(t.data[0] != 0.0),
        TensorValue::F64(t) => Ok(t.data[0] != 0.0),
    }
}
