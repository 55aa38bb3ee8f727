mod shape;
mod tensor;
mod value;

pub use shape::{compute_strides, numel};
pub use tensor::{Tensor, TensorOptions};
pub use value::{tensor_to_bool, tensor_to_i64, DType, TensorElement, TensorValue};
