use std::sync::Arc;

use crate::tensor::{DType, TensorValue};

use super::types::OpId;

/// How a variable obtains its value.
#[derive(Debug, Clone)]
pub enum VarKind {
    /// Supplied by the caller; `None` dimensions accept any size.
    Placeholder {
        dtype: DType,
        shape: Vec<Option<usize>>,
    },
    Constant { value: Arc<TensorValue> },
    Computed { producer: OpId, output_index: usize },
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub kind: VarKind,
}

impl VarDecl {
    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, VarKind::Placeholder { .. })
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, VarKind::Constant { .. })
    }

    pub fn producer(&self) -> Option<(OpId, usize)> {
        match self.kind {
            VarKind::Computed {
                producer,
                output_index,
            } => Some((producer, output_index)),
            _ => None,
        }
    }

    pub fn check_binding(&self, value: &TensorValue) -> std::result::Result<(), String> {
        let VarKind::Placeholder { dtype, shape } = &self.kind else {
            return Ok(());
        };
        if value.dtype() != *dtype {
            return Err(format!(
                "expected dtype {}, got {}",
                dtype,
                value.dtype()
            ));
        }
        let actual = value.shape();
        if actual.len() != shape.len() {
            return Err(format!(
                "expected rank {}, got shape {:?}",
                shape.len(),
                actual
            ));
        }
        for (axis, (declared, got)) in shape.iter().zip(actual.iter()).enumerate() {
            if let Some(declared) = declared {
                if declared != got {
                    return Err(format!(
                        "dimension {} expected {}, got {}",
                        axis, declared, got
                    ));
                }
            }
        }
        Ok(())
    }
}
