mod model;
mod node;
mod types;
mod validation;
mod var;

pub use model::Graph;
pub use node::describe_op;
pub use types::{AttrValue, Input, OpAttr, OpAttrs, OpId, OpKind, OpTag, Operation, VarId};
pub use var::{VarDecl, VarKind};
