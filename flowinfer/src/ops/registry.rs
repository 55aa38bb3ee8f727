use std::collections::HashMap;

use anyhow::Result;
use once_cell::sync::Lazy;

use crate::graph::OpAttrs;
use crate::tensor::TensorValue;

use super::cpu::{arithmetic, compare, matmul};

pub type HostKernel =
    Box<dyn Fn(&OpAttrs, &[&TensorValue]) -> Result<Vec<TensorValue>> + Send + Sync>;

static CPU_KERNELS: Lazy<HashMap<&'static str, HostKernel>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, HostKernel> = HashMap::new();
    map.insert("add", Box::new(arithmetic::add));
    map.insert("sub", Box::new(arithmetic::sub));
    map.insert("mul", Box::new(arithmetic::mul));
    map.insert("div", Box::new(arithmetic::div));
    map.insert("neg", Box::new(arithmetic::neg));
    map.insert("identity", Box::new(arithmetic::identity));
    map.insert("matmul", Box::new(matmul::matmul));
    map.insert("mmul", Box::new(matmul::matmul));
    map.insert("less", Box::new(compare::less));
    map.insert("less_equal", Box::new(compare::less_equal));
    map.insert("greater", Box::new(compare::greater));
    map.insert("greater_equal", Box::new(compare::greater_equal));
    map.insert("equal", Box::new(compare::equal));
    map
});

pub fn lookup_kernel(op_type: &str) -> Option<&'static HostKernel> {
    CPU_KERNELS.get(op_type)
}

pub fn kernel_names() -> Vec<&'static str> {
    let mut names: Vec<_> = CPU_KERNELS.keys().copied().collect();
    names.sort_unstable();
    names
}
