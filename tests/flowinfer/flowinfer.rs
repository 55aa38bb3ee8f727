#[path = "common/mod.rs"]
mod common;

#[path = "tensor/tensor_basic.rs"]
mod tensor_basic;

#[path = "ops/ops_cpu.rs"]
mod ops_cpu;

#[path = "graph/graph_build.rs"]
mod graph_build;

#[path = "session/session_simple.rs"]
mod session_simple;
#[path = "session/session_branch.rs"]
mod session_branch;
#[path = "session/session_loop.rs"]
mod session_loop;
#[path = "session/session_errors.rs"]
mod session_errors;
#[path = "session/session_observe.rs"]
mod session_observe;
