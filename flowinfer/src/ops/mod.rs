pub mod cpu;
mod registry;

pub use registry::{kernel_names, lookup_kernel, HostKernel};
