//! PTX for the CUDA kernels, compiled by `build.rs` and embedded at compile time.

pub const ELEMENTWISE_PTX: &str = include_str!(concat!(env!("OUT_DIR"), "/elementwise.ptx"));
pub const STRIDED_PTX: &str = include_str!(concat!(env!("OUT_DIR"), "/strided.ptx"));
pub const REDUCTION_PTX: &str = include_str!(concat!(env!("OUT_DIR"), "/reduction.ptx"));

/// Module name, PTX source and the kernels each module must export.
pub const MODULES: [(&str, &str, &[&str]); 3] = [
    (
        "elementwise",
        ELEMENTWISE_PTX,
        &["fill_kernel", "mul_kernel", "add_kernel"],
    ),
    ("strided", STRIDED_PTX, &["strided_copy_kernel"]),
    ("reduction", REDUCTION_PTX, &["sum_reduction_kernel"]),
];
