//! A strided tensor engine with reverse-mode automatic differentiation.
//!
//! This library provides:
//! - tensors as strided views over shared, reference-counted storage
//! - zero-copy `reshape` and `transpose`, with materialization only when a reshape
//!   cannot be expressed over the existing strides
//! - a recorded autograd graph and a backward engine that accumulates gradients
//!   into leaves (and into tensors that asked to retain them)
//! - CPU kernels on `ndarray`, and CUDA kernels behind the `cuda` feature
//!
//! # Features
//! - `cuda` - Enables the CUDA backend (requires the CUDA toolkit and `nvcc`)
//! - `debug_logs` - Prints graph construction and backward traversal diagnostics
//!
//! # Example
//! ```rust
//! use graphgrad::{Tensor, TensorOptions};
//!
//! fn main() -> Result<(), graphgrad::Error> {
//!     let x = Tensor::rand(&[5, 10], TensorOptions::default().requires_grad(true))?;
//!
//!     // A view: same storage, new shape
//!     let y = x.reshape(&[2, 25])?;
//!
//!     // Weight the view and reduce to a scalar
//!     let w = Tensor::rand(&y.dims(), TensorOptions::default())?;
//!     let loss = (&y * &w)?.sum()?;
//!     loss.backward()?;
//!
//!     // The gradient has x's shape: w reshaped back
//!     let grad = x.grad().expect("x is a leaf that requires grad");
//!     assert_eq!(grad.dims(), vec![5, 10]);
//!     assert_eq!(grad.to_vec()?, w.to_vec()?);
//!     Ok(())
//! }
//! ```

// --- Central debug_println macro definition ---
/// Conditional logging macro. Prints if 'debug_logs' feature is enabled.
#[cfg(feature = "debug_logs")]
#[macro_export]
macro_rules! debug_println {
    ($($arg:tt)*) => {
        ::std::println!("[DEBUG {}] {}", module_path!(), ::std::format_args!($($arg)*))
    };
}

/// Conditional logging macro (disabled version). Does nothing.
#[cfg(not(feature = "debug_logs"))]
#[macro_export]
macro_rules! debug_println {
    ($($arg:tt)*) => {};
}

// Declare the modules within the crate
pub mod array;
mod autograd;
pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod graph;
pub mod layout;
pub mod list;
pub mod ops;
pub mod storage;
pub mod tensor;

pub mod test_utils;

// Re-export the public types for easier use by consumers of the library
pub use array::Array;
pub use backend::cpu::CpuBackend;
#[cfg(feature = "cuda")]
pub use backend::cuda::CudaBackend;
pub use backend::{Backend, CUDA_MAX_RANK};
pub use config::{Distribution, RandomConfig, TensorOptions, DEVICE_ENV_VAR};
pub use device::Device;
pub use error::Error;
pub use graph::{Op, OpType};
pub use layout::Layout;
pub use list::NestedList;
pub use ops::{add, contiguous, mul, reshape, reshape_infer, sum, transpose};
pub use storage::Storage;
pub use tensor::Tensor;
