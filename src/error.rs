#[cfg(feature = "cuda")]
use cust;
use crate::device::Device;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Incompatible shapes for operation {op}: {shape_a:?} and {shape_b:?}")]
    IncompatibleShapes {
        op: String,
        shape_a: Vec<usize>,
        shape_b: Vec<usize>,
    },

    #[error("Dimension out of range: dim {dim} for tensor of rank {rank}")]
    DimensionOutOfRange { dim: usize, rank: usize },

    #[error("backward() requires a single-element root, got shape {shape:?}")]
    InvalidBackwardTarget { shape: Vec<usize> },

    #[error("Device mismatch in {op}: {lhs} vs {rhs}")]
    DeviceMismatch {
        op: String,
        lhs: Device,
        rhs: Device,
    },

    #[error("Rank {rank} exceeds the maximum rank {max_rank} supported on {device}")]
    UnsupportedRank {
        device: Device,
        rank: usize,
        max_rank: usize,
    },

    #[error("Device {0} is not available in this build")]
    DeviceUnavailable(Device),

    #[error("Tensor {tensor_id} shares storage captured by the autograd graph; in-place writes are rejected")]
    MutationAfterCapture { tensor_id: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    CudaError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Error during tensor initialization")]
    InitializationError,

    #[error("Internal logic error: {0}")]
    InternalLogicError(String),

    #[error("Gradient check error: analytical={analytical:?}, numerical={numerical:?}, max_rel_error={max_rel_error}, max_abs_error={max_abs_error}, at_index={at_index}")]
    GradientCheckError {
        analytical: Vec<f32>,
        numerical: Vec<f32>,
        max_rel_error: f32,
        max_abs_error: f32,
        at_index: usize,
    },
}

#[cfg(feature = "cuda")]
impl From<cust::error::CudaError> for Error {
    fn from(err: cust::error::CudaError) -> Self {
        Error::CudaError(err.to_string())
    }
}
