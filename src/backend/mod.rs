//! Backend trait definition and module structure.
//!
//! A backend owns one kind of flat element buffer and the kernels that run over it.
//! Kernels never see tensors or the autograd graph: they take contiguous buffers
//! (plus a [`Layout`] for the one strided kernel) and return fresh buffers.

use crate::device::Device;
use crate::error::Error;
use crate::layout::Layout;
use std::fmt::Debug;

pub mod cpu;
#[cfg(feature = "cuda")]
pub mod cuda;

pub trait Backend: Sized + Debug + Clone {
    type Storage: Debug;

    /// Highest rank the strided kernels accept. `None` means unbounded.
    const MAX_RANK: Option<usize>;

    // --- Factory Methods (Creating Storage) ---

    /// Creates new storage filled with zeros.
    fn zeros(len: usize, device: Device) -> Result<Self::Storage, Error>;
    /// Creates new storage filled with `value`.
    fn full(len: usize, value: f32, device: Device) -> Result<Self::Storage, Error>;
    /// Creates new storage from host elements.
    fn from_vec(data: Vec<f32>, device: Device) -> Result<Self::Storage, Error>;

    // --- Random Generation Methods ---
    /// Creates new storage filled with values from a uniform distribution U(low, high).
    fn random_uniform(len: usize, low: f32, high: f32, device: Device) -> Result<Self::Storage, Error>;

    /// Creates new storage filled with values from a normal distribution N(mean, std_dev^2).
    fn random_normal(len: usize, mean: f32, std_dev: f32, device: Device)
        -> Result<Self::Storage, Error>;

    // --- Data Access ---

    /// Returns the device of the storage.
    fn device(storage: &Self::Storage) -> Device;
    /// Returns the number of elements in the buffer.
    fn len(storage: &Self::Storage) -> usize;

    /// Copies data from device storage to a host vector, in storage order.
    /// Blocks until all pending work on the buffer has finished.
    fn copy_to_host(storage: &Self::Storage) -> Result<Vec<f32>, Error>;

    /// Overwrites the buffer from a host slice of the same length.
    fn update_from_host(storage: &mut Self::Storage, data: &[f32]) -> Result<(), Error>;

    // --- Kernels ---

    /// Gathers the elements addressed by `layout` into a new contiguous buffer,
    /// in logical (row-major) order.
    fn strided_copy(storage: &Self::Storage, layout: &Layout) -> Result<Self::Storage, Error>;

    /// Element-wise multiplication. Operands have equal length, or one has length 1.
    fn mul(a: &Self::Storage, b: &Self::Storage) -> Result<Self::Storage, Error>;
    /// Element-wise addition. Operands have equal length, or one has length 1.
    fn add(a: &Self::Storage, b: &Self::Storage) -> Result<Self::Storage, Error>;
    /// Sums all elements into a length-1 buffer (stays on the device).
    fn sum_all(x: &Self::Storage) -> Result<Self::Storage, Error>;
}

/// Output length of a binary kernel under single-element broadcasting.
pub(crate) fn binary_len(op: &str, a_len: usize, b_len: usize) -> Result<usize, Error> {
    if a_len == b_len || b_len == 1 {
        Ok(a_len)
    } else if a_len == 1 {
        Ok(b_len)
    } else {
        Err(Error::IncompatibleShapes {
            op: op.to_string(),
            shape_a: vec![a_len],
            shape_b: vec![b_len],
        })
    }
}

/// Highest rank the CUDA strided kernels accept; see `kernels/strided.cu`.
pub const CUDA_MAX_RANK: usize = 6;

/// Fails with `UnsupportedRank` when `rank` exceeds `max_rank`.
pub fn check_rank_limit(device: Device, rank: usize, max_rank: Option<usize>) -> Result<(), Error> {
    match max_rank {
        Some(max_rank) if rank > max_rank => Err(Error::UnsupportedRank {
            device,
            rank,
            max_rank,
        }),
        _ => Ok(()),
    }
}

/// Rejects ranks above the backend's kernel ceiling.
pub(crate) fn check_rank<B: Backend>(device: Device, rank: usize) -> Result<(), Error> {
    check_rank_limit(device, rank, B::MAX_RANK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_ceiling() {
        assert!(check_rank_limit(Device::Cuda(0), CUDA_MAX_RANK, Some(CUDA_MAX_RANK)).is_ok());
        assert!(matches!(
            check_rank_limit(Device::Cuda(0), CUDA_MAX_RANK + 1, Some(CUDA_MAX_RANK)),
            Err(Error::UnsupportedRank { rank: 7, max_rank: 6, .. })
        ));
        assert!(check_rank::<cpu::CpuBackend>(Device::Cpu, 32).is_ok());
    }

    #[test]
    fn single_element_broadcast_len() {
        assert_eq!(binary_len("mul", 5, 5).unwrap(), 5);
        assert_eq!(binary_len("mul", 1, 5).unwrap(), 5);
        assert_eq!(binary_len("mul", 5, 1).unwrap(), 5);
        assert_eq!(binary_len("mul", 0, 1).unwrap(), 0);
        assert!(binary_len("mul", 2, 3).is_err());
    }
}
