use crate::backend::CUDA_MAX_RANK;
use crate::device::Device;
use crate::error::Error;
use crate::layout::Layout;
use cust::memory::DeviceCopy;

pub(crate) const BLOCK_SIZE: u32 = 256;

/// Grid size covering `n` elements with [`BLOCK_SIZE`] threads per block.
pub(crate) fn grid_for(n: usize) -> u32 {
    n.div_ceil(BLOCK_SIZE as usize) as u32
}

/// Kernel-side view description, passed by value. Layout must match
/// `struct StridedLayout` in `kernels/strided.cu`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct StridedLayout {
    rank: u32,
    offset: u64,
    shape: [u64; CUDA_MAX_RANK],
    strides: [u64; CUDA_MAX_RANK],
}

unsafe impl DeviceCopy for StridedLayout {}

impl StridedLayout {
    pub(crate) fn from_layout(layout: &Layout, device: Device) -> Result<Self, Error> {
        let rank = layout.rank();
        if rank > CUDA_MAX_RANK {
            return Err(Error::UnsupportedRank {
                device,
                rank,
                max_rank: CUDA_MAX_RANK,
            });
        }
        let mut shape = [1u64; CUDA_MAX_RANK];
        let mut strides = [0u64; CUDA_MAX_RANK];
        for (d, (&size, &stride)) in layout.shape().iter().zip(layout.strides()).enumerate() {
            shape[d] = size as u64;
            strides[d] = stride as u64;
        }
        Ok(Self {
            rank: rank as u32,
            offset: layout.offset() as u64,
            shape,
            strides,
        })
    }
}
