//! CUDA backend implementation using `cust` kernel launches.
//!
//! Every launch is followed by a stream synchronize, so a returned buffer is always
//! fully written; `copy_to_host` synchronizes once more before reading.

use super::context::context_for;
use super::storage::CudaStorage;
use super::utils::{grid_for, StridedLayout, BLOCK_SIZE};
use crate::backend::cpu::CpuBackend;
use crate::backend::{binary_len, Backend, CUDA_MAX_RANK};
use crate::device::Device;
use crate::error::Error;
use crate::layout::Layout;

use cust::launch;

// --- CudaBackend Struct ---
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CudaBackend;

fn ordinal_of(device: Device) -> Result<u32, Error> {
    match device {
        Device::Cuda(ordinal) => Ok(ordinal),
        other => Err(Error::InternalLogicError(format!(
            "CudaBackend asked to allocate on {}",
            other
        ))),
    }
}

fn binary(op: &str, kernel_name: &str, a: &CudaStorage, b: &CudaStorage) -> Result<CudaStorage, Error> {
    if a.ordinal() != b.ordinal() {
        return Err(Error::DeviceMismatch {
            op: op.to_string(),
            lhs: Device::Cuda(a.ordinal()),
            rhs: Device::Cuda(b.ordinal()),
        });
    }
    let n = binary_len(op, a.len(), b.len())?;
    let ctx = context_for(Device::Cuda(a.ordinal()))?;
    let mut output = CudaStorage::uninitialized(n, a.ordinal())?;
    if n == 0 {
        return Ok(output);
    }

    let kernel = ctx.get_kernel(kernel_name)?;
    let stream = ctx.get_stream();
    unsafe {
        launch!(kernel<<<grid_for(n), BLOCK_SIZE, 0, stream>>>(
            a.as_ptr(),
            a.len() as i32,
            b.as_ptr(),
            b.len() as i32,
            output.as_mut_ptr(),
            n as i32
        ))?;
    }
    stream.synchronize()?;
    Ok(output)
}

impl Backend for CudaBackend {
    type Storage = CudaStorage;

    const MAX_RANK: Option<usize> = Some(CUDA_MAX_RANK);

    // --- Factory Methods ---
    fn zeros(len: usize, device: Device) -> Result<Self::Storage, Error> {
        context_for(device)?;
        CudaStorage::zeros(len, ordinal_of(device)?)
    }

    fn full(len: usize, value: f32, device: Device) -> Result<Self::Storage, Error> {
        let ctx = context_for(device)?;
        let mut output = CudaStorage::uninitialized(len, ordinal_of(device)?)?;
        if len == 0 {
            return Ok(output);
        }
        let kernel = ctx.get_kernel("fill_kernel")?;
        let stream = ctx.get_stream();
        unsafe {
            launch!(kernel<<<grid_for(len), BLOCK_SIZE, 0, stream>>>(
                output.as_mut_ptr(),
                value,
                len as i32
            ))?;
        }
        stream.synchronize()?;
        Ok(output)
    }

    fn from_vec(data: Vec<f32>, device: Device) -> Result<Self::Storage, Error> {
        context_for(device)?;
        CudaStorage::from_slice(&data, ordinal_of(device)?)
    }

    fn random_uniform(len: usize, low: f32, high: f32, device: Device) -> Result<Self::Storage, Error> {
        // Generate on CPU and copy to GPU
        let cpu_storage = CpuBackend::random_uniform(len, low, high, Device::Cpu)?;
        Self::from_vec(cpu_storage.into_raw_vec(), device)
    }

    fn random_normal(
        len: usize,
        mean: f32,
        std_dev: f32,
        device: Device,
    ) -> Result<Self::Storage, Error> {
        let cpu_storage = CpuBackend::random_normal(len, mean, std_dev, Device::Cpu)?;
        Self::from_vec(cpu_storage.into_raw_vec(), device)
    }

    fn device(storage: &Self::Storage) -> Device {
        Device::Cuda(storage.ordinal())
    }

    fn len(storage: &Self::Storage) -> usize {
        storage.len()
    }

    // --- GPU-Specific Data Movement Methods ---
    fn copy_to_host(storage: &Self::Storage) -> Result<Vec<f32>, Error> {
        let ctx = context_for(Self::device(storage))?;
        ctx.get_stream().synchronize()?;
        storage.to_vec()
    }

    fn update_from_host(storage: &mut Self::Storage, data: &[f32]) -> Result<(), Error> {
        let ctx = context_for(Self::device(storage))?;
        ctx.get_stream().synchronize()?;
        storage.copy_from_slice(data)
    }

    // --- Kernels ---
    fn strided_copy(storage: &Self::Storage, layout: &Layout) -> Result<Self::Storage, Error> {
        let device = Self::device(storage);
        let packed = StridedLayout::from_layout(layout, device)?;
        let n = layout.numel();
        let ctx = context_for(device)?;
        let mut output = CudaStorage::uninitialized(n, storage.ordinal())?;
        if n == 0 {
            return Ok(output);
        }

        let kernel = ctx.get_kernel("strided_copy_kernel")?;
        let stream = ctx.get_stream();
        unsafe {
            launch!(kernel<<<grid_for(n), BLOCK_SIZE, 0, stream>>>(
                storage.as_ptr(),
                output.as_mut_ptr(),
                packed,
                n as u64
            ))?;
        }
        stream.synchronize()?;
        Ok(output)
    }

    fn mul(a: &Self::Storage, b: &Self::Storage) -> Result<Self::Storage, Error> {
        binary("mul", "mul_kernel", a, b)
    }

    fn add(a: &Self::Storage, b: &Self::Storage) -> Result<Self::Storage, Error> {
        binary("add", "add_kernel", a, b)
    }

    fn sum_all(x: &Self::Storage) -> Result<Self::Storage, Error> {
        let ctx = context_for(Self::device(x))?;
        let mut output = CudaStorage::zeros(1, x.ordinal())?;
        let n = x.len();
        if n == 0 {
            return Ok(output);
        }

        let kernel = ctx.get_kernel("sum_reduction_kernel")?;
        let stream = ctx.get_stream();
        let grid_size = grid_for(n).min(1024);
        let shared_bytes = BLOCK_SIZE * std::mem::size_of::<f32>() as u32;
        unsafe {
            launch!(kernel<<<grid_size, BLOCK_SIZE, shared_bytes, stream>>>(
                x.as_ptr(),
                output.as_mut_ptr(),
                n as i32
            ))?;
        }
        stream.synchronize()?;
        Ok(output)
    }
}
