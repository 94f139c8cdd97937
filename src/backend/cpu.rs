//! CPU backend implementation using `ndarray`.

use crate::array::Array; // The storage type for this backend
use crate::backend::{binary_len, Backend};
use crate::device::Device;
use crate::error::Error;
use crate::layout::Layout;
use ndarray::Zip;
use rand::Rng;
use rand_distr::{Normal, Uniform};

/// Marker struct for the CPU backend.
/// Implements the `Backend` trait using `ndarray` operations via the `Array` wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuBackend;

fn ensure_cpu(device: Device) -> Result<(), Error> {
    match device {
        Device::Cpu => Ok(()),
        other => Err(Error::InternalLogicError(format!(
            "CpuBackend asked to allocate on {}",
            other
        ))),
    }
}

fn binary_op(op: &str, a: &Array, b: &Array, f: impl Fn(f32, f32) -> f32) -> Result<Array, Error> {
    let len = binary_len(op, a.len(), b.len())?;
    if a.len() == b.len() {
        let mut out = Array::zeros(len);
        Zip::from(&mut out.data)
            .and(&a.data)
            .and(&b.data)
            .for_each(|o, &x, &y| *o = f(x, y));
        Ok(out)
    } else if b.len() == 1 {
        let y = b.data[0];
        Ok(Array::new(a.data.mapv(|x| f(x, y))))
    } else {
        let x = a.data[0];
        Ok(Array::new(b.data.mapv(|y| f(x, y))))
    }
}

impl Backend for CpuBackend {
    type Storage = Array; // The storage type is our Array struct

    const MAX_RANK: Option<usize> = None;

    // --- Factory Methods ---
    fn zeros(len: usize, device: Device) -> Result<Self::Storage, Error> {
        ensure_cpu(device)?;
        Ok(Array::zeros(len))
    }

    fn full(len: usize, value: f32, device: Device) -> Result<Self::Storage, Error> {
        ensure_cpu(device)?;
        Ok(Array::full(len, value))
    }

    fn from_vec(data: Vec<f32>, device: Device) -> Result<Self::Storage, Error> {
        ensure_cpu(device)?;
        Ok(Array::from_vec(data))
    }

    fn random_uniform(len: usize, low: f32, high: f32, device: Device) -> Result<Self::Storage, Error> {
        ensure_cpu(device)?;
        if len == 0 {
            return Ok(Array::zeros(0));
        }
        let dist = Uniform::new(low, high).map_err(|_| Error::InitializationError)?;
        let mut rng = rand::rng();
        let mut data = Vec::with_capacity(len);
        for _ in 0..len {
            data.push(rng.sample(dist));
        }
        Ok(Array::from_vec(data))
    }

    fn random_normal(
        len: usize,
        mean: f32,
        std_dev: f32,
        device: Device,
    ) -> Result<Self::Storage, Error> {
        ensure_cpu(device)?;
        if len == 0 {
            return Ok(Array::zeros(0));
        }

        let dist = Normal::new(mean, std_dev).map_err(|_| Error::InitializationError)?;

        let mut rng = rand::rng();
        let mut data = Vec::with_capacity(len);
        for _ in 0..len {
            data.push(rng.sample(dist));
        }

        Ok(Array::from_vec(data))
    }

    fn device(_storage: &Self::Storage) -> Device {
        Device::Cpu
    }

    fn len(storage: &Self::Storage) -> usize {
        storage.len()
    }

    fn copy_to_host(storage: &Self::Storage) -> Result<Vec<f32>, Error> {
        Ok(storage.as_slice().to_vec())
    }

    fn update_from_host(storage: &mut Self::Storage, data: &[f32]) -> Result<(), Error> {
        if storage.len() != data.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![storage.len()],
                actual: vec![data.len()],
            });
        }
        let slice = storage.as_slice_mut().ok_or_else(|| {
            Error::InternalLogicError("host buffer is not in standard order".to_string())
        })?;
        slice.copy_from_slice(data);
        Ok(())
    }

    fn strided_copy(storage: &Self::Storage, layout: &Layout) -> Result<Self::Storage, Error> {
        storage.gather(layout)
    }

    fn mul(a: &Self::Storage, b: &Self::Storage) -> Result<Self::Storage, Error> {
        binary_op("mul", a, b, |x, y| x * y)
    }

    fn add(a: &Self::Storage, b: &Self::Storage) -> Result<Self::Storage, Error> {
        binary_op("add", a, b, |x, y| x + y)
    }

    fn sum_all(x: &Self::Storage) -> Result<Self::Storage, Error> {
        Ok(Array::from_vec(vec![x.data.sum()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_copy_reads_logical_order() {
        // [[0, 1, 2], [3, 4, 5]] transposed -> [[0, 3], [1, 4], [2, 5]]
        let buf = Array::from_vec((0..6).map(|v| v as f32).collect());
        let layout = Layout::contiguous(&[2, 3]).transposed(0, 1).unwrap();
        let out = CpuBackend::strided_copy(&buf, &layout).unwrap();
        assert_eq!(out.as_slice(), &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn binary_ops_broadcast_single_element() {
        let a = Array::from_vec(vec![1.0, 2.0, 3.0]);
        let s = Array::from_vec(vec![2.0]);
        assert_eq!(CpuBackend::mul(&a, &s).unwrap().as_slice(), &[2.0, 4.0, 6.0]);
        assert_eq!(CpuBackend::add(&s, &a).unwrap().as_slice(), &[3.0, 4.0, 5.0]);
        let b = Array::from_vec(vec![1.0, 1.0]);
        assert!(matches!(
            CpuBackend::mul(&a, &b),
            Err(Error::IncompatibleShapes { .. })
        ));
    }

    #[test]
    fn sum_all_returns_single_element() {
        let a = Array::from_vec(vec![1.0, 2.0, 3.5]);
        assert_eq!(CpuBackend::sum_all(&a).unwrap().as_slice(), &[6.5]);
    }

    #[test]
    fn random_uniform_respects_bounds() {
        let a = CpuBackend::random_uniform(1000, -2.0, 3.0, Device::Cpu).unwrap();
        assert!(a.as_slice().iter().all(|&v| (-2.0..3.0).contains(&v)));
    }

    #[test]
    fn refuses_accelerator_allocation() {
        assert!(CpuBackend::zeros(4, Device::Cuda(0)).is_err());
    }
}
