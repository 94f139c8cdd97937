//! Shared, device-tagged element buffers.
//!
//! A [`Storage`] is the only thing that owns elements. Tensors hold it through an `Rc`,
//! so any number of views can alias one buffer. Every kernel call goes through here and
//! is routed to the backend that matches the buffer's device tag.

use crate::array::Array;
use crate::backend::cpu::CpuBackend;
#[cfg(feature = "cuda")]
use crate::backend::cuda::{CudaBackend, CudaStorage};
use crate::backend::{self, Backend};
use crate::config::{Distribution, RandomConfig};
use crate::device::Device;
use crate::error::Error;
use crate::layout::Layout;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

#[derive(Debug)]
pub(crate) enum Buffer {
    Cpu(Array),
    #[cfg(feature = "cuda")]
    Cuda(CudaStorage),
}

pub struct Storage {
    buffer: RefCell<Buffer>,
    len: usize,
    device: Device,
    /// Number of live graph nodes that captured this buffer as an operand.
    captures: Cell<usize>,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("device", &self.device)
            .field("len", &self.len)
            .field("captures", &self.captures.get())
            .finish()
    }
}

/// Held by a graph node for each operand buffer; releases the capture on drop.
#[derive(Debug)]
pub(crate) struct CaptureToken {
    storage: Weak<Storage>,
}

impl Drop for CaptureToken {
    fn drop(&mut self) {
        if let Some(storage) = self.storage.upgrade() {
            storage.captures.set(storage.captures.get().saturating_sub(1));
        }
    }
}

#[cfg(not(feature = "cuda"))]
fn unavailable<T>(device: Device) -> Result<T, Error> {
    Err(Error::DeviceUnavailable(device))
}

/// Rank check for a device before any buffer exists on it.
pub fn check_device_rank(device: Device, rank: usize) -> Result<(), Error> {
    match device {
        Device::Cpu => backend::check_rank::<CpuBackend>(device, rank),
        #[cfg(feature = "cuda")]
        Device::Cuda(_) => backend::check_rank::<CudaBackend>(device, rank),
        #[cfg(not(feature = "cuda"))]
        Device::Cuda(_) => unavailable(device),
    }
}

fn wrap(buffer: Buffer, device: Device) -> Rc<Storage> {
    let len = match &buffer {
        Buffer::Cpu(a) => CpuBackend::len(a),
        #[cfg(feature = "cuda")]
        Buffer::Cuda(c) => CudaBackend::len(c),
    };
    Rc::new(Storage {
        buffer: RefCell::new(buffer),
        len,
        device,
        captures: Cell::new(0),
    })
}

impl Storage {
    pub fn from_vec(data: Vec<f32>, device: Device) -> Result<Rc<Self>, Error> {
        let buffer = match device {
            Device::Cpu => Buffer::Cpu(CpuBackend::from_vec(data, device)?),
            #[cfg(feature = "cuda")]
            Device::Cuda(_) => Buffer::Cuda(CudaBackend::from_vec(data, device)?),
            #[cfg(not(feature = "cuda"))]
            Device::Cuda(_) => return unavailable(device),
        };
        Ok(wrap(buffer, device))
    }

    pub fn full(len: usize, value: f32, device: Device) -> Result<Rc<Self>, Error> {
        let buffer = match device {
            Device::Cpu => Buffer::Cpu(CpuBackend::full(len, value, device)?),
            #[cfg(feature = "cuda")]
            Device::Cuda(_) => Buffer::Cuda(CudaBackend::full(len, value, device)?),
            #[cfg(not(feature = "cuda"))]
            Device::Cuda(_) => return unavailable(device),
        };
        Ok(wrap(buffer, device))
    }

    pub fn zeros(len: usize, device: Device) -> Result<Rc<Self>, Error> {
        let buffer = match device {
            Device::Cpu => Buffer::Cpu(CpuBackend::zeros(len, device)?),
            #[cfg(feature = "cuda")]
            Device::Cuda(_) => Buffer::Cuda(CudaBackend::zeros(len, device)?),
            #[cfg(not(feature = "cuda"))]
            Device::Cuda(_) => return unavailable(device),
        };
        Ok(wrap(buffer, device))
    }

    pub fn random(len: usize, config: &RandomConfig, device: Device) -> Result<Rc<Self>, Error> {
        config.validate()?;
        fn fill<B: Backend>(
            len: usize,
            distribution: Distribution,
            device: Device,
        ) -> Result<B::Storage, Error> {
            match distribution {
                Distribution::Uniform { low, high } => B::random_uniform(len, low, high, device),
                Distribution::Normal { mean, std_dev } => {
                    B::random_normal(len, mean, std_dev, device)
                }
            }
        }
        let buffer = match device {
            Device::Cpu => Buffer::Cpu(fill::<CpuBackend>(len, config.distribution, device)?),
            #[cfg(feature = "cuda")]
            Device::Cuda(_) => {
                Buffer::Cuda(fill::<CudaBackend>(len, config.distribution, device)?)
            }
            #[cfg(not(feature = "cuda"))]
            Device::Cuda(_) => return unavailable(device),
        };
        Ok(wrap(buffer, device))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn is_captured(&self) -> bool {
        self.captures.get() > 0
    }

    pub(crate) fn capture(self: &Rc<Self>) -> CaptureToken {
        self.captures.set(self.captures.get() + 1);
        CaptureToken {
            storage: Rc::downgrade(self),
        }
    }

    /// Fails with `UnsupportedRank` when this device's kernels cannot address `rank` dims.
    pub fn check_rank(&self, rank: usize) -> Result<(), Error> {
        check_device_rank(self.device, rank)
    }

    /// Copies the whole buffer to the host, in storage order.
    /// Waits for outstanding device work first.
    pub fn to_host(&self) -> Result<Vec<f32>, Error> {
        match &*self.buffer.borrow() {
            Buffer::Cpu(a) => CpuBackend::copy_to_host(a),
            #[cfg(feature = "cuda")]
            Buffer::Cuda(c) => CudaBackend::copy_to_host(c),
        }
    }

    /// Overwrites the buffer in place. Callers enforce the capture rule.
    pub(crate) fn write_from_host(&self, data: &[f32]) -> Result<(), Error> {
        match &mut *self.buffer.borrow_mut() {
            Buffer::Cpu(a) => CpuBackend::update_from_host(a, data),
            #[cfg(feature = "cuda")]
            Buffer::Cuda(c) => CudaBackend::update_from_host(c, data),
        }
    }

    /// Materializes the elements addressed by `layout` into a fresh contiguous buffer
    /// on the same device.
    pub fn gather(&self, layout: &Layout) -> Result<Rc<Self>, Error> {
        self.check_rank(layout.rank())?;
        layout.validate_against(self.len)?;
        debug_println!(
            "gather {:?} strides {:?} offset {} on {}",
            layout.shape(),
            layout.strides(),
            layout.offset(),
            self.device
        );
        let buffer = match &*self.buffer.borrow() {
            Buffer::Cpu(a) => Buffer::Cpu(CpuBackend::strided_copy(a, layout)?),
            #[cfg(feature = "cuda")]
            Buffer::Cuda(c) => Buffer::Cuda(CudaBackend::strided_copy(c, layout)?),
        };
        Ok(wrap(buffer, self.device))
    }

    pub fn mul(&self, other: &Self) -> Result<Rc<Self>, Error> {
        self.binary("mul", other, BinaryKind::Mul)
    }

    pub fn add(&self, other: &Self) -> Result<Rc<Self>, Error> {
        self.binary("add", other, BinaryKind::Add)
    }

    pub fn sum_all(&self) -> Result<Rc<Self>, Error> {
        let buffer = match &*self.buffer.borrow() {
            Buffer::Cpu(a) => Buffer::Cpu(CpuBackend::sum_all(a)?),
            #[cfg(feature = "cuda")]
            Buffer::Cuda(c) => Buffer::Cuda(CudaBackend::sum_all(c)?),
        };
        Ok(wrap(buffer, self.device))
    }

    fn binary(&self, op: &str, other: &Self, kind: BinaryKind) -> Result<Rc<Self>, Error> {
        if self.device != other.device {
            return Err(Error::DeviceMismatch {
                op: op.to_string(),
                lhs: self.device,
                rhs: other.device,
            });
        }
        let lhs = self.buffer.borrow();
        let rhs = other.buffer.borrow();
        let buffer = match (&*lhs, &*rhs) {
            (Buffer::Cpu(a), Buffer::Cpu(b)) => Buffer::Cpu(match kind {
                BinaryKind::Mul => CpuBackend::mul(a, b)?,
                BinaryKind::Add => CpuBackend::add(a, b)?,
            }),
            #[cfg(feature = "cuda")]
            (Buffer::Cuda(a), Buffer::Cuda(b)) => Buffer::Cuda(match kind {
                BinaryKind::Mul => CudaBackend::mul(a, b)?,
                BinaryKind::Add => CudaBackend::add(a, b)?,
            }),
            #[cfg(feature = "cuda")]
            _ => {
                return Err(Error::DeviceMismatch {
                    op: op.to_string(),
                    lhs: self.device,
                    rhs: other.device,
                })
            }
        };
        Ok(wrap(buffer, self.device))
    }
}

#[derive(Debug, Clone, Copy)]
enum BinaryKind {
    Mul,
    Add,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_token_releases_on_drop() {
        let s = Storage::from_vec(vec![1.0, 2.0], Device::Cpu).unwrap();
        assert!(!s.is_captured());
        let t1 = s.capture();
        let t2 = s.capture();
        assert!(s.is_captured());
        drop(t1);
        assert!(s.is_captured());
        drop(t2);
        assert!(!s.is_captured());
    }

    #[test]
    fn token_outliving_storage_is_harmless() {
        let s = Storage::from_vec(vec![1.0], Device::Cpu).unwrap();
        let token = s.capture();
        drop(s);
        drop(token);
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn accelerator_allocation_needs_feature() {
        assert!(matches!(
            Storage::zeros(4, Device::Cuda(0)),
            Err(Error::DeviceUnavailable(Device::Cuda(0)))
        ));
    }
}
