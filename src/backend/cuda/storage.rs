use crate::error::Error;
use cust::memory::{CopyDestination, DeviceBuffer, DevicePointer};
use std::fmt;

/// Flat `f32` buffer in device memory.
///
/// The allocation always holds at least one element so empty tensors still get a
/// valid device pointer; `len` is the logical element count.
pub struct CudaStorage {
    data: DeviceBuffer<f32>,
    len: usize,
    ordinal: u32,
}

impl fmt::Debug for CudaStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CudaStorage")
            .field("ordinal", &self.ordinal)
            .field("len", &self.len)
            .finish()
    }
}

impl CudaStorage {
    /// Allocates `len` elements with unspecified contents. Callers must fully overwrite them.
    pub(crate) fn uninitialized(len: usize, ordinal: u32) -> Result<Self, Error> {
        debug_println!("[CudaStorage::uninitialized] len {} on cuda:{}", len, ordinal);
        let data = unsafe { DeviceBuffer::<f32>::uninitialized(len.max(1)) }?;
        Ok(Self { data, len, ordinal })
    }

    pub fn zeros(len: usize, ordinal: u32) -> Result<Self, Error> {
        let data = DeviceBuffer::<f32>::zeroed(len.max(1))?;
        Ok(Self { data, len, ordinal })
    }

    pub fn from_slice(host: &[f32], ordinal: u32) -> Result<Self, Error> {
        let mut storage = Self::uninitialized(host.len(), ordinal)?;
        storage.copy_from_slice(host)?;
        Ok(storage)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn as_ptr(&self) -> DevicePointer<f32> {
        self.data.as_device_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> DevicePointer<f32> {
        self.data.as_device_ptr()
    }

    pub fn copy_from_slice(&mut self, data: &[f32]) -> Result<(), Error> {
        if data.len() != self.len {
            return Err(Error::ShapeMismatch {
                expected: vec![self.len],
                actual: vec![data.len()],
            });
        }
        if !data.is_empty() {
            self.data.index(0..data.len()).copy_from(data)?;
        }
        Ok(())
    }

    /// Blocking device-to-host copy of the logical elements.
    pub fn to_vec(&self) -> Result<Vec<f32>, Error> {
        let mut host_data = vec![0.0f32; self.len];
        if self.len > 0 {
            self.data.index(0..self.len).copy_to(&mut host_data[..])?;
        }
        Ok(host_data)
    }
}
