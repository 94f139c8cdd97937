use crate::error::Error;
use crate::layout::Layout;
use ndarray::{Array1, ArrayView, IxDyn, ShapeBuilder};
use std::fmt;

/// Flat host buffer backing CPU storage.
///
/// Holds elements in storage order only; logical shape lives in the tensor's
/// [`Layout`]. Strided reads go through [`Array::view`].
#[derive(Clone, PartialEq)]
pub struct Array {
    pub(crate) data: Array1<f32>,
}

impl Array {
    pub fn new(data: Array1<f32>) -> Self {
        Self { data }
    }

    pub fn from_vec(data: Vec<f32>) -> Self {
        Self {
            data: Array1::from_vec(data),
        }
    }

    pub fn zeros(len: usize) -> Self {
        Self {
            data: Array1::zeros(len),
        }
    }

    pub fn full(len: usize, value: f32) -> Self {
        Self {
            data: Array1::from_elem(len, value),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the array contains no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        // Array1 built by this type is always in standard order
        self.data.as_slice().unwrap_or(&[])
    }

    pub fn as_slice_mut(&mut self) -> Option<&mut [f32]> {
        self.data.as_slice_mut()
    }

    pub fn into_raw_vec(self) -> Vec<f32> {
        self.data.into_raw_vec_and_offset().0
    }

    /// Strided, zero-copy view of the elements addressed by `layout`.
    pub fn view(&self, layout: &Layout) -> Result<ArrayView<'_, f32, IxDyn>, Error> {
        layout.validate_against(self.len())?;
        if layout.numel() == 0 {
            // ndarray bounds-checks strides even when a dimension is zero.
            return ArrayView::from_shape(IxDyn(layout.shape()), &[]).map_err(|e| {
                Error::InternalLogicError(format!("empty view over host buffer failed: {}", e))
            });
        }
        let data = self.as_slice();
        let tail = data.get(layout.offset()..).unwrap_or(&[]);
        let shape = IxDyn(layout.shape()).strides(IxDyn(layout.strides()));
        ArrayView::from_shape(shape, tail).map_err(|e| {
            Error::InternalLogicError(format!("strided view over host buffer failed: {}", e))
        })
    }

    /// Copies the elements addressed by `layout` into a new buffer, in logical order.
    pub fn gather(&self, layout: &Layout) -> Result<Array, Error> {
        let view = self.view(layout)?;
        Ok(Array::new(view.iter().copied().collect()))
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: Vec<f32> = self.data.iter().take(8).copied().collect();
        f.debug_struct("Array")
            .field("len", &self.len())
            .field("head", &preview)
            .finish()
    }
}
