//! Shape/stride bookkeeping for tensor views.
//!
//! A [`Layout`] maps a logical index to a storage position:
//! `offset + sum(index[i] * strides[i])`. All view operations (reshape, transpose) are
//! pure functions on layouts; no element is touched here.

use crate::error::Error;

/// Canonical row-major strides for `shape`. Scalars have no strides.
pub fn contiguous_strides(shape: &[usize]) -> Vec<usize> {
    if shape.is_empty() {
        return vec![];
    }

    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len() - 1).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Number of logical elements; a rank-0 shape holds one element.
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Layout {
    shape: Vec<usize>,
    strides: Vec<usize>,
    offset: usize,
}

impl Layout {
    /// Row-major layout starting at offset 0.
    pub fn contiguous(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            strides: contiguous_strides(shape),
            offset: 0,
        }
    }

    pub fn new(shape: Vec<usize>, strides: Vec<usize>, offset: usize) -> Result<Self, Error> {
        if shape.len() != strides.len() {
            return Err(Error::InternalLogicError(format!(
                "layout rank mismatch: shape {:?} vs strides {:?}",
                shape, strides
            )));
        }
        Ok(Self {
            shape,
            strides,
            offset,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        numel(&self.shape)
    }

    pub fn is_contiguous(&self) -> bool {
        self.strides == contiguous_strides(&self.shape)
    }

    /// Smallest storage length able to back this layout.
    pub fn required_storage_len(&self) -> usize {
        if self.numel() == 0 {
            return self.offset;
        }
        let span: usize = self
            .shape
            .iter()
            .zip(&self.strides)
            .map(|(&size, &stride)| (size - 1) * stride)
            .sum();
        self.offset + span + 1
    }

    /// Checks that every addressable element lies inside a storage of `storage_len`.
    pub fn validate_against(&self, storage_len: usize) -> Result<(), Error> {
        let required = self.required_storage_len();
        if required > storage_len {
            return Err(Error::InternalLogicError(format!(
                "layout {:?} addresses {} elements but storage holds {}",
                self, required, storage_len
            )));
        }
        Ok(())
    }

    /// Storage position of a logical index.
    pub fn storage_index(&self, index: &[usize]) -> Result<usize, Error> {
        if index.len() != self.rank() {
            return Err(Error::InvalidOperation(format!(
                "index {:?} has rank {}, tensor has rank {}",
                index,
                index.len(),
                self.rank()
            )));
        }
        let mut pos = self.offset;
        for (dim, ((&i, &size), &stride)) in index
            .iter()
            .zip(&self.shape)
            .zip(&self.strides)
            .enumerate()
        {
            if i >= size {
                return Err(Error::DimensionOutOfRange {
                    dim,
                    rank: self.rank(),
                });
            }
            pos += i * stride;
        }
        Ok(pos)
    }

    /// Storage positions of every element, in logical (row-major) order.
    pub fn positions(&self) -> Vec<usize> {
        let total = self.numel();
        let mut out = Vec::with_capacity(total);
        if total == 0 {
            return out;
        }
        let mut index = vec![0usize; self.rank()];
        let mut pos = self.offset;
        for _ in 0..total {
            out.push(pos);
            // odometer increment, last dim fastest
            for d in (0..self.rank()).rev() {
                index[d] += 1;
                pos += self.strides[d];
                if index[d] < self.shape[d] {
                    break;
                }
                pos -= index[d] * self.strides[d];
                index[d] = 0;
            }
        }
        out
    }

    /// Reinterprets a contiguous layout under `shape`, keeping the offset.
    /// Callers must materialize non-contiguous data first.
    pub fn reshaped(&self, shape: &[usize]) -> Result<Self, Error> {
        if numel(shape) != self.numel() {
            return Err(Error::ShapeMismatch {
                expected: self.shape.clone(),
                actual: shape.to_vec(),
            });
        }
        if !self.is_contiguous() {
            return Err(Error::InternalLogicError(format!(
                "zero-copy reshape of non-contiguous layout {:?}",
                self
            )));
        }
        Ok(Self {
            shape: shape.to_vec(),
            strides: contiguous_strides(shape),
            offset: self.offset,
        })
    }

    /// Swaps two shape/stride entries.
    pub fn transposed(&self, dim0: usize, dim1: usize) -> Result<Self, Error> {
        let rank = self.rank();
        for dim in [dim0, dim1] {
            if dim >= rank {
                return Err(Error::DimensionOutOfRange { dim, rank });
            }
        }
        let mut out = self.clone();
        out.shape.swap(dim0, dim1);
        out.strides.swap(dim0, dim1);
        Ok(out)
    }
}

/// Resolves a shape containing at most one `-1` placeholder against `numel`.
pub fn infer_shape(dims: &[isize], numel: usize) -> Result<Vec<usize>, Error> {
    let mut inferred = None;
    let mut known = 1usize;
    for (i, &d) in dims.iter().enumerate() {
        match d {
            -1 => {
                if inferred.replace(i).is_some() {
                    return Err(Error::InvalidOperation(
                        "only one dimension can be inferred".to_string(),
                    ));
                }
            }
            d if d < 0 => {
                return Err(Error::InvalidOperation(format!(
                    "invalid shape dimension {}",
                    d
                )))
            }
            d => known *= d as usize,
        }
    }

    let as_usize = |fill: usize| -> Vec<usize> {
        dims.iter()
            .map(|&d| if d == -1 { fill } else { d as usize })
            .collect()
    };

    match inferred {
        None => Ok(as_usize(0)),
        Some(_) => {
            if known == 0 || numel % known != 0 {
                return Err(Error::ShapeMismatch {
                    expected: vec![numel],
                    actual: as_usize(0),
                });
            }
            Ok(as_usize(numel / known))
        }
    }
}
