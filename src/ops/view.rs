//! View-producing operations: reshape, transpose and explicit materialization.

use super::record;
use crate::error::Error;
use crate::graph::OpType;
use crate::layout::{self, Layout};
use crate::tensor::Tensor;
use std::rc::Rc;

/// Reinterprets `t` under `shape` (same element count, row-major order).
///
/// Contiguous inputs get a zero-copy view over the same storage. Anything else (for
/// example a transposed view) is first copied into a fresh contiguous buffer on the
/// same device. Either way the result's logical elements equal those of `t`.
///
/// Backward reshapes the incoming gradient back to `t`'s shape.
///
/// # Errors
/// `ShapeMismatch` when the element counts differ; `UnsupportedRank` when the device
/// cannot hold a tensor of the new rank.
pub fn reshape(t: &Tensor, shape: &[usize]) -> Result<Tensor, Error> {
    if layout::numel(shape) != t.numel() {
        return Err(Error::ShapeMismatch {
            expected: t.dims(),
            actual: shape.to_vec(),
        });
    }
    t.storage().check_rank(shape.len())?;

    let (storage, layout) = if t.is_contiguous() {
        (Rc::clone(t.storage()), t.layout().reshaped(shape)?)
    } else {
        debug_println!(
            "reshape {:?} -> {:?}: materializing non-contiguous input (strides {:?})",
            t.shape(),
            shape,
            t.strides()
        );
        (t.storage().gather(t.layout())?, Layout::contiguous(shape))
    };

    let input_shape = t.dims();
    Ok(record(
        OpType::Reshape {
            input_shape: input_shape.clone(),
        },
        &[t],
        storage,
        layout,
        move |grad| Ok(vec![Some(reshape(grad, &input_shape)?)]),
    ))
}

/// [`reshape`] with at most one dimension given as `-1`, inferred from the element count.
pub fn reshape_infer(t: &Tensor, shape: &[isize]) -> Result<Tensor, Error> {
    let shape = layout::infer_shape(shape, t.numel())?;
    reshape(t, &shape)
}

/// Swaps dimensions `dim0` and `dim1`. Always a zero-copy view; the result is usually
/// non-contiguous. Transposing a dimension with itself yields an unchanged view.
///
/// Backward applies the same transpose to the incoming gradient.
pub fn transpose(t: &Tensor, dim0: usize, dim1: usize) -> Result<Tensor, Error> {
    let layout = t.layout().transposed(dim0, dim1)?;
    Ok(record(
        OpType::Transpose { dim0, dim1 },
        &[t],
        Rc::clone(t.storage()),
        layout,
        move |grad| Ok(vec![Some(transpose(grad, dim0, dim1)?)]),
    ))
}

/// Returns a tensor with canonical row-major strides, copying only when `t` is not
/// already laid out that way. Gradient passes through unchanged.
pub fn contiguous(t: &Tensor) -> Result<Tensor, Error> {
    let (storage, layout) = if t.is_contiguous() {
        (Rc::clone(t.storage()), t.layout().clone())
    } else {
        (t.storage().gather(t.layout())?, Layout::contiguous(t.shape()))
    };
    Ok(record(OpType::Contiguous, &[t], storage, layout, |grad| {
        Ok(vec![Some(grad.clone())])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(shape: &[usize], requires_grad: bool) -> Tensor {
        let n = layout::numel(shape);
        Tensor::from_vec((0..n).map(|v| v as f32).collect(), shape, requires_grad).unwrap()
    }

    #[test]
    fn reshape_of_contiguous_is_a_view() {
        let x = iota(&[5, 10], false);
        let y = reshape(&x, &[2, 25]).unwrap();
        assert!(y.shares_storage_with(&x));
        assert_eq!(y.to_vec().unwrap(), x.to_vec().unwrap());
    }

    #[test]
    fn reshape_of_transposed_copies() {
        let x = iota(&[2, 3], false);
        let t = transpose(&x, 0, 1).unwrap();
        let r = reshape(&t, &[6]).unwrap();
        assert!(!r.shares_storage_with(&x));
        assert!(r.is_contiguous());
        assert_eq!(r.to_vec().unwrap(), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn reshape_rejects_wrong_count() {
        let x = iota(&[5, 10], false);
        match reshape(&x, &[7, 7]) {
            Err(Error::ShapeMismatch { expected, actual }) => {
                assert_eq!(expected, vec![5, 10]);
                assert_eq!(actual, vec![7, 7]);
            }
            other => panic!("expected ShapeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn reshape_infer_fills_placeholder() {
        let x = iota(&[10, 10], false);
        assert_eq!(reshape_infer(&x, &[-1, 2, 5]).unwrap().dims(), vec![10, 2, 5]);
    }

    #[test]
    fn transpose_records_dims() {
        let x = iota(&[2, 3, 4], true);
        let t = transpose(&x, 0, 2).unwrap();
        assert_eq!(t.dims(), vec![4, 3, 2]);
        assert_eq!(t.op_type(), Some(OpType::Transpose { dim0: 0, dim1: 2 }));
        assert!(!t.is_leaf());
    }

    #[test]
    fn contiguous_copies_only_when_needed() {
        let x = iota(&[3, 4], false);
        assert!(contiguous(&x).unwrap().shares_storage_with(&x));
        let t = transpose(&x, 0, 1).unwrap();
        let c = contiguous(&t).unwrap();
        assert!(!c.shares_storage_with(&x));
        assert_eq!(c.to_vec().unwrap(), t.to_vec().unwrap());
    }
}
