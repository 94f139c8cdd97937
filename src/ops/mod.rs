//! Tensor operations. Each forward function computes its result through the storage
//! layer and, when any input requires gradients, records a graph node carrying the
//! matching backward rule.

use crate::config::TensorOptions;
use crate::error::Error;
use crate::graph::{Op, OpType};
use crate::layout::Layout;
use crate::storage::Storage;
use crate::tensor::Tensor;
use std::rc::Rc;

mod elementwise;
mod random;
mod view;

pub use elementwise::{add, mul};
pub use random::{rand, random, random_normal, random_uniform};
pub use view::{contiguous, reshape, reshape_infer, transpose};

/// Wraps a forward result. Records an [`Op`] over `inputs` when any of them requires
/// gradients, capturing their storage so it cannot be written in place while the node lives.
pub(crate) fn record(
    op_type: OpType,
    inputs: &[&Tensor],
    storage: Rc<Storage>,
    layout: Layout,
    backward_fn: impl Fn(&Tensor) -> Result<Vec<Option<Tensor>>, Error> + 'static,
) -> Tensor {
    if !inputs.iter().any(|t| t.requires_grad()) {
        return Tensor::from_parts(storage, layout, false);
    }

    debug_println!(
        "record {} over inputs {:?} -> shape {:?}",
        op_type,
        inputs.iter().map(|t| t.id()).collect::<Vec<_>>(),
        layout.shape()
    );
    let metas = inputs.iter().map(|t| t.autograd().cloned()).collect();
    let captures = inputs.iter().map(|t| t.storage().capture()).collect();
    Tensor::from_op(storage, layout, Op::new(op_type, metas, captures, backward_fn))
}

/// A storage holding exactly `t`'s elements in logical order, starting at 0.
/// Reuses `t`'s buffer when it already is one.
pub(crate) fn dense(t: &Tensor) -> Result<Rc<Storage>, Error> {
    let layout = t.layout();
    if layout.is_contiguous() && layout.offset() == 0 && t.storage().len() == layout.numel() {
        Ok(Rc::clone(t.storage()))
    } else {
        t.storage().gather(layout)
    }
}

/// Sums every element into a rank-0 tensor.
///
/// Backward broadcasts the incoming scalar gradient back to the input's shape.
pub fn sum(t: &Tensor) -> Result<Tensor, Error> {
    let storage = dense(t)?.sum_all()?;
    let input_shape = t.dims();
    let device = t.device();
    Ok(record(
        OpType::Sum,
        &[t],
        storage,
        Layout::contiguous(&[]),
        move |grad| {
            let ones = Tensor::ones(&input_shape, TensorOptions::default().on(device))?;
            Ok(vec![Some(mul(&ones, grad)?)])
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_is_rank_zero() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2], false).unwrap();
        let s = sum(&t).unwrap();
        assert!(s.shape().is_empty());
        assert_eq!(s.item().unwrap(), 10.0);
        assert!(s.op_type().is_none());
    }

    #[test]
    fn sum_backward_is_ones() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3], true).unwrap();
        let s = sum(&t).unwrap();
        assert_eq!(s.op_type(), Some(OpType::Sum));
        s.backward().unwrap();
        assert_eq!(t.grad().unwrap().to_vec().unwrap(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn sum_of_transposed_view_reads_logical_elements() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], false).unwrap();
        let v = t.transpose(0, 1).unwrap();
        assert_eq!(sum(&v).unwrap().item().unwrap(), 21.0);
    }

    #[test]
    fn recording_captures_and_releases_storage() {
        let x = Tensor::from_vec(vec![1.0, 2.0], &[2], true).unwrap();
        let s = sum(&x).unwrap();
        assert!(x.storage().is_captured());
        drop(s);
        assert!(!x.storage().is_captured());
    }
}
