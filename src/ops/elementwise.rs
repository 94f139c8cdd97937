use super::{dense, record, sum};
use crate::error::Error;
use crate::graph::OpType;
use crate::layout::Layout;
use crate::tensor::Tensor;

fn check_devices(op: &str, a: &Tensor, b: &Tensor) -> Result<(), Error> {
    if a.device() != b.device() {
        return Err(Error::DeviceMismatch {
            op: op.to_string(),
            lhs: a.device(),
            rhs: b.device(),
        });
    }
    Ok(())
}

/// Output shape under single-element broadcasting: equal shapes pass through, and an
/// operand holding one element broadcasts against the other. When both hold one
/// element the higher-rank shape wins.
fn output_shape(op: &str, a: &Tensor, b: &Tensor) -> Result<Vec<usize>, Error> {
    if a.shape() == b.shape() {
        Ok(a.dims())
    } else if b.numel() == 1 && (a.numel() != 1 || a.rank() >= b.rank()) {
        Ok(a.dims())
    } else if a.numel() == 1 {
        Ok(b.dims())
    } else {
        Err(Error::IncompatibleShapes {
            op: op.to_string(),
            shape_a: a.dims(),
            shape_b: b.dims(),
        })
    }
}

/// Reduces a gradient computed at the broadcast output shape back to an operand's shape.
fn reduce_to(grad: Tensor, shape: &[usize]) -> Result<Tensor, Error> {
    if grad.shape() == shape {
        Ok(grad)
    } else {
        sum(&grad)?.reshape(shape)
    }
}

/// Element-wise product.
///
/// Backward: `grad_a = grad * b`, `grad_b = grad * a`, each summed back down when that
/// operand was broadcast.
pub fn mul(a: &Tensor, b: &Tensor) -> Result<Tensor, Error> {
    check_devices("mul", a, b)?;
    let shape = output_shape("mul", a, b)?;
    let rhs = dense(b)?;
    let storage = dense(a)?.mul(&rhs)?;

    let (a_saved, b_saved) = (a.detach(), b.detach());
    let (a_shape, b_shape) = (a.dims(), b.dims());
    let (a_needs, b_needs) = (a.requires_grad(), b.requires_grad());
    Ok(record(
        OpType::Mul,
        &[a, b],
        storage,
        Layout::contiguous(&shape),
        move |grad| {
            let grad_a = if a_needs {
                Some(reduce_to(mul(grad, &b_saved)?, &a_shape)?)
            } else {
                None
            };
            let grad_b = if b_needs {
                Some(reduce_to(mul(grad, &a_saved)?, &b_shape)?)
            } else {
                None
            };
            Ok(vec![grad_a, grad_b])
        },
    ))
}

/// Element-wise sum. Gradient passes through to both operands (summed when broadcast).
pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor, Error> {
    check_devices("add", a, b)?;
    let shape = output_shape("add", a, b)?;
    let rhs = dense(b)?;
    let storage = dense(a)?.add(&rhs)?;

    let (a_shape, b_shape) = (a.dims(), b.dims());
    let (a_needs, b_needs) = (a.requires_grad(), b.requires_grad());
    Ok(record(
        OpType::Add,
        &[a, b],
        storage,
        Layout::contiguous(&shape),
        move |grad| {
            let grad_a = if a_needs {
                Some(reduce_to(grad.clone(), &a_shape)?)
            } else {
                None
            };
            let grad_b = if b_needs {
                Some(reduce_to(grad.clone(), &b_shape)?)
            } else {
                None
            };
            Ok(vec![grad_a, grad_b])
        },
    ))
}
