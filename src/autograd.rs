//! The backward engine.
//!
//! Walks the graph reachable from a root in reverse topological order, so every node's
//! output gradient is complete (all consumers have contributed) before its own backward
//! rule runs. Gradients for interior nodes live only for the duration of the pass; they
//! are written to a tensor's slot only for leaves and for tensors that called
//! `retain_grad`, where they are added to whatever the slot already holds.

use crate::config::TensorOptions;
use crate::error::Error;
use crate::graph::AutogradMeta;
use crate::layout::Layout;
use crate::ops;
use crate::tensor::Tensor;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub(crate) fn backward(root: &Tensor, seed: Option<&Tensor>) -> Result<(), Error> {
    let seed = match seed {
        Some(seed) => {
            if seed.shape() != root.shape() {
                return Err(Error::ShapeMismatch {
                    expected: root.dims(),
                    actual: seed.dims(),
                });
            }
            if seed.device() != root.device() {
                return Err(Error::DeviceMismatch {
                    op: "backward".to_string(),
                    lhs: root.device(),
                    rhs: seed.device(),
                });
            }
            seed.detach()
        }
        None => {
            if root.numel() != 1 {
                return Err(Error::InvalidBackwardTarget { shape: root.dims() });
            }
            Tensor::ones(root.shape(), TensorOptions::default().on(root.device()))?
        }
    };

    let Some(root_meta) = root.autograd() else {
        debug_println!("backward on tensor {} without autograd state; nothing to do", root.id());
        return Ok(());
    };

    let order = topo_order(root_meta);
    debug_println!("backward from tensor {} over {} nodes", root.id(), order.len());

    let mut pending: HashMap<usize, Tensor> = HashMap::new();
    pending.insert(root_meta.tensor_id, seed);

    for meta in order.iter().rev() {
        let Some(grad) = pending.remove(&meta.tensor_id) else {
            continue;
        };

        if meta.stores_grad() {
            store_grad(meta, &grad)?;
        }

        let Some(op) = meta.node.as_ref() else {
            continue;
        };
        debug_println!("  {} (tensor {}) grad shape {:?}", op.op_type, meta.tensor_id, grad.shape());

        let input_grads = (op.backward_fn)(&grad)?;
        if input_grads.len() != op.inputs.len() {
            return Err(Error::InternalLogicError(format!(
                "Backward function for op {} (tensor {}) returned {} gradients, expected {}",
                op.op_type,
                meta.tensor_id,
                input_grads.len(),
                op.inputs.len()
            )));
        }

        for (input, input_grad) in op.inputs.iter().zip(input_grads) {
            let (Some(input), Some(input_grad)) = (input, input_grad) else {
                continue;
            };
            if input_grad.shape() != input.shape.as_slice() {
                return Err(Error::IncompatibleShapes {
                    op: format!("backward of {}", op.op_type),
                    shape_a: input.shape.clone(),
                    shape_b: input_grad.dims(),
                });
            }
            if input_grad.device() != input.device {
                return Err(Error::DeviceMismatch {
                    op: format!("backward of {}", op.op_type),
                    lhs: input.device,
                    rhs: input_grad.device(),
                });
            }
            let merged = match pending.remove(&input.tensor_id) {
                Some(existing) => ops::add(&existing, &input_grad)?,
                None => input_grad,
            };
            pending.insert(input.tensor_id, merged);
        }
    }

    Ok(())
}

/// Post-order DFS over gradient slots, inputs before consumers. Iterative so deep
/// chains of views do not exhaust the call stack.
fn topo_order(root: &Rc<AutogradMeta>) -> Vec<Rc<AutogradMeta>> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(Rc::clone(root), false)];

    while let Some((meta, expanded)) = stack.pop() {
        if expanded {
            order.push(meta);
            continue;
        }
        if !visited.insert(meta.tensor_id) {
            continue;
        }
        stack.push((Rc::clone(&meta), true));
        if let Some(op) = meta.node.as_ref() {
            for input in op.inputs.iter().flatten() {
                if !visited.contains(&input.tensor_id) {
                    stack.push((Rc::clone(input), false));
                }
            }
        }
    }
    order
}

/// Adds `grad` into the slot. The stored tensor always owns a fresh buffer so it never
/// aliases the seed or any forward value.
fn store_grad(meta: &AutogradMeta, grad: &Tensor) -> Result<(), Error> {
    let existing = meta.grad.borrow().clone();
    let total = match existing {
        Some(existing) => ops::add(&existing, grad)?,
        None => {
            let storage = grad.storage().gather(grad.layout())?;
            Tensor::from_parts(storage, Layout::contiguous(grad.shape()), false)
        }
    };
    *meta.grad.borrow_mut() = Some(total);
    Ok(())
}
