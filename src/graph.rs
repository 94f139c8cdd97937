use crate::device::Device;
use crate::error::Error;
use crate::storage::CaptureToken;
use crate::tensor::Tensor;

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum OpType {
    Reshape { input_shape: Vec<usize> },
    Transpose { dim0: usize, dim1: usize },
    Contiguous,
    Mul,
    Add,
    Sum,
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OpType::Reshape { input_shape } => write!(f, "Reshape(from={:?})", input_shape),
            OpType::Transpose { dim0, dim1 } => write!(f, "Transpose({}, {})", dim0, dim1),
            OpType::Contiguous => write!(f, "Contiguous"),
            OpType::Mul => write!(f, "Mul"),
            OpType::Add => write!(f, "Add"),
            OpType::Sum => write!(f, "Sum(global)"),
        }
    }
}

/// Maps the gradient of a node's output to one gradient per input.
/// `None` means the input does not need one.
pub(crate) type BackwardFn = dyn Fn(&Tensor) -> Result<Vec<Option<Tensor>>, Error>;

/// A recorded operation: the backward rule plus edges to the inputs' gradient slots.
///
/// Edges point at [`AutogradMeta`], never at the input tensors, so a graph does not keep
/// input views (or their storage) alive. Anything the rule needs from the forward pass
/// is captured by `backward_fn` itself.
pub struct Op {
    pub op_type: OpType,
    pub(crate) inputs: Vec<Option<Rc<AutogradMeta>>>,
    pub(crate) backward_fn: Rc<BackwardFn>,
    _captures: Vec<CaptureToken>,
}

impl Op {
    pub(crate) fn new(
        op_type: OpType,
        inputs: Vec<Option<Rc<AutogradMeta>>>,
        captures: Vec<CaptureToken>,
        backward_fn: impl Fn(&Tensor) -> Result<Vec<Option<Tensor>>, Error> + 'static,
    ) -> Self {
        Self {
            op_type,
            inputs,
            backward_fn: Rc::new(backward_fn),
            _captures: captures,
        }
    }
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Op")
            .field("op_type", &self.op_type)
            .field(
                "inputs",
                &self
                    .inputs
                    .iter()
                    .map(|m| m.as_ref().map(|m| m.tensor_id))
                    .collect::<Vec<_>>(),
            )
            .field("backward_fn", &"<closure>")
            .finish()
    }
}

/// Per-tensor autograd state, present only when the tensor requires gradients.
#[derive(Debug)]
pub struct AutogradMeta {
    pub(crate) tensor_id: usize,
    pub(crate) shape: Vec<usize>,
    pub(crate) device: Device,
    /// Accumulated gradient. Written for leaves and for tensors that asked to retain it.
    pub(crate) grad: RefCell<Option<Tensor>>,
    /// Producing operation; `None` for leaves.
    pub(crate) node: Option<Rc<Op>>,
    pub(crate) retains_grad: Cell<bool>,
}

impl AutogradMeta {
    pub(crate) fn leaf(tensor_id: usize, shape: &[usize], device: Device) -> Self {
        Self {
            tensor_id,
            shape: shape.to_vec(),
            device,
            grad: RefCell::new(None),
            node: None,
            retains_grad: Cell::new(false),
        }
    }

    pub(crate) fn with_node(tensor_id: usize, shape: &[usize], device: Device, op: Op) -> Self {
        Self {
            node: Some(Rc::new(op)),
            ..Self::leaf(tensor_id, shape, device)
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.node.is_none()
    }

    /// Whether backward writes this tensor's gradient into its slot.
    pub(crate) fn stores_grad(&self) -> bool {
        self.is_leaf() || self.retains_grad.get()
    }
}
