use crate::{
    array::Array,
    autograd,
    config::{RandomConfig, TensorOptions},
    device::Device,
    error::Error,
    graph::{AutogradMeta, Op, OpType},
    layout::{self, Layout},
    list::NestedList,
    ops,
    storage::{self, Storage},
};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul};
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

static TENSOR_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn next_id() -> usize {
    TENSOR_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

pub struct TensorData {
    pub id: usize,
    pub(crate) storage: Rc<Storage>,
    pub(crate) layout: Layout,
    pub(crate) autograd: Option<Rc<AutogradMeta>>,
}

/// A strided view over shared storage, with optional autograd state.
///
/// Cloning a `Tensor` is cheap and yields a handle to the *same* tensor (same id,
/// same gradient slot). View operations such as [`Tensor::reshape`] and
/// [`Tensor::transpose`] create new tensors that alias the same [`Storage`].
///
/// # Example
/// ```rust
/// use graphgrad::Tensor;
///
/// fn main() -> Result<(), graphgrad::Error> {
///     let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], true)?;
///     let y = x.transpose(0, 1)?;
///     assert_eq!(y.dims(), vec![3, 2]);
///     assert!(y.shares_storage_with(&x));
///
///     let w = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2], false)?;
///     let loss = (&y * &w)?.sum()?;
///     loss.backward()?;
///
///     // d(loss)/dx is w transposed back into x's layout
///     assert_eq!(x.grad().unwrap().to_vec()?, vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Tensor {
    pub(crate) inner: Rc<TensorData>,
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.id())
            .field("shape", &self.shape())
            .field("strides", &self.strides())
            .field("offset", &self.offset())
            .field("device", &self.device())
            .field("requires_grad", &self.requires_grad())
            .field("op", &self.op_type())
            .finish()
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Tensor {}

impl Hash for Tensor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

// --- Operator Overloading ---
impl<'b> Add<&'b Tensor> for &Tensor {
    type Output = Result<Tensor, Error>;

    /// Element-wise addition; calls [`ops::add`].
    fn add(self, rhs: &'b Tensor) -> Self::Output {
        ops::add(self, rhs)
    }
}

impl<'b> Mul<&'b Tensor> for &Tensor {
    type Output = Result<Tensor, Error>;

    /// Element-wise multiplication; calls [`ops::mul`].
    fn mul(self, rhs: &'b Tensor) -> Self::Output {
        ops::mul(self, rhs)
    }
}

impl Tensor {
    // --- Internal constructors ---

    fn build(storage: Rc<Storage>, layout: Layout, meta: impl FnOnce(usize) -> Option<AutogradMeta>) -> Self {
        let id = next_id();
        Self {
            inner: Rc::new(TensorData {
                id,
                storage,
                layout,
                autograd: meta(id).map(Rc::new),
            }),
        }
    }

    /// A leaf over `storage`; gets a gradient slot when `requires_grad`.
    pub(crate) fn from_parts(storage: Rc<Storage>, layout: Layout, requires_grad: bool) -> Self {
        let device = storage.device();
        let shape = layout.shape().to_vec();
        Self::build(storage, layout, |id| {
            requires_grad.then(|| AutogradMeta::leaf(id, &shape, device))
        })
    }

    /// An interior node produced by `op`.
    pub(crate) fn from_op(storage: Rc<Storage>, layout: Layout, op: Op) -> Self {
        let device = storage.device();
        let shape = layout.shape().to_vec();
        Self::build(storage, layout, |id| {
            Some(AutogradMeta::with_node(id, &shape, device, op))
        })
    }

    pub(crate) fn storage(&self) -> &Rc<Storage> {
        &self.inner.storage
    }

    pub(crate) fn layout(&self) -> &Layout {
        &self.inner.layout
    }

    pub(crate) fn autograd(&self) -> Option<&Rc<AutogradMeta>> {
        self.inner.autograd.as_ref()
    }

    // --- Factories ---

    /// Builds a CPU tensor from row-major `data`.
    pub fn from_vec(data: Vec<f32>, shape: &[usize], requires_grad: bool) -> Result<Self, Error> {
        Self::from_vec_with(data, shape, TensorOptions::default().requires_grad(requires_grad))
    }

    pub fn from_vec_with(data: Vec<f32>, shape: &[usize], options: TensorOptions) -> Result<Self, Error> {
        if data.len() != layout::numel(shape) {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                actual: vec![data.len()],
            });
        }
        storage::check_device_rank(options.device, shape.len())?;
        let storage = Storage::from_vec(data, options.device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape), options.requires_grad))
    }

    /// Builds a tensor from a rectangular nested list; the nesting defines the shape.
    pub fn from_list(list: &NestedList, options: TensorOptions) -> Result<Self, Error> {
        let (data, shape) = list.flatten()?;
        Self::from_vec_with(data, &shape, options)
    }

    pub fn full(shape: &[usize], value: f32, options: TensorOptions) -> Result<Self, Error> {
        storage::check_device_rank(options.device, shape.len())?;
        let storage = Storage::full(layout::numel(shape), value, options.device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape), options.requires_grad))
    }

    pub fn zeros(shape: &[usize], options: TensorOptions) -> Result<Self, Error> {
        storage::check_device_rank(options.device, shape.len())?;
        let storage = Storage::zeros(layout::numel(shape), options.device)?;
        Ok(Self::from_parts(storage, Layout::contiguous(shape), options.requires_grad))
    }

    pub fn ones(shape: &[usize], options: TensorOptions) -> Result<Self, Error> {
        Self::full(shape, 1.0, options)
    }

    /// Uniform `[0, 1)` samples; see [`ops::rand`].
    pub fn rand(shape: &[usize], options: TensorOptions) -> Result<Self, Error> {
        ops::rand(shape, options)
    }

    pub fn random(shape: &[usize], config: &RandomConfig, options: TensorOptions) -> Result<Self, Error> {
        ops::random(shape, config, options)
    }

    // --- Introspection ---

    /// Gets the unique identifier of this tensor.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn shape(&self) -> &[usize] {
        self.inner.layout.shape()
    }

    /// Dimension sizes as an owned vector.
    pub fn dims(&self) -> Vec<usize> {
        self.shape().to_vec()
    }

    pub fn rank(&self) -> usize {
        self.inner.layout.rank()
    }

    /// Number of logical elements (1 for rank-0).
    pub fn numel(&self) -> usize {
        self.inner.layout.numel()
    }

    pub fn strides(&self) -> &[usize] {
        self.inner.layout.strides()
    }

    pub fn offset(&self) -> usize {
        self.inner.layout.offset()
    }

    pub fn is_contiguous(&self) -> bool {
        self.inner.layout.is_contiguous()
    }

    /// Returns the device where the tensor data is located.
    pub fn device(&self) -> Device {
        self.inner.storage.device()
    }

    pub fn requires_grad(&self) -> bool {
        self.inner.autograd.is_some()
    }

    /// True unless the tensor was produced by a recorded operation.
    pub fn is_leaf(&self) -> bool {
        self.autograd().map_or(true, |m| m.is_leaf())
    }

    /// The operation that produced this tensor, if one was recorded.
    pub fn op_type(&self) -> Option<OpType> {
        self.autograd()
            .and_then(|m| m.node.as_ref())
            .map(|op| op.op_type.clone())
    }

    /// True when both tensors alias the same storage buffer.
    pub fn shares_storage_with(&self, other: &Tensor) -> bool {
        Rc::ptr_eq(&self.inner.storage, &other.inner.storage)
    }

    // --- Gradients ---

    /// The accumulated gradient, if backward has reached this tensor's slot.
    pub fn grad(&self) -> Option<Tensor> {
        self.autograd().and_then(|m| m.grad.borrow().clone())
    }

    /// Clears the gradient slot. The next backward pass starts accumulating from zero.
    pub fn zero_grad(&self) {
        if let Some(meta) = self.autograd() {
            meta.grad.borrow_mut().take();
        }
    }

    /// Asks backward to store this (non-leaf) tensor's gradient as well.
    pub fn retain_grad(&self) -> Result<(), Error> {
        let meta = self.autograd().ok_or_else(|| {
            Error::InvalidOperation(format!(
                "retain_grad on tensor {} which does not require grad",
                self.id()
            ))
        })?;
        meta.retains_grad.set(true);
        Ok(())
    }

    /// A new handle over the same storage and layout, outside any graph.
    pub fn detach(&self) -> Tensor {
        Self::from_parts(self.inner.storage.clone(), self.inner.layout.clone(), false)
    }

    /// Backpropagates from this single-element tensor with seed 1.
    ///
    /// # Errors
    /// `InvalidBackwardTarget` if the tensor holds more than one element.
    pub fn backward(&self) -> Result<(), Error> {
        autograd::backward(self, None)
    }

    /// Backpropagates from this tensor with an explicit output gradient of the same shape.
    pub fn backward_with_grad(&self, seed: &Tensor) -> Result<(), Error> {
        autograd::backward(self, Some(seed))
    }

    // --- Host access ---

    /// Elements in logical order. Waits for device work before reading.
    pub fn to_vec(&self) -> Result<Vec<f32>, Error> {
        let host = self.inner.storage.to_host()?;
        let layout = self.layout();
        if layout.is_contiguous() && layout.offset() == 0 && host.len() == layout.numel() {
            return Ok(host);
        }
        Ok(Array::from_vec(host).gather(layout)?.into_raw_vec())
    }

    /// Nested host representation in logical order.
    pub fn to_list(&self) -> Result<NestedList, Error> {
        Ok(NestedList::from_flat(&self.to_vec()?, self.shape()))
    }

    /// The value of a single-element tensor.
    pub fn item(&self) -> Result<f32, Error> {
        if self.numel() != 1 {
            return Err(Error::InvalidOperation(format!(
                "item() needs exactly one element, tensor has shape {:?}",
                self.shape()
            )));
        }
        self.to_vec()?
            .first()
            .copied()
            .ok_or_else(|| Error::InternalLogicError("empty host copy".to_string()))
    }

    /// Copies this tensor's elements to `device`. The result is a fresh leaf;
    /// no gradient flows across the transfer.
    pub fn to_device(&self, device: Device) -> Result<Tensor, Error> {
        Self::from_vec_with(self.to_vec()?, self.shape(), TensorOptions::default().on(device))
    }

    // --- In-place writes ---

    fn ensure_writable(&self) -> Result<(), Error> {
        if self.inner.storage.is_captured() {
            return Err(Error::MutationAfterCapture {
                tensor_id: self.id(),
            });
        }
        Ok(())
    }

    /// Overwrites this tensor's elements (logical order) in place. Every view sharing
    /// the storage observes the write.
    ///
    /// # Errors
    /// `MutationAfterCapture` while a live graph node holds this storage as an operand.
    pub fn copy_from_slice(&self, data: &[f32]) -> Result<(), Error> {
        self.ensure_writable()?;
        if data.len() != self.numel() {
            return Err(Error::ShapeMismatch {
                expected: self.dims(),
                actual: vec![data.len()],
            });
        }
        let storage = &self.inner.storage;
        let layout = self.layout();
        if layout.is_contiguous() && layout.offset() == 0 && storage.len() == data.len() {
            return storage.write_from_host(data);
        }
        let mut host = storage.to_host()?;
        for (pos, &value) in layout.positions().into_iter().zip(data) {
            host[pos] = value;
        }
        storage.write_from_host(&host)
    }

    pub fn fill(&self, value: f32) -> Result<(), Error> {
        self.copy_from_slice(&vec![value; self.numel()])
    }

    // --- Operations ---

    pub fn reshape(&self, shape: &[usize]) -> Result<Tensor, Error> {
        ops::reshape(self, shape)
    }

    /// `reshape` where one dimension may be `-1` and is inferred.
    pub fn reshape_infer(&self, shape: &[isize]) -> Result<Tensor, Error> {
        ops::reshape_infer(self, shape)
    }

    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Tensor, Error> {
        ops::transpose(self, dim0, dim1)
    }

    pub fn contiguous(&self) -> Result<Tensor, Error> {
        ops::contiguous(self)
    }

    pub fn mul(&self, other: &Tensor) -> Result<Tensor, Error> {
        ops::mul(self, other)
    }

    pub fn add(&self, other: &Tensor) -> Result<Tensor, Error> {
        ops::add(self, other)
    }

    /// Sum of all elements as a rank-0 tensor.
    pub fn sum(&self) -> Result<Tensor, Error> {
        ops::sum(self)
    }
}
