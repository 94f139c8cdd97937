//! Random factories. None of these are differentiable; `options.requires_grad` only
//! decides whether the new tensor is a tracked leaf.

use crate::config::{RandomConfig, TensorOptions};
use crate::error::Error;
use crate::layout::{self, Layout};
use crate::storage::{self, Storage};
use crate::tensor::Tensor;

/// Creates a tensor sampled from `config`'s distribution on `options.device`.
///
/// # Errors
/// `InvalidConfig` for an empty uniform range or a negative standard deviation.
pub fn random(shape: &[usize], config: &RandomConfig, options: TensorOptions) -> Result<Tensor, Error> {
    storage::check_device_rank(options.device, shape.len())?;
    let storage = Storage::random(layout::numel(shape), config, options.device)?;
    Ok(Tensor::from_parts(
        storage,
        Layout::contiguous(shape),
        options.requires_grad,
    ))
}

/// Uniform samples in `[0, 1)`.
pub fn rand(shape: &[usize], options: TensorOptions) -> Result<Tensor, Error> {
    random(shape, &RandomConfig::default(), options)
}

/// Creates a tensor with values sampled from a uniform distribution U(low, high).
pub fn random_uniform(
    shape: &[usize],
    low: f32,
    high: f32,
    options: TensorOptions,
) -> Result<Tensor, Error> {
    random(shape, &RandomConfig::uniform(low, high), options)
}

/// Creates a tensor with values sampled from a normal (Gaussian) distribution N(mean, std_dev^2).
pub fn random_normal(
    shape: &[usize],
    mean: f32,
    std_dev: f32,
    options: TensorOptions,
) -> Result<Tensor, Error> {
    random(shape, &RandomConfig::normal(mean, std_dev), options)
}
