use crate::config::TensorOptions;
use crate::layout;
use crate::{Error, Tensor};

/// Checks the gradient of a function with respect to a specific input tensor.
///
/// # Arguments
/// * `func`: A closure that takes a slice of input tensors and returns a single-element Tensor (the loss).
/// * `inputs`: A slice of input tensors. The checked one must `require_grad`.
/// * `input_idx_to_check`: The index in the `inputs` slice for which to check the gradient.
/// * `epsilon`: A small value for finite difference perturbation (e.g., 1e-3).
/// * `tolerance`: The maximum allowed relative (or, near zero, absolute) difference.
///
/// # Returns
/// * `Ok(())` if the gradients match within the tolerance.
/// * `Err(Error::GradientCheckError)` describing the worst mismatch otherwise.
pub fn check_gradient<F>(
    func: F,
    inputs: &[Tensor],
    input_idx_to_check: usize,
    epsilon: f32,
    tolerance: f32,
) -> Result<(), Error>
where
    F: Fn(&[Tensor]) -> Result<Tensor, Error>,
{
    let target_input = inputs.get(input_idx_to_check).ok_or_else(|| {
        Error::InvalidOperation(format!(
            "input_idx_to_check ({}) is out of bounds for inputs slice (len {})",
            input_idx_to_check,
            inputs.len()
        ))
    })?;
    if !target_input.requires_grad() {
        return Err(Error::InvalidOperation(format!(
            "Input {} (ID {}) does not require grad",
            input_idx_to_check,
            target_input.id()
        )));
    }

    let analytical = compute_analytical_gradient(&func, inputs, input_idx_to_check)?;
    let numerical = compute_numerical_gradient(&func, inputs, input_idx_to_check, epsilon)?;
    compare_gradients(&analytical, &numerical, tolerance)
}

fn compute_analytical_gradient<F>(
    func: &F,
    inputs: &[Tensor],
    input_idx_to_check: usize,
) -> Result<Vec<f32>, Error>
where
    F: Fn(&[Tensor]) -> Result<Tensor, Error>,
{
    for input in inputs.iter().filter(|t| t.requires_grad()) {
        input.zero_grad();
    }

    let loss = func(inputs)?;
    loss.backward()?;

    let target_input = &inputs[input_idx_to_check];
    match target_input.grad() {
        Some(grad) => grad.to_vec(),
        // No path from the loss to this input: its gradient is zero.
        None => Ok(vec![0.0; target_input.numel()]),
    }
}

fn compute_numerical_gradient<F>(
    func: &F,
    base_inputs: &[Tensor],
    input_idx_to_check: usize,
    epsilon: f32,
) -> Result<Vec<f32>, Error>
where
    F: Fn(&[Tensor]) -> Result<Tensor, Error>,
{
    let target_input = &base_inputs[input_idx_to_check];
    let shape = target_input.dims();
    let options = TensorOptions::new(target_input.device(), false);
    let base_data = target_input.to_vec()?;
    let mut inputs = base_inputs.to_vec();

    let mut eval = |data: Vec<f32>| -> Result<f32, Error> {
        inputs[input_idx_to_check] = Tensor::from_vec_with(data, &shape, options)?;
        func(&inputs)?.item()
    };

    let mut numerical = Vec::with_capacity(base_data.len());
    for i in 0..base_data.len() {
        let mut data_plus = base_data.clone();
        data_plus[i] += epsilon;
        let mut data_minus = base_data.clone();
        data_minus[i] -= epsilon;

        // Central difference formula
        let loss_plus = eval(data_plus)?;
        let loss_minus = eval(data_minus)?;
        numerical.push((loss_plus - loss_minus) / (2.0 * epsilon));
    }
    Ok(numerical)
}

fn compare_gradients(analytical: &[f32], numerical: &[f32], tolerance: f32) -> Result<(), Error> {
    if analytical.len() != numerical.len() {
        return Err(Error::InternalLogicError(format!(
            "Gradient size mismatch: analytical size={}, numerical size={}",
            analytical.len(),
            numerical.len()
        )));
    }

    let mut max_rel_err = 0.0;
    let mut max_abs_err = 0.0;
    let mut max_err_idx = 0;

    for (i, (a, n)) in analytical.iter().zip(numerical.iter()).enumerate() {
        let abs_err = (a - n).abs();
        let rel_err = if a.abs() > 1e-8 && n.abs() > 1e-8 {
            abs_err / a.abs().max(n.abs())
        } else {
            abs_err
        };

        if rel_err > max_rel_err {
            max_rel_err = rel_err;
            max_abs_err = abs_err;
            max_err_idx = i;
        }
    }

    if max_rel_err <= tolerance {
        Ok(())
    } else {
        Err(Error::GradientCheckError {
            analytical: analytical.to_vec(),
            numerical: numerical.to_vec(),
            max_rel_error: max_rel_err,
            max_abs_error: max_abs_err,
            at_index: max_err_idx,
        })
    }
}

/// Deterministic sample tensor `0.5, 1.5, 2.5, ...` (mod 17, so values stay small),
/// used as a reproducible fixture in tests and benches.
pub fn fixture_tensor(shape: &[usize], options: TensorOptions) -> Result<Tensor, Error> {
    let n = layout::numel(shape);
    let data = (0..n).map(|i| (i % 17) as f32 + 0.5).collect();
    Tensor::from_vec_with(data, shape, options)
}

/// Row-major reference for `transpose(dim0, dim1)` computed directly on host data.
pub fn transpose_reference(data: &[f32], shape: &[usize], dim0: usize, dim1: usize) -> Vec<f32> {
    let mut out_shape = shape.to_vec();
    out_shape.swap(dim0, dim1);
    let in_strides = layout::contiguous_strides(shape);
    let n = layout::numel(shape);
    let mut out = Vec::with_capacity(n);
    let mut index = vec![0usize; out_shape.len()];
    for _ in 0..n {
        let mut src = index.clone();
        src.swap(dim0, dim1);
        let pos: usize = src.iter().zip(&in_strides).map(|(i, s)| i * s).sum();
        out.push(data[pos]);
        for d in (0..out_shape.len()).rev() {
            index[d] += 1;
            if index[d] < out_shape[d] {
                break;
            }
            index[d] = 0;
        }
    }
    out
}

pub fn assert_tensor_eq(t: &Tensor, expected: &[f32]) {
    let data = t.to_vec().unwrap();
    assert_eq!(data.len(), expected.len(), "Tensor lengths don't match");
    for (i, (a_val, b_val)) in data.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            *a_val, *b_val,
            "Values at index {i} don't match: a={a_val}, b={b_val}"
        );
    }
}

pub fn assert_tensor_close(t: &Tensor, expected: &[f32], tol: f32) {
    let data = t.to_vec().unwrap();
    assert_eq!(data.len(), expected.len(), "Tensor lengths don't match");
    for (i, (a_val, b_val)) in data.iter().zip(expected.iter()).enumerate() {
        assert!(
            (a_val - b_val).abs() < tol,
            "Values at index {i} aren't close enough: a={a_val}, b={b_val}, diff={}, tol={tol}",
            (a_val - b_val).abs()
        );
    }
}
