use approx::assert_relative_eq;
use graphgrad::test_utils::{assert_tensor_eq, transpose_reference};
use graphgrad::{Error, Tensor, TensorOptions};

/// Swaps the first and last dimension, checks the values against a host-side
/// reference, then checks that the gradient of `sum(transpose(x) * w)` is
/// `transpose(w)` back in `x`'s shape.
fn check_transpose(shape: &[usize]) -> Result<(), Error> {
    let last = shape.len() - 1;
    let x = Tensor::rand(shape, TensorOptions::default().requires_grad(true))?;
    let result = x.transpose(0, last)?;

    let mut expected_shape = shape.to_vec();
    expected_shape.swap(0, last);
    assert_eq!(result.dims(), expected_shape);
    assert!(result.shares_storage_with(&x));

    let expected = transpose_reference(&x.to_vec()?, shape, 0, last);
    assert_eq!(result.to_vec()?, expected);

    let w = Tensor::rand(&expected_shape, TensorOptions::default())?;
    (&result * &w)?.sum()?.backward()?;

    let grad = x.grad().expect("x is a leaf that requires grad");
    assert_eq!(grad.shape(), shape);
    let expected_grad = transpose_reference(&w.to_vec()?, &expected_shape, 0, last);
    for (g, e) in grad.to_vec()?.iter().zip(expected_grad) {
        assert_relative_eq!(*g, e, epsilon = 1e-4);
    }
    Ok(())
}

#[test]
fn test_transpose_5x10() -> Result<(), Error> {
    check_transpose(&[5, 10])
}

#[test]
fn test_transpose_10x10() -> Result<(), Error> {
    check_transpose(&[10, 10])
}

#[test]
fn test_transpose_50x100() -> Result<(), Error> {
    check_transpose(&[50, 100])
}

#[test]
fn test_transpose_50x50x50() -> Result<(), Error> {
    check_transpose(&[50, 50, 50])
}

#[test]
fn test_transpose_middle_dims() -> Result<(), Error> {
    let data: Vec<f32> = (0..24).map(|v| v as f32).collect();
    let x = Tensor::from_vec(data.clone(), &[2, 3, 4], false)?;
    let t = x.transpose(1, 2)?;
    assert_eq!(t.shape(), &[2, 4, 3]);
    assert_eq!(t.strides(), &[12, 1, 4]);
    assert!(!t.is_contiguous());
    assert_eq!(t.to_vec()?, transpose_reference(&data, &[2, 3, 4], 1, 2));
    Ok(())
}

#[test]
fn test_transpose_same_dim_is_unchanged_view() -> Result<(), Error> {
    let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2], false)?;
    let t = x.transpose(1, 1)?;
    assert_eq!(t.strides(), x.strides());
    assert!(t.shares_storage_with(&x));
    assert_tensor_eq(&t, &[1.0, 2.0, 3.0, 4.0]);
    Ok(())
}

#[test]
fn test_transpose_same_dim_gradient_passes_through() -> Result<(), Error> {
    let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], true)?;
    let w = Tensor::from_vec(vec![0.5, -1.0, 2.0, 3.5, -2.5, 4.0], &[2, 3], false)?;
    let t = x.transpose(1, 1)?;
    (&t * &w)?.sum()?.backward()?;

    let grad = x.grad().expect("leaf grad");
    assert_eq!(grad.dims(), vec![2, 3]);
    assert_tensor_eq(&grad, &[0.5, -1.0, 2.0, 3.5, -2.5, 4.0]);
    Ok(())
}

#[test]
fn test_transpose_out_of_range() -> Result<(), Error> {
    let x = Tensor::zeros(&[2, 3], TensorOptions::default())?;
    assert!(matches!(
        x.transpose(0, 2),
        Err(Error::DimensionOutOfRange { dim: 2, rank: 2 })
    ));
    Ok(())
}

#[test]
fn test_transpose_then_contiguous() -> Result<(), Error> {
    let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], true)?;
    let c = x.transpose(0, 1)?.contiguous()?;
    assert!(c.is_contiguous());
    assert!(!c.shares_storage_with(&x));
    assert_tensor_eq(&c, &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

    let w = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2], false)?;
    (&c * &w)?.sum()?.backward()?;
    // grad = transpose(w) = [[1, 3, 5], [2, 4, 6]]
    assert_tensor_eq(&x.grad().expect("leaf grad"), &[1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
    Ok(())
}
