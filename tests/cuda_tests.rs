//! CUDA view, elementwise and backward tests. Need a GPU at ordinal 0.
#![cfg(feature = "cuda")]

use graphgrad::backend::cuda::{init_context, CudaContextGuard};
use graphgrad::test_utils::{assert_tensor_close, assert_tensor_eq, check_gradient, transpose_reference};
use graphgrad::{ops, Device, Error, Tensor, TensorOptions, CUDA_MAX_RANK};
use serial_test::serial;

const GPU: Device = Device::Cuda(0);

fn cuda_tensor(data: Vec<f32>, shape: &[usize], requires_grad: bool) -> Tensor {
    Tensor::from_vec_with(data, shape, TensorOptions::new(GPU, requires_grad))
        .expect("Failed to create CUDA tensor in test helper")
}

fn iota(n: usize) -> Vec<f32> {
    (0..n).map(|v| v as f32).collect()
}

#[serial]
#[test]
fn test_cuda_transpose_matches_cpu() -> Result<(), Error> {
    init_context(0)?;
    let _guard = CudaContextGuard::new()?;
    for shape in [vec![5, 10], vec![50, 100], vec![50, 50, 50]] {
        let n = shape.iter().product();
        let last = shape.len() - 1;
        let x = cuda_tensor(iota(n), &shape, false);
        let t = x.transpose(0, last)?;
        assert_eq!(t.device(), GPU);
        assert_eq!(t.to_vec()?, transpose_reference(&iota(n), &shape, 0, last));
    }
    Ok(())
}

#[serial]
#[test]
fn test_cuda_reshape_backward() -> Result<(), Error> {
    init_context(0)?;
    let _guard = CudaContextGuard::new()?;
    let x = Tensor::rand(&[10, 10], TensorOptions::new(GPU, true))?;
    let y = x.reshape(&[10, 2, 5])?;
    let w = Tensor::rand(&[10, 2, 5], TensorOptions::default().on(GPU))?;
    (&y * &w)?.sum()?.backward()?;

    let grad = x.grad().expect("leaf grad");
    assert_eq!(grad.device(), GPU);
    assert_eq!(grad.shape(), &[10, 10]);
    assert_tensor_close(&grad, &w.to_vec()?, 1e-5);
    Ok(())
}

#[serial]
#[test]
fn test_cuda_transpose_reshape_materializes() -> Result<(), Error> {
    init_context(0)?;
    let _guard = CudaContextGuard::new()?;
    let x = cuda_tensor(iota(6), &[2, 3], true);
    let y = x.transpose(0, 1)?.reshape(&[6])?;
    assert_tensor_eq(&y, &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);

    let w = cuda_tensor(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[6], false);
    (&y * &w)?.sum()?.backward()?;
    assert_tensor_eq(&x.grad().expect("leaf grad"), &[1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
    Ok(())
}

#[serial]
#[test]
fn test_cuda_sum_large() -> Result<(), Error> {
    init_context(0)?;
    let _guard = CudaContextGuard::new()?;
    let n = 1 << 20;
    let x = Tensor::ones(&[n], TensorOptions::default().on(GPU))?;
    assert_eq!(x.sum()?.item()?, n as f32);
    Ok(())
}

#[serial]
#[test]
fn test_cuda_rank_ceiling() -> Result<(), Error> {
    init_context(0)?;
    let _guard = CudaContextGuard::new()?;
    let x = Tensor::ones(&[1; CUDA_MAX_RANK], TensorOptions::default().on(GPU))?;
    assert!(matches!(
        x.reshape(&[1; CUDA_MAX_RANK + 1]),
        Err(Error::UnsupportedRank { .. })
    ));
    assert!(matches!(
        Tensor::zeros(&[1; CUDA_MAX_RANK + 1], TensorOptions::default().on(GPU)),
        Err(Error::UnsupportedRank { .. })
    ));
    Ok(())
}

#[serial]
#[test]
fn test_cuda_device_mismatch() -> Result<(), Error> {
    init_context(0)?;
    let _guard = CudaContextGuard::new()?;
    let a = cuda_tensor(vec![1.0, 2.0], &[2], false);
    let b = Tensor::from_vec(vec![1.0, 2.0], &[2], false)?;
    assert!(matches!(ops::mul(&a, &b), Err(Error::DeviceMismatch { .. })));
    assert_tensor_eq(&b.to_device(GPU)?.add(&a)?, &[2.0, 4.0]);
    Ok(())
}

#[serial]
#[test]
fn test_cuda_mutation_after_capture() -> Result<(), Error> {
    init_context(0)?;
    let _guard = CudaContextGuard::new()?;
    let x = cuda_tensor(vec![1.0, 2.0, 3.0, 4.0], &[2, 2], true);
    let view = x.transpose(0, 1)?;
    assert!(matches!(x.fill(0.0), Err(Error::MutationAfterCapture { .. })));
    drop(view);
    x.detach().transpose(0, 1)?.copy_from_slice(&[1.0, 2.0, 3.0, 4.0])?;
    assert_tensor_eq(&x, &[1.0, 3.0, 2.0, 4.0]);
    Ok(())
}

#[serial]
#[test]
fn test_cuda_view_gradient_check() -> Result<(), Error> {
    init_context(0)?;
    let _guard = CudaContextGuard::new()?;
    let x = cuda_tensor((0..12).map(|i| 0.5 + 0.1 * i as f32).collect(), &[3, 4], true);
    let w = cuda_tensor((0..12).map(|i| 1.0 + 0.05 * i as f32).collect(), &[2, 6], false);
    let f = |inputs: &[Tensor]| -> Result<Tensor, Error> {
        let view = inputs[0].transpose(0, 1)?.reshape(&[2, 6])?;
        ops::sum(&ops::mul(&ops::mul(&view, &view)?, &w)?)
    };
    check_gradient(f, &[x], 0, 1e-2, 2e-2)
}
