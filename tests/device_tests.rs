use graphgrad::backend::check_rank_limit;
use graphgrad::{Device, Error, Tensor, TensorOptions, CUDA_MAX_RANK, DEVICE_ENV_VAR};
use serial_test::serial;

#[test]
fn test_device_parsing() -> Result<(), Error> {
    assert_eq!("cpu".parse::<Device>()?, Device::Cpu);
    assert_eq!("CUDA".parse::<Device>()?, Device::Cuda(0));
    assert_eq!("cuda:3".parse::<Device>()?, Device::Cuda(3));
    assert!(matches!(
        "cuda:x".parse::<Device>(),
        Err(Error::InvalidConfig(_))
    ));
    assert!(matches!("tpu".parse::<Device>(), Err(Error::InvalidConfig(_))));
    assert_eq!(Device::Cuda(1).to_string(), "cuda:1");
    Ok(())
}

#[test]
#[serial]
fn test_options_from_env() -> Result<(), Error> {
    std::env::remove_var(DEVICE_ENV_VAR);
    assert_eq!(TensorOptions::from_env()?.device, Device::Cpu);

    std::env::set_var(DEVICE_ENV_VAR, "cuda:1");
    assert_eq!(TensorOptions::from_env()?.device, Device::Cuda(1));

    std::env::set_var(DEVICE_ENV_VAR, "abacus");
    let parsed = TensorOptions::from_env();
    std::env::remove_var(DEVICE_ENV_VAR);
    assert!(matches!(parsed, Err(Error::InvalidConfig(_))));
    Ok(())
}

#[test]
fn test_rank_ceiling() {
    assert!(check_rank_limit(Device::Cpu, 12, None).is_ok());
    assert!(check_rank_limit(Device::Cuda(0), CUDA_MAX_RANK, Some(CUDA_MAX_RANK)).is_ok());
    match check_rank_limit(Device::Cuda(0), CUDA_MAX_RANK + 1, Some(CUDA_MAX_RANK)) {
        Err(Error::UnsupportedRank {
            device,
            rank,
            max_rank,
        }) => {
            assert_eq!(device, Device::Cuda(0));
            assert_eq!(rank, CUDA_MAX_RANK + 1);
            assert_eq!(max_rank, CUDA_MAX_RANK);
        }
        other => panic!("expected UnsupportedRank, got {:?}", other),
    }
}

#[test]
fn test_cpu_has_no_rank_ceiling() -> Result<(), Error> {
    let shape = [1usize; 10];
    let x = Tensor::ones(&shape, TensorOptions::default())?;
    let y = x.transpose(0, 9)?.reshape(&[1; 12])?;
    assert_eq!(y.rank(), 12);
    assert_eq!(y.item()?, 1.0);
    Ok(())
}

#[cfg(not(feature = "cuda"))]
#[test]
fn test_cuda_unavailable_without_feature() {
    let options = TensorOptions::default().on(Device::Cuda(0));
    assert!(matches!(
        Tensor::zeros(&[2, 2], options),
        Err(Error::DeviceUnavailable(Device::Cuda(0)))
    ));
    assert!(matches!(
        Tensor::from_vec_with(vec![1.0], &[1], options),
        Err(Error::DeviceUnavailable(_))
    ));

    let x = Tensor::from_vec(vec![1.0, 2.0], &[2], false).unwrap();
    assert!(matches!(
        x.to_device(Device::Cuda(0)),
        Err(Error::DeviceUnavailable(_))
    ));
}

#[test]
fn test_to_device_cpu_copies() -> Result<(), Error> {
    let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2], true)?;
    let t = x.transpose(0, 1)?;
    let moved = t.to_device(Device::Cpu)?;
    assert!(!moved.shares_storage_with(&x));
    assert!(moved.is_leaf());
    assert!(!moved.requires_grad());
    assert_eq!(moved.to_vec()?, vec![1.0, 3.0, 2.0, 4.0]);
    Ok(())
}
