use criterion::{black_box, criterion_group, criterion_main, Criterion};
use graphgrad::{ops, Tensor, TensorOptions};
use rand::prelude::*;
use rand::rng;
#[cfg(feature = "cuda")]
use graphgrad::{
    backend::cuda::{init_context, CudaContextGuard},
    Device,
};

// Helper function to create random tensor
fn create_random(shape: &[usize], options: TensorOptions) -> Tensor {
    let size = shape.iter().product();
    let mut rng_instance = rng();
    let data: Vec<f32> = (0..size).map(|_| rng_instance.random::<f32>()).collect();
    Tensor::from_vec_with(data, shape, options).unwrap()
}

fn bench_transpose_materialize(c: &mut Criterion) {
    let shapes = [([256, 256], "256"), ([1024, 1024], "1024")];

    let mut group = c.benchmark_group("transpose_contiguous");

    for (shape, size) in shapes.iter() {
        {
            let a = create_random(shape, TensorOptions::default());
            group.bench_function(format!("cpu_transpose_contiguous_{}", size), |bencher| {
                bencher.iter(|| {
                    let t = ops::transpose(black_box(&a), 0, 1).unwrap();
                    black_box(ops::contiguous(&t)).unwrap();
                });
            });
        }

        #[cfg(feature = "cuda")]
        {
            init_context(0).unwrap();
            let _guard = CudaContextGuard::new().unwrap();

            let a = create_random(shape, TensorOptions::default().on(Device::Cuda(0)));
            group.bench_function(format!("gpu_transpose_contiguous_{}", size), |bencher| {
                bencher.iter(|| {
                    let t = ops::transpose(black_box(&a), 0, 1).unwrap();
                    black_box(ops::contiguous(&t)).unwrap();
                });
            });
        }
    }

    group.finish();
}

fn bench_reshape_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("reshape_backward");

    let options = TensorOptions::default().requires_grad(true);
    let x = create_random(&[512, 512], options);
    let w = create_random(&[256, 1024], TensorOptions::default());

    group.bench_function("cpu_view_reshape_backward_512", |bencher| {
        bencher.iter(|| {
            x.zero_grad();
            let y = x.reshape(&[256, 1024]).unwrap();
            let loss = ops::sum(&ops::mul(&y, &w).unwrap()).unwrap();
            loss.backward().unwrap();
        });
    });

    group.bench_function("cpu_transposed_reshape_backward_512", |bencher| {
        bencher.iter(|| {
            x.zero_grad();
            let y = x.transpose(0, 1).unwrap().reshape(&[256, 1024]).unwrap();
            let loss = ops::sum(&ops::mul(&y, &w).unwrap()).unwrap();
            loss.backward().unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_transpose_materialize, bench_reshape_backward);
criterion_main!(benches);
