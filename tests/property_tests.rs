use graphgrad::test_utils::transpose_reference;
use graphgrad::{Tensor, TensorOptions};
use proptest::prelude::*;

fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..=5, 1..=4)
}

fn iota(shape: &[usize], requires_grad: bool) -> Tensor {
    let n: usize = shape.iter().product();
    Tensor::from_vec((0..n).map(|v| v as f32).collect(), shape, requires_grad).unwrap()
}

proptest! {
    #[test]
    fn prop_reshape_round_trip(shape in shape_strategy()) {
        let x = iota(&shape, false);
        let n = x.numel();
        let back = x.reshape(&[n]).unwrap().reshape(&shape).unwrap();
        prop_assert_eq!(back.shape(), shape.as_slice());
        prop_assert_eq!(back.to_vec().unwrap(), x.to_vec().unwrap());
        prop_assert!(back.shares_storage_with(&x));
    }

    #[test]
    fn prop_double_transpose_is_identity(
        shape in shape_strategy(),
        a in 0usize..4,
        b in 0usize..4,
    ) {
        let rank = shape.len();
        let (d0, d1) = (a % rank, b % rank);
        let x = iota(&shape, false);
        let t = x.transpose(d0, d1).unwrap();
        prop_assert_eq!(
            t.to_vec().unwrap(),
            transpose_reference(&x.to_vec().unwrap(), &shape, d0, d1)
        );
        let tt = t.transpose(d0, d1).unwrap();
        prop_assert_eq!(tt.shape(), x.shape());
        prop_assert_eq!(tt.strides(), x.strides());
        prop_assert_eq!(tt.to_vec().unwrap(), x.to_vec().unwrap());
    }

    #[test]
    fn prop_view_chain_gradient_is_ones(
        shape in shape_strategy(),
        a in 0usize..4,
        b in 0usize..4,
    ) {
        let rank = shape.len();
        let x = iota(&shape, true);
        let n = x.numel();
        let y = x
            .transpose(a % rank, b % rank).unwrap()
            .reshape(&[n]).unwrap()
            .contiguous().unwrap();
        y.sum().unwrap().backward().unwrap();

        let grad = x.grad().unwrap();
        prop_assert_eq!(grad.shape(), x.shape());
        prop_assert_eq!(grad.to_vec().unwrap(), vec![1.0; n]);
    }

    #[test]
    fn prop_weighted_view_gradient_matches_weights(shape in shape_strategy()) {
        let x = iota(&shape, true);
        let n = x.numel();
        let w = Tensor::rand(&[n], TensorOptions::default()).unwrap();
        (&x.reshape(&[n]).unwrap() * &w).unwrap().sum().unwrap().backward().unwrap();
        prop_assert_eq!(x.grad().unwrap().to_vec().unwrap(), w.to_vec().unwrap());
    }
}
