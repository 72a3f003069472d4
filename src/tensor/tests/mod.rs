use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;

#[test]
fn test_new_and_properties() {
    let tensor = Tensor::new(&[1., 2., 3., 4., 5., 6.], &[1, 2, 3]);
    assert_eq!(tensor.shape(), &[1, 2, 3]);
    assert_eq!(tensor.dimension(), 3);
    assert_eq!(tensor.size(), 6);
    assert_eq!(tensor.get(4), Some(5.));
    assert_eq!(tensor.get(6), None);
    assert_eq!(tensor.data_as_slice(), &[1., 2., 3., 4., 5., 6.]);
}

#[test]
#[should_panic(expected = "数据长度")]
fn test_new_with_wrong_len() {
    Tensor::new(&[1., 2., 3.], &[2, 2]);
}

#[test]
fn test_filled_zeros_ones() {
    assert!(Tensor::zeros(&[2, 2]).data_as_slice().iter().all(|&x| x == 0.));
    assert!(Tensor::ones(&[3]).data_as_slice().iter().all(|&x| x == 1.));
    assert!(Tensor::filled(0.5, &[1, 1, 4]).data_as_slice().iter().all(|&x| x == 0.5));
}

#[test]
fn test_add_assign_and_scale() {
    let mut a = Tensor::new(&[1., 2., 3.], &[3]);
    let b = Tensor::new(&[0.5, 0.5, 1.], &[3]);
    a += &b;
    assert_eq!(a.data_as_slice(), &[1.5, 2.5, 4.]);
    a *= 2.;
    assert_eq!(a.data_as_slice(), &[3., 5., 8.]);

    let c = &a + &b;
    assert_eq!(c.data_as_slice(), &[3.5, 5.5, 9.]);
    let d = &b * 4.;
    assert_eq!(d.data_as_slice(), &[2., 2., 4.]);
}

#[test]
#[should_panic(expected = "形状不一致")]
fn test_add_assign_shape_mismatch() {
    let mut a = Tensor::zeros(&[3]);
    a += &Tensor::zeros(&[1, 3]);
}

#[test]
fn test_max_abs_diff() {
    let a = Tensor::new(&[1., 2., 3.], &[3]);
    let b = Tensor::new(&[1., 2.5, 2.9], &[3]);
    assert_abs_diff_eq!(a.max_abs_diff(&b).unwrap(), 0.5, epsilon = 1e-6);
    assert_eq!(a.max_abs_diff(&Tensor::zeros(&[1, 3])), None);
}

#[test]
fn test_random_constructors_are_seedable() {
    let mut rng1 = StdRng::seed_from_u64(42);
    let mut rng2 = StdRng::seed_from_u64(42);
    let a = Tensor::new_uniform(-1., 1., &[2, 3], &mut rng1);
    let b = Tensor::new_uniform(-1., 1., &[2, 3], &mut rng2);
    assert_eq!(a, b);
    assert!(a.data_as_slice().iter().all(|&x| (-1. ..=1.).contains(&x)));

    let n = Tensor::new_normal(0., 1., &[5], &mut rng1);
    assert_eq!(n.size(), 5);
    assert!(n.data_as_slice().iter().all(|x| x.is_finite()));
}

#[test]
fn test_serde_round_trip() {
    let tensor = Tensor::new(&[1., -2., 3.5, 0.], &[1, 2, 2]);
    let json = serde_json::to_string(&tensor).unwrap();
    let restored: Tensor = serde_json::from_str(&json).unwrap();
    assert_eq!(tensor, restored);
}

#[test]
fn test_save_and_load() {
    let tensor = Tensor::new(&[1.5, -2., 0.25, 8.], &[1, 2, 2]);
    let mut buffer = Vec::new();
    tensor.save(&mut buffer).unwrap();

    let loaded = Tensor::load(&mut buffer.as_slice()).unwrap();
    assert_eq!(loaded, tensor);

    // 截断的数据无法解析
    let truncated = &buffer[..buffer.len() / 2];
    assert!(Tensor::load(&mut &truncated[..]).is_err());
}
