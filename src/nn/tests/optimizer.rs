use crate::nn::{Adam, ChannelKind, Dim3, Layer, Optimizer, SGD, Signal};
use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;

#[test]
fn test_sgd_step() {
    let mut sgd = SGD::new(0.5);
    let gradient = Tensor::new(&[1., -2.], &[2]);
    let mut weights = Tensor::new(&[1., 1.], &[2]);
    sgd.update(&gradient, &mut weights, false);
    assert_eq!(weights.data_as_slice(), &[0.5, 2.]);

    sgd.set_learning_rate(0.25);
    assert_abs_diff_eq!(sgd.learning_rate(), 0.25);
}

#[test]
fn test_sgd_weight_decay() {
    let mut sgd = SGD::with_weight_decay(0.1, 0.5);
    let gradient = Tensor::zeros(&[1]);
    let mut weights = Tensor::new(&[2.], &[1]);
    sgd.update(&gradient, &mut weights, false);
    // θ = 2 - 0.1 * (0 + 0.5 * 2)
    assert_abs_diff_eq!(weights.data_as_slice()[0], 1.9, epsilon = 1e-6);
}

#[test]
fn test_parallel_and_serial_paths_agree() {
    let mut rng = StdRng::seed_from_u64(7);
    let gradient = Tensor::new_uniform(-1., 1., &[1, 40, 30], &mut rng);
    let weights = Tensor::new_uniform(-1., 1., &[1, 40, 30], &mut rng);

    let mut serial = weights.clone();
    let mut parallel = weights.clone();
    SGD::new(0.01).update(&gradient, &mut serial, false);
    SGD::new(0.01).update(&gradient, &mut parallel, true);
    assert_eq!(serial, parallel);

    let mut serial = weights.clone();
    let mut parallel = weights;
    Adam::new_default(0.01).update(&gradient, &mut serial, false);
    Adam::new_default(0.01).update(&gradient, &mut parallel, true);
    assert_eq!(serial, parallel);
}

#[test]
fn test_adam_first_step_moves_by_alpha() {
    let mut adam = Adam::new_default(0.01);
    let gradient = Tensor::new(&[1., -2., 0.5], &[3]);
    let mut weights = Tensor::new(&[0.5, 0.5, 0.5], &[3]);
    adam.update(&gradient, &mut weights, false);

    assert_abs_diff_eq!(weights.data_as_slice()[0], 0.49, epsilon = 1e-5);
    assert_abs_diff_eq!(weights.data_as_slice()[1], 0.51, epsilon = 1e-5);
    assert_abs_diff_eq!(weights.data_as_slice()[2], 0.49, epsilon = 1e-5);
}

#[test]
fn test_adam_keeps_state_per_buffer() {
    let mut adam = Adam::new_default(0.1);
    let gradient = Tensor::new(&[1.], &[1]);
    let mut a = Tensor::new(&[0.], &[1]);
    let mut b = Tensor::new(&[0.], &[1]);

    adam.update(&gradient, &mut a, false);
    adam.update(&gradient, &mut a, false);
    adam.update(&gradient, &mut b, false);

    // 两步之后 a 移动了约 2α，b 只走了一步
    assert_abs_diff_eq!(a.data_as_slice()[0], -0.2, epsilon = 1e-4);
    assert_abs_diff_eq!(b.data_as_slice()[0], -0.1, epsilon = 1e-4);

    adam.reset();
    adam.update(&gradient, &mut a, false);
    assert_abs_diff_eq!(a.data_as_slice()[0], -0.3, epsilon = 1e-4);
}

#[test]
fn test_closure_as_optimizer() {
    let mut calls = 0;
    let mut optimizer = |gradient: &Tensor, weights: &mut Tensor, _: bool| {
        calls += 1;
        *weights += gradient;
    };
    let mut weights = Tensor::zeros(&[2]);
    optimizer.update(&Tensor::ones(&[2]), &mut weights, false);
    drop(optimizer);
    assert_eq!(calls, 1);
    assert_eq!(weights.data_as_slice(), &[1., 1.]);
}

#[test]
fn test_adam_state_follows_parameter_id() {
    let mut adam = Adam::new_default(0.1);
    let mut weights = Tensor::new(&[0.], &[1]);

    adam.update_parameter(1, &Tensor::new(&[1.], &[1]), &mut weights, false);
    assert_abs_diff_eq!(weights.data_as_slice()[0], -0.1, epsilon = 1e-4);

    // 同一块缓冲换成另一个参数：从零开始的矩估计，第一步恰好移动 α
    adam.update_parameter(2, &Tensor::new(&[-1.], &[1]), &mut weights, false);
    assert_abs_diff_eq!(weights.data_as_slice()[0], 0.0, epsilon = 1e-4);
}

#[test]
fn test_signal_ids_are_unique() {
    let dims = Dim3::new(1, 1, 1);
    let a = Signal::new(dims, ChannelKind::Weight, None);
    let b = Signal::new(dims, ChannelKind::Weight, None);
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_layer_passes_signal_id_to_optimizer() {
    let mut layer = Layer::fully_connected("fc", 2, 1, true);
    layer.setup(false).unwrap();
    let expected: Vec<u64> = layer
        .input_signals()
        .iter()
        .flatten()
        .filter(|s| s.is_parameter())
        .map(|s| s.id())
        .collect();

    struct Recorder(Vec<u64>);
    impl Optimizer for Recorder {
        fn update(&mut self, _: &Tensor, _: &mut Tensor, _: bool) {}

        fn update_parameter(&mut self, param_id: u64, _: &Tensor, _: &mut Tensor, _: bool) {
            self.0.push(param_id);
        }
    }

    let mut recorder = Recorder(Vec::new());
    layer.update_weights(&mut recorder, 1).unwrap();
    assert_eq!(recorder.0, expected);
    assert_eq!(recorder.0.len(), 2);
}
