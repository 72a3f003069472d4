use super::batch;
use super::kernels::scale_layer;
use crate::assert_err;
use crate::errors::GraphError;
use crate::nn::{Dim3, Graph, GraphConfig, Layer, PARALLEL_UPDATE_THRESHOLD, SGD};
use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;
use std::cell::Cell;
use std::rc::Rc;

/// 记录每次调用优化器时的并行提示
fn hints_for(layer: &mut Layer) -> Vec<bool> {
    let mut hints = Vec::new();
    let mut optimizer = |_: &Tensor, _: &mut Tensor, parallelize: bool| hints.push(parallelize);
    layer.update_weights(&mut optimizer, 1).unwrap();
    hints
}

#[test]
fn test_parallel_hint_threshold() {
    assert_eq!(PARALLEL_UPDATE_THRESHOLD, 512);

    // 7×73 = 511 个权重
    let mut below = Layer::fully_connected("below", 7, 73, false);
    below.setup(false).unwrap();
    assert_eq!(below.input(1).unwrap().parameter().size(), 511);
    assert_eq!(hints_for(&mut below), vec![false]);

    // 8×64 = 512 个权重
    let mut at = Layer::fully_connected("at", 8, 64, false);
    at.setup(false).unwrap();
    assert_eq!(at.input(1).unwrap().parameter().size(), 512);
    assert_eq!(hints_for(&mut at), vec![true]);

    // 权重与偏置分别判断
    let mut mixed = Layer::fully_connected("mixed", 8, 64, true);
    mixed.setup(false).unwrap();
    assert_eq!(hints_for(&mut mixed), vec![true, false]);
}

#[test]
fn test_graph_threshold_comes_from_config() {
    let mut graph = Graph::with_config(GraphConfig {
        parallel_update_threshold: 4,
        ..GraphConfig::default()
    });
    let fc = graph.add_layer(Layer::fully_connected("fc", 2, 2, true)).unwrap();
    graph.setup(false).unwrap();

    let mut hints = Vec::new();
    let mut optimizer = |_: &Tensor, _: &mut Tensor, parallelize: bool| hints.push(parallelize);
    graph.update_weights(&mut optimizer, 1).unwrap();
    assert_eq!(hints, vec![true, false]);
    assert!(graph.layer(fc).unwrap().is_trainable());
}

#[test]
fn test_update_scales_by_batch_size() {
    let dims = Dim3::new(2, 1, 1);
    let mut layer = Layer::fully_connected("fc", 2, 1, true);
    layer.set_weight_init(|buffer: &mut Tensor, _, _| buffer.fill(0.5));

    layer
        .forward_with(&[batch(&[&[1., 2.], &[3., 4.]], dims)])
        .unwrap();
    let out = Dim3::new(1, 1, 1);
    layer.backward_with(&[batch(&[&[1.], &[1.]], out)]).unwrap();

    let mut gradients = Vec::new();
    let mut optimizer = |gradient: &Tensor, _: &mut Tensor, _: bool| {
        gradients.push(gradient.data_as_slice().to_vec());
    };
    layer.update_weights(&mut optimizer, 2).unwrap();

    // dW = ([1,2] + [3,4]) / 2，db = (1 + 1) / 2
    assert_eq!(gradients, vec![vec![2., 3.], vec![1.]]);
    // 更新后梯度被清空
    for signal in layer.input_signals().iter().flatten() {
        assert!(signal.gradient().iter().all(|g| g.data_as_slice().iter().all(|&x| x == 0.)));
    }
}

#[test]
fn test_sgd_update() {
    let dims = Dim3::new(2, 1, 1);
    let mut layer = Layer::fully_connected("fc", 2, 1, false);
    layer.set_weight_init(|buffer: &mut Tensor, _, _| buffer.fill(0.5));
    layer.forward_with(&[batch(&[&[1., 2.]], dims)]).unwrap();
    layer
        .backward_with(&[batch(&[&[1.]], Dim3::new(1, 1, 1))])
        .unwrap();

    layer.update_weights(&mut SGD::new(0.1), 1).unwrap();
    let weights = layer.input_weights();
    assert_eq!(weights.len(), 1);
    assert_abs_diff_eq!(weights[0].data_as_slice()[0], 0.4, epsilon = 1e-6);
    assert_abs_diff_eq!(weights[0].data_as_slice()[1], 0.3, epsilon = 1e-6);
}

#[test]
fn test_non_trainable_layer_is_skipped() {
    let dims = Dim3::new(2, 1, 1);
    let mut layer = Layer::fully_connected("frozen", 2, 1, false);
    layer.set_trainable(false);
    layer.forward_with(&[batch(&[&[1., 2.]], dims)]).unwrap();
    layer
        .backward_with(&[batch(&[&[1.]], Dim3::new(1, 1, 1))])
        .unwrap();

    let calls = Cell::new(0);
    let mut optimizer = |_: &Tensor, _: &mut Tensor, _: bool| calls.set(calls.get() + 1);
    layer.update_weights(&mut optimizer, 1).unwrap();
    // 批次大小为0也不会报错：直接跳过
    layer.update_weights(&mut optimizer, 0).unwrap();
    assert_eq!(calls.get(), 0);
    // 不可训练的层不会给参数累积梯度
    assert_eq!(layer.input(1).unwrap().gradient()[0].data_as_slice(), &[0., 0.]);
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let mut layer = Layer::fully_connected("fc", 2, 1, false);
    layer.setup(false).unwrap();
    assert_err!(
        layer.update_weights(&mut SGD::new(0.1), 0),
        GraphError::InvalidOperation(_)
    );

    let mut graph = Graph::new();
    graph.add_layer(Layer::identity("id", Dim3::new(1, 1, 1))).unwrap();
    assert_err!(
        graph.update_weights(&mut SGD::new(0.1), 0),
        GraphError::InvalidOperation(_)
    );
}

#[test]
fn test_post_hook_runs_after_update() {
    let posts = Rc::new(Cell::new(0));
    let mut layer = scale_layer("scale", Rc::clone(&posts));
    layer.set_weight_init(|buffer: &mut Tensor, _, _| buffer.fill(1.0));
    layer.setup(false).unwrap();

    layer.update_weights(&mut SGD::new(0.1), 1).unwrap();
    layer.update_weights(&mut SGD::new(0.1), 1).unwrap();
    assert_eq!(posts.get(), 2);

    layer.set_trainable(false);
    layer.update_weights(&mut SGD::new(0.1), 1).unwrap();
    assert_eq!(posts.get(), 2);
}

#[test]
fn test_has_same_weights() {
    let build = || {
        let mut layer = Layer::fully_connected("fc", 3, 2, true);
        layer.set_weight_init(|buffer: &mut Tensor, _, _| buffer.fill(0.5));
        layer.set_bias_init(|buffer: &mut Tensor, _, _| buffer.fill(0.5));
        layer.setup(true).unwrap();
        layer
    };
    let eps = 1e-6;
    let lhs = build();
    let rhs = build();
    assert!(lhs.has_same_weights(&rhs, eps));

    // 扰动一个元素 2*eps
    rhs.input(1).unwrap().parameter_mut().data_as_slice_mut()[3] += 2. * eps;
    assert!(!lhs.has_same_weights(&rhs, eps));
    assert!(!rhs.has_same_weights(&lhs, eps));

    // 形状不同
    let mut other = Layer::fully_connected("fc", 2, 3, true);
    other.setup(false).unwrap();
    assert!(!lhs.has_same_weights(&other, f32::MAX));

    // 图级别按名称比较
    let mut a = Graph::new();
    let mut b = Graph::new();
    a.add_layer(build()).unwrap();
    b.add_layer(build()).unwrap();
    assert!(a.has_same_weights(&b, eps));
    let mut renamed = build();
    renamed.set_name("other");
    let mut c = Graph::new();
    c.add_layer(renamed).unwrap();
    assert!(!a.has_same_weights(&c, eps));
}
