use super::{batch, init_logger};
use crate::assert_err;
use crate::errors::GraphError;
use crate::nn::{Dim3, Graph, Layer, LayerId};
use crate::tensor::Tensor;

/// a → b、a → c，b、c → d（Sum）
fn diamond(dims: Dim3) -> (Graph, [LayerId; 4]) {
    let mut graph = Graph::with_name("diamond");
    let a = graph.add_layer(Layer::identity("a", dims)).unwrap();
    let b = graph.add_layer(Layer::identity("b", dims)).unwrap();
    let c = graph.add_layer(Layer::identity("c", dims)).unwrap();
    let d = graph.add_layer(Layer::sum("d", dims, 2)).unwrap();
    graph.connect(a, b, 0, 0).unwrap();
    graph.connect(a, c, 0, 0).unwrap();
    graph.connect(b, d, 0, 0).unwrap();
    graph.connect(c, d, 0, 1).unwrap();
    graph.setup(true).unwrap();
    (graph, [a, b, c, d])
}

#[test]
fn test_two_layer_identity_chain() {
    init_logger();
    let dims = Dim3::new(4, 4, 1);
    let mut graph = Graph::new();
    let root = graph.add_layer(Layer::identity("root", dims)).unwrap();
    let second = graph.add_layer(Layer::identity("second", dims)).unwrap();
    graph.connect(root, second, 0, 0).unwrap();
    graph.setup(true).unwrap();

    let ones = vec![Tensor::ones(&[1, 4, 4]); 2];
    let outputs = graph.forward(&[ones.clone()]).unwrap();

    assert_eq!(outputs, vec![ones.clone()]);
    assert_eq!(graph.layer(second).unwrap().output_data(), vec![ones]);
}

#[test]
fn test_diamond_join_runs_after_both_branches() {
    let dims = Dim3::new(2, 1, 1);
    let (mut graph, [a, b, c, d]) = diamond(dims);

    let order = graph.forward_order();
    assert_eq!(order.len(), 4);
    let position = |id| order.iter().position(|x| *x == id).unwrap();
    assert!(position(a) < position(b));
    assert!(position(a) < position(c));
    assert!(position(b) < position(d));
    assert!(position(c) < position(d));

    let outputs = graph.forward(&[batch(&[&[1., 2.]], dims)]).unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0][0].data_as_slice(), &[2., 4.]);
}

#[test]
fn test_join_not_scheduled_before_late_dependency() {
    // a → b → c → d，同时 a → d：d 必须等到 c 执行之后
    let dims = Dim3::new(1, 1, 1);
    let mut graph = Graph::new();
    let a = graph.add_layer(Layer::identity("a", dims)).unwrap();
    let b = graph.add_layer(Layer::identity("b", dims)).unwrap();
    let c = graph.add_layer(Layer::identity("c", dims)).unwrap();
    let d = graph.add_layer(Layer::sum("d", dims, 2)).unwrap();
    graph.connect(a, b, 0, 0).unwrap();
    graph.connect(b, c, 0, 0).unwrap();
    graph.connect(a, d, 0, 0).unwrap();
    graph.connect(c, d, 0, 1).unwrap();

    assert_eq!(graph.forward_order(), vec![a, b, c, d]);
    assert_eq!(graph.backward_order(), vec![d, c, b, a]);
}

#[test]
fn test_repeated_passes_execute_every_layer() {
    let dims = Dim3::new(2, 1, 1);
    let (mut graph, ids) = diamond(dims);

    graph.forward(&[batch(&[&[1., 1.]], dims)]).unwrap();
    let first = graph.last_forward_pass_id();
    for id in ids {
        assert!(graph.layer(id).unwrap().is_forward_visited(first));
    }

    let outputs = graph.forward(&[batch(&[&[3., -1.]], dims)]).unwrap();
    let second = graph.last_forward_pass_id();
    assert_eq!(second, first + 1);
    for id in ids {
        assert!(graph.layer(id).unwrap().is_forward_visited(second));
    }
    assert_eq!(outputs[0][0].data_as_slice(), &[6., -2.]);
}

#[test]
fn test_partial_last_batch() {
    let dims = Dim3::new(1, 1, 1);
    let (mut graph, [_, _, _, d]) = diamond(dims);

    let outputs = graph
        .forward(&[batch(&[&[1.], &[2.], &[3.]], dims)])
        .unwrap();
    assert_eq!(outputs[0].len(), 3);

    let outputs = graph.forward(&[batch(&[&[5.]], dims)]).unwrap();
    assert_eq!(outputs[0].len(), 1);
    assert_eq!(outputs[0][0].data_as_slice(), &[10.]);

    // 物理存储没有收缩
    let signal = graph.layer(d).unwrap().output(0).unwrap();
    assert_eq!(signal.sample_count(), 1);
    signal.resize(3);
    let values: Vec<f32> = signal.value().iter().map(|t| t.data_as_slice()[0]).collect();
    assert_eq!(values, vec![10., 4., 6.]);
}

#[test]
fn test_forward_distributes_inputs_over_roots() {
    let dims = Dim3::new(2, 1, 1);
    let mut graph = Graph::new();
    let x = graph.add_layer(Layer::identity("x", dims)).unwrap();
    let y = graph.add_layer(Layer::identity("y", dims)).unwrap();
    let sum = graph.add_layer(Layer::sum("sum", dims, 2)).unwrap();
    let echo = graph.add_layer(Layer::identity("echo", dims)).unwrap();
    graph.connect(x, sum, 0, 0).unwrap();
    graph.connect(y, sum, 0, 1).unwrap();
    graph.connect(x, echo, 0, 0).unwrap();
    graph.setup(false).unwrap();

    let outputs = graph
        .forward(&[batch(&[&[1., 2.]], dims), batch(&[&[10., 20.]], dims)])
        .unwrap();
    // 叶子层按 id 排列：sum、echo
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0][0].data_as_slice(), &[11., 22.]);
    assert_eq!(outputs[1][0].data_as_slice(), &[1., 2.]);
}

#[test]
fn test_forward_input_errors() {
    let dims = Dim3::new(2, 1, 1);
    let (mut graph, [a, b, ..]) = diamond(dims);

    assert_err!(graph.forward(&[]), GraphError::InvalidOperation(_));
    assert_err!(
        graph.forward(&[vec![Tensor::zeros(&[1, 1, 3])]]),
        GraphError::ShapeMismatch { .. }
    );
    assert_err!(
        graph.set_input_data(b, &[batch(&[&[1., 1.]], dims)]),
        GraphError::InvalidOperation(_)
    );

    graph.set_input_data(a, &[batch(&[&[1., 1.]], dims)]).unwrap();
    graph.run_forward().unwrap();
}

#[test]
fn test_forward_without_setup_fails() {
    let mut graph = Graph::new();
    graph.add_layer(Layer::identity("lonely", Dim3::new(1, 1, 1))).unwrap();
    assert_err!(
        graph.forward(&[vec![Tensor::ones(&[1, 1, 1])]]),
        GraphError::MissingSignal { .. }
    );
}
