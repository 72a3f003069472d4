use crate::assert_err;
use crate::errors::GraphError;
use crate::nn::{
    ChannelKind, Dim3, Graph, GraphDescriptor, Layer, LayerHooks, LayerId, NetPhase, Position,
};
use std::cell::RefCell;
use std::rc::Rc;

/// a → {b, c} → d，其中 b/c 为全连接层，d 为求和层
fn diamond() -> (Graph, [LayerId; 4]) {
    let mut graph = Graph::with_name("diamond");
    let a = graph
        .add_layer(Layer::identity("a", Dim3::new(2, 1, 1)))
        .unwrap();
    let b = graph
        .add_layer(Layer::fully_connected("b", 2, 3, true))
        .unwrap();
    let c = graph
        .add_layer(Layer::fully_connected("c", 2, 3, false))
        .unwrap();
    let d = graph
        .add_layer(Layer::sum("d", Dim3::new(3, 1, 1), 2))
        .unwrap();
    graph.connect(a, b, 0, 0).unwrap();
    graph.connect(a, c, 0, 0).unwrap();
    graph.connect(b, d, 0, 0).unwrap();
    graph.connect(c, d, 0, 1).unwrap();
    (graph, [a, b, c, d])
}

#[test]
fn test_describe_diamond() {
    let (graph, [a, b, c, d]) = diamond();
    let desc = graph.describe();
    assert_eq!(desc.name, "diamond");
    assert_eq!(desc.layers.len(), 4);

    let ids: Vec<u64> = desc.layers.iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![a.0, b.0, c.0, d.0]);

    let layer_a = &desc.layers[0];
    assert_eq!(layer_a.kernel, "Identity");
    assert!(layer_a.dependencies.is_empty());
    assert_eq!(layer_a.children, vec![b.0, c.0]);
    assert_eq!(layer_a.param_count, 0);

    let layer_b = &desc.layers[1];
    assert_eq!(
        layer_b.input_kinds,
        vec![ChannelKind::Data, ChannelKind::Weight, ChannelKind::Bias]
    );
    assert_eq!(layer_b.output_dimensions, vec![Dim3::new(3, 1, 1)]);
    assert_eq!(layer_b.param_count, 9);
    assert!(layer_b.trainable);
    assert!(!layer_b.initialized);

    let layer_d = &desc.layers[3];
    assert_eq!(layer_d.dependencies, vec![b.0, c.0]);
    assert!(layer_d.children.is_empty());
    assert!(!layer_d.trainable);

    assert_eq!(desc.total_params(), 15);
    assert_eq!(graph.dependencies(d).unwrap(), vec![b, c]);
    assert_eq!(graph.children(a).unwrap(), vec![b, c]);
}

#[test]
fn test_descriptor_json() {
    let (mut graph, _) = diamond();
    graph.setup(true).unwrap();
    let desc = graph.describe();
    assert!(desc.layers.iter().all(|l| l.initialized));

    let json = desc.to_json().unwrap();
    assert!(json.contains("\"FullyConnected\""));
    let parsed = GraphDescriptor::from_json(&json).unwrap();
    assert_eq!(parsed, desc);
}

#[test]
fn test_summary() {
    let (mut graph, _) = diamond();
    graph
        .add_layer(Layer::fully_connected("wide", 1000, 1000, true))
        .unwrap();
    let summary = graph.summary();

    assert!(summary.starts_with("# 模型摘要: diamond"));
    assert!(summary.contains("| a | Identity | 2×1×1 | - | - |"));
    assert!(summary.contains("| b | FullyConnected | 3×1×1 | 9 | a |"));
    assert!(summary.contains("| d | Sum | 3×1×1 | - | b, c |"));
    assert!(summary.contains("| wide | FullyConnected | 1000×1×1 | 1,001,000 | - |"));
    assert!(summary.contains("**总参数量**: 1,001,015"));
}

#[test]
fn test_neuron_query() {
    let (graph, [_, b, _, d]) = diamond();
    let view = graph.neuron(b, Position::new(1, 0, 0)).unwrap();
    assert_eq!(view.position, Position::new(1, 0, 0));
    assert_eq!(
        view.inputs,
        vec![Position::new(0, 0, 0), Position::new(1, 0, 0)]
    );
    assert_eq!(
        view.weights,
        vec![Position::new(0, 1, 0), Position::new(1, 1, 0)]
    );
    assert_eq!(view.bias, Some(Position::new(1, 0, 0)));

    assert_err!(
        graph.neuron(d, Position::new(3, 0, 0)),
        GraphError::InvalidOperation(_)
    );
    assert_err!(
        graph.neuron(LayerId(99), Position::default()),
        GraphError::LayerNotFound(LayerId(99))
    );
}

#[test]
fn test_visibility_hooks() {
    let (mut graph, [a, b, c, d]) = diamond();
    let hidden = Rc::new(RefCell::new(Vec::new()));
    let expanded = Rc::new(RefCell::new(Vec::new()));
    graph.set_hooks(LayerHooks {
        on_hide: Some(Box::new({
            let hidden = Rc::clone(&hidden);
            move |layer: &Layer| hidden.borrow_mut().push(layer.name().to_string())
        })),
        on_expand: Some(Box::new({
            let expanded = Rc::clone(&expanded);
            move |layer: &Layer| expanded.borrow_mut().push(layer.name().to_string())
        })),
    });

    // 本来就隐藏的层再次隐藏不触发回调
    graph.set_visible(b, false).unwrap();
    assert!(hidden.borrow().is_empty());

    graph.set_visible(a, true).unwrap();
    graph.set_visible(a, false).unwrap();
    assert_eq!(*hidden.borrow(), vec!["a".to_string()]);

    graph.expand(a).unwrap();
    assert_eq!(*expanded.borrow(), vec!["a".to_string()]);
    let visible: Vec<bool> = [a, b, c, d]
        .iter()
        .map(|id| graph.layer(*id).unwrap().is_visible())
        .collect();
    assert_eq!(visible, vec![true, true, true, false]);

    assert_err!(
        graph.expand(LayerId(42)),
        GraphError::LayerNotFound(LayerId(42))
    );
}

#[test]
fn test_set_phase() {
    let (mut graph, _) = diamond();
    assert_eq!(graph.phase(), NetPhase::Train);
    graph.set_phase(NetPhase::Test);
    assert_eq!(graph.phase(), NetPhase::Test);
}
