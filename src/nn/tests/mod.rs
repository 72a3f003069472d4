use crate::nn::Dim3;
use crate::tensor::Tensor;

mod describe;
mod graph_forward;
mod optimizer;
mod update_weights;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 按样本构造一个批次，每个样本的形状由`dims`决定
fn batch(samples: &[&[f32]], dims: Dim3) -> Vec<Tensor> {
    samples
        .iter()
        .map(|data| Tensor::new(data, &dims.to_shape()))
        .collect()
}
