/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 梯度下降优化器实现
 */

use super::Optimizer;
use crate::tensor::Tensor;
use ndarray::Zip;

/// SGD (随机梯度下降) 优化器，可选 L2 权重衰减
#[derive(Debug, Clone, PartialEq)]
pub struct SGD {
    learning_rate: f32,
    weight_decay: f32,
}

impl SGD {
    pub const fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            weight_decay: 0.0,
        }
    }

    pub const fn with_weight_decay(learning_rate: f32, weight_decay: f32) -> Self {
        Self {
            learning_rate,
            weight_decay,
        }
    }

    pub const fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }
}

impl Optimizer for SGD {
    fn update(&mut self, gradient: &Tensor, weights: &mut Tensor, parallelize: bool) {
        let (lr, decay) = (self.learning_rate, self.weight_decay);
        // θ = θ - α * (∇θ + λθ)
        let step = |w: &mut f32, &g: &f32| *w -= lr * (g + decay * *w);

        let zip = Zip::from(weights.array_mut()).and(gradient.array());
        if parallelize {
            zip.par_for_each(step);
        } else {
            zip.for_each(step);
        }
    }
}
