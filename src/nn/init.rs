/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 权重/偏置的初始化策略
 */

use super::layer::InitFn;
use crate::tensor::Tensor;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

// ==================== Init 枚举 ====================

/// 参数初始化策略
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Init {
    /// 常数初始化
    Constant(f32),
    /// 全零
    Zeros,
    /// 全一
    Ones,
    /// 均匀分布 [min, max]
    Uniform { min: f32, max: f32 },
    /// 正态分布
    Normal { mean: f32, std: f32 },
    /// Xavier/Glorot 初始化（适用于 Sigmoid/Tanh）
    Xavier,
    /// Kaiming/He 初始化（适用于 `ReLU`）
    Kaiming,
    /// LeCun 初始化
    LeCun,
}

impl Init {
    /// 按`fan_in`/`fan_out`原地填充`buffer`（形状不变）
    pub fn fill(&self, buffer: &mut Tensor, fan_in: usize, fan_out: usize, rng: &mut StdRng) {
        let shape = buffer.shape().to_vec();
        let fan_in = fan_in.max(1) as f32;
        let fan_out = fan_out as f32;
        *buffer = match *self {
            Self::Constant(v) => Tensor::filled(v, &shape),
            Self::Zeros => Tensor::zeros(&shape),
            Self::Ones => Tensor::ones(&shape),
            Self::Uniform { min, max } => Tensor::new_uniform(min, max, &shape, rng),
            Self::Normal { mean, std } => Tensor::new_normal(mean, std, &shape, rng),
            Self::Xavier => {
                let bound = (6.0 / (fan_in + fan_out)).sqrt();
                Tensor::new_uniform(-bound, bound, &shape, rng)
            }
            Self::Kaiming => {
                let std = (2.0 / fan_in).sqrt();
                Tensor::new_normal(0.0, std, &shape, rng)
            }
            Self::LeCun => {
                let bound = 1.0 / fan_in.sqrt();
                Tensor::new_uniform(-bound, bound, &shape, rng)
            }
        };
    }

    /// 转为可挂到层上的初始化回调；给定`seed`时结果可复现
    pub fn into_callback(self, seed: Option<u64>) -> InitFn {
        let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Box::new(move |buffer: &mut Tensor, fan_in: usize, fan_out: usize| {
            self.fill(buffer, fan_in, fan_out, &mut rng);
        })
    }
}
