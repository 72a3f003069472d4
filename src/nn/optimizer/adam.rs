/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : Adam优化器实现
 */

use super::Optimizer;
use crate::tensor::Tensor;
use ndarray::Zip;
use std::collections::HashMap;

/// 单个参数缓冲的矩估计
#[derive(Debug, Clone)]
struct Moments {
    /// 一阶矩估计
    m: Tensor,
    /// 二阶矩估计
    v: Tensor,
    /// 时间步
    t: i32,
}

/// 矩估计的键：引擎传入的参数信号 id，或直接调用`update`时的缓冲地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MomentKey {
    Parameter(u64),
    Address(usize),
}

/// Adam优化器。
/// 经由层更新时，矩估计以参数信号的 id 为键（id 不会被复用），
/// 因此同一个优化器实例可服务于多个层。
#[derive(Debug, Clone)]
pub struct Adam {
    alpha: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    moments: HashMap<MomentKey, Moments>,
}

impl Adam {
    pub fn new(alpha: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            alpha,
            beta1,
            beta2,
            epsilon,
            moments: HashMap::new(),
        }
    }

    /// 使用默认参数创建Adam优化器
    pub fn new_default(alpha: f32) -> Self {
        Self::new(alpha, 0.9, 0.999, 1e-8)
    }

    /// 清空所有矩估计（如重新初始化权重后）
    pub fn reset(&mut self) {
        self.moments.clear();
    }

    fn step(&mut self, key: MomentKey, gradient: &Tensor, weights: &mut Tensor, parallelize: bool) {
        let state = self.moments.entry(key).or_insert_with(|| Moments {
            m: Tensor::zeros(weights.shape()),
            v: Tensor::zeros(weights.shape()),
            t: 0,
        });
        // 缓冲形状变化时重新开始
        if !state.m.is_same_shape(weights) {
            state.m = Tensor::zeros(weights.shape());
            state.v = Tensor::zeros(weights.shape());
            state.t = 0;
        }
        state.t += 1;

        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        let alpha_t = self.alpha * (1.0 - b2.powi(state.t)).sqrt() / (1.0 - b1.powi(state.t));
        let step = |w: &mut f32, &g: &f32, m: &mut f32, v: &mut f32| {
            *m = b1 * *m + (1.0 - b1) * g;
            *v = b2 * *v + (1.0 - b2) * g * g;
            *w -= alpha_t * *m / (v.sqrt() + eps);
        };

        let zip = Zip::from(weights.array_mut())
            .and(gradient.array())
            .and(state.m.array_mut())
            .and(state.v.array_mut());
        if parallelize {
            zip.par_for_each(step);
        } else {
            zip.for_each(step);
        }
    }
}

impl Optimizer for Adam {
    fn update(&mut self, gradient: &Tensor, weights: &mut Tensor, parallelize: bool) {
        let key = MomentKey::Address(weights as *const Tensor as usize);
        self.step(key, gradient, weights, parallelize);
    }

    fn update_parameter(
        &mut self,
        param_id: u64,
        gradient: &Tensor,
        weights: &mut Tensor,
        parallelize: bool,
    ) {
        self.step(MomentKey::Parameter(param_id), gradient, weights, parallelize);
    }
}
