use ndarray::{Array, IxDyn};
use rand::Rng;
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

mod ops;
mod print;
mod property;
mod save_load;

#[cfg(test)]
mod tests;

/// 单个样本的稠密数值缓冲（per-sample storage）。
/// 一个批次（batch）由若干个`Tensor`组成，每个样本一个。
/// 对于3维的层数据，形状约定为`[depth, height, width]`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    data: Array<f32, IxDyn>,
}

impl Tensor {
    /// 创建一个张量，`data`的长度必须和`shape`中所有元素的乘积相等，否则会panic。
    pub fn new(data: &[f32], shape: &[usize]) -> Self {
        let expected = shape.iter().product::<usize>();
        assert_eq!(
            data.len(),
            expected,
            "数据长度{}与形状{:?}不符（应为{}）",
            data.len(),
            shape,
            expected
        );
        let data = Array::from_shape_vec(IxDyn(shape), data.to_vec())
            .expect("长度已校验，构造不会失败");
        Self { data }
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            data: Array::zeros(IxDyn(shape)),
        }
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::filled(1.0, shape)
    }

    /// 创建一个所有元素都为`value`的张量
    pub fn filled(value: f32, shape: &[usize]) -> Self {
        Self {
            data: Array::from_elem(IxDyn(shape), value),
        }
    }

    /// 创建一个随机张量，其值在[min, max]的闭区间
    pub fn new_uniform<R: Rng>(min: f32, max: f32, shape: &[usize], rng: &mut R) -> Self {
        let dist = Uniform::new_inclusive(min, max);
        let data = (0..shape.iter().product::<usize>())
            .map(|_| dist.sample(rng))
            .collect::<Vec<_>>();
        Self::new(&data, shape)
    }

    /// 创建一个服从正态分布的随机张量（Box-Muller）
    pub fn new_normal<R: Rng>(mean: f32, std_dev: f32, shape: &[usize], rng: &mut R) -> Self {
        let data_len = shape.iter().product::<usize>();
        let mut data = Vec::with_capacity(data_len);

        while data.len() < data_len {
            let u1: f32 = rng.gen_range(f32::MIN_POSITIVE..1.0);
            let u2: f32 = rng.gen_range(0.0..1.0);
            let r = (-2.0 * u1.ln()).sqrt();
            let theta = 2.0 * std::f32::consts::PI * u2;
            let z0 = mean + std_dev * r * theta.cos();
            let z1 = mean + std_dev * r * theta.sin();

            if z0.is_finite() {
                data.push(z0);
            }
            if data.len() < data_len && z1.is_finite() {
                data.push(z1);
            }
        }

        Self::new(&data, shape)
    }
}
