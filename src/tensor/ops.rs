/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 张量的逐元素运算：信号梯度的累加、按批次缩放等只需要这几种。
 *                 两个张量之间的运算要求形状严格一致，否则panic。
 */

use super::Tensor;
use std::ops::{Add, AddAssign, Mul, MulAssign};

impl Tensor {
    /// 将所有元素设为`value`
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// 两个张量逐元素差值的最大绝对值；形状不一致时返回None
    pub fn max_abs_diff(&self, other: &Self) -> Option<f32> {
        if !self.is_same_shape(other) {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f32::max),
        )
    }
}

impl AddAssign<&Self> for Tensor {
    fn add_assign(&mut self, rhs: &Self) {
        assert!(
            self.is_same_shape(rhs),
            "形状不一致，故无法自相加：第一个张量的形状为{:?}，第二个张量的形状为{:?}",
            self.shape(),
            rhs.shape()
        );
        self.data += &rhs.data;
    }
}

impl MulAssign<f32> for Tensor {
    fn mul_assign(&mut self, scalar: f32) {
        self.data *= scalar;
    }
}

impl Add for &Tensor {
    type Output = Tensor;

    fn add(self, rhs: &Tensor) -> Tensor {
        let mut result = self.clone();
        result += rhs;
        result
    }
}

impl Mul<f32> for &Tensor {
    type Output = Tensor;

    fn mul(self, scalar: f32) -> Tensor {
        Tensor {
            data: &self.data * scalar,
        }
    }
}
