/*
 * @Author       : 老董
 * @Date         : 2023-10-21 03:22:26
 * @Description  : 本类仅包含一些属性方法，不包含任何运算方法
 * @LastEditors  : 老董
 * @LastEditTime : 2026-10-16
 */

use super::Tensor;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD};

impl Tensor {
    pub fn view(&self) -> ArrayViewD<'_, f32> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMutD<'_, f32> {
        self.data.view_mut()
    }

    pub(crate) const fn array(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub(crate) fn array_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// 张量的维（dim）数、阶（rank）数
    pub fn dimension(&self) -> usize {
        self.data.ndim()
    }

    /// 张量中所有元素的数量
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 判断两个张量的形状是否严格一致。如：形状为 [1, 4]和[4]是不一致的
    pub fn is_same_shape(&self, other: &Self) -> bool {
        self.shape() == other.shape()
    }

    /// 按行优先（逻辑顺序）的扁平数据。
    /// 本库只构造标准布局的张量，所以总是连续的。
    pub fn data_as_slice(&self) -> &[f32] {
        self.data
            .as_slice()
            .expect("张量总是以标准（行优先）布局存储")
    }

    pub fn data_as_slice_mut(&mut self) -> &mut [f32] {
        self.data
            .as_slice_mut()
            .expect("张量总是以标准（行优先）布局存储")
    }

    /// 按扁平索引取值，越界返回None
    pub fn get(&self, index: usize) -> Option<f32> {
        self.data_as_slice().get(index).copied()
    }
}
