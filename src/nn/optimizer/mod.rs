/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 优化器模块：根据合并后的梯度原地更新参数缓冲
 */

mod adam;
mod sgd;

pub use adam::Adam;
pub use sgd::SGD;

use crate::tensor::Tensor;

/// 参数元素数达到该值时，提示优化器可以并行更新
pub const PARALLEL_UPDATE_THRESHOLD: usize = 512;

/// 优化器契约：`gradient`已按批次大小平均，`weights`须原地更新
pub trait Optimizer {
    fn update(&mut self, gradient: &Tensor, weights: &mut Tensor, parallelize: bool);

    /// 引擎更新参数信号时调用；`param_id`即信号 id，在整个进程内唯一。
    /// 需要按参数保存状态的优化器应以它为键，默认直接转给`update`。
    fn update_parameter(
        &mut self,
        param_id: u64,
        gradient: &Tensor,
        weights: &mut Tensor,
        parallelize: bool,
    ) {
        let _ = param_id;
        self.update(gradient, weights, parallelize);
    }
}

/// 闭包也可以直接当作优化器使用
impl<F> Optimizer for F
where
    F: FnMut(&Tensor, &mut Tensor, bool),
{
    fn update(&mut self, gradient: &Tensor, weights: &mut Tensor, parallelize: bool) {
        self(gradient, weights, parallelize);
    }
}
