/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 层的计算核（kernel）插件契约
 *
 * 图引擎只关心本文件中的`LayerKernel`契约：维度推断、前向/反向计算、扇入扇出等。
 * 具体的数学实现（全连接、池化……）都是可替换的插件：
 * - 内置核通过`enum_dispatch`静态分发；
 * - 第三方核通过`CustomKernel`（trait object）接入。
 */

mod average_pool;
mod custom;
mod fully_connected;
mod identity;
mod sum;

pub use average_pool::AveragePool;
pub use custom::CustomKernel;
pub use fully_connected::FullyConnected;
pub use identity::Identity;
pub use sum::Sum;

use super::shape::{Dim3, Position};
use crate::errors::GraphError;
use crate::tensor::Tensor;
use enum_dispatch::enum_dispatch;

/// 计算核契约。`in_data`/`out_data`等参数的外层按槽位索引，内层按样本索引。
#[enum_dispatch]
pub trait LayerKernel {
    /// 核的类型名（如"FullyConnected"），用于命名和诊断信息
    fn kind_name(&self) -> &'static str;

    /// 每个输入槽期望的形状；除非调用`set_input_shape`，否则必须保持稳定
    fn input_dimensions(&self) -> Vec<Dim3>;

    /// 每个输出槽产生的形状
    fn output_dimensions(&self) -> Vec<Dim3>;

    /// 根据上游输出推断本层输入形状；不支持推断的核保持默认实现
    fn set_input_shape(&mut self, _shape: Dim3) -> Result<(), GraphError> {
        Err(GraphError::UnsupportedOperation(format!(
            "{}无法推断输入形状",
            self.kind_name()
        )))
    }

    /// 训练/测试阶段切换（如dropout、batch norm需要）
    fn set_context(&mut self, _phase: NetPhase) {}

    /// 读`in_data`，写`out_data`；不得有缓冲之外的副作用
    fn forward_propagation(&mut self, in_data: &[&[Tensor]], out_data: &mut [&mut [Tensor]]);

    /// 根据前向时的数据和下游梯度`out_grad`计算上游梯度`in_grad`。
    /// `in_grad`交给核时已清零，梯度合并由引擎负责。
    fn backward_propagation(
        &mut self,
        in_data: &[&[Tensor]],
        out_data: &[&[Tensor]],
        out_grad: &[&[Tensor]],
        in_grad: &mut [&mut [Tensor]],
    );

    /// 每个输出单元的输入连接数（用于权重初始化）
    fn fan_in_size(&self) -> usize {
        self.input_dimensions().first().map_or(0, |d| d.width)
    }

    /// 每个输入单元的输出连接数（用于权重初始化）
    fn fan_out_size(&self) -> usize {
        self.output_dimensions().first().map_or(0, |d| d.width)
    }

    /// 权重更新之后的钩子（如batch norm更新滑动统计量）
    fn post(&mut self) {}

    /// 影响输出位置`pos`的输入位置
    fn stencil_input(&self, _pos: Position) -> Vec<Position> {
        Vec::new()
    }

    /// 影响输出位置`pos`的权重位置
    fn stencil_weight(&self, _pos: Position) -> Vec<Position> {
        Vec::new()
    }

    /// 影响输出位置`pos`的偏置位置
    fn stencil_bias(&self, _pos: Position) -> Option<Position> {
        None
    }
}

#[enum_dispatch(LayerKernel)]
pub enum Kernel {
    Identity,
    FullyConnected,
    AveragePool,
    Sum,
    Custom(CustomKernel),
}

impl Kernel {
    /// 包装一个第三方计算核
    pub fn custom<K: LayerKernel + 'static>(kernel: K) -> Self {
        Self::Custom(CustomKernel::new(kernel))
    }
}

/// 网络所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetPhase {
    #[default]
    Train,
    Test,
}

/// 计算后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendType {
    #[default]
    Internal,
    Avx,
    Nnpack,
}

impl BackendType {
    /// 内置核目前只提供纯rust实现
    pub(crate) fn ensure_supported(self, kind_name: &str) -> Result<(), GraphError> {
        match self {
            Self::Internal => Ok(()),
            other => Err(GraphError::BackendAllocationFailure(format!(
                "{kind_name}不支持{other:?}后端"
            ))),
        }
    }
}
