/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 计算图（层与信号）相关的错误类型
 */

use thiserror::Error;

use crate::nn::LayerId;

/// 计算图构建、setup 及运行时的错误
///
/// 除`MissingSignal`外，所有错误都发生在构图/setup 阶段；
/// 一旦前向/反向传播开始，图结构即被视为合法。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// 层无法完成被请求的操作（如无法推断输入形状）
    #[error("不支持的操作：{0}")]
    UnsupportedOperation(String),

    /// 声明的维度与连接数量/形状不一致
    #[error("{layer}形状不匹配：{message}")]
    ShapeMismatch { layer: String, message: String },

    /// 输入槽已绑定了其他信号，不允许静默覆盖
    #[error("{layer}的输入槽{slot}连接冲突：{message}")]
    ConnectionConflict {
        layer: String,
        slot: usize,
        message: String,
    },

    /// 计算后端无法构造
    #[error("后端分配失败：{0}")]
    BackendAllocationFailure(String),

    #[error("层{0}不存在")]
    LayerNotFound(LayerId),

    #[error("{layer}的{direction}槽{index}越界（共{count}个）")]
    SlotOutOfRange {
        layer: String,
        direction: SlotDirection,
        index: usize,
        count: usize,
    },

    /// 运行传播前信号尚未分配（通常是漏了 setup）
    #[error("{layer}缺少信号：{message}")]
    MissingSignal { layer: String, message: String },

    #[error("连接会在图中形成环：{0}")]
    CyclicConnection(String),

    #[error("层名称重复：{0}")]
    DuplicateLayerName(String),

    #[error("无效操作：{0}")]
    InvalidOperation(String),

    /// 参数包的加载/保存失败
    #[error("持久化失败：{0}")]
    Persistence(String),
}

/// 槽位方向（用于错误提示）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDirection {
    Input,
    Output,
}

impl std::fmt::Display for SlotDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Input => "输入",
            Self::Output => "输出",
        };
        write!(f, "{name}")
    }
}
