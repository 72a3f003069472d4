/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 参数包（持久化的层状态）
 *
 * 每组数据按“通道 → 样本”两级排列：
 * weight/bias 只有一个参数缓冲，其变化量（梯度行）随批次而定；
 * responses 为 data 输出的值与梯度。
 */

use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// 按通道、再按样本排列的一组张量
pub type Knowledge = Vec<Vec<Tensor>>;

/// 单层的参数包
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerState {
    pub name: String,
    pub weights: Knowledge,
    pub weight_changes: Knowledge,
    pub bias_weights: Knowledge,
    pub bias_weight_changes: Knowledge,
    pub responses: Knowledge,
    pub response_changes: Knowledge,
    pub bias_responses: Knowledge,
    pub bias_response_changes: Knowledge,
}

/// 整个图的参数包（按层名匹配）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    /// 格式版本（用于向后兼容）
    pub version: String,
    pub layers: Vec<LayerState>,
}

impl GraphState {
    pub fn new(layers: Vec<LayerState>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            layers,
        }
    }

    pub fn layer(&self, name: &str) -> Option<&LayerState> {
        self.layers.iter().find(|l| l.name == name)
    }
}
