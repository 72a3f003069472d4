/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 图描述符（Graph Descriptor）
 *                 用于序列化、可视化和调试输出的统一中间表示
 */

use super::shape::Dim3;
use super::signal::ChannelKind;
use serde::{Deserialize, Serialize};

/// 图的可序列化描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDescriptor {
    /// 格式版本（用于向后兼容）
    pub version: String,
    /// 图名称
    pub name: String,
    /// 所有层的描述（按id升序）
    pub layers: Vec<LayerDescriptor>,
}

/// 层描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub id: u64,
    pub name: String,
    /// 计算核类型名
    pub kernel: String,
    pub input_kinds: Vec<ChannelKind>,
    pub output_kinds: Vec<ChannelKind>,
    pub input_dimensions: Vec<Dim3>,
    pub output_dimensions: Vec<Dim3>,
    pub trainable: bool,
    pub initialized: bool,
    pub visible: bool,
    /// 上游层 ID 列表（定义拓扑）
    pub dependencies: Vec<u64>,
    /// 下游层 ID 列表
    pub children: Vec<u64>,
    /// weight/bias 输入的元素总数
    pub param_count: usize,
}

impl GraphDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            name: name.to_string(),
            layers: Vec::new(),
        }
    }

    pub fn add_layer(&mut self, layer: LayerDescriptor) {
        self.layers.push(layer);
    }

    /// 获取总参数量
    pub fn total_params(&self) -> usize {
        self.layers.iter().map(|l| l.param_count).sum()
    }

    /// 转换为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
