/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 计算图的配置
 */

use super::optimizer::PARALLEL_UPDATE_THRESHOLD;
use crate::errors::GraphError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// 图名称
    pub name: String,
    /// 随机种子；为None时权重初始化不可复现
    pub seed: Option<u64>,
    /// 参数元素数达到该值时提示优化器并行更新
    pub parallel_update_threshold: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            name: "default_graph".to_string(),
            seed: None,
            parallel_update_threshold: PARALLEL_UPDATE_THRESHOLD,
        }
    }
}

impl GraphConfig {
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        serde_json::from_str(json)
            .map_err(|e| GraphError::Persistence(format!("解析图配置失败: {e}")))
    }

    /// 从 JSON 文件读取配置
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GraphError> {
        let json = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            GraphError::Persistence(format!(
                "无法读取配置文件{}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json(&json)
    }
}
