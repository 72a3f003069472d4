/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : Graph 核心操作：创建、访问器、添加层
 */

use super::{Graph, LayerHooks};
use crate::errors::GraphError;
use crate::nn::config::GraphConfig;
use crate::nn::kernel::NetPhase;
use crate::nn::layer::{Layer, LayerId};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::cell::RefCell;
use std::collections::HashMap;

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    // ========== 创建 ==========

    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_name(name: &str) -> Self {
        Self::with_config(GraphConfig {
            name: name.to_string(),
            ..GraphConfig::default()
        })
    }

    /// 创建一个带固定种子的计算图（确保可重复性）
    pub fn new_with_seed(seed: u64) -> Self {
        Self::with_config(GraphConfig {
            seed: Some(seed),
            ..GraphConfig::default()
        })
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            name: config.name.clone(),
            rng: config.seed.map(StdRng::seed_from_u64),
            config,
            layers: HashMap::new(),
            forward_edges: HashMap::new(),
            backward_edges: HashMap::new(),
            next_id: 0,
            last_forward_pass_id: 0,
            last_backward_pass_id: 0,
            phase: NetPhase::default(),
            hooks: LayerHooks::default(),
            forward_order: RefCell::new(None),
            backward_order: RefCell::new(None),
        }
    }

    // ========== 基础访问器 ==========

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// 设置/重置图的随机种子
    pub fn set_seed(&mut self, seed: u64) {
        self.config.seed = Some(seed);
        self.rng = Some(StdRng::seed_from_u64(seed));
    }

    /// 检查图是否有固定种子
    pub const fn has_seed(&self) -> bool {
        self.rng.is_some()
    }

    pub const fn phase(&self) -> NetPhase {
        self.phase
    }

    pub const fn last_forward_pass_id(&self) -> u64 {
        self.last_forward_pass_id
    }

    pub const fn last_backward_pass_id(&self) -> u64 {
        self.last_backward_pass_id
    }

    /// 所有层的 id（升序）
    pub fn layer_ids(&self) -> Vec<LayerId> {
        let mut ids: Vec<_> = self.layers.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn layers_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, id: LayerId) -> Result<&Layer, GraphError> {
        self.layers.get(&id).ok_or(GraphError::LayerNotFound(id))
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Result<&mut Layer, GraphError> {
        self.layers.get_mut(&id).ok_or(GraphError::LayerNotFound(id))
    }

    /// 按名称查找层
    pub fn find_layer(&self, name: &str) -> Option<LayerId> {
        self.layers
            .values()
            .find(|layer| layer.name() == name)
            .map(Layer::id)
    }

    // ========== 添加层 ==========

    /// 把层加入图中并分配 id（从1开始）。
    /// 名称为空时自动命名为`<类型>_<序号>`；与已有层重名则报错。
    pub fn add_layer(&mut self, mut layer: Layer) -> Result<LayerId, GraphError> {
        if layer.name().is_empty() {
            let name = self.generate_layer_name(layer.kind_name());
            layer.set_name(&name);
        } else if self.find_layer(layer.name()).is_some() {
            return Err(GraphError::DuplicateLayerName(format!(
                "层名称{}在图{}中已存在",
                layer.name(),
                self.name
            )));
        }

        self.next_id += 1;
        let id = LayerId(self.next_id);
        layer.set_id(id);
        layer.set_context(self.phase);
        log::debug!("图{}添加{layer}", self.name);

        self.layers.insert(id, layer);
        self.forward_edges.insert(id, Vec::new());
        self.backward_edges.insert(id, Vec::new());
        self.invalidate_schedule();
        Ok(id)
    }

    fn generate_layer_name(&self, kind_name: &str) -> String {
        let prefix = kind_name.to_lowercase();
        (1..)
            .map(|n| format!("{prefix}_{n}"))
            .find(|name| self.find_layer(name).is_none())
            .unwrap_or(prefix)
    }

    pub(in crate::nn::graph) fn invalidate_schedule(&self) {
        self.forward_order.replace(None);
        self.backward_order.replace(None);
    }
}
