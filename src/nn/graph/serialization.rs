/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : Graph 参数包的导出/加载与文件读写
 *
 * 文件扩展名为`.json`时使用 JSON（serde_json），否则使用二进制（bincode）。
 * 加载时先校验参数包中的全部条目，全部通过后才写入任何缓冲。
 */

use super::Graph;
use crate::errors::GraphError;
use crate::nn::init::Init;
use crate::nn::layer::InitFn;
use crate::nn::state::GraphState;
use rand::RngCore;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

impl Graph {
    /// 导出所有层的参数包（按层 id 升序）
    pub fn state(&self) -> GraphState {
        GraphState::new(
            self.layer_ids()
                .into_iter()
                .map(|id| self.layers[&id].state())
                .collect(),
        )
    }

    /// 按层名加载参数包；任一条目校验失败则不改动任何层
    pub fn load_state(&mut self, state: &GraphState) -> Result<(), GraphError> {
        let mut targets = Vec::with_capacity(state.layers.len());
        for layer_state in &state.layers {
            match self.find_layer(&layer_state.name) {
                Some(id) => {
                    self.layer(id)?.check_state(layer_state)?;
                    targets.push((id, layer_state));
                }
                None => log::warn!(
                    "图{}中没有名为{}的层，忽略该参数",
                    self.name,
                    layer_state.name
                ),
            }
        }
        if targets.len() < self.layers.len() {
            log::warn!(
                "参数包只覆盖了图{}中{}/{}个层",
                self.name,
                targets.len(),
                self.layers.len()
            );
        }

        for (id, layer_state) in targets {
            self.layer_mut(id)?.load_state(layer_state)?;
        }
        Ok(())
    }

    /// 保存参数包到文件
    pub fn save_state<P: AsRef<Path>>(&self, path: P) -> Result<(), GraphError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            GraphError::Persistence(format!("无法创建参数文件{}: {e}", path.display()))
        })?;
        let writer = BufWriter::new(file);
        let state = self.state();

        if Self::is_json(path) {
            serde_json::to_writer_pretty(writer, &state)
                .map_err(|e| GraphError::Persistence(format!("写入 JSON 参数失败: {e}")))?;
        } else {
            bincode::serialize_into(writer, &state)
                .map_err(|e| GraphError::Persistence(format!("写入二进制参数失败: {e}")))?;
        }
        log::debug!("图{}的参数已保存到{}", self.name, path.display());
        Ok(())
    }

    /// 从文件加载参数包
    pub fn load_state_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), GraphError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            GraphError::Persistence(format!("无法打开参数文件{}: {e}", path.display()))
        })?;
        let reader = BufReader::new(file);

        let state: GraphState = if Self::is_json(path) {
            serde_json::from_reader(reader)
                .map_err(|e| GraphError::Persistence(format!("解析 JSON 参数失败: {e}")))?
        } else {
            bincode::deserialize_from(reader)
                .map_err(|e| GraphError::Persistence(format!("解析二进制参数失败: {e}")))?
        };
        self.load_state(&state)
    }

    /// 派生一个初始化回调；图有种子时，回调的结果可复现
    pub fn init_fn(&mut self, init: Init) -> InitFn {
        let seed = self.rng.as_mut().map(RngCore::next_u64);
        init.into_callback(seed)
    }

    fn is_json(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"))
    }
}
