/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : Graph setup、前向/反向传播与权重更新
 */

use super::Graph;
use crate::errors::GraphError;
use crate::nn::kernel::NetPhase;
use crate::nn::layer::LayerId;
use crate::nn::optimizer::Optimizer;
use crate::nn::signal::ChannelKind;
use crate::tensor::Tensor;
use std::collections::HashSet;

impl Graph {
    // ========== setup ==========

    /// 先校验所有层，全部通过后才逐层 setup（不存在部分成功）
    pub fn setup(&mut self, reset_weight: bool) -> Result<(), GraphError> {
        let ids = self.layer_ids();
        for &id in &ids {
            self.validate_layer(id)?;
        }
        for &id in &ids {
            self.layer_mut(id)?.setup(reset_weight)?;
        }
        log::debug!(
            "图{}的{}个层 setup 完成（reset_weight={reset_weight}）",
            self.name,
            ids.len()
        );
        Ok(())
    }

    /// 单独 setup 一个层
    pub fn setup_layer(&mut self, id: LayerId, reset_weight: bool) -> Result<(), GraphError> {
        self.validate_layer(id)?;
        self.layer_mut(id)?.setup(reset_weight)
    }

    /// 非根层的每个data输入都必须已连接
    fn validate_layer(&self, id: LayerId) -> Result<(), GraphError> {
        let layer = self.layer(id)?;
        layer.validate()?;
        if self.is_root(id)? {
            return Ok(());
        }
        let unconnected = layer
            .input_kinds()
            .iter()
            .enumerate()
            .find(|&(index, kind)| *kind == ChannelKind::Data && layer.input(index).is_none());
        if let Some((index, _)) = unconnected {
            return Err(GraphError::ShapeMismatch {
                layer: layer.to_string(),
                message: format!(
                    "声明了{}个输入槽，但data输入槽{index}尚未连接",
                    layer.input_kinds().len()
                ),
            });
        }
        Ok(())
    }

    // ========== 前向 ==========

    /// 向根层`root`写入外部数据（每组对应一个data输入槽）
    pub fn set_input_data(&mut self, root: LayerId, data: &[Vec<Tensor>]) -> Result<(), GraphError> {
        if !self.is_root(root)? {
            return Err(GraphError::InvalidOperation(format!(
                "{}不是根层，其输入由上游层产生",
                self.layer(root)?
            )));
        }
        self.layer_mut(root)?.set_input_data(data)
    }

    /// 完整的前向传播：`inputs`按根层 id、data槽序依次分配，
    /// 返回叶子层的data输出（同样按层 id、槽序排列）
    pub fn forward(&mut self, inputs: &[Vec<Tensor>]) -> Result<Vec<Vec<Tensor>>, GraphError> {
        let slots = self.external_input_slots();
        if slots.len() != inputs.len() {
            return Err(GraphError::InvalidOperation(format!(
                "图{}共有{}个外部data输入槽，但提供了{}组数据",
                self.name,
                slots.len(),
                inputs.len()
            )));
        }
        for (&(id, index), rows) in slots.iter().zip(inputs) {
            let layer = self.layer(id)?;
            let shape = layer.input_dimensions()[index].to_shape();
            if let Some(bad) = rows.iter().find(|t| t.shape() != &shape[..]) {
                return Err(GraphError::ShapeMismatch {
                    layer: layer.to_string(),
                    message: format!("输入槽{index}的样本形状应为{shape:?}，实际为{:?}", bad.shape()),
                });
            }
        }
        for (&(id, index), rows) in slots.iter().zip(inputs) {
            self.layer_mut(id)?.ensure_input(index)?.set_data(rows);
        }

        self.run_forward()?;

        let outputs = self.external_output_slots();
        Ok(outputs
            .into_iter()
            .map(|(id, index)| {
                self.layers[&id]
                    .output(index)
                    .map(|signal| signal.value().to_vec())
                    .unwrap_or_default()
            })
            .collect())
    }

    /// 按前向顺序执行所有层（输入数据须已写入）
    pub fn run_forward(&mut self) -> Result<(), GraphError> {
        let pass_id = self.last_forward_pass_id + 1;
        let order = self.forward_order();
        log::debug!("图{}开始第{pass_id}次前向传播（{}个层）", self.name, order.len());

        for id in order {
            if !self.visited_dependencies(id, pass_id) {
                return Err(GraphError::InvalidOperation(format!(
                    "{}的依赖尚未全部执行",
                    self.layer(id)?
                )));
            }
            let layer = self.layer_mut(id)?;
            layer.forward()?;
            layer.set_last_forward_pass_id(pass_id);
        }

        self.last_forward_pass_id = pass_id;
        Ok(())
    }

    // ========== 反向 ==========

    /// 向叶子层`leaf`写入下游梯度（每组对应一个data输出槽）
    pub fn set_output_gradients(
        &mut self,
        leaf: LayerId,
        grads: &[Vec<Tensor>],
    ) -> Result<(), GraphError> {
        if !self.is_leaf(leaf)? {
            return Err(GraphError::InvalidOperation(format!(
                "{}不是叶子层，其输出梯度由下游层产生",
                self.layer(leaf)?
            )));
        }
        self.layer_mut(leaf)?.set_output_gradients(grads)
    }

    /// 完整的反向传播：`output_grads`按叶子层 id、data输出槽序依次分配，
    /// 返回根层各data输入上累加的梯度（顺序与`forward`的输入一致）
    pub fn backward(
        &mut self,
        output_grads: &[Vec<Tensor>],
    ) -> Result<Vec<Vec<Tensor>>, GraphError> {
        let slots = self.external_output_slots();
        if slots.len() != output_grads.len() {
            return Err(GraphError::InvalidOperation(format!(
                "图{}共有{}个对外data输出槽，但提供了{}组梯度",
                self.name,
                slots.len(),
                output_grads.len()
            )));
        }
        for (&(id, index), rows) in slots.iter().zip(output_grads) {
            let layer = self.layer(id)?;
            let shape = layer.output_dimensions()[index].to_shape();
            if let Some(bad) = rows.iter().find(|t| t.shape() != &shape[..]) {
                return Err(GraphError::ShapeMismatch {
                    layer: layer.to_string(),
                    message: format!("输出槽{index}的梯度形状应为{shape:?}，实际为{:?}", bad.shape()),
                });
            }
        }
        for (&(id, index), rows) in slots.iter().zip(output_grads) {
            self.layer_mut(id)?.ensure_output(index)?.set_gradients(rows);
        }

        self.run_backward()?;

        Ok(self
            .external_input_slots()
            .into_iter()
            .map(|(id, index)| {
                self.layers[&id]
                    .input(index)
                    .map(|signal| signal.gradient().to_vec())
                    .unwrap_or_default()
            })
            .collect())
    }

    /// 按反向顺序执行所有层（下游梯度须已写入）
    pub fn run_backward(&mut self) -> Result<(), GraphError> {
        let pass_id = self.last_backward_pass_id + 1;
        let order = self.backward_order();
        log::debug!("图{}开始第{pass_id}次反向传播（{}个层）", self.name, order.len());

        for id in order {
            if !self.visited_children(id, pass_id) {
                return Err(GraphError::InvalidOperation(format!(
                    "{}的子层尚未全部执行",
                    self.layer(id)?
                )));
            }
            let layer = self.layer_mut(id)?;
            layer.backward()?;
            layer.set_last_backward_pass_id(pass_id);
        }

        self.last_backward_pass_id = pass_id;
        Ok(())
    }

    // ========== 训练 ==========

    /// 逐层更新权重；被多层共享的参数信号只交给优化器一次
    pub fn update_weights(
        &mut self,
        optimizer: &mut dyn Optimizer,
        batch_size: usize,
    ) -> Result<(), GraphError> {
        if batch_size == 0 {
            return Err(GraphError::InvalidOperation(format!(
                "图{}更新权重时批次大小不能为0",
                self.name
            )));
        }
        let threshold = self.config.parallel_update_threshold;
        let mut updated = HashSet::new();
        for id in self.layer_ids() {
            self.layer_mut(id)?
                .update_weights_with(optimizer, batch_size, threshold, &mut updated)?;
        }
        if updated.is_empty() {
            log::warn!("图{}中没有可更新的参数", self.name);
        }
        Ok(())
    }

    /// 按名称逐层比较两个图的参数
    pub fn has_same_weights(&self, other: &Self, eps: f32) -> bool {
        if self.layers.len() != other.layers.len() {
            return false;
        }
        self.layers.values().all(|layer| {
            other
                .find_layer(layer.name())
                .and_then(|id| other.layers.get(&id))
                .is_some_and(|peer| layer.has_same_weights(peer, eps))
        })
    }

    /// 切换训练/测试阶段，并通知每个层的计算核
    pub fn set_phase(&mut self, phase: NetPhase) {
        self.phase = phase;
        for layer in self.layers.values_mut() {
            layer.set_context(phase);
        }
    }
}
