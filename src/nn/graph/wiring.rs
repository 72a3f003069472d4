/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : Graph 连接操作与拓扑查询
 *
 * connect 把生产者的输出信号“别名”到消费者的输入槽（共享存储而非拷贝），
 * 并维护正向/反向邻接表。
 */

use super::Graph;
use crate::errors::{GraphError, SlotDirection};
use crate::nn::layer::LayerId;
use crate::nn::signal::ChannelKind;
use std::collections::HashSet;
use std::rc::Rc;

impl Graph {
    // ========== 连接 ==========

    /// 把`head`的第`head_index`个输出连接到`tail`的第`tail_index`个输入。
    /// - 同一对槽位重复连接是幂等的；
    /// - 输入槽已绑定其他信号时返回`ConnectionConflict`；
    /// - 自环或成环时返回`CyclicConnection`；
    /// - 形状不一致时先尝试让`tail`推断输入形状。
    pub fn connect(
        &mut self,
        head: LayerId,
        tail: LayerId,
        head_index: usize,
        tail_index: usize,
    ) -> Result<(), GraphError> {
        let head_layer = self.layer(head)?;
        let tail_layer = self.layer(tail)?;
        if head == tail {
            return Err(GraphError::CyclicConnection(format!(
                "{head_layer}不能连接到自身"
            )));
        }
        head_layer.check_slot(SlotDirection::Output, head_index)?;
        tail_layer.check_slot(SlotDirection::Input, tail_index)?;

        // 幂等/冲突
        if let Some(existing) = tail_layer.input(tail_index) {
            if head_layer
                .output(head_index)
                .is_some_and(|out| Rc::ptr_eq(out, existing))
            {
                return Ok(());
            }
            if !tail_layer.has_placeholder_input(tail_index) {
                return Err(GraphError::ConnectionConflict {
                    layer: tail_layer.to_string(),
                    slot: tail_index,
                    message: format!("该输入槽已绑定其他信号，不能再连接{head_layer}的输出{head_index}"),
                });
            }
        }

        if self.reaches(tail, head) {
            return Err(GraphError::CyclicConnection(format!(
                "连接{head_layer}→{tail_layer}会形成环"
            )));
        }

        let head_kind = head_layer.output_kinds()[head_index];
        let tail_kind = tail_layer.input_kinds()[tail_index];
        if head_kind != tail_kind {
            return Err(GraphError::InvalidOperation(format!(
                "{head_layer}的输出{head_index}为{head_kind}通道，而{tail_layer}的输入{tail_index}为{tail_kind}通道"
            )));
        }

        let head_dims = match head_layer.output(head_index) {
            Some(signal) => signal.dims(),
            None => head_layer.output_dimensions()[head_index],
        };

        // 形状推断
        let tail_layer = self.layer_mut(tail)?;
        if tail_layer.input_dimensions().get(tail_index) != Some(&head_dims) {
            tail_layer.set_input_shape(head_dims)?;
            let inferred = tail_layer.input_dimensions().get(tail_index).copied();
            if inferred != Some(head_dims) {
                return Err(GraphError::ShapeMismatch {
                    layer: tail_layer.to_string(),
                    message: format!(
                        "输入槽{tail_index}推断后为{}，与上游输出{head_dims}不一致",
                        inferred.unwrap_or_default()
                    ),
                });
            }
        }

        let signal = self.layer_mut(head)?.ensure_output(head_index)?;
        // setup 时为根层分配的外部输入占位信号让位给上游输出
        let tail_layer = self.layer_mut(tail)?;
        tail_layer.release_placeholder_input(tail_index);
        tail_layer.attach_input(tail_index, signal)?;

        Self::add_edge(&mut self.forward_edges, head, tail);
        Self::add_edge(&mut self.backward_edges, tail, head);
        self.invalidate_schedule();
        log::debug!(
            "连接 {}[{head_index}] → {}[{tail_index}]",
            self.layer(head)?,
            self.layer(tail)?
        );
        Ok(())
    }

    /// 让`target`的输入槽共享`source`的输入信号（如权重绑定）；不建立邻接关系
    pub fn tie_input(
        &mut self,
        source: LayerId,
        source_index: usize,
        target: LayerId,
        target_index: usize,
    ) -> Result<(), GraphError> {
        let signal = self.layer_mut(source)?.ensure_input(source_index)?;
        let target_layer = self.layer_mut(target)?;
        target_layer.check_slot(SlotDirection::Input, target_index)?;
        let expected = target_layer.input_dimensions().get(target_index).copied();
        if expected != Some(signal.dims()) {
            return Err(GraphError::ShapeMismatch {
                layer: target_layer.to_string(),
                message: format!(
                    "输入槽{target_index}期望{}，共享的信号为{}",
                    expected.unwrap_or_default(),
                    signal.dims()
                ),
            });
        }
        target_layer.attach_input(target_index, signal)?;
        log::debug!("{target_layer}的输入{target_index}共享了层{source}的输入{source_index}");
        Ok(())
    }

    // ========== 拓扑查询 ==========

    /// 消费本层输出的层（按 id 升序）
    pub fn children(&self, id: LayerId) -> Result<Vec<LayerId>, GraphError> {
        Self::sorted_edges(&self.forward_edges, id)
    }

    /// 产生本层输入的层（按 id 升序）
    pub fn dependencies(&self, id: LayerId) -> Result<Vec<LayerId>, GraphError> {
        Self::sorted_edges(&self.backward_edges, id)
    }

    pub fn is_root(&self, id: LayerId) -> Result<bool, GraphError> {
        Ok(self.dependencies(id)?.is_empty())
    }

    pub fn is_leaf(&self, id: LayerId) -> Result<bool, GraphError> {
        Ok(self.children(id)?.is_empty())
    }

    /// 没有依赖的层（按 id 升序）
    pub fn roots(&self) -> Vec<LayerId> {
        self.layer_ids()
            .into_iter()
            .filter(|id| self.backward_edges.get(id).is_none_or(Vec::is_empty))
            .collect()
    }

    /// 没有子层的层（按 id 升序）
    pub fn leaves(&self) -> Vec<LayerId> {
        self.layer_ids()
            .into_iter()
            .filter(|id| self.forward_edges.get(id).is_none_or(Vec::is_empty))
            .collect()
    }

    /// 接收外部数据的层：即根层
    pub fn input_layers(&self) -> Vec<LayerId> {
        self.roots()
    }

    /// 对外产生结果的层：即叶子层
    pub fn output_layers(&self) -> Vec<LayerId> {
        self.leaves()
    }

    /// 根层的所有data输入槽，按层 id、槽序排列
    pub(in crate::nn::graph) fn external_input_slots(&self) -> Vec<(LayerId, usize)> {
        self.roots()
            .into_iter()
            .flat_map(|id| {
                let layer = &self.layers[&id];
                layer
                    .input_kinds()
                    .iter()
                    .enumerate()
                    .filter(|(_, kind)| **kind == ChannelKind::Data)
                    .map(move |(index, _)| (id, index))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// 叶子层的所有data输出槽，按层 id、槽序排列
    pub(in crate::nn::graph) fn external_output_slots(&self) -> Vec<(LayerId, usize)> {
        self.leaves()
            .into_iter()
            .flat_map(|id| {
                let layer = &self.layers[&id];
                layer
                    .output_kinds()
                    .iter()
                    .enumerate()
                    .filter(|(_, kind)| **kind == ChannelKind::Data)
                    .map(move |(index, _)| (id, index))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// 沿正向边从`from`出发能否到达`to`
    fn reaches(&self, from: LayerId, to: LayerId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if visited.insert(id) {
                if let Some(children) = self.forward_edges.get(&id) {
                    stack.extend(children.iter().copied());
                }
            }
        }
        false
    }

    fn add_edge(
        edges: &mut std::collections::HashMap<LayerId, Vec<LayerId>>,
        from: LayerId,
        to: LayerId,
    ) {
        let targets = edges.entry(from).or_default();
        if !targets.contains(&to) {
            targets.push(to);
        }
    }

    fn sorted_edges(
        edges: &std::collections::HashMap<LayerId, Vec<LayerId>>,
        id: LayerId,
    ) -> Result<Vec<LayerId>, GraphError> {
        let mut ids = edges.get(&id).cloned().ok_or(GraphError::LayerNotFound(id))?;
        ids.sort();
        Ok(ids)
    }
}
