/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : Graph 只读查询（describe/summary/neuron）与可见性钩子
 */

use super::{Graph, LayerHooks};
use crate::errors::GraphError;
use crate::nn::descriptor::{GraphDescriptor, LayerDescriptor};
use crate::nn::layer::{LayerId, NeuronView};
use crate::nn::shape::Position;

impl Graph {
    // ========== 描述 ==========

    /// 生成图的可序列化描述（层按 id 升序）
    pub fn describe(&self) -> GraphDescriptor {
        let mut descriptor = GraphDescriptor::new(&self.name);
        for id in self.layer_ids() {
            let layer = &self.layers[&id];
            let to_raw = |ids: Option<&Vec<LayerId>>| {
                let mut raw: Vec<u64> = ids.into_iter().flatten().map(|id| id.0).collect();
                raw.sort_unstable();
                raw
            };
            let input_dimensions = layer.input_dimensions();
            let param_count = layer
                .input_kinds()
                .iter()
                .zip(&input_dimensions)
                .filter(|(kind, _)| kind.is_trainable_weight())
                .map(|(_, dims)| dims.size())
                .sum();

            descriptor.add_layer(LayerDescriptor {
                id: id.0,
                name: layer.name().to_string(),
                kernel: layer.kind_name().to_string(),
                input_kinds: layer.input_kinds().to_vec(),
                output_kinds: layer.output_kinds().to_vec(),
                input_dimensions,
                output_dimensions: layer.output_dimensions(),
                trainable: layer.is_trainable(),
                initialized: layer.is_initialized(),
                visible: layer.is_visible(),
                dependencies: to_raw(self.backward_edges.get(&id)),
                children: to_raw(self.forward_edges.get(&id)),
                param_count,
            });
        }
        descriptor
    }

    /// 文本形式的模型摘要（markdown 表格）
    pub fn summary(&self) -> String {
        let desc = self.describe();
        let mut output = format!("# 模型摘要: {}\n\n", desc.name);
        output.push_str("| 层名称 | 类型 | 输出形状 | 参数量 | 上游层 |\n");
        output.push_str("|--------|------|----------|--------|--------|\n");

        for layer in &desc.layers {
            let shapes = layer
                .output_dimensions
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let params = if layer.param_count == 0 {
                "-".to_string()
            } else {
                Self::format_number(layer.param_count)
            };
            let dependencies = layer
                .dependencies
                .iter()
                .filter_map(|dep| desc.layers.iter().find(|l| l.id == *dep))
                .map(|l| l.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let dependencies = if dependencies.is_empty() {
                "-".to_string()
            } else {
                dependencies
            };
            output.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                layer.name, layer.kernel, shapes, params, dependencies
            ));
        }

        output.push_str(&format!(
            "\n**总参数量**: {}\n",
            Self::format_number(desc.total_params())
        ));
        output
    }

    /// 千分位格式化
    fn format_number(n: usize) -> String {
        let digits = n.to_string();
        let mut result = String::new();
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                result.push(',');
            }
            result.push(c);
        }
        result
    }

    /// 查询层`id`在输出位置`position`处的连接关系
    pub fn neuron(&self, id: LayerId, position: Position) -> Result<NeuronView, GraphError> {
        let layer = self.layer(id)?;
        let dims = layer.output_size();
        if !dims.contains(position) {
            return Err(GraphError::InvalidOperation(format!(
                "{layer}的输出形状为{dims}，位置{position:?}越界"
            )));
        }
        Ok(layer.neuron(position))
    }

    // ========== 可见性 ==========

    pub fn set_hooks(&mut self, hooks: LayerHooks) {
        self.hooks = hooks;
    }

    /// 设置层的可见性；由可见变为隐藏时调用`on_hide`
    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> Result<(), GraphError> {
        let layer = self.layers.get_mut(&id).ok_or(GraphError::LayerNotFound(id))?;
        let was_visible = layer.is_visible();
        layer.set_visible(visible);
        if was_visible && !visible {
            if let Some(on_hide) = self.hooks.on_hide.as_mut() {
                on_hide(layer);
            }
        }
        Ok(())
    }

    /// 展开层`id`：自身及其子层都变为可见，然后调用`on_expand`
    pub fn expand(&mut self, id: LayerId) -> Result<(), GraphError> {
        let children = self.children(id)?;
        for child in &children {
            self.layer_mut(*child)?.set_visible(true);
        }
        let layer = self.layers.get_mut(&id).ok_or(GraphError::LayerNotFound(id))?;
        layer.set_visible(true);
        if let Some(on_expand) = self.hooks.on_expand.as_mut() {
            on_expand(layer);
        }
        log::debug!("展开{layer}（{}个子层）", children.len());
        Ok(())
    }
}
