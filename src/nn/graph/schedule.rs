/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 前向/反向调度
 *
 * 一个层只有在其所有依赖（前向）或所有子层（反向）都已访问过时才就绪，
 * 因此汇合点（多个依赖）不会被提前执行。访问标记只在计算顺序时临时使用，
 * 结果缓存至下一次 add_layer/connect。
 */

use super::Graph;
use crate::nn::layer::LayerId;
use std::collections::{HashMap, HashSet, VecDeque};

impl Graph {
    /// 前向执行顺序：从根层出发，依赖全部访问后才访问
    pub fn forward_order(&self) -> Vec<LayerId> {
        if let Some(order) = self.forward_order.borrow().as_ref() {
            return order.clone();
        }
        let order = Self::ready_order(self.roots(), &self.backward_edges, &self.forward_edges);
        self.forward_order.replace(Some(order.clone()));
        order
    }

    /// 反向执行顺序：从叶子层出发，子层全部访问后才访问
    pub fn backward_order(&self) -> Vec<LayerId> {
        if let Some(order) = self.backward_order.borrow().as_ref() {
            return order.clone();
        }
        let order = Self::ready_order(self.leaves(), &self.forward_edges, &self.backward_edges);
        self.backward_order.replace(Some(order.clone()));
        order
    }

    /// 本次前向传播中，`id`的所有依赖是否都已执行
    pub(in crate::nn::graph) fn visited_dependencies(&self, id: LayerId, pass_id: u64) -> bool {
        self.backward_edges
            .get(&id)
            .into_iter()
            .flatten()
            .all(|dep| self.layers[dep].is_forward_visited(pass_id))
    }

    /// 本次反向传播中，`id`的所有子层是否都已执行
    pub(in crate::nn::graph) fn visited_children(&self, id: LayerId, pass_id: u64) -> bool {
        self.forward_edges
            .get(&id)
            .into_iter()
            .flatten()
            .all(|child| self.layers[child].is_backward_visited(pass_id))
    }

    /// `waits_on`：就绪前必须先访问的邻居；`next`：访问后继续前进的方向
    fn ready_order(
        starts: Vec<LayerId>,
        waits_on: &HashMap<LayerId, Vec<LayerId>>,
        next: &HashMap<LayerId, Vec<LayerId>>,
    ) -> Vec<LayerId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<LayerId> = starts.into();

        while let Some(id) = queue.pop_front() {
            if visited.contains(&id) {
                continue;
            }
            let ready = waits_on
                .get(&id)
                .into_iter()
                .flatten()
                .all(|other| visited.contains(other));
            // 未就绪：最后一个被访问的邻居会再次把它放入队列
            if !ready {
                continue;
            }
            visited.insert(id);
            order.push(id);

            let mut following = next.get(&id).cloned().unwrap_or_default();
            following.sort();
            queue.extend(following);
        }
        order
    }
}
