/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : Graph 模块：由层和信号构成的计算图
 *
 * 各 impl 块分散在子模块中：
 * - core.rs: 创建、基础访问器、添加层
 * - wiring.rs: connect/tie_input 及拓扑查询
 * - schedule.rs: 前向/反向调度顺序（按依赖就绪）
 * - passes.rs: setup、前向/反向传播、权重更新
 * - describe.rs: describe/summary、可见性与钩子
 * - serialization.rs: 参数包的导出、加载与文件读写
 */

mod core;
mod describe;
mod passes;
mod schedule;
mod serialization;
mod wiring;

use super::config::GraphConfig;
use super::kernel::NetPhase;
use super::layer::{Layer, LayerId};
use rand::rngs::StdRng;
use std::cell::RefCell;
use std::collections::HashMap;

/// 层被隐藏/展开时的回调（供可视化协作方使用）
pub type LayerHook = Box<dyn FnMut(&Layer)>;

/// 可视化相关的回调集合，由调用方显式传入
#[derive(Default)]
pub struct LayerHooks {
    /// 层由可见变为隐藏时调用
    pub on_hide: Option<LayerHook>,
    /// 层被展开（其子层变为可见）时调用
    pub on_expand: Option<LayerHook>,
}

/// 计算图：持有所有层，层之间通过共享信号相连
pub struct Graph {
    name: String,
    config: GraphConfig,
    layers: HashMap<LayerId, Layer>,
    /// 正向边：生产者 -> 消费者
    forward_edges: HashMap<LayerId, Vec<LayerId>>,
    /// 反向边：消费者 -> 生产者
    backward_edges: HashMap<LayerId, Vec<LayerId>>,
    next_id: u64,
    /// 最后一次前向传播的 id
    last_forward_pass_id: u64,
    /// 最后一次反向传播的 id
    last_backward_pass_id: u64,
    phase: NetPhase,
    hooks: LayerHooks,
    /// 图级别的随机数生成器（用于派生初始化回调）
    /// None 表示不可复现
    rng: Option<StdRng>,
    /// 缓存的调度顺序，添加层或连接时失效
    forward_order: RefCell<Option<Vec<LayerId>>>,
    backward_order: RefCell<Option<Vec<LayerId>>>,
}
