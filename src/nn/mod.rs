/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 负责神经网络计算图（层 + 信号）的构建与执行
 */

pub mod config;
pub mod descriptor;
mod graph;
pub mod init;
pub mod kernel;
pub mod layer;
pub mod optimizer;
pub mod shape;
pub mod signal;
pub mod state;

pub use config::GraphConfig;
pub use descriptor::{GraphDescriptor, LayerDescriptor};
pub use graph::{Graph, LayerHook, LayerHooks};
pub use init::Init;
pub use kernel::{
    AveragePool, BackendType, CustomKernel, FullyConnected, Identity, Kernel, LayerKernel,
    NetPhase, Sum,
};
pub use layer::{InitFn, Layer, LayerId, NeuronView};
pub use optimizer::{Adam, Optimizer, PARALLEL_UPDATE_THRESHOLD, SGD};
pub use shape::{Dim3, Position};
pub use signal::{ChannelKind, Signal, SignalRef};
pub use state::{GraphState, Knowledge, LayerState};

#[cfg(test)]
mod tests;
