//! # Neural Flow
//!
//! `neural_flow`是一个由层（layer）和信号（signal）构成的神经网络计算图执行引擎：
//! 层通过共享信号连接成有向无环图，引擎负责按依赖顺序驱动前向/反向传播、
//! 合并多个消费者贡献的梯度，并在批次结束后调用优化器更新权重。
//! 具体的数学运算（全连接、池化……）由可替换的计算核（kernel）实现。
//!

pub mod errors;
pub mod nn;
pub mod tensor;
pub mod utils;
