/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 信号（Signal）：层与层之间共享的数据边
 *
 * 一个信号同时持有按样本索引的值缓冲（value）与梯度累加缓冲（gradient）。
 * 信号以 `Rc<Signal>` 的形式被多个层共享（扇出、权重共享），
 * 身份由指针决定而不是由内容决定。
 *
 * 批次策略：物理存储只增不减；另外记录当前批次的“有效样本数”，
 * 所以较小的批次只是逻辑截断，不会引起重新分配。
 */

use super::LayerId;
use super::shape::Dim3;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 全局递增的信号 id，进程内不会复用
static NEXT_SIGNAL_ID: AtomicU64 = AtomicU64::new(1);

/// 共享的信号句柄
pub type SignalRef = Rc<Signal>;

/// 信号承载内容的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    Data,
    Weight,
    Bias,
}

impl ChannelKind {
    /// 是否为需要学习的参数（权重或偏置）
    pub const fn is_trainable_weight(&self) -> bool {
        matches!(self, Self::Weight | Self::Bias)
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Data => "data",
            Self::Weight => "weight",
            Self::Bias => "bias",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug)]
pub struct Signal {
    id: u64,
    kind: ChannelKind,
    dims: Dim3,
    /// 产生该信号的层；外部注入的输入及参数信号为None
    producer: Option<LayerId>,
    /// 当前批次的有效样本数
    samples: Cell<usize>,
    value: RefCell<Vec<Tensor>>,
    gradient: RefCell<Vec<Tensor>>,
}

impl Signal {
    /// 新建的信号在两个缓冲中各含一个全零样本
    pub fn new(dims: Dim3, kind: ChannelKind, producer: Option<LayerId>) -> Self {
        let zeros = Tensor::zeros(&dims.to_shape());
        Self {
            id: NEXT_SIGNAL_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            dims,
            producer,
            samples: Cell::new(1),
            value: RefCell::new(vec![zeros.clone()]),
            gradient: RefCell::new(vec![zeros]),
        }
    }

    pub fn new_ref(dims: Dim3, kind: ChannelKind, producer: Option<LayerId>) -> SignalRef {
        Rc::new(Self::new(dims, kind, producer))
    }

    /// 信号的唯一 id（优化器用它区分参数缓冲）
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub const fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub const fn dims(&self) -> Dim3 {
        self.dims
    }

    pub const fn producer(&self) -> Option<LayerId> {
        self.producer
    }

    /// 是否为参数信号（权重/偏置）：只有一个值缓冲，梯度行随批次增长
    pub const fn is_parameter(&self) -> bool {
        self.kind.is_trainable_weight()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.get()
    }

    /// 将有效样本数设为`sample_count`；物理存储不足时用首个样本作模板扩充，但从不收缩
    pub fn resize(&self, sample_count: usize) {
        fn grow(buffer: &mut Vec<Tensor>, sample_count: usize) {
            if buffer.len() < sample_count {
                let template = buffer[0].clone();
                buffer.resize(sample_count, template);
            }
        }

        if !self.is_parameter() {
            grow(&mut self.value.borrow_mut(), sample_count);
        }
        grow(&mut self.gradient.borrow_mut(), sample_count);
        self.samples.set(sample_count);
    }

    /// 当前批次的值；参数信号总是返回唯一的参数缓冲
    pub fn value(&self) -> Ref<'_, [Tensor]> {
        let len = self.value_len();
        Ref::map(self.value.borrow(), |v| &v[..len])
    }

    pub fn value_mut(&self) -> RefMut<'_, [Tensor]> {
        let len = self.value_len();
        RefMut::map(self.value.borrow_mut(), |v| &mut v[..len])
    }

    /// 参数缓冲（即首个值缓冲）
    pub fn parameter(&self) -> Ref<'_, Tensor> {
        Ref::map(self.value.borrow(), |v| &v[0])
    }

    pub fn parameter_mut(&self) -> RefMut<'_, Tensor> {
        RefMut::map(self.value.borrow_mut(), |v| &mut v[0])
    }

    /// 当前批次的梯度累加行
    pub fn gradient(&self) -> Ref<'_, [Tensor]> {
        let len = self.samples.get();
        Ref::map(self.gradient.borrow(), |g| &g[..len])
    }

    pub fn gradient_mut(&self) -> RefMut<'_, [Tensor]> {
        let len = self.samples.get();
        RefMut::map(self.gradient.borrow_mut(), |g| &mut g[..len])
    }

    /// 用`rows`覆盖当前批次的值（批次大小随之改变）。
    /// 调用方负责保证每行形状与`dims`一致。
    pub fn set_data(&self, rows: &[Tensor]) {
        self.resize(rows.len());
        for (dst, src) in self.value_mut().iter_mut().zip(rows) {
            dst.clone_from(src);
        }
    }

    /// 用`rows`覆盖当前批次的梯度（批次大小随之改变）
    pub fn set_gradients(&self, rows: &[Tensor]) {
        self.resize(rows.len());
        for (dst, src) in self.gradient_mut().iter_mut().zip(rows) {
            dst.clone_from(src);
        }
    }

    /// 清零全部（含当前批次之外的）梯度行
    pub fn clear_gradients(&self) {
        for row in self.gradient.borrow_mut().iter_mut() {
            row.fill(0.0);
        }
    }

    /// 把一份梯度贡献逐行加到累加缓冲上（加法满足交换律，与贡献到达的先后无关）
    pub fn accumulate_gradients(&self, contributions: &[Tensor]) {
        for (acc, contribution) in self.gradient_mut().iter_mut().zip(contributions) {
            *acc += contribution;
        }
    }

    /// 将当前批次的所有梯度行合并（求和）为一个张量
    pub fn merge_gradients(&self) -> Tensor {
        let mut merged = Tensor::zeros(&self.dims.to_shape());
        for row in self.gradient().iter() {
            merged += row;
        }
        merged
    }

    fn value_len(&self) -> usize {
        if self.is_parameter() {
            1
        } else {
            self.samples.get()
        }
    }
}
