/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 层（Layer）：计算图中的节点
 *
 * 层持有有序的输入/输出信号槽及其通道类型，并把计算委托给计算核（kernel）。
 * 本文件负责与具体数学无关的通用部分：
 * - setup 状态机（分配输出信号、权重初始化）；
 * - 单层的前向/反向步骤（收集缓冲、调整批次、合并梯度）；
 * - 权重更新（合并梯度 → 按批次缩放 → 调用优化器 → 清空）；
 * - 参数包的导出/加载。
 */

use super::kernel::{AveragePool, FullyConnected, Identity, Kernel, LayerKernel, NetPhase, Sum};
use super::optimizer::{Optimizer, PARALLEL_UPDATE_THRESHOLD};
use super::shape::{Dim3, Position};
use super::signal::{ChannelKind, Signal, SignalRef};
use super::state::{Knowledge, LayerState};
use crate::errors::{GraphError, SlotDirection};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// 层在图中的唯一编号（由图分配，从1开始；0表示尚未加入任何图）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u64);

impl LayerId {
    pub const UNASSIGNED: Self = Self(0);
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 权重/偏置初始化回调：`(缓冲, fan_in, fan_out)`
pub type InitFn = Box<dyn FnMut(&mut Tensor, usize, usize)>;

/// 某个输出位置（神经元）的连接关系，供可视化使用
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NeuronView {
    pub position: Position,
    pub inputs: Vec<Position>,
    pub weights: Vec<Position>,
    pub bias: Option<Position>,
}

pub struct Layer {
    id: LayerId,
    name: String,
    kernel: Kernel,
    input_kinds: Vec<ChannelKind>,
    output_kinds: Vec<ChannelKind>,
    inputs: Vec<Option<SignalRef>>,
    outputs: Vec<Option<SignalRef>>,
    trainable: bool,
    initialized: bool,
    visible: bool,
    /// 最后一次参与的前向/反向传播 id（即按 pass 计的“visited”标记）
    last_forward_pass_id: u64,
    last_backward_pass_id: u64,
    weight_init: Option<InitFn>,
    bias_init: Option<InitFn>,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "层[id={}, name={}, type={}]",
            self.id,
            self.name,
            self.kernel.kind_name()
        )
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kernel", &self.kernel.kind_name())
            .field("input_kinds", &self.input_kinds)
            .field("output_kinds", &self.output_kinds)
            .field("trainable", &self.trainable)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Layer {
    // ========== 创建 ==========

    pub fn new<K: Into<Kernel>>(
        name: &str,
        input_kinds: &[ChannelKind],
        output_kinds: &[ChannelKind],
        kernel: K,
    ) -> Self {
        Self {
            id: LayerId::UNASSIGNED,
            name: name.to_string(),
            kernel: kernel.into(),
            input_kinds: input_kinds.to_vec(),
            output_kinds: output_kinds.to_vec(),
            inputs: vec![None; input_kinds.len()],
            outputs: vec![None; output_kinds.len()],
            trainable: true,
            initialized: false,
            visible: false,
            last_forward_pass_id: 0,
            last_backward_pass_id: 0,
            weight_init: None,
            bias_init: None,
        }
    }

    pub fn identity(name: &str, dims: Dim3) -> Self {
        Self::new(
            name,
            &[ChannelKind::Data],
            &[ChannelKind::Data],
            Identity::new(dims),
        )
    }

    pub fn fully_connected(name: &str, in_size: usize, out_size: usize, has_bias: bool) -> Self {
        Self::from_fully_connected(name, FullyConnected::new(in_size, out_size, has_bias))
    }

    /// 用已构造好的全连接核建层（如指定了后端的核）
    pub fn from_fully_connected(name: &str, kernel: FullyConnected) -> Self {
        let mut input_kinds = vec![ChannelKind::Data, ChannelKind::Weight];
        if kernel.has_bias() {
            input_kinds.push(ChannelKind::Bias);
        }
        Self::new(name, &input_kinds, &[ChannelKind::Data], kernel)
    }

    pub fn average_pool(name: &str, input: Dim3, pool: usize) -> Self {
        let mut layer = Self::new(
            name,
            &[ChannelKind::Data],
            &[ChannelKind::Data],
            AveragePool::new(input, pool),
        );
        layer.trainable = false;
        layer
    }

    pub fn sum(name: &str, dims: Dim3, arity: usize) -> Self {
        let mut layer = Self::new(
            name,
            &vec![ChannelKind::Data; arity],
            &[ChannelKind::Data],
            Sum::new(dims, arity),
        );
        layer.trainable = false;
        layer
    }

    // ========== 基础访问器 ==========

    pub const fn id(&self) -> LayerId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: LayerId) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn kind_name(&self) -> &'static str {
        self.kernel.kind_name()
    }

    pub fn input_kinds(&self) -> &[ChannelKind] {
        &self.input_kinds
    }

    pub fn output_kinds(&self) -> &[ChannelKind] {
        &self.output_kinds
    }

    pub fn input_dimensions(&self) -> Vec<Dim3> {
        self.kernel.input_dimensions()
    }

    pub fn output_dimensions(&self) -> Vec<Dim3> {
        self.kernel.output_dimensions()
    }

    /// 首个输入槽的形状
    pub fn input_size(&self) -> Dim3 {
        self.input_dimensions().first().copied().unwrap_or_default()
    }

    /// 首个输出槽的形状
    pub fn output_size(&self) -> Dim3 {
        self.output_dimensions().first().copied().unwrap_or_default()
    }

    /// 所有data输入槽的元素总数
    pub fn input_data_size(&self) -> usize {
        Self::data_size(&self.input_kinds, &self.input_dimensions())
    }

    /// 所有data输出槽的元素总数
    pub fn output_data_size(&self) -> usize {
        Self::data_size(&self.output_kinds, &self.output_dimensions())
    }

    /// 首个输出槽的宽高比（可视化用）
    pub fn aspect(&self) -> f32 {
        self.output_size().aspect()
    }

    pub fn input(&self, index: usize) -> Option<&SignalRef> {
        self.inputs.get(index).and_then(Option::as_ref)
    }

    pub fn output(&self, index: usize) -> Option<&SignalRef> {
        self.outputs.get(index).and_then(Option::as_ref)
    }

    pub fn input_signals(&self) -> &[Option<SignalRef>] {
        &self.inputs
    }

    pub fn output_signals(&self) -> &[Option<SignalRef>] {
        &self.outputs
    }

    pub const fn is_trainable(&self) -> bool {
        self.trainable
    }

    pub fn set_trainable(&mut self, trainable: bool) {
        self.trainable = trainable;
    }

    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn fan_in_size(&self) -> usize {
        self.kernel.fan_in_size()
    }

    pub fn fan_out_size(&self) -> usize {
        self.kernel.fan_out_size()
    }

    pub fn set_weight_init<F>(&mut self, init: F)
    where
        F: FnMut(&mut Tensor, usize, usize) + 'static,
    {
        self.weight_init = Some(Box::new(init));
    }

    pub fn set_bias_init<F>(&mut self, init: F)
    where
        F: FnMut(&mut Tensor, usize, usize) + 'static,
    {
        self.bias_init = Some(Box::new(init));
    }

    pub fn set_context(&mut self, phase: NetPhase) {
        self.kernel.set_context(phase);
    }

    /// 让计算核按给定形状推断输入
    pub fn set_input_shape(&mut self, shape: Dim3) -> Result<(), GraphError> {
        match self.kernel.set_input_shape(shape) {
            Err(GraphError::UnsupportedOperation(msg)) => Err(GraphError::UnsupportedOperation(
                format!("{self}：{msg}"),
            )),
            other => other,
        }
    }

    // ========== 按 pass 计的 visited 标记 ==========

    pub(crate) const fn is_forward_visited(&self, pass_id: u64) -> bool {
        self.last_forward_pass_id == pass_id
    }

    pub(crate) const fn is_backward_visited(&self, pass_id: u64) -> bool {
        self.last_backward_pass_id == pass_id
    }

    pub(crate) fn set_last_forward_pass_id(&mut self, pass_id: u64) {
        self.last_forward_pass_id = pass_id;
    }

    pub(crate) fn set_last_backward_pass_id(&mut self, pass_id: u64) {
        self.last_backward_pass_id = pass_id;
    }

    // ========== 连接 ==========

    /// 把`signal`绑定到输入槽`index`。
    /// 同一信号重复绑定到同一槽是幂等的（返回`Ok(false)`）；
    /// 槽中已有其他信号、或该信号已占用本层另一个槽时返回`ConnectionConflict`。
    pub fn attach_input(&mut self, index: usize, signal: SignalRef) -> Result<bool, GraphError> {
        self.check_slot(SlotDirection::Input, index)?;
        if let Some(existing) = &self.inputs[index] {
            if Rc::ptr_eq(existing, &signal) {
                return Ok(false);
            }
            return Err(self.conflict(index, "该槽已绑定了另一个信号"));
        }
        if self
            .inputs
            .iter()
            .flatten()
            .any(|other| Rc::ptr_eq(other, &signal))
        {
            return Err(self.conflict(index, "该信号已绑定在本层的另一个输入槽上"));
        }
        if signal.kind() != self.input_kinds[index] {
            return Err(GraphError::InvalidOperation(format!(
                "{self}的输入槽{index}要求{}通道，但信号为{}通道",
                self.input_kinds[index],
                signal.kind()
            )));
        }
        self.inputs[index] = Some(signal);
        Ok(true)
    }

    /// 取输入槽`index`的信号，若为空则按声明的维度分配一个（外部注入/参数信号）
    pub(crate) fn ensure_input(&mut self, index: usize) -> Result<SignalRef, GraphError> {
        self.check_slot(SlotDirection::Input, index)?;
        if let Some(signal) = &self.inputs[index] {
            return Ok(Rc::clone(signal));
        }
        let dims = self.declared_dimension(SlotDirection::Input, index)?;
        let signal = Signal::new_ref(dims, self.input_kinds[index], None);
        self.inputs[index] = Some(Rc::clone(&signal));
        Ok(signal)
    }

    /// 输入槽`index`上是否为引擎分配的外部数据占位信号（无生产者且未被他处持有），
    /// 这样的信号可被之后的`connect`替换
    pub(crate) fn has_placeholder_input(&self, index: usize) -> bool {
        self.inputs.get(index).and_then(Option::as_ref).is_some_and(|signal| {
            signal.kind() == ChannelKind::Data
                && signal.producer().is_none()
                && Rc::strong_count(signal) == 1
        })
    }

    /// 释放输入槽`index`上的占位信号；槽中为其他信号时不做任何事
    pub(crate) fn release_placeholder_input(&mut self, index: usize) {
        if self.has_placeholder_input(index) {
            self.inputs[index] = None;
        }
    }

    /// 取输出槽`index`的信号，若为空则分配一个（生产者为本层）
    pub(crate) fn ensure_output(&mut self, index: usize) -> Result<SignalRef, GraphError> {
        self.check_slot(SlotDirection::Output, index)?;
        if let Some(signal) = &self.outputs[index] {
            return Ok(Rc::clone(signal));
        }
        let dims = self.declared_dimension(SlotDirection::Output, index)?;
        let signal = Signal::new_ref(dims, self.output_kinds[index], Some(self.id));
        self.outputs[index] = Some(Rc::clone(&signal));
        Ok(signal)
    }

    // ========== setup 状态机 ==========

    /// 检查声明的维度与连接是否一致，不做任何修改
    pub fn validate(&self) -> Result<(), GraphError> {
        let input_dims = self.input_dimensions();
        let output_dims = self.output_dimensions();
        if input_dims.len() != self.input_kinds.len() {
            return Err(self.shape_mismatch(format!(
                "声明了{}个输入维度，但有{}个输入通道",
                input_dims.len(),
                self.input_kinds.len()
            )));
        }
        if output_dims.len() != self.output_kinds.len() {
            return Err(self.shape_mismatch(format!(
                "声明了{}个输出维度，但有{}个输出通道",
                output_dims.len(),
                self.output_kinds.len()
            )));
        }
        for (index, (signal, dims)) in self.inputs.iter().zip(&input_dims).enumerate() {
            if let Some(signal) = signal {
                if signal.dims() != *dims {
                    return Err(self.shape_mismatch(format!(
                        "输入槽{index}期望{dims}，但连接的信号为{}",
                        signal.dims()
                    )));
                }
            }
        }
        for (index, (signal, dims)) in self.outputs.iter().zip(&output_dims).enumerate() {
            if let Some(signal) = signal {
                if signal.dims() != *dims {
                    return Err(self.shape_mismatch(format!(
                        "输出槽{index}应为{dims}，但已分配的信号为{}",
                        signal.dims()
                    )));
                }
            }
        }
        Ok(())
    }

    /// 分配尚未存在的信号；若`reset_weight`为真或尚未初始化，则初始化权重。
    /// 校验失败时不会分配任何信号。
    pub fn setup(&mut self, reset_weight: bool) -> Result<(), GraphError> {
        self.validate()?;

        for index in 0..self.outputs.len() {
            self.ensure_output(index)?;
        }
        for index in 0..self.inputs.len() {
            self.ensure_input(index)?;
        }

        if reset_weight || !self.initialized {
            self.initialize_weights()?;
        }
        log::debug!("{self} setup 完成（reset_weight={reset_weight}）");
        Ok(())
    }

    /// 不可训练的层直接标记为已初始化；
    /// 可训练的层对每个weight/bias槽调用一次对应的初始化回调（未设置回调则保持原值）
    pub fn initialize_weights(&mut self) -> Result<(), GraphError> {
        if !self.trainable {
            self.initialized = true;
            return Ok(());
        }

        let fan_in = self.fan_in_size();
        let fan_out = self.fan_out_size();
        for index in 0..self.input_kinds.len() {
            let kind = self.input_kinds[index];
            let has_init = match kind {
                ChannelKind::Weight => self.weight_init.is_some(),
                ChannelKind::Bias => self.bias_init.is_some(),
                ChannelKind::Data => false,
            };
            if !has_init {
                continue;
            }
            let signal = self.ensure_input(index)?;
            let init = match kind {
                ChannelKind::Weight => self.weight_init.as_mut(),
                _ => self.bias_init.as_mut(),
            };
            if let Some(init) = init {
                init(&mut signal.parameter_mut(), fan_in, fan_out);
            }
            let expected = signal.dims().to_shape();
            let actual = signal.parameter().shape().to_vec();
            if actual != expected {
                return Err(self.shape_mismatch(format!(
                    "输入槽{index}的{kind}初始化后形状为{actual:?}，应为{expected:?}"
                )));
            }
        }

        self.initialized = true;
        Ok(())
    }

    // ========== 前向/反向 ==========

    /// 把所有相连信号的批次调整为`sample_count`（物理存储只增不减）
    pub fn set_sample_count(&self, sample_count: usize) {
        for signal in self.inputs.iter().chain(&self.outputs).flatten() {
            signal.resize(sample_count);
        }
    }

    /// 单层前向：收集输入值 → 按首个输入的样本数调整批次 → 清空输出梯度 → 调用计算核
    pub fn forward(&mut self) -> Result<(), GraphError> {
        let inputs = self.connected(SlotDirection::Input)?;
        let outputs = self.connected(SlotDirection::Output)?;

        let sample_count = inputs
            .first()
            .or(outputs.first())
            .map_or(0, |s| s.sample_count());
        self.set_sample_count(sample_count);
        for signal in &outputs {
            signal.clear_gradients();
        }
        // 外部注入的数据没有生产者来清空其梯度
        for signal in &inputs {
            if signal.producer().is_none() && !signal.is_parameter() {
                signal.clear_gradients();
            }
        }

        let in_refs: Vec<Ref<'_, [Tensor]>> = inputs.iter().map(|s| s.value()).collect();
        let in_data: Vec<&[Tensor]> = in_refs.iter().map(|r| &**r).collect();
        let mut out_refs: Vec<RefMut<'_, [Tensor]>> =
            outputs.iter().map(|s| s.value_mut()).collect();
        let mut out_data: Vec<&mut [Tensor]> = out_refs.iter_mut().map(|r| &mut **r).collect();

        log::trace!("{self} 前向，批次大小{sample_count}");
        self.kernel.forward_propagation(&in_data, &mut out_data);
        Ok(())
    }

    /// 单层反向：计算核把梯度写入清零的临时缓冲，再由引擎累加到各输入信号上。
    /// 多个消费者写同一信号时，贡献被相加而不是覆盖。
    pub fn backward(&mut self) -> Result<(), GraphError> {
        let inputs = self.connected(SlotDirection::Input)?;
        let outputs = self.connected(SlotDirection::Output)?;

        let mut scratch: Vec<Vec<Tensor>> = inputs
            .iter()
            .map(|s| {
                s.gradient()
                    .iter()
                    .map(|g| Tensor::zeros(g.shape()))
                    .collect()
            })
            .collect();

        {
            let in_refs: Vec<Ref<'_, [Tensor]>> = inputs.iter().map(|s| s.value()).collect();
            let in_data: Vec<&[Tensor]> = in_refs.iter().map(|r| &**r).collect();
            let out_refs: Vec<Ref<'_, [Tensor]>> = outputs.iter().map(|s| s.value()).collect();
            let out_data: Vec<&[Tensor]> = out_refs.iter().map(|r| &**r).collect();
            let grad_refs: Vec<Ref<'_, [Tensor]>> =
                outputs.iter().map(|s| s.gradient()).collect();
            let out_grad: Vec<&[Tensor]> = grad_refs.iter().map(|r| &**r).collect();
            let mut in_grad: Vec<&mut [Tensor]> =
                scratch.iter_mut().map(|rows| rows.as_mut_slice()).collect();

            log::trace!("{self} 反向");
            self.kernel
                .backward_propagation(&in_data, &out_data, &out_grad, &mut in_grad);
        }

        for (signal, contribution) in inputs.iter().zip(&scratch) {
            // 不可训练层的参数不累积梯度，否则永远不会被清空
            if signal.is_parameter() && !self.trainable {
                continue;
            }
            signal.accumulate_gradients(contribution);
        }
        Ok(())
    }

    /// 写入外部数据：`data`的第n组对应第n个data输入槽，每组按样本排列
    pub fn set_input_data(&mut self, data: &[Vec<Tensor>]) -> Result<(), GraphError> {
        let slots = self.data_slots(SlotDirection::Input);
        self.check_batches(SlotDirection::Input, &slots, data)?;
        for (&index, rows) in slots.iter().zip(data) {
            self.ensure_input(index)?.set_data(rows);
        }
        Ok(())
    }

    /// 写入下游梯度：`grads`的第n组对应第n个data输出槽，覆盖（并调整）其梯度缓冲
    pub fn set_output_gradients(&mut self, grads: &[Vec<Tensor>]) -> Result<(), GraphError> {
        let slots = self.data_slots(SlotDirection::Output);
        self.check_batches(SlotDirection::Output, &slots, grads)?;
        for (&index, rows) in slots.iter().zip(grads) {
            self.ensure_output(index)?.set_gradients(rows);
        }
        Ok(())
    }

    /// 所有data输出槽的当前批次值（weight/bias输出属于内部状态，不对外暴露）
    pub fn output_data(&self) -> Vec<Vec<Tensor>> {
        self.outputs
            .iter()
            .zip(&self.output_kinds)
            .filter(|(_, kind)| **kind == ChannelKind::Data)
            .map(|(signal, _)| signal.as_ref().map(|s| s.value().to_vec()).unwrap_or_default())
            .collect()
    }

    /// 所有输入槽的当前梯度累加值
    pub fn input_gradients(&self) -> Vec<Vec<Tensor>> {
        self.inputs
            .iter()
            .map(|signal| signal.as_ref().map(|s| s.gradient().to_vec()).unwrap_or_default())
            .collect()
    }

    /// 单层驱动（测试用）：setup(false) → 写入数据 → 前向 → 取出data输出
    pub fn forward_with(&mut self, inputs: &[Vec<Tensor>]) -> Result<Vec<Vec<Tensor>>, GraphError> {
        self.setup(false)?;
        self.set_input_data(inputs)?;
        self.forward()?;
        Ok(self.output_data())
    }

    /// 单层驱动（测试用）：setup(false) → 写入下游梯度 → 反向 → 取出输入梯度
    pub fn backward_with(
        &mut self,
        out_grads: &[Vec<Tensor>],
    ) -> Result<Vec<Vec<Tensor>>, GraphError> {
        self.setup(false)?;
        self.set_output_gradients(out_grads)?;
        self.backward()?;
        Ok(self.input_gradients())
    }

    // ========== 权重更新 ==========

    /// 对每个weight/bias输入：合并梯度行并乘以`1/batch_size`，再交给优化器原地更新；
    /// 参数元素数≥512时提示优化器可并行。最后清空所有输入梯度并调用`post`。
    /// 不可训练的层直接跳过。
    pub fn update_weights(
        &mut self,
        optimizer: &mut dyn Optimizer,
        batch_size: usize,
    ) -> Result<(), GraphError> {
        self.update_weights_with(
            optimizer,
            batch_size,
            PARALLEL_UPDATE_THRESHOLD,
            &mut HashSet::new(),
        )
    }

    /// `updated`记录本轮已更新过的参数信号，使被多层共享的参数只更新一次
    pub(crate) fn update_weights_with(
        &mut self,
        optimizer: &mut dyn Optimizer,
        batch_size: usize,
        parallel_threshold: usize,
        updated: &mut HashSet<*const Signal>,
    ) -> Result<(), GraphError> {
        if !self.trainable {
            return Ok(());
        }
        if batch_size == 0 {
            return Err(GraphError::InvalidOperation(format!(
                "{self}更新权重时批次大小不能为0"
            )));
        }

        let rcp_batch_size = 1.0 / batch_size as f32;
        for (signal, kind) in self.inputs.iter().zip(&self.input_kinds) {
            let Some(signal) = signal else { continue };
            if !kind.is_trainable_weight() || !updated.insert(Rc::as_ptr(signal)) {
                continue;
            }
            let mut diff = signal.merge_gradients();
            diff *= rcp_batch_size;
            let mut target = signal.parameter_mut();
            let parallelize = target.size() >= parallel_threshold;
            optimizer.update_parameter(signal.id(), &diff, &mut target, parallelize);
        }

        self.clear_gradients();
        self.kernel.post();
        Ok(())
    }

    /// 清空所有输入信号的梯度
    pub fn clear_gradients(&self) {
        for signal in self.inputs.iter().flatten() {
            signal.clear_gradients();
        }
    }

    /// 所有weight/bias输入的参数值（按槽顺序）
    pub fn input_weights(&self) -> Vec<Tensor> {
        self.parameter_slots()
            .flatten()
            .map(|s| s.parameter().clone())
            .collect()
    }

    /// 逐槽逐元素比较两层的weight/bias输入；形状不同或任一差值超过`eps`即为false
    pub fn has_same_weights(&self, other: &Self, eps: f32) -> bool {
        let lhs: Vec<_> = self.parameter_slots().collect();
        let rhs: Vec<_> = other.parameter_slots().collect();
        if lhs.len() != rhs.len() {
            return false;
        }
        lhs.iter().zip(&rhs).all(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => a
                .parameter()
                .max_abs_diff(&b.parameter())
                .is_some_and(|diff| diff <= eps),
            (None, None) => true,
            _ => false,
        })
    }

    // ========== 可视化查询 ==========

    /// 查询输出位置`position`的输入、权重、偏置来源
    pub fn neuron(&self, position: Position) -> NeuronView {
        NeuronView {
            position,
            inputs: self.kernel.stencil_input(position),
            weights: self.kernel.stencil_weight(position),
            bias: self.kernel.stencil_bias(position),
        }
    }

    // ========== 参数包 ==========

    /// 导出本层的参数包
    pub fn state(&self) -> LayerState {
        let mut state = LayerState {
            name: self.name.clone(),
            ..LayerState::default()
        };
        for (signal, kind) in self.inputs.iter().zip(&self.input_kinds) {
            let Some(signal) = signal else { continue };
            let (values, changes) = match kind {
                ChannelKind::Weight => (&mut state.weights, &mut state.weight_changes),
                ChannelKind::Bias => (&mut state.bias_weights, &mut state.bias_weight_changes),
                ChannelKind::Data => continue,
            };
            values.push(vec![signal.parameter().clone()]);
            changes.push(signal.gradient().to_vec());
        }
        for (signal, kind) in self.outputs.iter().zip(&self.output_kinds) {
            let Some(signal) = signal else { continue };
            let (values, changes) = match kind {
                ChannelKind::Data => (&mut state.responses, &mut state.response_changes),
                _ => (&mut state.bias_responses, &mut state.bias_response_changes),
            };
            values.push(signal.value().to_vec());
            changes.push(signal.gradient().to_vec());
        }
        state
    }

    /// 加载参数包：先校验全部通道数与形状，全部通过后才写入（要么全部成功，要么不改动）
    pub fn load_state(&mut self, state: &LayerState) -> Result<(), GraphError> {
        self.check_state(state)?;

        let mut weights = state.weights.iter().zip(&state.weight_changes);
        let mut biases = state.bias_weights.iter().zip(&state.bias_weight_changes);
        for index in 0..self.inputs.len() {
            let entry = match self.input_kinds[index] {
                ChannelKind::Weight => weights.next(),
                ChannelKind::Bias => biases.next(),
                ChannelKind::Data => continue,
            };
            if let Some((values, changes)) = entry {
                let signal = self.ensure_input(index)?;
                signal.parameter_mut().clone_from(&values[0]);
                signal.set_gradients(changes);
            }
        }

        let mut responses = state.responses.iter().zip(&state.response_changes);
        let mut bias_responses = state
            .bias_responses
            .iter()
            .zip(&state.bias_response_changes);
        for index in 0..self.outputs.len() {
            let entry = match self.output_kinds[index] {
                ChannelKind::Data => responses.next(),
                _ => bias_responses.next(),
            };
            if let Some((values, changes)) = entry {
                let signal = self.ensure_output(index)?;
                signal.set_data(values);
                signal.set_gradients(changes);
            }
        }

        self.initialized = true;
        Ok(())
    }

    pub(crate) fn check_state(&self, state: &LayerState) -> Result<(), GraphError> {
        let input_dims = self.input_dimensions();
        let output_dims = self.output_dimensions();
        let dims_of = |dims: &[Dim3], kinds: &[ChannelKind], wanted: &dyn Fn(ChannelKind) -> bool| {
            kinds
                .iter()
                .zip(dims)
                .filter(|(kind, _)| wanted(**kind))
                .map(|(_, d)| *d)
                .collect::<Vec<_>>()
        };

        let groups: [(&str, Vec<Dim3>, &Knowledge, &Knowledge, bool); 4] = [
            (
                "weights",
                dims_of(&input_dims, &self.input_kinds, &|k| k == ChannelKind::Weight),
                &state.weights,
                &state.weight_changes,
                true,
            ),
            (
                "bias_weights",
                dims_of(&input_dims, &self.input_kinds, &|k| k == ChannelKind::Bias),
                &state.bias_weights,
                &state.bias_weight_changes,
                true,
            ),
            (
                "responses",
                dims_of(&output_dims, &self.output_kinds, &|k| k == ChannelKind::Data),
                &state.responses,
                &state.response_changes,
                false,
            ),
            (
                "bias_responses",
                dims_of(&output_dims, &self.output_kinds, &|k| k != ChannelKind::Data),
                &state.bias_responses,
                &state.bias_response_changes,
                false,
            ),
        ];

        for (label, dims, values, changes, single_value) in &groups {
            if values.len() != dims.len() || changes.len() != dims.len() {
                return Err(GraphError::Persistence(format!(
                    "{self}的{label}应有{}个通道，参数包中为{}个（变化量{}个）",
                    dims.len(),
                    values.len(),
                    changes.len()
                )));
            }
            for ((dim, rows), change_rows) in dims.iter().zip(*values).zip(*changes) {
                let shape = dim.to_shape();
                if *single_value && rows.len() != 1 {
                    return Err(GraphError::Persistence(format!(
                        "{self}的{label}每个通道只应有1个参数缓冲，参数包中为{}个",
                        rows.len()
                    )));
                }
                if !*single_value && rows.len() != change_rows.len() {
                    return Err(GraphError::Persistence(format!(
                        "{self}的{label}值与变化量的样本数不一致（{}与{}）",
                        rows.len(),
                        change_rows.len()
                    )));
                }
                if rows.is_empty() && !*single_value {
                    continue;
                }
                if let Some(bad) = rows
                    .iter()
                    .chain(change_rows.iter())
                    .find(|t| t.shape() != &shape[..])
                {
                    return Err(GraphError::Persistence(format!(
                        "{self}的{label}期望形状{shape:?}，参数包中为{:?}",
                        bad.shape()
                    )));
                }
            }
        }
        Ok(())
    }

    // ========== 内部工具 ==========

    fn data_size(kinds: &[ChannelKind], dims: &[Dim3]) -> usize {
        kinds
            .iter()
            .zip(dims)
            .filter(|(kind, _)| **kind == ChannelKind::Data)
            .map(|(_, d)| d.size())
            .sum()
    }

    /// weight/bias输入槽（含尚未分配的空槽）
    fn parameter_slots(&self) -> impl Iterator<Item = Option<&SignalRef>> + '_ {
        self.inputs
            .iter()
            .zip(&self.input_kinds)
            .filter(|(_, kind)| kind.is_trainable_weight())
            .map(|(signal, _)| signal.as_ref())
    }

    fn data_slots(&self, direction: SlotDirection) -> Vec<usize> {
        let kinds = match direction {
            SlotDirection::Input => &self.input_kinds,
            SlotDirection::Output => &self.output_kinds,
        };
        kinds
            .iter()
            .enumerate()
            .filter(|(_, kind)| **kind == ChannelKind::Data)
            .map(|(index, _)| index)
            .collect()
    }

    /// 校验外部传入的批次：组数与data槽数一致，每个样本形状与声明一致
    fn check_batches(
        &self,
        direction: SlotDirection,
        slots: &[usize],
        batches: &[Vec<Tensor>],
    ) -> Result<(), GraphError> {
        if batches.len() != slots.len() {
            return Err(self.shape_mismatch(format!(
                "有{}个data{direction}槽，但提供了{}组数据",
                slots.len(),
                batches.len()
            )));
        }
        for (&index, rows) in slots.iter().zip(batches) {
            let shape = self.declared_dimension(direction, index)?.to_shape();
            if let Some(bad) = rows.iter().find(|t| t.shape() != &shape[..]) {
                return Err(self.shape_mismatch(format!(
                    "{direction}槽{index}的样本形状应为{shape:?}，实际为{:?}",
                    bad.shape()
                )));
            }
        }
        Ok(())
    }

    /// 所有槽位的信号（任一为空即报错）
    fn connected(&self, direction: SlotDirection) -> Result<Vec<SignalRef>, GraphError> {
        let signals = match direction {
            SlotDirection::Input => &self.inputs,
            SlotDirection::Output => &self.outputs,
        };
        signals
            .iter()
            .enumerate()
            .map(|(index, signal)| {
                signal.clone().ok_or_else(|| GraphError::MissingSignal {
                    layer: self.to_string(),
                    message: format!("{direction}槽{index}尚未分配信号，请先执行 setup"),
                })
            })
            .collect()
    }

    fn declared_dimension(&self, direction: SlotDirection, index: usize) -> Result<Dim3, GraphError> {
        let dims = match direction {
            SlotDirection::Input => self.input_dimensions(),
            SlotDirection::Output => self.output_dimensions(),
        };
        let count = dims.len();
        dims.get(index).copied().ok_or_else(|| {
            self.shape_mismatch(format!(
                "{direction}槽{index}没有声明维度（共声明了{count}个）"
            ))
        })
    }

    pub(crate) fn check_slot(&self, direction: SlotDirection, index: usize) -> Result<(), GraphError> {
        let count = match direction {
            SlotDirection::Input => self.input_kinds.len(),
            SlotDirection::Output => self.output_kinds.len(),
        };
        if index >= count {
            return Err(GraphError::SlotOutOfRange {
                layer: self.to_string(),
                direction,
                index,
                count,
            });
        }
        Ok(())
    }

    fn shape_mismatch(&self, message: String) -> GraphError {
        GraphError::ShapeMismatch {
            layer: self.to_string(),
            message,
        }
    }

    fn conflict(&self, slot: usize, message: &str) -> GraphError {
        GraphError::ConnectionConflict {
            layer: self.to_string(),
            slot,
            message: message.to_string(),
        }
    }
}
