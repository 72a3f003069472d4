use super::{LayerKernel, NetPhase};
use crate::errors::GraphError;
use crate::nn::shape::{Dim3, Position};
use crate::tensor::Tensor;

/// 第三方计算核的包装（动态分发）
pub struct CustomKernel(Box<dyn LayerKernel>);

impl CustomKernel {
    pub fn new<K: LayerKernel + 'static>(kernel: K) -> Self {
        Self(Box::new(kernel))
    }
}

impl LayerKernel for CustomKernel {
    fn kind_name(&self) -> &'static str {
        self.0.kind_name()
    }

    fn input_dimensions(&self) -> Vec<Dim3> {
        self.0.input_dimensions()
    }

    fn output_dimensions(&self) -> Vec<Dim3> {
        self.0.output_dimensions()
    }

    fn set_input_shape(&mut self, shape: Dim3) -> Result<(), GraphError> {
        self.0.set_input_shape(shape)
    }

    fn set_context(&mut self, phase: NetPhase) {
        self.0.set_context(phase);
    }

    fn forward_propagation(&mut self, in_data: &[&[Tensor]], out_data: &mut [&mut [Tensor]]) {
        self.0.forward_propagation(in_data, out_data);
    }

    fn backward_propagation(
        &mut self,
        in_data: &[&[Tensor]],
        out_data: &[&[Tensor]],
        out_grad: &[&[Tensor]],
        in_grad: &mut [&mut [Tensor]],
    ) {
        self.0
            .backward_propagation(in_data, out_data, out_grad, in_grad);
    }

    fn fan_in_size(&self) -> usize {
        self.0.fan_in_size()
    }

    fn fan_out_size(&self) -> usize {
        self.0.fan_out_size()
    }

    fn post(&mut self) {
        self.0.post();
    }

    fn stencil_input(&self, pos: Position) -> Vec<Position> {
        self.0.stencil_input(pos)
    }

    fn stencil_weight(&self, pos: Position) -> Vec<Position> {
        self.0.stencil_weight(pos)
    }

    fn stencil_bias(&self, pos: Position) -> Option<Position> {
        self.0.stencil_bias(pos)
    }
}
