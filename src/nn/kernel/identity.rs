use super::LayerKernel;
use crate::errors::GraphError;
use crate::nn::shape::{Dim3, Position};
use crate::tensor::Tensor;

/// 恒等映射：输出即输入。可推断输入形状。
#[derive(Debug, Clone)]
pub struct Identity {
    dims: Dim3,
}

impl Identity {
    pub const fn new(dims: Dim3) -> Self {
        Self { dims }
    }
}

impl LayerKernel for Identity {
    fn kind_name(&self) -> &'static str {
        "Identity"
    }

    fn input_dimensions(&self) -> Vec<Dim3> {
        vec![self.dims]
    }

    fn output_dimensions(&self) -> Vec<Dim3> {
        vec![self.dims]
    }

    fn set_input_shape(&mut self, shape: Dim3) -> Result<(), GraphError> {
        self.dims = shape;
        Ok(())
    }

    fn forward_propagation(&mut self, in_data: &[&[Tensor]], out_data: &mut [&mut [Tensor]]) {
        for (dst, src) in out_data[0].iter_mut().zip(in_data[0]) {
            dst.clone_from(src);
        }
    }

    fn backward_propagation(
        &mut self,
        _in_data: &[&[Tensor]],
        _out_data: &[&[Tensor]],
        out_grad: &[&[Tensor]],
        in_grad: &mut [&mut [Tensor]],
    ) {
        for (dst, src) in in_grad[0].iter_mut().zip(out_grad[0]) {
            *dst += src;
        }
    }

    fn stencil_input(&self, pos: Position) -> Vec<Position> {
        vec![pos]
    }
}
