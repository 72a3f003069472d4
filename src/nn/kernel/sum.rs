use super::LayerKernel;
use crate::errors::GraphError;
use crate::nn::shape::Dim3;
use crate::tensor::Tensor;

/// 逐元素求和：把`arity`个同形状的输入汇合成一个输出（DAG中的汇合点）
#[derive(Debug, Clone)]
pub struct Sum {
    dims: Dim3,
    arity: usize,
}

impl Sum {
    pub const fn new(dims: Dim3, arity: usize) -> Self {
        Self { dims, arity }
    }

    pub const fn arity(&self) -> usize {
        self.arity
    }
}

impl LayerKernel for Sum {
    fn kind_name(&self) -> &'static str {
        "Sum"
    }

    fn input_dimensions(&self) -> Vec<Dim3> {
        vec![self.dims; self.arity]
    }

    fn output_dimensions(&self) -> Vec<Dim3> {
        vec![self.dims]
    }

    fn set_input_shape(&mut self, shape: Dim3) -> Result<(), GraphError> {
        self.dims = shape;
        Ok(())
    }

    fn forward_propagation(&mut self, in_data: &[&[Tensor]], out_data: &mut [&mut [Tensor]]) {
        for (sample, dst) in out_data[0].iter_mut().enumerate() {
            dst.fill(0.0);
            for input in in_data {
                *dst += &input[sample];
            }
        }
    }

    fn backward_propagation(
        &mut self,
        _in_data: &[&[Tensor]],
        _out_data: &[&[Tensor]],
        out_grad: &[&[Tensor]],
        in_grad: &mut [&mut [Tensor]],
    ) {
        for grad in in_grad.iter_mut() {
            for (dst, src) in grad.iter_mut().zip(out_grad[0]) {
                *dst += src;
            }
        }
    }
}
