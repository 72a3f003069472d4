/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 平均池化核：窗口大小与步长均为`pool`，无可学习参数
 */

use super::{BackendType, LayerKernel};
use crate::errors::GraphError;
use crate::nn::shape::{Dim3, Position};
use crate::tensor::Tensor;

#[derive(Debug, Clone)]
pub struct AveragePool {
    input: Dim3,
    pool: usize,
    backend: BackendType,
}

impl AveragePool {
    /// `pool`必须大于0，否则会panic
    pub fn new(input: Dim3, pool: usize) -> Self {
        assert!(pool > 0, "池化窗口须≥1");
        Self {
            input,
            pool,
            backend: BackendType::Internal,
        }
    }

    pub fn with_backend(input: Dim3, pool: usize, backend: BackendType) -> Result<Self, GraphError> {
        backend.ensure_supported("AveragePool")?;
        Ok(Self {
            backend,
            ..Self::new(input, pool)
        })
    }

    pub const fn pool(&self) -> usize {
        self.pool
    }

    pub const fn backend(&self) -> BackendType {
        self.backend
    }

    const fn output(&self) -> Dim3 {
        Dim3::new(
            self.input.width / self.pool,
            self.input.height / self.pool,
            self.input.depth,
        )
    }

    /// 输出位置`pos`对应的输入窗口
    fn window(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        let pool = self.pool;
        (0..pool).flat_map(move |dy| {
            (0..pool).map(move |dx| Position::new(pos.x * pool + dx, pos.y * pool + dy, pos.z))
        })
    }
}

impl LayerKernel for AveragePool {
    fn kind_name(&self) -> &'static str {
        "AveragePool"
    }

    fn input_dimensions(&self) -> Vec<Dim3> {
        vec![self.input]
    }

    fn output_dimensions(&self) -> Vec<Dim3> {
        vec![self.output()]
    }

    fn set_input_shape(&mut self, shape: Dim3) -> Result<(), GraphError> {
        self.input = shape;
        Ok(())
    }

    fn fan_in_size(&self) -> usize {
        self.pool * self.pool
    }

    fn fan_out_size(&self) -> usize {
        1
    }

    fn forward_propagation(&mut self, in_data: &[&[Tensor]], out_data: &mut [&mut [Tensor]]) {
        let out = self.output();
        let scale = 1.0 / (self.pool * self.pool) as f32;

        for (src, dst) in in_data[0].iter().zip(out_data[0].iter_mut()) {
            let src = src.data_as_slice();
            let dst = dst.data_as_slice_mut();
            for c in 0..out.depth {
                for y in 0..out.height {
                    for x in 0..out.width {
                        let sum: f32 = self
                            .window(Position::new(x, y, c))
                            .map(|p| src[self.input.index(p.x, p.y, p.z)])
                            .sum();
                        dst[out.index(x, y, c)] = sum * scale;
                    }
                }
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
        let out = self.output();
        let scale = 1.0 / (self.pool * self.pool) as f32;

        for (dy, dx) in out_grad[0].iter().zip(in_grad[0].iter_mut()) {
            let dy = dy.data_as_slice();
            let dx = dx.data_as_slice_mut();
            for c in 0..out.depth {
                for y in 0..out.height {
                    for x in 0..out.width {
                        let g = dy[out.index(x, y, c)] * scale;
                        for p in self.window(Position::new(x, y, c)) {
                            dx[self.input.index(p.x, p.y, p.z)] += g;
                        }
                    }
                }
            }
        }
    }

    fn stencil_input(&self, pos: Position) -> Vec<Position> {
        if !self.output().contains(pos) {
            return Vec::new();
        }
        self.window(pos).collect()
    }
}
