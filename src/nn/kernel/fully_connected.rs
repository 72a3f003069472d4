/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 全连接核：y = W·x + b
 *
 * 输入槽：[x(data), W(weight), b(bias，可选)]，输出槽：[y(data)]。
 * W 的形状为 in×out×1，即第 o 行第 i 列位于扁平下标`o * in + i`。
 */

use super::{BackendType, LayerKernel};
use crate::errors::GraphError;
use crate::nn::shape::{Dim3, Position};
use crate::tensor::Tensor;

#[derive(Debug, Clone)]
pub struct FullyConnected {
    in_size: usize,
    out_size: usize,
    has_bias: bool,
    backend: BackendType,
}

impl FullyConnected {
    pub const fn new(in_size: usize, out_size: usize, has_bias: bool) -> Self {
        Self {
            in_size,
            out_size,
            has_bias,
            backend: BackendType::Internal,
        }
    }

    pub fn with_backend(
        in_size: usize,
        out_size: usize,
        has_bias: bool,
        backend: BackendType,
    ) -> Result<Self, GraphError> {
        backend.ensure_supported("FullyConnected")?;
        Ok(Self {
            in_size,
            out_size,
            has_bias,
            backend,
        })
    }

    pub const fn has_bias(&self) -> bool {
        self.has_bias
    }

    pub const fn backend(&self) -> BackendType {
        self.backend
    }
}

impl LayerKernel for FullyConnected {
    fn kind_name(&self) -> &'static str {
        "FullyConnected"
    }

    fn input_dimensions(&self) -> Vec<Dim3> {
        let mut dims = vec![
            Dim3::new(self.in_size, 1, 1),
            Dim3::new(self.in_size, self.out_size, 1),
        ];
        if self.has_bias {
            dims.push(Dim3::new(self.out_size, 1, 1));
        }
        dims
    }

    fn output_dimensions(&self) -> Vec<Dim3> {
        vec![Dim3::new(self.out_size, 1, 1)]
    }

    fn forward_propagation(&mut self, in_data: &[&[Tensor]], out_data: &mut [&mut [Tensor]]) {
        let weight = in_data[1][0].data_as_slice();
        let bias = self.has_bias.then(|| in_data[2][0].data_as_slice());

        for (x, y) in in_data[0].iter().zip(out_data[0].iter_mut()) {
            let x = x.data_as_slice();
            let y = y.data_as_slice_mut();
            for (o, y_o) in y.iter_mut().enumerate() {
                let row = &weight[o * self.in_size..(o + 1) * self.in_size];
                let dot: f32 = row.iter().zip(x).map(|(w, x)| w * x).sum();
                *y_o = dot + bias.map_or(0.0, |b| b[o]);
            }
        }
    }

    fn backward_propagation(
        &mut self,
        in_data: &[&[Tensor]],
        _out_data: &[&[Tensor]],
        out_grad: &[&[Tensor]],
        in_grad: &mut [&mut [Tensor]],
    ) {
        let weight = in_data[1][0].data_as_slice();
        let (dx_rows, param_grads) = in_grad.split_at_mut(1);
        let (dw_rows, db_rows) = param_grads.split_at_mut(1);

        for (sample, (x, dy)) in in_data[0].iter().zip(out_grad[0]).enumerate() {
            let x = x.data_as_slice();
            let dy = dy.data_as_slice();

            // dx = Wᵀ·dy
            if let Some(dx) = dx_rows[0].get_mut(sample) {
                let dx = dx.data_as_slice_mut();
                for (o, &g) in dy.iter().enumerate() {
                    let row = &weight[o * self.in_size..(o + 1) * self.in_size];
                    for (dx_i, w) in dx.iter_mut().zip(row) {
                        *dx_i += w * g;
                    }
                }
            }

            // dW = dy·xᵀ
            if let Some(dw) = dw_rows[0].get_mut(sample) {
                let dw = dw.data_as_slice_mut();
                for (o, &g) in dy.iter().enumerate() {
                    let row = &mut dw[o * self.in_size..(o + 1) * self.in_size];
                    for (dw_oi, x_i) in row.iter_mut().zip(x) {
                        *dw_oi += g * x_i;
                    }
                }
            }

            if self.has_bias {
                if let Some(db) = db_rows[0].get_mut(sample) {
                    for (db_o, g) in db.data_as_slice_mut().iter_mut().zip(dy) {
                        *db_o += g;
                    }
                }
            }
        }
    }

    fn stencil_input(&self, _pos: Position) -> Vec<Position> {
        (0..self.in_size).map(|i| Position::new(i, 0, 0)).collect()
    }

    fn stencil_weight(&self, pos: Position) -> Vec<Position> {
        (0..self.in_size).map(|i| Position::new(i, pos.x, 0)).collect()
    }

    fn stencil_bias(&self, pos: Position) -> Option<Position> {
        self.has_bias.then_some(Position::new(pos.x, 0, 0))
    }
}
