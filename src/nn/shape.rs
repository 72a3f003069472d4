/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 层的输入/输出形状（宽×高×深）及神经元位置
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// 每个样本在某个输入/输出槽上的形状：宽（width）×高（height）×深（depth）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dim3 {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl Dim3 {
    pub const fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// 元素总数
    pub const fn size(&self) -> usize {
        self.width * self.height * self.depth
    }

    /// 对应的张量形状：`[depth, height, width]`
    pub const fn to_shape(&self) -> [usize; 3] {
        [self.depth, self.height, self.width]
    }

    /// (x, y, c) 在扁平缓冲中的下标
    pub const fn index(&self, x: usize, y: usize, c: usize) -> usize {
        (c * self.height + y) * self.width + x
    }

    /// 宽高比，高为0时返回1
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub(crate) const fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height && pos.z < self.depth
    }
}

impl fmt::Display for Dim3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}×{}", self.width, self.height, self.depth)
    }
}

/// 某个槽中的一个元素（神经元）位置，用于可视化时查询连接关系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }
}
