/*
 * @Author       : 老董
 * @Date         : 2026-10-16
 * @Description  : 张量的二进制（bincode）保存与加载
 */

use super::Tensor;
use crate::errors::GraphError;
use std::io::{Read, Write};

// 保存和加载张量
impl Tensor {
    /// 将单个Tensor写入`writer`
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<(), GraphError> {
        bincode::serialize_into(writer, self)
            .map_err(|e| GraphError::Persistence(format!("写入张量失败: {e}")))
    }

    /// 从`reader`加载单个Tensor
    pub fn load<R: Read>(reader: &mut R) -> Result<Self, GraphError> {
        bincode::deserialize_from(reader)
            .map_err(|e| GraphError::Persistence(format!("读取张量失败: {e}")))
    }
}
