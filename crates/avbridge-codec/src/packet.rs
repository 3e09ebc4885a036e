//! 压缩数据包.

use avbridge_core::Rational;
use avbridge_core::timestamp::NOPTS_VALUE;
use bytes::Bytes;

/// 压缩数据包
///
/// 编码器输出、容器读写的基本单位. 空包在解码端表示刷新.
#[derive(Debug, Clone)]
pub struct Packet {
    pub data: Bytes,
    /// 显示时间戳
    pub pts: i64,
    /// 解码时间戳
    pub dts: i64,
    /// 时长 (time_base 单位)
    pub duration: i64,
    pub time_base: Rational,
    /// 所属流索引
    pub stream_index: usize,
    pub is_keyframe: bool,
    /// 容器内字节偏移, -1 表示未知
    pub pos: i64,
}

impl Packet {
    /// 空包 (刷新信号)
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            pts: NOPTS_VALUE,
            dts: NOPTS_VALUE,
            duration: 0,
            time_base: Rational::UNDEFINED,
            stream_index: 0,
            is_keyframe: false,
            pos: -1,
        }
    }

    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty()
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
