//! 解封装器 trait.

use avbridge_codec::Packet;
use avbridge_core::AvResult;

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::stream::Stream;

/// 解封装器
///
/// `open` 解析头部后, 反复 `read_packet` 直到 [`AvError::Eof`](avbridge_core::AvError::Eof).
/// 数据包按文件内偏移顺序返回, 多条流交错出现.
pub trait Demuxer: Send {
    fn format_id(&self) -> FormatId;

    fn name(&self) -> &str;

    /// 解析容器头部
    fn open(&mut self, io: &mut IoContext) -> AvResult<()>;

    fn streams(&self) -> &[Stream];

    /// 读取下一个数据包
    fn read_packet(&mut self, io: &mut IoContext) -> AvResult<Packet>;

    /// 容器时长 (秒), 未知时为 `None`
    fn duration(&self) -> Option<f64>;
}
