//! 封装器 trait.

use avbridge_codec::Packet;
use avbridge_core::AvResult;

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::stream::Stream;

/// 封装器
///
/// 调用顺序: `write_header` → `write_packet`* → `write_trailer`.
/// `write_trailer` 之后封装器不可再用.
pub trait Muxer: Send {
    fn format_id(&self) -> FormatId;

    fn name(&self) -> &str;

    /// 写入容器头部, 登记输出流
    fn write_header(&mut self, io: &mut IoContext, streams: &[Stream]) -> AvResult<()>;

    /// 写入一个数据包, `packet.stream_index` 指明所属流
    fn write_packet(&mut self, io: &mut IoContext, packet: &Packet) -> AvResult<()>;

    /// 完成封装 (回填大小、写索引)
    fn write_trailer(&mut self, io: &mut IoContext) -> AvResult<()>;
}
