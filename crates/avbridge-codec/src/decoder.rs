//! 解码器 trait 定义.

use avbridge_core::AvResult;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::frame::VideoFrame;
use crate::packet::Packet;

/// 解码器 trait
///
/// 解码流程:
/// 1. `open()` 以容器提供的流参数配置
/// 2. `send_packet()` 送入压缩数据
/// 3. `receive_frame()` 取帧, `NeedMoreData` 表示需要更多数据包
/// 4. 输入耗尽后送入空包, 取帧直到 `Eof`
pub trait Decoder: Send {
    fn codec_id(&self) -> CodecId;

    fn name(&self) -> &str;

    /// 使用参数配置解码器
    fn open(&mut self, params: &CodecParameters) -> AvResult<()>;

    /// 送入一个数据包, 空包表示刷新
    fn send_packet(&mut self, packet: &Packet) -> AvResult<()>;

    /// 取出一帧
    fn receive_frame(&mut self) -> AvResult<VideoFrame>;

    /// 丢弃内部缓存
    fn flush(&mut self);
}
