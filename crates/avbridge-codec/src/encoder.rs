//! 编码器 trait 定义.

use avbridge_core::AvResult;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::frame::VideoFrame;
use crate::packet::Packet;

/// 编码器 trait
///
/// 编码流程:
/// 1. `open()` 配置几何与像素格式
/// 2. `send_frame(Some(..))` 送入原始帧
/// 3. 反复 `receive_packet()` 直到 `NeedMoreData`
/// 4. 结束时 `send_frame(None)`, 反复 `receive_packet()` 直到 `Eof`
///
/// 编码器可以在内部缓存若干帧 (重排序延迟), 此时第 3 步可能
/// 一个包也取不到, 缓存的包在刷新时全部吐出.
pub trait Encoder: Send {
    fn codec_id(&self) -> CodecId;

    fn name(&self) -> &str;

    /// 使用参数配置编码器, 必须在送帧前调用
    fn open(&mut self, params: &CodecParameters) -> AvResult<()>;

    /// 编码器私有头信息
    ///
    /// - `Some(data)`: 已确定 (可能为空), 容器头可以立即写出
    /// - `None`: 需要看到第一帧后才能确定, 容器头应延迟到首个包产出时
    fn extra_data(&self) -> Option<&[u8]> {
        Some(&[])
    }

    /// 送入一帧, `None` 表示刷新
    ///
    /// # 返回
    /// - `Err(AvError::NeedMoreData)`: 输出缓冲已满, 需要先取出数据包
    fn send_frame(&mut self, frame: Option<&VideoFrame>) -> AvResult<()>;

    /// 取出一个数据包
    ///
    /// # 返回
    /// - `Err(AvError::NeedMoreData)`: 需要送入更多帧
    /// - `Err(AvError::Eof)`: 刷新完毕, 不会再有数据包
    fn receive_packet(&mut self) -> AvResult<Packet>;

    /// 丢弃内部缓存, 回到已打开状态
    fn flush(&mut self);
}
