//! 编码会话.
//!
//! 调用方的 packed 帧先转换到编码器像素格式, 再送入编码器,
//! 编码器吐出的数据包立即写入容器. 关闭时刷新编码器并写入容器尾部.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use avbridge_codec::{CodecParameters, CodecRegistry, Encoder, Packet, VideoFrame};
use avbridge_core::{AvError, AvResult, PixelFormat, Rational, pixel_registry};
use avbridge_format::{FormatId, FormatRegistry, IoContext, Muxer, Stream};
use avbridge_scale::ScaleContext;

use crate::config::ResolvedConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::frame_buffer::FrameBuffer;
use crate::geometry::validate_encode_geometry;

/// 编码会话
pub struct EncoderSession {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    output_path: PathBuf,
    format_id: FormatId,
    time_base: Rational,
    scaler: ScaleContext,
    /// 编码器像素格式的中间帧, 每帧复用
    codec_frame: VideoFrame,
    encoder: Box<dyn Encoder>,
    muxer: Box<dyn Muxer>,
    io: IoContext,
    stream: Stream,
    header_written: bool,
    frame_count: u64,
    /// 第一次运行期失败, 之后的操作都返回它
    failure: Option<BridgeError>,
    closed: bool,
}

impl EncoderSession {
    /// 打开编码会话
    ///
    /// 容器由输出路径扩展名决定, 无法识别时使用配置的默认容器.
    /// 编码器在打开时就能给出头部信息时立即写容器头, 否则推迟到第一个数据包.
    pub fn open(
        width: u32,
        height: u32,
        output_path: impl AsRef<Path>,
        pixel_format_name: &str,
        config: &ResolvedConfig,
        codecs: &CodecRegistry,
        formats: &FormatRegistry,
    ) -> BridgeResult<Self> {
        let output_path = output_path.as_ref().to_path_buf();
        let descriptor = pixel_registry::resolve(pixel_format_name)
            .map_err(|e| BridgeError::UnsupportedFormat(e.to_string()))?;
        if !descriptor.is_packed() {
            return Err(BridgeError::UnsupportedFormat(format!(
                "{} 不是 packed 格式, 不能作为编码输入",
                descriptor.ffmpeg_name
            )));
        }
        validate_encode_geometry(width, height)?;

        let pixel_format = descriptor.format;
        let codec_format = config.codec_pixel_format;
        let format_id =
            FormatId::from_filename(&output_path).unwrap_or(config.default_container);

        let scaler = ScaleContext::new(
            width,
            height,
            pixel_format,
            width,
            height,
            codec_format,
            config.scale_algorithm,
        )
        .map_err(|e| BridgeError::init("像素转换", e))?;

        let mut encoder = codecs
            .create_encoder_by_name(&config.video_codec)
            .map_err(|e| BridgeError::CodecInitFailure(e.to_string()))?;
        let params = CodecParameters::for_video(
            encoder.codec_id(),
            width,
            height,
            codec_format,
            config.frame_rate,
        );
        encoder
            .open(&params)
            .map_err(|e| BridgeError::init(format!("打开编码器 {}", encoder.name()), e))?;

        let mut stream = Stream::video(
            0,
            encoder.codec_id(),
            width,
            height,
            codec_format,
            config.frame_rate,
        );
        let eager_header = match encoder.extra_data() {
            Some(extra) => {
                stream.extra_data = extra.to_vec();
                true
            }
            None => false,
        };

        // 先在内存里试写一次容器头, 容器不接受该编码格式时在打开阶段失败
        let mut probe = formats
            .create_muxer(format_id)
            .map_err(|e| BridgeError::CodecInitFailure(e.to_string()))?;
        probe
            .write_header(&mut IoContext::memory(Vec::new()), std::slice::from_ref(&stream))
            .map_err(|e| BridgeError::init(format!("{format_id} 容器"), e))?;

        let muxer = formats
            .create_muxer(format_id)
            .map_err(|e| BridgeError::CodecInitFailure(e.to_string()))?;
        let mut codec_frame = VideoFrame::alloc(width, height, codec_format)
            .map_err(|e| BridgeError::init("分配编码帧", e))?;
        codec_frame.time_base = config.frame_rate.invert();
        codec_frame.duration = 1;

        let io = IoContext::open_write(&output_path).map_err(|e| {
            BridgeError::CodecInitFailure(format!("创建 {}: {e}", output_path.display()))
        })?;

        let mut session = Self {
            width,
            height,
            pixel_format,
            output_path,
            format_id,
            time_base: config.frame_rate.invert(),
            scaler,
            codec_frame,
            encoder,
            muxer,
            io,
            stream,
            header_written: false,
            frame_count: 0,
            failure: None,
            closed: false,
        };
        if eager_header {
            session
                .write_header()
                .map_err(|e| BridgeError::init("写入容器头", e))?;
        }

        debug!(
            "编码会话已打开: {} {}x{} {} → {} ({}, {})",
            session.output_path.display(),
            width,
            height,
            pixel_format,
            codec_format,
            session.encoder.name(),
            format_id,
        );
        Ok(session)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn format_id(&self) -> FormatId {
        self.format_id
    }

    /// 已接受的帧数
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// 是否已进入失败状态
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// 编码一帧
    ///
    /// 帧的尺寸和格式必须与会话一致. 返回时帧已被编码器接受,
    /// 不保证已写入磁盘.
    pub fn encode_frame<B: AsRef<[u8]>>(&mut self, frame: &FrameBuffer<B>) -> BridgeResult<()> {
        if self.closed {
            return Err(BridgeError::UnknownHandle("编码会话已关闭".into()));
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if frame.width() != self.width
            || frame.height() != self.height
            || frame.pixel_format() != self.pixel_format
        {
            return Err(BridgeError::GeometryMismatch(format!(
                "帧 {}x{} {} 与会话 {}x{} {} 不一致",
                frame.width(),
                frame.height(),
                frame.pixel_format(),
                self.width,
                self.height,
                self.pixel_format,
            )));
        }

        let result = self.encode_inner(frame.as_bytes(), frame.stride());
        match result {
            Ok(()) => {
                self.frame_count += 1;
                Ok(())
            }
            Err(e) => Err(self.fail(format!("编码第 {} 帧", self.frame_count), e)),
        }
    }

    fn encode_inner(&mut self, data: &[u8], stride: usize) -> AvResult<()> {
        {
            let mut planes: Vec<&mut [u8]> = self
                .codec_frame
                .data
                .iter_mut()
                .map(Vec::as_mut_slice)
                .collect();
            self.scaler
                .scale(&[data], &[stride], &mut planes, &self.codec_frame.linesize)?;
        }
        self.codec_frame.pts = self.frame_count as i64;
        self.codec_frame.is_keyframe = self.frame_count == 0;
        self.submit(false)?;
        self.drain_packets()?;
        Ok(())
    }

    /// 送入当前中间帧 (或刷新信号), 编码器满时先取走数据包再重试
    fn submit(&mut self, flush: bool) -> AvResult<()> {
        loop {
            let frame = (!flush).then_some(&self.codec_frame);
            match self.encoder.send_frame(frame) {
                Ok(()) => return Ok(()),
                Err(AvError::NeedMoreData) => {
                    if self.drain_packets()? == 0 {
                        return Err(AvError::Codec(
                            "编码器拒绝输入且没有可取出的数据包".into(),
                        ));
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 取出所有就绪的数据包并写入容器, 返回写入的数量
    fn drain_packets(&mut self) -> AvResult<usize> {
        let mut written = 0;
        loop {
            match self.encoder.receive_packet() {
                Ok(packet) => {
                    self.write_packet(packet)?;
                    written += 1;
                }
                Err(AvError::NeedMoreData | AvError::Eof) => return Ok(written),
                Err(e) => return Err(e),
            }
        }
    }

    fn write_packet(&mut self, mut packet: Packet) -> AvResult<()> {
        if !self.header_written {
            if let Some(extra) = self.encoder.extra_data() {
                self.stream.extra_data = extra.to_vec();
            }
            self.write_header()?;
        }
        packet.stream_index = 0;
        if !packet.time_base.is_positive() {
            packet.time_base = self.time_base;
        }
        self.muxer.write_packet(&mut self.io, &packet)
    }

    fn write_header(&mut self) -> AvResult<()> {
        self.muxer
            .write_header(&mut self.io, std::slice::from_ref(&self.stream))?;
        self.header_written = true;
        debug!("已写入容器头: {}", self.output_path.display());
        Ok(())
    }

    /// 记录运行期失败并返回它
    fn fail(&mut self, context: String, err: AvError) -> BridgeError {
        let err = BridgeError::runtime(context, err);
        warn!("编码会话 {} 失败: {err}", self.output_path.display());
        self.failure = Some(err.clone());
        err
    }

    /// 刷新编码器并完成容器
    ///
    /// 失败过的会话只做尽力释放, 返回最初的错误. 重复调用无副作用.
    pub fn close(&mut self) -> BridgeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(err) = self.failure.clone() {
            self.encoder.flush();
            if self.header_written {
                if let Err(e) = self.muxer.write_trailer(&mut self.io) {
                    warn!("释放失败的编码会话时写尾部出错: {e}");
                }
            }
            if let Err(e) = self.io.flush() {
                warn!("释放失败的编码会话时刷新输出出错: {e}");
            }
            return Err(err);
        }

        match self.finish() {
            Ok(()) => {
                debug!(
                    "编码会话已关闭: {}, 共 {} 帧",
                    self.output_path.display(),
                    self.frame_count
                );
                Ok(())
            }
            Err(e) => {
                let err = BridgeError::runtime("完成输出", e);
                self.failure = Some(err.clone());
                Err(err)
            }
        }
    }

    fn finish(&mut self) -> AvResult<()> {
        self.submit(true)?;
        let flushed = self.drain_packets()?;
        debug!("编码器刷新出 {flushed} 个数据包");
        if !self.header_written {
            self.write_header()?;
        }
        self.muxer.write_trailer(&mut self.io)?;
        self.io.flush()
    }
}

impl Drop for EncoderSession {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!("编码会话 {} 未正常关闭: {e}", self.output_path.display());
            }
        }
    }
}
