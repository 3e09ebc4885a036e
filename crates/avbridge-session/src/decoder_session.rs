//! 解码会话.
//!
//! 打开时探测容器、选定第一路可解码的视频流并协商输出尺寸.
//! 每次 `decode_frame` 内部可能读取并丢弃多个其他流的数据包,
//! 也可能向解码器连续送入多个包才得到一帧, 这些对调用方不可见.

use std::path::{Path, PathBuf};

use log::{debug, trace, warn};

use avbridge_codec::{CodecRegistry, Decoder, Packet, VideoFrame};
use avbridge_core::{AvError, AvResult, PixelFormat, pixel_registry};
use avbridge_format::{Demuxer, FormatId, FormatRegistry, IoContext};
use avbridge_scale::{ScaleAlgorithm, ScaleContext};

use crate::config::ResolvedConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::frame_buffer::FrameBuffer;
use crate::geometry::resolve_output_geometry;

/// 一次解码调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// 输出缓冲已写入一帧
    Produced,
    /// 流已结束, 输出缓冲未改动
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Decoding,
    /// 已向解码器发送结束信号, 正在取出剩余帧
    Draining,
    Exhausted,
}

/// 解码会话
pub struct DecoderSession {
    source_path: PathBuf,
    format_id: FormatId,
    io: IoContext,
    demuxer: Box<dyn Demuxer>,
    decoder: Box<dyn Decoder>,
    stream_index: usize,
    source_width: u32,
    source_height: u32,
    output_width: u32,
    output_height: u32,
    output_format: PixelFormat,
    algorithm: ScaleAlgorithm,
    scaler: ScaleContext,
    /// 缩放结果, 成功后才复制到调用方缓冲
    scratch: Vec<u8>,
    state: State,
    frames_decoded: u64,
    packets_skipped: u64,
    failure: Option<BridgeError>,
    closed: bool,
}

impl DecoderSession {
    /// 打开解码会话
    ///
    /// `requested_width`/`requested_height` 为 0 表示不限制, 实际输出尺寸
    /// 通过 [`output_width`](Self::output_width)/[`output_height`](Self::output_height) 查询.
    pub fn open(
        source_path: impl AsRef<Path>,
        requested_width: u32,
        requested_height: u32,
        config: &ResolvedConfig,
        codecs: &CodecRegistry,
        formats: &FormatRegistry,
    ) -> BridgeResult<Self> {
        let source_path = source_path.as_ref().to_path_buf();
        let display = source_path.display().to_string();

        let mut io =
            IoContext::open_read(&source_path).map_err(|e| BridgeError::source(&display, e))?;
        let demuxer = formats
            .open_input(&mut io, source_path.to_str())
            .map_err(|e| BridgeError::source(&display, e))?;

        let stream = demuxer
            .streams()
            .iter()
            .find(|s| {
                s.media_type.is_video()
                    && s.video_params().is_some_and(|v| v.width > 0 && v.height > 0)
                    && codecs.has_decoder(s.codec_id)
            })
            .ok_or_else(|| {
                BridgeError::NoVideoStream(format!(
                    "{display} 中没有可解码的视频流 (共 {} 路流)",
                    demuxer.streams().len()
                ))
            })?;
        let video = *stream
            .video_params()
            .ok_or_else(|| BridgeError::NoVideoStream(display.clone()))?;
        let stream_index = stream.index;

        let (output_width, output_height) = resolve_output_geometry(
            video.width,
            video.height,
            requested_width,
            requested_height,
        )?;

        let mut decoder = codecs
            .create_decoder(stream.codec_id)
            .map_err(|e| BridgeError::CodecInitFailure(e.to_string()))?;
        decoder
            .open(&stream.codec_parameters())
            .map_err(|e| BridgeError::init(format!("打开解码器 {}", decoder.name()), e))?;

        let output_format = config.decode_pixel_format;
        let scratch_len = pixel_registry::describe(output_format)
            .map(|d| d.frame_size(output_width, output_height))
            .ok_or_else(|| {
                BridgeError::UnsupportedFormat(format!("输出像素格式 {output_format} 未登记"))
            })?;
        let scaler = ScaleContext::new(
            video.width,
            video.height,
            video.pixel_format,
            output_width,
            output_height,
            output_format,
            config.scale_algorithm,
        )
        .map_err(|e| BridgeError::init("像素转换", e))?;

        debug!(
            "解码会话已打开: {display} 流 #{stream_index} {}x{} {} → {output_width}x{output_height} {output_format}",
            video.width, video.height, video.pixel_format,
        );
        Ok(Self {
            format_id: demuxer.format_id(),
            source_path,
            io,
            demuxer,
            decoder,
            stream_index,
            source_width: video.width,
            source_height: video.height,
            output_width,
            output_height,
            output_format,
            algorithm: config.scale_algorithm,
            scaler,
            scratch: vec![0u8; scratch_len],
            state: State::Decoding,
            frames_decoded: 0,
            packets_skipped: 0,
            failure: None,
            closed: false,
        })
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn format_id(&self) -> FormatId {
        self.format_id
    }

    /// 源视频尺寸
    pub fn source_geometry(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    pub fn output_width(&self) -> u32 {
        self.output_width
    }

    pub fn output_height(&self) -> u32 {
        self.output_height
    }

    pub fn output_format(&self) -> PixelFormat {
        self.output_format
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// 被跳过的其他流数据包数
    pub fn packets_skipped(&self) -> u64 {
        self.packets_skipped
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    /// 解码下一帧到 `out`
    ///
    /// 流结束后返回 [`DecodeStatus::EndOfStream`], 之后每次调用都返回它.
    pub fn decode_frame<B>(&mut self, out: &mut FrameBuffer<B>) -> BridgeResult<DecodeStatus>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        if self.closed {
            return Err(BridgeError::UnknownHandle("解码会话已关闭".into()));
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if out.width() != self.output_width
            || out.height() != self.output_height
            || out.pixel_format() != self.output_format
        {
            return Err(BridgeError::GeometryMismatch(format!(
                "输出缓冲 {}x{} {} 与会话 {}x{} {} 不一致",
                out.width(),
                out.height(),
                out.pixel_format(),
                self.output_width,
                self.output_height,
                self.output_format,
            )));
        }
        if self.state == State::Exhausted {
            return Ok(DecodeStatus::EndOfStream);
        }

        match self.next_frame() {
            Ok(Some(frame)) => match self.convert(&frame) {
                Ok(()) => {
                    out.as_bytes_mut().copy_from_slice(&self.scratch);
                    self.frames_decoded += 1;
                    Ok(DecodeStatus::Produced)
                }
                Err(e) => Err(self.fail(e)),
            },
            Ok(None) => {
                debug!(
                    "解码结束: {}, 共 {} 帧, 跳过 {} 个其他流数据包",
                    self.source_path.display(),
                    self.frames_decoded,
                    self.packets_skipped
                );
                Ok(DecodeStatus::EndOfStream)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// 从解码器取下一帧, 需要时读取并送入数据包; 流结束返回 `None`
    fn next_frame(&mut self) -> AvResult<Option<VideoFrame>> {
        loop {
            match self.decoder.receive_frame() {
                Ok(frame) => return Ok(Some(frame)),
                Err(AvError::Eof) => {
                    self.state = State::Exhausted;
                    return Ok(None);
                }
                Err(AvError::NeedMoreData) => {
                    if self.state == State::Draining {
                        self.state = State::Exhausted;
                        return Ok(None);
                    }
                    self.feed()?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 送入下一个视频数据包, 输入读完时送入空包进入刷新阶段
    fn feed(&mut self) -> AvResult<()> {
        let packet = match self.read_video_packet()? {
            Some(packet) => packet,
            None => {
                trace!("输入读完, 刷新解码器");
                self.state = State::Draining;
                Packet::empty()
            }
        };
        match self.decoder.send_packet(&packet) {
            Ok(()) => Ok(()),
            Err(AvError::NeedMoreData) => Err(AvError::Codec(
                "解码器既不接受数据包也不输出帧".into(),
            )),
            Err(e) => Err(e),
        }
    }

    fn read_video_packet(&mut self) -> AvResult<Option<Packet>> {
        loop {
            match self.demuxer.read_packet(&mut self.io) {
                Ok(packet) if packet.stream_index == self.stream_index => return Ok(Some(packet)),
                Ok(packet) => {
                    self.packets_skipped += 1;
                    debug!(
                        "跳过流 #{} 的数据包 ({} 字节)",
                        packet.stream_index,
                        packet.size()
                    );
                }
                Err(AvError::Eof) => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    /// 把解码帧缩放/转换到内部缓冲
    fn convert(&mut self, frame: &VideoFrame) -> AvResult<()> {
        if (frame.width, frame.height, frame.pixel_format)
            != (self.scaler.src_width, self.scaler.src_height, self.scaler.src_format)
        {
            debug!(
                "解码帧几何变化: {}x{} {}, 重建缩放上下文",
                frame.width, frame.height, frame.pixel_format
            );
            self.scaler = ScaleContext::new(
                frame.width,
                frame.height,
                frame.pixel_format,
                self.output_width,
                self.output_height,
                self.output_format,
                self.algorithm,
            )?;
        }
        let planes: Vec<&[u8]> = frame.data.iter().map(Vec::as_slice).collect();
        let stride = self.scratch.len() / self.output_height as usize;
        self.scaler.scale(
            &planes,
            &frame.linesize,
            &mut [self.scratch.as_mut_slice()],
            &[stride],
        )
    }

    fn fail(&mut self, err: AvError) -> BridgeError {
        let err = BridgeError::runtime(format!("解码第 {} 帧", self.frames_decoded), err);
        warn!("解码会话 {} 失败: {err}", self.source_path.display());
        self.failure = Some(err.clone());
        err
    }

    /// 释放解码器状态
    ///
    /// 失败过的会话同样可以关闭, 总是成功.
    pub fn close(&mut self) -> BridgeResult<()> {
        if !self.closed {
            self.closed = true;
            self.decoder.flush();
            debug!(
                "解码会话已关闭: {}, 共 {} 帧",
                self.source_path.display(),
                self.frames_decoded
            );
        }
        Ok(())
    }
}
