//! RAW 视频编码器.
//!
//! 把帧的可见像素按平面顺序紧凑拼接为一个数据包, 不做压缩.
//! 每帧都是关键帧, DTS = PTS, 没有重排序延迟.

use bytes::Bytes;
use log::debug;

use avbridge_core::{AvError, AvResult, PixelFormat};

use crate::codec_id::CodecId;
use crate::codec_parameters::{CodecParameters, VideoCodecParams};
use crate::encoder::Encoder;
use crate::frame::VideoFrame;
use crate::packet::Packet;

/// RAW 视频编码器
pub struct RawVideoEncoder {
    /// 打开后的视频参数
    config: Option<VideoCodecParams>,
    /// 每帧字节数
    frame_size: usize,
    /// 待取出的数据包
    pending: Option<Packet>,
    /// 已收到刷新信号
    draining: bool,
}

impl RawVideoEncoder {
    pub fn create() -> AvResult<Box<dyn Encoder>> {
        Ok(Box::new(Self {
            config: None,
            frame_size: 0,
            pending: None,
            draining: false,
        }))
    }
}

impl Encoder for RawVideoEncoder {
    fn codec_id(&self) -> CodecId {
        CodecId::RawVideo
    }

    fn name(&self) -> &str {
        "rawvideo"
    }

    fn open(&mut self, params: &CodecParameters) -> AvResult<()> {
        let video = *params
            .video()
            .ok_or_else(|| AvError::InvalidArgument("rawvideo 编码器需要视频参数".into()))?;
        if video.width == 0 || video.height == 0 {
            return Err(AvError::InvalidArgument("宽度和高度不能为 0".into()));
        }
        if video.pixel_format == PixelFormat::None {
            return Err(AvError::UnsupportedPixelFormat("none".into()));
        }
        self.frame_size = video
            .pixel_format
            .frame_size(video.width, video.height)
            .ok_or_else(|| AvError::InvalidArgument("无法计算帧大小".into()))?;
        self.config = Some(video);
        self.pending = None;
        self.draining = false;

        debug!(
            "打开 rawvideo 编码器: {}x{} {}, 帧大小 {}",
            video.width, video.height, video.pixel_format, self.frame_size
        );
        Ok(())
    }

    fn send_frame(&mut self, frame: Option<&VideoFrame>) -> AvResult<()> {
        let config = self
            .config
            .ok_or_else(|| AvError::Codec("编码器未打开".into()))?;
        if self.pending.is_some() {
            return Err(AvError::NeedMoreData);
        }
        let Some(frame) = frame else {
            self.draining = true;
            return Ok(());
        };
        if self.draining {
            return Err(AvError::Codec("刷新后不能再送入帧".into()));
        }
        if frame.width != config.width
            || frame.height != config.height
            || frame.pixel_format != config.pixel_format
        {
            return Err(AvError::InvalidData(format!(
                "帧 {}x{} {} 与编码器配置 {}x{} {} 不一致",
                frame.width,
                frame.height,
                frame.pixel_format,
                config.width,
                config.height,
                config.pixel_format,
            )));
        }

        let mut buf = Vec::with_capacity(self.frame_size);
        frame.write_packed(&mut buf)?;

        let mut pkt = Packet::from_data(Bytes::from(buf));
        pkt.pts = frame.pts;
        pkt.dts = frame.pts;
        pkt.duration = frame.duration.max(1);
        pkt.time_base = frame.time_base;
        pkt.is_keyframe = true;
        self.pending = Some(pkt);
        Ok(())
    }

    fn receive_packet(&mut self) -> AvResult<Packet> {
        match self.pending.take() {
            Some(pkt) => Ok(pkt),
            None if self.draining => Err(AvError::Eof),
            None => Err(AvError::NeedMoreData),
        }
    }

    fn flush(&mut self) {
        self.pending = None;
        self.draining = false;
    }
}
