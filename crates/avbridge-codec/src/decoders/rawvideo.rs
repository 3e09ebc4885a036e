//! RAW 视频解码器.
//!
//! 按流参数中的几何与像素格式把数据包拆分为平面.

use log::debug;

use avbridge_core::{AvError, AvResult, PixelFormat};

use crate::codec_id::CodecId;
use crate::codec_parameters::{CodecParameters, VideoCodecParams};
use crate::decoder::Decoder;
use crate::frame::VideoFrame;
use crate::packet::Packet;

/// RAW 视频解码器
pub struct RawVideoDecoder {
    config: Option<VideoCodecParams>,
    frame_size: usize,
    /// 已解码待取出的帧
    pending: Option<VideoFrame>,
    /// 已收到空包
    draining: bool,
}

impl RawVideoDecoder {
    pub fn create() -> AvResult<Box<dyn Decoder>> {
        Ok(Box::new(Self {
            config: None,
            frame_size: 0,
            pending: None,
            draining: false,
        }))
    }
}

impl Decoder for RawVideoDecoder {
    fn codec_id(&self) -> CodecId {
        CodecId::RawVideo
    }

    fn name(&self) -> &str {
        "rawvideo"
    }

    fn open(&mut self, params: &CodecParameters) -> AvResult<()> {
        let video = *params
            .video()
            .ok_or_else(|| AvError::InvalidArgument("rawvideo 解码器需要视频参数".into()))?;
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
            "打开 rawvideo 解码器: {}x{} {}, 帧大小 {}",
            video.width, video.height, video.pixel_format, self.frame_size
        );
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> AvResult<()> {
        let config = self
            .config
            .ok_or_else(|| AvError::Codec("解码器未打开".into()))?;
        if self.pending.is_some() {
            return Err(AvError::NeedMoreData);
        }
        if packet.is_empty() {
            self.draining = true;
            return Ok(());
        }
        if packet.size() != self.frame_size {
            return Err(AvError::InvalidData(format!(
                "数据包大小 {} 与帧大小 {} 不匹配",
                packet.size(),
                self.frame_size
            )));
        }

        let mut frame = VideoFrame::new(config.width, config.height, config.pixel_format);
        frame.read_packed(&packet.data)?;
        frame.pts = packet.pts;
        frame.time_base = packet.time_base;
        frame.duration = packet.duration;
        frame.is_keyframe = true;
        self.pending = Some(frame);
        Ok(())
    }

    fn receive_frame(&mut self) -> AvResult<VideoFrame> {
        match self.pending.take() {
            Some(frame) => Ok(frame),
            None if self.draining => Err(AvError::Eof),
            None => Err(AvError::NeedMoreData),
        }
    }

    fn flush(&mut self) {
        self.pending = None;
        self.draining = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avbridge_core::Rational;

    fn open(w: u32, h: u32, pf: PixelFormat) -> Box<dyn Decoder> {
        let mut dec = RawVideoDecoder::create().unwrap();
        dec.open(&CodecParameters::for_video(
            CodecId::RawVideo,
            w,
            h,
            pf,
            Rational::from_fps(25),
        ))
        .unwrap();
        dec
    }

    #[test]
    fn test_解码_rgb24() {
        let mut dec = open(2, 1, PixelFormat::Rgb24);
        let mut pkt = Packet::from_data(vec![1u8, 2, 3, 4, 5, 6]);
        pkt.pts = 5;
        dec.send_packet(&pkt).unwrap();
        let f = dec.receive_frame().unwrap();
        assert_eq!(f.data[0], vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(f.linesize[0], 6);
        assert_eq!(f.pts, 5);
        assert!(matches!(dec.receive_frame(), Err(AvError::NeedMoreData)));
    }

    #[test]
    fn test_数据包大小不符() {
        let mut dec = open(2, 2, PixelFormat::Gray8);
        let err = dec.send_packet(&Packet::from_data(vec![0u8; 3])).unwrap_err();
        assert!(matches!(err, AvError::InvalidData(_)));
    }

    #[test]
    fn test_空包刷新() {
        let mut dec = open(2, 2, PixelFormat::Gray8);
        dec.send_packet(&Packet::empty()).unwrap();
        assert!(matches!(dec.receive_frame(), Err(AvError::Eof)));
        dec.flush();
        assert!(matches!(dec.receive_frame(), Err(AvError::NeedMoreData)));
    }

    #[test]
    fn test_缺少视频参数() {
        let mut dec = RawVideoDecoder::create().unwrap();
        let params = CodecParameters {
            codec_id: CodecId::RawVideo,
            extra_data: Vec::new(),
            bit_rate: 0,
            params: crate::CodecParamsType::None,
        };
        assert!(matches!(dec.open(&params), Err(AvError::InvalidArgument(_))));
    }
}
