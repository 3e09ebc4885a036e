//! 流信息.

use avbridge_codec::{AudioCodecParams, CodecId, CodecParameters, CodecParamsType, VideoCodecParams};
use avbridge_core::{MediaType, PixelFormat, Rational};

/// 容器中的一条流
#[derive(Debug, Clone)]
pub struct Stream {
    /// 在容器中的位置, 从 0 开始
    pub index: usize,
    pub media_type: MediaType,
    pub codec_id: CodecId,
    pub time_base: Rational,
    /// 时长 (time_base 单位), -1 表示未知
    pub duration: i64,
    /// 帧数/采样包数, 0 表示未知或为空
    pub nb_frames: u64,
    pub extra_data: Vec<u8>,
    pub params: StreamParams,
}

/// 流特定参数
#[derive(Debug, Clone)]
pub enum StreamParams {
    Video(VideoStreamParams),
    Audio(AudioStreamParams),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoStreamParams {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// 平均帧率, 未知时为 0/1
    pub frame_rate: Rational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioStreamParams {
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
}

impl Stream {
    /// 视频流, 时间基为帧率的倒数
    pub fn video(
        index: usize,
        codec_id: CodecId,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        frame_rate: Rational,
    ) -> Self {
        Self {
            index,
            media_type: MediaType::Video,
            codec_id,
            time_base: frame_rate.invert(),
            duration: -1,
            nb_frames: 0,
            extra_data: Vec::new(),
            params: StreamParams::Video(VideoStreamParams {
                width,
                height,
                pixel_format,
                frame_rate,
            }),
        }
    }

    /// 音频流, 时间基为 1/采样率
    pub fn audio(
        index: usize,
        codec_id: CodecId,
        sample_rate: u32,
        channels: u32,
        bits_per_sample: u32,
    ) -> Self {
        Self {
            index,
            media_type: MediaType::Audio,
            codec_id,
            time_base: Rational::new(1, sample_rate as i32),
            duration: -1,
            nb_frames: 0,
            extra_data: Vec::new(),
            params: StreamParams::Audio(AudioStreamParams {
                sample_rate,
                channels,
                bits_per_sample,
            }),
        }
    }

    pub fn video_params(&self) -> Option<&VideoStreamParams> {
        match &self.params {
            StreamParams::Video(v) => Some(v),
            _ => None,
        }
    }

    /// 转换为解码器参数
    pub fn codec_parameters(&self) -> CodecParameters {
        let params = match self.params {
            StreamParams::Video(v) => CodecParamsType::Video(VideoCodecParams {
                width: v.width,
                height: v.height,
                pixel_format: v.pixel_format,
                frame_rate: v.frame_rate,
            }),
            StreamParams::Audio(a) => CodecParamsType::Audio(AudioCodecParams {
                sample_rate: a.sample_rate,
                channels: a.channels,
                bits_per_sample: a.bits_per_sample,
            }),
            StreamParams::Other => CodecParamsType::None,
        };
        CodecParameters {
            codec_id: self.codec_id,
            extra_data: self.extra_data.clone(),
            bit_rate: 0,
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_视频流时间基() {
        let s = Stream::video(0, CodecId::RawVideo, 64, 48, PixelFormat::Yuv420p, Rational::from_fps(25));
        assert_eq!(s.time_base, Rational::new(1, 25));
        let p = s.codec_parameters();
        let v = p.video().unwrap();
        assert_eq!((v.width, v.height, v.pixel_format), (64, 48, PixelFormat::Yuv420p));
    }

    #[test]
    fn test_音频流参数() {
        let s = Stream::audio(1, CodecId::PcmS16le, 48000, 2, 16);
        assert_eq!(s.media_type, MediaType::Audio);
        assert!(s.video_params().is_none());
        assert_eq!(s.codec_parameters().audio().unwrap().channels, 2);
    }
}
