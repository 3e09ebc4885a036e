//! 编解码器参数.

use avbridge_core::{PixelFormat, Rational};

use crate::codec_id::CodecId;

/// 编解码器参数
///
/// 编码端由会话按目标几何构造; 解码端从容器的流信息中提取.
#[derive(Debug, Clone)]
pub struct CodecParameters {
    pub codec_id: CodecId,
    /// 额外数据 (编解码器私有头信息)
    pub extra_data: Vec<u8>,
    /// 码率 (bits/s), 0 表示未知
    pub bit_rate: u64,
    pub params: CodecParamsType,
}

/// 媒体类型特定参数
#[derive(Debug, Clone)]
pub enum CodecParamsType {
    Video(VideoCodecParams),
    Audio(AudioCodecParams),
    None,
}

/// 视频参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoCodecParams {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// 帧率 (帧/秒)
    pub frame_rate: Rational,
}

/// 音频参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioCodecParams {
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_sample: u32,
}

impl CodecParameters {
    /// 构造视频参数
    pub fn for_video(
        codec_id: CodecId,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        frame_rate: Rational,
    ) -> Self {
        Self {
            codec_id,
            extra_data: Vec::new(),
            bit_rate: 0,
            params: CodecParamsType::Video(VideoCodecParams {
                width,
                height,
                pixel_format,
                frame_rate,
            }),
        }
    }

    /// 视频参数 (如果是视频流)
    pub fn video(&self) -> Option<&VideoCodecParams> {
        match &self.params {
            CodecParamsType::Video(v) => Some(v),
            _ => None,
        }
    }

    /// 音频参数 (如果是音频流)
    pub fn audio(&self) -> Option<&AudioCodecParams> {
        match &self.params {
            CodecParamsType::Audio(a) => Some(a),
            _ => None,
        }
    }
}
