//! 编解码器标识符.

use std::fmt;

use avbridge_core::MediaType;

/// 编解码器标识符
///
/// 标识码流的编码方式, 与容器无关. 音频标识只用于在容器中
/// 区分非视频轨道, 会话层不产出音频.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// 未知
    None,
    /// 未压缩视频
    RawVideo,
    /// PCM 有符号 16 位小端
    PcmS16le,
}

impl CodecId {
    /// 对应的媒体类型
    pub const fn media_type(&self) -> MediaType {
        match self {
            Self::RawVideo => MediaType::Video,
            Self::PcmS16le => MediaType::Audio,
            Self::None => MediaType::Data,
        }
    }

    /// 短名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::RawVideo => "rawvideo",
            Self::PcmS16le => "pcm_s16le",
        }
    }

    /// 按短名称查找, 大小写不敏感
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::RawVideo, Self::PcmS16le]
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_名称互查() {
        assert_eq!(CodecId::from_name("rawvideo"), Some(CodecId::RawVideo));
        assert_eq!(CodecId::from_name(" PCM_S16LE "), Some(CodecId::PcmS16le));
        assert_eq!(CodecId::from_name("h264"), None);
        assert_eq!(CodecId::from_name("none"), None);
    }

    #[test]
    fn test_媒体类型() {
        assert_eq!(CodecId::RawVideo.media_type(), MediaType::Video);
        assert_eq!(CodecId::PcmS16le.media_type(), MediaType::Audio);
    }
}
