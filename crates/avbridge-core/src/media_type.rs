//! 媒体类型.

use std::fmt;

/// 流的媒体类型
///
/// 会话只消费视频流, 其余类型的数据包在解码时被跳过.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Video,
    Audio,
    /// 时间码、元数据等非音视频轨道
    Data,
}

impl MediaType {
    pub const fn is_video(&self) -> bool {
        matches!(self, Self::Video)
    }

    /// 日志中使用的短名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Data => "data",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_只有视频被消费() {
        assert!(MediaType::Video.is_video());
        assert!(!MediaType::Audio.is_video());
        assert_eq!(MediaType::Data.to_string(), "data");
    }
}
