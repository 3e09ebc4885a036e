//! 容器格式标识符.

use std::fmt;
use std::path::Path;

/// 容器格式标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FormatId {
    /// MPEG-4 Part 14
    Mp4,
    /// QuickTime
    Mov,
}

impl FormatId {
    pub const ALL: &[FormatId] = &[Self::Mp4, Self::Mov];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
        }
    }

    /// 常用扩展名 (小写, 不含点)
    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Mp4 => &["mp4", "m4v"],
            Self::Mov => &["mov", "qt"],
        }
    }

    /// 按格式名查找, 大小写不敏感
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(name))
    }

    /// 按扩展名查找
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.extensions().contains(&ext.as_str()))
    }

    /// 按文件名的扩展名查找
    pub fn from_filename(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_按扩展名识别() {
        assert_eq!(FormatId::from_filename("out/clip.MP4"), Some(FormatId::Mp4));
        assert_eq!(FormatId::from_filename("a.m4v"), Some(FormatId::Mp4));
        assert_eq!(FormatId::from_filename("a.mov"), Some(FormatId::Mov));
        assert_eq!(FormatId::from_filename("a.mkv"), None);
        assert_eq!(FormatId::from_filename("noext"), None);
    }

    #[test]
    fn test_按名称识别() {
        assert_eq!(FormatId::from_name("MP4"), Some(FormatId::Mp4));
        assert_eq!(FormatId::from_name("avi"), None);
    }
}
