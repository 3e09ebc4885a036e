//! 格式探测.
//!
//! 根据文件头部字节与文件名推断容器格式.

use crate::format_id::FormatId;

/// 探测置信度, 越高越可信
pub type ProbeScore = u32;

/// 仅扩展名匹配
pub const SCORE_EXTENSION: ProbeScore = 50;

/// 结构特征匹配 (如顶层 box 类型合法, 但缺少文件签名)
pub const SCORE_STRUCTURE: ProbeScore = 75;

/// 文件签名完全匹配
pub const SCORE_MAX: ProbeScore = 100;

/// 探测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub format_id: FormatId,
    pub score: ProbeScore,
}

/// 格式探测器
pub trait FormatProbe: Send + Sync {
    /// 探测 `data` (文件开头若干字节), `None` 表示不是此格式
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore>;

    fn format_id(&self) -> FormatId;
}
