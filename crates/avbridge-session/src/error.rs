//! 会话错误.
//!
//! 面向调用方的错误分类. 底层 [`AvError`] 在会话边界按发生阶段归类:
//! 打开解码输入时失败归为 [`BridgeError::SourceUnreadable`],
//! 创建编解码器/封装器时失败归为 [`BridgeError::CodecInitFailure`],
//! 会话打开之后的失败归为 [`BridgeError::CodecRuntimeFailure`].

use thiserror::Error;

use avbridge_core::AvError;

/// 会话错误
///
/// 每个变体带一段上下文描述. 实现 `Clone`, 以便失败的会话
/// 在关闭前重复返回同一个错误.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// 运行时上下文不可用
    #[error("运行时初始化失败: {0}")]
    Init(String),

    /// 像素格式名称无法识别, 或格式不能用于该用途
    #[error("不支持的像素格式: {0}")]
    UnsupportedFormat(String),

    /// 宽高非法 (非正数或非偶数)
    #[error("无效尺寸: {0}")]
    InvalidGeometry(String),

    /// 帧缓冲的尺寸/格式与会话配置不一致
    #[error("尺寸或格式不匹配: {0}")]
    GeometryMismatch(String),

    /// 缓冲区长度不等于 高 × 宽 × 每像素字节数
    #[error("缓冲区大小不匹配: {0}")]
    BufferSizeMismatch(String),

    /// 句柄不存在或已关闭
    #[error("未知句柄: {0}")]
    UnknownHandle(String),

    /// 句柄存在但会话类型不符 (如对编码句柄调用解码)
    #[error("会话类型不匹配: {0}")]
    WrongSessionKind(String),

    /// 输入无法打开或解封装
    #[error("无法读取输入: {0}")]
    SourceUnreadable(String),

    /// 输入中没有可解码的视频流
    #[error("没有视频流: {0}")]
    NoVideoStream(String),

    /// 编解码器或容器初始化失败
    #[error("编解码器初始化失败: {0}")]
    CodecInitFailure(String),

    /// 会话打开后编解码器或容器拒绝了数据
    #[error("编解码器运行失败: {0}")]
    CodecRuntimeFailure(String),

    /// 边界参数无效 (空指针、非 UTF-8 路径等)
    #[error("无效参数: {0}")]
    InvalidArgument(String),
}

impl BridgeError {
    /// 所有错误码与名称, 按错误码降序
    pub const CODES: &[(i32, &str)] = &[
        (-1, "Init"),
        (-2, "UnsupportedFormat"),
        (-3, "InvalidGeometry"),
        (-4, "GeometryMismatch"),
        (-5, "BufferSizeMismatch"),
        (-6, "UnknownHandle"),
        (-7, "WrongSessionKind"),
        (-8, "SourceUnreadable"),
        (-9, "NoVideoStream"),
        (-10, "CodecInitFailure"),
        (-11, "CodecRuntimeFailure"),
        (-12, "InvalidArgument"),
    ];

    /// 稳定的负整数错误码
    pub const fn code(&self) -> i32 {
        match self {
            Self::Init(_) => -1,
            Self::UnsupportedFormat(_) => -2,
            Self::InvalidGeometry(_) => -3,
            Self::GeometryMismatch(_) => -4,
            Self::BufferSizeMismatch(_) => -5,
            Self::UnknownHandle(_) => -6,
            Self::WrongSessionKind(_) => -7,
            Self::SourceUnreadable(_) => -8,
            Self::NoVideoStream(_) => -9,
            Self::CodecInitFailure(_) => -10,
            Self::CodecRuntimeFailure(_) => -11,
            Self::InvalidArgument(_) => -12,
        }
    }

    /// 变体名称
    pub fn name(&self) -> &'static str {
        Self::code_name(self.code()).unwrap_or("Unknown")
    }

    /// 按错误码查名称
    pub fn code_name(code: i32) -> Option<&'static str> {
        Self::CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, name)| *name)
    }

    /// 打开解码输入阶段的底层错误
    pub(crate) fn source(context: impl std::fmt::Display, err: AvError) -> Self {
        Self::SourceUnreadable(format!("{context}: {err}"))
    }

    /// 创建编解码器/封装器阶段的底层错误
    ///
    /// 像素格式相关的拒绝归为 `UnsupportedFormat`.
    pub(crate) fn init(context: impl std::fmt::Display, err: AvError) -> Self {
        match err {
            AvError::UnsupportedPixelFormat(_) | AvError::Unsupported(_) => {
                Self::UnsupportedFormat(format!("{context}: {err}"))
            }
            other => Self::CodecInitFailure(format!("{context}: {other}")),
        }
    }

    /// 会话运行阶段的底层错误
    pub(crate) fn runtime(context: impl std::fmt::Display, err: AvError) -> Self {
        Self::CodecRuntimeFailure(format!("{context}: {err}"))
    }
}

/// 会话层 Result
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_错误码唯一且为负() {
        let mut codes: Vec<i32> = BridgeError::CODES.iter().map(|(c, _)| *c).collect();
        codes.dedup();
        assert_eq!(codes.len(), BridgeError::CODES.len());
        assert!(codes.iter().all(|&c| c < 0));
    }

    #[test]
    fn test_变体与名称对应() {
        let err = BridgeError::UnknownHandle("#3".into());
        assert_eq!(err.code(), -6);
        assert_eq!(err.name(), "UnknownHandle");
        assert_eq!(BridgeError::code_name(-11), Some("CodecRuntimeFailure"));
        assert_eq!(BridgeError::code_name(0), None);
        assert_eq!(BridgeError::code_name(1), None);
    }

    #[test]
    fn test_初始化错误归类() {
        let e = BridgeError::init("封装器", AvError::Unsupported("BGRA".into()));
        assert!(matches!(e, BridgeError::UnsupportedFormat(_)));
        let e = BridgeError::init("编码器", AvError::CodecNotFound("h264".into()));
        assert!(matches!(e, BridgeError::CodecInitFailure(_)));
        let e = BridgeError::source("a.mp4", AvError::Eof);
        assert_eq!(e.code(), -8);
    }

    #[test]
    fn test_可克隆复现() {
        let e = BridgeError::runtime("送帧", AvError::Codec("坏帧".into()));
        assert_eq!(e.clone(), e);
        assert!(e.to_string().contains("坏帧"));
    }
}
