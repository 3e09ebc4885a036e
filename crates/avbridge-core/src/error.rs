//! 统一错误类型定义.
//!
//! 编解码层、容器层与缩放层共用的底层错误. 会话层在边界处
//! 将其归类为面向调用方的会话错误.

use thiserror::Error;

/// 底层统一错误类型
#[derive(Debug, Error)]
pub enum AvError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 无法识别的像素格式名称
    #[error("不支持的像素格式: {0}")]
    UnsupportedPixelFormat(String),

    /// 编解码器错误
    #[error("编解码器错误: {0}")]
    Codec(String),

    /// 容器格式错误
    #[error("格式错误: {0}")]
    Format(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 未找到指定的编解码器
    #[error("未找到编解码器: {0}")]
    CodecNotFound(String),

    /// 未找到指定的容器格式
    #[error("未找到容器格式: {0}")]
    FormatNotFound(String),

    /// 未找到指定的流
    #[error("未找到流: 索引 {0}")]
    StreamNotFound(usize),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

impl AvError {
    /// 是否为流水线信号 (`NeedMoreData` / `Eof`), 而非真正的失败
    pub fn is_pipeline_signal(&self) -> bool {
        matches!(self, Self::NeedMoreData | Self::Eof)
    }
}

/// 统一 Result 类型
pub type AvResult<T> = Result<T, AvError>;
