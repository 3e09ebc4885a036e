//! # avbridge
//!
//! 纯 Rust 实现的音视频编解码会话桥.
//!
//! 调用方通过 [`RuntimeContext`](session::RuntimeContext) 打开编码/解码会话,
//! 以整数句柄交换帧缓冲. 会话负责像素格式转换、保持宽高比的缩放,
//! 以及编码器刷新与容器收尾.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use avbridge::core::PixelFormat;
//! use avbridge::session::{FrameBuffer, RuntimeContext};
//!
//! # fn main() -> Result<(), avbridge::session::BridgeError> {
//! let ctx = RuntimeContext::new()?;
//! let handle = ctx.open_encoder(64, 64, "out.mp4", "AV_PIX_FMT_RGB24")?;
//! let frame = FrameBuffer::alloc(64, 64, PixelFormat::Rgb24)?;
//! ctx.encode_frame(handle, &frame)?;
//! ctx.close_encoder(handle)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `avbridge-core` | 错误、像素格式注册表、有理数与时间戳 |
//! | `avbridge-codec` | 编解码器流水线与注册表 |
//! | `avbridge-format` | 容器封装/解封装 |
//! | `avbridge-scale` | 缩放与像素格式转换 |
//! | `avbridge-session` | 帧缓冲、会话与句柄桥 |

/// 核心类型
pub use avbridge_core as core;

/// 编解码器框架
pub use avbridge_codec as codec;

/// 容器格式
pub use avbridge_format as format;

/// 缩放与像素格式转换
pub use avbridge_scale as scale;

/// 会话桥
pub use avbridge_session as session;

/// 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 注册了所有内置编解码器的注册表
pub fn default_codec_registry() -> avbridge_codec::CodecRegistry {
    let mut registry = avbridge_codec::CodecRegistry::new();
    avbridge_codec::register_all(&mut registry);
    registry
}

/// 注册了所有内置容器格式的注册表
pub fn default_format_registry() -> avbridge_format::FormatRegistry {
    let mut registry = avbridge_format::FormatRegistry::new();
    avbridge_format::register_all(&mut registry);
    registry
}
