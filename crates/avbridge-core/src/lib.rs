//! # avbridge-core
//!
//! avbridge 核心库, 提供各层共用的基础类型定义与错误处理.
//!
//! - [`AvError`] / [`AvResult`]: 编解码层与容器层的统一错误
//! - [`PixelFormat`]: 像素存储格式
//! - [`pixel_registry`]: 符号名称到像素布局描述符的解析 (像素格式注册表)
//! - [`Rational`] / [`Timestamp`]: 时间基与时间戳

pub mod error;
pub mod media_type;
pub mod pixel_format;
pub mod pixel_registry;
pub mod rational;
pub mod timestamp;

// 重导出常用类型
pub use error::{AvError, AvResult};
pub use media_type::MediaType;
pub use pixel_format::PixelFormat;
pub use pixel_registry::{ChannelOrder, PixelFormatDescriptor};
pub use rational::Rational;
pub use timestamp::Timestamp;
