//! 像素格式注册表.
//!
//! 将符号化的像素格式名称 (如 `"AV_PIX_FMT_RGB24"`, `"rgb24"`) 解析为
//! 二进制布局描述符. 解析在固定的封闭集合上是全函数: 未知名称总是
//! 返回 [`AvError::UnsupportedPixelFormat`], 从不回退到默认格式.
//!
//! 接受的拼写:
//! - FFmpeg 枚举名: `AV_PIX_FMT_RGB24`
//! - 短名称: `rgb24`
//! - 常见别名: `gray` (= `gray8`), `i420` (= `yuv420p`)
//!
//! 大小写不敏感, 忽略首尾空白.

use std::fmt;

use crate::error::{AvError, AvResult};
use crate::pixel_format::PixelFormat;

/// 通道排列顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOrder {
    /// R, G, B
    Rgb,
    /// B, G, R
    Bgr,
    /// R, G, B, A
    Rgba,
    /// B, G, R, A
    Bgra,
    /// 单通道亮度
    Gray,
    /// Y, U, V 分平面存储
    Yuv,
}

impl ChannelOrder {
    /// 红/绿/蓝分量在一个 packed 像素内的字节偏移, 灰度与 YUV 返回 `None`
    pub const fn rgb_offsets(&self) -> Option<(usize, usize, usize)> {
        match self {
            Self::Rgb | Self::Rgba => Some((0, 1, 2)),
            Self::Bgr | Self::Bgra => Some((2, 1, 0)),
            Self::Gray | Self::Yuv => None,
        }
    }

    /// alpha 分量的字节偏移
    pub const fn alpha_offset(&self) -> Option<usize> {
        match self {
            Self::Rgba | Self::Bgra => Some(3),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rgb => "RGB",
            Self::Bgr => "BGR",
            Self::Rgba => "RGBA",
            Self::Bgra => "BGRA",
            Self::Gray => "Y",
            Self::Yuv => "YUV",
        };
        write!(f, "{name}")
    }
}

/// 像素格式描述符
///
/// 描述一个像素格式的二进制布局: 通道数、每通道字节数和通道顺序.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormatDescriptor {
    /// 对应的像素格式
    pub format: PixelFormat,
    /// FFmpeg 枚举名 (如 `AV_PIX_FMT_RGB24`)
    pub ffmpeg_name: &'static str,
    /// 通道数
    pub channels: u32,
    /// 每通道字节数
    pub bytes_per_channel: u32,
    /// 通道顺序
    pub order: ChannelOrder,
}

impl PixelFormatDescriptor {
    /// 每像素字节数
    ///
    /// 仅对 packed 格式有意义; planar 格式的平均值不是整数, 返回 0.
    pub const fn bytes_per_pixel(&self) -> u32 {
        if self.format.is_packed() {
            self.channels * self.bytes_per_channel
        } else {
            0
        }
    }

    /// 是否为单平面打包格式
    pub const fn is_packed(&self) -> bool {
        self.format.is_packed()
    }

    /// 指定宽度下的行跨度 (packed 格式为 width × 每像素字节数)
    pub fn stride(&self, width: u32) -> usize {
        width as usize * self.bytes_per_pixel() as usize
    }

    /// 指定尺寸下整帧的字节数
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        self.format.frame_size(width, height).unwrap_or(0)
    }
}

/// 注册条目: 描述符 + 可接受的别名
struct RegistryEntry {
    descriptor: PixelFormatDescriptor,
    aliases: &'static [&'static str],
}

const fn descriptor(
    format: PixelFormat,
    ffmpeg_name: &'static str,
    channels: u32,
    order: ChannelOrder,
) -> PixelFormatDescriptor {
    PixelFormatDescriptor {
        format,
        ffmpeg_name,
        channels,
        bytes_per_channel: 1,
        order,
    }
}

static REGISTRY: &[RegistryEntry] = &[
    RegistryEntry {
        descriptor: descriptor(PixelFormat::Rgb24, "AV_PIX_FMT_RGB24", 3, ChannelOrder::Rgb),
        aliases: &["rgb24", "rgb"],
    },
    RegistryEntry {
        descriptor: descriptor(PixelFormat::Bgr24, "AV_PIX_FMT_BGR24", 3, ChannelOrder::Bgr),
        aliases: &["bgr24", "bgr"],
    },
    RegistryEntry {
        descriptor: descriptor(PixelFormat::Rgba, "AV_PIX_FMT_RGBA", 4, ChannelOrder::Rgba),
        aliases: &["rgba"],
    },
    RegistryEntry {
        descriptor: descriptor(PixelFormat::Bgra, "AV_PIX_FMT_BGRA", 4, ChannelOrder::Bgra),
        aliases: &["bgra"],
    },
    RegistryEntry {
        descriptor: descriptor(PixelFormat::Gray8, "AV_PIX_FMT_GRAY8", 1, ChannelOrder::Gray),
        aliases: &["gray8", "gray"],
    },
    RegistryEntry {
        descriptor: descriptor(
            PixelFormat::Yuv420p,
            "AV_PIX_FMT_YUV420P",
            3,
            ChannelOrder::Yuv,
        ),
        aliases: &["yuv420p", "i420"],
    },
];

/// 将符号名称解析为像素格式描述符
///
/// # 错误
/// 名称不在支持集合内时返回 [`AvError::UnsupportedPixelFormat`].
pub fn resolve(name: &str) -> AvResult<PixelFormatDescriptor> {
    let key = normalize(name);
    REGISTRY
        .iter()
        .find(|entry| entry.aliases.contains(&key.as_str()))
        .map(|entry| entry.descriptor)
        .ok_or_else(|| AvError::UnsupportedPixelFormat(name.trim().to_string()))
}

/// 查询像素格式的描述符, `PixelFormat::None` 返回 `None`
pub fn describe(format: PixelFormat) -> Option<PixelFormatDescriptor> {
    REGISTRY
        .iter()
        .map(|entry| entry.descriptor)
        .find(|d| d.format == format)
}

/// 所有已注册的描述符
pub fn supported_formats() -> impl Iterator<Item = PixelFormatDescriptor> {
    REGISTRY.iter().map(|entry| entry.descriptor)
}

/// 去除空白与 `AV_PIX_FMT_` 前缀, 转为小写
fn normalize(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    match lower.strip_prefix("av_pix_fmt_") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_解析_ffmpeg_rgb24() {
        let d = resolve("AV_PIX_FMT_RGB24").unwrap();
        assert_eq!(d.format, PixelFormat::Rgb24);
        assert_eq!(d.channels, 3);
        assert_eq!(d.bytes_per_channel, 1);
        assert_eq!(d.order, ChannelOrder::Rgb);
        assert_eq!(d.bytes_per_pixel(), 3);
    }

    #[test]
    fn test_解析结果确定() {
        for _ in 0..3 {
            assert_eq!(
                resolve("AV_PIX_FMT_RGB24").unwrap(),
                resolve("rgb24").unwrap()
            );
        }
    }

    #[test]
    fn test_大小写与空白() {
        assert_eq!(resolve("  Rgb24 ").unwrap().format, PixelFormat::Rgb24);
        assert_eq!(resolve("av_pix_fmt_bgra").unwrap().format, PixelFormat::Bgra);
        assert_eq!(resolve("GRAY").unwrap().format, PixelFormat::Gray8);
    }

    #[test]
    fn test_未知名称失败() {
        for name in ["AV_PIX_FMT_NV12", "", "rgb48", "AV_PIX_FMT_"] {
            let err = resolve(name).unwrap_err();
            assert!(
                matches!(err, AvError::UnsupportedPixelFormat(_)),
                "{name:?} 应当被拒绝"
            );
        }
    }

    #[test]
    fn test_yuv420p_无整数字节每像素() {
        let d = resolve("AV_PIX_FMT_YUV420P").unwrap();
        assert!(!d.is_packed());
        assert_eq!(d.bytes_per_pixel(), 0);
        assert_eq!(d.frame_size(4, 4), 24);
    }

    #[test]
    fn test_describe_与_resolve_一致() {
        for d in supported_formats() {
            assert_eq!(describe(d.format), Some(d));
            assert_eq!(resolve(d.ffmpeg_name).unwrap(), d);
            assert_eq!(resolve(d.format.name()).unwrap(), d);
        }
        assert_eq!(describe(PixelFormat::None), None);
    }

    #[test]
    fn test_通道偏移() {
        assert_eq!(ChannelOrder::Bgr.rgb_offsets(), Some((2, 1, 0)));
        assert_eq!(ChannelOrder::Rgba.alpha_offset(), Some(3));
        assert_eq!(ChannelOrder::Gray.rgb_offsets(), None);
    }

    #[test]
    fn test_stride() {
        let d = resolve("rgba").unwrap();
        assert_eq!(d.stride(10), 40);
    }
}
