//! 像素格式定义.
//!
//! 会话层面向调用方的格式全部为 packed (单平面交错) 格式,
//! 编解码器内部使用 planar YUV 4:2:0.

use std::fmt;

/// 像素格式
///
/// 命名规则: 颜色空间 + 位深 + 排列方式 (P=Planar).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// 未指定
    None,
    /// YUV 4:2:0 平面格式, 8 位
    Yuv420p,
    /// RGB 各 8 位, 打包
    Rgb24,
    /// BGR 各 8 位, 打包
    Bgr24,
    /// RGBA 各 8 位, 打包
    Rgba,
    /// BGRA 各 8 位, 打包
    Bgra,
    /// 灰度 8 位
    Gray8,
}

impl PixelFormat {
    /// 所有具体格式 (不含 `None`)
    pub const ALL: &[PixelFormat] = &[
        Self::Yuv420p,
        Self::Rgb24,
        Self::Bgr24,
        Self::Rgba,
        Self::Bgra,
        Self::Gray8,
    ];

    /// 短名称 (小写, 与 FFmpeg `-pix_fmt` 取值一致)
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Yuv420p => "yuv420p",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Rgba => "rgba",
            Self::Bgra => "bgra",
            Self::Gray8 => "gray8",
        }
    }

    /// 获取色度子采样 (log2 水平, log2 垂直)
    pub const fn chroma_subsampling(&self) -> (u32, u32) {
        match self {
            Self::Yuv420p => (1, 1),
            _ => (0, 0),
        }
    }

    /// 是否为平面格式
    pub const fn is_planar(&self) -> bool {
        matches!(self, Self::Yuv420p)
    }

    /// 是否为单平面打包格式
    pub const fn is_packed(&self) -> bool {
        !matches!(self, Self::None | Self::Yuv420p)
    }

    /// packed 格式每像素字节数, planar 与 `None` 返回 0
    pub const fn packed_bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb24 | Self::Bgr24 => 3,
            Self::Rgba | Self::Bgra => 4,
            Self::Gray8 => 1,
            Self::None | Self::Yuv420p => 0,
        }
    }

    /// 平面数量
    pub const fn plane_count(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Yuv420p => 3,
            _ => 1,
        }
    }

    /// 计算指定平面每行的字节数 (linesize / stride)
    ///
    /// 格式为 `None` 或平面索引越界时返回 `None`.
    pub fn plane_linesize(&self, plane: usize, width: u32) -> Option<usize> {
        if plane >= self.plane_count() as usize {
            return None;
        }
        let w = width as usize;
        Some(match self {
            Self::Yuv420p if plane > 0 => w.div_ceil(2),
            Self::Yuv420p => w,
            _ => w * self.packed_bytes_per_pixel(),
        })
    }

    /// 计算指定平面的行数
    pub fn plane_height(&self, plane: usize, height: u32) -> Option<usize> {
        if plane >= self.plane_count() as usize {
            return None;
        }
        let h = height as usize;
        Some(match self {
            Self::Yuv420p if plane > 0 => h.div_ceil(2),
            _ => h,
        })
    }

    /// 计算整帧的字节数, 格式为 `None` 时返回 `None`
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        if *self == Self::None {
            return None;
        }
        let mut total = 0usize;
        for plane in 0..self.plane_count() as usize {
            total += self.plane_linesize(plane, width)? * self.plane_height(plane, height)?;
        }
        Some(total)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv420p_frame_size() {
        let pf = PixelFormat::Yuv420p;
        assert_eq!(pf.frame_size(256, 256), Some(256 * 256 * 3 / 2));
        assert_eq!(pf.plane_linesize(0, 256), Some(256));
        assert_eq!(pf.plane_linesize(1, 256), Some(128));
        assert_eq!(pf.plane_height(2, 256), Some(128));
    }

    #[test]
    fn test_yuv420p_奇数尺寸向上取整() {
        let pf = PixelFormat::Yuv420p;
        assert_eq!(pf.plane_linesize(1, 5), Some(3));
        assert_eq!(pf.plane_height(1, 3), Some(2));
    }

    #[test]
    fn test_packed_frame_size() {
        assert_eq!(PixelFormat::Rgb24.frame_size(100, 100), Some(30_000));
        assert_eq!(PixelFormat::Bgra.frame_size(2, 2), Some(16));
        assert_eq!(PixelFormat::Gray8.frame_size(320, 240), Some(320 * 240));
    }

    #[test]
    fn test_none_return_none() {
        assert_eq!(PixelFormat::None.frame_size(16, 16), None);
        assert_eq!(PixelFormat::None.plane_linesize(0, 16), None);
    }

    #[test]
    fn test_plane_index_out_of_bounds_return_none() {
        assert_eq!(PixelFormat::Rgb24.plane_linesize(1, 16), None);
        assert_eq!(PixelFormat::Yuv420p.plane_height(3, 16), None);
    }

    #[test]
    fn test_packed_与_planar_分类() {
        assert!(PixelFormat::Rgb24.is_packed());
        assert!(!PixelFormat::Yuv420p.is_packed());
        assert!(PixelFormat::Yuv420p.is_planar());
        assert!(!PixelFormat::None.is_packed());
    }
}
