//! # avbridge-scale
//!
//! 图像缩放与像素格式转换.
//!
//! - [`convert`]: packed RGB/BGR/RGBA/BGRA/Gray8 与 YUV420P 之间的 BT.601 转换
//! - [`scale`]: 最近邻与双线性缩放
//! - [`ScaleContext`]: 配置一次, 对每帧执行 "缩放 + 转换"

pub mod convert;
pub mod scale;

use std::fmt;
use std::str::FromStr;

use log::debug;

use avbridge_core::{AvError, AvResult, PixelFormat};

/// 缩放算法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScaleAlgorithm {
    /// 最近邻
    Nearest,
    /// 双线性插值
    #[default]
    Bilinear,
}

impl ScaleAlgorithm {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
        }
    }
}

impl fmt::Display for ScaleAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScaleAlgorithm {
    type Err = AvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" | "neighbor" | "point" => Ok(Self::Nearest),
            "bilinear" | "linear" => Ok(Self::Bilinear),
            other => Err(AvError::InvalidArgument(format!("未知缩放算法: {other}"))),
        }
    }
}

/// 缩放/转换上下文
///
/// 源与目标尺寸、像素格式在创建时固定, 之后可对任意多帧复用.
/// 尺寸不同且格式不同时先按源格式缩放到目标尺寸, 再转换格式.
#[derive(Debug)]
pub struct ScaleContext {
    pub src_width: u32,
    pub src_height: u32,
    pub src_format: PixelFormat,
    pub dst_width: u32,
    pub dst_height: u32,
    pub dst_format: PixelFormat,
    pub algorithm: ScaleAlgorithm,
    /// 源格式、目标尺寸的中间平面, 仅在需要两步处理时分配
    scratch: Option<(Vec<Vec<u8>>, Vec<usize>)>,
}

impl ScaleContext {
    /// 创建上下文, 尺寸为零或转换路径不支持时失败
    pub fn new(
        src_width: u32,
        src_height: u32,
        src_format: PixelFormat,
        dst_width: u32,
        dst_height: u32,
        dst_format: PixelFormat,
        algorithm: ScaleAlgorithm,
    ) -> AvResult<Self> {
        if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
            return Err(AvError::InvalidArgument(format!(
                "缩放尺寸无效: {src_width}x{src_height} → {dst_width}x{dst_height}"
            )));
        }
        if !convert::is_supported(src_format, dst_format) {
            return Err(AvError::Unsupported(format!(
                "不支持的格式转换: {src_format} → {dst_format}"
            )));
        }

        let resize = (src_width, src_height) != (dst_width, dst_height);
        let scratch = (resize && src_format != dst_format).then(|| {
            let planes = src_format.plane_count() as usize;
            let linesize: Vec<usize> = (0..planes)
                .map(|p| src_format.plane_linesize(p, dst_width).unwrap_or(0))
                .collect();
            let data = (0..planes)
                .map(|p| vec![0u8; linesize[p] * src_format.plane_height(p, dst_height).unwrap_or(0)])
                .collect();
            (data, linesize)
        });

        debug!(
            "ScaleContext: {src_width}x{src_height} {src_format} → {dst_width}x{dst_height} {dst_format} ({algorithm})"
        );
        Ok(Self {
            src_width,
            src_height,
            src_format,
            dst_width,
            dst_height,
            dst_format,
            algorithm,
            scratch,
        })
    }

    /// 是否什么都不做 (同尺寸同格式)
    pub fn is_passthrough(&self) -> bool {
        self.src_format == self.dst_format
            && (self.src_width, self.src_height) == (self.dst_width, self.dst_height)
    }

    /// 对一帧执行缩放/转换
    pub fn scale(
        &mut self,
        src: &[&[u8]],
        src_linesize: &[usize],
        dst: &mut [&mut [u8]],
        dst_linesize: &[usize],
    ) -> AvResult<()> {
        let same_size = (self.src_width, self.src_height) == (self.dst_width, self.dst_height);
        if same_size {
            return convert::convert(
                src,
                src_linesize,
                self.src_format,
                dst,
                dst_linesize,
                self.dst_format,
                self.dst_width,
                self.dst_height,
            );
        }

        let Some((tmp, tmp_linesize)) = self.scratch.as_mut() else {
            return scale::scale_image(
                src,
                src_linesize,
                self.src_width,
                self.src_height,
                self.src_format,
                dst,
                dst_linesize,
                self.dst_width,
                self.dst_height,
                self.algorithm,
            );
        };

        {
            let mut tmp_refs: Vec<&mut [u8]> = tmp.iter_mut().map(Vec::as_mut_slice).collect();
            scale::scale_image(
                src,
                src_linesize,
                self.src_width,
                self.src_height,
                self.src_format,
                &mut tmp_refs,
                tmp_linesize,
                self.dst_width,
                self.dst_height,
                self.algorithm,
            )?;
        }
        let tmp_refs: Vec<&[u8]> = tmp.iter().map(Vec::as_slice).collect();
        convert::convert(
            &tmp_refs,
            tmp_linesize,
            self.src_format,
            dst,
            dst_linesize,
            self.dst_format,
            self.dst_width,
            self.dst_height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_同格式同尺寸复制() {
        let mut ctx = ScaleContext::new(
            4,
            4,
            PixelFormat::Rgb24,
            4,
            4,
            PixelFormat::Rgb24,
            ScaleAlgorithm::Bilinear,
        )
        .unwrap();
        assert!(ctx.is_passthrough());
        let src: Vec<u8> = (0..48).collect();
        let mut dst = vec![0u8; 48];
        ctx.scale(&[&src], &[12], &mut [&mut dst], &[12]).unwrap();
        assert_eq!(src, dst);
    }

    #[test]
    fn test_缩放并转换_yuv_到_rgb() {
        let mut ctx = ScaleContext::new(
            8,
            8,
            PixelFormat::Yuv420p,
            4,
            4,
            PixelFormat::Rgb24,
            ScaleAlgorithm::Bilinear,
        )
        .unwrap();
        let y = vec![255u8; 64];
        let u = vec![128u8; 16];
        let v = vec![128u8; 16];
        let mut rgb = vec![0u8; 48];
        ctx.scale(&[&y, &u, &v], &[8, 4, 4], &mut [&mut rgb], &[12])
            .unwrap();
        assert!(rgb.iter().all(|&c| c == 255));
    }

    #[test]
    fn test_rgb_转_yuv_绿色() {
        let mut ctx = ScaleContext::new(
            4,
            4,
            PixelFormat::Rgb24,
            4,
            4,
            PixelFormat::Yuv420p,
            ScaleAlgorithm::Nearest,
        )
        .unwrap();
        let rgb: Vec<u8> = (0..16).flat_map(|_| [0u8, 255, 0]).collect();
        let mut y = vec![0u8; 16];
        let mut u = vec![0u8; 4];
        let mut v = vec![0u8; 4];
        ctx.scale(&[&rgb], &[12], &mut [&mut y, &mut u, &mut v], &[4, 2, 2])
            .unwrap();
        assert!(y[0] > 140 && y[0] < 160, "Y={}", y[0]);
    }

    #[test]
    fn test_无效参数() {
        assert!(
            ScaleContext::new(0, 4, PixelFormat::Rgb24, 4, 4, PixelFormat::Rgb24, ScaleAlgorithm::Nearest)
                .is_err()
        );
        assert!(matches!(
            ScaleContext::new(4, 4, PixelFormat::None, 4, 4, PixelFormat::Rgb24, ScaleAlgorithm::Nearest),
            Err(AvError::Unsupported(_))
        ));
    }

    #[test]
    fn test_算法名称解析() {
        assert_eq!("Bilinear".parse::<ScaleAlgorithm>().unwrap(), ScaleAlgorithm::Bilinear);
        assert_eq!(" nearest ".parse::<ScaleAlgorithm>().unwrap(), ScaleAlgorithm::Nearest);
        assert!("lanczos".parse::<ScaleAlgorithm>().is_err());
        assert_eq!(ScaleAlgorithm::default().name(), "bilinear");
    }
}
