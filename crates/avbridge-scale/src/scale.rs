//! 单格式缩放.
//!
//! - 最近邻: 直接取最近的源像素
//! - 双线性: 周围 4 个源像素按距离加权, 8 位小数定点
//!
//! packed 格式整体缩放; YUV420P 每个平面独立缩放, 色度平面尺寸向上取整.
//! 目标行之间用 rayon 并行.

use rayon::prelude::*;

use avbridge_core::{AvError, AvResult, PixelFormat};

use crate::ScaleAlgorithm;

/// 一个平面的几何
#[derive(Debug, Clone, Copy)]
pub(crate) struct Plane {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
}

/// 把 `src` 缩放到 `dst` 尺寸, 源与目标像素格式相同
#[allow(clippy::too_many_arguments)]
pub fn scale_image(
    src: &[&[u8]],
    src_linesize: &[usize],
    src_width: u32,
    src_height: u32,
    format: PixelFormat,
    dst: &mut [&mut [u8]],
    dst_linesize: &[usize],
    dst_width: u32,
    dst_height: u32,
    algorithm: ScaleAlgorithm,
) -> AvResult<()> {
    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(AvError::InvalidArgument(format!(
            "缩放尺寸无效: {src_width}x{src_height} → {dst_width}x{dst_height}"
        )));
    }
    let src_lens: Vec<usize> = src.iter().map(|p| p.len()).collect();
    let dst_lens: Vec<usize> = dst.iter().map(|p| p.len()).collect();
    crate::convert::check_planes(&src_lens, src_linesize, format, src_width, src_height)?;
    crate::convert::check_planes(&dst_lens, dst_linesize, format, dst_width, dst_height)?;

    let bpp = match format {
        PixelFormat::Yuv420p => 1,
        f if f.is_packed() => f.packed_bytes_per_pixel(),
        f => {
            return Err(AvError::Unsupported(format!("缩放不支持像素格式 {f}")));
        }
    };

    for plane in 0..format.plane_count() as usize {
        let geometry = |w: u32, h: u32, stride: usize| Plane {
            width: if plane == 0 { w as usize } else { w.div_ceil(2) as usize },
            height: if plane == 0 { h as usize } else { h.div_ceil(2) as usize },
            stride,
        };
        let from = geometry(src_width, src_height, src_linesize[plane]);
        let to = geometry(dst_width, dst_height, dst_linesize[plane]);
        match algorithm {
            ScaleAlgorithm::Nearest => scale_plane_nearest(src[plane], from, dst[plane], to, bpp),
            ScaleAlgorithm::Bilinear => scale_plane_bilinear(src[plane], from, dst[plane], to, bpp),
        }
    }
    Ok(())
}

fn scale_plane_nearest(src: &[u8], from: Plane, dst: &mut [u8], to: Plane, bpp: usize) {
    let columns: Vec<usize> = (0..to.width)
        .map(|dx| (dx * from.width / to.width).min(from.width - 1))
        .collect();

    dst.par_chunks_mut(to.stride)
        .take(to.height)
        .enumerate()
        .for_each(|(dy, line)| {
            let sy = (dy * from.height / to.height).min(from.height - 1);
            let src_row = &src[sy * from.stride..];
            for (dx, &sx) in columns.iter().enumerate() {
                line[dx * bpp..(dx + 1) * bpp].copy_from_slice(&src_row[sx * bpp..(sx + 1) * bpp]);
            }
        });
}

/// 双线性插值
///
/// ```text
/// (x0,y0) ---fx--- (x1,y0)
///    |                |
///    fy    (x,y)      |
///    |                |
/// (x0,y1) -------- (x1,y1)
/// ```
/// 四个权重之和为 256 × 256.
fn scale_plane_bilinear(src: &[u8], from: Plane, dst: &mut [u8], to: Plane, bpp: usize) {
    let columns: Vec<(usize, usize, u32)> = (0..to.width)
        .map(|dx| map_coord(dx, to.width, from.width))
        .collect();

    dst.par_chunks_mut(to.stride)
        .take(to.height)
        .enumerate()
        .for_each(|(dy, line)| {
            let (sy0, sy1, fy) = map_coord(dy, to.height, from.height);
            let iy = 256 - fy;
            let row0 = &src[sy0 * from.stride..];
            let row1 = &src[sy1 * from.stride..];

            for (dx, &(sx0, sx1, fx)) in columns.iter().enumerate() {
                let ix = 256 - fx;
                let weights = [ix * iy, fx * iy, ix * fy, fx * fy];
                for c in 0..bpp {
                    let taps = [
                        row0[sx0 * bpp + c],
                        row0[sx1 * bpp + c],
                        row1[sx0 * bpp + c],
                        row1[sx1 * bpp + c],
                    ];
                    let sum: u32 = taps
                        .iter()
                        .zip(weights)
                        .map(|(&p, w)| u32::from(p) * w)
                        .sum();
                    line[dx * bpp + c] = ((sum + 32768) >> 16) as u8;
                }
            }
        });
}

/// 目标坐标映射到源坐标 (像素中心对齐)
///
/// 返回 `(左/上索引, 右/下索引, 8 位小数)`, 索引已夹在 `[0, src_size)`.
#[inline]
fn map_coord(dst_idx: usize, dst_size: usize, src_size: usize) -> (usize, usize, u32) {
    // src = (dst + 0.5) * src_size / dst_size - 0.5, 放大 256 倍
    let pos = ((dst_idx as u64 * 2 + 1) * src_size as u64 * 128 / dst_size as u64).saturating_sub(128);
    let last = src_size - 1;
    let idx0 = ((pos >> 8) as usize).min(last);
    let idx1 = (idx0 + 1).min(last);
    (idx0, idx1, (pos & 0xFF) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(src: &[u8], sw: u32, sh: u32, dw: u32, dh: u32, alg: ScaleAlgorithm) -> Vec<u8> {
        let mut dst = vec![0u8; (dw * dh) as usize];
        scale_image(
            &[src],
            &[sw as usize],
            sw,
            sh,
            PixelFormat::Gray8,
            &mut [&mut dst],
            &[dw as usize],
            dw,
            dh,
            alg,
        )
        .unwrap();
        dst
    }

    #[test]
    fn test_最近邻_放大() {
        let dst = gray(&[1, 2, 3, 4], 2, 2, 4, 4, ScaleAlgorithm::Nearest);
        assert_eq!(&dst[0..4], &[1, 1, 2, 2]);
        assert_eq!(&dst[12..16], &[3, 3, 4, 4]);
    }

    #[test]
    fn test_双线性_常量图保持不变() {
        let src = vec![200u8; 256 * 256];
        let dst = gray(&src, 256, 256, 100, 100, ScaleAlgorithm::Bilinear);
        assert!(dst.iter().all(|&v| v == 200));
    }

    #[test]
    fn test_双线性_插值在范围内() {
        let dst = gray(&[0, 100, 200, 50], 2, 2, 4, 4, ScaleAlgorithm::Bilinear);
        assert!(dst[0] < 20);
        assert!(dst[3] > 80 && dst[3] < 120);
        assert!(dst[12] > 180);
    }

    #[test]
    fn test_yuv420p_按平面缩放() {
        let (sw, sh, dw, dh) = (8u32, 8u32, 4u32, 4u32);
        let y = vec![10u8; 64];
        let u = vec![20u8; 16];
        let v = vec![30u8; 16];
        let mut dy = vec![0u8; 16];
        let mut du = vec![0u8; 4];
        let mut dv = vec![0u8; 4];
        scale_image(
            &[&y, &u, &v],
            &[8, 4, 4],
            sw,
            sh,
            PixelFormat::Yuv420p,
            &mut [&mut dy, &mut du, &mut dv],
            &[4, 2, 2],
            dw,
            dh,
            ScaleAlgorithm::Bilinear,
        )
        .unwrap();
        assert!(dy.iter().all(|&p| p == 10));
        assert!(du.iter().all(|&p| p == 20));
        assert!(dv.iter().all(|&p| p == 30));
    }

    #[test]
    fn test_rgb24_缩小保持通道() {
        let src: Vec<u8> = (0..16).flat_map(|_| [255u8, 0, 128]).collect();
        let mut dst = vec![0u8; 12];
        scale_image(
            &[&src],
            &[12],
            4,
            4,
            PixelFormat::Rgb24,
            &mut [&mut dst],
            &[6],
            2,
            2,
            ScaleAlgorithm::Nearest,
        )
        .unwrap();
        assert_eq!(&dst[0..3], &[255, 0, 128]);
    }

    #[test]
    fn test_目标缓冲过小() {
        let src = [0u8; 4];
        let mut dst = [0u8; 3];
        let err = scale_image(
            &[&src],
            &[2],
            2,
            2,
            PixelFormat::Gray8,
            &mut [&mut dst],
            &[2],
            2,
            2,
            ScaleAlgorithm::Nearest,
        )
        .unwrap_err();
        assert!(matches!(err, AvError::InvalidArgument(_)));
    }

    #[test]
    fn test_坐标映射() {
        assert_eq!(map_coord(0, 4, 2), (0, 1, 0));
        let (i0, i1, _) = map_coord(3, 4, 2);
        assert_eq!((i0, i1), (1, 1));
    }
}
