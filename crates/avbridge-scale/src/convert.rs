//! 像素格式转换.
//!
//! 支持的路径:
//! - packed (RGB24/BGR24/RGBA/BGRA/Gray8) → YUV420P
//! - YUV420P → packed
//! - packed → packed
//!
//! BT.601 有限精度矩阵 (×256 定点):
//! ```text
//! Y  =  0.299 R + 0.587 G + 0.114 B
//! Cb = -0.169 R - 0.331 G + 0.500 B + 128
//! Cr =  0.500 R - 0.419 G - 0.081 B + 128
//! ```
//!
//! 所有路径按目标行用 rayon 并行.

use rayon::prelude::*;

use avbridge_core::pixel_registry::{self, PixelFormatDescriptor};
use avbridge_core::{AvError, AvResult, PixelFormat};

const Y_R: i32 = 77;
const Y_G: i32 = 150;
const Y_B: i32 = 29;

const CB_R: i32 = -43;
const CB_G: i32 = -85;
const CB_B: i32 = 128;

const CR_R: i32 = 128;
const CR_G: i32 = -107;
const CR_B: i32 = -21;

/// 一个 packed 像素的读写方式
#[derive(Debug, Clone, Copy)]
struct PackedLayout {
    bpp: usize,
    /// R/G/B 偏移, 灰度为 `None`
    rgb: Option<(usize, usize, usize)>,
    alpha: Option<usize>,
}

impl PackedLayout {
    fn of(format: PixelFormat) -> AvResult<Self> {
        let desc: PixelFormatDescriptor = pixel_registry::describe(format)
            .filter(|d| d.is_packed())
            .ok_or_else(|| AvError::UnsupportedPixelFormat(format.name().into()))?;
        Ok(Self {
            bpp: desc.bytes_per_pixel() as usize,
            rgb: desc.order.rgb_offsets(),
            alpha: desc.order.alpha_offset(),
        })
    }

    #[inline]
    fn read(&self, px: &[u8]) -> (i32, i32, i32) {
        match self.rgb {
            Some((r, g, b)) => (i32::from(px[r]), i32::from(px[g]), i32::from(px[b])),
            None => {
                let v = i32::from(px[0]);
                (v, v, v)
            }
        }
    }

    #[inline]
    fn write(&self, px: &mut [u8], r: i32, g: i32, b: i32, alpha: u8) {
        match self.rgb {
            Some((ro, go, bo)) => {
                px[ro] = clamp_u8(r);
                px[go] = clamp_u8(g);
                px[bo] = clamp_u8(b);
            }
            None => px[0] = luma(r, g, b),
        }
        if let Some(a) = self.alpha {
            px[a] = alpha;
        }
    }
}

#[inline]
fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

#[inline]
fn luma(r: i32, g: i32, b: i32) -> u8 {
    clamp_u8((Y_R * r + Y_G * g + Y_B * b + 128) >> 8)
}

/// 转换是否受支持
pub fn is_supported(src: PixelFormat, dst: PixelFormat) -> bool {
    let known = |f: PixelFormat| f.is_packed() || f == PixelFormat::Yuv420p;
    known(src) && known(dst)
}

/// 同尺寸像素格式转换
///
/// `src`/`dst` 为各平面数据, 行跨度由 `*_linesize` 给出.
#[allow(clippy::too_many_arguments)]
pub fn convert(
    src: &[&[u8]],
    src_linesize: &[usize],
    src_format: PixelFormat,
    dst: &mut [&mut [u8]],
    dst_linesize: &[usize],
    dst_format: PixelFormat,
    width: u32,
    height: u32,
) -> AvResult<()> {
    let w = width as usize;
    let h = height as usize;
    let src_lens: Vec<usize> = src.iter().map(|p| p.len()).collect();
    let dst_lens: Vec<usize> = dst.iter().map(|p| p.len()).collect();
    check_planes(&src_lens, src_linesize, src_format, width, height)?;
    check_planes(&dst_lens, dst_linesize, dst_format, width, height)?;

    match (src_format, dst_format) {
        (PixelFormat::Yuv420p, PixelFormat::Yuv420p) => {
            for plane in 0..3 {
                let cols = src_format.plane_linesize(plane, width).unwrap_or(0);
                let rows = src_format.plane_height(plane, height).unwrap_or(0);
                copy_plane(src[plane], src_linesize[plane], dst[plane], dst_linesize[plane], cols, rows);
            }
            Ok(())
        }
        (s, PixelFormat::Yuv420p) => {
            let layout = PackedLayout::of(s)?;
            let (y, rest) = dst.split_at_mut(1);
            let (u, v) = rest.split_at_mut(1);
            packed_to_yuv420p(
                src[0],
                src_linesize[0],
                layout,
                [&mut *y[0], &mut *u[0], &mut *v[0]],
                [dst_linesize[0], dst_linesize[1], dst_linesize[2]],
                w,
                h,
            );
            Ok(())
        }
        (PixelFormat::Yuv420p, d) => {
            let layout = PackedLayout::of(d)?;
            yuv420p_to_packed(
                [src[0], src[1], src[2]],
                [src_linesize[0], src_linesize[1], src_linesize[2]],
                dst[0],
                dst_linesize[0],
                layout,
                w,
                h,
            );
            Ok(())
        }
        (s, d) if s == d => {
            let cols = w * PackedLayout::of(s)?.bpp;
            copy_plane(src[0], src_linesize[0], dst[0], dst_linesize[0], cols, h);
            Ok(())
        }
        (s, d) => {
            let from = PackedLayout::of(s)?;
            let to = PackedLayout::of(d)?;
            packed_to_packed(src[0], src_linesize[0], from, dst[0], dst_linesize[0], to, w, h);
            Ok(())
        }
    }
}

/// 校验平面数量、行跨度与缓冲区长度足以容纳 `width × height`
pub(crate) fn check_planes(
    lens: &[usize],
    linesize: &[usize],
    format: PixelFormat,
    width: u32,
    height: u32,
) -> AvResult<()> {
    let expected = format.plane_count() as usize;
    if expected == 0 || lens.len() < expected || linesize.len() < expected {
        return Err(AvError::InvalidArgument(format!(
            "{format} 需要 {expected} 个平面, 实际 {}",
            lens.len()
        )));
    }
    for plane in 0..expected {
        let row_bytes = format.plane_linesize(plane, width).unwrap_or(0);
        let rows = format.plane_height(plane, height).unwrap_or(0);
        let stride = linesize[plane];
        if stride == 0 || stride < row_bytes || lens[plane] < stride * rows.saturating_sub(1) + row_bytes {
            return Err(AvError::InvalidArgument(format!(
                "{format} 平面 {plane} 过小: stride={stride}, len={}, 需要 {rows} 行 × {row_bytes} 字节",
                lens[plane]
            )));
        }
    }
    Ok(())
}

fn copy_plane(src: &[u8], src_stride: usize, dst: &mut [u8], dst_stride: usize, cols: usize, rows: usize) {
    dst.par_chunks_mut(dst_stride)
        .take(rows)
        .enumerate()
        .for_each(|(row, line)| {
            let start = row * src_stride;
            line[..cols].copy_from_slice(&src[start..start + cols]);
        });
}

/// packed → YUV420P, 色度取 2×2 块平均
fn packed_to_yuv420p(
    src: &[u8],
    src_stride: usize,
    layout: PackedLayout,
    dst: [&mut [u8]; 3],
    dst_stride: [usize; 3],
    w: usize,
    h: usize,
) {
    let [y_plane, u_plane, v_plane] = dst;
    let bpp = layout.bpp;

    y_plane
        .par_chunks_mut(dst_stride[0])
        .take(h)
        .enumerate()
        .for_each(|(row, line)| {
            let src_row = &src[row * src_stride..];
            for (col, out) in line[..w].iter_mut().enumerate() {
                let (r, g, b) = layout.read(&src_row[col * bpp..]);
                *out = luma(r, g, b);
            }
        });

    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);
    u_plane
        .par_chunks_mut(dst_stride[1])
        .zip(v_plane.par_chunks_mut(dst_stride[2]))
        .take(ch)
        .enumerate()
        .for_each(|(cy, (u_line, v_line))| {
            for cx in 0..cw {
                let (mut sr, mut sg, mut sb, mut n) = (0, 0, 0, 0);
                for row in (cy * 2)..(cy * 2 + 2).min(h) {
                    for col in (cx * 2)..(cx * 2 + 2).min(w) {
                        let (r, g, b) = layout.read(&src[row * src_stride + col * bpp..]);
                        sr += r;
                        sg += g;
                        sb += b;
                        n += 1;
                    }
                }
                let (r, g, b) = (sr / n, sg / n, sb / n);
                u_line[cx] = clamp_u8(((CB_R * r + CB_G * g + CB_B * b + 128) >> 8) + 128);
                v_line[cx] = clamp_u8(((CR_R * r + CR_G * g + CR_B * b + 128) >> 8) + 128);
            }
        });
}

/// YUV420P → packed (BT.601 逆变换)
fn yuv420p_to_packed(
    src: [&[u8]; 3],
    src_stride: [usize; 3],
    dst: &mut [u8],
    dst_stride: usize,
    layout: PackedLayout,
    w: usize,
    h: usize,
) {
    let bpp = layout.bpp;
    dst.par_chunks_mut(dst_stride)
        .take(h)
        .enumerate()
        .for_each(|(row, line)| {
            let y_row = &src[0][row * src_stride[0]..];
            let u_row = &src[1][(row / 2) * src_stride[1]..];
            let v_row = &src[2][(row / 2) * src_stride[2]..];
            for col in 0..w {
                let y = i32::from(y_row[col]);
                let u = i32::from(u_row[col / 2]) - 128;
                let v = i32::from(v_row[col / 2]) - 128;
                let r = y + ((v * 359 + 128) >> 8);
                let g = y - ((u * 88 + v * 183 + 128) >> 8);
                let b = y + ((u * 454 + 128) >> 8);
                let px = &mut line[col * bpp..(col + 1) * bpp];
                match layout.rgb {
                    Some(_) => layout.write(px, r, g, b, 255),
                    None => px[0] = clamp_u8(y),
                }
            }
        });
}

/// packed → packed, 通道重排/灰度化/补 alpha
#[allow(clippy::too_many_arguments)]
fn packed_to_packed(
    src: &[u8],
    src_stride: usize,
    from: PackedLayout,
    dst: &mut [u8],
    dst_stride: usize,
    to: PackedLayout,
    w: usize,
    h: usize,
) {
    dst.par_chunks_mut(dst_stride)
        .take(h)
        .enumerate()
        .for_each(|(row, line)| {
            let src_row = &src[row * src_stride..];
            for col in 0..w {
                let px = &src_row[col * from.bpp..(col + 1) * from.bpp];
                let (r, g, b) = from.read(px);
                let alpha = from.alpha.map_or(255, |a| px[a]);
                to.write(&mut line[col * to.bpp..(col + 1) * to.bpp], r, g, b, alpha);
            }
        });
}
