//! 尺寸校验与解码输出尺寸协商.

use crate::error::{BridgeError, BridgeResult};

/// 单帧缓冲上限 (字节)
pub const MAX_FRAME_BYTES: u64 = i32::MAX as u64;

/// 支持格式中每像素最多占用的字节数 (RGBA/BGRA)
const MAX_BYTES_PER_PIXEL: u64 = 4;

/// 按最宽像素格式估算单帧大小, 超过 [`MAX_FRAME_BYTES`] 时拒绝
fn check_frame_bytes(width: u32, height: u32) -> BridgeResult<()> {
    let bytes = u64::from(width)
        .checked_mul(u64::from(height))
        .and_then(|n| n.checked_mul(MAX_BYTES_PER_PIXEL));
    match bytes {
        Some(n) if n <= MAX_FRAME_BYTES => Ok(()),
        _ => Err(BridgeError::InvalidGeometry(format!(
            "尺寸过大: {width}x{height}, 单帧超过 {MAX_FRAME_BYTES} 字节"
        ))),
    }
}

/// 编码尺寸必须为正偶数
pub fn validate_encode_geometry(width: u32, height: u32) -> BridgeResult<()> {
    if width == 0 || height == 0 {
        return Err(BridgeError::InvalidGeometry(format!(
            "宽高必须为正数: {width}x{height}"
        )));
    }
    if width % 2 != 0 || height % 2 != 0 {
        return Err(BridgeError::InvalidGeometry(format!(
            "宽高必须为偶数: {width}x{height}"
        )));
    }
    check_frame_bytes(width, height)
}

/// 四舍五入到偶数, 最小为 2
pub fn round_even(value: f64) -> u32 {
    let even = (value / 2.0).round() * 2.0;
    if even.is_finite() && even >= 2.0 {
        even.min(f64::from(u32::MAX - 1)) as u32
    } else {
        2
    }
}

/// 协商解码输出尺寸
///
/// 请求值为 0 表示不限制. 只给一边时按源宽高比推算另一边,
/// 两边都为 0 时使用源尺寸. 结果都对齐到偶数, 单帧过大时返回
/// [`BridgeError::InvalidGeometry`].
pub fn resolve_output_geometry(
    src_width: u32,
    src_height: u32,
    requested_width: u32,
    requested_height: u32,
) -> BridgeResult<(u32, u32)> {
    if src_width == 0 || src_height == 0 {
        return Err(BridgeError::InvalidGeometry(format!(
            "源尺寸无效: {src_width}x{src_height}"
        )));
    }
    let (sw, sh) = (f64::from(src_width), f64::from(src_height));
    let (w, h) = match (requested_width, requested_height) {
        (0, 0) => (sw, sh),
        (w, 0) => {
            let w = f64::from(w);
            (w, w * sh / sw)
        }
        (0, h) => {
            let h = f64::from(h);
            (h * sw / sh, h)
        }
        (w, h) => (f64::from(w), f64::from(h)),
    };
    let (w, h) = (round_even(w), round_even(h));
    check_frame_bytes(w, h)?;
    Ok((w, h))
}
