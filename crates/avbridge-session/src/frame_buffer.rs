//! 调用方持有的帧缓冲.
//!
//! 帧缓冲只是一段连续字节加上几何描述, 会话从不改变它的长度:
//! 编码路径只读, 解码路径只写.

use avbridge_core::{PixelFormat, PixelFormatDescriptor, pixel_registry};

use crate::error::{BridgeError, BridgeResult};

/// 帧缓冲
///
/// `B` 可以是 `Vec<u8>`、`&[u8]` 或 `&mut [u8]`, 所有权始终在调用方.
/// 只接受 packed 格式, 行跨度为 `width × 每像素字节数`, 没有行尾填充.
#[derive(Debug, Clone)]
pub struct FrameBuffer<B> {
    data: B,
    width: u32,
    height: u32,
    descriptor: PixelFormatDescriptor,
}

impl<B: AsRef<[u8]>> FrameBuffer<B> {
    /// 包装一段字节, 校验长度等于 `height × width × bpp`
    pub fn new(data: B, width: u32, height: u32, pixel_format: PixelFormat) -> BridgeResult<Self> {
        let descriptor = pixel_registry::describe(pixel_format).ok_or_else(|| {
            BridgeError::UnsupportedFormat(format!("{pixel_format} 不能用于帧缓冲"))
        })?;
        Self::with_descriptor(data, width, height, descriptor)
    }

    /// 按像素格式名称包装
    pub fn from_format_name(data: B, width: u32, height: u32, name: &str) -> BridgeResult<Self> {
        let descriptor = pixel_registry::resolve(name)
            .map_err(|e| BridgeError::UnsupportedFormat(e.to_string()))?;
        Self::with_descriptor(data, width, height, descriptor)
    }

    fn with_descriptor(
        data: B,
        width: u32,
        height: u32,
        descriptor: PixelFormatDescriptor,
    ) -> BridgeResult<Self> {
        if !descriptor.is_packed() {
            return Err(BridgeError::UnsupportedFormat(format!(
                "{} 不是 packed 格式",
                descriptor.ffmpeg_name
            )));
        }
        let expected = expected_len(width, height, &descriptor);
        let actual = data.as_ref().len();
        if actual != expected {
            return Err(BridgeError::BufferSizeMismatch(format!(
                "{width}x{height} {} 需要 {expected} 字节, 实际 {actual}",
                descriptor.format
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            descriptor,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.descriptor.format
    }

    pub fn descriptor(&self) -> &PixelFormatDescriptor {
        &self.descriptor
    }

    /// 每行字节数
    pub fn stride(&self) -> usize {
        self.descriptor.stride(self.width)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn into_inner(self) -> B {
        self.data
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> FrameBuffer<B> {
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }
}

impl FrameBuffer<Vec<u8>> {
    /// 分配清零的缓冲
    pub fn alloc(width: u32, height: u32, pixel_format: PixelFormat) -> BridgeResult<Self> {
        let descriptor = pixel_registry::describe(pixel_format).ok_or_else(|| {
            BridgeError::UnsupportedFormat(format!("{pixel_format} 不能用于帧缓冲"))
        })?;
        let len = expected_len(width, height, &descriptor);
        Self::with_descriptor(vec![0u8; len], width, height, descriptor)
    }
}

/// 按 `u64` 计算后截断, 避免 32 位平台上乘法溢出
fn expected_len(width: u32, height: u32, descriptor: &PixelFormatDescriptor) -> usize {
    let len = u64::from(height) * u64::from(width) * u64::from(descriptor.bytes_per_pixel());
    usize::try_from(len).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_长度校验() {
        let fb = FrameBuffer::new(vec![0u8; 4 * 2 * 3], 4, 2, PixelFormat::Rgb24).unwrap();
        assert_eq!(fb.stride(), 12);
        assert_eq!(fb.descriptor().channels, 3);

        let err = FrameBuffer::new(vec![0u8; 23], 4, 2, PixelFormat::Rgb24).unwrap_err();
        assert!(matches!(err, BridgeError::BufferSizeMismatch(_)));
        let err = FrameBuffer::new(vec![0u8; 25], 4, 2, PixelFormat::Rgb24).unwrap_err();
        assert!(matches!(err, BridgeError::BufferSizeMismatch(_)));
    }

    #[test]
    fn test_按名称构造() {
        let data = [0u8; 2 * 2 * 4];
        let fb = FrameBuffer::from_format_name(&data[..], 2, 2, "AV_PIX_FMT_BGRA").unwrap();
        assert_eq!(fb.pixel_format(), PixelFormat::Bgra);
        assert!(matches!(
            FrameBuffer::from_format_name(&data[..], 2, 2, "AV_PIX_FMT_NV12"),
            Err(BridgeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_拒绝非_packed_格式() {
        let err = FrameBuffer::from_format_name(vec![0u8; 6], 2, 2, "yuv420p").unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedFormat(_)));
        let err = FrameBuffer::new(vec![], 0, 0, PixelFormat::None).unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_可变借用写入() {
        let mut storage = vec![0u8; 2 * 2];
        {
            let mut fb = FrameBuffer::new(&mut storage[..], 2, 2, PixelFormat::Gray8).unwrap();
            fb.as_bytes_mut().fill(7);
        }
        assert_eq!(storage, vec![7; 4]);
    }

    #[test]
    fn test_分配() {
        let fb = FrameBuffer::alloc(100, 100, PixelFormat::Rgb24).unwrap();
        assert_eq!(fb.as_bytes().len(), 30_000);
        assert_eq!(fb.into_inner().len(), 30_000);
    }
}
