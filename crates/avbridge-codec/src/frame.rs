//! 原始视频帧.

use avbridge_core::timestamp::NOPTS_VALUE;
use avbridge_core::{AvError, AvResult, PixelFormat, Rational};

/// 原始视频帧
///
/// 按平面存储像素, 例如 YUV420P 有 Y/U/V 三个平面, packed 格式只有一个.
/// `linesize[i]` 可以大于平面可见宽度 (行尾填充).
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// 各平面像素数据
    pub data: Vec<Vec<u8>>,
    /// 各平面每行字节数
    pub linesize: Vec<usize>,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    /// 显示时间戳
    pub pts: i64,
    pub time_base: Rational,
    /// 帧时长 (time_base 单位)
    pub duration: i64,
    pub is_keyframe: bool,
}

impl VideoFrame {
    /// 创建不含像素数据的空帧
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let planes = pixel_format.plane_count() as usize;
        Self {
            data: vec![Vec::new(); planes],
            linesize: vec![0; planes],
            width,
            height,
            pixel_format,
            pts: NOPTS_VALUE,
            time_base: Rational::UNDEFINED,
            duration: 0,
            is_keyframe: false,
        }
    }

    /// 创建紧凑排列 (无行尾填充)、像素清零的帧
    pub fn alloc(width: u32, height: u32, pixel_format: PixelFormat) -> AvResult<Self> {
        if width == 0 || height == 0 || pixel_format == PixelFormat::None {
            return Err(AvError::InvalidArgument(format!(
                "无法分配 {width}x{height} {pixel_format} 帧"
            )));
        }
        let mut frame = Self::new(width, height, pixel_format);
        for plane in 0..frame.data.len() {
            let (stride, rows) = plane_geometry(pixel_format, plane, width, height)?;
            frame.linesize[plane] = stride;
            frame.data[plane] = vec![0u8; stride * rows];
        }
        Ok(frame)
    }

    /// 紧凑排列时的整帧字节数
    pub fn packed_size(&self) -> usize {
        self.pixel_format.frame_size(self.width, self.height).unwrap_or(0)
    }

    /// 按平面顺序把可见像素紧凑写入 `out`, 去掉行尾填充
    pub fn write_packed(&self, out: &mut Vec<u8>) -> AvResult<()> {
        for (plane, data) in self.data.iter().enumerate() {
            let (row_bytes, rows) =
                plane_geometry(self.pixel_format, plane, self.width, self.height)?;
            let stride = self.linesize.get(plane).copied().unwrap_or(0);
            if stride < row_bytes || data.len() < stride * rows.saturating_sub(1) + row_bytes {
                return Err(AvError::InvalidData(format!(
                    "平面 {plane} 数据不足: stride={stride}, len={}",
                    data.len()
                )));
            }
            for row in 0..rows {
                let start = row * stride;
                out.extend_from_slice(&data[start..start + row_bytes]);
            }
        }
        Ok(())
    }

    /// 从紧凑排列的字节序列拆分出各平面
    pub fn read_packed(&mut self, src: &[u8]) -> AvResult<()> {
        let expected = self.packed_size();
        if src.len() != expected {
            return Err(AvError::InvalidData(format!(
                "数据大小 {} 与帧大小 {expected} 不匹配",
                src.len()
            )));
        }
        let mut offset = 0;
        for plane in 0..self.data.len() {
            let (stride, rows) =
                plane_geometry(self.pixel_format, plane, self.width, self.height)?;
            let size = stride * rows;
            self.data[plane] = src[offset..offset + size].to_vec();
            self.linesize[plane] = stride;
            offset += size;
        }
        Ok(())
    }
}

/// 平面紧凑行宽与行数
fn plane_geometry(
    format: PixelFormat,
    plane: usize,
    width: u32,
    height: u32,
) -> AvResult<(usize, usize)> {
    match (
        format.plane_linesize(plane, width),
        format.plane_height(plane, height),
    ) {
        (Some(stride), Some(rows)) => Ok((stride, rows)),
        _ => Err(AvError::InvalidArgument(format!(
            "{format} 没有平面 {plane}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_分配_yuv420p() {
        let f = VideoFrame::alloc(6, 4, PixelFormat::Yuv420p).unwrap();
        assert_eq!(f.linesize, vec![6, 3, 3]);
        assert_eq!(f.data[0].len(), 24);
        assert_eq!(f.data[1].len(), 6);
        assert_eq!(f.packed_size(), 36);
    }

    #[test]
    fn test_零尺寸分配失败() {
        assert!(VideoFrame::alloc(0, 4, PixelFormat::Rgb24).is_err());
        assert!(VideoFrame::alloc(4, 4, PixelFormat::None).is_err());
    }

    #[test]
    fn test_写出时去掉行尾填充() {
        let mut f = VideoFrame::new(2, 2, PixelFormat::Gray8);
        f.linesize[0] = 4;
        f.data[0] = vec![1, 2, 0xEE, 0xEE, 3, 4, 0xEE, 0xEE];
        let mut out = Vec::new();
        f.write_packed(&mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_紧凑数据拆分平面() {
        let mut f = VideoFrame::new(2, 2, PixelFormat::Yuv420p);
        f.read_packed(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(f.data, vec![vec![1, 2, 3, 4], vec![5], vec![6]]);
        assert!(f.read_packed(&[0; 5]).is_err());
    }

    #[test]
    fn test_平面数据不足() {
        let mut f = VideoFrame::new(2, 2, PixelFormat::Rgb24);
        f.linesize[0] = 6;
        f.data[0] = vec![0; 7];
        assert!(matches!(
            f.write_packed(&mut Vec::new()),
            Err(AvError::InvalidData(_))
        ));
    }
}
