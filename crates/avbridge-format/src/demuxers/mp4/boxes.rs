//! Box 头部与 ftyp 解析.
//!
//! ```text
//! size:       4 字节 (大端, 含头部)
//! type:       4 字节 FourCC
//! [largesize] 8 字节 (仅当 size == 1)
//! ```
//! size 为 0 表示 box 延伸到父容器末尾.

use std::io::SeekFrom;

use avbridge_core::{AvError, AvResult};

use crate::io::IoContext;

/// 已解析的 box 头部
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct BoxHeader {
    pub fourcc: [u8; 4],
    /// box 起始偏移 (头部第一个字节)
    pub start: u64,
    /// 内容起始偏移
    pub body: u64,
    /// box 结束偏移 (不含)
    pub end: u64,
}

impl BoxHeader {
    /// 在 `[当前位置, limit)` 内读取一个 box 头部
    pub fn read(io: &mut IoContext, limit: u64) -> AvResult<Self> {
        let start = io.position()?;
        let size32 = io.read_u32_be()?;
        let fourcc = io.read_tag()?;
        let (size, header_size) = match size32 {
            0 => (limit.saturating_sub(start), 8),
            1 => (io.read_u64_be()?, 16),
            n => (u64::from(n), 8),
        };
        if size < header_size {
            return Err(AvError::InvalidData(format!(
                "MP4: box '{}' 大小 {size} 小于头部",
                fourcc_str(&fourcc)
            )));
        }
        let end = start
            .checked_add(size)
            .filter(|&end| end <= limit)
            .ok_or_else(|| {
                AvError::InvalidData(format!(
                    "MP4: box '{}' @{start} 越过父容器末尾 {limit}",
                    fourcc_str(&fourcc)
                ))
            })?;
        Ok(Self {
            fourcc,
            start,
            body: start + header_size,
            end,
        })
    }

    pub fn content_size(&self) -> u64 {
        self.end - self.body
    }

    /// 定位到 box 末尾
    pub fn skip_to_end(&self, io: &mut IoContext) -> AvResult<()> {
        io.seek(SeekFrom::Start(self.end))?;
        Ok(())
    }
}

/// 读取 full box 的 version 与 flags
pub(super) fn read_version_flags(io: &mut IoContext) -> AvResult<(u8, u32)> {
    let word = io.read_u32_be()?;
    Ok(((word >> 24) as u8, word & 0x00FF_FFFF))
}

/// 可读的 FourCC, 非 ASCII 字节替换为 '?'
pub(super) fn fourcc_str(fourcc: &[u8; 4]) -> String {
    fourcc
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect()
}

/// ftyp 内容, 只关心主品牌
#[derive(Debug, Clone)]
pub(super) struct FileType {
    pub major_brand: [u8; 4],
}

impl FileType {
    /// 从 ftyp 内容字节解析, 不足 8 字节 (主品牌加次版本号) 返回 `None`
    pub fn parse(content: &[u8]) -> Option<Self> {
        content.get(4..8)?;
        let major_brand: [u8; 4] = content.get(0..4)?.try_into().ok()?;
        Some(Self { major_brand })
    }

    /// 是否为 QuickTime 文件
    pub fn is_quicktime(&self) -> bool {
        &self.major_brand == b"qt  "
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_of(data: Vec<u8>) -> IoContext {
        IoContext::memory(data)
    }

    #[test]
    fn test_普通头部() {
        let mut data = Vec::new();
        data.extend_from_slice(&20u32.to_be_bytes());
        data.extend_from_slice(b"ftyp");
        data.extend_from_slice(&[0; 12]);
        let mut io = io_of(data);
        let h = BoxHeader::read(&mut io, 20).unwrap();
        assert_eq!(&h.fourcc, b"ftyp");
        assert_eq!((h.start, h.body, h.end), (0, 8, 20));
        assert_eq!(h.content_size(), 12);
    }

    #[test]
    fn test_64位大小() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&40u64.to_be_bytes());
        data.extend_from_slice(&[0; 24]);
        let mut io = io_of(data);
        let h = BoxHeader::read(&mut io, 40).unwrap();
        assert_eq!(h.body, 16);
        assert_eq!(h.content_size(), 24);
    }

    #[test]
    fn test_大小为零延伸到末尾() {
        let mut data = Vec::new();
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(b"mdat");
        data.extend_from_slice(&[0; 100]);
        let mut io = io_of(data);
        let h = BoxHeader::read(&mut io, 108).unwrap();
        assert_eq!(h.end, 108);
    }

    #[test]
    fn test_越界与过小() {
        let mut data = Vec::new();
        data.extend_from_slice(&64u32.to_be_bytes());
        data.extend_from_slice(b"moov");
        let mut io = io_of(data.clone());
        assert!(matches!(
            BoxHeader::read(&mut io, 8),
            Err(AvError::InvalidData(_))
        ));

        data[0..4].copy_from_slice(&4u32.to_be_bytes());
        let mut io = io_of(data);
        assert!(BoxHeader::read(&mut io, 8).is_err());
    }

    #[test]
    fn test_ftyp_品牌() {
        let ftyp = FileType::parse(b"qt  \x00\x00\x02\x00qt  ").unwrap();
        assert!(ftyp.is_quicktime());
        assert!(!FileType::parse(b"isom\x00\x00\x02\x00qt  ").unwrap().is_quicktime());
        assert!(FileType::parse(b"isom").is_none());
        assert_eq!(fourcc_str(b"a\x01bc"), "a?bc");
    }
}
