//! 缓冲 I/O 上下文.
//!
//! [`IoContext`] 在可替换的 [`IoBackend`] 之上提供大端整数读写、
//! 跳过与定位. 读取经过 32 KB 缓冲; 写入直接落到后端.
//! 任何 `seek` 都会丢弃读缓冲.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use avbridge_core::{AvError, AvResult};

/// I/O 后端
pub trait IoBackend: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;
    fn position(&mut self) -> io::Result<u64>;
    /// 当前总大小, 未知时为 `None`
    fn size(&self) -> Option<u64>;
    fn is_seekable(&self) -> bool;
    /// 将已写入的数据落盘
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

const READ_BUFFER_SIZE: usize = 32 * 1024;

/// I/O 上下文
pub struct IoContext {
    backend: Box<dyn IoBackend>,
    buffer: Vec<u8>,
    /// 缓冲中有效数据的末尾
    filled: usize,
    /// 缓冲中下一个待读字节
    cursor: usize,
}

impl IoContext {
    pub fn new(backend: Box<dyn IoBackend>) -> Self {
        Self {
            backend,
            buffer: vec![0u8; READ_BUFFER_SIZE],
            filled: 0,
            cursor: 0,
        }
    }

    /// 只读打开文件
    pub fn open_read(path: impl AsRef<Path>) -> AvResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(Box::new(FileBackend::new(file))))
    }

    /// 创建 (截断) 文件用于写入
    pub fn open_write(path: impl AsRef<Path>) -> AvResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(FileBackend::new(file))))
    }

    /// 以内存缓冲为后端
    pub fn memory(data: Vec<u8>) -> Self {
        Self::new(Box::new(MemoryBackend::from_data(data)))
    }

    fn buffered(&self) -> usize {
        self.filled - self.cursor
    }

    // ---- 读取 ----

    /// 精确读满 `buf`, 数据不足时返回 [`AvError::Eof`]
    pub fn read_exact(&mut self, buf: &mut [u8]) -> AvResult<()> {
        let mut done = 0;
        while done < buf.len() {
            if self.buffered() == 0 {
                self.cursor = 0;
                self.filled = self.backend.read(&mut self.buffer)?;
                if self.filled == 0 {
                    return Err(AvError::Eof);
                }
            }
            let n = self.buffered().min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&self.buffer[self.cursor..self.cursor + n]);
            self.cursor += n;
            done += n;
        }
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> AvResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> AvResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16_be(&mut self) -> AvResult<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32_be(&mut self) -> AvResult<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64_be(&mut self) -> AvResult<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16_be(&mut self) -> AvResult<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32_be(&mut self) -> AvResult<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    /// 读取 FourCC
    pub fn read_tag(&mut self) -> AvResult<[u8; 4]> {
        self.read_array()
    }

    pub fn read_bytes(&mut self, count: usize) -> AvResult<Vec<u8>> {
        let mut buf = vec![0u8; count];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// 向前跳过 `count` 字节
    pub fn skip(&mut self, count: u64) -> AvResult<()> {
        let buffered = self.buffered() as u64;
        if count <= buffered {
            self.cursor += count as usize;
            return Ok(());
        }
        let target = self.position()? + count;
        if self.backend.is_seekable() {
            self.seek(SeekFrom::Start(target))?;
            return Ok(());
        }
        let mut left = count - buffered;
        self.cursor = self.filled;
        while left > 0 {
            let chunk = left.min(self.buffer.len() as u64) as usize;
            let n = self.backend.read(&mut self.buffer[..chunk])?;
            if n == 0 {
                return Err(AvError::Eof);
            }
            left -= n as u64;
        }
        self.cursor = 0;
        self.filled = 0;
        Ok(())
    }

    // ---- 写入 ----

    pub fn write_all(&mut self, buf: &[u8]) -> AvResult<()> {
        self.backend.write_all(buf)?;
        Ok(())
    }

    pub fn write_u8(&mut self, v: u8) -> AvResult<()> {
        self.write_all(&[v])
    }

    pub fn write_u16_be(&mut self, v: u16) -> AvResult<()> {
        self.write_all(&v.to_be_bytes())
    }

    pub fn write_u32_be(&mut self, v: u32) -> AvResult<()> {
        self.write_all(&v.to_be_bytes())
    }

    pub fn write_u64_be(&mut self, v: u64) -> AvResult<()> {
        self.write_all(&v.to_be_bytes())
    }

    pub fn write_tag(&mut self, tag: &[u8; 4]) -> AvResult<()> {
        self.write_all(tag)
    }

    /// 将后端缓冲落盘
    pub fn flush(&mut self) -> AvResult<()> {
        self.backend.flush()?;
        Ok(())
    }

    // ---- 定位 ----

    /// 定位, 丢弃读缓冲
    pub fn seek(&mut self, pos: SeekFrom) -> AvResult<u64> {
        let pos = match pos {
            // 相对定位需扣除尚未消费的缓冲
            SeekFrom::Current(delta) => {
                SeekFrom::Current(delta - self.buffered() as i64)
            }
            other => other,
        };
        self.cursor = 0;
        self.filled = 0;
        Ok(self.backend.seek(pos)?)
    }

    /// 逻辑读写位置 (已扣除未消费的读缓冲)
    pub fn position(&mut self) -> AvResult<u64> {
        Ok(self.backend.position()? - self.buffered() as u64)
    }

    pub fn is_seekable(&self) -> bool {
        self.backend.is_seekable()
    }

    pub fn size(&self) -> Option<u64> {
        self.backend.size()
    }
}

/// 文件后端
struct FileBackend {
    file: File,
}

impl FileBackend {
    fn new(file: File) -> Self {
        Self { file }
    }
}

impl IoBackend for FileBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }

    fn position(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    fn size(&self) -> Option<u64> {
        self.file.metadata().ok().map(|m| m.len())
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_data()
    }
}

/// 内存后端, 写入越过末尾时自动扩展
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Vec<u8>,
    pos: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl IoBackend for MemoryBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rest = self.data.get(self.pos..).unwrap_or(&[]);
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let end = self.pos + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(buf);
        self.pos = end;
        Ok(())
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => i128::from(p),
            SeekFrom::End(d) => self.data.len() as i128 + i128::from(d),
            SeekFrom::Current(d) => self.pos as i128 + i128::from(d),
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek 位置不能为负",
            ));
        }
        self.pos = target as usize;
        Ok(self.pos as u64)
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos as u64)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_大端读取() {
        let mut io = IoContext::memory(vec![
            0x12, 0x34, 0x00, 0x00, 0x01, 0x00, b'f', b't', b'y', b'p', 0xFF, 0xFE,
        ]);
        assert_eq!(io.read_u16_be().unwrap(), 0x1234);
        assert_eq!(io.read_u32_be().unwrap(), 0x100);
        assert_eq!(&io.read_tag().unwrap(), b"ftyp");
        assert_eq!(io.read_i16_be().unwrap(), -2);
        assert!(matches!(io.read_u8(), Err(AvError::Eof)));
    }

    #[test]
    fn test_位置扣除读缓冲() {
        let mut io = IoContext::memory((0u8..100).collect());
        io.read_bytes(10).unwrap();
        assert_eq!(io.position().unwrap(), 10);
        io.skip(5).unwrap();
        assert_eq!(io.position().unwrap(), 15);
        assert_eq!(io.read_u8().unwrap(), 15);
        io.seek(SeekFrom::Current(-6)).unwrap();
        assert_eq!(io.read_u8().unwrap(), 10);
    }

    #[test]
    fn test_回写覆盖() {
        let mut io = IoContext::memory(Vec::new());
        io.write_u32_be(0).unwrap();
        io.write_tag(b"mdat").unwrap();
        io.write_all(&[1, 2, 3]).unwrap();
        io.seek(SeekFrom::Start(0)).unwrap();
        io.write_u32_be(11).unwrap();
        assert_eq!(io.size(), Some(11));
        io.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(io.read_u32_be().unwrap(), 11);
        assert_eq!(io.read_bytes(7).unwrap(), b"mdat\x01\x02\x03");
    }

    #[test]
    fn test_文件读写() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("io.bin");
        let mut out = IoContext::open_write(&path).unwrap();
        out.write_u64_be(0x0102_0304_0506_0708).unwrap();
        out.flush().unwrap();
        drop(out);

        let mut input = IoContext::open_read(&path).unwrap();
        assert_eq!(input.size(), Some(8));
        assert_eq!(input.read_u64_be().unwrap(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_打开不存在的文件() {
        assert!(matches!(
            IoContext::open_read("/no/such/dir/input.mp4"),
            Err(AvError::Io(_))
        ));
    }
}
