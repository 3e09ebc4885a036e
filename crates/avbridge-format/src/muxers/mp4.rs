//! MP4/MOV 封装器.
//!
//! 布局为 "mdat 在前, moov 在后":
//! 1. `write_header()` 写 ftyp、8 字节 free 占位与 mdat 头
//! 2. `write_packet()` 追加样本数据到 mdat, 记录样本元数据
//! 3. `write_trailer()` 回填 mdat 大小, 写出 moov
//!
//! mdat 超过 4 GiB 时, free 占位与 mdat 头合并为 16 字节的 64 位 mdat 头,
//! 样本偏移不变.
//!
//! ```text
//! ftyp
//! free (占位)
//! mdat
//! moov
//! ├── mvhd
//! └── trak (每个流一个)
//!     ├── tkhd
//!     └── mdia
//!         ├── mdhd
//!         ├── hdlr
//!         └── minf
//!             ├── vmhd / smhd
//!             ├── dinf → dref → url
//!             └── stbl
//!                 ├── stsd (I420 / raw  / Y800 / sowt)
//!                 ├── stts
//!                 ├── stsc
//!                 ├── stsz
//!                 ├── stco / co64
//!                 ├── stss (仅视频)
//!                 └── ctts (仅当存在非零合成偏移)
//! ```

use std::io::SeekFrom;

use log::debug;

use avbridge_codec::{CodecId, Packet};
use avbridge_core::rational::rescale;
use avbridge_core::timestamp::NOPTS_VALUE;
use avbridge_core::{AvError, AvResult, MediaType, PixelFormat, Rational};

use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::muxer::Muxer;
use crate::stream::{Stream, StreamParams};

/// moov/tkhd 使用的影片时间刻度 (毫秒)
const MOVIE_TIMESCALE: u32 = 1000;

/// 3x3 单位矩阵 (16.16 / 2.30 定点)
const UNITY_MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

/// 文件品牌
struct Brand {
    major: [u8; 4],
    minor: u32,
    compatible: &'static [[u8; 4]],
}

const MP4_BRAND: Brand = Brand {
    major: *b"isom",
    minor: 0x200,
    compatible: &[*b"isom", *b"iso2", *b"mp41"],
};

const MOV_BRAND: Brand = Brand {
    major: *b"qt  ",
    minor: 0,
    compatible: &[*b"qt  "],
};

/// 一个样本的元数据 (时间单位为轨道 timescale 的 tick)
#[derive(Debug, Clone)]
struct SampleEntry {
    offset: u64,
    size: u32,
    dts: i64,
    /// 数据包自带时长, 仅用于最后一个样本
    duration: i64,
    cts_offset: i32,
    is_keyframe: bool,
}

/// 单条轨道的收集状态
struct TrackCollector {
    stream: Stream,
    /// 轨道时间刻度 = 流时间基分母
    timescale: u32,
    /// 流时间基的分子, 时间戳 × tick = 轨道刻度
    tick: i64,
    sample_entry: Vec<u8>,
    samples: Vec<SampleEntry>,
}

impl TrackCollector {
    fn new(stream: &Stream) -> AvResult<Self> {
        let tb = stream.time_base;
        if !tb.is_positive() {
            return Err(AvError::InvalidArgument(format!(
                "MP4: 流 #{} 时间基 {tb} 无效",
                stream.index
            )));
        }
        Ok(Self {
            stream: stream.clone(),
            timescale: tb.den as u32,
            tick: i64::from(tb.num),
            sample_entry: build_sample_entry(stream)?,
            samples: Vec::new(),
        })
    }

    /// 各样本时长: 相邻 DTS 之差, 最后一个取数据包时长
    fn durations(&self) -> Vec<u32> {
        let n = self.samples.len();
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let d = match self.samples.get(i + 1) {
                Some(next) => next.dts - self.samples[i].dts,
                None if self.samples[i].duration > 0 => self.samples[i].duration,
                None => out.last().map_or(self.tick, |&d: &u32| i64::from(d)),
            };
            out.push(d.clamp(0, i64::from(u32::MAX)) as u32);
        }
        out
    }

    fn media_duration(&self) -> u64 {
        self.durations().iter().map(|&d| u64::from(d)).sum()
    }

    fn movie_duration(&self) -> u64 {
        let ticks = i64::try_from(self.media_duration()).unwrap_or(i64::MAX);
        rescale(
            ticks,
            Rational::new(1, self.timescale as i32),
            Rational::new(1, MOVIE_TIMESCALE as i32),
        )
        .max(0) as u64
    }
}

/// MP4/MOV 封装器
pub struct Mp4Muxer {
    format_id: FormatId,
    brand: &'static Brand,
    tracks: Vec<TrackCollector>,
    /// free 占位 box 的位置
    placeholder_pos: u64,
    /// mdat 头的位置
    mdat_pos: u64,
    finished: bool,
}

impl Mp4Muxer {
    /// MP4 封装器 (工厂函数)
    pub fn create() -> AvResult<Box<dyn Muxer>> {
        Ok(Box::new(Self::with_brand(FormatId::Mp4, &MP4_BRAND)))
    }

    /// QuickTime 封装器 (工厂函数)
    pub fn create_mov() -> AvResult<Box<dyn Muxer>> {
        Ok(Box::new(Self::with_brand(FormatId::Mov, &MOV_BRAND)))
    }

    fn with_brand(format_id: FormatId, brand: &'static Brand) -> Self {
        Self {
            format_id,
            brand,
            tracks: Vec::new(),
            placeholder_pos: 0,
            mdat_pos: 0,
            finished: false,
        }
    }
}

impl Muxer for Mp4Muxer {
    fn format_id(&self) -> FormatId {
        self.format_id
    }

    fn name(&self) -> &str {
        self.format_id.name()
    }

    fn write_header(&mut self, io: &mut IoContext, streams: &[Stream]) -> AvResult<()> {
        if streams.is_empty() {
            return Err(AvError::InvalidArgument("MP4: 至少需要一个流".into()));
        }
        if !io.is_seekable() {
            return Err(AvError::Unsupported("MP4: 输出必须支持随机访问".into()));
        }
        self.tracks = streams
            .iter()
            .map(TrackCollector::new)
            .collect::<AvResult<_>>()?;

        let mut head = Vec::new();
        write_ftyp(&mut head, self.brand);
        io.write_all(&head)?;

        self.placeholder_pos = io.position()?;
        io.write_u32_be(8)?;
        io.write_tag(b"free")?;
        self.mdat_pos = io.position()?;
        io.write_u32_be(0)?;
        io.write_tag(b"mdat")?;

        debug!(
            "{}: 写入 ftyp + mdat 头, {} 个轨道",
            self.format_id,
            self.tracks.len()
        );
        Ok(())
    }

    fn write_packet(&mut self, io: &mut IoContext, packet: &Packet) -> AvResult<()> {
        if self.finished {
            return Err(AvError::InvalidArgument("MP4: 封装已结束".into()));
        }
        let track = self
            .tracks
            .iter_mut()
            .find(|t| t.stream.index == packet.stream_index)
            .ok_or(AvError::StreamNotFound(packet.stream_index))?;

        let size = u32::try_from(packet.size())
            .map_err(|_| AvError::InvalidArgument("MP4: 样本超过 4 GiB".into()))?;

        let dts = match (packet.dts, packet.pts) {
            (NOPTS_VALUE, NOPTS_VALUE) => track
                .samples
                .last()
                .map_or(0, |s| s.dts + s.duration.max(track.tick)),
            (NOPTS_VALUE, pts) => pts * track.tick,
            (dts, _) => dts * track.tick,
        };
        let pts = if packet.pts == NOPTS_VALUE {
            dts
        } else {
            packet.pts * track.tick
        };
        let last_dts = track.samples.last().map_or(i64::MIN, |s| s.dts);
        if dts < last_dts {
            return Err(AvError::InvalidArgument(format!(
                "MP4: 流 #{} DTS 非单调 ({dts} < {last_dts})",
                packet.stream_index
            )));
        }

        let offset = io.position()?;
        io.write_all(&packet.data)?;

        track.samples.push(SampleEntry {
            offset,
            size,
            dts,
            duration: packet.duration * track.tick,
            cts_offset: i32::try_from(pts - dts).unwrap_or(0),
            is_keyframe: packet.is_keyframe,
        });
        Ok(())
    }

    fn write_trailer(&mut self, io: &mut IoContext) -> AvResult<()> {
        if self.finished {
            return Err(AvError::InvalidArgument("MP4: 重复写入尾部".into()));
        }
        self.finished = true;

        let end = io.position()?;
        match mdat_header(end - self.mdat_pos) {
            MdatHeader::Compact(size) => {
                io.seek(SeekFrom::Start(self.mdat_pos))?;
                io.write_u32_be(size)?;
            }
            MdatHeader::Large => {
                io.seek(SeekFrom::Start(self.placeholder_pos))?;
                io.write_u32_be(1)?;
                io.write_tag(b"mdat")?;
                io.write_u64_be(end - self.placeholder_pos)?;
            }
        }
        io.seek(SeekFrom::Start(end))?;

        let moov = build_moov(&self.tracks)?;
        io.write_all(&moov)?;

        debug!(
            "{}: 写入 moov ({} 字节), 样本数 {:?}",
            self.format_id,
            moov.len(),
            self.tracks.iter().map(|t| t.samples.len()).collect::<Vec<_>>()
        );
        Ok(())
    }
}

/// mdat 头的回填方式
#[derive(Debug, PartialEq, Eq)]
enum MdatHeader {
    /// 32 位大小字段
    Compact(u32),
    /// 需要占用 free 占位写 64 位大小
    Large,
}

fn mdat_header(size: u64) -> MdatHeader {
    match u32::try_from(size) {
        Ok(s) => MdatHeader::Compact(s),
        Err(_) => MdatHeader::Large,
    }
}

// ============================================================
// box 构建
// ============================================================

/// 写一个 box: 先占位大小, `body` 写完内容后回填
fn write_box(
    buf: &mut Vec<u8>,
    fourcc: &[u8; 4],
    body: impl FnOnce(&mut Vec<u8>) -> AvResult<()>,
) -> AvResult<()> {
    let start = buf.len();
    buf.extend_from_slice(&[0; 4]);
    buf.extend_from_slice(fourcc);
    body(buf)?;
    let size = u32::try_from(buf.len() - start)
        .map_err(|_| AvError::Internal(format!("MP4: box {fourcc:?} 超过 4 GiB")))?;
    buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
    Ok(())
}

/// 写一个 full box (带 version 与 flags)
fn write_full_box(
    buf: &mut Vec<u8>,
    fourcc: &[u8; 4],
    version: u8,
    flags: u32,
    body: impl FnOnce(&mut Vec<u8>) -> AvResult<()>,
) -> AvResult<()> {
    write_box(buf, fourcc, |b| {
        b.extend_from_slice(&((u32::from(version) << 24) | (flags & 0x00FF_FFFF)).to_be_bytes());
        body(b)
    })
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_matrix(buf: &mut Vec<u8>) {
    for v in UNITY_MATRIX {
        put_u32(buf, v);
    }
}

fn clamp_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

fn write_ftyp(buf: &mut Vec<u8>, brand: &Brand) {
    let size = 16 + 4 * brand.compatible.len() as u32;
    put_u32(buf, size);
    buf.extend_from_slice(b"ftyp");
    buf.extend_from_slice(&brand.major);
    put_u32(buf, brand.minor);
    for b in brand.compatible {
        buf.extend_from_slice(b);
    }
}

fn build_moov(tracks: &[TrackCollector]) -> AvResult<Vec<u8>> {
    let mut buf = Vec::new();
    write_box(&mut buf, b"moov", |b| {
        let duration = tracks.iter().map(TrackCollector::movie_duration).max().unwrap_or(0);
        write_mvhd(b, clamp_u32(duration), tracks.len() as u32 + 1)?;
        for (i, track) in tracks.iter().enumerate() {
            write_trak(b, track, i as u32 + 1)?;
        }
        Ok(())
    })?;
    Ok(buf)
}

fn write_mvhd(buf: &mut Vec<u8>, duration: u32, next_track_id: u32) -> AvResult<()> {
    write_full_box(buf, b"mvhd", 0, 0, |b| {
        b.extend_from_slice(&[0; 8]); // creation + modification
        put_u32(b, MOVIE_TIMESCALE);
        put_u32(b, duration);
        put_u32(b, 0x0001_0000); // rate 1.0
        put_u16(b, 0x0100); // volume 1.0
        b.extend_from_slice(&[0; 10]);
        put_matrix(b);
        b.extend_from_slice(&[0; 24]); // pre_defined
        put_u32(b, next_track_id);
        Ok(())
    })
}

fn write_trak(buf: &mut Vec<u8>, track: &TrackCollector, track_id: u32) -> AvResult<()> {
    write_box(buf, b"trak", |b| {
        write_tkhd(b, track, track_id)?;
        write_box(b, b"mdia", |b| {
            write_mdhd(b, track)?;
            write_hdlr(b, track.stream.media_type)?;
            write_minf(b, track)
        })
    })
}

fn write_tkhd(buf: &mut Vec<u8>, track: &TrackCollector, track_id: u32) -> AvResult<()> {
    let (width, height) = match &track.stream.params {
        StreamParams::Video(v) => (v.width, v.height),
        _ => (0, 0),
    };
    // flags: enabled | in_movie
    write_full_box(buf, b"tkhd", 0, 0x03, |b| {
        b.extend_from_slice(&[0; 8]);
        put_u32(b, track_id);
        put_u32(b, 0);
        put_u32(b, clamp_u32(track.movie_duration()));
        b.extend_from_slice(&[0; 8]);
        put_u32(b, 0); // layer + alternate_group
        put_u16(b, if track.stream.media_type == MediaType::Audio { 0x0100 } else { 0 });
        put_u16(b, 0);
        put_matrix(b);
        put_u32(b, width << 16);
        put_u32(b, height << 16);
        Ok(())
    })
}

fn write_mdhd(buf: &mut Vec<u8>, track: &TrackCollector) -> AvResult<()> {
    write_full_box(buf, b"mdhd", 0, 0, |b| {
        b.extend_from_slice(&[0; 8]);
        put_u32(b, track.timescale);
        put_u32(b, clamp_u32(track.media_duration()));
        put_u16(b, 0x55C4); // 'und'
        put_u16(b, 0);
        Ok(())
    })
}

fn write_hdlr(buf: &mut Vec<u8>, media_type: MediaType) -> AvResult<()> {
    let (handler, name): (&[u8; 4], &[u8]) = match media_type {
        MediaType::Video => (b"vide", b"VideoHandler\0"),
        MediaType::Audio => (b"soun", b"SoundHandler\0"),
        MediaType::Data => (b"meta", b"DataHandler\0"),
    };
    write_full_box(buf, b"hdlr", 0, 0, |b| {
        put_u32(b, 0);
        b.extend_from_slice(handler);
        b.extend_from_slice(&[0; 12]);
        b.extend_from_slice(name);
        Ok(())
    })
}

fn write_minf(buf: &mut Vec<u8>, track: &TrackCollector) -> AvResult<()> {
    write_box(buf, b"minf", |b| {
        match track.stream.media_type {
            MediaType::Video => write_full_box(b, b"vmhd", 0, 1, |b| {
                b.extend_from_slice(&[0; 8]); // graphicsmode + opcolor
                Ok(())
            })?,
            MediaType::Audio => write_full_box(b, b"smhd", 0, 0, |b| {
                put_u32(b, 0); // balance + reserved
                Ok(())
            })?,
            MediaType::Data => {}
        }
        write_box(b, b"dinf", |b| {
            write_full_box(b, b"dref", 0, 0, |b| {
                put_u32(b, 1);
                // flags=1: 数据在本文件内
                write_full_box(b, b"url ", 0, 1, |_| Ok(()))
            })
        })?;
        write_stbl(b, track)
    })
}

fn write_stbl(buf: &mut Vec<u8>, track: &TrackCollector) -> AvResult<()> {
    let samples = &track.samples;
    let durations = track.durations();
    write_box(buf, b"stbl", |b| {
        write_full_box(b, b"stsd", 0, 0, |b| {
            put_u32(b, 1);
            b.extend_from_slice(&track.sample_entry);
            Ok(())
        })?;

        let stts = run_lengths(durations.iter().copied());
        write_full_box(b, b"stts", 0, 0, |b| {
            put_u32(b, stts.len() as u32);
            for (count, delta) in &stts {
                put_u32(b, *count);
                put_u32(b, *delta);
            }
            Ok(())
        })?;

        // 每个样本单独一个 chunk
        write_full_box(b, b"stsc", 0, 0, |b| {
            if samples.is_empty() {
                put_u32(b, 0);
            } else {
                for v in [1, 1, 1, 1] {
                    put_u32(b, v);
                }
            }
            Ok(())
        })?;

        write_full_box(b, b"stsz", 0, 0, |b| {
            put_u32(b, 0);
            put_u32(b, samples.len() as u32);
            for s in samples {
                put_u32(b, s.size);
            }
            Ok(())
        })?;

        if samples.iter().any(|s| s.offset > u64::from(u32::MAX)) {
            write_full_box(b, b"co64", 0, 0, |b| {
                put_u32(b, samples.len() as u32);
                for s in samples {
                    b.extend_from_slice(&s.offset.to_be_bytes());
                }
                Ok(())
            })?;
        } else {
            write_full_box(b, b"stco", 0, 0, |b| {
                put_u32(b, samples.len() as u32);
                for s in samples {
                    put_u32(b, s.offset as u32);
                }
                Ok(())
            })?;
        }

        if track.stream.media_type == MediaType::Video {
            let sync: Vec<u32> = samples
                .iter()
                .enumerate()
                .filter(|(_, s)| s.is_keyframe)
                .map(|(i, _)| i as u32 + 1)
                .collect();
            write_full_box(b, b"stss", 0, 0, |b| {
                put_u32(b, sync.len() as u32);
                for n in &sync {
                    put_u32(b, *n);
                }
                Ok(())
            })?;
        }

        if samples.iter().any(|s| s.cts_offset != 0) {
            let ctts = run_lengths(samples.iter().map(|s| s.cts_offset));
            // version 1: 有符号偏移
            write_full_box(b, b"ctts", 1, 0, |b| {
                put_u32(b, ctts.len() as u32);
                for (count, offset) in &ctts {
                    put_u32(b, *count);
                    b.extend_from_slice(&offset.to_be_bytes());
                }
                Ok(())
            })?;
        }
        Ok(())
    })
}

/// 游程编码: 连续相同值合并为 (次数, 值)
fn run_lengths<T: PartialEq + Copy>(values: impl Iterator<Item = T>) -> Vec<(u32, T)> {
    let mut runs: Vec<(u32, T)> = Vec::new();
    for v in values {
        match runs.last_mut() {
            Some((count, last)) if *last == v => *count += 1,
            _ => runs.push((1, v)),
        }
    }
    runs
}

/// 未压缩视频的 FourCC 与位深
fn raw_video_fourcc(pixel_format: PixelFormat) -> AvResult<([u8; 4], u16)> {
    match pixel_format {
        PixelFormat::Yuv420p => Ok((*b"I420", 0x18)),
        PixelFormat::Rgb24 => Ok((*b"raw ", 0x18)),
        PixelFormat::Gray8 => Ok((*b"Y800", 0x08)),
        other => Err(AvError::Unsupported(format!(
            "MP4: 不支持 {other} 未压缩视频"
        ))),
    }
}

fn build_sample_entry(stream: &Stream) -> AvResult<Vec<u8>> {
    let mut buf = Vec::new();
    match (&stream.params, stream.codec_id) {
        (StreamParams::Video(v), CodecId::RawVideo) => {
            let (fourcc, depth) = raw_video_fourcc(v.pixel_format)?;
            let width = u16::try_from(v.width)
                .map_err(|_| AvError::Unsupported(format!("MP4: 宽度 {} 过大", v.width)))?;
            let height = u16::try_from(v.height)
                .map_err(|_| AvError::Unsupported(format!("MP4: 高度 {} 过大", v.height)))?;
            write_box(&mut buf, &fourcc, |b| {
                b.extend_from_slice(&[0; 6]);
                put_u16(b, 1); // data_reference_index
                b.extend_from_slice(&[0; 16]);
                put_u16(b, width);
                put_u16(b, height);
                put_u32(b, 0x0048_0000); // 72 dpi
                put_u32(b, 0x0048_0000);
                put_u32(b, 0);
                put_u16(b, 1); // frame_count
                b.extend_from_slice(&[0; 32]); // compressorname
                put_u16(b, depth);
                put_u16(b, 0xFFFF);
                Ok(())
            })?;
        }
        (StreamParams::Audio(a), CodecId::PcmS16le) => {
            write_box(&mut buf, b"sowt", |b| {
                b.extend_from_slice(&[0; 6]);
                put_u16(b, 1);
                b.extend_from_slice(&[0; 8]);
                put_u16(b, a.channels as u16);
                put_u16(b, a.bits_per_sample as u16);
                put_u32(b, 0);
                put_u32(b, a.sample_rate << 16);
                Ok(())
            })?;
        }
        (_, codec_id) => {
            return Err(AvError::Unsupported(format!(
                "MP4: 不支持流 #{} 的编解码器 {codec_id}",
                stream.index
            )));
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use avbridge_core::Rational;

    fn video_stream(pf: PixelFormat) -> Stream {
        Stream::video(0, CodecId::RawVideo, 4, 2, pf, Rational::from_fps(25))
    }

    fn packet(stream_index: usize, ts: i64, len: usize) -> Packet {
        let mut pkt = Packet::from_data(vec![0xAB; len]);
        pkt.stream_index = stream_index;
        pkt.pts = ts;
        pkt.dts = ts;
        pkt.duration = 1;
        pkt.is_keyframe = true;
        pkt
    }

    fn find(data: &[u8], tag: &[u8]) -> Option<usize> {
        data.windows(tag.len()).position(|w| w == tag)
    }

    #[test]
    fn test_ftyp_大小() {
        let mut buf = Vec::new();
        write_ftyp(&mut buf, &MP4_BRAND);
        assert_eq!(buf.len(), 28);
        assert_eq!(&buf[4..12], b"ftypisom");

        buf.clear();
        write_ftyp(&mut buf, &MOV_BRAND);
        assert_eq!(buf.len(), 20);
    }

    #[test]
    fn test_写入视频并回填_mdat() {
        let mut io = IoContext::memory(Vec::new());
        let mut muxer = Mp4Muxer::create().unwrap();
        muxer
            .write_header(&mut io, &[video_stream(PixelFormat::Yuv420p)])
            .unwrap();
        for i in 0..3 {
            muxer.write_packet(&mut io, &packet(0, i, 12)).unwrap();
        }
        muxer.write_trailer(&mut io).unwrap();

        let len = io.size().unwrap() as usize;
        io.seek(SeekFrom::Start(0)).unwrap();
        let data = io.read_bytes(len).unwrap();
        let mdat = find(&data, b"mdat").unwrap() - 4;
        let size = u32::from_be_bytes(data[mdat..mdat + 4].try_into().unwrap());
        assert_eq!(size, 8 + 36);
        assert!(find(&data, b"I420").is_some());
        assert!(find(&data, b"stss").is_some());
        assert!(find(&data, b"ctts").is_none());
    }

    #[test]
    fn test_零样本也生成完整_moov() {
        let mut io = IoContext::memory(Vec::new());
        let mut muxer = Mp4Muxer::create().unwrap();
        muxer
            .write_header(&mut io, &[video_stream(PixelFormat::Gray8)])
            .unwrap();
        muxer.write_trailer(&mut io).unwrap();
        let len = io.size().unwrap() as usize;
        io.seek(SeekFrom::Start(0)).unwrap();
        let data = io.read_bytes(len).unwrap();
        assert!(find(&data, b"moov").is_some());
        assert!(find(&data, b"Y800").is_some());
    }

    #[test]
    fn test_不支持的像素格式在写头部时失败() {
        let mut io = IoContext::memory(Vec::new());
        let mut muxer = Mp4Muxer::create().unwrap();
        let err = muxer
            .write_header(&mut io, &[video_stream(PixelFormat::Bgra)])
            .unwrap_err();
        assert!(matches!(err, AvError::Unsupported(_)));
    }

    #[test]
    fn test_空流列表与未知流() {
        let mut io = IoContext::memory(Vec::new());
        let mut muxer = Mp4Muxer::create().unwrap();
        assert!(muxer.write_header(&mut io, &[]).is_err());

        let mut muxer = Mp4Muxer::create().unwrap();
        muxer
            .write_header(&mut io, &[video_stream(PixelFormat::Yuv420p)])
            .unwrap();
        assert!(matches!(
            muxer.write_packet(&mut io, &packet(3, 0, 12)),
            Err(AvError::StreamNotFound(3))
        ));
    }

    #[test]
    fn test_dts_非单调被拒绝() {
        let mut io = IoContext::memory(Vec::new());
        let mut muxer = Mp4Muxer::create().unwrap();
        muxer
            .write_header(&mut io, &[video_stream(PixelFormat::Yuv420p)])
            .unwrap();
        muxer.write_packet(&mut io, &packet(0, 5, 12)).unwrap();
        assert!(muxer.write_packet(&mut io, &packet(0, 4, 12)).is_err());
    }

    #[test]
    fn test_样本时长推导() {
        let mut track = TrackCollector::new(&video_stream(PixelFormat::Yuv420p)).unwrap();
        for (dts, duration) in [(0, 0), (1, 0), (3, 2)] {
            track.samples.push(SampleEntry {
                offset: 0,
                size: 1,
                dts,
                duration,
                cts_offset: 0,
                is_keyframe: true,
            });
        }
        assert_eq!(track.durations(), vec![1, 2, 2]);
        assert_eq!(track.media_duration(), 5);
        // 5 帧 @ 25fps = 200ms
        assert_eq!(track.movie_duration(), 200);
    }

    #[test]
    fn test_游程编码() {
        let runs = run_lengths([3000u32, 3000, 6000].into_iter());
        assert_eq!(runs, vec![(2, 3000), (1, 6000)]);
        assert!(run_lengths(std::iter::empty::<i32>()).is_empty());
    }

    #[test]
    fn test_mdat_大小字段选择() {
        assert_eq!(mdat_header(8), MdatHeader::Compact(8));
        assert_eq!(mdat_header(u64::from(u32::MAX)), MdatHeader::Compact(u32::MAX));
        assert_eq!(mdat_header(u64::from(u32::MAX) + 1), MdatHeader::Large);
    }
}
