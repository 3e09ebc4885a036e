//! MP4/MOV 解封装器.
//!
//! 打开时遍历顶层 box, 解析 moov 中每条 trak 的采样表并展开为扁平索引.
//! 读包时在所有轨道的下一个样本中选文件偏移最小者, 因此无论封装时
//! 如何交错, 读取总是顺序前进.

mod boxes;
mod sample_table;

use std::io::SeekFrom;

use bytes::Bytes;
use log::{debug, warn};

use avbridge_codec::{CodecId, Packet};
use avbridge_core::{AvError, AvResult, MediaType, PixelFormat, Rational};

use crate::demuxer::Demuxer;
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::probe::{FormatProbe, ProbeScore, SCORE_EXTENSION, SCORE_MAX, SCORE_STRUCTURE};
use crate::stream::{Stream, StreamParams};

use self::boxes::{BoxHeader, FileType, fourcc_str, read_version_flags};
use self::sample_table::{SampleInfo, SampleTables};

/// stsd 第一个条目中与流参数相关的字段
#[derive(Debug, Default)]
struct SampleDescription {
    fourcc: [u8; 4],
    width: u32,
    height: u32,
    channels: u32,
    bits_per_sample: u32,
    sample_rate: u32,
}

/// 解析中的 trak
#[derive(Debug, Default)]
struct TrackBuilder {
    handler: [u8; 4],
    timescale: u32,
    description: Option<SampleDescription>,
    tables: SampleTables,
}

/// 已打开的轨道
struct Track {
    samples: Vec<SampleInfo>,
    next: usize,
}

/// MP4/MOV 解封装器
pub struct Mp4Demuxer {
    format_id: FormatId,
    streams: Vec<Stream>,
    tracks: Vec<Track>,
    duration: Option<f64>,
}

impl Mp4Demuxer {
    /// MP4 解封装器 (工厂函数)
    pub fn create() -> AvResult<Box<dyn Demuxer>> {
        Ok(Box::new(Self::new(FormatId::Mp4)))
    }

    /// QuickTime 解封装器 (工厂函数)
    pub fn create_mov() -> AvResult<Box<dyn Demuxer>> {
        Ok(Box::new(Self::new(FormatId::Mov)))
    }

    fn new(format_id: FormatId) -> Self {
        Self {
            format_id,
            streams: Vec::new(),
            tracks: Vec::new(),
            duration: None,
        }
    }

    fn parse_moov(&mut self, io: &mut IoContext, moov: &BoxHeader) -> AvResult<()> {
        let mut builders = Vec::new();
        while io.position()? + 8 <= moov.end {
            let child = BoxHeader::read(io, moov.end)?;
            match &child.fourcc {
                b"mvhd" => self.duration = parse_mvhd(io)?,
                b"trak" => builders.push(parse_trak(io, &child)?),
                _ => {}
            }
            child.skip_to_end(io)?;
        }

        for builder in builders {
            let index = self.streams.len();
            match build_stream(index, &builder)? {
                Some(stream) => {
                    let samples = builder.tables.build_index()?;
                    debug!(
                        "{}: 流 #{index} {} {} 个样本",
                        self.format_id,
                        stream.codec_id,
                        samples.len()
                    );
                    let mut stream = stream;
                    stream.nb_frames = samples.len() as u64;
                    stream.duration = samples.iter().map(|s| s.duration).sum();
                    self.streams.push(stream);
                    self.tracks.push(Track { samples, next: 0 });
                }
                None => debug!(
                    "{}: 跳过 handler='{}' 的轨道",
                    self.format_id,
                    fourcc_str(&builder.handler)
                ),
            }
        }
        Ok(())
    }

    /// 所有轨道下一个样本中文件偏移最小的一个
    fn next_sample(&self) -> Option<(usize, SampleInfo)> {
        self.tracks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.samples.get(t.next).map(|s| (i, *s)))
            .min_by_key(|(_, s)| s.offset)
    }
}

impl Demuxer for Mp4Demuxer {
    fn format_id(&self) -> FormatId {
        self.format_id
    }

    fn name(&self) -> &str {
        self.format_id.name()
    }

    fn open(&mut self, io: &mut IoContext) -> AvResult<()> {
        let file_end = io
            .size()
            .ok_or_else(|| AvError::Unsupported("MP4: 输入必须支持随机访问".into()))?;
        io.seek(SeekFrom::Start(0))?;

        let mut found_moov = false;
        while io.position()? + 8 <= file_end {
            let header = BoxHeader::read(io, file_end)?;
            match &header.fourcc {
                b"ftyp" => {
                    let content = io.read_bytes(header.content_size().min(256) as usize)?;
                    if let Some(ftyp) = FileType::parse(&content) {
                        debug!(
                            "{}: ftyp major='{}'",
                            self.format_id,
                            fourcc_str(&ftyp.major_brand)
                        );
                    }
                }
                b"moov" => {
                    self.parse_moov(io, &header)?;
                    found_moov = true;
                }
                _ => {}
            }
            header.skip_to_end(io)?;
        }

        if !found_moov {
            return Err(AvError::InvalidData("MP4: 缺少 moov".into()));
        }
        if self.streams.is_empty() {
            return Err(AvError::InvalidData("MP4: 没有可用的轨道".into()));
        }
        Ok(())
    }

    fn streams(&self) -> &[Stream] {
        &self.streams
    }

    fn read_packet(&mut self, io: &mut IoContext) -> AvResult<Packet> {
        let (track_idx, sample) = self.next_sample().ok_or(AvError::Eof)?;
        io.seek(SeekFrom::Start(sample.offset))?;
        let data = io.read_bytes(sample.size as usize)?;
        self.tracks[track_idx].next += 1;

        let mut pkt = Packet::from_data(Bytes::from(data));
        pkt.stream_index = track_idx;
        pkt.dts = sample.dts;
        pkt.pts = sample.pts;
        pkt.duration = sample.duration;
        pkt.is_keyframe = sample.is_keyframe;
        pkt.pos = sample.offset as i64;
        pkt.time_base = self.streams[track_idx].time_base;
        Ok(pkt)
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }
}

/// 解析 mvhd, 返回时长 (秒)
fn parse_mvhd(io: &mut IoContext) -> AvResult<Option<f64>> {
    let (version, _) = read_version_flags(io)?;
    let (timescale, duration) = if version == 1 {
        io.skip(16)?;
        (io.read_u32_be()?, io.read_u64_be()?)
    } else {
        io.skip(8)?;
        (io.read_u32_be()?, u64::from(io.read_u32_be()?))
    };
    Ok((timescale > 0).then(|| duration as f64 / f64::from(timescale)))
}

fn parse_trak(io: &mut IoContext, trak: &BoxHeader) -> AvResult<TrackBuilder> {
    let mut builder = TrackBuilder::default();
    walk(io, trak, &mut builder)?;
    Ok(builder)
}

/// 递归进入容器 box, 把叶子 box 交给对应解析函数
fn walk(io: &mut IoContext, parent: &BoxHeader, builder: &mut TrackBuilder) -> AvResult<()> {
    io.seek(SeekFrom::Start(parent.body))?;
    while io.position()? + 8 <= parent.end {
        let child = BoxHeader::read(io, parent.end)?;
        let size = child.content_size();
        match &child.fourcc {
            b"mdia" | b"minf" | b"stbl" => walk(io, &child, builder)?,
            b"mdhd" => builder.timescale = parse_mdhd(io)?,
            b"hdlr" => {
                read_version_flags(io)?;
                io.skip(4)?;
                builder.handler = io.read_tag()?;
            }
            b"stsd" => builder.description = parse_stsd(io, &child, &builder.handler)?,
            b"stts" => builder.tables.parse_stts(io, size)?,
            b"ctts" => builder.tables.parse_ctts(io, size)?,
            b"stsc" => builder.tables.parse_stsc(io, size)?,
            b"stsz" => builder.tables.parse_stsz(io, size)?,
            b"stco" => builder.tables.parse_chunk_offsets(io, size, false)?,
            b"co64" => builder.tables.parse_chunk_offsets(io, size, true)?,
            b"stss" => builder.tables.parse_stss(io, size)?,
            _ => {}
        }
        child.skip_to_end(io)?;
    }
    Ok(())
}

/// 解析 mdhd, 返回媒体时间刻度
fn parse_mdhd(io: &mut IoContext) -> AvResult<u32> {
    let (version, _) = read_version_flags(io)?;
    io.skip(if version == 1 { 16 } else { 8 })?;
    io.read_u32_be()
}

/// 只解析第一个采样描述条目, 条目布局由轨道 handler 决定
fn parse_stsd(
    io: &mut IoContext,
    stsd: &BoxHeader,
    handler: &[u8; 4],
) -> AvResult<Option<SampleDescription>> {
    read_version_flags(io)?;
    if io.read_u32_be()? == 0 {
        return Ok(None);
    }
    let entry = BoxHeader::read(io, stsd.end)?;
    let mut desc = SampleDescription {
        fourcc: entry.fourcc,
        ..Default::default()
    };
    // reserved(6) + data_reference_index(2)
    io.skip(8)?;
    let remaining = entry.end.saturating_sub(io.position()?);

    if handler == b"vide" && remaining >= 70 {
        io.skip(16)?;
        desc.width = u32::from(io.read_u16_be()?);
        desc.height = u32::from(io.read_u16_be()?);
    } else if handler == b"soun" && remaining >= 20 {
        // version(2) + revision(2) + vendor(4)
        io.skip(8)?;
        desc.channels = u32::from(io.read_u16_be()?);
        desc.bits_per_sample = u32::from(io.read_u16_be()?);
        io.skip(4)?;
        desc.sample_rate = io.read_u32_be()? >> 16;
    }
    Ok(Some(desc))
}

/// 未压缩视频 FourCC 对应的像素格式
fn raw_video_format(fourcc: &[u8; 4]) -> Option<PixelFormat> {
    match fourcc {
        b"I420" | b"i420" | b"IYUV" => Some(PixelFormat::Yuv420p),
        b"raw " => Some(PixelFormat::Rgb24),
        b"Y800" | b"GREY" | b"Y8  " => Some(PixelFormat::Gray8),
        _ => None,
    }
}

/// 由 trak 构造流, 非音视频轨道返回 `None`
fn build_stream(index: usize, builder: &TrackBuilder) -> AvResult<Option<Stream>> {
    let media_type = match &builder.handler {
        b"vide" => MediaType::Video,
        b"soun" => MediaType::Audio,
        _ => return Ok(None),
    };
    if builder.timescale == 0 || builder.timescale > i32::MAX as u32 {
        return Err(AvError::InvalidData(format!(
            "MP4: 轨道 #{index} timescale {} 无效",
            builder.timescale
        )));
    }
    let timescale = builder.timescale as i32;
    let desc = builder.description.as_ref();

    let stream = match media_type {
        MediaType::Video => {
            let fourcc = desc.map_or([0; 4], |d| d.fourcc);
            let (codec_id, pixel_format) = match raw_video_format(&fourcc) {
                Some(pf) => (CodecId::RawVideo, pf),
                None => {
                    warn!("MP4: 轨道 #{index} 视频编码 '{}' 不受支持", fourcc_str(&fourcc));
                    (CodecId::None, PixelFormat::None)
                }
            };
            let frame_rate = builder
                .tables
                .uniform_delta()
                .and_then(|d| i32::try_from(d).ok())
                .map_or(Rational::new(0, 1), |d| Rational::new(timescale, d).reduce());
            let mut stream = Stream::video(
                index,
                codec_id,
                desc.map_or(0, |d| d.width),
                desc.map_or(0, |d| d.height),
                pixel_format,
                frame_rate,
            );
            stream.time_base = Rational::new(1, timescale);
            stream
        }
        _ => {
            let codec_id = match desc.map(|d| &d.fourcc) {
                Some(b"sowt") => CodecId::PcmS16le,
                _ => CodecId::None,
            };
            let mut stream = Stream::audio(
                index,
                codec_id,
                desc.map_or(0, |d| d.sample_rate),
                desc.map_or(0, |d| d.channels),
                desc.map_or(0, |d| d.bits_per_sample),
            );
            stream.time_base = Rational::new(1, timescale);
            if let StreamParams::Audio(a) = &mut stream.params {
                if a.sample_rate == 0 {
                    a.sample_rate = builder.timescale;
                }
            }
            stream
        }
    };
    Ok(Some(stream))
}

/// MP4/MOV 探测器
///
/// ftyp 主品牌区分两种格式: `qt  ` 归 MOV, 其余归 MP4.
/// 没有 ftyp 但以常见顶层 box 开头的文件按老式 QuickTime 处理.
pub struct Mp4Probe {
    format_id: FormatId,
}

impl Mp4Probe {
    pub fn new(format_id: FormatId) -> Self {
        Self { format_id }
    }

    fn wants_quicktime(&self) -> bool {
        self.format_id == FormatId::Mov
    }
}

impl FormatProbe for Mp4Probe {
    fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeScore> {
        if let Some(tag) = data.get(4..8) {
            if tag == b"ftyp" {
                let is_qt = data
                    .get(8..)
                    .and_then(FileType::parse)
                    .is_some_and(|f| f.is_quicktime());
                if is_qt == self.wants_quicktime() {
                    return Some(SCORE_MAX);
                }
            } else if self.wants_quicktime()
                && matches!(tag, b"moov" | b"mdat" | b"free" | b"wide" | b"skip")
            {
                return Some(SCORE_STRUCTURE);
            }
        }

        filename
            .and_then(FormatId::from_filename)
            .filter(|id| *id == self.format_id)
            .map(|_| SCORE_EXTENSION)
    }

    fn format_id(&self) -> FormatId {
        self.format_id
    }
}
