//! 容器格式注册表.
//!
//! 按 [`FormatId`] 创建封装器/解封装器, 并通过已注册的探测器识别输入.

use std::collections::HashMap;
use std::io::SeekFrom;

use log::debug;

use avbridge_core::{AvError, AvResult};

use crate::demuxer::Demuxer;
use crate::format_id::FormatId;
use crate::io::IoContext;
use crate::muxer::Muxer;
use crate::probe::{FormatProbe, ProbeResult};

/// 解封装器工厂函数
pub type DemuxerFactory = fn() -> AvResult<Box<dyn Demuxer>>;

/// 封装器工厂函数
pub type MuxerFactory = fn() -> AvResult<Box<dyn Muxer>>;

/// 探测时最多读取的字节数
const PROBE_SIZE: u64 = 8192;

struct Entry<F> {
    name: String,
    factory: F,
}

/// 容器格式注册表
pub struct FormatRegistry {
    demuxers: HashMap<FormatId, Entry<DemuxerFactory>>,
    muxers: HashMap<FormatId, Entry<MuxerFactory>>,
    probes: Vec<Box<dyn FormatProbe>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self {
            demuxers: HashMap::new(),
            muxers: HashMap::new(),
            probes: Vec::new(),
        }
    }

    pub fn register_demuxer(
        &mut self,
        format_id: FormatId,
        name: impl Into<String>,
        factory: DemuxerFactory,
    ) {
        self.demuxers.insert(
            format_id,
            Entry {
                name: name.into(),
                factory,
            },
        );
    }

    pub fn register_muxer(
        &mut self,
        format_id: FormatId,
        name: impl Into<String>,
        factory: MuxerFactory,
    ) {
        self.muxers.insert(
            format_id,
            Entry {
                name: name.into(),
                factory,
            },
        );
    }

    pub fn register_probe(&mut self, probe: Box<dyn FormatProbe>) {
        self.probes.push(probe);
    }

    pub fn create_demuxer(&self, format_id: FormatId) -> AvResult<Box<dyn Demuxer>> {
        let entry = self
            .demuxers
            .get(&format_id)
            .ok_or_else(|| AvError::FormatNotFound(format!("没有 {format_id} 的解封装器")))?;
        (entry.factory)()
    }

    pub fn create_muxer(&self, format_id: FormatId) -> AvResult<Box<dyn Muxer>> {
        let entry = self
            .muxers
            .get(&format_id)
            .ok_or_else(|| AvError::FormatNotFound(format!("没有 {format_id} 的封装器")))?;
        (entry.factory)()
    }

    /// 返回置信度最高的探测结果, 同分时先注册者优先
    pub fn probe(&self, data: &[u8], filename: Option<&str>) -> Option<ProbeResult> {
        self.probes
            .iter()
            .filter_map(|p| {
                p.probe(data, filename).map(|score| ProbeResult {
                    format_id: p.format_id(),
                    score,
                })
            })
            .fold(None, |best: Option<ProbeResult>, cand| match best {
                Some(b) if b.score >= cand.score => Some(b),
                _ => Some(cand),
            })
    }

    /// 读取输入头部进行探测, 完成后定位回起点
    pub fn probe_input(&self, io: &mut IoContext, filename: Option<&str>) -> AvResult<ProbeResult> {
        let len = io.size().unwrap_or(PROBE_SIZE).min(PROBE_SIZE) as usize;
        let head = io.read_bytes(len)?;
        io.seek(SeekFrom::Start(0))?;
        self.probe(&head, filename)
            .ok_or_else(|| AvError::FormatNotFound("无法识别输入格式".into()))
    }

    /// 探测格式, 创建解封装器并解析头部
    pub fn open_input(
        &self,
        io: &mut IoContext,
        filename: Option<&str>,
    ) -> AvResult<Box<dyn Demuxer>> {
        let result = self.probe_input(io, filename)?;
        debug!("探测到 {} (score={})", result.format_id, result.score);
        let mut demuxer = self.create_demuxer(result.format_id)?;
        demuxer.open(io)?;
        Ok(demuxer)
    }

    /// 所有解封装器 (ID, 名称), 按名称排序
    pub fn list_demuxers(&self) -> Vec<(FormatId, &str)> {
        sorted(&self.demuxers)
    }

    /// 所有封装器 (ID, 名称), 按名称排序
    pub fn list_muxers(&self) -> Vec<(FormatId, &str)> {
        sorted(&self.muxers)
    }
}

fn sorted<F>(map: &HashMap<FormatId, Entry<F>>) -> Vec<(FormatId, &str)> {
    let mut list: Vec<_> = map.iter().map(|(id, e)| (*id, e.name.as_str())).collect();
    list.sort_by(|a, b| a.1.cmp(b.1));
    list
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}
