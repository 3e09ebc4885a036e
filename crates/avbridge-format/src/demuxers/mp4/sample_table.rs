//! 采样表 (stbl) 解析与索引展开.
//!
//! 打开文件时把 stts/stsc/stsz/stco/stss/ctts 展开成逐样本的扁平索引,
//! 之后读包只需按下标取 [`SampleInfo`].

use avbridge_core::{AvError, AvResult};

use super::boxes::read_version_flags;
use crate::io::IoContext;

/// 一个样本的位置与时间 (时间单位为轨道 timescale)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct SampleInfo {
    pub offset: u64,
    pub size: u32,
    pub dts: i64,
    pub pts: i64,
    pub duration: i64,
    pub is_keyframe: bool,
}

/// stsc 条目
#[derive(Debug, Clone, Copy)]
struct ChunkRun {
    /// 起始 chunk 号 (从 1 开始)
    first_chunk: u32,
    samples_per_chunk: u32,
}

/// 从 stbl 读出的原始表
#[derive(Debug, Default)]
pub(super) struct SampleTables {
    /// (count, delta)
    time_to_sample: Vec<(u32, u32)>,
    /// (count, offset)
    composition: Vec<(u32, i32)>,
    chunk_runs: Vec<ChunkRun>,
    /// 非零表示所有样本同大小
    uniform_size: u32,
    sample_count: u32,
    sizes: Vec<u32>,
    chunk_offsets: Vec<u64>,
    /// `None` 表示没有 stss, 全部为关键帧
    sync_samples: Option<Vec<u32>>,
}

/// 防止损坏的计数字段触发超大分配
fn bounded_capacity(count: u32, entry_size: u64, content_size: u64) -> AvResult<usize> {
    if u64::from(count) * entry_size > content_size {
        return Err(AvError::InvalidData(format!(
            "MP4: 表项数 {count} 超出 box 大小 {content_size}"
        )));
    }
    Ok(count as usize)
}

impl SampleTables {
    pub fn parse_stts(&mut self, io: &mut IoContext, content_size: u64) -> AvResult<()> {
        read_version_flags(io)?;
        let count = io.read_u32_be()?;
        let n = bounded_capacity(count, 8, content_size)?;
        self.time_to_sample = Vec::with_capacity(n);
        for _ in 0..n {
            let run = io.read_u32_be()?;
            let delta = io.read_u32_be()?;
            self.time_to_sample.push((run, delta));
        }
        Ok(())
    }

    pub fn parse_ctts(&mut self, io: &mut IoContext, content_size: u64) -> AvResult<()> {
        read_version_flags(io)?;
        let count = io.read_u32_be()?;
        let n = bounded_capacity(count, 8, content_size)?;
        self.composition = Vec::with_capacity(n);
        for _ in 0..n {
            let run = io.read_u32_be()?;
            // version 0 的无符号偏移在实践中同样按有符号解释
            let offset = io.read_i32_be()?;
            self.composition.push((run, offset));
        }
        Ok(())
    }

    pub fn parse_stsc(&mut self, io: &mut IoContext, content_size: u64) -> AvResult<()> {
        read_version_flags(io)?;
        let count = io.read_u32_be()?;
        let n = bounded_capacity(count, 12, content_size)?;
        self.chunk_runs = Vec::with_capacity(n);
        for _ in 0..n {
            let first_chunk = io.read_u32_be()?;
            let samples_per_chunk = io.read_u32_be()?;
            let _description_index = io.read_u32_be()?;
            if first_chunk == 0 {
                return Err(AvError::InvalidData("MP4: stsc first_chunk 为 0".into()));
            }
            self.chunk_runs.push(ChunkRun {
                first_chunk,
                samples_per_chunk,
            });
        }
        Ok(())
    }

    pub fn parse_stsz(&mut self, io: &mut IoContext, content_size: u64) -> AvResult<()> {
        read_version_flags(io)?;
        self.uniform_size = io.read_u32_be()?;
        self.sample_count = io.read_u32_be()?;
        if self.uniform_size == 0 {
            let n = bounded_capacity(self.sample_count, 4, content_size)?;
            self.sizes = Vec::with_capacity(n);
            for _ in 0..n {
                self.sizes.push(io.read_u32_be()?);
            }
        }
        Ok(())
    }

    pub fn parse_chunk_offsets(
        &mut self,
        io: &mut IoContext,
        content_size: u64,
        wide: bool,
    ) -> AvResult<()> {
        read_version_flags(io)?;
        let count = io.read_u32_be()?;
        let n = bounded_capacity(count, if wide { 8 } else { 4 }, content_size)?;
        self.chunk_offsets = Vec::with_capacity(n);
        for _ in 0..n {
            let offset = if wide {
                io.read_u64_be()?
            } else {
                u64::from(io.read_u32_be()?)
            };
            self.chunk_offsets.push(offset);
        }
        Ok(())
    }

    pub fn parse_stss(&mut self, io: &mut IoContext, content_size: u64) -> AvResult<()> {
        read_version_flags(io)?;
        let count = io.read_u32_be()?;
        let n = bounded_capacity(count, 4, content_size)?;
        let mut sync = Vec::with_capacity(n);
        for _ in 0..n {
            sync.push(io.read_u32_be()?);
        }
        sync.sort_unstable();
        self.sync_samples = Some(sync);
        Ok(())
    }

    /// stts 只有一种 delta 时返回它
    pub fn uniform_delta(&self) -> Option<u32> {
        let mut deltas = self
            .time_to_sample
            .iter()
            .filter(|(count, _)| *count > 0)
            .map(|(_, delta)| *delta);
        let first = deltas.next()?;
        (first > 0 && deltas.all(|d| d == first)).then_some(first)
    }

    /// 展开为逐样本索引
    pub fn build_index(&self) -> AvResult<Vec<SampleInfo>> {
        let count = self.sample_count as usize;
        if self.uniform_size == 0 && self.sizes.len() != count {
            return Err(AvError::InvalidData(format!(
                "MP4: stsz 条目数 {} 与样本数 {count} 不符",
                self.sizes.len()
            )));
        }

        let offsets = self.sample_offsets(count)?;
        let mut index = Vec::with_capacity(count);
        let mut deltas = expand_runs(&self.time_to_sample);
        let mut composition = expand_runs(&self.composition);
        let mut dts = 0i64;

        for (i, offset) in offsets.into_iter().enumerate() {
            let duration = i64::from(deltas.next().unwrap_or(0));
            let cts = i64::from(composition.next().unwrap_or(0));
            let number = i as u32 + 1;
            index.push(SampleInfo {
                offset,
                size: self.sample_size(i),
                dts,
                pts: dts + cts,
                duration,
                is_keyframe: self
                    .sync_samples
                    .as_ref()
                    .is_none_or(|sync| sync.binary_search(&number).is_ok()),
            });
            dts += duration;
        }
        Ok(index)
    }

    fn sample_size(&self, i: usize) -> u32 {
        if self.uniform_size != 0 {
            self.uniform_size
        } else {
            self.sizes[i]
        }
    }

    /// 结合 stsc 与 chunk 偏移计算每个样本的文件偏移
    fn sample_offsets(&self, count: usize) -> AvResult<Vec<u64>> {
        let mut offsets = Vec::with_capacity(count);
        let chunk_total = self.chunk_offsets.len();

        for (run_idx, run) in self.chunk_runs.iter().enumerate() {
            let first = run.first_chunk as usize - 1;
            let last = self
                .chunk_runs
                .get(run_idx + 1)
                .map_or(chunk_total, |next| (next.first_chunk as usize - 1).min(chunk_total));
            for chunk in first..last {
                let mut pos = self.chunk_offsets[chunk];
                for _ in 0..run.samples_per_chunk {
                    if offsets.len() == count {
                        return Ok(offsets);
                    }
                    offsets.push(pos);
                    pos += u64::from(self.sample_size(offsets.len() - 1));
                }
            }
        }

        if offsets.len() < count {
            return Err(AvError::InvalidData(format!(
                "MP4: chunk 表只覆盖 {} / {count} 个样本",
                offsets.len()
            )));
        }
        Ok(offsets)
    }
}

/// 把 (次数, 值) 游程展开为逐项迭代器
fn expand_runs<T: Copy>(runs: &[(u32, T)]) -> impl Iterator<Item = T> + '_ {
    runs.iter()
        .flat_map(|&(count, value)| std::iter::repeat_n(value, count as usize))
}
