//! # avbridge-format
//!
//! 容器层. 会话层只把它当作不透明的封装/解封装服务使用:
//! 编码会话按输出路径扩展名选择封装器, 解码会话通过探测选择解封装器.
//!
//! 目前内置 MP4/MOV (ISO-BMFF), 采用 "mdat 在前, moov 在后" 的布局.

pub mod demuxer;
pub mod demuxers;
pub mod format_id;
pub mod io;
pub mod muxer;
pub mod muxers;
pub mod probe;
pub mod registry;
pub mod stream;

pub use demuxer::Demuxer;
pub use format_id::FormatId;
pub use io::{IoBackend, IoContext, MemoryBackend};
pub use muxer::Muxer;
pub use probe::{FormatProbe, ProbeResult};
pub use registry::FormatRegistry;
pub use stream::{AudioStreamParams, Stream, StreamParams, VideoStreamParams};

/// 注册所有内置容器格式
pub fn register_all(registry: &mut FormatRegistry) {
    demuxers::register_all_demuxers(registry);
    muxers::register_all_muxers(registry);
}
