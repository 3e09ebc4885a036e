//! # avbridge-session
//!
//! 编码/解码会话与句柄桥.
//!
//! 调用方先创建 [`RuntimeContext`], 通过它打开编码或解码会话拿到
//! [`SessionHandle`], 反复交换 [`FrameBuffer`], 最后关闭会话.
//!
//! ```no_run
//! use avbridge_session::{DecodeStatus, FrameBuffer, RuntimeContext};
//! use avbridge_core::PixelFormat;
//!
//! # fn main() -> Result<(), avbridge_session::BridgeError> {
//! let ctx = RuntimeContext::new()?;
//! let enc = ctx.open_encoder(256, 256, "out.mp4", "AV_PIX_FMT_RGB24")?;
//! let frame = FrameBuffer::alloc(256, 256, PixelFormat::Rgb24)?;
//! ctx.encode_frame(enc, &frame)?;
//! ctx.close_encoder(enc)?;
//!
//! let (dec, w, h) = ctx.open_decoder("out.mp4", 100, 0)?;
//! let mut out = FrameBuffer::alloc(w, h, PixelFormat::Rgb24)?;
//! while ctx.decode_frame(dec, &mut out)? == DecodeStatus::Produced {}
//! ctx.close_decoder(dec)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod decoder_session;
pub mod encoder_session;
pub mod error;
pub mod frame_buffer;
pub mod geometry;
pub mod handle;

pub use config::{ResolvedConfig, RuntimeConfig};
pub use context::{RuntimeContext, SessionKind};
pub use decoder_session::{DecodeStatus, DecoderSession};
pub use encoder_session::EncoderSession;
pub use error::{BridgeError, BridgeResult};
pub use frame_buffer::FrameBuffer;
pub use handle::{HandleTable, SessionHandle};
