//! # avbridge-codec
//!
//! 编解码层, 会话层通过它驱动压缩/解压流水线.
//!
//! 编码与解码都是 send/receive 两段式: 送入一份输入后反复取出输出,
//! 直到返回 [`AvError::NeedMoreData`](avbridge_core::AvError::NeedMoreData);
//! 送入刷新信号后取到 [`AvError::Eof`](avbridge_core::AvError::Eof) 为止.
//!
//! ```rust
//! use avbridge_codec::{CodecId, CodecRegistry};
//!
//! let mut reg = CodecRegistry::new();
//! avbridge_codec::register_all(&mut reg);
//!
//! let encoder = reg.create_encoder_by_name("rawvideo").unwrap();
//! assert_eq!(encoder.codec_id(), CodecId::RawVideo);
//! ```

pub mod codec_id;
pub mod codec_parameters;
pub mod decoder;
pub mod decoders;
pub mod encoder;
pub mod encoders;
pub mod frame;
pub mod packet;
pub mod registry;

pub use codec_id::CodecId;
pub use codec_parameters::{AudioCodecParams, CodecParameters, CodecParamsType, VideoCodecParams};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use frame::VideoFrame;
pub use packet::Packet;
pub use registry::CodecRegistry;

/// 注册所有内置编解码器
pub fn register_all(registry: &mut CodecRegistry) {
    decoders::register_all_decoders(registry);
    encoders::register_all_encoders(registry);
}
