//! 编解码器注册表.
//!
//! 按 [`CodecId`] 或名称查找并实例化编解码器. 同一 `CodecId` 可注册多个
//! 实现, 按 ID 创建时取最先注册的一个, 按名称创建时精确匹配.

use std::collections::HashMap;

use avbridge_core::{AvError, AvResult};

use crate::codec_id::CodecId;
use crate::decoder::Decoder;
use crate::encoder::Encoder;

/// 解码器工厂函数
pub type DecoderFactory = fn() -> AvResult<Box<dyn Decoder>>;

/// 编码器工厂函数
pub type EncoderFactory = fn() -> AvResult<Box<dyn Encoder>>;

struct Entry<F> {
    name: String,
    factory: F,
}

/// 编解码器注册表
pub struct CodecRegistry {
    decoders: HashMap<CodecId, Vec<Entry<DecoderFactory>>>,
    encoders: HashMap<CodecId, Vec<Entry<EncoderFactory>>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
            encoders: HashMap::new(),
        }
    }

    pub fn register_decoder(
        &mut self,
        codec_id: CodecId,
        name: impl Into<String>,
        factory: DecoderFactory,
    ) {
        self.decoders.entry(codec_id).or_default().push(Entry {
            name: name.into(),
            factory,
        });
    }

    pub fn register_encoder(
        &mut self,
        codec_id: CodecId,
        name: impl Into<String>,
        factory: EncoderFactory,
    ) {
        self.encoders.entry(codec_id).or_default().push(Entry {
            name: name.into(),
            factory,
        });
    }

    /// 按 ID 创建解码器 (最先注册者优先)
    pub fn create_decoder(&self, codec_id: CodecId) -> AvResult<Box<dyn Decoder>> {
        let entry = self
            .decoders
            .get(&codec_id)
            .and_then(|entries| entries.first())
            .ok_or_else(|| AvError::CodecNotFound(format!("没有 {codec_id} 的解码器")))?;
        (entry.factory)()
    }

    /// 按 ID 创建编码器 (最先注册者优先)
    pub fn create_encoder(&self, codec_id: CodecId) -> AvResult<Box<dyn Encoder>> {
        let entry = self
            .encoders
            .get(&codec_id)
            .and_then(|entries| entries.first())
            .ok_or_else(|| AvError::CodecNotFound(format!("没有 {codec_id} 的编码器")))?;
        (entry.factory)()
    }

    /// 按注册名称创建编码器
    pub fn create_encoder_by_name(&self, name: &str) -> AvResult<Box<dyn Encoder>> {
        let entry = self
            .encoders
            .values()
            .flatten()
            .find(|e| e.name == name)
            .ok_or_else(|| AvError::CodecNotFound(format!("没有名为 {name} 的编码器")))?;
        (entry.factory)()
    }

    /// 是否存在该 ID 的解码器
    pub fn has_decoder(&self, codec_id: CodecId) -> bool {
        self.decoders.get(&codec_id).is_some_and(|e| !e.is_empty())
    }

    /// 所有解码器 (ID, 名称), 按名称排序
    pub fn list_decoders(&self) -> Vec<(CodecId, &str)> {
        list(&self.decoders)
    }

    /// 所有编码器 (ID, 名称), 按名称排序
    pub fn list_encoders(&self) -> Vec<(CodecId, &str)> {
        list(&self.encoders)
    }
}

fn list<F>(map: &HashMap<CodecId, Vec<Entry<F>>>) -> Vec<(CodecId, &str)> {
    let mut result: Vec<_> = map
        .iter()
        .flat_map(|(id, entries)| entries.iter().map(move |e| (*id, e.name.as_str())))
        .collect();
    result.sort_by(|a, b| a.1.cmp(b.1));
    result
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_注册所有编解码器() {
        let mut registry = CodecRegistry::new();
        crate::register_all(&mut registry);
        assert_eq!(registry.list_decoders(), vec![(CodecId::RawVideo, "rawvideo")]);
        assert_eq!(registry.list_encoders(), vec![(CodecId::RawVideo, "rawvideo")]);
        assert!(registry.has_decoder(CodecId::RawVideo));
        assert!(!registry.has_decoder(CodecId::PcmS16le));
    }

    #[test]
    fn test_按名称创建编码器() {
        let mut registry = CodecRegistry::new();
        crate::register_all(&mut registry);
        let enc = registry.create_encoder_by_name("rawvideo").unwrap();
        assert_eq!(enc.codec_id(), CodecId::RawVideo);
        assert!(matches!(
            registry.create_encoder_by_name("h264"),
            Err(AvError::CodecNotFound(_))
        ));
    }

    #[test]
    fn test_未注册的编解码器返回错误() {
        let registry = CodecRegistry::new();
        assert!(registry.create_decoder(CodecId::RawVideo).is_err());
        assert!(registry.create_encoder(CodecId::PcmS16le).is_err());
    }
}
