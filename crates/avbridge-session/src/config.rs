//! 运行时配置.
//!
//! 以 TOML 文本描述, 所有字段都有默认值, 可只写需要覆盖的键:
//!
//! ```toml
//! frame_rate = 30
//! scale_algorithm = "nearest"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use avbridge_core::{PixelFormat, Rational, pixel_registry};
use avbridge_format::FormatId;
use avbridge_scale::ScaleAlgorithm;

use crate::error::{BridgeError, BridgeResult};

/// 运行时配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// 写入容器的名义帧率, 编码时间基为 1/frame_rate
    pub frame_rate: u32,
    /// 编码会话使用的编码器名称
    pub video_codec: String,
    /// 送入编码器的像素格式
    pub codec_pixel_format: String,
    /// 解码输出的固定像素格式
    pub decode_pixel_format: String,
    /// 缩放算法 ("nearest" / "bilinear")
    pub scale_algorithm: String,
    /// 输出扩展名无法识别时使用的容器
    pub default_container: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame_rate: 25,
            video_codec: "rawvideo".into(),
            codec_pixel_format: "yuv420p".into(),
            decode_pixel_format: "rgb24".into(),
            scale_algorithm: "bilinear".into(),
            default_container: "mp4".into(),
        }
    }
}

/// 解析后的配置值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub frame_rate: Rational,
    pub video_codec: String,
    pub codec_pixel_format: PixelFormat,
    pub decode_pixel_format: PixelFormat,
    pub scale_algorithm: ScaleAlgorithm,
    pub default_container: FormatId,
}

impl RuntimeConfig {
    /// 从 TOML 文本解析
    pub fn from_toml_str(text: &str) -> BridgeResult<Self> {
        toml::from_str(text).map_err(|e| BridgeError::Init(format!("配置解析失败: {e}")))
    }

    /// 从 TOML 文件加载
    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Init(format!("读取配置 {} 失败: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// 序列化为 TOML 文本
    pub fn to_toml_string(&self) -> BridgeResult<String> {
        toml::to_string(self).map_err(|e| BridgeError::Init(format!("配置序列化失败: {e}")))
    }

    /// 检查所有字段
    pub fn validate(&self) -> BridgeResult<()> {
        self.resolve().map(|_| ())
    }

    /// 把字符串字段解析为具体类型
    pub fn resolve(&self) -> BridgeResult<ResolvedConfig> {
        if self.frame_rate == 0 || self.frame_rate > i32::MAX as u32 {
            return Err(BridgeError::Init(format!(
                "frame_rate 必须为正数, 实际为 {}",
                self.frame_rate
            )));
        }
        if self.video_codec.trim().is_empty() {
            return Err(BridgeError::Init("video_codec 不能为空".into()));
        }
        let pixel_format = |key: &str, name: &str| {
            pixel_registry::resolve(name)
                .map(|d| d.format)
                .map_err(|e| BridgeError::Init(format!("{key}: {e}")))
        };
        let codec_pixel_format = pixel_format("codec_pixel_format", &self.codec_pixel_format)?;
        let decode_pixel_format = pixel_format("decode_pixel_format", &self.decode_pixel_format)?;
        if !decode_pixel_format.is_packed() {
            return Err(BridgeError::Init(format!(
                "decode_pixel_format 必须是 packed 格式, 实际为 {decode_pixel_format}"
            )));
        }
        let scale_algorithm = self
            .scale_algorithm
            .parse::<ScaleAlgorithm>()
            .map_err(|e| BridgeError::Init(format!("scale_algorithm: {e}")))?;
        let default_container = FormatId::from_name(&self.default_container).ok_or_else(|| {
            BridgeError::Init(format!("未知容器: {}", self.default_container))
        })?;

        Ok(ResolvedConfig {
            frame_rate: Rational::from_fps(self.frame_rate),
            video_codec: self.video_codec.trim().to_string(),
            codec_pixel_format,
            decode_pixel_format,
            scale_algorithm,
            default_container,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_默认配置可解析() {
        let resolved = RuntimeConfig::default().resolve().unwrap();
        assert_eq!(resolved.frame_rate, Rational::new(25, 1));
        assert_eq!(resolved.codec_pixel_format, PixelFormat::Yuv420p);
        assert_eq!(resolved.decode_pixel_format, PixelFormat::Rgb24);
        assert_eq!(resolved.scale_algorithm, ScaleAlgorithm::Bilinear);
        assert_eq!(resolved.default_container, FormatId::Mp4);
    }

    #[test]
    fn test_部分覆盖() {
        let cfg = RuntimeConfig::from_toml_str("frame_rate = 30\nscale_algorithm = \"nearest\"\n")
            .unwrap();
        assert_eq!(cfg.frame_rate, 30);
        assert_eq!(cfg.video_codec, "rawvideo");
        assert_eq!(cfg.resolve().unwrap().scale_algorithm, ScaleAlgorithm::Nearest);
    }

    #[test]
    fn test_非法值返回_init() {
        let cases = [
            RuntimeConfig { frame_rate: 0, ..Default::default() },
            RuntimeConfig { codec_pixel_format: "nv12".into(), ..Default::default() },
            RuntimeConfig { decode_pixel_format: "yuv420p".into(), ..Default::default() },
            RuntimeConfig { scale_algorithm: "bicubic".into(), ..Default::default() },
            RuntimeConfig { default_container: "avi".into(), ..Default::default() },
            RuntimeConfig { video_codec: " ".into(), ..Default::default() },
        ];
        for cfg in cases {
            assert!(matches!(cfg.validate(), Err(BridgeError::Init(_))), "{cfg:?}");
        }
    }

    #[test]
    fn test_toml_语法错误() {
        assert!(matches!(
            RuntimeConfig::from_toml_str("frame_rate = \"fast\""),
            Err(BridgeError::Init(_))
        ));
    }

    #[test]
    fn test_序列化再加载() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avbridge.toml");
        let cfg = RuntimeConfig { frame_rate: 60, ..Default::default() };
        std::fs::write(&path, cfg.to_toml_string().unwrap()).unwrap();
        assert_eq!(RuntimeConfig::load(&path).unwrap(), cfg);
        assert!(RuntimeConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
