//! 运行时上下文与会话桥.
//!
//! 所有外部调用都先经过句柄校验: 句柄不存在返回 `UnknownHandle`,
//! 类型不符返回 `WrongSessionKind`, 之后才进入会话逻辑.
//!
//! 句柄表由一把锁保护, 每个会话另有自己的锁, 不同句柄上的调用互不阻塞.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use avbridge_codec::CodecRegistry;
use avbridge_core::PixelFormat;
use avbridge_format::FormatRegistry;

use crate::config::{ResolvedConfig, RuntimeConfig};
use crate::decoder_session::{DecodeStatus, DecoderSession};
use crate::encoder_session::EncoderSession;
use crate::error::{BridgeError, BridgeResult};
use crate::frame_buffer::FrameBuffer;
use crate::handle::{HandleTable, SessionHandle};

/// 会话类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Encoder,
    Decoder,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Encoder => "编码",
            Self::Decoder => "解码",
        })
    }
}

enum Session {
    Encoder(EncoderSession),
    Decoder(DecoderSession),
}

impl Session {
    fn close(&mut self) -> BridgeResult<()> {
        match self {
            Self::Encoder(s) => s.close(),
            Self::Decoder(s) => s.close(),
        }
    }
}

struct SessionEntry {
    kind: SessionKind,
    session: Arc<Mutex<Session>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 运行时上下文
///
/// 持有配置、编解码器/容器注册表和存活会话表. 丢弃时尽力关闭所有会话,
/// 编码会话会完成各自的输出容器.
pub struct RuntimeContext {
    config: RuntimeConfig,
    resolved: ResolvedConfig,
    codecs: CodecRegistry,
    formats: FormatRegistry,
    sessions: Mutex<HandleTable<SessionEntry>>,
    initialized: AtomicBool,
}

impl RuntimeContext {
    /// 使用默认配置和全部内置编解码器/容器
    pub fn new() -> BridgeResult<Self> {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> BridgeResult<Self> {
        let mut codecs = CodecRegistry::new();
        avbridge_codec::register_all(&mut codecs);
        let mut formats = FormatRegistry::new();
        avbridge_format::register_all(&mut formats);
        Self::with_registries(config, codecs, formats)
    }

    /// 使用自定义注册表, 可注入测试用编解码器
    pub fn with_registries(
        config: RuntimeConfig,
        codecs: CodecRegistry,
        formats: FormatRegistry,
    ) -> BridgeResult<Self> {
        let resolved = config.resolve()?;
        if codecs.list_encoders().iter().all(|(_, name)| *name != resolved.video_codec) {
            return Err(BridgeError::Init(format!(
                "编码器 {} 未注册",
                resolved.video_codec
            )));
        }
        if formats.list_muxers().is_empty() || formats.list_demuxers().is_empty() {
            return Err(BridgeError::Init("没有可用的容器格式".into()));
        }
        info!(
            "运行时已初始化: {} @ {} fps, 解码输出 {}",
            resolved.video_codec, config.frame_rate, resolved.decode_pixel_format
        );
        Ok(Self {
            config,
            resolved,
            codecs,
            formats,
            sessions: Mutex::new(HandleTable::new()),
            initialized: AtomicBool::new(true),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn ensure_initialized(&self) -> BridgeResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(BridgeError::Init("运行时已关闭".into()))
        }
    }

    /// 关闭所有会话并拒绝之后的调用, 返回第一个关闭错误
    pub fn shutdown(&self) -> BridgeResult<()> {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let entries = lock(&self.sessions).drain();
        let mut first_error = None;
        for (handle, entry) in entries {
            if let Err(e) = lock(&entry.session).close() {
                warn!("关闭{}会话 {handle} 失败: {e}", entry.kind);
                first_error.get_or_insert(e);
            }
        }
        info!("运行时已关闭");
        first_error.map_or(Ok(()), Err)
    }

    /// 存活会话数
    pub fn live_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// 句柄对应的会话类型
    pub fn session_kind(&self, handle: SessionHandle) -> BridgeResult<SessionKind> {
        self.ensure_initialized()?;
        lock(&self.sessions)
            .get(handle)
            .map(|entry| entry.kind)
            .ok_or_else(|| unknown(handle))
    }

    fn insert(&self, kind: SessionKind, session: Session) -> SessionHandle {
        let handle = lock(&self.sessions).insert(SessionEntry {
            kind,
            session: Arc::new(Mutex::new(session)),
        });
        debug!("分配{kind}会话句柄 {handle}");
        handle
    }

    /// 查找句柄, 校验类型, 返回会话的共享引用; 不持有句柄表锁
    fn lookup(&self, handle: SessionHandle, kind: SessionKind) -> BridgeResult<Arc<Mutex<Session>>> {
        self.ensure_initialized()?;
        let table = lock(&self.sessions);
        let entry = table.get(handle).ok_or_else(|| unknown(handle))?;
        check_kind(handle, entry.kind, kind)?;
        Ok(Arc::clone(&entry.session))
    }

    /// 校验后从表中移除; 类型不符时句柄保持有效
    fn remove(&self, handle: SessionHandle, kind: SessionKind) -> BridgeResult<Arc<Mutex<Session>>> {
        self.ensure_initialized()?;
        let mut table = lock(&self.sessions);
        let entry = table.get(handle).ok_or_else(|| unknown(handle))?;
        check_kind(handle, entry.kind, kind)?;
        let entry = table.remove(handle).ok_or_else(|| unknown(handle))?;
        Ok(entry.session)
    }

    fn with_encoder<T>(
        &self,
        handle: SessionHandle,
        f: impl FnOnce(&mut EncoderSession) -> BridgeResult<T>,
    ) -> BridgeResult<T> {
        let session = self.lookup(handle, SessionKind::Encoder)?;
        let mut guard = lock(&session);
        match &mut *guard {
            Session::Encoder(s) => f(s),
            Session::Decoder(_) => Err(wrong_kind(handle, SessionKind::Decoder, SessionKind::Encoder)),
        }
    }

    fn with_decoder<T>(
        &self,
        handle: SessionHandle,
        f: impl FnOnce(&mut DecoderSession) -> BridgeResult<T>,
    ) -> BridgeResult<T> {
        let session = self.lookup(handle, SessionKind::Decoder)?;
        let mut guard = lock(&session);
        match &mut *guard {
            Session::Decoder(s) => f(s),
            Session::Encoder(_) => Err(wrong_kind(handle, SessionKind::Encoder, SessionKind::Decoder)),
        }
    }

    // ========================
    // 编码
    // ========================

    /// 打开编码会话
    pub fn open_encoder(
        &self,
        width: u32,
        height: u32,
        output_path: impl AsRef<Path>,
        pixel_format_name: &str,
    ) -> BridgeResult<SessionHandle> {
        self.ensure_initialized()?;
        let session = EncoderSession::open(
            width,
            height,
            output_path,
            pixel_format_name,
            &self.resolved,
            &self.codecs,
            &self.formats,
        )?;
        Ok(self.insert(SessionKind::Encoder, Session::Encoder(session)))
    }

    /// 编码一帧
    pub fn encode_frame<B: AsRef<[u8]>>(
        &self,
        handle: SessionHandle,
        frame: &FrameBuffer<B>,
    ) -> BridgeResult<()> {
        self.with_encoder(handle, |s| s.encode_frame(frame))
    }

    /// 以会话的尺寸和格式解释 `bytes` 并编码
    pub fn encode_bytes(&self, handle: SessionHandle, bytes: &[u8]) -> BridgeResult<()> {
        self.with_encoder(handle, |s| {
            let frame = FrameBuffer::new(bytes, s.width(), s.height(), s.pixel_format())?;
            s.encode_frame(&frame)
        })
    }

    /// 刷新并完成输出, 移除句柄
    ///
    /// 失败过的会话同样会被移除, 返回它的失败原因.
    pub fn close_encoder(&self, handle: SessionHandle) -> BridgeResult<()> {
        let session = self.remove(handle, SessionKind::Encoder)?;
        let result = lock(&session).close();
        debug!("编码会话句柄 {handle} 已释放");
        result
    }

    /// 已接受的帧数
    pub fn encoder_frame_count(&self, handle: SessionHandle) -> BridgeResult<u64> {
        self.with_encoder(handle, |s| Ok(s.frame_count()))
    }

    // ========================
    // 解码
    // ========================

    /// 打开解码会话, 返回句柄和协商后的输出宽高
    pub fn open_decoder(
        &self,
        input_path: impl AsRef<Path>,
        requested_width: u32,
        requested_height: u32,
    ) -> BridgeResult<(SessionHandle, u32, u32)> {
        self.ensure_initialized()?;
        let session = DecoderSession::open(
            input_path,
            requested_width,
            requested_height,
            &self.resolved,
            &self.codecs,
            &self.formats,
        )?;
        let (width, height) = (session.output_width(), session.output_height());
        let handle = self.insert(SessionKind::Decoder, Session::Decoder(session));
        Ok((handle, width, height))
    }

    /// 解码下一帧到调用方缓冲
    pub fn decode_frame<B>(
        &self,
        handle: SessionHandle,
        out: &mut FrameBuffer<B>,
    ) -> BridgeResult<DecodeStatus>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
    {
        self.with_decoder(handle, |s| s.decode_frame(out))
    }

    /// 以会话的输出尺寸和格式解释 `bytes` 并解码到其中
    pub fn decode_into(&self, handle: SessionHandle, bytes: &mut [u8]) -> BridgeResult<DecodeStatus> {
        self.with_decoder(handle, |s| {
            let mut out =
                FrameBuffer::new(bytes, s.output_width(), s.output_height(), s.output_format())?;
            s.decode_frame(&mut out)
        })
    }

    /// 释放解码会话, 移除句柄
    pub fn close_decoder(&self, handle: SessionHandle) -> BridgeResult<()> {
        let session = self.remove(handle, SessionKind::Decoder)?;
        let result = lock(&session).close();
        debug!("解码会话句柄 {handle} 已释放");
        result
    }

    /// 协商后的输出宽高与固定输出格式
    pub fn decoder_output_geometry(
        &self,
        handle: SessionHandle,
    ) -> BridgeResult<(u32, u32, PixelFormat)> {
        self.with_decoder(handle, |s| {
            Ok((s.output_width(), s.output_height(), s.output_format()))
        })
    }

    /// 已输出的帧数
    pub fn decoded_frame_count(&self, handle: SessionHandle) -> BridgeResult<u64> {
        self.with_decoder(handle, |s| Ok(s.frames_decoded()))
    }
}

impl Drop for RuntimeContext {
    fn drop(&mut self) {
        let live = lock(&self.sessions).len();
        if live > 0 {
            warn!("运行时销毁时仍有 {live} 个会话未关闭, 自动关闭");
        }
        if let Err(e) = self.shutdown() {
            warn!("自动关闭会话失败: {e}");
        }
    }
}

fn unknown(handle: SessionHandle) -> BridgeError {
    BridgeError::UnknownHandle(format!("句柄 {handle} 不存在或已关闭"))
}

fn wrong_kind(handle: SessionHandle, actual: SessionKind, expected: SessionKind) -> BridgeError {
    BridgeError::WrongSessionKind(format!("句柄 {handle} 是{actual}会话, 需要{expected}会话"))
}

fn check_kind(handle: SessionHandle, actual: SessionKind, expected: SessionKind) -> BridgeResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(wrong_kind(handle, actual, expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_clip(ctx: &RuntimeContext, path: &Path, w: u32, h: u32, frames: u32) {
        let handle = ctx.open_encoder(w, h, path, "rgb24").unwrap();
        let fb = FrameBuffer::alloc(w, h, PixelFormat::Rgb24).unwrap();
        for _ in 0..frames {
            ctx.encode_frame(handle, &fb).unwrap();
        }
        ctx.close_encoder(handle).unwrap();
    }

    #[test]
    fn test_句柄生命周期() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new().unwrap();
        let path = dir.path().join("a.mp4");
        let handle = ctx.open_encoder(8, 8, &path, "rgb24").unwrap();
        assert_eq!(ctx.live_sessions(), 1);
        assert_eq!(ctx.session_kind(handle).unwrap(), SessionKind::Encoder);

        ctx.encode_bytes(handle, &[0u8; 8 * 8 * 3]).unwrap();
        assert_eq!(ctx.encoder_frame_count(handle).unwrap(), 1);
        ctx.close_encoder(handle).unwrap();
        assert_eq!(ctx.live_sessions(), 0);

        let fb = FrameBuffer::alloc(8, 8, PixelFormat::Rgb24).unwrap();
        assert!(matches!(ctx.encode_frame(handle, &fb), Err(BridgeError::UnknownHandle(_))));
        assert!(matches!(ctx.close_encoder(handle), Err(BridgeError::UnknownHandle(_))));
        assert!(matches!(ctx.session_kind(handle), Err(BridgeError::UnknownHandle(_))));
    }

    #[test]
    fn test_缓冲大小不符不计数() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new().unwrap();
        let handle = ctx.open_encoder(8, 8, dir.path().join("a.mp4"), "rgb24").unwrap();
        assert!(matches!(
            ctx.encode_bytes(handle, &[0u8; 8 * 8 * 3 - 1]),
            Err(BridgeError::BufferSizeMismatch(_))
        ));
        assert_eq!(ctx.encoder_frame_count(handle).unwrap(), 0);
        ctx.close_encoder(handle).unwrap();
    }

    #[test]
    fn test_类型不符() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new().unwrap();
        let path = dir.path().join("a.mp4");
        write_clip(&ctx, &path, 4, 4, 1);

        let enc = ctx.open_encoder(4, 4, dir.path().join("b.mp4"), "rgb24").unwrap();
        let (dec, w, h) = ctx.open_decoder(&path, 0, 0).unwrap();
        assert_eq!((w, h), (4, 4));

        let mut out = vec![0u8; 4 * 4 * 3];
        assert!(matches!(
            ctx.decode_into(enc, &mut out),
            Err(BridgeError::WrongSessionKind(_))
        ));
        assert!(matches!(ctx.close_decoder(enc), Err(BridgeError::WrongSessionKind(_))));
        assert!(matches!(ctx.close_encoder(dec), Err(BridgeError::WrongSessionKind(_))));
        // 类型不符的关闭不会移除句柄
        assert_eq!(ctx.live_sessions(), 2);
        assert_eq!(ctx.decode_into(dec, &mut out).unwrap(), DecodeStatus::Produced);
        ctx.close_encoder(enc).unwrap();
        ctx.close_decoder(dec).unwrap();
    }

    #[test]
    fn test_解码器查询() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new().unwrap();
        let path = dir.path().join("a.mp4");
        write_clip(&ctx, &path, 16, 8, 2);

        let (dec, w, h) = ctx.open_decoder(&path, 8, 0).unwrap();
        assert_eq!((w, h), (8, 4));
        assert_eq!(
            ctx.decoder_output_geometry(dec).unwrap(),
            (8, 4, PixelFormat::Rgb24)
        );
        let mut out = FrameBuffer::alloc(8, 4, PixelFormat::Rgb24).unwrap();
        while ctx.decode_frame(dec, &mut out).unwrap() == DecodeStatus::Produced {}
        assert_eq!(ctx.decoded_frame_count(dec).unwrap(), 2);
        assert!(matches!(
            ctx.encoder_frame_count(dec),
            Err(BridgeError::WrongSessionKind(_))
        ));
    }

    #[test]
    fn test_关闭运行时() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RuntimeContext::new().unwrap();
        let path = dir.path().join("a.mp4");
        let handle = ctx.open_encoder(4, 4, &path, "gray8").unwrap();
        ctx.encode_bytes(handle, &[9u8; 16]).unwrap();

        ctx.shutdown().unwrap();
        assert!(!ctx.is_initialized());
        assert_eq!(ctx.live_sessions(), 0);
        assert!(matches!(ctx.encode_bytes(handle, &[0u8; 16]), Err(BridgeError::Init(_))));
        assert!(matches!(ctx.open_decoder(&path, 0, 0), Err(BridgeError::Init(_))));
        ctx.shutdown().unwrap();

        // 关闭时已完成容器
        let ctx = RuntimeContext::new().unwrap();
        let (dec, _, _) = ctx.open_decoder(&path, 0, 0).unwrap();
        let mut out = vec![0u8; 4 * 4 * 3];
        assert_eq!(ctx.decode_into(dec, &mut out).unwrap(), DecodeStatus::Produced);
        assert!(out.iter().all(|&c| c == 9));
    }

    #[test]
    fn test_丢弃运行时完成输出() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mov");
        {
            let ctx = RuntimeContext::new().unwrap();
            let handle = ctx.open_encoder(4, 4, &path, "rgb24").unwrap();
            ctx.encode_bytes(handle, &[0u8; 48]).unwrap();
        }
        let ctx = RuntimeContext::new().unwrap();
        let (dec, _, _) = ctx.open_decoder(&path, 0, 0).unwrap();
        assert_eq!(ctx.session_kind(dec).unwrap(), SessionKind::Decoder);
    }

    #[test]
    fn test_配置错误() {
        let cfg = RuntimeConfig {
            video_codec: "vp9".into(),
            ..Default::default()
        };
        assert!(matches!(RuntimeContext::with_config(cfg), Err(BridgeError::Init(_))));
        assert!(matches!(
            RuntimeContext::with_registries(
                RuntimeConfig::default(),
                CodecRegistry::new(),
                FormatRegistry::new()
            ),
            Err(BridgeError::Init(_))
        ));
    }

    #[test]
    fn test_上下文可跨线程共享() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<RuntimeContext>();
    }
}
