//! # avbridge-ffi
//!
//! C ABI 边界. 运行时以不透明指针传递, 会话以 `u64` 句柄传递.
//!
//! 返回值约定:
//! - `0`: 成功
//! - `1`: (仅 `avb_decode_frame`) 已输出一帧
//! - 负数: 失败, 取值见 [`BridgeError::code`], 详细信息由
//!   [`avb_last_error_message`] 取得
//!
//! 所有导出函数都不会跨边界展开 panic, 空指针与非 UTF-8 字符串都作为错误返回.

use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr;
use std::sync::Once;

use log::{debug, error};

use avbridge_session::{
    BridgeError, BridgeResult, DecodeStatus, RuntimeConfig, RuntimeContext, SessionHandle,
};

/// 不透明的运行时
pub struct AvbRuntime {
    ctx: RuntimeContext,
}

/// 成功
pub const AVB_OK: i32 = 0;
/// `avb_decode_frame` 已输出一帧
pub const AVB_FRAME_PRODUCED: i32 = 1;
/// `avb_decode_frame` 流已结束
pub const AVB_END_OF_STREAM: i32 = 0;

const VERSION: &CStr = match CStr::from_bytes_with_nul(
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes(),
) {
    Ok(v) => v,
    Err(_) => c"unknown",
};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

static LOGGER: Once = Once::new();

/// 初始化 env_logger, 读取 `AVBRIDGE_LOG`, 默认 warn
fn init_logging() {
    LOGGER.call_once(|| {
        let env = env_logger::Env::default().filter_or("AVBRIDGE_LOG", "warn");
        // 宿主可能已安装了自己的 logger
        let _ = env_logger::Builder::from_env(env).try_init();
    });
}

fn set_last_error(err: &BridgeError) {
    let message = format!("{}: {err}", err.name()).replace('\0', " ");
    LAST_ERROR.with(|slot| *slot.borrow_mut() = CString::new(message).ok());
}

/// 执行 `f`, 把错误和 panic 转为状态码
fn status(f: impl FnOnce() -> BridgeResult<i32>) -> i32 {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(code)) => code,
        Ok(Err(err)) => {
            debug!("FFI 调用失败: {err}");
            set_last_error(&err);
            err.code()
        }
        Err(_) => {
            let err = BridgeError::CodecRuntimeFailure("调用过程中发生 panic".into());
            error!("{err}");
            set_last_error(&err);
            err.code()
        }
    }
}

/// 借用运行时
///
/// # Safety
/// `rt` 为空或是 `avb_runtime_create*` 返回且尚未销毁的指针.
unsafe fn runtime<'a>(rt: *const AvbRuntime) -> BridgeResult<&'a RuntimeContext> {
    // SAFETY: 调用方保证非空指针有效
    unsafe { rt.as_ref() }
        .map(|rt| &rt.ctx)
        .ok_or_else(|| BridgeError::InvalidArgument("运行时指针为空".into()))
}

/// # Safety
/// `s` 为空或指向以 NUL 结尾的字符串.
unsafe fn utf8<'a>(s: *const c_char, what: &str) -> BridgeResult<&'a str> {
    if s.is_null() {
        return Err(BridgeError::InvalidArgument(format!("{what} 为空指针")));
    }
    // SAFETY: 非空, 调用方保证以 NUL 结尾
    unsafe { CStr::from_ptr(s) }
        .to_str()
        .map_err(|_| BridgeError::InvalidArgument(format!("{what} 不是有效的 UTF-8")))
}

fn runtime_from(result: BridgeResult<RuntimeContext>) -> *mut AvbRuntime {
    match result {
        Ok(ctx) => Box::into_raw(Box::new(AvbRuntime { ctx })),
        Err(err) => {
            set_last_error(&err);
            ptr::null_mut()
        }
    }
}

/// 库版本, 静态字符串
#[unsafe(no_mangle)]
pub extern "C" fn avb_version() -> *const c_char {
    VERSION.as_ptr()
}

/// 以默认配置创建运行时, 失败返回空指针
#[unsafe(no_mangle)]
pub extern "C" fn avb_runtime_create() -> *mut AvbRuntime {
    init_logging();
    let result = catch_unwind(RuntimeContext::new);
    runtime_from(result.unwrap_or_else(|_| Err(BridgeError::Init("创建运行时时发生 panic".into()))))
}

/// 以 TOML 配置文本创建运行时, 失败返回空指针
///
/// # Safety
/// `config_toml` 为空或指向以 NUL 结尾的字符串. 为空时使用默认配置.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avb_runtime_create_with_config(
    config_toml: *const c_char,
) -> *mut AvbRuntime {
    init_logging();
    let result = catch_unwind(AssertUnwindSafe(|| {
        let config = if config_toml.is_null() {
            RuntimeConfig::default()
        } else {
            // SAFETY: 非空, 调用方保证以 NUL 结尾
            let text = unsafe { utf8(config_toml, "配置文本") }?;
            RuntimeConfig::from_toml_str(text)?
        };
        RuntimeContext::with_config(config)
    }));
    runtime_from(result.unwrap_or_else(|_| Err(BridgeError::Init("创建运行时时发生 panic".into()))))
}

/// 运行时是否可用; 空指针返回 false
///
/// # Safety
/// 见 [`avb_runtime_destroy`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avb_runtime_is_initialized(rt: *const AvbRuntime) -> bool {
    // SAFETY: 由调用方保证
    unsafe { runtime(rt) }.is_ok_and(RuntimeContext::is_initialized)
}

/// 关闭所有会话并释放运行时; 空指针无操作
///
/// # Safety
/// `rt` 为空或是 `avb_runtime_create*` 返回且尚未销毁的指针. 调用后不能再使用.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avb_runtime_destroy(rt: *mut AvbRuntime) {
    if rt.is_null() {
        return;
    }
    // SAFETY: 指针来自 Box::into_raw, 且只销毁一次
    let runtime = unsafe { Box::from_raw(rt) };
    let _ = catch_unwind(AssertUnwindSafe(move || drop(runtime)));
}

/// 打开编码会话, 句柄写入 `out_handle`
///
/// # Safety
/// `rt` 有效; `path`/`pixel_format` 为以 NUL 结尾的字符串; `out_handle` 可写.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avb_open_encoder(
    rt: *const AvbRuntime,
    width: u32,
    height: u32,
    path: *const c_char,
    pixel_format: *const c_char,
    out_handle: *mut u64,
) -> i32 {
    status(|| {
        // SAFETY: 以下指针由调用方保证有效
        let ctx = unsafe { runtime(rt) }?;
        let path = unsafe { utf8(path, "输出路径") }?;
        let pixel_format = unsafe { utf8(pixel_format, "像素格式") }?;
        if out_handle.is_null() {
            return Err(BridgeError::InvalidArgument("out_handle 为空指针".into()));
        }
        let handle = ctx.open_encoder(width, height, path, pixel_format)?;
        // SAFETY: 非空, 调用方保证可写
        unsafe { out_handle.write(handle.into_raw()) };
        Ok(AVB_OK)
    })
}

/// 编码一帧, `len` 必须等于 高 × 宽 × 每像素字节数
///
/// # Safety
/// `rt` 有效; `data` 指向至少 `len` 个可读字节.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avb_encode_frame(
    rt: *const AvbRuntime,
    handle: u64,
    data: *const u8,
    len: usize,
) -> i32 {
    status(|| {
        // SAFETY: 由调用方保证
        let ctx = unsafe { runtime(rt) }?;
        if data.is_null() {
            return Err(BridgeError::InvalidArgument("帧数据为空指针".into()));
        }
        // SAFETY: 非空, 调用方保证 len 字节可读
        let bytes = unsafe { std::slice::from_raw_parts(data, len) };
        ctx.encode_bytes(SessionHandle::from_raw(handle), bytes)?;
        Ok(AVB_OK)
    })
}

/// 完成输出并释放编码会话
///
/// # Safety
/// `rt` 有效.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avb_close_encoder(rt: *const AvbRuntime, handle: u64) -> i32 {
    status(|| {
        // SAFETY: 由调用方保证
        let ctx = unsafe { runtime(rt) }?;
        ctx.close_encoder(SessionHandle::from_raw(handle))?;
        Ok(AVB_OK)
    })
}

/// 打开解码会话
///
/// `width`/`height` 为输入输出参数: 调用前为请求尺寸 (0 表示不限制),
/// 成功后写回协商后的输出尺寸.
///
/// # Safety
/// `rt` 有效; `path` 以 NUL 结尾; `width`/`height`/`out_handle` 可读写.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avb_open_decoder(
    rt: *const AvbRuntime,
    path: *const c_char,
    width: *mut u32,
    height: *mut u32,
    out_handle: *mut u64,
) -> i32 {
    status(|| {
        // SAFETY: 由调用方保证
        let ctx = unsafe { runtime(rt) }?;
        let path = unsafe { utf8(path, "输入路径") }?;
        if width.is_null() || height.is_null() || out_handle.is_null() {
            return Err(BridgeError::InvalidArgument("宽高或句柄指针为空".into()));
        }
        // SAFETY: 非空, 调用方保证可读写
        let (requested_w, requested_h) = unsafe { (width.read(), height.read()) };
        let (handle, w, h) = ctx.open_decoder(path, requested_w, requested_h)?;
        // SAFETY: 同上
        unsafe {
            width.write(w);
            height.write(h);
            out_handle.write(handle.into_raw());
        }
        Ok(AVB_OK)
    })
}

/// 解码下一帧到 `data`
///
/// 返回 1 表示已输出一帧, 0 表示流已结束, 负数为错误.
///
/// # Safety
/// `rt` 有效; `data` 指向至少 `len` 个可写字节.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avb_decode_frame(
    rt: *const AvbRuntime,
    handle: u64,
    data: *mut u8,
    len: usize,
) -> i32 {
    status(|| {
        // SAFETY: 由调用方保证
        let ctx = unsafe { runtime(rt) }?;
        if data.is_null() {
            return Err(BridgeError::InvalidArgument("输出缓冲为空指针".into()));
        }
        // SAFETY: 非空, 调用方保证 len 字节可写且无其他别名
        let bytes = unsafe { std::slice::from_raw_parts_mut(data, len) };
        Ok(match ctx.decode_into(SessionHandle::from_raw(handle), bytes)? {
            DecodeStatus::Produced => AVB_FRAME_PRODUCED,
            DecodeStatus::EndOfStream => AVB_END_OF_STREAM,
        })
    })
}

/// 释放解码会话
///
/// # Safety
/// `rt` 有效.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn avb_close_decoder(rt: *const AvbRuntime, handle: u64) -> i32 {
    status(|| {
        // SAFETY: 由调用方保证
        let ctx = unsafe { runtime(rt) }?;
        ctx.close_decoder(SessionHandle::from_raw(handle))?;
        Ok(AVB_OK)
    })
}

/// 当前线程最近一次失败的描述, 没有时返回空指针
///
/// 指针在本线程下一次失败调用之前有效.
#[unsafe(no_mangle)]
pub extern "C" fn avb_last_error_message() -> *const c_char {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(ptr::null(), |s| s.as_ptr()))
}

/// 状态码名称, 静态字符串
#[unsafe(no_mangle)]
pub extern "C" fn avb_error_code_name(code: i32) -> *const c_char {
    let name: &CStr = match code {
        AVB_OK => c"Ok",
        AVB_FRAME_PRODUCED => c"FrameProduced",
        -1 => c"Init",
        -2 => c"UnsupportedFormat",
        -3 => c"InvalidGeometry",
        -4 => c"GeometryMismatch",
        -5 => c"BufferSizeMismatch",
        -6 => c"UnknownHandle",
        -7 => c"WrongSessionKind",
        -8 => c"SourceUnreadable",
        -9 => c"NoVideoStream",
        -10 => c"CodecInitFailure",
        -11 => c"CodecRuntimeFailure",
        -12 => c"InvalidArgument",
        _ => c"Unknown",
    };
    name.as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last_error() -> String {
        let p = avb_last_error_message();
        assert!(!p.is_null());
        unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned()
    }

    #[test]
    fn test_错误码名称与会话层一致() {
        for &(code, name) in BridgeError::CODES {
            let p = avb_error_code_name(code);
            assert_eq!(unsafe { CStr::from_ptr(p) }.to_str().unwrap(), name);
        }
        let p = avb_error_code_name(-99);
        assert_eq!(unsafe { CStr::from_ptr(p) }.to_str().unwrap(), "Unknown");
    }

    #[test]
    fn test_版本字符串() {
        let v = unsafe { CStr::from_ptr(avb_version()) }.to_str().unwrap();
        assert_eq!(v, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_空指针() {
        unsafe {
            assert!(!avb_runtime_is_initialized(ptr::null()));
            assert_eq!(avb_close_encoder(ptr::null(), 1), -12);
            assert!(last_error().contains("InvalidArgument"));
            avb_runtime_destroy(ptr::null_mut());

            let rt = avb_runtime_create();
            assert!(!rt.is_null());
            let mut handle = 0u64;
            assert_eq!(
                avb_open_encoder(rt, 4, 4, ptr::null(), c"rgb24".as_ptr(), &mut handle),
                -12
            );
            assert_eq!(avb_encode_frame(rt, 1, ptr::null(), 0), -12);
            avb_runtime_destroy(rt);
        }
    }

    #[test]
    fn test_配置文本() {
        unsafe {
            let rt = avb_runtime_create_with_config(c"frame_rate = 0".as_ptr());
            assert!(rt.is_null());
            assert!(last_error().starts_with("Init"));

            let rt = avb_runtime_create_with_config(c"frame_rate = 30".as_ptr());
            assert!(!rt.is_null());
            assert!(avb_runtime_is_initialized(rt));
            assert_eq!((*rt).ctx.config().frame_rate, 30);
            avb_runtime_destroy(rt);

            let rt = avb_runtime_create_with_config(ptr::null());
            assert!(!rt.is_null());
            avb_runtime_destroy(rt);
        }
    }

    #[test]
    fn test_非_utf8_路径() {
        unsafe {
            let rt = avb_runtime_create();
            let bad = [0xFFu8, 0xFE, 0];
            let (mut w, mut h, mut handle) = (0u32, 0u32, 0u64);
            let code = avb_open_decoder(rt, bad.as_ptr().cast(), &mut w, &mut h, &mut handle);
            assert_eq!(code, -12);
            assert!(last_error().contains("UTF-8"));
            avb_runtime_destroy(rt);
        }
    }
}
