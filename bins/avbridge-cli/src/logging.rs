//! 日志初始化.
//!
//! 控制台输出彩色简洁格式, 文件输出按天滚动到 `<dir>/avbridge.<日期>.log`.
//! 级别由 `-v` 次数决定 (0=info, 1=debug, 2+=trace), `AVBRIDGE_LOG` 可覆盖.
//! 库内部通过 `log` 门面打出的记录经 tracing-log 桥接到同一个订阅者.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// 环境变量名
pub const LOG_ENV: &str = "AVBRIDGE_LOG";

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// 对应 `-v` 次数的默认过滤级别
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level_for(verbosity)))
}

/// 安装全局订阅者, 重复调用返回错误
pub fn init(log_dir: &Path, verbosity: u8) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("创建日志目录 {}", log_dir.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("avbridge")
        .filename_suffix("log")
        .build(log_dir)
        .context("创建日志文件")?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let console = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(LineFormat { color: true })
        .with_filter(filter(verbosity));
    let file = fmt::Layer::default()
        .with_writer(writer)
        .with_ansi(false)
        .event_format(LineFormat { color: false })
        .with_filter(filter(verbosity));

    Registry::default()
        .with(console)
        .with(file)
        .try_init()
        .context("安装日志订阅者")?;
    // 订阅者已安装, guard 须活到进程结束
    let _ = FILE_GUARD.set(guard);
    Ok(())
}

/// `[时:分:秒.毫秒] 级别 > 消息`
struct LineFormat {
    color: bool,
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let level = *event.metadata().level();
        let (start, end) = if self.color {
            let code = match level {
                tracing::Level::ERROR => "\x1b[31m",
                tracing::Level::WARN => "\x1b[33m",
                tracing::Level::INFO => "\x1b[32m",
                _ => "\x1b[34m",
            };
            (code, "\x1b[0m")
        } else {
            ("", "")
        };
        write!(
            writer,
            "[{}] {start}{level:5}{end} > ",
            Local::now().format("%H:%M:%S%.3f")
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
