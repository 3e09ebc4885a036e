//! avbridge-cli - 会话桥命令行驱动
//!
//! - `encode`: 把动画棋盘格编码到容器
//! - `decode`: 解码并统计帧数
//! - `roundtrip`: 先编码再解码, 校验帧数与尺寸
//! - `formats`: 列出像素格式、编解码器与容器

mod logging;
mod pattern;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, ensure};
use clap::{Args, Parser, Subcommand};
use log::{debug, info, warn};
use serde::Serialize;

use avbridge_codec::CodecRegistry;
use avbridge_core::pixel_registry;
use avbridge_format::FormatRegistry;
use avbridge_session::{DecodeStatus, FrameBuffer, RuntimeConfig, RuntimeContext};

#[derive(Parser, Debug)]
#[command(name = "avbridge-cli", version, about = "avbridge 编码/解码会话驱动")]
struct Cli {
    /// TOML 配置文件
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 日志目录
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 编码动画棋盘格
    Encode(EncodeArgs),
    /// 解码并统计帧数
    Decode(DecodeArgs),
    /// 编码后再解码, 校验帧数与输出尺寸
    Roundtrip {
        #[command(flatten)]
        encode: EncodeArgs,
        /// 解码请求宽度 (0 表示不限制)
        #[arg(long, default_value_t = 100)]
        decode_width: u32,
        /// 解码请求高度 (0 表示不限制)
        #[arg(long, default_value_t = 0)]
        decode_height: u32,
    },
    /// 列出支持的格式
    Formats {
        /// 输出 JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// 输出路径, 扩展名决定容器
    #[arg(default_value = "checkerboard.mp4")]
    output: PathBuf,
    #[arg(long, default_value_t = 256)]
    width: u32,
    #[arg(long, default_value_t = 256)]
    height: u32,
    #[arg(long, default_value_t = 300)]
    frames: u32,
    /// 输入像素格式名称
    #[arg(long, default_value = "AV_PIX_FMT_RGB24")]
    pix_fmt: String,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    input: PathBuf,
    /// 请求宽度 (0 表示不限制)
    #[arg(long, default_value_t = 100)]
    width: u32,
    /// 请求高度 (0 表示不限制)
    #[arg(long, default_value_t = 0)]
    height: u32,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init(&cli.log_dir, cli.verbose) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }
    if let Err(e) = run(cli) {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let command = match cli.command {
        Command::Formats { json } => return print_formats(json),
        command => command,
    };
    let config = match &cli.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    let ctx = RuntimeContext::with_config(config).context("创建运行时")?;
    execute(&ctx, command)?;
    ctx.shutdown()?;
    Ok(())
}

fn execute(ctx: &RuntimeContext, command: Command) -> Result<()> {
    match command {
        Command::Encode(args) => {
            encode(ctx, &args)?;
        }
        Command::Decode(args) => {
            let (frames, w, h) = decode(ctx, &args.input, args.width, args.height)?;
            println!("{}: {w}x{h}, {frames} 帧", args.input.display());
        }
        Command::Roundtrip {
            encode: args,
            decode_width,
            decode_height,
        } => {
            let written = encode(ctx, &args)?;
            let (decoded, w, h) = decode(ctx, &args.output, decode_width, decode_height)?;
            ensure!(
                decoded == written,
                "帧数不一致: 编码 {written}, 解码 {decoded}"
            );
            let expected = expected_geometry(args.width, args.height, decode_width, decode_height);
            ensure!(
                (w, h) == expected,
                "输出尺寸 {w}x{h} 与预期 {}x{} 不一致",
                expected.0,
                expected.1
            );
            println!("往返成功: {decoded} 帧, {w}x{h}");
        }
        Command::Formats { json } => print_formats(json)?,
    }
    Ok(())
}

fn encode(ctx: &RuntimeContext, args: &EncodeArgs) -> Result<u64> {
    let descriptor = pixel_registry::resolve(&args.pix_fmt)?;
    let handle = ctx
        .open_encoder(args.width, args.height, &args.output, &args.pix_fmt)
        .with_context(|| format!("打开编码会话 {}", args.output.display()))?;
    info!(
        "编码 {} 帧 {}x{} {} → {}",
        args.frames,
        args.width,
        args.height,
        descriptor.ffmpeg_name,
        args.output.display()
    );

    let mut frame = FrameBuffer::alloc(args.width, args.height, descriptor.format)?;
    let bpp = descriptor.bytes_per_pixel() as usize;
    for i in 0..args.frames as usize {
        pattern::fill_checkerboard(
            frame.as_bytes_mut(),
            args.width as usize,
            args.height as usize,
            bpp,
            i,
        );
        if let Err(e) = ctx.encode_frame(handle, &frame) {
            if let Err(close_err) = ctx.close_encoder(handle) {
                warn!("关闭失败的编码会话: {close_err}");
            }
            return Err(e).with_context(|| format!("编码第 {i} 帧"));
        }
    }
    let written = ctx.encoder_frame_count(handle)?;
    ctx.close_encoder(handle).context("完成输出")?;
    info!("已写入 {written} 帧");
    Ok(written)
}

fn decode(ctx: &RuntimeContext, input: &Path, width: u32, height: u32) -> Result<(u64, u32, u32)> {
    let (handle, w, h) = ctx
        .open_decoder(input, width, height)
        .with_context(|| format!("打开解码会话 {}", input.display()))?;
    let (_, _, format) = ctx.decoder_output_geometry(handle)?;
    info!("解码 {} → {w}x{h} {format}", input.display());

    let mut out = FrameBuffer::alloc(w, h, format)?;
    let mut frames = 0u64;
    loop {
        match ctx.decode_frame(handle, &mut out) {
            Ok(DecodeStatus::Produced) => {
                frames += 1;
                if frames % 100 == 0 {
                    debug!("已解码 {frames} 帧");
                }
            }
            Ok(DecodeStatus::EndOfStream) => break,
            Err(e) => {
                let _ = ctx.close_decoder(handle);
                return Err(e).context(format!("解码第 {frames} 帧"));
            }
        }
    }
    ctx.close_decoder(handle)?;
    Ok((frames, w, h))
}

/// 与解码会话相同的尺寸协商, 用于往返校验
fn expected_geometry(src_w: u32, src_h: u32, req_w: u32, req_h: u32) -> (u32, u32) {
    avbridge_session::geometry::resolve_output_geometry(src_w, src_h, req_w, req_h)
        .unwrap_or((0, 0))
}

#[derive(Serialize)]
struct PixelFormatEntry {
    name: &'static str,
    ffmpeg_name: &'static str,
    channels: u32,
    bytes_per_pixel: u32,
    order: String,
    packed: bool,
}

#[derive(Serialize)]
struct FormatsReport {
    pixel_formats: Vec<PixelFormatEntry>,
    encoders: Vec<String>,
    decoders: Vec<String>,
    muxers: Vec<String>,
    demuxers: Vec<String>,
}

fn print_formats(json: bool) -> Result<()> {
    let mut codecs = CodecRegistry::new();
    avbridge_codec::register_all(&mut codecs);
    let mut formats = FormatRegistry::new();
    avbridge_format::register_all(&mut formats);

    let report = FormatsReport {
        pixel_formats: pixel_registry::supported_formats()
            .map(|d| PixelFormatEntry {
                name: d.format.name(),
                ffmpeg_name: d.ffmpeg_name,
                channels: d.channels,
                bytes_per_pixel: d.bytes_per_pixel(),
                order: d.order.to_string(),
                packed: d.is_packed(),
            })
            .collect(),
        encoders: names(codecs.list_encoders()),
        decoders: names(codecs.list_decoders()),
        muxers: names(formats.list_muxers()),
        demuxers: names(formats.list_demuxers()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("像素格式:");
    for pf in &report.pixel_formats {
        println!(
            "  {:<8} {:<20} {} 通道 {:<4} {}",
            pf.name,
            pf.ffmpeg_name,
            pf.channels,
            pf.order,
            if pf.packed { "packed" } else { "planar" }
        );
    }
    println!("编码器: {}", report.encoders.join(", "));
    println!("解码器: {}", report.decoders.join(", "));
    println!("封装器: {}", report.muxers.join(", "));
    println!("解封装器: {}", report.demuxers.join(", "));
    Ok(())
}

fn names<T>(list: Vec<(T, &str)>) -> Vec<String> {
    list.into_iter().map(|(_, name)| name.to_string()).collect()
}
