//! 容器层集成测试.
//!
//! 检查编码会话产出的文件在容器层面是否正确:
//! 1. 轨道参数与样本表
//! 2. 扩展名选择容器, 未知扩展名回退到默认容器
//! 3. 解封装出的数据包可以被 rawvideo 解码器还原

use std::path::Path;

use avbridge::codec::{CodecId, Decoder, VideoFrame};
use avbridge::core::{AvError, MediaType, PixelFormat, Rational};
use avbridge::format::{Demuxer, FormatId, IoContext};
use avbridge::session::{FrameBuffer, RuntimeConfig, RuntimeContext};

// ========================
// 辅助函数
// ========================

fn encode_clip(ctx: &RuntimeContext, path: &Path, w: u32, h: u32, frames: u32) {
    let handle = ctx.open_encoder(w, h, path, "AV_PIX_FMT_RGB24").unwrap();
    let mut frame = FrameBuffer::alloc(w, h, PixelFormat::Rgb24).unwrap();
    for i in 0..frames {
        frame.as_bytes_mut().fill((i * 30 % 256) as u8);
        ctx.encode_frame(handle, &frame).unwrap();
    }
    ctx.close_encoder(handle).unwrap();
}

fn open_demuxer(path: &Path) -> (IoContext, Box<dyn Demuxer>) {
    let formats = avbridge::default_format_registry();
    let mut io = IoContext::open_read(path).unwrap();
    let name = path.file_name().and_then(|n| n.to_str());
    let demuxer = formats.open_input(&mut io, name).unwrap();
    (io, demuxer)
}

/// 读出全部数据包直到 Eof
fn read_all(io: &mut IoContext, demuxer: &mut dyn Demuxer) -> Vec<avbridge::codec::Packet> {
    let mut packets = Vec::new();
    loop {
        match demuxer.read_packet(io) {
            Ok(pkt) => packets.push(pkt),
            Err(AvError::Eof) => return packets,
            Err(e) => panic!("读取数据包失败: {e}"),
        }
    }
}

// ========================
// 测试
// ========================

#[test]
fn test_轨道参数() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("track.mp4");
    let ctx = RuntimeContext::new().unwrap();
    encode_clip(&ctx, &path, 48, 32, 50);

    let (mut io, mut demuxer) = open_demuxer(&path);
    assert_eq!(demuxer.format_id(), FormatId::Mp4);
    let streams = demuxer.streams();
    assert_eq!(streams.len(), 1);
    let stream = &streams[0];
    assert_eq!(stream.media_type, MediaType::Video);
    assert_eq!(stream.codec_id, CodecId::RawVideo);
    assert_eq!(stream.time_base, Rational::new(1, 25));
    assert_eq!(stream.nb_frames, 50);
    let video = stream.video_params().unwrap();
    assert_eq!((video.width, video.height), (48, 32));
    assert_eq!(video.pixel_format, PixelFormat::Yuv420p);

    let duration = demuxer.duration().unwrap();
    assert!((duration - 2.0).abs() < 1e-3, "时长 {duration}");

    let frame_size = PixelFormat::Yuv420p.frame_size(48, 32).unwrap();
    let packets = read_all(&mut io, demuxer.as_mut());
    assert_eq!(packets.len(), 50);
    for (i, pkt) in packets.iter().enumerate() {
        assert_eq!(pkt.size(), frame_size);
        assert_eq!(pkt.pts, i as i64);
        assert!(pkt.is_keyframe);
    }
}

#[test]
fn test_帧率来自配置() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fps.mp4");
    let config = RuntimeConfig {
        frame_rate: 60,
        ..Default::default()
    };
    let ctx = RuntimeContext::with_config(config).unwrap();
    encode_clip(&ctx, &path, 16, 16, 30);

    let (_io, demuxer) = open_demuxer(&path);
    assert_eq!(demuxer.streams()[0].time_base, Rational::new(1, 60));
    let duration = demuxer.duration().unwrap();
    assert!((duration - 0.5).abs() < 1e-3, "时长 {duration}");
}

#[test]
fn test_扩展名选择容器() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = RuntimeContext::new().unwrap();

    let mov = dir.path().join("clip.MOV");
    encode_clip(&ctx, &mov, 16, 16, 3);
    let head = std::fs::read(&mov).unwrap();
    assert_eq!(&head[4..8], b"ftyp");
    assert_eq!(&head[8..12], b"qt  ");

    // 未知扩展名写默认容器
    let other = dir.path().join("clip.bin");
    encode_clip(&ctx, &other, 16, 16, 3);
    let head = std::fs::read(&other).unwrap();
    assert_eq!(&head[8..12], b"isom");
    let (mut io, mut demuxer) = open_demuxer(&other);
    assert_eq!(demuxer.format_id(), FormatId::Mp4);
    assert_eq!(read_all(&mut io, demuxer.as_mut()).len(), 3);
}

#[test]
fn test_数据包可被解码() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("decode.mp4");
    let ctx = RuntimeContext::new().unwrap();
    encode_clip(&ctx, &path, 16, 8, 4);

    let (mut io, mut demuxer) = open_demuxer(&path);
    let params = demuxer.streams()[0].codec_parameters();
    let codecs = avbridge::default_codec_registry();
    let mut decoder: Box<dyn Decoder> = codecs.create_decoder(CodecId::RawVideo).unwrap();
    decoder.open(&params).unwrap();

    let mut frames: Vec<VideoFrame> = Vec::new();
    for pkt in read_all(&mut io, demuxer.as_mut()) {
        decoder.send_packet(&pkt).unwrap();
        while let Ok(frame) = decoder.receive_frame() {
            frames.push(frame);
        }
    }
    assert_eq!(frames.len(), 4);
    for frame in &frames {
        assert_eq!((frame.width, frame.height), (16, 8));
        assert_eq!(frame.pixel_format, PixelFormat::Yuv420p);
    }
    // 亮度平面随帧序号单调变化
    let lumas: Vec<u8> = frames.iter().map(|f| f.data[0][0]).collect();
    assert!(lumas.windows(2).all(|p| p[0] < p[1]), "亮度: {lumas:?}");
}
