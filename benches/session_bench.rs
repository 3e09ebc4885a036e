//! avbridge 会话性能基准测试.
//!
//! 覆盖像素格式转换、缩放、以及完整的编码/解码会话.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use avbridge::core::PixelFormat;
use avbridge::scale::{ScaleAlgorithm, ScaleContext};
use avbridge::session::{DecodeStatus, FrameBuffer, RuntimeContext};

/// 创建 RGB24 渐变帧
fn make_rgb24(width: u32, height: u32) -> FrameBuffer<Vec<u8>> {
    let mut frame = FrameBuffer::alloc(width, height, PixelFormat::Rgb24).unwrap();
    let stride = frame.stride();
    for (row, line) in frame.as_bytes_mut().chunks_exact_mut(stride).enumerate() {
        for (col, px) in line.chunks_exact_mut(3).enumerate() {
            px[0] = (col % 256) as u8;
            px[1] = (row % 256) as u8;
            px[2] = ((col + row) % 256) as u8;
        }
    }
    frame
}

fn bench_scale(c: &mut Criterion) {
    let src = make_rgb24(640, 480);
    let mut group = c.benchmark_group("scale");

    let mut ctx = ScaleContext::new(
        640,
        480,
        PixelFormat::Rgb24,
        640,
        480,
        PixelFormat::Yuv420p,
        ScaleAlgorithm::Bilinear,
    )
    .unwrap();
    let mut y = vec![0u8; 640 * 480];
    let mut u = vec![0u8; 320 * 240];
    let mut v = vec![0u8; 320 * 240];
    group.bench_function("rgb24_to_yuv420p_640x480", |b| {
        b.iter(|| {
            let mut dst = [y.as_mut_slice(), u.as_mut_slice(), v.as_mut_slice()];
            ctx.scale(&[src.as_bytes()], &[640 * 3], &mut dst, &[640, 320, 320])
                .unwrap();
            black_box(&dst);
        });
    });

    for algorithm in [ScaleAlgorithm::Nearest, ScaleAlgorithm::Bilinear] {
        let mut ctx = ScaleContext::new(
            640,
            480,
            PixelFormat::Rgb24,
            320,
            240,
            PixelFormat::Rgb24,
            algorithm,
        )
        .unwrap();
        let mut dst = vec![0u8; 320 * 240 * 3];
        group.bench_function(format!("rgb24_640x480_to_320x240_{}", algorithm.name()), |b| {
            b.iter(|| {
                ctx.scale(&[src.as_bytes()], &[640 * 3], &mut [dst.as_mut_slice()], &[320 * 3])
                    .unwrap();
                black_box(&dst);
            });
        });
    }
    group.finish();
}

fn bench_session(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.mp4");
    let runtime = RuntimeContext::new().unwrap();
    let frame = make_rgb24(320, 240);

    let mut group = c.benchmark_group("session");
    group.sample_size(20);

    group.bench_function("encode_30_frames_320x240", |b| {
        b.iter(|| {
            let handle = runtime
                .open_encoder(320, 240, &path, "AV_PIX_FMT_RGB24")
                .unwrap();
            for _ in 0..30 {
                runtime.encode_frame(handle, &frame).unwrap();
            }
            runtime.close_encoder(handle).unwrap();
        });
    });

    group.bench_function("decode_30_frames_to_160x120", |b| {
        b.iter(|| {
            let (handle, w, h) = runtime.open_decoder(&path, 160, 0).unwrap();
            let mut out = FrameBuffer::alloc(w, h, PixelFormat::Rgb24).unwrap();
            let mut frames = 0;
            while runtime.decode_frame(handle, &mut out).unwrap() == DecodeStatus::Produced {
                frames += 1;
            }
            runtime.close_decoder(handle).unwrap();
            black_box(frames);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_scale, bench_session);
criterion_main!(benches);
