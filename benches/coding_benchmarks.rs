//! Codec performance benchmarks
//!
//! Encode and decode throughput for both entropy backends across a few
//! representative resolutions.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ffv1_core::{CodecParams, CoderType, Ffv1Codec, Frame};

/// Create a frame with a textured pattern so the coders do real work.
fn create_test_frame(params: &CodecParams) -> Frame {
    let mut frame = Frame::new(params);
    for plane in frame.planes.iter_mut() {
        for y in 0..plane.height {
            for x in 0..plane.width {
                let v = (x * 13 + y * 7 + (x & y)) & 0xFF;
                plane.set(x, y, v);
            }
        }
    }
    frame
}

fn video_params(width: u32, height: u32, coder: CoderType) -> CodecParams {
    CodecParams {
        width,
        height,
        chroma_h_shift: 1,
        chroma_v_shift: 1,
        num_h_slices: 4,
        num_v_slices: 4,
        coder,
        ..Default::default()
    }
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for &(width, height) in &[(320u32, 240u32), (640, 480), (1280, 720)] {
        let pixels = width as u64 * height as u64;
        group.throughput(Throughput::Elements(pixels));

        for (name, coder) in [
            ("range", CoderType::Range),
            ("rice", CoderType::GolombRice),
        ] {
            let params = video_params(width, height, coder);
            let mut codec = Ffv1Codec::new(params.clone()).unwrap();
            let frame = create_test_frame(&params);

            group.bench_with_input(
                BenchmarkId::new(name, format!("{width}x{height}")),
                &frame,
                |b, frame| {
                    b.iter(|| black_box(codec.encode_frame(frame).unwrap()));
                },
            );
        }
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for &(width, height) in &[(320u32, 240u32), (640, 480), (1280, 720)] {
        let pixels = width as u64 * height as u64;
        group.throughput(Throughput::Elements(pixels));

        for (name, coder) in [
            ("range", CoderType::Range),
            ("rice", CoderType::GolombRice),
        ] {
            let params = video_params(width, height, coder);
            let mut codec = Ffv1Codec::new(params.clone()).unwrap();
            let frame = create_test_frame(&params);
            let packets = codec.encode_frame(&frame).unwrap();
            let mut out = Frame::new(&params);

            group.bench_with_input(
                BenchmarkId::new(name, format!("{width}x{height}")),
                &packets,
                |b, packets| {
                    b.iter(|| {
                        codec.decode_frame(packets, &mut out).unwrap();
                        black_box(&out);
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
