//! Benchmarks for the recording and playback hot paths
//!
//! Run with: cargo bench --bench loop_core

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use gridloop::compositor::{Compositor, FrameProducer, SharedProducer};
use gridloop::playback::OutputFormat;
use gridloop::{Frame, FrameBuffer, GridCompositor, GridLayout, PlaybackLoop, PlaybackSlot};
use parking_lot::Mutex;
use std::hint::black_box;
use std::sync::Arc;

fn filled_buffer(frames: usize) -> FrameBuffer {
    let mut buffer = FrameBuffer::new(frames).unwrap();
    let frame = Frame::solid_bgra(320, 180, [40, 80, 120, 255]);
    for i in 0..frames as u64 {
        buffer.write_frame(frame.clone().with_sequence(i));
    }
    buffer
}

fn bench_buffer_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer/write");
    let frame = Frame::solid_bgra(320, 180, [0, 0, 0, 255]);

    for capacity in [30, 60, 240] {
        group.bench_with_input(
            BenchmarkId::new("overflowing", capacity),
            &capacity,
            |b, &capacity| {
                b.iter_batched(
                    || filled_buffer(capacity),
                    |mut buffer| {
                        for _ in 0..capacity {
                            buffer.write_frame(black_box(frame.clone()));
                        }
                        buffer
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_palindrome_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("playback/advance");

    for frames in [2, 60, 240] {
        let buffer = filled_buffer(frames);
        group.bench_with_input(BenchmarkId::new("frames", frames), &buffer, |b, buffer| {
            let mut lp = PlaybackLoop::new(buffer);
            b.iter(|| {
                lp.advance();
                black_box(lp.current_index())
            })
        });
    }

    group.finish();
}

fn bench_pull_frame(c: &mut Criterion) {
    c.bench_function("playback/pull_next_frame", |b| {
        let mut slot = PlaybackSlot::new(1, filled_buffer(60), OutputFormat::default()).unwrap();
        b.iter(|| black_box(slot.pull_frame()))
    });
}

fn bench_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("compositor/composite");

    for loops in [1, 10, 20] {
        let mut compositor = GridCompositor::new(GridLayout::default());
        for cell in 1..=loops {
            let slot = PlaybackSlot::new(cell, filled_buffer(30), OutputFormat::default()).unwrap();
            let producer: SharedProducer = Arc::new(Mutex::new(slot));
            let geometry = compositor.cell_geometry(cell).unwrap();
            compositor.attach_producer(cell, producer, geometry).unwrap();
        }
        group.bench_function(BenchmarkId::new("loops", loops), |b| {
            b.iter(|| black_box(compositor.composite()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_buffer_write,
    bench_palindrome_advance,
    bench_pull_frame,
    bench_composite,
);

criterion_main!(benches);
