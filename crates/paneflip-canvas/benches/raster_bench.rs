//! Rasterizer throughput on a display-sized canvas.
//!
//! Run with:
//! `cargo bench -p paneflip-canvas --bench raster_bench`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use paneflip_canvas::{Bezier2, Canvas, Circle, Color, Rect, RectCopy, dump_rgba};
use std::hint::black_box;

const W: u16 = 1920;
const H: u16 = 1080;
const INK: Color = Color::rgb(0x22, 0x22, 0x88);

fn bench_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("raster/fill");
    group.throughput(Throughput::Bytes(u64::from(W) * u64::from(H) * 4));
    let mut canvas = Canvas::bgra(W, H);
    group.bench_function("1080p", |b| {
        b.iter(|| {
            canvas.fill(black_box(INK));
            black_box(canvas.as_bytes()[0]);
        });
    });
    group.finish();
}

fn bench_shapes(c: &mut Criterion) {
    let mut group = c.benchmark_group("raster/shapes");
    let mut canvas = Canvas::bgra(W, H);

    for r in [16u16, 128, 512] {
        group.bench_with_input(BenchmarkId::new("circle", r), &r, |b, &r| {
            b.iter(|| canvas.draw_circle(black_box(&Circle::new(960, 540, r)), INK));
        });
    }

    group.bench_function("rect_clipped", |b| {
        b.iter(|| canvas.draw_rect(black_box(&Rect::new(1500, 800, 1000, 1000)), INK));
    });

    group.bench_function("bezier_cross", |b| {
        let curve = Bezier2::new((0, 1079), (960, -1080), (1919, 1079));
        b.iter(|| canvas.draw_bezier2(black_box(&curve), INK));
    });

    group.bench_function("copy_rect_overlap", |b| {
        let copy = RectCopy {
            dst_x: 10,
            dst_y: 10,
            src_x: 0,
            src_y: 0,
            w: 1024,
            h: 768,
        };
        b.iter(|| canvas.copy_rect(black_box(&copy)));
    });

    group.finish();
}

fn bench_dump(c: &mut Criterion) {
    let mut canvas = Canvas::bgra(W, H);
    canvas.fill(INK);
    c.bench_function("dump/rgba_1080p", |b| {
        b.iter(|| black_box(dump_rgba(&canvas).map(|v| v.len())));
    });
}

criterion_group!(benches, bench_fill, bench_shapes, bench_dump);
criterion_main!(benches);
