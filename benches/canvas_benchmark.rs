//! Canvas benchmark: the drawing primitives behind every animation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use matrixd::animation::StatusDisplay;
use matrixd::{Canvas, Font, Rgb};
use std::sync::Arc;

fn canvas_clear(c: &mut Criterion) {
    let mut canvas = Canvas::new(64, 64);
    canvas.fill(Rgb::WHITE);

    c.bench_function("canvas_clear_64x64", |b| {
        b.iter(|| black_box(&mut canvas).clear())
    });
}

fn canvas_fill_circle(c: &mut Criterion) {
    let mut canvas = Canvas::new(64, 64);

    c.bench_function("canvas_fill_circle_r24", |b| {
        b.iter(|| canvas.fill_circle(black_box(32), black_box(32), 24, Rgb::new(255, 255, 0)))
    });
}

fn canvas_draw_text(c: &mut Criterion) {
    let font = Font::builtin();
    let mut canvas = Canvas::new(64, 64);

    c.bench_function("canvas_draw_text", |b| {
        b.iter(|| {
            canvas.draw_text(
                &font,
                black_box(-10),
                34,
                Rgb::new(0, 255, 255),
                "Thanks for the sub!",
            )
        })
    });
}

fn status_draw(c: &mut Criterion) {
    let font = Arc::new(Font::builtin());
    let status = StatusDisplay::new(Arc::clone(&font), font);
    let mut canvas = Canvas::new(64, 64);

    c.bench_function("status_draw", |b| {
        b.iter(|| {
            canvas.clear();
            status.draw(&mut canvas, black_box(1234), Rgb::WHITE, Rgb::new(255, 0, 0));
        })
    });
}

criterion_group!(
    benches,
    canvas_clear,
    canvas_fill_circle,
    canvas_draw_text,
    status_draw,
);
criterion_main!(benches);
