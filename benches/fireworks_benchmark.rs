//! Fireworks benchmark: one simulation tick at the matrix resolution.
//!
//! Target: well under the 40ms frame interval

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use matrixd::animation::{FireworkShow, Particle, PhysicsParams};
use matrixd::{Canvas, Rgb, RuntimeConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

fn show(config: &RuntimeConfig) -> FireworkShow {
    FireworkShow::with_rng(
        PhysicsParams::from(config),
        Duration::from_secs(5),
        64,
        64,
        StdRng::seed_from_u64(7),
    )
}

fn fireworks_tick_default(c: &mut Criterion) {
    let config = RuntimeConfig::default();
    let mut canvas = Canvas::new(64, 64);
    let mut show = show(&config);
    // Warm the sky up so rockets, sparks and trails are all in flight.
    for _ in 0..100 {
        show.tick(&mut canvas);
    }

    c.bench_function("fireworks_tick_default", |b| {
        b.iter(|| {
            canvas.clear();
            show.tick(black_box(&mut canvas));
        })
    });
}

fn fireworks_tick_crowded(c: &mut Criterion) {
    let config = RuntimeConfig {
        max_rockets: 20,
        rocket_spawn_chance: 1.0,
        ..RuntimeConfig::default()
    };
    let mut canvas = Canvas::new(64, 64);
    let mut show = show(&config);
    for _ in 0..100 {
        show.tick(&mut canvas);
    }

    c.bench_function("fireworks_tick_crowded", |b| {
        b.iter(|| {
            canvas.clear();
            show.tick(black_box(&mut canvas));
        })
    });
}

fn rocket_explode(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    c.bench_function("rocket_explode", |b| {
        b.iter(|| {
            let rocket = Particle::rocket(32.0, 20.0, 0.0, Rgb::WHITE, 0);
            black_box(rocket.explode(&mut rng, 40))
        })
    });
}

criterion_group!(
    benches,
    fireworks_tick_default,
    fireworks_tick_crowded,
    rocket_explode,
);
criterion_main!(benches);
