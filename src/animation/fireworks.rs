//! Fireworks: a small particle engine.
//!
//! Rockets launch from the bottom edge, climb against gravity and burst
//! into sparks at their apex (or when their fuse runs out). Each rocket
//! leaves a short trail behind it. Sparks and trails fade linearly with
//! their remaining lifespan.
//!
//! Everything in flight is dropped when the show's time is up; nothing is
//! drained.

use super::{Animation, Flow};
use crate::canvas::{Canvas, Rgb};
use crate::config::RuntimeConfig;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use std::f64::consts::TAU;
use std::time::Duration;

const FRAME_INTERVAL: Duration = Duration::from_millis(40);

/// What a particle is, which decides how it moves and ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    /// Climbing rocket; explodes into sparks.
    Rocket,
    /// Explosion spark; falls and fades.
    Spark,
    /// Stationary trail pixel left behind a rocket.
    Trail,
}

/// A point mass with a lifespan counted in ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Horizontal position in pixels.
    pub x: f64,
    /// Vertical position in pixels (grows downward).
    pub y: f64,
    /// Horizontal velocity in pixels per tick.
    pub vx: f64,
    /// Vertical velocity in pixels per tick.
    pub vy: f64,
    /// Base color before fading.
    pub color: Rgb,
    /// Remaining ticks.
    pub lifespan: u32,
    /// Particle kind.
    pub kind: ParticleKind,
}

impl Particle {
    /// A free-moving spark.
    pub const fn spark(x: f64, y: f64, vx: f64, vy: f64, color: Rgb, lifespan: u32) -> Self {
        Self {
            x,
            y,
            vx,
            vy,
            color,
            lifespan,
            kind: ParticleKind::Spark,
        }
    }

    /// A rocket climbing straight up with vertical velocity `vy`.
    pub const fn rocket(x: f64, y: f64, vy: f64, color: Rgb, lifespan: u32) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy,
            color,
            lifespan,
            kind: ParticleKind::Rocket,
        }
    }

    /// A trail pixel at a fixed position.
    pub const fn trail(x: f64, y: f64, color: Rgb, lifespan: u32) -> Self {
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            color,
            lifespan,
            kind: ParticleKind::Trail,
        }
    }

    /// Advance one tick: move, apply gravity, burn one tick of lifespan.
    #[inline]
    pub fn advance(&mut self, gravity: f64) {
        self.x += self.vx;
        self.y += self.vy;
        self.vy += gravity;
        self.lifespan = self.lifespan.saturating_sub(1);
    }

    /// Whether the particle has ticks left.
    #[inline]
    pub const fn is_alive(&self) -> bool {
        self.lifespan > 0
    }

    /// A rocket explodes when its fuse is out or it stopped climbing.
    #[inline]
    pub fn should_explode(&self) -> bool {
        self.kind == ParticleKind::Rocket && (!self.is_alive() || self.vy >= 0.0)
    }

    /// Burst into 50-80 sparks flying out in random directions.
    pub fn explode(self, rng: &mut impl RngExt, spark_lifespan: u32) -> Vec<Self> {
        let count = rng.random_range(50..=80);
        (0..count)
            .map(|_| {
                let angle = rng.random_range(0.0..TAU);
                let speed = rng.random_range(0.5..4.5);
                let color = Rgb::new(
                    rng.random_range(100..=255),
                    rng.random_range(100..=255),
                    rng.random_range(100..=255),
                );
                Self::spark(
                    self.x,
                    self.y,
                    angle.cos() * speed,
                    angle.sin() * speed,
                    color,
                    spark_lifespan,
                )
            })
            .collect()
    }

    /// Remaining fraction of `full_lifespan`.
    #[inline]
    pub fn fade(&self, full_lifespan: u32) -> f32 {
        if full_lifespan == 0 {
            return 0.0;
        }
        self.lifespan as f32 / full_lifespan as f32
    }
}

/// Physics and drawing parameters copied out of [`RuntimeConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsParams {
    /// Downward acceleration per tick.
    pub gravity: f64,
    /// Rocket cap.
    pub max_rockets: usize,
    /// Launch probability per tick.
    pub spawn_chance: f64,
    /// Rocket fuse in ticks.
    pub rocket_lifespan: u32,
    /// Spark lifespan in ticks.
    pub spark_lifespan: u32,
    /// Trail lifespan in ticks.
    pub trail_lifespan: u32,
    /// Rocket glyph size.
    pub rocket_size: u32,
    /// Spark glyph size.
    pub spark_size: u32,
    /// Trail glyph size.
    pub trail_size: u32,
}

impl From<&RuntimeConfig> for PhysicsParams {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            gravity: config.gravity,
            max_rockets: config.max_rockets as usize,
            spawn_chance: config.rocket_spawn_chance.clamp(0.0, 1.0),
            rocket_lifespan: config.rocket_lifespan,
            spark_lifespan: config.particle_lifespan,
            trail_lifespan: config.trail_lifespan,
            rocket_size: config.rocket_size,
            spark_size: config.particle_size,
            trail_size: config.trail_size,
        }
    }
}

/// A timed fireworks show.
#[derive(Debug)]
pub struct FireworkShow {
    params: PhysicsParams,
    duration: Duration,
    width: u16,
    height: u16,
    rockets: Vec<Particle>,
    sparks: Vec<Particle>,
    trails: Vec<Particle>,
    rng: StdRng,
}

impl FireworkShow {
    /// Create an empty sky of `width`×`height` pixels.
    pub fn new(params: PhysicsParams, duration: Duration, width: u16, height: u16) -> Self {
        Self::with_rng(params, duration, width, height, StdRng::seed_from_u64(rand::random()))
    }

    /// Create a show whose physics come from a config snapshot.
    pub fn from_config(config: &RuntimeConfig, duration: Duration, width: u16, height: u16) -> Self {
        Self::new(PhysicsParams::from(config), duration, width, height)
    }

    /// Create a show with a fixed random source.
    pub const fn with_rng(
        params: PhysicsParams,
        duration: Duration,
        width: u16,
        height: u16,
        rng: StdRng,
    ) -> Self {
        Self {
            params,
            duration,
            width,
            height,
            rockets: Vec::new(),
            sparks: Vec::new(),
            trails: Vec::new(),
            rng,
        }
    }

    /// Gravity this show runs with.
    pub const fn gravity(&self) -> f64 {
        self.params.gravity
    }

    /// Rockets, sparks and trails currently alive.
    pub fn live_counts(&self) -> (usize, usize, usize) {
        (self.rockets.len(), self.sparks.len(), self.trails.len())
    }

    /// Put a rocket in flight directly.
    pub fn launch(&mut self, rocket: Particle) {
        self.rockets.push(rocket);
    }

    fn maybe_spawn_rocket(&mut self) {
        if self.rockets.len() >= self.params.max_rockets
            || !self.rng.random_bool(self.params.spawn_chance)
        {
            return;
        }
        let x = self.rng.random_range(0..self.width);
        let vy = -self.rng.random_range(1.5..=2.5);
        self.rockets.push(Particle::rocket(
            f64::from(x),
            f64::from(self.height - 1),
            vy,
            Rgb::WHITE,
            self.params.rocket_lifespan,
        ));
    }

    /// Advance the simulation one tick and draw it.
    pub fn tick(&mut self, canvas: &mut Canvas) {
        let p = self.params;
        self.maybe_spawn_rocket();

        for mut rocket in std::mem::take(&mut self.rockets) {
            rocket.advance(p.gravity);
            if rocket.should_explode() {
                let sparks = rocket.explode(&mut self.rng, p.spark_lifespan);
                self.sparks.extend(sparks);
            } else {
                self.trails
                    .push(Particle::trail(rocket.x, rocket.y, rocket.color, p.trail_lifespan));
                canvas.draw_block(rocket.x as i32, rocket.y as i32, p.rocket_size, rocket.color);
                self.rockets.push(rocket);
            }
        }

        self.sparks.retain_mut(|spark| {
            spark.advance(p.gravity);
            if !spark.is_alive() {
                return false;
            }
            let color = spark.color.scaled(spark.fade(p.spark_lifespan));
            canvas.draw_block(spark.x as i32, spark.y as i32, p.spark_size, color);
            true
        });

        self.trails.retain_mut(|trail| {
            trail.lifespan = trail.lifespan.saturating_sub(1);
            if !trail.is_alive() {
                return false;
            }
            let color = trail.color.scaled(trail.fade(p.trail_lifespan) * 0.5);
            canvas.draw_block(trail.x as i32, trail.y as i32, p.trail_size, color);
            true
        });
    }
}

impl Animation for FireworkShow {
    fn name(&self) -> &'static str {
        "fireworks"
    }

    fn frame_interval(&self) -> Duration {
        FRAME_INTERVAL
    }

    fn render_frame(&mut self, canvas: &mut Canvas, elapsed: Duration) -> Flow {
        if elapsed >= self.duration {
            return Flow::Done;
        }
        self.tick(canvas);
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SharedConfig;
    use serde_json::json;

    fn params() -> PhysicsParams {
        PhysicsParams::from(&RuntimeConfig::default())
    }

    fn quiet_show(params: PhysicsParams) -> FireworkShow {
        let params = PhysicsParams {
            spawn_chance: 0.0,
            ..params
        };
        FireworkShow::with_rng(params, Duration::from_secs(5), 64, 64, StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_particle_linear_integration() {
        let gravity = 0.25;
        let mut particle = Particle::spark(0.0, 0.0, 0.0, 0.0, Rgb::WHITE, 50);
        for n in 1..50u32 {
            particle.advance(gravity);
            assert_eq!(particle.vy, f64::from(n) * gravity);
            assert_eq!(particle.lifespan, 50 - n);
        }
        assert!(particle.is_alive());
        particle.advance(gravity);
        assert!(!particle.is_alive());
    }

    #[test]
    fn test_rocket_explodes_when_fuse_runs_out() {
        // Climbing too fast to reach the apex within 40 ticks.
        let gravity = 0.0625;
        let mut rocket = Particle::rocket(10.0, 63.0, -5.0, Rgb::WHITE, 40);
        let mut ticks = 0;
        loop {
            rocket.advance(gravity);
            ticks += 1;
            if rocket.should_explode() {
                break;
            }
        }
        assert_eq!(ticks, 40);
        assert_eq!(rocket.lifespan, 0);
        assert!(rocket.vy < 0.0);
    }

    #[test]
    fn test_rocket_explodes_at_apex() {
        let gravity = 0.5;
        let mut rocket = Particle::rocket(10.0, 63.0, -2.0, Rgb::WHITE, 40);
        let mut ticks = 0;
        loop {
            rocket.advance(gravity);
            ticks += 1;
            if rocket.should_explode() {
                break;
            }
        }
        assert_eq!(ticks, 4);
        assert_eq!(rocket.vy, 0.0);
        assert_eq!(rocket.lifespan, 36);
    }

    #[test]
    fn test_sparks_never_explode() {
        let spark = Particle::spark(0.0, 0.0, 0.0, 1.0, Rgb::WHITE, 0);
        assert!(!spark.should_explode());
    }

    #[test]
    fn test_explode_burst() {
        let mut rng = StdRng::seed_from_u64(42);
        let rocket = Particle::rocket(20.0, 30.0, 0.0, Rgb::WHITE, 0);
        let sparks = rocket.explode(&mut rng, 50);
        assert!((50..=80).contains(&sparks.len()));
        for spark in &sparks {
            assert_eq!(spark.kind, ParticleKind::Spark);
            assert_eq!((spark.x, spark.y), (20.0, 30.0));
            assert_eq!(spark.lifespan, 50);
            let speed = spark.vx.hypot(spark.vy);
            assert!((0.5 - 1e-9..4.5 + 1e-9).contains(&speed));
            assert!(spark.color.r >= 100 && spark.color.g >= 100 && spark.color.b >= 100);
        }
    }

    #[test]
    fn test_tick_explodes_rocket_into_sparks() {
        let mut show = quiet_show(PhysicsParams {
            gravity: 0.5,
            ..params()
        });
        show.launch(Particle::rocket(32.0, 60.0, -1.0, Rgb::WHITE, 40));
        let mut canvas = Canvas::new(64, 64);

        // Tick 1: vy -1.0 -> -0.5, still climbing; leaves a trail.
        show.tick(&mut canvas);
        assert_eq!(show.live_counts().0, 1);
        assert_eq!(show.live_counts().2, 1);
        assert!(canvas.lit_count() > 0);

        // Tick 2: vy reaches 0.0 -> burst.
        canvas.clear();
        show.tick(&mut canvas);
        let (rockets, sparks, trails) = show.live_counts();
        assert_eq!(rockets, 0);
        assert!((50..=80).contains(&sparks));
        assert_eq!(trails, 1);
    }

    #[test]
    fn test_rocket_cap_respected() {
        let mut show = FireworkShow::with_rng(
            PhysicsParams {
                spawn_chance: 1.0,
                max_rockets: 3,
                ..params()
            },
            Duration::from_secs(5),
            64,
            64,
            StdRng::seed_from_u64(1),
        );
        let mut canvas = Canvas::new(64, 64);
        for _ in 0..5 {
            show.tick(&mut canvas);
            assert!(show.live_counts().0 <= 3);
        }
        assert_eq!(show.live_counts().0, 3);
    }

    #[test]
    fn test_trail_fades_at_half_brightness() {
        let mut show = quiet_show(params());
        show.trails.push(Particle::trail(5.0, 5.0, Rgb::new(200, 200, 200), 21));
        let mut canvas = Canvas::new(64, 64);
        show.tick(&mut canvas);
        // 20/25 of half brightness.
        assert_eq!(canvas.get(5, 5), Some(Rgb::new(80, 80, 80)));
    }

    #[test]
    fn test_expired_particles_removed() {
        let mut show = quiet_show(params());
        show.sparks.push(Particle::spark(5.0, 5.0, 0.0, 0.0, Rgb::WHITE, 1));
        show.trails.push(Particle::trail(6.0, 6.0, Rgb::WHITE, 1));
        let mut canvas = Canvas::new(64, 64);
        show.tick(&mut canvas);
        assert_eq!(show.live_counts(), (0, 0, 0));
        assert_eq!(canvas.lit_count(), 0);
    }

    #[test]
    fn test_config_update_leaves_running_show_alone() {
        let shared = SharedConfig::default();
        shared.update(&json!({ "GRAVITY": 0.5, "ROCKET_SPAWN_CHANCE": 0.0 }).as_object().cloned().unwrap());
        let mut show = FireworkShow::from_config(&shared.snapshot(), Duration::from_secs(5), 64, 64);
        show.launch(Particle::rocket(32.0, 60.0, -5.0, Rgb::WHITE, 100));
        show.sparks.push(Particle::spark(10.0, 10.0, 1.0, 0.0, Rgb::WHITE, 100));

        let mut canvas = Canvas::new(64, 64);
        show.tick(&mut canvas);
        shared.update(&json!({ "GRAVITY": 2.0 }).as_object().cloned().unwrap());
        show.tick(&mut canvas);

        assert!((show.gravity() - 0.5).abs() < f64::EPSILON);
        assert!((show.rockets[0].vy - (-5.0 + 2.0 * 0.5)).abs() < 1e-9);
        assert!((show.sparks[0].vy - 2.0 * 0.5).abs() < 1e-9);
        assert!((shared.snapshot().gravity - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_duration_terminates() {
        let mut show = quiet_show(params());
        let mut canvas = Canvas::new(64, 64);
        assert_eq!(show.render_frame(&mut canvas, Duration::from_secs(1)), Flow::Continue);
        assert_eq!(show.render_frame(&mut canvas, Duration::from_secs(5)), Flow::Done);
    }
}
