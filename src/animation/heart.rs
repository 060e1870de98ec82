//! Pulsing heart drawn from the parametric heart curve.

use super::{Animation, Flow};
use crate::canvas::{Canvas, Rgb};
use std::time::Duration;

const FRAME_INTERVAL: Duration = Duration::from_millis(40);

/// Pulse angular frequency in radians per second.
const PULSE_RATE: f64 = 5.0;

/// Rings at or above this percentage of full size get the dense sampling.
const DENSE_RING_PERCENT: u32 = 80;

/// A heart that breathes between 1.2x and 1.6x scale.
#[derive(Debug, Clone)]
pub struct PulsingHeart {
    color: Rgb,
    duration: Duration,
    cx: f64,
    cy: f64,
}

impl PulsingHeart {
    /// Heart centered on a `width`×`height` canvas.
    pub fn new(color: Rgb, duration: Duration, width: u16, height: u16) -> Self {
        Self {
            color,
            duration,
            cx: f64::from(width / 2),
            cy: f64::from(height / 2),
        }
    }

    /// Scale factor at time `t` seconds.
    pub fn scale_at(t: f64) -> f64 {
        let pulse = ((t * PULSE_RATE).sin() + 1.0) / 2.0;
        0.4f64.mul_add(pulse, 1.2)
    }

    /// Rasterize the filled heart at `scale`.
    ///
    /// The fill is a stack of concentric outlines shrinking from full size
    /// to 5% in 5% steps.
    pub fn draw(&self, canvas: &mut Canvas, scale: f64) {
        for percent in (5..=100u32).rev().step_by(5) {
            let ring = scale * f64::from(percent) / 100.0;
            let samples = if percent >= DENSE_RING_PERCENT { 72 } else { 36 };
            for i in 0..samples {
                let t = std::f64::consts::TAU * f64::from(i) / f64::from(samples);
                let (x, y) = heart_point(t);
                canvas.set_pixel(
                    (self.cx + ring * x) as i32,
                    (self.cy + ring * y - 5.0) as i32,
                    self.color,
                );
            }
        }
    }
}

/// Point on the unit heart curve, y growing downward.
fn heart_point(t: f64) -> (f64, f64) {
    let x = 16.0 * t.sin().powi(3);
    let y = -(13.0 * t.cos() - 5.0 * (2.0 * t).cos() - 2.0 * (3.0 * t).cos() - (4.0 * t).cos());
    (x, y)
}

impl Animation for PulsingHeart {
    fn name(&self) -> &'static str {
        "heart"
    }

    fn frame_interval(&self) -> Duration {
        FRAME_INTERVAL
    }

    fn render_frame(&mut self, canvas: &mut Canvas, elapsed: Duration) -> Flow {
        if elapsed >= self.duration {
            return Flow::Done;
        }
        self.draw(canvas, Self::scale_at(elapsed.as_secs_f64()));
        Flow::Continue
    }
}
