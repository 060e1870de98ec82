//! Smiley face: yellow disc, two eyes, a curved smile.

use super::{Animation, Flow};
use crate::canvas::{Canvas, Rgb};
use std::time::Duration;

const FRAME_INTERVAL: Duration = Duration::from_millis(100);
const FACE_RADIUS: i32 = 24;
const EYE_RADIUS: i32 = 4;
const EYE_DX: i32 = 10;
const EYE_DY: i32 = -8;
const SMILE_HALF_WIDTH: i32 = 12;
const SMILE_RADIUS: i32 = 15;

/// A static smiley redrawn every frame until its time is up.
#[derive(Debug, Clone)]
pub struct SmileyFace {
    duration: Duration,
    cx: i32,
    cy: i32,
}

impl SmileyFace {
    /// Face centered on a `width`×`height` canvas.
    pub fn new(duration: Duration, width: u16, height: u16) -> Self {
        Self {
            duration,
            cx: i32::from(width / 2),
            cy: i32::from(height / 2),
        }
    }

    /// Draw the face.
    pub fn draw(&self, canvas: &mut Canvas) {
        let (cx, cy) = (self.cx, self.cy);
        canvas.fill_circle(cx, cy, FACE_RADIUS, Rgb::YELLOW);
        canvas.fill_circle(cx - EYE_DX, cy + EYE_DY, EYE_RADIUS, Rgb::BLACK);
        canvas.fill_circle(cx + EYE_DX, cy + EYE_DY, EYE_RADIUS, Rgb::BLACK);

        // Lower arc of a circle, three pixels thick.
        let smile_cy = cy + 5;
        for i in -SMILE_HALF_WIDTH..=SMILE_HALF_WIDTH {
            let y_off = f64::from((SMILE_RADIUS * SMILE_RADIUS - i * i).max(0)).sqrt() as i32;
            canvas.draw_line(
                cx + i,
                smile_cy + y_off - 5,
                cx + i,
                smile_cy + y_off - 3,
                Rgb::BLACK,
            );
        }
    }
}

impl Animation for SmileyFace {
    fn name(&self) -> &'static str {
        "smiley"
    }

    fn frame_interval(&self) -> Duration {
        FRAME_INTERVAL
    }

    fn render_frame(&mut self, canvas: &mut Canvas, elapsed: Duration) -> Flow {
        if elapsed >= self.duration {
            return Flow::Done;
        }
        self.draw(canvas);
        Flow::Continue
    }
}
