//! Right-to-left scrolling text made of colored segments.

use super::{Animation, Flow};
use crate::canvas::{Canvas, Font, Rgb};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const FRAME_INTERVAL: Duration = Duration::from_millis(30);

/// A run of text drawn in one color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    /// Text to draw.
    pub text: String,
    /// Its color.
    pub color: Rgb,
}

impl TextSegment {
    /// Create a segment.
    pub fn new(text: impl Into<String>, color: Rgb) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

/// Scrolls its segments from the right edge until the last pixel leaves
/// the left edge, one pixel per frame.
#[derive(Debug)]
pub struct Scroller {
    segments: Vec<TextSegment>,
    font: Arc<Font>,
    pos: i32,
    total_width: i32,
    baseline: i32,
}

impl Scroller {
    /// Start with the text just off the right edge of a `width`×`height`
    /// canvas, vertically centered.
    pub fn new(segments: Vec<TextSegment>, font: Arc<Font>, width: u16, height: u16) -> Self {
        let total_width = segments.iter().map(|s| font.text_width(&s.text)).sum();
        let baseline = (f64::from(height) * 0.5 + f64::from(font.height()) / 3.0) as i32;
        Self {
            segments,
            font,
            pos: i32::from(width),
            total_width,
            baseline,
        }
    }

    /// Width of all segments together.
    pub const fn total_width(&self) -> i32 {
        self.total_width
    }

    /// Left edge of the text for the next frame.
    pub const fn position(&self) -> i32 {
        self.pos
    }
}

impl Animation for Scroller {
    fn name(&self) -> &'static str {
        "scroll"
    }

    fn frame_interval(&self) -> Duration {
        FRAME_INTERVAL
    }

    fn render_frame(&mut self, canvas: &mut Canvas, _elapsed: Duration) -> Flow {
        if self.pos + self.total_width <= 0 {
            return Flow::Done;
        }
        let mut x = self.pos;
        for segment in &self.segments {
            x += canvas.draw_text(&self.font, x, self.baseline, segment.color, &segment.text);
        }
        self.pos -= 1;
        Flow::Continue
    }
}
