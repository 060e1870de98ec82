//! Idle status screen: a label over the current subscriber count.

use crate::canvas::{Canvas, Font, Rgb};
use std::sync::Arc;

/// Label drawn above the counter.
pub const STATUS_LABEL: &str = "SUBS";

/// Draws the label at a quarter of the height and the count at three
/// quarters, both horizontally centered.
#[derive(Debug, Clone)]
pub struct StatusDisplay {
    title_font: Arc<Font>,
    number_font: Arc<Font>,
}

impl StatusDisplay {
    /// Create a display using the given fonts.
    pub const fn new(title_font: Arc<Font>, number_font: Arc<Font>) -> Self {
        Self {
            title_font,
            number_font,
        }
    }

    /// Draw the status screen for `count` into a cleared canvas.
    pub fn draw(&self, canvas: &mut Canvas, count: u64, label_color: Rgb, number_color: Rgb) {
        let width = i32::from(canvas.width());
        let height = f64::from(canvas.height());
        let number = count.to_string();

        let x = (width - self.title_font.text_width(STATUS_LABEL)).div_euclid(2);
        let y = (height * 0.25) as i32;
        canvas.draw_text(&self.title_font, x, y, label_color, STATUS_LABEL);

        let x = (width - self.number_font.text_width(&number)).div_euclid(2);
        let y = (height * 0.75) as i32;
        canvas.draw_text(&self.number_font, x, y, number_color, &number);
    }
}
