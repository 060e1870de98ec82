//! Canvas: A grid of pixels representing one matrix frame.
//!
//! The canvas uses contiguous memory allocation for cache efficiency.
//! Pixels are stored in row-major order. Drawing primitives take signed
//! coordinates and silently clip anything outside the frame, so animations
//! can move shapes off-screen without bounds checks of their own.

use super::color::Rgb;
use super::font::Font;

/// A grid of pixels representing one frame of the matrix.
///
/// Access is in row-major order: `index = y * width + x`.
#[derive(Clone, PartialEq, Eq)]
pub struct Canvas {
    /// Contiguous pixel storage (row-major order).
    pixels: Vec<Rgb>,
    /// Frame width in pixels.
    width: u16,
    /// Frame height in pixels.
    height: u16,
}

impl Canvas {
    /// Create a new canvas with the given dimensions.
    ///
    /// All pixels start unlit.
    ///
    /// # Panics
    /// Panics if width or height is 0.
    pub fn new(width: u16, height: u16) -> Self {
        assert!(width > 0 && height > 0, "Canvas dimensions must be non-zero");
        let size = (width as usize) * (height as usize);
        Self {
            pixels: vec![Rgb::BLACK; size],
            width,
            height,
        }
    }

    /// Get the canvas width.
    #[inline]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Get the canvas height.
    #[inline]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Get a reference to the underlying pixel slice.
    #[inline]
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Convert (x, y) coordinates to a linear index.
    ///
    /// Returns `None` if coordinates are out of bounds.
    #[inline]
    pub fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        if x < self.width as usize && y < self.height as usize {
            Some(y * (self.width as usize) + x)
        } else {
            None
        }
    }

    /// Get the pixel at (x, y).
    ///
    /// Returns `None` if coordinates are out of bounds.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<Rgb> {
        self.index_of(x, y).map(|i| self.pixels[i])
    }

    /// Set the pixel at (x, y).
    ///
    /// Returns `false` if coordinates are out of bounds.
    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgb) -> bool {
        if let Some(idx) = self.index_of(x, y) {
            self.pixels[idx] = color;
            true
        } else {
            false
        }
    }

    /// Clear the entire canvas (all pixels unlit).
    pub fn clear(&mut self) {
        self.pixels.fill(Rgb::BLACK);
    }

    /// Fill the entire canvas with one color.
    pub fn fill(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }

    /// Number of lit pixels. Mostly useful for tests and diagnostics.
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|p| !p.is_black()).count()
    }

    /// Draw a line with Bresenham's algorithm, endpoints inclusive.
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb) {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);

        loop {
            self.set_pixel(x, y, color);
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Draw a circle outline with the midpoint algorithm.
    pub fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, color: Rgb) {
        if radius < 0 {
            return;
        }
        let mut x = radius;
        let mut y = 0;
        let mut err = 0;

        while x >= y {
            for (px, py) in [
                (x, y),
                (y, x),
                (-y, x),
                (-x, y),
                (-x, -y),
                (-y, -x),
                (y, -x),
                (x, -y),
            ] {
                self.set_pixel(cx + px, cy + py, color);
            }

            if err <= 0 {
                y += 1;
                err += 2 * y + 1;
            }
            if err > 0 {
                x -= 1;
                err -= 2 * x + 1;
            }
        }
    }

    /// Draw a filled circle as horizontal spans.
    pub fn fill_circle(&mut self, cx: i32, cy: i32, radius: i32, color: Rgb) {
        if radius < 0 {
            return;
        }
        let r2 = radius * radius;
        for dy in -radius..=radius {
            let span = f64::from(r2 - dy * dy).sqrt() as i32;
            self.draw_line(cx - span, cy + dy, cx + span, cy + dy, color);
        }
    }

    /// Draw a `size`×`size` square with its top-left corner at (x, y).
    ///
    /// Only the part of the square inside the frame is visited.
    pub fn draw_block(&mut self, x: i32, y: i32, size: u32, color: Rgb) {
        let size = i32::try_from(size).unwrap_or(i32::MAX);
        let right = x.saturating_add(size).min(i32::from(self.width));
        let bottom = y.saturating_add(size).min(i32::from(self.height));
        for row in y.max(0)..bottom {
            for col in x.max(0)..right {
                self.set_pixel(col, row, color);
            }
        }
    }

    /// Draw text with its baseline at `y`.
    ///
    /// Returns the advance width in pixels, including any part of the text
    /// that fell outside the canvas.
    pub fn draw_text(&mut self, font: &Font, x: i32, y: i32, color: Rgb, text: &str) -> i32 {
        let mut pen = x;
        for c in text.chars() {
            let Some(glyph) = font.glyph(c) else {
                continue;
            };
            // Skip glyphs entirely off the canvas, but keep advancing.
            if pen + glyph.advance >= 0 && pen < i32::from(self.width) {
                let top = y - glyph.height as i32 - glyph.y_offset;
                for row in 0..glyph.height {
                    for col in 0..glyph.width {
                        if glyph.is_set(col, row) {
                            self.set_pixel(
                                pen + glyph.x_offset + col as i32,
                                top + row as i32,
                                color,
                            );
                        }
                    }
                }
            }
            pen += glyph.advance;
        }
        pen - x
    }
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("lit", &self.lit_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::font::tests::tiny_font;

    const RED: Rgb = Rgb::new(255, 0, 0);

    #[test]
    fn test_canvas_new() {
        let canvas = Canvas::new(64, 32);
        assert_eq!(canvas.width(), 64);
        assert_eq!(canvas.height(), 32);
        assert_eq!(canvas.pixels().len(), 64 * 32);
        assert_eq!(canvas.lit_count(), 0);
    }

    #[test]
    #[should_panic]
    fn test_canvas_zero_width() {
        Canvas::new(0, 24);
    }

    #[test]
    fn test_canvas_bounds() {
        let mut canvas = Canvas::new(64, 64);
        assert!(canvas.set_pixel(63, 63, RED));
        assert!(!canvas.set_pixel(64, 0, RED));
        assert!(!canvas.set_pixel(-1, 0, RED));
        assert_eq!(canvas.get(63, 63), Some(RED));
        assert_eq!(canvas.get(0, -1), None);
    }

    #[test]
    fn test_draw_line_horizontal_and_diagonal() {
        let mut canvas = Canvas::new(8, 8);
        canvas.draw_line(1, 2, 4, 2, RED);
        assert_eq!(canvas.lit_count(), 4);
        assert_eq!(canvas.get(4, 2), Some(RED));

        canvas.clear();
        canvas.draw_line(0, 0, 7, 7, RED);
        assert!((0..8).all(|i| canvas.get(i, i) == Some(RED)));
        assert_eq!(canvas.lit_count(), 8);
    }

    #[test]
    fn test_draw_line_clips() {
        let mut canvas = Canvas::new(4, 4);
        canvas.draw_line(-10, 1, 10, 1, RED);
        assert_eq!(canvas.lit_count(), 4);
    }

    #[test]
    fn test_draw_circle() {
        let mut canvas = Canvas::new(16, 16);
        canvas.draw_circle(8, 8, 3, RED);
        assert_eq!(canvas.get(11, 8), Some(RED));
        assert_eq!(canvas.get(8, 5), Some(RED));
        assert_eq!(canvas.get(8, 8), Some(Rgb::BLACK));
    }

    #[test]
    fn test_fill_circle() {
        let mut canvas = Canvas::new(16, 16);
        canvas.fill_circle(8, 8, 3, RED);
        assert_eq!(canvas.get(8, 8), Some(RED));
        assert_eq!(canvas.get(11, 8), Some(RED));
        assert_eq!(canvas.get(12, 8), Some(Rgb::BLACK));
    }

    #[test]
    fn test_draw_block() {
        let mut canvas = Canvas::new(8, 8);
        canvas.draw_block(2, 2, 2, RED);
        assert_eq!(canvas.lit_count(), 4);
        canvas.draw_block(7, 7, 2, RED);
        assert_eq!(canvas.lit_count(), 5);
    }

    #[test]
    fn test_draw_block_huge_is_clipped() {
        let mut canvas = Canvas::new(8, 8);
        canvas.draw_block(i32::MAX - 1, 0, u32::MAX, RED);
        canvas.draw_block(0, i32::MAX, 2, RED);
        assert_eq!(canvas.lit_count(), 0);

        canvas.draw_block(-5, -5, u32::MAX, RED);
        assert_eq!(canvas.lit_count(), 64);
    }

    #[test]
    fn test_draw_text_advance_and_pixels() {
        let font = tiny_font();
        let mut canvas = Canvas::new(16, 8);
        let advance = canvas.draw_text(&font, 0, 3, RED, "ab");
        assert_eq!(advance, 6);
        // Top row of 'a' sits at baseline - height.
        assert_eq!(canvas.get(0, 0), Some(RED));
        assert_eq!(canvas.get(1, 0), Some(RED));
        // 'b' starts one advance later.
        assert_eq!(canvas.get(3, 0), Some(RED));
        assert_eq!(canvas.get(4, 0), Some(Rgb::BLACK));
    }

    #[test]
    fn test_draw_text_off_canvas_still_advances() {
        let font = tiny_font();
        let mut canvas = Canvas::new(4, 4);
        assert_eq!(canvas.draw_text(&font, -20, 3, RED, "abc"), 9);
        assert_eq!(canvas.lit_count(), 0);
        assert_eq!(canvas.draw_text(&font, 10, 3, RED, "abc"), 9);
        assert_eq!(canvas.lit_count(), 0);
    }
}
