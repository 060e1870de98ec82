//! Font: Bitmap fonts for matrix text.
//!
//! Fonts are loaded from BDF files, the format the matrix tooling ships
//! its fonts in. A small built-in 5x7 font is always available so the
//! daemon can still show text when no font file is configured.
//!
//! Text is positioned by its baseline: `y` passed to a draw call is the
//! row the glyphs stand on.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// A single glyph bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    /// Horizontal advance (DWIDTH) in pixels.
    pub advance: i32,
    /// Bitmap width in pixels.
    pub width: u32,
    /// Bitmap height in pixels.
    pub height: u32,
    /// Horizontal offset of the bitmap from the pen position.
    pub x_offset: i32,
    /// Vertical offset of the bitmap bottom from the baseline.
    pub y_offset: i32,
    /// Row bitmaps, top row first. Bit `width - 1 - col` is column `col`.
    rows: Vec<u64>,
}

impl Glyph {
    /// Whether the pixel at (`col`, `row`) of the bitmap is set.
    #[inline]
    pub fn is_set(&self, col: u32, row: u32) -> bool {
        if col >= self.width {
            return false;
        }
        self.rows
            .get(row as usize)
            .is_some_and(|bits| (bits >> (self.width - 1 - col)) & 1 == 1)
    }
}

/// A bitmap font with per-character advance widths.
#[derive(Debug, Clone)]
pub struct Font {
    glyphs: HashMap<char, Glyph>,
    height: i32,
    default_char: Option<char>,
}

impl Font {
    /// Load a BDF font from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::parse_bdf(&source)
            .map_err(|e| Error::font(format!("{}: {e}", path.display())))
    }

    /// Load a BDF font, falling back to the built-in font on any failure.
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };
        match Self::load(path) {
            Ok(font) => font,
            Err(e) => {
                warn!("Falling back to built-in font: {e}");
                Self::builtin()
            }
        }
    }

    /// The font's line height in pixels.
    #[inline]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Look up a glyph, using the font's default char for unknown characters.
    pub fn glyph(&self, c: char) -> Option<&Glyph> {
        self.glyphs
            .get(&c)
            .or_else(|| self.default_char.and_then(|d| self.glyphs.get(&d)))
    }

    /// Advance width of a character; 0 when the font cannot draw it.
    #[inline]
    pub fn char_width(&self, c: char) -> i32 {
        self.glyph(c).map_or(0, |g| g.advance)
    }

    /// Total advance width of a string.
    pub fn text_width(&self, text: &str) -> i32 {
        text.chars().map(|c| self.char_width(c)).sum()
    }

    /// Parse a BDF font from its textual source.
    pub fn parse_bdf(source: &str) -> Result<Self> {
        let mut glyphs = HashMap::new();
        let mut height = None;
        let mut default_char = None;

        let mut lines = source.lines().map(str::trim);
        while let Some(line) = lines.next() {
            let mut fields = line.split_whitespace();
            match fields.next() {
                Some("FONTBOUNDINGBOX") => {
                    let [_, h, _, _] = parse_ints::<4>(&mut fields, line)?;
                    height = Some(h);
                }
                Some("DEFAULT_CHAR") => {
                    let [code] = parse_ints::<1>(&mut fields, line)?;
                    default_char = u32::try_from(code).ok().and_then(char::from_u32);
                }
                Some("STARTCHAR") => {
                    if let Some((c, glyph)) = parse_glyph(&mut lines)? {
                        glyphs.insert(c, glyph);
                    }
                }
                _ => {}
            }
        }

        let height = height.ok_or_else(|| Error::font("missing FONTBOUNDINGBOX"))?;
        if glyphs.is_empty() {
            return Err(Error::font("font has no glyphs"));
        }

        Ok(Self {
            glyphs,
            height,
            default_char,
        })
    }

    /// The built-in 5x7 font covering printable ASCII.
    pub fn builtin() -> Self {
        let glyphs = BUILTIN_5X7
            .iter()
            .zip(' '..='~')
            .map(|(columns, c)| {
                // Column-major source, bit 0 is the top row.
                let rows = (0..7)
                    .map(|row| {
                        columns.iter().fold(0u64, |bits, column| {
                            (bits << 1) | u64::from((column >> row) & 1)
                        })
                    })
                    .collect();
                let glyph = Glyph {
                    advance: 6,
                    width: 5,
                    height: 7,
                    x_offset: 0,
                    y_offset: 0,
                    rows,
                };
                (c, glyph)
            })
            .collect();

        Self {
            glyphs,
            height: 8,
            default_char: Some('?'),
        }
    }
}

fn parse_ints<'a, const N: usize>(
    fields: &mut impl Iterator<Item = &'a str>,
    line: &str,
) -> Result<[i32; N]> {
    let mut out = [0; N];
    for slot in &mut out {
        *slot = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| Error::font(format!("malformed line {line:?}")))?;
    }
    Ok(out)
}

/// Parse one `STARTCHAR ... ENDCHAR` block. Returns `None` for glyphs
/// without a usable encoding.
fn parse_glyph<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Result<Option<(char, Glyph)>> {
    let mut encoding = None;
    let mut advance = None;
    let mut bbx = None;

    while let Some(line) = lines.next() {
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("ENCODING") => encoding = Some(parse_ints::<1>(&mut fields, line)?[0]),
            Some("DWIDTH") => advance = Some(parse_ints::<1>(&mut fields, line)?[0]),
            Some("BBX") => bbx = Some(parse_ints::<4>(&mut fields, line)?),
            Some("BITMAP") => {
                let [w, h, x_offset, y_offset] =
                    bbx.ok_or_else(|| Error::font("BITMAP before BBX"))?;
                let width = u32::try_from(w).map_err(|_| Error::font("negative BBX width"))?;
                let height = u32::try_from(h).map_err(|_| Error::font("negative BBX height"))?;
                if width > 64 {
                    return Err(Error::font(format!("glyph too wide: {width}")));
                }

                let mut rows = Vec::with_capacity(height as usize);
                for line in lines.by_ref() {
                    if line == "ENDCHAR" {
                        break;
                    }
                    let bits = u64::from_str_radix(line, 16)
                        .map_err(|_| Error::font(format!("bad bitmap row {line:?}")))?;
                    // Rows are padded to whole bytes; keep the leftmost `width` bits.
                    let padded = u32::try_from(line.len() * 4).unwrap_or(u32::MAX);
                    rows.push(bits >> padded.saturating_sub(width));
                }
                rows.resize(height as usize, 0);

                let c = encoding
                    .and_then(|e| u32::try_from(e).ok())
                    .and_then(char::from_u32);
                return Ok(c.map(|c| {
                    let glyph = Glyph {
                        advance: advance.unwrap_or(w),
                        width,
                        height,
                        x_offset,
                        y_offset,
                        rows,
                    };
                    (c, glyph)
                }));
            }
            Some("ENDCHAR") => return Ok(None),
            _ => {}
        }
    }

    Err(Error::font("unterminated STARTCHAR block"))
}

/// Classic 5x7 glyphs for ' '..='~', five column bytes each.
#[rustfmt::skip]
const BUILTIN_5X7: [[u8; 5]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00], [0x00, 0x00, 0x5F, 0x00, 0x00],
    [0x00, 0x07, 0x00, 0x07, 0x00], [0x14, 0x7F, 0x14, 0x7F, 0x14],
    [0x24, 0x2A, 0x7F, 0x2A, 0x12], [0x23, 0x13, 0x08, 0x64, 0x62],
    [0x36, 0x49, 0x56, 0x20, 0x50], [0x00, 0x05, 0x03, 0x00, 0x00],
    [0x00, 0x1C, 0x22, 0x41, 0x00], [0x00, 0x41, 0x22, 0x1C, 0x00],
    [0x2A, 0x1C, 0x7F, 0x1C, 0x2A], [0x08, 0x08, 0x3E, 0x08, 0x08],
    [0x00, 0x50, 0x30, 0x00, 0x00], [0x08, 0x08, 0x08, 0x08, 0x08],
    [0x00, 0x60, 0x60, 0x00, 0x00], [0x20, 0x10, 0x08, 0x04, 0x02],
    [0x3E, 0x51, 0x49, 0x45, 0x3E], [0x00, 0x42, 0x7F, 0x40, 0x00],
    [0x42, 0x61, 0x51, 0x49, 0x46], [0x21, 0x41, 0x45, 0x4B, 0x31],
    [0x18, 0x14, 0x12, 0x7F, 0x10], [0x27, 0x45, 0x45, 0x45, 0x39],
    [0x3C, 0x4A, 0x49, 0x49, 0x30], [0x01, 0x71, 0x09, 0x05, 0x03],
    [0x36, 0x49, 0x49, 0x49, 0x36], [0x06, 0x49, 0x49, 0x29, 0x1E],
    [0x00, 0x36, 0x36, 0x00, 0x00], [0x00, 0x56, 0x36, 0x00, 0x00],
    [0x08, 0x14, 0x22, 0x41, 0x00], [0x14, 0x14, 0x14, 0x14, 0x14],
    [0x00, 0x41, 0x22, 0x14, 0x08], [0x02, 0x01, 0x51, 0x09, 0x06],
    [0x32, 0x49, 0x79, 0x41, 0x3E], [0x7E, 0x11, 0x11, 0x11, 0x7E],
    [0x7F, 0x49, 0x49, 0x49, 0x36], [0x3E, 0x41, 0x41, 0x41, 0x22],
    [0x7F, 0x41, 0x41, 0x22, 0x1C], [0x7F, 0x49, 0x49, 0x49, 0x41],
    [0x7F, 0x09, 0x09, 0x09, 0x01], [0x3E, 0x41, 0x49, 0x49, 0x7A],
    [0x7F, 0x08, 0x08, 0x08, 0x7F], [0x00, 0x41, 0x7F, 0x41, 0x00],
    [0x20, 0x40, 0x41, 0x3F, 0x01], [0x7F, 0x08, 0x14, 0x22, 0x41],
    [0x7F, 0x40, 0x40, 0x40, 0x40], [0x7F, 0x02, 0x0C, 0x02, 0x7F],
    [0x7F, 0x04, 0x08, 0x10, 0x7F], [0x3E, 0x41, 0x41, 0x41, 0x3E],
    [0x7F, 0x09, 0x09, 0x09, 0x06], [0x3E, 0x41, 0x51, 0x21, 0x5E],
    [0x7F, 0x09, 0x19, 0x29, 0x46], [0x46, 0x49, 0x49, 0x49, 0x31],
    [0x01, 0x01, 0x7F, 0x01, 0x01], [0x3F, 0x40, 0x40, 0x40, 0x3F],
    [0x1F, 0x20, 0x40, 0x20, 0x1F], [0x3F, 0x40, 0x38, 0x40, 0x3F],
    [0x63, 0x14, 0x08, 0x14, 0x63], [0x07, 0x08, 0x70, 0x08, 0x07],
    [0x61, 0x51, 0x49, 0x45, 0x43], [0x00, 0x7F, 0x41, 0x41, 0x00],
    [0x02, 0x04, 0x08, 0x10, 0x20], [0x00, 0x41, 0x41, 0x7F, 0x00],
    [0x04, 0x02, 0x01, 0x02, 0x04], [0x40, 0x40, 0x40, 0x40, 0x40],
    [0x00, 0x01, 0x02, 0x04, 0x00], [0x20, 0x54, 0x54, 0x54, 0x78],
    [0x7F, 0x48, 0x44, 0x44, 0x38], [0x38, 0x44, 0x44, 0x44, 0x20],
    [0x38, 0x44, 0x44, 0x48, 0x7F], [0x38, 0x54, 0x54, 0x54, 0x18],
    [0x08, 0x7E, 0x09, 0x01, 0x02], [0x0C, 0x52, 0x52, 0x52, 0x3E],
    [0x7F, 0x08, 0x04, 0x04, 0x78], [0x00, 0x44, 0x7D, 0x40, 0x00],
    [0x20, 0x40, 0x44, 0x3D, 0x00], [0x7F, 0x10, 0x28, 0x44, 0x00],
    [0x00, 0x41, 0x7F, 0x40, 0x00], [0x7C, 0x04, 0x18, 0x04, 0x78],
    [0x7C, 0x08, 0x04, 0x04, 0x78], [0x38, 0x44, 0x44, 0x44, 0x38],
    [0x7C, 0x14, 0x14, 0x14, 0x08], [0x08, 0x14, 0x14, 0x18, 0x7C],
    [0x7C, 0x08, 0x04, 0x04, 0x08], [0x48, 0x54, 0x54, 0x54, 0x20],
    [0x04, 0x3F, 0x44, 0x40, 0x20], [0x3C, 0x40, 0x40, 0x20, 0x7C],
    [0x1C, 0x20, 0x40, 0x20, 0x1C], [0x3C, 0x40, 0x30, 0x40, 0x3C],
    [0x44, 0x28, 0x10, 0x28, 0x44], [0x0C, 0x50, 0x50, 0x50, 0x3C],
    [0x44, 0x64, 0x54, 0x4C, 0x44], [0x00, 0x08, 0x36, 0x41, 0x00],
    [0x00, 0x00, 0x7F, 0x00, 0x00], [0x00, 0x41, 0x36, 0x08, 0x00],
    [0x10, 0x08, 0x08, 0x10, 0x08],
];
