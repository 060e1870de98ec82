//! Canvas module: Core data structures for drawing matrix frames.
//!
//! This module contains:
//! - [`Canvas`]: A grid of pixels with clipping draw primitives
//! - [`Rgb`]: True-color representation
//! - [`Font`]: BDF bitmap fonts plus a built-in 5x7 fallback

#[allow(clippy::module_inception)]
mod canvas;
mod color;
mod font;

pub use canvas::Canvas;
pub use color::{ParseColorError, Rgb};
pub use font::{Font, Glyph};

#[cfg(test)]
pub(crate) use font::tests::tiny_font;
