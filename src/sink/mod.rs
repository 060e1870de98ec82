//! Frame sinks: where finished frames go.
//!
//! A sink is the single-writer device behind the render loop. Drawing
//! happens on a [`Canvas`]; the sink only ever sees complete frames via
//! [`FrameSink::present`], which swaps buffers the way the matrix
//! hardware does:
//!
//! ```text
//!   draw ──▶ back canvas ──present()──▶ front (on screen)
//!                ▲                           │
//!                └──── previous front ◀──────┘
//! ```
//!
//! Two sinks ship with the crate: [`TerminalSink`] previews the matrix in
//! a true-color terminal, and [`MemorySink`] keeps frames in memory for
//! headless runs and tests.

mod memory;
mod terminal;

pub use memory::{MemorySink, SinkMonitor};
pub use terminal::TerminalSink;

use crate::canvas::Canvas;
use crate::error::Result;

/// A double-buffered frame sink with a fixed resolution.
pub trait FrameSink: Send {
    /// Logical width in pixels.
    fn width(&self) -> u16;

    /// Logical height in pixels.
    fn height(&self) -> u16;

    /// Create a blank canvas matching the sink's resolution.
    fn create_canvas(&self) -> Canvas {
        Canvas::new(self.width(), self.height())
    }

    /// Present a finished frame.
    ///
    /// Returns the next writable canvas: the previously presented frame.
    /// Its content is stale, so callers clear it before drawing.
    fn present(&mut self, frame: Canvas) -> Result<Canvas>;

    /// Blank the display immediately.
    fn clear(&mut self) -> Result<()>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn width(&self) -> u16 {
        (**self).width()
    }

    fn height(&self) -> u16 {
        (**self).height()
    }

    fn present(&mut self, frame: Canvas) -> Result<Canvas> {
        (**self).present(frame)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
}
