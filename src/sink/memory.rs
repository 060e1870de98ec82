//! Memory sink: keeps presented frames in memory.

use super::FrameSink;
use crate::canvas::Canvas;
use crate::error::Result;
use parking_lot::Mutex;
use std::sync::Arc;

/// Counters and the last frame, shared with any [`SinkMonitor`].
#[derive(Debug, Default)]
struct Recorded {
    presents: u64,
    clears: u64,
    last_frame: Option<Canvas>,
}

/// A frame sink with no device behind it.
///
/// The sink moves into the render thread; keep a [`SinkMonitor`] to observe
/// what it was shown.
#[derive(Debug)]
pub struct MemorySink {
    /// Front buffer (currently "on screen").
    front: Canvas,
    recorded: Arc<Mutex<Recorded>>,
}

/// Read-only view of a [`MemorySink`] from another thread.
#[derive(Debug, Clone)]
pub struct SinkMonitor {
    recorded: Arc<Mutex<Recorded>>,
}

impl MemorySink {
    /// Create a memory sink with the given resolution.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            front: Canvas::new(width, height),
            recorded: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    /// Get a monitor that observes this sink.
    pub fn monitor(&self) -> SinkMonitor {
        SinkMonitor {
            recorded: Arc::clone(&self.recorded),
        }
    }
}

impl FrameSink for MemorySink {
    fn width(&self) -> u16 {
        self.front.width()
    }

    fn height(&self) -> u16 {
        self.front.height()
    }

    fn present(&mut self, frame: Canvas) -> Result<Canvas> {
        let mut recorded = self.recorded.lock();
        recorded.presents += 1;
        recorded.last_frame = Some(frame.clone());
        drop(recorded);
        Ok(std::mem::replace(&mut self.front, frame))
    }

    fn clear(&mut self) -> Result<()> {
        self.front.clear();
        let mut recorded = self.recorded.lock();
        recorded.clears += 1;
        recorded.last_frame = Some(self.front.clone());
        Ok(())
    }
}

impl SinkMonitor {
    /// Number of frames presented so far.
    pub fn presents(&self) -> u64 {
        self.recorded.lock().presents
    }

    /// Number of times the display was blanked.
    pub fn clears(&self) -> u64 {
        self.recorded.lock().clears
    }

    /// A copy of the frame currently on screen.
    pub fn last_frame(&self) -> Option<Canvas> {
        self.recorded.lock().last_frame.clone()
    }
}
