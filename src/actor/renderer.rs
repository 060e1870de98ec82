//! Render Loop: dedicated thread that owns the frame sink.
//!
//! The loop alternates between two states:
//!
//! ```text
//!            dequeue succeeds
//!   ┌──────┐ ───────────────▶ ┌─────────┐
//!   │ Idle │                  │ Playing │
//!   └──────┘ ◀─────────────── └─────────┘
//!       │     animation done        │
//!       │     or shutdown           │
//!       └────────────┬──────────────┘
//!                    ▼ shutdown
//!              clear sink, exit
//! ```
//!
//! While idle it shows the status screen if the event listener is active
//! and a blank frame otherwise, re-checking the queue every
//! [`IDLE_POLL`]. Only one animation ever plays at a time, and nothing
//! else writes to the sink.

use super::listener::ListenerFlags;
use super::messages::AnimationRequest;
use super::queue::AnimationQueue;
use crate::animation::{build_animation, Flow, Fonts, StatusDisplay};
use crate::canvas::Canvas;
use crate::config::SharedConfig;
use crate::error::Result;
use crate::sink::FrameSink;
use crate::state::{Counters, ShutdownSignal};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Longest wait between queue checks while idle.
pub const IDLE_POLL: Duration = Duration::from_millis(100);

/// Everything the render loop reads from the rest of the daemon.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Source of animation requests.
    pub queue: AnimationQueue,
    /// Live runtime configuration, copied at the start of each run.
    pub config: SharedConfig,
    /// Counters shown on the status screen.
    pub counters: Counters,
    /// Listener lifecycle flags; the status screen shows only while active.
    pub listener: Arc<ListenerFlags>,
    /// Fonts for text renderers.
    pub fonts: Fonts,
    /// Process shutdown signal.
    pub shutdown: ShutdownSignal,
}

/// Render statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Frames presented, idle frames included.
    pub frames: u64,
    /// Names of animations played, in order.
    pub played: Vec<&'static str>,
    /// Animations cut short by shutdown or a sink fault.
    pub aborted: u64,
}

/// How an animation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Finished,
    Shutdown,
    Failed,
}

/// What the idle screen currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdleScreen {
    Unknown,
    Blank,
    Status,
}

/// Render loop actor handle.
pub struct RenderLoop {
    /// Handle to the render thread.
    handle: Option<JoinHandle<()>>,
    /// Statistics shared with the thread.
    stats: Arc<Mutex<RenderStats>>,
    shutdown: ShutdownSignal,
}

/// Internal renderer state, owned by the render thread.
struct Renderer<S> {
    sink: S,
    /// Back buffer; `None` after a failed present.
    back: Option<Canvas>,
    ctx: RenderContext,
    status: StatusDisplay,
    idle: IdleScreen,
    stats: Arc<Mutex<RenderStats>>,
}

impl<S: FrameSink> Renderer<S> {
    fn new(sink: S, ctx: RenderContext, stats: Arc<Mutex<RenderStats>>) -> Self {
        let back = Some(sink.create_canvas());
        let status = StatusDisplay::new(Arc::clone(&ctx.fonts.title), Arc::clone(&ctx.fonts.number));
        Self {
            sink,
            back,
            ctx,
            status,
            idle: IdleScreen::Unknown,
            stats,
        }
    }

    fn take_canvas(&mut self) -> Canvas {
        self.back.take().unwrap_or_else(|| self.sink.create_canvas())
    }

    /// Present `frame` and keep the returned buffer as the next back buffer.
    fn present(&mut self, frame: Canvas) -> Result<()> {
        let next = self.sink.present(frame)?;
        self.back = Some(next);
        self.stats.lock().frames += 1;
        Ok(())
    }

    fn run(&mut self) {
        info!(
            width = self.sink.width(),
            height = self.sink.height(),
            "render loop started"
        );
        while !self.ctx.shutdown.is_triggered() {
            self.show_idle();
            if let Some(request) = self.ctx.queue.dequeue(IDLE_POLL) {
                self.play(request);
                self.idle = IdleScreen::Unknown;
            }
        }
        if let Err(e) = self.sink.clear() {
            warn!(error = %e, "failed to clear sink on shutdown");
        }
        info!("render loop stopped");
    }

    /// One idle cycle: status screen while the listener runs, else blank.
    fn show_idle(&mut self) {
        if self.ctx.listener.is_active() {
            let count = self.ctx.counters.subscribers();
            let config = self.ctx.config.snapshot();
            let mut canvas = self.take_canvas();
            canvas.clear();
            self.status
                .draw(&mut canvas, count, config.subs_color, config.num_color);
            match self.present(canvas) {
                Ok(()) => self.idle = IdleScreen::Status,
                Err(e) => warn!(error = %e, "failed to present status screen"),
            }
        } else if self.idle != IdleScreen::Blank {
            match self.sink.clear() {
                Ok(()) => self.idle = IdleScreen::Blank,
                Err(e) => warn!(error = %e, "failed to clear sink"),
            }
        }
    }

    /// Play one animation to completion, shutdown, or sink failure.
    fn play(&mut self, request: AnimationRequest) {
        let config = self.ctx.config.snapshot();
        let mut animation = build_animation(
            request,
            &config,
            &self.ctx.fonts,
            self.sink.width(),
            self.sink.height(),
        );
        let name = animation.name();
        let interval = animation.frame_interval();
        info!(animation = name, "animation started");

        let start = Instant::now();
        let mut frames = 0u64;
        let outcome = loop {
            if self.ctx.shutdown.is_triggered() {
                break Outcome::Shutdown;
            }
            let frame_start = Instant::now();
            let mut canvas = self.take_canvas();
            canvas.clear();
            if animation.render_frame(&mut canvas, start.elapsed()) == Flow::Done {
                self.back = Some(canvas);
                break Outcome::Finished;
            }
            if let Err(e) = self.present(canvas) {
                error!(animation = name, error = %e, "frame sink failed, abandoning animation");
                break Outcome::Failed;
            }
            frames += 1;
            if let Some(rest) = interval.checked_sub(frame_start.elapsed()) {
                thread::sleep(rest);
            }
        };

        let mut stats = self.stats.lock();
        stats.played.push(name);
        if outcome != Outcome::Finished {
            stats.aborted += 1;
        }
        drop(stats);
        debug!(
            animation = name,
            frames,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            ?outcome,
            "animation finished"
        );
    }
}

impl RenderLoop {
    /// Spawn the render thread.
    ///
    /// The thread runs until `ctx.shutdown` is triggered, then clears the
    /// sink and exits.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<S: FrameSink + 'static>(sink: S, ctx: RenderContext) -> Result<Self> {
        let stats = Arc::new(Mutex::new(RenderStats::default()));
        let shutdown = ctx.shutdown.clone();
        let mut renderer = Renderer::new(sink, ctx, Arc::clone(&stats));

        let handle = thread::Builder::new()
            .name("matrixd-render".to_string())
            .spawn(move || renderer.run())?;

        Ok(Self {
            handle: Some(handle),
            stats,
            shutdown,
        })
    }

    /// Copy of the statistics so far.
    pub fn stats(&self) -> RenderStats {
        self.stats.lock().clone()
    }

    /// Signal shutdown to the render thread (and everything else sharing
    /// the signal).
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Wait for the render thread to finish.
    pub fn join(mut self) -> RenderStats {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("render thread panicked");
            }
        }
        self.stats()
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shutdown.trigger();
            let _ = handle.join();
        }
    }
}
