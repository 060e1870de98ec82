//! Animations: everything the render loop can play.
//!
//! Every animation follows the same one-tick contract: the render loop
//! clears a canvas, asks the animation for the next frame, presents it,
//! and sleeps for the animation's frame interval. The animation decides
//! when it is finished by returning [`Flow::Done`] instead of drawing.
//!
//! - [`FireworkShow`]: particle-physics fireworks
//! - [`PulsingHeart`]: parametric heart curve pulsing over time
//! - [`SmileyFace`]: static face composition
//! - [`Scroller`]: colored text scrolling right to left
//! - [`StatusDisplay`]: the idle label + counter screen

mod fireworks;
mod heart;
mod scroller;
mod smiley;
mod status;

pub use fireworks::{FireworkShow, Particle, ParticleKind, PhysicsParams};
pub use heart::PulsingHeart;
pub use scroller::{Scroller, TextSegment};
pub use smiley::SmileyFace;
pub use status::StatusDisplay;

use crate::actor::AnimationRequest;
use crate::canvas::{Canvas, Font};
use crate::config::{RuntimeConfig, Settings};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Whether an animation wants another frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The canvas holds a new frame to present.
    Continue,
    /// The animation reached its end; nothing was drawn.
    Done,
}

/// A renderer driven one frame at a time by the render loop.
pub trait Animation: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Fixed delay between frames.
    fn frame_interval(&self) -> Duration;

    /// Draw the next frame into a cleared canvas.
    ///
    /// `elapsed` is the wall time since the animation started.
    fn render_frame(&mut self, canvas: &mut Canvas, elapsed: Duration) -> Flow;
}

/// Fonts loaded once at startup and shared by the text renderers.
#[derive(Debug, Clone)]
pub struct Fonts {
    /// Status label font.
    pub title: Arc<Font>,
    /// Status counter font.
    pub number: Arc<Font>,
    /// Scroll text font.
    pub scroll: Arc<Font>,
}

impl Fonts {
    /// Load the configured fonts, falling back to the built-in font.
    pub fn load(settings: &Settings) -> Self {
        Self {
            title: Arc::new(Font::load_or_builtin(Some(&settings.title_font))),
            number: Arc::new(Font::load_or_builtin(Some(&settings.number_font))),
            scroll: Arc::new(Font::load_or_builtin(Some(settings.scroll_font_path()))),
        }
    }

    /// Use the built-in font everywhere.
    pub fn builtin() -> Self {
        let font = Arc::new(Font::builtin());
        Self {
            title: Arc::clone(&font),
            number: Arc::clone(&font),
            scroll: font,
        }
    }
}

/// Instantiate the renderer for a request.
///
/// `config` is the copy taken when the request was dequeued; the new
/// animation never sees later updates.
pub fn build_animation(
    request: AnimationRequest,
    config: &RuntimeConfig,
    fonts: &Fonts,
    width: u16,
    height: u16,
) -> Box<dyn Animation> {
    match request {
        AnimationRequest::Fireworks(duration) => {
            let show = FireworkShow::from_config(config, duration, width, height);
            debug!(gravity = show.gravity(), ?duration, "fireworks armed");
            Box::new(show)
        }
        AnimationRequest::Scroll(segments) => {
            Box::new(Scroller::new(segments, Arc::clone(&fonts.scroll), width, height))
        }
        AnimationRequest::Heart(duration) => {
            Box::new(PulsingHeart::new(config.heart_color, duration, width, height))
        }
        AnimationRequest::Smiley(duration) => Box::new(SmileyFace::new(duration, width, height)),
    }
}
