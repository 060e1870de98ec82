//! # matrixd
//!
//! An LED matrix display daemon that celebrates live-stream events.
//!
//! New subscribers, gifted subscriptions and follows are turned into a
//! fireworks show followed by a scrolling message; between animations the
//! matrix shows the running subscriber count. A local control socket lets
//! other programs trigger animations, start or stop the event listener,
//! and tune animation parameters at runtime.
//!
//! ## Core Concepts
//!
//! - **Single writer**: only the render thread touches the frame sink
//! - **FIFO animation queue**: requests play one at a time, in order
//! - **Config snapshots**: each animation reads the runtime config once
//! - **Actor model**: render loop, control server, and event listener
//!   each run on their own thread
//!
//! ## Example
//!
//! ```rust,ignore
//! use matrixd::{Daemon, Fonts, MemorySink, Settings};
//!
//! let settings = Settings::default();
//! let factory = matrixd::twitch_client_factory(&settings);
//! let daemon = Daemon::spawn(&settings, MemorySink::new(64, 64), factory, Fonts::builtin())?;
//! daemon.shutdown();
//! daemon.join();
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod actor;
pub mod animation;
pub mod canvas;
pub mod config;
pub mod error;
pub mod events;
pub mod sink;
pub mod state;

// Re-exports for convenience
pub use actor::{
    twitch_client_factory, AnimationQueue, AnimationRequest, Command, CommandMessage, Daemon,
};
pub use animation::{Animation, Flow, Fonts, TextSegment};
pub use canvas::{Canvas, Font, Rgb};
pub use config::{RuntimeConfig, Settings, SharedConfig};
pub use error::{Error, Result};
pub use events::{ChannelEvent, EventClient, EventKinds};
pub use sink::{FrameSink, MemorySink, TerminalSink};
pub use state::{Counters, ShutdownSignal};
