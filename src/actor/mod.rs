//! Actor Model: one thread per responsibility, sharing a few guarded
//! resources.
//!
//! - **Render Loop**: sole owner of the frame sink; plays animations one
//!   at a time and shows the idle screen in between
//! - **Control Server**: accepts one JSON command per socket connection
//! - **Event Listener**: runs the provider client on its own runtime and
//!   turns channel events into counter updates and animation requests
//!
//! # Architecture
//!
//! ```text
//!  ┌────────────────┐  ChannelEvent  ┌──────────────┐
//!  │ Listener Thread│ ─────────────▶ │  EventRelay  │──▶ Counters
//!  └────────────────┘                └──────────────┘
//!          ▲ start/stop                     │
//!          │                                │ AnimationRequest
//!  ┌────────────────┐  AnimationRequest     ▼
//!  │ Control Thread │ ─────────────▶ ┌──────────────┐
//!  └────────────────┘                │AnimationQueue│
//!          │ update_config           └──────────────┘
//!          ▼                                │
//!   RuntimeConfig ─── copy per run ──▶ ┌──────────────┐
//!                                      │Render Thread │──▶ FrameSink
//!                                      └──────────────┘
//! ```
//!
//! Every thread watches the same [`ShutdownSignal`](crate::state::ShutdownSignal)
//! at the top of its loop.

mod control;
mod engine;
mod listener;
mod messages;
mod queue;
mod renderer;

pub use control::{CommandHandler, ControlServer, MAX_MESSAGE_BYTES};
pub use engine::{twitch_client_factory, Daemon};
pub use listener::{ClientFactory, ListenerFlags, ListenerSupervisor};
pub use messages::{AnimationRequest, Command, CommandError, CommandMessage};
pub use queue::AnimationQueue;
pub use renderer::{RenderContext, RenderLoop, RenderStats, IDLE_POLL};
