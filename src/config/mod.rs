//! Configuration: startup settings and live-tunable runtime parameters.

mod runtime;
mod settings;

pub use runtime::{
    RuntimeConfig, SharedConfig, UpdateReport, ValueError, MAX_DURATION_SECS, MAX_GLYPH_SIZE,
};
pub use settings::{Settings, DEFAULT_SOCKET};
