//! Runtime configuration: live-tunable animation parameters.
//!
//! Every renderer reads a copy of [`RuntimeConfig`] taken when its run
//! starts, so an `update_config` command that lands mid-animation only
//! affects the next animation.

use crate::canvas::Rgb;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Tunable parameters for animations and the status display.
///
/// Field names map to SCREAMING_SNAKE_CASE keys (`GRAVITY`,
/// `HEART_COLOR`, ...) both in config files and in `update_config`.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Downward acceleration in pixels per tick².
    pub gravity: f64,
    /// Maximum rockets in flight at once.
    pub max_rockets: u32,
    /// Probability of launching a rocket on a given tick.
    pub rocket_spawn_chance: f64,
    /// Ticks before a rocket explodes on its own.
    pub rocket_lifespan: u32,
    /// Ticks an explosion spark lives.
    pub particle_lifespan: u32,
    /// Ticks a rocket trail pixel lives.
    pub trail_lifespan: u32,
    /// Rocket glyph size in pixels.
    pub rocket_size: u32,
    /// Spark glyph size in pixels.
    pub particle_size: u32,
    /// Trail glyph size in pixels.
    pub trail_size: u32,
    /// Default fireworks duration in seconds.
    pub firework_duration: f64,
    /// Default heart duration in seconds.
    pub heart_duration: f64,
    /// Default smiley duration in seconds.
    pub smiley_duration: f64,
    /// Heart color.
    pub heart_color: Rgb,
    /// Status display label color.
    pub subs_color: Rgb,
    /// Status display counter color.
    pub num_color: Rgb,
    /// Scroll text color.
    pub scroll_color: Rgb,
    /// Color of numbers embedded in scroll text.
    pub scroll_num_color: Rgb,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            gravity: 0.1,
            max_rockets: 10,
            rocket_spawn_chance: 0.2,
            rocket_lifespan: 40,
            particle_lifespan: 50,
            trail_lifespan: 25,
            rocket_size: 2,
            particle_size: 2,
            trail_size: 1,
            firework_duration: 5.0,
            heart_duration: 6.0,
            smiley_duration: 6.0,
            heart_color: Rgb::new(255, 20, 147),
            subs_color: Rgb::new(255, 255, 0),
            num_color: Rgb::new(255, 255, 255),
            scroll_color: Rgb::new(0, 255, 0),
            scroll_num_color: Rgb::new(255, 105, 180),
        }
    }
}

/// Why a single `update_config` entry was not applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// The key expects a `#RRGGBB` string.
    #[error("expected a hex color string")]
    ExpectedColor,
    /// The key expects a number.
    #[error("expected a number")]
    ExpectedNumber,
    /// The key expects a non-negative whole number.
    #[error("expected a non-negative integer")]
    ExpectedInteger,
    /// The number is outside the accepted range.
    #[error("value out of range")]
    OutOfRange,
}

/// Outcome of applying an `update_config` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Keys whose new value is now in effect.
    pub applied: Vec<String>,
    /// Keys that are not configuration parameters.
    pub ignored: Vec<String>,
    /// Keys with a value of the wrong shape; their old value is kept.
    pub rejected: Vec<(String, ValueError)>,
}

/// Longest accepted animation duration, in seconds.
pub const MAX_DURATION_SECS: f64 = 3600.0;

/// Largest accepted rocket, spark or trail size, in pixels.
pub const MAX_GLYPH_SIZE: u32 = 64;

fn as_color(value: &Value) -> std::result::Result<Rgb, ValueError> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .ok_or(ValueError::ExpectedColor)
}

fn as_finite(value: &Value) -> std::result::Result<f64, ValueError> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or(ValueError::ExpectedNumber)
}

fn as_count(value: &Value) -> std::result::Result<u32, ValueError> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).map_err(|_| ValueError::OutOfRange);
    }
    let v = value.as_f64().ok_or(ValueError::ExpectedInteger)?;
    if v.fract() != 0.0 || v < 0.0 || v > f64::from(u32::MAX) {
        return Err(ValueError::ExpectedInteger);
    }
    Ok(v as u32)
}

fn as_lifespan(value: &Value) -> std::result::Result<u32, ValueError> {
    as_count(value).and_then(|n| if n == 0 { Err(ValueError::OutOfRange) } else { Ok(n) })
}

fn as_glyph_size(value: &Value) -> std::result::Result<u32, ValueError> {
    as_count(value).and_then(|n| {
        if (1..=MAX_GLYPH_SIZE).contains(&n) {
            Ok(n)
        } else {
            Err(ValueError::OutOfRange)
        }
    })
}

fn as_seconds(value: &Value) -> std::result::Result<f64, ValueError> {
    as_finite(value).and_then(|v| {
        if (0.0..=MAX_DURATION_SECS).contains(&v) {
            Ok(v)
        } else {
            Err(ValueError::OutOfRange)
        }
    })
}

fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_DURATION_SECS)).unwrap_or_default()
}

impl RuntimeConfig {
    /// Load initial values from a TOML file. Missing keys keep defaults.
    ///
    /// Every entry goes through [`RuntimeConfig::set`], so the file obeys
    /// the same checks as `update_config`. Unknown keys and rejected
    /// values fail the load.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let table: toml::Table = toml::from_str(&source)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;

        let mut config = Self::default();
        for (key, value) in table {
            let value = serde_json::to_value(value)?;
            match config.set(&key, &value) {
                Ok(true) => {}
                Ok(false) => {
                    return Err(Error::config(format!("{}: unknown key {key}", path.display())));
                }
                Err(e) => return Err(Error::config(format!("{}: {key}: {e}", path.display()))),
            }
        }
        Ok(config)
    }

    /// Set one parameter by its key.
    ///
    /// Returns `Ok(false)` for unknown keys. A rejected value leaves the
    /// parameter untouched.
    pub fn set(&mut self, key: &str, value: &Value) -> std::result::Result<bool, ValueError> {
        match key {
            "GRAVITY" => self.gravity = as_finite(value)?,
            "MAX_ROCKETS" => self.max_rockets = as_count(value)?,
            "ROCKET_SPAWN_CHANCE" => {
                let chance = as_finite(value)?;
                if !(0.0..=1.0).contains(&chance) {
                    return Err(ValueError::OutOfRange);
                }
                self.rocket_spawn_chance = chance;
            }
            "ROCKET_LIFESPAN" => self.rocket_lifespan = as_lifespan(value)?,
            "PARTICLE_LIFESPAN" => self.particle_lifespan = as_lifespan(value)?,
            "TRAIL_LIFESPAN" => self.trail_lifespan = as_lifespan(value)?,
            "ROCKET_SIZE" => self.rocket_size = as_glyph_size(value)?,
            "PARTICLE_SIZE" => self.particle_size = as_glyph_size(value)?,
            "TRAIL_SIZE" => self.trail_size = as_glyph_size(value)?,
            "FIREWORK_DURATION" => self.firework_duration = as_seconds(value)?,
            "HEART_DURATION" => self.heart_duration = as_seconds(value)?,
            "SMILEY_DURATION" => self.smiley_duration = as_seconds(value)?,
            "HEART_COLOR" => self.heart_color = as_color(value)?,
            "SUBS_COLOR" => self.subs_color = as_color(value)?,
            "NUM_COLOR" => self.num_color = as_color(value)?,
            "SCROLL_COLOR" => self.scroll_color = as_color(value)?,
            "SCROLL_NUM_COLOR" => self.scroll_num_color = as_color(value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Apply every entry of an `update_config` payload, key by key.
    pub fn apply(&mut self, updates: &Map<String, Value>) -> UpdateReport {
        let mut report = UpdateReport::default();
        for (key, value) in updates {
            match self.set(key, value) {
                Ok(true) => report.applied.push(key.clone()),
                Ok(false) => report.ignored.push(key.clone()),
                Err(e) => report.rejected.push((key.clone(), e)),
            }
        }
        report
    }

    /// Default fireworks duration.
    pub fn firework_duration(&self) -> Duration {
        seconds(self.firework_duration)
    }

    /// Default heart duration.
    pub fn heart_duration(&self) -> Duration {
        seconds(self.heart_duration)
    }

    /// Default smiley duration.
    pub fn smiley_duration(&self) -> Duration {
        seconds(self.smiley_duration)
    }
}

/// The process-wide [`RuntimeConfig`], guarded by a single lock.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<Mutex<RuntimeConfig>>,
}

impl SharedConfig {
    /// Share an initial configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(config)),
        }
    }

    /// Copy the current configuration.
    pub fn snapshot(&self) -> RuntimeConfig {
        self.inner.lock().clone()
    }

    /// Apply an update under the lock and log what happened.
    pub fn update(&self, updates: &Map<String, Value>) -> UpdateReport {
        let report = self.inner.lock().apply(updates);

        for key in &report.applied {
            debug!("Config updated: {key}");
        }
        for key in &report.ignored {
            warn!("Ignoring unknown config key {key:?}");
        }
        for (key, reason) in &report.rejected {
            warn!("Rejected value for {key}: {reason}");
        }
        report
    }
}
