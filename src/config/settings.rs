//! Startup settings for the daemon process.

use super::RuntimeConfig;
use crate::error::Result;
use crate::events::TwitchCredentials;
use clap::Args;
use std::path::PathBuf;

/// Default control socket location.
pub const DEFAULT_SOCKET: &str = "/tmp/twitch_matrix.sock";

/// Process-level settings, read once at startup.
///
/// Every flag can also come from the environment (a `.env` file is
/// loaded first), which is how the Twitch credentials are usually set.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Control channel socket path.
    #[arg(long, env = "MATRIX_SOCKET", default_value = DEFAULT_SOCKET)]
    pub socket: PathBuf,

    /// Matrix width in pixels.
    #[arg(
        long,
        env = "MATRIX_WIDTH",
        default_value_t = 64,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub width: u16,

    /// Matrix height in pixels.
    #[arg(
        long,
        env = "MATRIX_HEIGHT",
        default_value_t = 64,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub height: u16,

    /// BDF font for the status label.
    #[arg(long, env = "MATRIX_TITLE_FONT", default_value = "fonts/MinercraftoryRegular-18.bdf")]
    pub title_font: PathBuf,

    /// BDF font for the status counter.
    #[arg(long, env = "MATRIX_NUMBER_FONT", default_value = "fonts/MinercraftoryRegular-30.bdf")]
    pub number_font: PathBuf,

    /// BDF font for scroll text (defaults to the counter font).
    #[arg(long, env = "MATRIX_SCROLL_FONT")]
    pub scroll_font: Option<PathBuf>,

    /// TOML file with initial animation parameters.
    #[arg(long, short = 'c', env = "MATRIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Keep frames in memory instead of drawing to the terminal.
    #[arg(long)]
    pub headless: bool,

    /// Start the event listener immediately instead of waiting for `start`.
    #[arg(long)]
    pub autostart: bool,

    /// Persisted token record (defaults to /etc/twitch_matrix/<username>_tokens.json).
    #[arg(long, env = "TWITCH_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Twitch application client id.
    #[arg(long, env = "TWITCH_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// Twitch application client secret.
    #[arg(long, env = "TWITCH_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Channel to listen to.
    #[arg(long, env = "TWITCH_USERNAME")]
    pub username: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            socket: PathBuf::from(DEFAULT_SOCKET),
            width: 64,
            height: 64,
            title_font: PathBuf::from("fonts/MinercraftoryRegular-18.bdf"),
            number_font: PathBuf::from("fonts/MinercraftoryRegular-30.bdf"),
            scroll_font: None,
            config: None,
            headless: false,
            autostart: false,
            token_file: None,
            client_id: None,
            client_secret: None,
            username: None,
        }
    }
}

impl Settings {
    /// Where the token record lives.
    pub fn token_path(&self) -> PathBuf {
        self.token_file.clone().unwrap_or_else(|| {
            let user = self.username.as_deref().unwrap_or("default");
            PathBuf::from(format!("/etc/twitch_matrix/{user}_tokens.json"))
        })
    }

    /// Credentials for the Twitch client, if all of them are set.
    pub fn twitch_credentials(&self) -> Option<TwitchCredentials> {
        Some(TwitchCredentials {
            client_id: self.client_id.clone()?,
            client_secret: self.client_secret.clone()?,
            username: self.username.clone()?,
        })
    }

    /// Initial runtime configuration: the config file if given, else defaults.
    pub fn runtime_config(&self) -> Result<RuntimeConfig> {
        self.config
            .as_deref()
            .map_or_else(|| Ok(RuntimeConfig::default()), RuntimeConfig::load)
    }

    /// Font used for scroll text.
    pub fn scroll_font_path(&self) -> &std::path::Path {
        self.scroll_font.as_deref().unwrap_or(&self.number_font)
    }
}
