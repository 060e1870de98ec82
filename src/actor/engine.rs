//! Daemon: wires the actors together.
//!
//! The daemon owns the shared state (queue, counters, runtime config,
//! shutdown signal), hands clones to each actor, and joins them on exit.

use super::control::{CommandHandler, ControlServer};
use super::listener::{ClientFactory, ListenerFlags, ListenerSupervisor};
use super::queue::AnimationQueue;
use super::renderer::{RenderContext, RenderLoop, RenderStats};
use crate::animation::Fonts;
use crate::config::{Settings, SharedConfig};
use crate::error::{Error, Result};
use crate::events::{EventClient, EventRelay, TokenStore, TwitchClient};
use crate::sink::FrameSink;
use crate::state::{Counters, ShutdownSignal};
use std::sync::Arc;
use tracing::{info, warn};

/// Build the production client factory: a Twitch EventSub client using
/// the configured credentials and token file.
pub fn twitch_client_factory(settings: &Settings) -> ClientFactory {
    let credentials = settings.twitch_credentials();
    let token_path = settings.token_path();
    Box::new(move || {
        let credentials = credentials.clone().ok_or_else(|| {
            Error::config("TWITCH_CLIENT_ID, TWITCH_CLIENT_SECRET and TWITCH_USERNAME must be set")
        })?;
        Ok(Box::new(TwitchClient::new(credentials, TokenStore::new(&token_path))) as Box<dyn EventClient>)
    })
}

/// The running daemon.
pub struct Daemon {
    render: RenderLoop,
    control: ControlServer,
    queue: AnimationQueue,
    counters: Counters,
    config: SharedConfig,
    listener: Arc<ListenerFlags>,
    shutdown: ShutdownSignal,
}

impl Daemon {
    /// Start every actor.
    ///
    /// # Errors
    ///
    /// Fails if the config file is invalid, the control socket cannot be
    /// bound, or a thread cannot be spawned. A listener that fails to
    /// autostart is only logged.
    pub fn spawn<S: FrameSink + 'static>(
        settings: &Settings,
        sink: S,
        factory: ClientFactory,
        fonts: Fonts,
    ) -> Result<Self> {
        let shutdown = ShutdownSignal::new();
        let queue = AnimationQueue::new();
        let counters = Counters::new();
        let config = SharedConfig::new(settings.runtime_config()?);

        let relay = EventRelay::new(queue.clone(), counters.clone(), config.clone());
        let supervisor = ListenerSupervisor::new(factory, relay, shutdown.clone());
        let listener = supervisor.flags();
        let mut handler = CommandHandler::new(queue.clone(), config.clone(), supervisor);
        if settings.autostart {
            if let Err(e) = handler.listener_mut().start() {
                warn!(error = %e, "event listener did not autostart");
            }
        }

        let render = RenderLoop::spawn(
            sink,
            RenderContext {
                queue: queue.clone(),
                config: config.clone(),
                counters: counters.clone(),
                listener: Arc::clone(&listener),
                fonts,
                shutdown: shutdown.clone(),
            },
        )?;
        let control = ControlServer::spawn(&settings.socket, handler, shutdown.clone())?;

        info!("daemon running");
        Ok(Self {
            render,
            control,
            queue,
            counters,
            config,
            listener,
            shutdown,
        })
    }

    /// Process shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Request shutdown of every actor.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// The animation queue.
    pub const fn queue(&self) -> &AnimationQueue {
        &self.queue
    }

    /// Subscriber and follower counters.
    pub const fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Live runtime configuration.
    pub const fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Whether the event listener is running.
    pub fn listener_active(&self) -> bool {
        self.listener.is_active()
    }

    /// Render statistics so far.
    pub fn render_stats(&self) -> RenderStats {
        self.render.stats()
    }

    /// Wait for shutdown and for every actor to exit.
    ///
    /// The render loop clears the sink; the control server stops the
    /// listener and removes its socket.
    pub fn join(self) -> RenderStats {
        let stats = self.render.join();
        self.control.join();
        info!(
            frames = stats.frames,
            animations = stats.played.len(),
            "daemon stopped"
        );
        stats
    }
}
