//! Event Listener: supervised thread running the provider client.
//!
//! The listener thread owns a single-threaded tokio runtime. Inside it the
//! [`EventClient`] connects, then every [`ChannelEvent`] it delivers is
//! handed to the [`EventRelay`]. The thread exits when a stop is
//! requested, the process shuts down, or the client disconnects; it
//! clears the active flag on its way out.
//!
//! Start and stop are idempotent and are only ever called from the
//! control thread, one command at a time.

use crate::error::{Error, Result};
use crate::events::{ChannelEvent, EventClient, EventKinds, EventRelay};
use crate::state::ShutdownSignal;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// How often the listener loop re-checks its stop flags.
const STOP_POLL: Duration = Duration::from_millis(100);

/// How long `start` waits for the client to connect before returning.
const START_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds a fresh event client for each listener run.
pub type ClientFactory = Box<dyn Fn() -> Result<Box<dyn EventClient>> + Send>;

/// Listener lifecycle flags.
///
/// `active` is true while exactly one listener run is live or winding
/// down; `shutdown_requested` asks that run to wind down.
#[derive(Debug, Default)]
pub struct ListenerFlags {
    active: AtomicBool,
    shutdown_requested: AtomicBool,
}

impl ListenerFlags {
    /// Whether a listener run is live or winding down.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether the current run was asked to stop.
    #[inline]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    fn request_shutdown(&self, requested: bool) {
        self.shutdown_requested.store(requested, Ordering::SeqCst);
    }
}

/// Starts and stops the listener thread.
pub struct ListenerSupervisor {
    factory: ClientFactory,
    relay: EventRelay,
    flags: Arc<ListenerFlags>,
    shutdown: ShutdownSignal,
    handle: Option<JoinHandle<()>>,
}

impl ListenerSupervisor {
    /// Create a stopped supervisor.
    pub fn new(factory: ClientFactory, relay: EventRelay, shutdown: ShutdownSignal) -> Self {
        Self {
            factory,
            relay,
            flags: Arc::new(ListenerFlags::default()),
            shutdown,
            handle: None,
        }
    }

    /// Shared lifecycle flags.
    pub fn flags(&self) -> Arc<ListenerFlags> {
        Arc::clone(&self.flags)
    }

    /// Start the listener unless one is already running.
    ///
    /// Returns `Ok(false)` if a listener was already running. A run that
    /// is still winding down from a stop is waited for, then replaced.
    ///
    /// # Errors
    ///
    /// Fails if the client cannot be built or cannot connect (missing
    /// token file, rejected credentials, unknown channel). The active
    /// flag is cleared again before the error is returned.
    pub fn start(&mut self) -> Result<bool> {
        if self.flags.is_active() && !self.flags.is_shutdown_requested() {
            info!("event listener already running");
            return Ok(false);
        }
        self.join();

        let client = (self.factory)()?;
        self.flags.request_shutdown(false);
        self.flags.set_active(true);

        let (started_tx, started_rx) = bounded(1);
        let relay = self.relay.clone();
        let flags = Arc::clone(&self.flags);
        let shutdown = self.shutdown.clone();
        let spawned = thread::Builder::new()
            .name("matrixd-listener".to_string())
            .spawn(move || run_listener(client, &relay, &flags, &shutdown, &started_tx));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.flags.set_active(false);
                return Err(e.into());
            }
        };
        self.handle = Some(handle);

        match started_rx.recv_timeout(START_TIMEOUT) {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => {
                self.join();
                Err(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("event listener still connecting");
                Ok(true)
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.join();
                Err(Error::protocol("event listener exited during start-up"))
            }
        }
    }

    /// Ask the running listener to stop. Returns `false` if none was
    /// running (or it is already stopping).
    ///
    /// Does not wait: the listener notices within one poll interval and
    /// clears the active flag itself.
    pub fn stop(&self) -> bool {
        if !self.flags.is_active() || self.flags.is_shutdown_requested() {
            debug!("event listener not running");
            return false;
        }
        info!("stopping event listener");
        self.flags.request_shutdown(true);
        true
    }

    /// Wait for the listener thread, if any, to exit.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("listener thread panicked");
                self.flags.set_active(false);
            }
        }
    }
}

impl Drop for ListenerSupervisor {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

/// Body of the listener thread.
fn run_listener(
    client: Box<dyn EventClient>,
    relay: &EventRelay,
    flags: &ListenerFlags,
    shutdown: &ShutdownSignal,
    started: &Sender<Result<()>>,
) {
    info!("event listener starting");
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(listen(client, relay, flags, shutdown, started)),
        Err(e) => {
            error!(error = %e, "failed to build listener runtime");
            let _ = started.send(Err(e.into()));
        }
    }
    flags.set_active(false);
    info!("event listener stopped");
}

async fn listen(
    mut client: Box<dyn EventClient>,
    relay: &EventRelay,
    flags: &ListenerFlags,
    shutdown: &ShutdownSignal,
    started: &Sender<Result<()>>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ChannelEvent>();
    if let Err(e) = client.start(EventKinds::all(), tx).await {
        if e.is_auth() {
            error!(error = %e, "event listener authentication failed; re-authenticate and start again");
        } else {
            error!(error = %e, "event listener failed to start");
        }
        let _ = started.send(Err(e));
        return;
    }
    let _ = started.send(Ok(()));

    while !flags.is_shutdown_requested() && !shutdown.is_triggered() {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => relay.handle(&event),
                None => {
                    warn!("event client disconnected");
                    break;
                }
            },
            () = tokio::time::sleep(STOP_POLL) => {}
        }
    }

    if let Err(e) = client.stop().await {
        warn!(error = %e, "event client did not stop cleanly");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{AnimationQueue, AnimationRequest};
    use crate::config::{RuntimeConfig, SharedConfig};
    use crate::state::Counters;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[derive(Default)]
    struct Script {
        events: Vec<ChannelEvent>,
        fail_auth: bool,
    }

    struct ScriptedClient {
        script: Script,
        tx: Option<mpsc::UnboundedSender<ChannelEvent>>,
        stops: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventClient for ScriptedClient {
        async fn start(
            &mut self,
            _kinds: EventKinds,
            events: mpsc::UnboundedSender<ChannelEvent>,
        ) -> Result<()> {
            if self.script.fail_auth {
                return Err(Error::auth("invalid refresh token"));
            }
            for event in self.script.events.drain(..) {
                let _ = events.send(event);
            }
            self.tx = Some(events);
            Ok(())
        }

        async fn stop(&mut self) -> Result<()> {
            self.tx = None;
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        supervisor: ListenerSupervisor,
        queue: AnimationQueue,
        counters: Counters,
        builds: Arc<AtomicUsize>,
        stops: Arc<AtomicUsize>,
    }

    fn harness(make_script: fn() -> Script) -> Harness {
        let queue = AnimationQueue::new();
        let counters = Counters::new();
        let relay = EventRelay::new(
            queue.clone(),
            counters.clone(),
            SharedConfig::new(RuntimeConfig::default()),
        );
        let builds = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));
        let factory: ClientFactory = {
            let builds = Arc::clone(&builds);
            let stops = Arc::clone(&stops);
            Box::new(move || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedClient {
                    script: make_script(),
                    tx: None,
                    stops: Arc::clone(&stops),
                }) as Box<dyn EventClient>)
            })
        };
        Harness {
            supervisor: ListenerSupervisor::new(factory, relay, ShutdownSignal::new()),
            queue,
            counters,
            builds,
            stops,
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut h = harness(Script::default);
        assert!(h.supervisor.start().unwrap());
        assert!(!h.supervisor.start().unwrap());
        assert_eq!(h.builds.load(Ordering::SeqCst), 1);
        assert!(h.supervisor.flags().is_active());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut h = harness(Script::default);
        assert!(!h.supervisor.stop());
        h.supervisor.start().unwrap();
        assert!(h.supervisor.stop());
        assert!(!h.supervisor.stop());

        let flags = h.supervisor.flags();
        wait_until(|| !flags.is_active());
        assert!(!h.supervisor.stop());
        assert_eq!(h.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restart_after_stop() {
        let mut h = harness(Script::default);
        h.supervisor.start().unwrap();
        h.supervisor.stop();
        // Still winding down: start waits for it, then runs a new one.
        assert!(h.supervisor.start().unwrap());
        assert_eq!(h.builds.load(Ordering::SeqCst), 2);
        assert_eq!(h.stops.load(Ordering::SeqCst), 1);
        assert!(h.supervisor.flags().is_active());
    }

    #[test]
    fn test_auth_failure_rolls_back() {
        let mut h = harness(|| Script {
            fail_auth: true,
            ..Script::default()
        });
        let err = h.supervisor.start().unwrap_err();
        assert!(err.is_auth());
        assert!(!h.supervisor.flags().is_active());
        assert!(!h.supervisor.stop());
    }

    #[test]
    fn test_factory_failure_leaves_inactive() {
        let mut supervisor = ListenerSupervisor::new(
            Box::new(|| Err(Error::config("missing credentials"))),
            EventRelay::new(
                AnimationQueue::new(),
                Counters::new(),
                SharedConfig::default(),
            ),
            ShutdownSignal::new(),
        );
        assert!(supervisor.start().is_err());
        assert!(!supervisor.flags().is_active());
    }

    #[test]
    fn test_events_reach_relay() {
        let h = &mut harness(|| Script {
            events: [1, 5, 2]
                .into_iter()
                .map(|total| ChannelEvent::SubscriptionGift {
                    user_name: Some("gifter".into()),
                    total,
                })
                .collect(),
            ..Script::default()
        });
        h.supervisor.start().unwrap();
        let counters = h.counters.clone();
        wait_until(|| counters.subscribers() == 8);
        wait_until(|| h.queue.len() == 6);
        for _ in 0..3 {
            assert!(matches!(
                h.queue.dequeue(Duration::ZERO),
                Some(AnimationRequest::Fireworks(_))
            ));
            assert!(matches!(
                h.queue.dequeue(Duration::ZERO),
                Some(AnimationRequest::Scroll(_))
            ));
        }
    }

    #[test]
    fn test_process_shutdown_stops_listener() {
        let mut h = harness(Script::default);
        let shutdown = h.supervisor.shutdown.clone();
        h.supervisor.start().unwrap();
        shutdown.trigger();
        h.supervisor.join();
        assert!(!h.supervisor.flags().is_active());
        assert_eq!(h.stops.load(Ordering::SeqCst), 1);
    }
}
