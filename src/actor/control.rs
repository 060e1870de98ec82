//! Control Channel: local socket accepting one JSON command per connection.
//!
//! The acceptor handles connections one at a time, which also serializes
//! every listener start/stop. Bad input is logged and dropped; nothing a
//! client sends can stop the acceptor.

use super::listener::ListenerSupervisor;
use super::messages::{AnimationRequest, Command};
use super::queue::AnimationQueue;
use crate::config::SharedConfig;
use crate::error::Result;
use crate::state::ShutdownSignal;
use std::fs::{self, Permissions};
use std::io::{self, ErrorKind, Read};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sleep between accept attempts while no client is waiting.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// A client that has not finished its message by then is dropped.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Largest accepted message.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Applies decoded commands to the daemon.
pub struct CommandHandler {
    queue: AnimationQueue,
    config: SharedConfig,
    listener: ListenerSupervisor,
}

impl CommandHandler {
    /// Create a handler.
    pub const fn new(queue: AnimationQueue, config: SharedConfig, listener: ListenerSupervisor) -> Self {
        Self {
            queue,
            config,
            listener,
        }
    }

    /// Listener supervisor, for start-up autostart.
    pub fn listener_mut(&mut self) -> &mut ListenerSupervisor {
        &mut self.listener
    }

    /// Decode and apply one wire message.
    pub fn handle_message(&mut self, bytes: &[u8]) -> Result<()> {
        let command = Command::parse(bytes)?;
        info!(command = command.name(), "command received");
        self.handle(command)
    }

    /// Apply one command.
    pub fn handle(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Start => {
                if self.listener.start()? {
                    info!("event listener started");
                }
            }
            Command::Stop => {
                self.listener.stop();
            }
            Command::Fireworks => {
                let duration = self.config.snapshot().firework_duration();
                self.queue.enqueue(AnimationRequest::Fireworks(duration));
            }
            Command::Heart => {
                let duration = self.config.snapshot().heart_duration();
                self.queue.enqueue(AnimationRequest::Heart(duration));
            }
            Command::Smiley => {
                let duration = self.config.snapshot().smiley_duration();
                self.queue.enqueue(AnimationRequest::Smiley(duration));
            }
            Command::UpdateConfig(updates) => {
                let report = self.config.update(&updates);
                info!(
                    applied = report.applied.len(),
                    ignored = report.ignored.len(),
                    rejected = report.rejected.len(),
                    "config updated"
                );
            }
        }
        Ok(())
    }
}

/// Control server actor handle.
pub struct ControlServer {
    handle: Option<JoinHandle<()>>,
    path: PathBuf,
    shutdown: ShutdownSignal,
}

impl ControlServer {
    /// Bind the socket and spawn the acceptor thread.
    ///
    /// A stale socket file at `path` is replaced, and the new socket is
    /// made world-writable.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or the thread cannot
    /// be spawned.
    pub fn spawn(path: &Path, mut handler: CommandHandler, shutdown: ShutdownSignal) -> Result<Self> {
        let listener = bind(path)?;
        let thread_shutdown = shutdown.clone();
        let socket_path = path.to_path_buf();

        let handle = thread::Builder::new()
            .name("matrixd-control".to_string())
            .spawn(move || {
                accept_loop(&listener, &mut handler, &thread_shutdown);
                drop(handler);
                if let Err(e) = fs::remove_file(&socket_path) {
                    debug!(error = %e, "socket file already gone");
                }
                info!("control server stopped");
            })?;

        info!(path = %path.display(), "control server listening");
        Ok(Self {
            handle: Some(handle),
            path: path.to_path_buf(),
            shutdown,
        })
    }

    /// Socket location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Signal shutdown (shared process-wide).
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Wait for the acceptor thread to finish.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("control thread panicked");
            }
        }
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shutdown.trigger();
            let _ = handle.join();
        }
    }
}

fn bind(path: &Path) -> Result<UnixListener> {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed stale socket"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let listener = UnixListener::bind(path)?;
    fs::set_permissions(path, Permissions::from_mode(0o777))?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

fn accept_loop(listener: &UnixListener, handler: &mut CommandHandler, shutdown: &ShutdownSignal) {
    while !shutdown.is_triggered() {
        match listener.accept() {
            Ok((stream, _)) => serve(stream, handler),
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                warn!(error = %e, "accept failed");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

/// Read one message, apply it, close the connection.
fn serve(mut stream: UnixStream, handler: &mut CommandHandler) {
    let message = match read_message(&mut stream) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "dropping control connection");
            return;
        }
    };
    if message.is_empty() {
        debug!("empty control connection");
        return;
    }
    if let Err(e) = handler.handle_message(&message) {
        warn!(error = %e, "command failed");
    }
}

/// Read until the client closes its side or a complete JSON value has
/// arrived.
fn read_message(stream: &mut UnixStream) -> io::Result<Vec<u8>> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let mut message = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Ok(message);
        }
        message.extend_from_slice(&chunk[..n]);
        if message.len() > MAX_MESSAGE_BYTES {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("message exceeds {MAX_MESSAGE_BYTES} bytes"),
            ));
        }
        if serde_json::from_slice::<serde::de::IgnoredAny>(&message).is_ok() {
            return Ok(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ClientFactory;
    use crate::animation::FireworkShow;
    use crate::config::RuntimeConfig;
    use crate::error::Error;
    use crate::events::EventRelay;
    use crate::state::Counters;
    use std::io::Write;
    use std::time::Instant;

    fn handler(queue: &AnimationQueue, config: &SharedConfig) -> CommandHandler {
        let factory: ClientFactory = Box::new(|| Err(Error::config("no credentials")));
        let relay = EventRelay::new(queue.clone(), Counters::new(), config.clone());
        let listener = ListenerSupervisor::new(factory, relay, ShutdownSignal::new());
        CommandHandler::new(queue.clone(), config.clone(), listener)
    }

    fn send(path: &Path, payload: &[u8]) {
        let mut stream = UnixStream::connect(path).unwrap();
        stream.write_all(payload).unwrap();
        stream.shutdown(std::net::Shutdown::Write).unwrap();
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_handler_enqueues_with_configured_durations() {
        let queue = AnimationQueue::new();
        let config = SharedConfig::new(RuntimeConfig::default());
        let mut handler = handler(&queue, &config);
        handler.handle_message(br#"{"command":"heart"}"#).unwrap();
        handler.handle_message(br#"{"command":"smiley"}"#).unwrap();
        handler.handle_message(br#"{"command":"fireworks"}"#).unwrap();
        assert_eq!(
            queue.dequeue(Duration::ZERO),
            Some(AnimationRequest::Heart(Duration::from_secs(6)))
        );
        assert_eq!(
            queue.dequeue(Duration::ZERO),
            Some(AnimationRequest::Smiley(Duration::from_secs(6)))
        );
        assert_eq!(
            queue.dequeue(Duration::ZERO),
            Some(AnimationRequest::Fireworks(Duration::from_secs(5)))
        );
    }

    #[test]
    fn test_update_config_ignores_unknown_keys() {
        let queue = AnimationQueue::new();
        let config = SharedConfig::new(RuntimeConfig::default());
        let mut handler = handler(&queue, &config);
        handler
            .handle_message(br#"{"command":"update_config","data":{"GRAVITY":0.5,"BOGUS":1}}"#)
            .unwrap();
        let expected = RuntimeConfig {
            gravity: 0.5,
            ..RuntimeConfig::default()
        };
        assert_eq!(config.snapshot(), expected);
    }

    #[test]
    fn test_fireworks_use_updated_gravity() {
        let queue = AnimationQueue::new();
        let config = SharedConfig::new(RuntimeConfig::default());
        let mut handler = handler(&queue, &config);
        handler
            .handle_message(br#"{"command":"update_config","data":{"GRAVITY":0.5}}"#)
            .unwrap();
        handler.handle_message(br#"{"command":"fireworks"}"#).unwrap();

        let Some(AnimationRequest::Fireworks(duration)) = queue.dequeue(Duration::ZERO) else {
            panic!("expected a fireworks request");
        };
        let show = FireworkShow::from_config(&config.snapshot(), duration, 64, 64);
        assert!((show.gravity() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_huge_duration_does_not_kill_server() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let queue = AnimationQueue::new();
        let config = SharedConfig::new(RuntimeConfig::default());
        let server =
            ControlServer::spawn(&path, handler(&queue, &config), ShutdownSignal::new()).unwrap();

        send(
            &path,
            br#"{"command":"update_config","data":{"FIREWORK_DURATION":1e30}}"#,
        );
        send(&path, br#"{"command":"fireworks"}"#);
        wait_until(|| queue.len() == 1);
        send(&path, br#"{"command":"heart"}"#);
        wait_until(|| queue.len() == 2);

        assert_eq!(
            queue.dequeue(Duration::ZERO),
            Some(AnimationRequest::Fireworks(Duration::from_secs(5)))
        );
        drop(server);
    }

    #[test]
    fn test_start_failure_is_reported() {
        let queue = AnimationQueue::new();
        let config = SharedConfig::new(RuntimeConfig::default());
        let mut handler = handler(&queue, &config);
        assert!(handler.handle(Command::Start).is_err());
        assert!(!handler.listener_mut().flags().is_active());
        // Stop while inactive is a no-op.
        handler.handle(Command::Stop).unwrap();
    }

    #[test]
    fn test_server_survives_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let queue = AnimationQueue::new();
        let config = SharedConfig::new(RuntimeConfig::default());
        let shutdown = ShutdownSignal::new();
        let server = ControlServer::spawn(&path, handler(&queue, &config), shutdown.clone()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o777);

        send(&path, b"garbage");
        send(&path, br#"{"command":"explode"}"#);
        send(&path, b"");
        send(&path, br#"{"command":"fireworks"}"#);
        wait_until(|| queue.len() == 1);

        server.shutdown();
        server.join();
        assert!(!path.exists());
    }

    #[test]
    fn test_message_without_eof() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let queue = AnimationQueue::new();
        let config = SharedConfig::new(RuntimeConfig::default());
        let server =
            ControlServer::spawn(&path, handler(&queue, &config), ShutdownSignal::new()).unwrap();

        // Client keeps its write side open; the complete JSON object is enough.
        let mut stream = UnixStream::connect(&path).unwrap();
        stream.write_all(br#"{"command":"heart"}"#).unwrap();
        wait_until(|| queue.len() == 1);
        drop(stream);
        drop(server);
    }

    #[test]
    fn test_stale_socket_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        fs::write(&path, b"stale").unwrap();
        let queue = AnimationQueue::new();
        let config = SharedConfig::new(RuntimeConfig::default());
        let server =
            ControlServer::spawn(&path, handler(&queue, &config), ShutdownSignal::new()).unwrap();
        send(&path, br#"{"command":"smiley"}"#);
        wait_until(|| queue.len() == 1);
        drop(server);
    }
}
