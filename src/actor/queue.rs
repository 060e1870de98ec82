//! Animation Queue: FIFO hand-off from producers to the render loop.

use super::messages::AnimationRequest;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Unbounded multi-producer FIFO of animation requests.
///
/// Cloning shares the same queue. Enqueue never blocks on consumers;
/// dequeue waits at most the given timeout.
#[derive(Debug, Clone)]
pub struct AnimationQueue {
    sender: Sender<AnimationRequest>,
    receiver: Receiver<AnimationRequest>,
    /// Serializes producers so a batch lands contiguously.
    producers: Arc<Mutex<()>>,
}

impl Default for AnimationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            producers: Arc::new(Mutex::new(())),
        }
    }

    /// Append a request.
    pub fn enqueue(&self, request: AnimationRequest) {
        let _guard = self.producers.lock();
        self.send(request);
    }

    /// Append several requests back to back; no other producer's request
    /// can land between them.
    pub fn enqueue_all(&self, requests: impl IntoIterator<Item = AnimationRequest>) {
        let _guard = self.producers.lock();
        for request in requests {
            self.send(request);
        }
    }

    fn send(&self, request: AnimationRequest) {
        debug!(kind = request.kind(), "enqueue animation");
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.sender.send(request);
    }

    /// Take the oldest request, waiting up to `timeout`.
    pub fn dequeue(&self, timeout: Duration) -> Option<AnimationRequest> {
        match self.receiver.recv_timeout(timeout) {
            Ok(request) => Some(request),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of waiting requests.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
