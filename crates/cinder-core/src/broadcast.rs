//! Message fan-out to observers.
//!
//! `publish` is synchronous: every registered observer sees the event, in
//! registration order, before `publish` returns. A failing or panicking
//! observer is logged and skipped so it can never break the turn that
//! produced the message.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use crate::types::Message;

const DEFAULT_DELTA_CAPACITY: usize = 1024;

/// A finalized message emitted for a thread
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageEvent {
    pub thread_id: String,
    pub message: Message,
}

impl MessageEvent {
    pub fn new(thread_id: impl Into<String>, message: Message) -> Self {
        Self {
            thread_id: thread_id.into(),
            message,
        }
    }
}

/// Partial assistant text while a reply is still streaming
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamDelta {
    pub thread_id: String,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("observer rejected event: {0}")]
    Rejected(String),

    #[error("observer channel closed")]
    ChannelClosed,
}

pub trait MessageObserver: Send + Sync {
    fn name(&self) -> &str {
        "observer"
    }

    fn on_message(&self, event: &MessageEvent) -> Result<(), ObserverError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub struct BroadcastSink {
    observers: RwLock<Vec<(ObserverId, Arc<dyn MessageObserver>)>>,
    next_id: AtomicU64,
    deltas: broadcast::Sender<StreamDelta>,
}

impl BroadcastSink {
    pub fn new() -> Self {
        Self::with_delta_capacity(DEFAULT_DELTA_CAPACITY)
    }

    pub fn with_delta_capacity(capacity: usize) -> Self {
        let (deltas, _) = broadcast::channel(capacity);
        Self {
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            deltas,
        }
    }

    /// Register an observer. Registering the same observer twice returns the
    /// id it already has.
    pub fn subscribe(&self, observer: Arc<dyn MessageObserver>) -> ObserverId {
        let mut observers = self.observers.write();
        if let Some((id, _)) = observers.iter().find(|(_, o)| Arc::ptr_eq(o, &observer)) {
            return *id;
        }
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        observers.push((id, observer));
        id
    }

    /// Remove an observer; unknown ids are ignored
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Deliver `event` to every observer. Returns how many accepted it.
    pub fn publish(&self, event: &MessageEvent) -> usize {
        // Snapshot so observers may (un)subscribe from inside a callback.
        let observers: Vec<_> = self.observers.read().clone();
        let mut delivered = 0;

        for (id, observer) in observers {
            match panic::catch_unwind(AssertUnwindSafe(|| observer.on_message(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(
                        observer = observer.name(),
                        ?id,
                        message_id = %event.message.id,
                        "observer failed: {}",
                        e
                    );
                }
                Err(payload) => {
                    warn!(
                        observer = observer.name(),
                        ?id,
                        message_id = %event.message.id,
                        "observer panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        }

        delivered
    }

    /// Fan out a streaming delta. Returns the number of live receivers.
    pub fn publish_delta(&self, delta: StreamDelta) -> usize {
        self.deltas.send(delta).unwrap_or(0)
    }

    pub fn subscribe_deltas(&self) -> broadcast::Receiver<StreamDelta> {
        self.deltas.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BroadcastSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastSink")
            .field("observers", &self.observer_count())
            .field("delta_receivers", &self.deltas.receiver_count())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Forwards sink events onto a tokio broadcast channel for async consumers
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: broadcast::Sender<MessageEvent>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<MessageEvent>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MessageEvent> {
        self.sender.subscribe()
    }
}

impl MessageObserver for ChannelObserver {
    fn name(&self) -> &str {
        "channel"
    }

    fn on_message(&self, event: &MessageEvent) -> Result<(), ObserverError> {
        self.sender
            .send(event.clone())
            .map(|_| ())
            .map_err(|_| ObserverError::ChannelClosed)
    }
}
