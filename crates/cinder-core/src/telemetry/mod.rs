//! Token throughput tracking.
//!
//! A sample starts life keyed by the thread that is streaming
//! (`SampleKey::Stream`) and is handed over to the finished message
//! (`SampleKey::Message`) once that message exists. Both keyspaces share one
//! map so a handover is a single move under one lock, and a key can never hold
//! more than one sample.

mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SampleKey {
    /// Tokens arriving for a thread whose message has no id yet
    Stream(String),
    /// Tokens attributed to a concrete message
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSpeedSample {
    pub key: SampleKey,
    pub token_count: u64,
    pub started_at: DateTime<Utc>,
    pub last_token_at: DateTime<Utc>,
    pub tokens_per_second: f64,
}

/// Change notification republished to telemetry subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SpeedUpdate {
    Updated(TokenSpeedSample),
    Transferred { from: SampleKey, to: SampleKey },
    /// `None` means every sample was dropped
    Cleared(Option<SampleKey>),
}

/// Process-wide token throughput tracker.
///
/// All operations are synchronous and hold the lock only for a map lookup.
#[derive(Debug)]
pub struct TokenSpeedTracker {
    samples: Mutex<HashMap<SampleKey, TokenSpeedSample>>,
    clock: Arc<dyn Clock>,
    updates: broadcast::Sender<SpeedUpdate>,
}

/// Average rate over `elapsed_secs`; non-positive elapsed time counts as one second.
fn rate(token_count: u64, elapsed_secs: f64) -> f64 {
    let elapsed = if elapsed_secs > 0.0 { elapsed_secs } else { 1.0 };
    token_count as f64 / elapsed
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

impl TokenSpeedTracker {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            samples: Mutex::new(HashMap::new()),
            clock,
            updates,
        }
    }

    /// Current time on the tracker's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Count one streamed token for `thread_id`
    pub fn on_stream_token(&self, thread_id: &str) -> TokenSpeedSample {
        self.record_token(SampleKey::Stream(thread_id.to_string()))
    }

    /// Count one token for a message that already has an id
    pub fn on_message_token(&self, message_id: &str) -> TokenSpeedSample {
        self.record_token(SampleKey::Message(message_id.to_string()))
    }

    /// Record a reply that arrived in one piece: `tokens` produced since `started_at`
    pub fn record_completed(
        &self,
        message_id: &str,
        tokens: u64,
        started_at: DateTime<Utc>,
    ) -> TokenSpeedSample {
        let now = self.clock.now();
        let key = SampleKey::Message(message_id.to_string());
        let sample = TokenSpeedSample {
            key: key.clone(),
            token_count: tokens,
            started_at,
            last_token_at: now,
            tokens_per_second: rate(tokens, seconds_between(started_at, now)),
        };
        self.samples.lock().insert(key, sample.clone());
        self.notify(SpeedUpdate::Updated(sample.clone()));
        sample
    }

    /// Hand the running sample of a thread's stream over to its message
    pub fn transfer_stream_to_message(&self, thread_id: &str, message_id: &str) -> bool {
        self.transition(
            SampleKey::Stream(thread_id.to_string()),
            SampleKey::Message(message_id.to_string()),
        )
    }

    /// Re-key a message sample, e.g. after the message id changed
    pub fn transfer_message(&self, from_id: &str, to_id: &str) -> bool {
        self.transition(
            SampleKey::Message(from_id.to_string()),
            SampleKey::Message(to_id.to_string()),
        )
    }

    /// Drop one message sample, or every sample when `message_id` is `None`
    pub fn reset(&self, message_id: Option<&str>) {
        match message_id {
            Some(id) => {
                let key = SampleKey::Message(id.to_string());
                if self.samples.lock().remove(&key).is_some() {
                    self.notify(SpeedUpdate::Cleared(Some(key)));
                }
            }
            None => {
                self.samples.lock().clear();
                self.notify(SpeedUpdate::Cleared(None));
            }
        }
    }

    pub fn reset_stream(&self, thread_id: &str) {
        let key = SampleKey::Stream(thread_id.to_string());
        if self.samples.lock().remove(&key).is_some() {
            self.notify(SpeedUpdate::Cleared(Some(key)));
        }
    }

    pub fn stream_speed(&self, thread_id: &str) -> Option<TokenSpeedSample> {
        self.get(&SampleKey::Stream(thread_id.to_string()))
    }

    pub fn message_speed(&self, message_id: &str) -> Option<TokenSpeedSample> {
        self.get(&SampleKey::Message(message_id.to_string()))
    }

    pub fn get(&self, key: &SampleKey) -> Option<TokenSpeedSample> {
        self.samples.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpeedUpdate> {
        self.updates.subscribe()
    }

    fn record_token(&self, key: SampleKey) -> TokenSpeedSample {
        let now = self.clock.now();
        let sample = {
            let mut samples = self.samples.lock();
            let sample = samples.entry(key.clone()).or_insert_with(|| TokenSpeedSample {
                key,
                token_count: 0,
                started_at: now,
                last_token_at: now,
                tokens_per_second: 0.0,
            });
            sample.token_count += 1;
            sample.last_token_at = now;
            if sample.token_count > 1 {
                sample.tokens_per_second =
                    rate(sample.token_count, seconds_between(sample.started_at, now));
            }
            sample.clone()
        };
        self.notify(SpeedUpdate::Updated(sample.clone()));
        sample
    }

    fn transition(&self, from: SampleKey, to: SampleKey) -> bool {
        let moved = {
            let mut samples = self.samples.lock();
            match samples.remove(&from) {
                Some(mut sample) => {
                    sample.key = to.clone();
                    samples.insert(to.clone(), sample);
                    true
                }
                None => false,
            }
        };
        if moved {
            trace!(?from, ?to, "token speed sample transferred");
            self.notify(SpeedUpdate::Transferred { from, to });
        }
        moved
    }

    fn notify(&self, update: SpeedUpdate) {
        // No subscribers is the normal case for headless runs.
        let _ = self.updates.send(update);
    }
}

impl Default for TokenSpeedTracker {
    fn default() -> Self {
        Self::new()
    }
}
