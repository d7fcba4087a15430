//! Live event push to connected clients.
//!
//! The engine pushes three event shapes: a new timeline entry, a new
//! notification, and a deletion. Delivery is fire-and-forget: an owner
//! with no connected client is not an error, and a push failure never
//! fails the operation that triggered it.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::metrics;
use crate::timeline::strategy::TimelineKind;

/// One event on an account's stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A new entry landed on one of the account's timelines.
    Update { kind: TimelineKind, item: Value },
    /// A new notification for the account.
    Notification { notification: Value },
    /// An item the account may be displaying was deleted.
    Delete { item_id: String },
}

impl StreamEvent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Update { .. } => "update",
            Self::Notification { .. } => "notification",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Push seam between the engine and whatever transport carries events to
/// clients (websockets, SSE).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamingSink: Send + Sync {
    /// Push `event` to `account_id`'s stream, silently dropping it when
    /// nobody is connected.
    async fn push(&self, account_id: &str, event: StreamEvent);
}

/// Broadcast-channel implementation of [`StreamingSink`].
///
/// Each account gets a lazily-created broadcast channel; the serving layer
/// subscribes a receiver per client connection.
pub struct ChannelStreams {
    capacity: usize,
    channels: RwLock<HashMap<String, broadcast::Sender<StreamEvent>>>,
}

impl ChannelStreams {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to `account_id`'s stream.
    pub fn subscribe(&self, account_id: &str) -> broadcast::Receiver<StreamEvent> {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        channels
            .entry(account_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}

#[async_trait]
impl StreamingSink for ChannelStreams {
    async fn push(&self, account_id: &str, event: StreamEvent) {
        metrics::STREAM_PUSHES_TOTAL
            .with_label_values(&[event.label()])
            .inc();

        let sender = {
            let channels = self
                .channels
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            channels.get(account_id).cloned()
        };
        if let Some(sender) = sender {
            // send only errs when no receiver is subscribed; fine either way.
            let _ = sender.send(event);
        }
    }
}
