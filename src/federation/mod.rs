//! Outbound federation: activity construction, HTTP signatures, delivery.
//!
//! The dispatcher talks to federation through the [`Federator`] trait;
//! [`delivery::HttpFederator`] is the production implementation. Inbound
//! activities arrive pre-verified from the serving layer, so nothing here
//! checks signatures on the way in.

pub mod activity;
pub mod delivery;
pub mod signature;

use async_trait::async_trait;
use serde_json::Value;

use crate::data::models::{Account, Status};
use crate::error::Result;

/// A fully-built activity and where to deliver it.
#[derive(Debug, Clone)]
pub struct OutgoingActivity {
    /// Activity type, for logs and metrics ("Create", "Undo", ...)
    pub activity_type: &'static str,
    /// The activity JSON, as produced by [`activity`]'s builders
    pub payload: Value,
    /// Target inbox URIs; duplicates are removed before delivery
    pub inboxes: Vec<String>,
}

/// Delivery seam between the dispatcher and the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Federator: Send + Sync {
    /// Sign `activity` as `sender` and deliver it to every inbox.
    ///
    /// Partial failures are folded into [`crate::error::AppError::Fanout`];
    /// successful inboxes are not retried or rolled back.
    async fn send(&self, sender: &Account, activity: OutgoingActivity) -> Result<()>;

    /// Resolve a remote status by its ActivityPub IRI.
    ///
    /// `Ok(None)` when the remote object is gone or cannot be mapped to a
    /// known author.
    async fn dereference_status(&self, uri: &str) -> Result<Option<Status>>;

    /// Resolve a remote actor by its ActivityPub IRI.
    async fn dereference_account(&self, uri: &str) -> Result<Option<Account>>;
}
