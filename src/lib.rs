//! Rookery: timeline fan-out and activity dispatch for a federated
//! social server.
//!
//! The embedding server persists domain events (posts, follows, faves,
//! boosts, blocks, deletes, reports) and hands them to this engine, which
//! takes care of everything downstream:
//!
//! ```text
//!  client API ──► ClientEvent ──┐
//!                               ├─► WorkerQueues ─► Dispatcher
//!  inbox (verified) ─► FederatorEvent ─┘               │
//!                                                      ├─► timeline::Manager (home/list/notification indexes)
//!                                                      ├─► Storage            (cascades, dedup checks)
//!                                                      ├─► StreamingSink      (live update/notification/delete pushes)
//!                                                      ├─► Federator          (signed ActivityPub delivery)
//!                                                      └─► EmailSender        (moderator report mail)
//! ```
//!
//! Timelines are in-memory indexes over durable storage: strictly
//! descending ULIDs, capped with tail eviction, backfilled on demand, with
//! a per-entry cache of the prepared client representation. Collaborators
//! are traits; the engine never owns a database or an HTTP server.

pub mod config;
pub mod data;
pub mod dispatch;
pub mod email;
pub mod error;
pub mod federation;
pub mod log;
pub mod metrics;
pub mod paging;
pub mod stream;
pub mod timeline;

pub use config::AppConfig;
pub use dispatch::Dispatcher;
pub use error::{AppError, Result};
