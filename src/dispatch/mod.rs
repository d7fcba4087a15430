//! Activity dispatcher
//!
//! Routes persisted domain events through their side effects: timeline
//! fan-out, notification creation, live stream pushes, storage cascades,
//! and outbound federation. Events arrive on two queues (one for local
//! client actions, one for verified inbox deliveries) and are routed on
//! their (activity, object) pair.

pub mod event;
pub mod strategies;
pub mod workers;

mod common;
mod from_client;
mod from_federator;

use std::sync::Arc;

pub use common::DeleteOrigin;

use crate::config::{InstanceConfig, TimelineConfig};
use crate::data::Storage;
use crate::email::EmailSender;
use crate::federation::Federator;
use crate::stream::StreamingSink;
use crate::timeline::Manager;

use strategies::{NotificationTimelines, StatusTimelines};

/// The engine core: owns the timeline managers and every collaborator the
/// event routes touch.
pub struct Dispatcher {
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) federator: Arc<dyn Federator>,
    pub(crate) streams: Arc<dyn StreamingSink>,
    pub(crate) email: Arc<dyn EmailSender>,
    pub(crate) instance: InstanceConfig,
    pub(crate) statuses: Manager<StatusTimelines>,
    pub(crate) notifications: Manager<NotificationTimelines>,
}

impl Dispatcher {
    pub fn new(
        storage: Arc<dyn Storage>,
        federator: Arc<dyn Federator>,
        streams: Arc<dyn StreamingSink>,
        email: Arc<dyn EmailSender>,
        instance: InstanceConfig,
        timeline_config: TimelineConfig,
    ) -> Self {
        let statuses = Manager::new(
            Arc::new(StatusTimelines::new(storage.clone())),
            timeline_config.clone(),
        );
        let notifications = Manager::new(
            Arc::new(NotificationTimelines::new(storage.clone())),
            timeline_config,
        );
        Self {
            storage,
            federator,
            streams,
            email,
            instance,
            statuses,
            notifications,
        }
    }

    /// Status timelines (home and lists), for the serving layer.
    pub fn status_timelines(&self) -> &Manager<StatusTimelines> {
        &self.statuses
    }

    /// Notification timelines, for the serving layer.
    pub fn notification_timelines(&self) -> &Manager<NotificationTimelines> {
        &self.notifications
    }
}
