//! Timeline strategies for the two indexed domains: statuses and
//! notifications.

use std::sync::Arc;

use async_trait::async_trait;

use crate::data::models::{Notification, Status, Visibility};
use crate::data::views::{NotificationView, StatusView};
use crate::data::Storage;
use crate::error::{AppError, Result};
use crate::timeline::strategy::{
    collapses_boost, EntryMeta, TimelineKey, TimelineKind, TimelineStrategy, Timelineable,
};

impl Timelineable for Status {
    fn id(&self) -> &str {
        &self.id
    }

    fn author_id(&self) -> &str {
        &self.account_id
    }

    fn boost_of_id(&self) -> Option<&str> {
        self.boost_of_id.as_deref()
    }

    fn boost_of_author_id(&self) -> Option<&str> {
        self.boost_of_account_id.as_deref()
    }
}

impl Timelineable for Notification {
    fn id(&self) -> &str {
        &self.id
    }

    fn author_id(&self) -> &str {
        &self.origin_account_id
    }
}

/// Hydrate a status into its client view, following one boost hop.
pub(crate) async fn build_status_view(
    storage: &Arc<dyn Storage>,
    status_id: &str,
) -> Result<StatusView> {
    let status = storage
        .get_status(status_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let account = storage
        .get_account(&status.account_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let reblog = match status.boost_of_id.as_deref() {
        Some(original_id) => Some(Box::pin(build_status_view(storage, original_id)).await?),
        None => None,
    };

    let replies = storage.count_replies(&status.id).await?;
    let boosts = storage.count_boosts(&status.id).await?;
    let faves = storage.count_faves(&status.id).await?;

    Ok(StatusView::from_parts(
        &status, &account, replies, boosts, faves, reblog,
    ))
}

/// Strategy serving home and list timelines of statuses.
pub struct StatusTimelines {
    storage: Arc<dyn Storage>,
}

impl StatusTimelines {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl TimelineStrategy for StatusTimelines {
    type Item = Status;
    type Prepared = StatusView;

    async fn grab(
        &self,
        key: &TimelineKey,
        max_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Status>> {
        match &key.kind {
            TimelineKind::Home => self.storage.get_home_page(&key.owner_id, max_id, limit).await,
            TimelineKind::List(list_id) => {
                self.storage.get_list_page(list_id, max_id, limit).await
            }
            // Read-through kinds: nothing fans out into them, every page
            // comes from storage.
            TimelineKind::Public => self.storage.get_public_page(max_id, limit).await,
            TimelineKind::Favourites => {
                self.storage
                    .get_favourites_page(&key.owner_id, max_id, limit)
                    .await
            }
            TimelineKind::Notifications => Err(AppError::Validation(
                "status strategy cannot serve notification timelines".to_string(),
            )),
        }
    }

    async fn filter(&self, key: &TimelineKey, status: &Status) -> Result<bool> {
        // The public firehose shows public posts only.
        if key.kind == TimelineKind::Public {
            return Ok(status.visibility == Visibility::Public);
        }
        // Direct messages only reach the author and the mentioned.
        if status.visibility == Visibility::Direct && status.account_id != key.owner_id {
            let mentions = self.storage.get_mentions(&status.id).await?;
            return Ok(mentions
                .iter()
                .any(|m| m.target_account_id == key.owner_id));
        }
        Ok(true)
    }

    async fn prepare(&self, _key: &TimelineKey, item_id: &str) -> Result<StatusView> {
        build_status_view(&self.storage, item_id).await
    }

    fn skip_insert(&self, _key: &TimelineKey, candidate: &EntryMeta, existing: &EntryMeta) -> bool {
        collapses_boost(candidate, existing)
    }
}

/// Strategy serving notification timelines.
pub struct NotificationTimelines {
    storage: Arc<dyn Storage>,
}

impl NotificationTimelines {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl TimelineStrategy for NotificationTimelines {
    type Item = Notification;
    type Prepared = NotificationView;

    async fn grab(
        &self,
        key: &TimelineKey,
        max_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        match &key.kind {
            TimelineKind::Notifications => {
                self.storage
                    .get_notifications_page(&key.owner_id, max_id, limit)
                    .await
            }
            _ => Err(AppError::Validation(
                "notification strategy only serves notification timelines".to_string(),
            )),
        }
    }

    async fn filter(&self, key: &TimelineKey, notification: &Notification) -> Result<bool> {
        Ok(notification.target_account_id == key.owner_id)
    }

    async fn prepare(&self, _key: &TimelineKey, item_id: &str) -> Result<NotificationView> {
        let notification = self
            .storage
            .get_notification(item_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let origin = self
            .storage
            .get_account(&notification.origin_account_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let status = match notification.status_id.as_deref() {
            Some(status_id) => Some(build_status_view(&self.storage, status_id).await?),
            None => None,
        };

        Ok(NotificationView::from_parts(&notification, &origin, status))
    }

    fn skip_insert(&self, _key: &TimelineKey, _candidate: &EntryMeta, _existing: &EntryMeta) -> bool {
        false
    }
}
