//! Data layer: domain models, prepared views, and the storage seam.
//!
//! The engine never talks to a database directly. Everything it needs is
//! behind the [`Storage`] trait so the embedding server can plug in its
//! own persistence. Absence is not an error: lookups return `Ok(None)` or
//! an empty `Vec` when nothing matches, and `Err` is reserved for real
//! storage faults.

pub mod models;
pub mod views;

use async_trait::async_trait;

use crate::data::models::{
    Account, Follow, FollowRequest, List, Mention, Notification, NotificationType, Status,
};
use crate::error::Result;

/// Persistence seam between the engine and the embedding server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    // --- accounts ---

    async fn get_account(&self, id: &str) -> Result<Option<Account>>;

    async fn get_account_by_uri(&self, uri: &str) -> Result<Option<Account>>;

    /// Insert or replace an account, keyed by id.
    async fn put_account(&self, account: &Account) -> Result<()>;

    /// The instance service actor, used as the signer for forwarded reports.
    async fn get_instance_account(&self) -> Result<Account>;

    async fn delete_account(&self, id: &str) -> Result<()>;

    // --- statuses ---

    async fn get_status(&self, id: &str) -> Result<Option<Status>>;

    async fn get_status_by_uri(&self, uri: &str) -> Result<Option<Status>>;

    async fn put_status(&self, status: &Status) -> Result<()>;

    async fn delete_status(&self, id: &str) -> Result<()>;

    /// Every status authored by `account_id`, newest first.
    async fn get_statuses_by_account(&self, account_id: &str) -> Result<Vec<Status>>;

    /// Boost wrappers pointing at `status_id`.
    async fn get_boosts_of(&self, status_id: &str) -> Result<Vec<Status>>;

    async fn count_replies(&self, status_id: &str) -> Result<i64>;

    async fn count_boosts(&self, status_id: &str) -> Result<i64>;

    async fn count_faves(&self, status_id: &str) -> Result<i64>;

    /// A page of home-timeline candidates for `account_id`: statuses by
    /// followed accounts (and the account itself), strictly older than
    /// `max_id` when given, newest first, at most `limit`.
    ///
    /// The cursor lifetime is named so the trait stays mockable.
    async fn get_home_page<'a>(
        &self,
        account_id: &str,
        max_id: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Status>>;

    /// Like [`Storage::get_home_page`] but restricted to authors on the list.
    async fn get_list_page<'a>(
        &self,
        list_id: &str,
        max_id: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Status>>;

    /// A page of the instance-wide public timeline: public-visibility
    /// statuses, strictly older than `max_id` when given, newest first.
    async fn get_public_page<'a>(
        &self,
        max_id: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Status>>;

    /// A page of statuses `account_id` has faved, strictly older than
    /// `max_id` when given, newest first.
    async fn get_favourites_page<'a>(
        &self,
        account_id: &str,
        max_id: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Status>>;

    // --- follows ---

    /// Accepted follows targeting `account_id` whose follower is local.
    async fn get_local_followers(&self, account_id: &str) -> Result<Vec<Follow>>;

    /// Inbox URIs of `account_id`'s remote followers, preferring shared
    /// inboxes where the remote advertises one.
    async fn get_remote_follower_inboxes(&self, account_id: &str) -> Result<Vec<String>>;

    async fn get_follow(&self, account_id: &str, target_account_id: &str)
        -> Result<Option<Follow>>;

    async fn delete_follow(&self, id: &str) -> Result<()>;

    async fn get_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> Result<Option<FollowRequest>>;

    /// Promote a follow request into an accepted follow.
    async fn accept_follow_request(&self, id: &str) -> Result<Follow>;

    async fn delete_follow_request(&self, id: &str) -> Result<()>;

    /// Lists owned by `owner_account_id` that contain `member_account_id`.
    async fn get_lists_containing(
        &self,
        owner_account_id: &str,
        member_account_id: &str,
    ) -> Result<Vec<List>>;

    // --- mentions ---

    async fn get_mentions(&self, status_id: &str) -> Result<Vec<Mention>>;

    async fn delete_mentions_for_status(&self, status_id: &str) -> Result<()>;

    // --- notifications ---

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>>;

    /// Find an existing notification with exactly these coordinates.
    /// This is the dedup check: at most one notification may exist per
    /// (type, target, origin, status) tuple.
    async fn find_notification<'a>(
        &self,
        notification_type: NotificationType,
        target_account_id: &str,
        origin_account_id: &str,
        status_id: Option<&'a str>,
    ) -> Result<Option<Notification>>;

    async fn put_notification(&self, notification: &Notification) -> Result<()>;

    async fn delete_notification(&self, id: &str) -> Result<()>;

    /// Delete every notification about `status_id`, returning the ids of
    /// the deleted rows so callers can drop them from timelines too.
    async fn delete_notifications_for_status(&self, status_id: &str) -> Result<Vec<String>>;

    /// A page of notifications for `target_account_id`, strictly older than
    /// `max_id` when given, newest first, at most `limit`.
    async fn get_notifications_page<'a>(
        &self,
        target_account_id: &str,
        max_id: Option<&'a str>,
        limit: usize,
    ) -> Result<Vec<Notification>>;

    // --- faves and bookmarks ---

    async fn delete_fave(&self, id: &str) -> Result<()>;

    async fn delete_faves_for_status(&self, status_id: &str) -> Result<()>;

    async fn delete_bookmarks_for_status(&self, status_id: &str) -> Result<()>;

    // --- attachments ---

    /// Unlink an attachment from its status but keep the media. Used when
    /// the author deletes their own post and may want to reuse the upload.
    async fn detach_attachment(&self, id: &str) -> Result<()>;

    /// Remove the attachment and its media outright. Used for remote
    /// deletes, where nothing local can reference the media again.
    async fn delete_attachment(&self, id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_storage_accepts_borrowed_cursor_ids() {
        let mut storage = MockStorage::new();
        storage
            .expect_get_home_page()
            .returning(|_, _, _| Ok(Vec::new()));
        storage
            .expect_find_notification()
            .returning(|_, _, _, _| Ok(None));

        let max_id = String::from("01");
        let page = storage
            .get_home_page("A1", Some(max_id.as_str()), 10)
            .await
            .unwrap();
        assert!(page.is_empty());

        let found = storage
            .find_notification(NotificationType::Fave, "A1", "B1", Some(max_id.as_str()))
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
