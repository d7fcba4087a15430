//! Side effects shared by the client and federator processing paths:
//! notification creation, timeline fan-out, delete cascades, and outbound
//! federation.

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::data::models::{
    Account, EntityId, Follow, FollowRequest, Notification, NotificationType, Report, Status,
    StatusFave,
};
use crate::data::views::NotificationView;
use crate::dispatch::strategies::build_status_view;
use crate::dispatch::Dispatcher;
use crate::email::ReportEmail;
use crate::error::{AppError, Result};
use crate::federation::{activity, OutgoingActivity};
use crate::metrics;
use crate::stream::StreamEvent;
use crate::timeline::strategy::{TimelineKey, TimelineKind};

/// Parallelism bound for per-follower fan-out work.
const FANOUT_CONCURRENCY: usize = 10;

/// Who asked for a status to be deleted; decides the fate of attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOrigin {
    /// The local author: attachments are detached and kept for reuse.
    Client,
    /// A remote server: nothing local can reference the media again.
    Federator,
}

impl Dispatcher {
    pub(crate) fn is_local(&self, account: &Account) -> bool {
        self.instance.is_local(account.domain.as_deref())
    }

    // --- notifications ---

    /// Create a notification unless an identical one already exists, index
    /// it, and push it to the target's stream.
    ///
    /// At most one notification exists per
    /// (type, target, origin, status) tuple; a repeat is a silent no-op.
    pub(crate) async fn notify(
        &self,
        notification_type: NotificationType,
        target_account_id: &str,
        origin_account_id: &str,
        status_id: Option<&str>,
    ) -> Result<()> {
        let Some(target) = self.storage.get_account(target_account_id).await? else {
            return Ok(());
        };
        if !self.is_local(&target) {
            return Ok(());
        }

        if self
            .storage
            .find_notification(
                notification_type,
                target_account_id,
                origin_account_id,
                status_id,
            )
            .await?
            .is_some()
        {
            debug!(
                notification_type = notification_type.as_str(),
                target_account_id, "duplicate notification suppressed"
            );
            return Ok(());
        }

        let notification = Notification {
            id: EntityId::new().0,
            notification_type,
            target_account_id: target_account_id.to_string(),
            origin_account_id: origin_account_id.to_string(),
            status_id: status_id.map(str::to_string),
            created_at: chrono::Utc::now(),
        };
        self.storage.put_notification(&notification).await?;
        metrics::NOTIFICATIONS_CREATED_TOTAL
            .with_label_values(&[notification_type.as_str()])
            .inc();

        let inserted = self
            .notifications
            .ingest_and_prepare(TimelineKey::notifications(target_account_id), &notification)
            .await?;
        if inserted {
            let view = self.notification_view(&notification).await?;
            self.streams
                .push(
                    target_account_id,
                    StreamEvent::Notification {
                        notification: serde_json::to_value(&view)
                            .map_err(|e| AppError::Conversion(e.to_string()))?,
                    },
                )
                .await;
        }
        Ok(())
    }

    async fn notification_view(&self, notification: &Notification) -> Result<NotificationView> {
        let origin = self
            .storage
            .get_account(&notification.origin_account_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let status = match notification.status_id.as_deref() {
            Some(status_id) => Some(build_status_view(&self.storage, status_id).await?),
            None => None,
        };
        Ok(NotificationView::from_parts(notification, &origin, status))
    }

    /// Mention notifications for every local account the status mentions.
    pub(crate) async fn notify_status_mentions(&self, status: &Status) -> Result<()> {
        for mention in self.storage.get_mentions(&status.id).await? {
            self.notify(
                NotificationType::Mention,
                &mention.target_account_id,
                &status.account_id,
                Some(&status.id),
            )
            .await?;
        }
        Ok(())
    }

    pub(crate) async fn notify_follow_request(&self, request: &FollowRequest) -> Result<()> {
        self.notify(
            NotificationType::FollowRequest,
            &request.target_account_id,
            &request.account_id,
            None,
        )
        .await
    }

    /// Follow notification, superseding any earlier follow-request
    /// notification from the same account.
    pub(crate) async fn notify_follow(&self, follow: &Follow) -> Result<()> {
        if let Some(stale) = self
            .storage
            .find_notification(
                NotificationType::FollowRequest,
                &follow.target_account_id,
                &follow.account_id,
                None,
            )
            .await?
        {
            self.storage.delete_notification(&stale.id).await?;
            self.notifications
                .wipe_item_from_all_timelines(&stale.id)
                .await?;
        }

        self.notify(
            NotificationType::Follow,
            &follow.target_account_id,
            &follow.account_id,
            None,
        )
        .await
    }

    pub(crate) async fn notify_fave(&self, fave: &StatusFave) -> Result<()> {
        self.notify(
            NotificationType::Fave,
            &fave.target_account_id,
            &fave.account_id,
            Some(&fave.status_id),
        )
        .await
    }

    /// Notify the boosted author, except for self-boosts.
    pub(crate) async fn notify_announce(&self, boost: &Status) -> Result<()> {
        let (Some(original_author), Some(original_id)) = (
            boost.boost_of_account_id.as_deref(),
            boost.boost_of_id.as_deref(),
        ) else {
            return Ok(());
        };
        if original_author == boost.account_id {
            return Ok(());
        }
        self.notify(
            NotificationType::Reblog,
            original_author,
            &boost.account_id,
            Some(original_id),
        )
        .await
    }

    // --- timeline fan-out ---

    /// Fan `status` out to the home and list timelines of every local
    /// follower of its author (the author included). Follower failures are
    /// collected, not short-circuited.
    pub(crate) async fn timeline_status(&self, status: &Status) -> Result<()> {
        let Some(author) = self.storage.get_account(&status.account_id).await? else {
            return Err(AppError::NotFound);
        };

        let mut followers = self.storage.get_local_followers(&status.account_id).await?;
        if self.is_local(&author) {
            // Authors see their own posts: treat them as a follower of
            // themselves, boosts shown, no notification.
            followers.push(Follow {
                id: EntityId::new().0,
                uri: String::new(),
                account_id: author.id.clone(),
                target_account_id: author.id.clone(),
                show_reblogs: true,
                notify: false,
                created_at: chrono::Utc::now(),
            });
        }

        let failures: Vec<String> = stream::iter(followers)
            .map(|follow| async move {
                self.timeline_status_for_follower(status, &follow)
                    .await
                    .map_err(|e| format!("follower {}: {}", follow.account_id, e))
            })
            .buffer_unordered(FANOUT_CONCURRENCY)
            .filter_map(|result| async move { result.err() })
            .collect()
            .await;

        AppError::from_fanout(failures)
    }

    async fn timeline_status_for_follower(&self, status: &Status, follow: &Follow) -> Result<()> {
        if status.is_boost() && !follow.show_reblogs {
            return Ok(());
        }

        for list in self
            .storage
            .get_lists_containing(&follow.account_id, &status.account_id)
            .await?
        {
            self.statuses
                .ingest_one(TimelineKey::list(&follow.account_id, &list.id), status)
                .await?;
        }

        let inserted = self
            .statuses
            .ingest_and_prepare(TimelineKey::home(&follow.account_id), status)
            .await?;
        if !inserted {
            return Ok(());
        }

        let view = build_status_view(&self.storage, &status.id).await?;
        self.streams
            .push(
                &follow.account_id,
                StreamEvent::Update {
                    kind: TimelineKind::Home,
                    item: serde_json::to_value(&view)
                        .map_err(|e| AppError::Conversion(e.to_string()))?,
                },
            )
            .await;

        // Opt-in new-post notifications: only for plain posts that
        // actually landed, and never for the author's own self-entry.
        if follow.notify
            && !status.is_boost()
            && !status.is_reply()
            && follow.account_id != status.account_id
        {
            self.notify(
                NotificationType::Status,
                &follow.account_id,
                &status.account_id,
                Some(&status.id),
            )
            .await?;
        }
        Ok(())
    }

    /// Wipe one status from every timeline and push exactly one delete
    /// event to each affected owner.
    pub(crate) async fn delete_status_from_timelines(&self, status_id: &str) -> Result<()> {
        let affected = self
            .statuses
            .wipe_item_from_all_timelines(status_id)
            .await?;

        let mut notified = std::collections::HashSet::new();
        for key in affected {
            if notified.insert(key.owner_id.clone()) {
                self.streams
                    .push(
                        &key.owner_id,
                        StreamEvent::Delete {
                            item_id: status_id.to_string(),
                        },
                    )
                    .await;
            }
        }
        Ok(())
    }

    /// Drop cached representations of a status everywhere its counts or
    /// content may be displayed, boost wrappers included.
    pub(crate) async fn unprepare_status(&self, status_id: &str) -> Result<()> {
        self.statuses
            .unprepare_item_from_all_timelines(status_id)
            .await
    }

    // --- follow requests ---

    /// Shared handling for an incoming follow request toward a local
    /// account: locked accounts get a request notification to act on,
    /// unlocked ones auto-accept.
    pub(crate) async fn handle_follow_request(
        &self,
        request: &FollowRequest,
        origin: &Account,
        target: &Account,
    ) -> Result<()> {
        if target.locked {
            return self.notify_follow_request(request).await;
        }

        let follow = self.storage.accept_follow_request(&request.id).await?;
        if !self.is_local(origin) {
            self.federate_accept(target, origin, &follow.uri).await?;
        }
        self.notify_follow(&follow).await
    }

    // --- delete cascades ---

    /// Remove a status and everything hanging off it: mentions,
    /// notifications, faves, bookmarks, boost wrappers, attachments, and
    /// every timeline entry.
    pub(crate) async fn delete_status_cascade(
        &self,
        status: &Status,
        origin: DeleteOrigin,
    ) -> Result<()> {
        self.storage.delete_mentions_for_status(&status.id).await?;
        self.storage.delete_faves_for_status(&status.id).await?;
        self.storage
            .delete_bookmarks_for_status(&status.id)
            .await?;

        for stale in self
            .storage
            .delete_notifications_for_status(&status.id)
            .await?
        {
            self.notifications
                .wipe_item_from_all_timelines(&stale)
                .await?;
        }

        for boost in self.storage.get_boosts_of(&status.id).await? {
            self.storage.delete_status(&boost.id).await?;
            self.delete_status_from_timelines(&boost.id).await?;
        }

        for attachment_id in &status.attachment_ids {
            match origin {
                DeleteOrigin::Client => self.storage.detach_attachment(attachment_id).await?,
                DeleteOrigin::Federator => self.storage.delete_attachment(attachment_id).await?,
            }
        }

        self.delete_status_from_timelines(&status.id).await?;
        self.storage.delete_status(&status.id).await
    }

    /// Remove an account and all of its statuses.
    pub(crate) async fn delete_account_cascade(
        &self,
        account: &Account,
        origin: DeleteOrigin,
    ) -> Result<()> {
        for status in self.storage.get_statuses_by_account(&account.id).await? {
            self.delete_status_cascade(&status, origin).await?;
        }
        self.storage.delete_account(&account.id).await
    }

    // --- outbound federation ---

    fn activity_uri(&self, sender: &Account, kind: &str) -> String {
        format!("{}/activities/{}/{}", sender.uri, kind, EntityId::new().0)
    }

    /// Announce a local status to the author's remote followers.
    pub(crate) async fn federate_status(&self, status: &Status, author: &Account) -> Result<()> {
        if !self.is_local(author) || !status.federated {
            return Ok(());
        }
        let inboxes = self
            .storage
            .get_remote_follower_inboxes(&author.id)
            .await?;
        if inboxes.is_empty() {
            return Ok(());
        }

        let (to, cc) = activity::audience_for_visibility(&author.uri, status.visibility);
        let note = activity::note(status, &author.uri, &to, &cc);
        let payload = activity::create(
            &self.activity_uri(author, "create"),
            &author.uri,
            note,
            &to,
            &cc,
        );
        self.federator
            .send(
                author,
                OutgoingActivity {
                    activity_type: "Create",
                    payload,
                    inboxes,
                },
            )
            .await
    }

    pub(crate) async fn federate_accept(
        &self,
        target: &Account,
        follower: &Account,
        follow_uri: &str,
    ) -> Result<()> {
        let payload = activity::accept_follow(
            &self.activity_uri(target, "accept"),
            &target.uri,
            follow_uri,
            &follower.uri,
        );
        self.federator
            .send(
                target,
                OutgoingActivity {
                    activity_type: "Accept",
                    payload,
                    inboxes: vec![follower.inbox_uri.clone()],
                },
            )
            .await
    }

    pub(crate) async fn federate_reject(
        &self,
        target: &Account,
        follower: &Account,
        follow_uri: &str,
    ) -> Result<()> {
        let payload = activity::reject_follow(
            &self.activity_uri(target, "reject"),
            &target.uri,
            follow_uri,
            &follower.uri,
        );
        self.federator
            .send(
                target,
                OutgoingActivity {
                    activity_type: "Reject",
                    payload,
                    inboxes: vec![follower.inbox_uri.clone()],
                },
            )
            .await
    }

    /// Deliver a Like to the faved author's server, unless both sides are
    /// local.
    pub(crate) async fn federate_like(
        &self,
        fave: &StatusFave,
        origin: &Account,
        target: &Account,
        status_uri: &str,
    ) -> Result<()> {
        if self.is_local(origin) && self.is_local(target) {
            return Ok(());
        }
        if !self.is_local(origin) {
            return Ok(());
        }
        let payload = activity::like(&fave.uri, &origin.uri, status_uri);
        self.federator
            .send(
                origin,
                OutgoingActivity {
                    activity_type: "Like",
                    payload,
                    inboxes: vec![target.inbox_uri.clone()],
                },
            )
            .await
    }

    /// Announce a local boost to remote followers and the boosted author.
    pub(crate) async fn federate_announce(
        &self,
        boost: &Status,
        booster: &Account,
        original_uri: &str,
        original_author: &Account,
    ) -> Result<()> {
        if !self.is_local(booster) {
            return Ok(());
        }
        let mut inboxes = self
            .storage
            .get_remote_follower_inboxes(&booster.id)
            .await?;
        if !self.is_local(original_author) {
            inboxes.push(original_author.inbox_uri.clone());
        }
        if inboxes.is_empty() {
            return Ok(());
        }

        let (to, cc) = activity::audience_for_visibility(&booster.uri, boost.visibility);
        let payload = activity::announce(&boost.uri, &booster.uri, original_uri, &to, &cc);
        self.federator
            .send(
                booster,
                OutgoingActivity {
                    activity_type: "Announce",
                    payload,
                    inboxes,
                },
            )
            .await
    }

    /// Undo an earlier activity of ours toward the given inboxes.
    pub(crate) async fn federate_undo(
        &self,
        sender: &Account,
        object_uri: &str,
        object_type: &str,
        inboxes: Vec<String>,
    ) -> Result<()> {
        if !self.is_local(sender) || inboxes.is_empty() {
            return Ok(());
        }
        let payload = activity::undo(
            &self.activity_uri(sender, "undo"),
            &sender.uri,
            object_uri,
            Some(object_type),
        );
        self.federator
            .send(
                sender,
                OutgoingActivity {
                    activity_type: "Undo",
                    payload,
                    inboxes,
                },
            )
            .await
    }

    pub(crate) async fn federate_delete_status(
        &self,
        status: &Status,
        author: &Account,
    ) -> Result<()> {
        if !self.is_local(author) {
            return Ok(());
        }
        let inboxes = self
            .storage
            .get_remote_follower_inboxes(&author.id)
            .await?;
        if inboxes.is_empty() {
            return Ok(());
        }
        let (to, cc) = activity::audience_for_visibility(&author.uri, status.visibility);
        let payload = activity::delete(
            &self.activity_uri(author, "delete"),
            &author.uri,
            &status.uri,
            &to,
            &cc,
        );
        self.federator
            .send(
                author,
                OutgoingActivity {
                    activity_type: "Delete",
                    payload,
                    inboxes,
                },
            )
            .await
    }

    pub(crate) async fn federate_delete_account(&self, account: &Account) -> Result<()> {
        if !self.is_local(account) {
            return Ok(());
        }
        let inboxes = self
            .storage
            .get_remote_follower_inboxes(&account.id)
            .await?;
        if inboxes.is_empty() {
            return Ok(());
        }
        let payload = activity::delete(
            &self.activity_uri(account, "delete"),
            &account.uri,
            &account.uri,
            &[activity::PUBLIC_AUDIENCE.to_string()],
            &[],
        );
        self.federator
            .send(
                account,
                OutgoingActivity {
                    activity_type: "Delete",
                    payload,
                    inboxes,
                },
            )
            .await
    }

    pub(crate) async fn federate_update_profile(&self, account: &Account) -> Result<()> {
        if !self.is_local(account) {
            return Ok(());
        }
        let inboxes = self
            .storage
            .get_remote_follower_inboxes(&account.id)
            .await?;
        if inboxes.is_empty() {
            return Ok(());
        }
        let payload =
            activity::update_profile(&self.activity_uri(account, "update"), &account.uri);
        self.federator
            .send(
                account,
                OutgoingActivity {
                    activity_type: "Update",
                    payload,
                    inboxes,
                },
            )
            .await
    }

    // --- reports ---

    /// Mail moderators about a new report, and forward an anonymized Flag
    /// to the reported account's instance when asked to.
    pub(crate) async fn handle_report(&self, report: &Report, target: &Account) -> Result<()> {
        if !self.instance.moderator_emails.is_empty() {
            let email = ReportEmail {
                to: self.instance.moderator_emails.clone(),
                subject: format!("[{}] New report {}", self.instance.title, report.id),
                body: format!(
                    "Account {} was reported.\n\nComment: {}\n\nReported statuses: {}",
                    target.uri,
                    report.comment,
                    report.status_ids.join(", ")
                ),
            };
            if let Err(e) = self.email.send_report_email(email).await {
                // A broken mail relay must not lose the report itself.
                warn!(report_id = %report.id, error = %e, "report email failed");
            }
        }

        if report.forward && self.instance.forward_reports && !self.is_local(target) {
            let instance_account = self.storage.get_instance_account().await?;
            let mut status_uris = Vec::new();
            for status_id in &report.status_ids {
                if let Some(status) = self.storage.get_status(status_id).await? {
                    status_uris.push(status.uri);
                }
            }
            let payload = activity::flag(
                &report.uri,
                &instance_account.uri,
                &target.uri,
                &status_uris,
                &report.comment,
            );
            let inbox = target
                .shared_inbox_uri
                .clone()
                .unwrap_or_else(|| target.inbox_uri.clone());
            self.federator
                .send(
                    &instance_account,
                    OutgoingActivity {
                        activity_type: "Flag",
                        payload,
                        inboxes: vec![inbox],
                    },
                )
                .await?;
        }
        Ok(())
    }
}
