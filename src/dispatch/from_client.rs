//! Processing of events originating from the local client API.

use tracing::{debug, instrument};

use crate::data::models::{Account, NotificationType};
use crate::dispatch::common::DeleteOrigin;
use crate::dispatch::event::{ActivityType, ClientEvent, ObjectType};
use crate::dispatch::Dispatcher;
use crate::error::{AppError, Result};
use crate::federation::{activity, OutgoingActivity};
use crate::metrics;

fn required_target(target: Option<Account>) -> Result<Account> {
    target.ok_or_else(|| AppError::Validation("event is missing its target account".to_string()))
}

impl Dispatcher {
    /// Route one client-originated event through its side effects.
    #[instrument(skip_all, fields(activity = event.activity.as_str(), object = event.object.as_str()))]
    pub async fn process_from_client(&self, event: ClientEvent) -> Result<()> {
        metrics::EVENTS_PROCESSED_TOTAL
            .with_label_values(&["client", event.activity.as_str(), event.object.as_str()])
            .inc();
        debug!("processing client event");

        match (event.activity, event.object) {
            // A local account posted.
            (ActivityType::Create, ObjectType::Note) => {
                let status = event.model.into_status()?;
                self.timeline_status(&status).await?;
                self.notify_status_mentions(&status).await?;
                self.federate_status(&status, &event.origin_account).await
            }

            // A local account asked to follow someone.
            (ActivityType::Create, ObjectType::Follow) => {
                let request = event.model.into_follow_request()?;
                let target = required_target(event.target_account)?;
                if self.is_local(&target) {
                    self.handle_follow_request(&request, &event.origin_account, &target)
                        .await
                } else {
                    let payload = activity::follow(
                        &request.uri,
                        &event.origin_account.uri,
                        &target.uri,
                    );
                    self.federator
                        .send(
                            &event.origin_account,
                            OutgoingActivity {
                                activity_type: "Follow",
                                payload,
                                inboxes: vec![target.inbox_uri.clone()],
                            },
                        )
                        .await
                }
            }

            // A local account faved a status.
            (ActivityType::Create, ObjectType::Like) => {
                let fave = event.model.into_fave()?;
                let target = required_target(event.target_account)?;
                self.notify_fave(&fave).await?;
                // Fave counts changed everywhere the status is shown.
                self.unprepare_status(&fave.status_id).await?;
                let status = self
                    .storage
                    .get_status(&fave.status_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                self.federate_like(&fave, &event.origin_account, &target, &status.uri)
                    .await
            }

            // A local account boosted a status.
            (ActivityType::Create, ObjectType::Announce) => {
                let boost = event.model.into_status()?;
                self.timeline_status(&boost).await?;
                self.notify_announce(&boost).await?;

                let original_id = boost
                    .boost_of_id
                    .clone()
                    .ok_or_else(|| AppError::Validation("announce without a target".to_string()))?;
                self.unprepare_status(&original_id).await?;

                let original = self
                    .storage
                    .get_status(&original_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                let original_author = self
                    .storage
                    .get_account(&original.account_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                self.federate_announce(
                    &boost,
                    &event.origin_account,
                    &original.uri,
                    &original_author,
                )
                .await
            }

            // A local account blocked someone: neither side sees the other.
            (ActivityType::Create, ObjectType::Block) => {
                let block = event.model.into_block()?;
                let target = required_target(event.target_account)?;
                self.statuses
                    .wipe_items_from_account(&block.account_id, &block.target_account_id)
                    .await?;
                self.statuses
                    .wipe_items_from_account(&block.target_account_id, &block.account_id)
                    .await?;

                if !self.is_local(&target) {
                    let payload =
                        activity::block(&block.uri, &event.origin_account.uri, &target.uri);
                    self.federator
                        .send(
                            &event.origin_account,
                            OutgoingActivity {
                                activity_type: "Block",
                                payload,
                                inboxes: vec![target.inbox_uri.clone()],
                            },
                        )
                        .await?;
                }
                Ok(())
            }

            // A local account changed its profile: cached views embed it.
            (ActivityType::Update, ObjectType::Profile) => {
                let account = event.model.into_account()?;
                for status in self.storage.get_statuses_by_account(&account.id).await? {
                    self.unprepare_status(&status.id).await?;
                }
                self.federate_update_profile(&account).await
            }

            // A local account accepted a follow request.
            (ActivityType::Accept, ObjectType::Follow) => {
                let request = event.model.into_follow_request()?;
                let follower = required_target(event.target_account)?;
                let follow = self.storage.accept_follow_request(&request.id).await?;
                if !self.is_local(&follower) {
                    self.federate_accept(&event.origin_account, &follower, &follow.uri)
                        .await?;
                }
                self.notify_follow(&follow).await
            }

            // A local account rejected a follow request.
            (ActivityType::Reject, ObjectType::Follow) => {
                let request = event.model.into_follow_request()?;
                let follower = required_target(event.target_account)?;
                if let Some(stale) = self
                    .storage
                    .find_notification(
                        NotificationType::FollowRequest,
                        &request.target_account_id,
                        &request.account_id,
                        None,
                    )
                    .await?
                {
                    self.storage.delete_notification(&stale.id).await?;
                    self.notifications
                        .wipe_item_from_all_timelines(&stale.id)
                        .await?;
                }
                self.storage.delete_follow_request(&request.id).await?;
                if !self.is_local(&follower) {
                    self.federate_reject(&event.origin_account, &follower, &request.uri)
                        .await?;
                }
                Ok(())
            }

            // A local account unfollowed someone.
            (ActivityType::Undo, ObjectType::Follow) => {
                let follow = event.model.into_follow()?;
                let target = required_target(event.target_account)?;
                self.storage.delete_follow(&follow.id).await?;
                if !self.is_local(&target) {
                    self.federate_undo(
                        &event.origin_account,
                        &follow.uri,
                        "Follow",
                        vec![target.inbox_uri.clone()],
                    )
                    .await?;
                }
                Ok(())
            }

            // A local account removed a fave.
            (ActivityType::Undo, ObjectType::Like) => {
                let fave = event.model.into_fave()?;
                let target = required_target(event.target_account)?;
                self.storage.delete_fave(&fave.id).await?;
                self.unprepare_status(&fave.status_id).await?;
                if !self.is_local(&target) {
                    self.federate_undo(
                        &event.origin_account,
                        &fave.uri,
                        "Like",
                        vec![target.inbox_uri.clone()],
                    )
                    .await?;
                }
                Ok(())
            }

            // A local account took a boost back: the wrapper dies with it.
            (ActivityType::Undo, ObjectType::Announce) => {
                let boost = event.model.into_status()?;
                self.storage.delete_status(&boost.id).await?;
                self.delete_status_from_timelines(&boost.id).await?;
                if let Some(original_id) = boost.boost_of_id.as_deref() {
                    self.unprepare_status(original_id).await?;
                }

                let mut inboxes = self
                    .storage
                    .get_remote_follower_inboxes(&event.origin_account.id)
                    .await?;
                if let Some(target) = &event.target_account {
                    if !self.is_local(target) {
                        inboxes.push(target.inbox_uri.clone());
                    }
                }
                self.federate_undo(&event.origin_account, &boost.uri, "Announce", inboxes)
                    .await
            }

            // A local account lifted a block.
            (ActivityType::Undo, ObjectType::Block) => {
                let block = event.model.into_block()?;
                let target = required_target(event.target_account)?;
                if !self.is_local(&target) {
                    self.federate_undo(
                        &event.origin_account,
                        &block.uri,
                        "Block",
                        vec![target.inbox_uri.clone()],
                    )
                    .await?;
                }
                Ok(())
            }

            // A local account deleted its own status.
            (ActivityType::Delete, ObjectType::Note) => {
                let status = event.model.into_status()?;
                self.delete_status_cascade(&status, DeleteOrigin::Client)
                    .await?;
                self.federate_delete_status(&status, &event.origin_account)
                    .await
            }

            // A local account was removed.
            (ActivityType::Delete, ObjectType::Profile) => {
                let account = event.model.into_account()?;
                self.federate_delete_account(&account).await?;
                self.delete_account_cascade(&account, DeleteOrigin::Client)
                    .await
            }

            // A local account reported someone.
            (ActivityType::Flag, ObjectType::Profile) => {
                let report = event.model.into_report()?;
                let target = required_target(event.target_account)?;
                self.handle_report(&report, &target).await
            }

            // Unknown vocabulary; ignore it.
            (activity, object) => {
                debug!(
                    activity = activity.as_str(),
                    object = object.as_str(),
                    "no client route, ignoring"
                );
                Ok(())
            }
        }
    }
}
