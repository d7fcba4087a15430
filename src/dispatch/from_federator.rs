//! Processing of activities received from remote servers.
//!
//! Signatures are verified and models persisted upstream; what reaches
//! this module is trusted input that still needs its local side effects.

use tracing::{debug, instrument};

use crate::data::models::Status;
use crate::dispatch::common::DeleteOrigin;
use crate::dispatch::event::{ActivityType, FederatorEvent, Model, ObjectType};
use crate::dispatch::Dispatcher;
use crate::error::{AppError, Result};
use crate::metrics;

impl Dispatcher {
    /// Route one remote-originated activity through its local side effects.
    #[instrument(skip_all, fields(activity = event.activity.as_str(), object = event.object.as_str()))]
    pub async fn process_from_federator(&self, event: FederatorEvent) -> Result<()> {
        metrics::EVENTS_PROCESSED_TOTAL
            .with_label_values(&["federator", event.activity.as_str(), event.object.as_str()])
            .inc();
        debug!("processing federator event");

        match (event.activity, event.object) {
            // A remote account posted something a local account follows.
            (ActivityType::Create, ObjectType::Note) => {
                let Some(status) = self.status_from_event(event.model, event.iri.as_deref()).await?
                else {
                    // The object is already gone on the remote end.
                    return Ok(());
                };
                self.timeline_status(&status).await?;
                self.notify_status_mentions(&status).await
            }

            // A remote account asked to follow a local one.
            (ActivityType::Create, ObjectType::Follow) => {
                let request = event
                    .model
                    .ok_or_else(|| missing_model("Follow"))?
                    .into_follow_request()?;
                let origin = self
                    .storage
                    .get_account(&request.account_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                self.handle_follow_request(&request, &origin, &event.receiving_account)
                    .await
            }

            // A remote account faved a local status.
            (ActivityType::Create, ObjectType::Like) => {
                let fave = event
                    .model
                    .ok_or_else(|| missing_model("Like"))?
                    .into_fave()?;
                self.notify_fave(&fave).await?;
                self.unprepare_status(&fave.status_id).await
            }

            // A remote account boosted a status local accounts can see.
            (ActivityType::Create, ObjectType::Announce) => {
                let boost = event
                    .model
                    .ok_or_else(|| missing_model("Announce"))?
                    .into_status()?;
                self.storage.put_status(&boost).await?;
                self.timeline_status(&boost).await?;
                self.notify_announce(&boost).await?;
                if let Some(original_id) = boost.boost_of_id.as_deref() {
                    self.unprepare_status(original_id).await?;
                }
                Ok(())
            }

            // A remote account blocked a local one.
            (ActivityType::Create, ObjectType::Block) => {
                let block = event
                    .model
                    .ok_or_else(|| missing_model("Block"))?
                    .into_block()?;
                self.statuses
                    .wipe_items_from_account(&block.account_id, &block.target_account_id)
                    .await?;
                self.statuses
                    .wipe_items_from_account(&block.target_account_id, &block.account_id)
                    .await?;
                Ok(())
            }

            // A remote account changed its profile; cached views embed it.
            (ActivityType::Update, ObjectType::Profile) => {
                let account = match event.model {
                    Some(model) => Some(model.into_account()?),
                    None => match event.iri.as_deref() {
                        Some(iri) => self.federator.dereference_account(iri).await?,
                        None => None,
                    },
                };
                let Some(account) = account else {
                    // Nothing resolvable to refresh.
                    return Ok(());
                };
                self.storage.put_account(&account).await?;
                for status in self.storage.get_statuses_by_account(&account.id).await? {
                    self.unprepare_status(&status.id).await?;
                }
                Ok(())
            }

            // A remote account accepted a local follow request.
            (ActivityType::Accept, ObjectType::Follow) => {
                let request = event
                    .model
                    .ok_or_else(|| missing_model("Follow"))?
                    .into_follow_request()?;
                let follow = self.storage.accept_follow_request(&request.id).await?;
                self.notify_follow(&follow).await
            }

            // A remote account rejected a local follow request.
            (ActivityType::Reject, ObjectType::Follow) => {
                let request = event
                    .model
                    .ok_or_else(|| missing_model("Follow"))?
                    .into_follow_request()?;
                self.storage.delete_follow_request(&request.id).await
            }

            // A remote account unfollowed a local one.
            (ActivityType::Undo, ObjectType::Follow) => {
                let follow = event
                    .model
                    .ok_or_else(|| missing_model("Follow"))?
                    .into_follow()?;
                self.storage.delete_follow(&follow.id).await
            }

            // A remote account took a fave back.
            (ActivityType::Undo, ObjectType::Like) => {
                let fave = event
                    .model
                    .ok_or_else(|| missing_model("Like"))?
                    .into_fave()?;
                self.storage.delete_fave(&fave.id).await?;
                self.unprepare_status(&fave.status_id).await
            }

            // A remote account took a boost back.
            (ActivityType::Undo, ObjectType::Announce) => {
                let boost = event
                    .model
                    .ok_or_else(|| missing_model("Announce"))?
                    .into_status()?;
                self.storage.delete_status(&boost.id).await?;
                self.delete_status_from_timelines(&boost.id).await?;
                if let Some(original_id) = boost.boost_of_id.as_deref() {
                    self.unprepare_status(original_id).await?;
                }
                Ok(())
            }

            // A remote account lifted a block; nothing local to restore.
            (ActivityType::Undo, ObjectType::Block) => Ok(()),

            // A remote status was deleted.
            (ActivityType::Delete, ObjectType::Note) => {
                let status = match event.model {
                    Some(model) => Some(model.into_status()?),
                    None => match event.iri.as_deref() {
                        Some(iri) => self.storage.get_status_by_uri(iri).await?,
                        None => None,
                    },
                };
                match status {
                    // Never indexed here: nothing to clean up.
                    None => Ok(()),
                    Some(status) => {
                        self.delete_status_cascade(&status, DeleteOrigin::Federator)
                            .await
                    }
                }
            }

            // A remote account was deleted.
            (ActivityType::Delete, ObjectType::Profile) => {
                let account = match event.model {
                    Some(model) => Some(model.into_account()?),
                    None => match event.iri.as_deref() {
                        Some(iri) => self.storage.get_account_by_uri(iri).await?,
                        None => None,
                    },
                };
                match account {
                    None => Ok(()),
                    Some(account) => {
                        self.delete_account_cascade(&account, DeleteOrigin::Federator)
                            .await
                    }
                }
            }

            // A remote server forwarded a report about a local account.
            (ActivityType::Flag, ObjectType::Profile) => {
                let report = event
                    .model
                    .ok_or_else(|| missing_model("Flag"))?
                    .into_report()?;
                let target = self
                    .storage
                    .get_account(&report.target_account_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                self.handle_report(&report, &target).await
            }

            // Unknown vocabulary from other implementations; ignore it.
            (activity, object) => {
                debug!(
                    activity = activity.as_str(),
                    object = object.as_str(),
                    "no federator route, ignoring"
                );
                Ok(())
            }
        }
    }

    /// The status an event is about: from its model when carried, from
    /// storage or the remote server via its IRI otherwise.
    async fn status_from_event(
        &self,
        model: Option<Model>,
        iri: Option<&str>,
    ) -> Result<Option<Status>> {
        match model {
            Some(model) => Ok(Some(model.into_status()?)),
            None => {
                let iri = iri.ok_or_else(|| {
                    AppError::Validation("event carries neither model nor IRI".to_string())
                })?;
                let Some(status) = self.federator.dereference_status(iri).await? else {
                    return Ok(None);
                };
                if self.storage.get_status(&status.id).await?.is_none() {
                    self.storage.put_status(&status).await?;
                }
                Ok(Some(status))
            }
        }
    }
}

fn missing_model(activity: &str) -> AppError {
    AppError::Validation(format!("{} event is missing its model", activity))
}
