//! HTTP delivery of signed activities to remote inboxes.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::data::models::{Account, EntityId, Status, Visibility};
use crate::data::Storage;
use crate::error::{AppError, Result};
use crate::federation::{signature, Federator, OutgoingActivity};
use crate::metrics;

const MAX_CONCURRENT_DELIVERIES: usize = 10;

/// Signed-HTTP implementation of [`Federator`].
pub struct HttpFederator {
    http_client: Arc<reqwest::Client>,
    storage: Arc<dyn Storage>,
}

/// Deduplicate identical inbox URIs while keeping distinct personal
/// inboxes. Grouping by domain instead would drop recipients on the same
/// host with different inbox paths.
fn unique_inbox_targets(inbox_uris: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for inbox_uri in inbox_uris {
        if seen.insert(inbox_uri.clone()) {
            targets.push(inbox_uri);
        }
    }
    targets
}

impl HttpFederator {
    pub fn new(http_client: Arc<reqwest::Client>, storage: Arc<dyn Storage>) -> Self {
        Self {
            http_client,
            storage,
        }
    }

    async fn deliver_to_inbox(
        &self,
        inbox_uri: &str,
        key_id: &str,
        private_key_pem: &str,
        body: &[u8],
    ) -> Result<()> {
        let sig_headers =
            signature::sign_request("POST", inbox_uri, Some(body), private_key_pem, key_id)?;

        let mut request = self
            .http_client
            .post(inbox_uri)
            .header("Content-Type", "application/activity+json")
            .header("Date", sig_headers.date)
            .header("Signature", sig_headers.signature);
        if let Some(digest) = sig_headers.digest {
            request = request.header("Digest", digest);
        }

        let response = request.body(body.to_vec()).send().await.map_err(|e| {
            AppError::Federation(format!("Failed to deliver to {}: {}", inbox_uri, e))
        })?;

        if !response.status().is_success() {
            return Err(AppError::Federation(format!(
                "Inbox {} rejected activity: HTTP {}",
                inbox_uri,
                response.status()
            )));
        }
        Ok(())
    }

    async fn fetch_object(&self, uri: &str) -> Result<Option<serde_json::Value>> {
        let response = self
            .http_client
            .get(uri)
            .header("Accept", "application/activity+json")
            .send()
            .await
            .map_err(|e| AppError::Federation(format!("Failed to fetch {}: {}", uri, e)))?;

        match response.status() {
            status if status.is_success() => {
                let object = response.json().await.map_err(|e| {
                    AppError::Federation(format!("Failed to parse {}: {}", uri, e))
                })?;
                Ok(Some(object))
            }
            reqwest::StatusCode::NOT_FOUND | reqwest::StatusCode::GONE => Ok(None),
            status => Err(AppError::Federation(format!(
                "Fetching {} failed: HTTP {}",
                uri, status
            ))),
        }
    }
}

#[async_trait]
impl Federator for HttpFederator {
    async fn send(&self, sender: &Account, activity: OutgoingActivity) -> Result<()> {
        let private_key_pem = sender.private_key_pem.as_deref().ok_or_else(|| {
            AppError::Federation(format!(
                "Account {} has no private key and cannot federate",
                sender.id
            ))
        })?;
        let key_id = sender.key_id();

        let body = serde_json::to_vec(&activity.payload)
            .map_err(|e| AppError::Validation(format!("Failed to serialize activity: {}", e)))?;

        let total = activity.inboxes.len();
        let targets = unique_inbox_targets(activity.inboxes);
        info!(
            activity_type = activity.activity_type,
            unique = targets.len(),
            total,
            "delivering activity"
        );

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_DELIVERIES));
        let futures = targets.into_iter().map(|inbox_uri| {
            let semaphore = semaphore.clone();
            let key_id = key_id.clone();
            let body = &body;
            let private_key_pem = private_key_pem.to_string();
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| AppError::Federation("delivery pool closed".to_string()))?;
                self.deliver_to_inbox(&inbox_uri, &key_id, &private_key_pem, body)
                    .await
                    .map_err(|e| {
                        warn!(inbox = %inbox_uri, error = %e, "delivery failed");
                        e
                    })
            }
        });

        let results = futures::future::join_all(futures).await;
        let mut failures = Vec::new();
        for result in results {
            let outcome = if result.is_ok() { "ok" } else { "failed" };
            metrics::FEDERATION_DELIVERIES_TOTAL
                .with_label_values(&[activity.activity_type, outcome])
                .inc();
            if let Err(e) = result {
                failures.push(e.to_string());
            }
        }

        AppError::from_fanout(failures)
    }

    async fn dereference_status(&self, uri: &str) -> Result<Option<Status>> {
        if let Some(status) = self.storage.get_status_by_uri(uri).await? {
            return Ok(Some(status));
        }

        let Some(object) = self.fetch_object(uri).await? else {
            return Ok(None);
        };

        let attributed_to = object
            .get("attributedTo")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AppError::Federation(format!("Object {} missing attributedTo", uri))
            })?;
        // Unknown authors are the caller's problem to dereference first.
        let Some(author) = self.storage.get_account_by_uri(attributed_to).await? else {
            return Ok(None);
        };

        let published = object
            .get("published")
            .and_then(|v| v.as_str())
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now);

        Ok(Some(Status {
            // Mint the id at the remote publish time so it sorts correctly.
            id: EntityId::new_at(published).0,
            uri: uri.to_string(),
            account_id: author.id,
            content: object
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            visibility: Visibility::Public,
            boost_of_id: None,
            boost_of_account_id: None,
            in_reply_to_id: None,
            mention_ids: Vec::new(),
            attachment_ids: Vec::new(),
            federated: true,
            created_at: published,
        }))
    }

    async fn dereference_account(&self, uri: &str) -> Result<Option<Account>> {
        if let Some(account) = self.storage.get_account_by_uri(uri).await? {
            return Ok(Some(account));
        }

        let Some(actor) = self.fetch_object(uri).await? else {
            return Ok(None);
        };

        let username = actor
            .get("preferredUsername")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AppError::Federation(format!("Actor {} missing preferredUsername", uri))
            })?;
        let inbox_uri = actor
            .get("inbox")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Federation(format!("Actor {} missing inbox", uri)))?;
        let public_key_pem = actor
            .get("publicKey")
            .and_then(|key| key.get("publicKeyPem"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Federation(format!("Actor {} missing public key", uri)))?;

        let domain = url::Url::parse(uri)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| AppError::Validation(format!("Invalid actor URI: {}", uri)))?;

        Ok(Some(Account {
            id: EntityId::new().0,
            username: username.to_string(),
            domain: Some(domain),
            uri: uri.to_string(),
            outbox_uri: actor
                .get("outbox")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            inbox_uri: inbox_uri.to_string(),
            shared_inbox_uri: actor
                .get("endpoints")
                .and_then(|e| e.get("sharedInbox"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            display_name: actor
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            locked: actor
                .get("manuallyApprovesFollowers")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            private_key_pem: None,
            public_key_pem: public_key_pem.to_string(),
            created_at: chrono::Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_inbox_targets_keeps_distinct_personal_inboxes_on_same_domain() {
        let targets = unique_inbox_targets(vec![
            "https://instance1.com/users/alice/inbox".to_string(),
            "https://instance1.com/users/bob/inbox".to_string(),
            "https://instance2.com/inbox".to_string(),
        ]);
        assert_eq!(targets.len(), 3);
    }

    #[test]
    fn unique_inbox_targets_deduplicates_identical_shared_inboxes() {
        let targets = unique_inbox_targets(vec![
            "https://instance1.com/inbox".to_string(),
            "https://instance1.com/inbox".to_string(),
            "https://instance2.com/inbox".to_string(),
        ]);
        assert_eq!(
            targets,
            vec![
                "https://instance1.com/inbox".to_string(),
                "https://instance2.com/inbox".to_string(),
            ]
        );
    }

    #[test]
    fn unique_inbox_targets_handles_empty_input() {
        assert!(unique_inbox_targets(vec![]).is_empty());
    }

    #[tokio::test]
    async fn dereference_status_prefers_the_stored_copy() {
        let mut storage = crate::data::MockStorage::new();
        storage.expect_get_status_by_uri().returning(|uri| {
            Ok(Some(Status {
                id: "01".to_string(),
                uri: uri.to_string(),
                account_id: "A1".to_string(),
                content: "<p>hi</p>".to_string(),
                visibility: Visibility::Public,
                boost_of_id: None,
                boost_of_account_id: None,
                in_reply_to_id: None,
                mention_ids: Vec::new(),
                attachment_ids: Vec::new(),
                federated: true,
                created_at: chrono::Utc::now(),
            }))
        });

        let federator = HttpFederator::new(
            Arc::new(reqwest::Client::new()),
            Arc::new(storage),
        );
        let status = federator
            .dereference_status("https://remote.example/statuses/1")
            .await
            .unwrap();
        // No network round trip: the local copy wins.
        assert_eq!(status.unwrap().id, "01");
    }
}
