//! Prepared client representations
//!
//! A "prepared" view is the fully hydrated, serializable shape a client
//! receives: the status plus its author, interaction counts, and (for
//! boosts) the wrapped original. Building one costs several storage reads,
//! which is why timelines cache them next to the index entry and drop the
//! cache when counts go stale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::models::{Account, Notification, NotificationType, Status, Visibility};

/// Client-facing account representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
    pub id: String,
    pub username: String,
    /// `username` for local accounts, `username@domain` for remote ones
    pub acct: String,
    pub display_name: String,
    pub url: String,
    pub locked: bool,
}

impl AccountView {
    pub fn from_model(account: &Account) -> Self {
        let acct = match &account.domain {
            None => account.username.clone(),
            Some(domain) => format!("{}@{}", account.username, domain),
        };
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            acct,
            display_name: account
                .display_name
                .clone()
                .unwrap_or_else(|| account.username.clone()),
            url: account.uri.clone(),
            locked: account.locked,
        }
    }
}

/// Client-facing status representation with interaction counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusView {
    pub id: String,
    pub uri: String,
    pub created_at: DateTime<Utc>,
    pub account: AccountView,
    pub content: String,
    pub visibility: Visibility,
    pub replies_count: i64,
    pub reblogs_count: i64,
    pub favourites_count: i64,
    /// Present when this status is a boost wrapper
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reblog: Option<Box<StatusView>>,
}

impl StatusView {
    /// Assemble a view from its already-fetched parts.
    ///
    /// Counts come from storage at prepare time; the caller invalidates the
    /// cached view (unprepare) whenever they change.
    pub fn from_parts(
        status: &Status,
        account: &Account,
        replies_count: i64,
        reblogs_count: i64,
        favourites_count: i64,
        reblog: Option<StatusView>,
    ) -> Self {
        Self {
            id: status.id.clone(),
            uri: status.uri.clone(),
            created_at: status.created_at,
            account: AccountView::from_model(account),
            content: status.content.clone(),
            visibility: status.visibility,
            replies_count,
            reblogs_count,
            favourites_count,
            reblog: reblog.map(Box::new),
        }
    }
}

/// Client-facing notification representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationView {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub created_at: DateTime<Utc>,
    pub account: AccountView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusView>,
}

impl NotificationView {
    pub fn from_parts(
        notification: &Notification,
        origin_account: &Account,
        status: Option<StatusView>,
    ) -> Self {
        Self {
            id: notification.id.clone(),
            notification_type: notification.notification_type,
            created_at: notification.created_at,
            account: AccountView::from_model(origin_account),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::EntityId;

    fn account(username: &str, domain: Option<&str>) -> Account {
        Account {
            id: EntityId::new().0,
            username: username.to_string(),
            domain: domain.map(str::to_string),
            uri: format!("https://example.org/users/{username}"),
            outbox_uri: format!("https://example.org/users/{username}/outbox"),
            inbox_uri: format!("https://example.org/users/{username}/inbox"),
            shared_inbox_uri: None,
            display_name: None,
            locked: false,
            private_key_pem: None,
            public_key_pem: "pem".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn acct_includes_domain_for_remote_accounts() {
        let local = AccountView::from_model(&account("ada", None));
        assert_eq!(local.acct, "ada");

        let remote = AccountView::from_model(&account("ada", Some("remote.example")));
        assert_eq!(remote.acct, "ada@remote.example");
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let view = AccountView::from_model(&account("grace", None));
        assert_eq!(view.display_name, "grace");
    }
}
