//! Data models
//!
//! Rust structs representing the domain entities the engine fans out.
//! All models use ULID for IDs and chrono for timestamps. ULIDs sort
//! lexically in creation order, which is what keeps timelines ordered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Generate a ULID whose timestamp component matches `at`.
    ///
    /// Used when an entity arrives from a remote server carrying its own
    /// creation time; the minted id then sorts at that point in timelines.
    pub fn new_at(at: DateTime<Utc>) -> Self {
        Self(ulid::Ulid::from_datetime(at.into()).to_string())
    }

    /// Create from existing string
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Account
// =============================================================================

/// A local or remote account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    /// None for local accounts, the remote host otherwise
    pub domain: Option<String>,
    /// ActivityPub actor URI
    pub uri: String,
    /// Outbox URI used as the delivery origin for this account
    pub outbox_uri: String,
    /// Inbox URI for activity delivery
    pub inbox_uri: String,
    /// Shared (instance-level) inbox, if the remote advertises one
    pub shared_inbox_uri: Option<String>,
    pub display_name: Option<String>,
    /// Follow requests require manual approval
    pub locked: bool,
    /// RSA private key (PEM), set for local accounts only
    pub private_key_pem: Option<String>,
    pub public_key_pem: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// true if this account lives on this instance
    pub fn is_local(&self) -> bool {
        self.domain.is_none()
    }

    /// keyId URL for HTTP signatures
    pub fn key_id(&self) -> String {
        format!("{}#main-key", self.uri)
    }
}

// =============================================================================
// Status
// =============================================================================

/// Visibility of a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Unlisted,
    Private,
    Direct,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Unlisted => "unlisted",
            Self::Private => "private",
            Self::Direct => "direct",
        }
    }
}

/// A post, or the boost wrapper around another post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Status {
    pub id: String,
    /// ActivityPub URI (globally unique)
    pub uri: String,
    pub account_id: String,
    /// HTML content; empty for boost wrappers
    pub content: String,
    pub visibility: Visibility,
    /// Set when this status is a boost wrapper around another status
    pub boost_of_id: Option<String>,
    pub boost_of_account_id: Option<String>,
    /// Set when this status replies to another status
    pub in_reply_to_id: Option<String>,
    pub mention_ids: Vec<String>,
    pub attachment_ids: Vec<String>,
    /// Whether the author allows this status to leave the instance
    pub federated: bool,
    pub created_at: DateTime<Utc>,
}

impl Status {
    pub fn is_boost(&self) -> bool {
        self.boost_of_id.is_some()
    }

    pub fn is_reply(&self) -> bool {
        self.in_reply_to_id.is_some()
    }
}

/// A mention of one account inside a status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub id: String,
    pub status_id: String,
    pub origin_account_id: String,
    pub target_account_id: String,
}

// =============================================================================
// Relationships
// =============================================================================

/// An accepted follow relationship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follow {
    pub id: String,
    pub uri: String,
    /// The follower
    pub account_id: String,
    /// The followed account
    pub target_account_id: String,
    /// Show boosts by the followed account in the follower's home timeline
    pub show_reblogs: bool,
    /// Notify the follower about every new post by the followed account
    pub notify: bool,
    pub created_at: DateTime<Utc>,
}

/// A follow that has not been accepted yet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowRequest {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    pub created_at: DateTime<Utc>,
}

/// A block between two accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    pub created_at: DateTime<Utc>,
}

/// A favourite (like) of a status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusFave {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    pub status_id: String,
    pub created_at: DateTime<Utc>,
}

/// A user-curated list of followed accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct List {
    pub id: String,
    pub account_id: String,
    pub title: String,
}

// =============================================================================
// Notifications
// =============================================================================

/// Kind of notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Follow,
    FollowRequest,
    Mention,
    Reblog,
    Fave,
    /// New post by a followed account the user opted into
    Status,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Follow => "follow",
            Self::FollowRequest => "follow_request",
            Self::Mention => "mention",
            Self::Reblog => "reblog",
            Self::Fave => "fave",
            Self::Status => "status",
        }
    }
}

/// A notification shown to a local account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub notification_type: NotificationType,
    pub target_account_id: String,
    pub origin_account_id: String,
    /// Set for status-shaped notifications (mention, fave, reblog, status)
    pub status_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Reports
// =============================================================================

/// A report (flag) filed against an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub uri: String,
    pub account_id: String,
    pub target_account_id: String,
    pub comment: String,
    pub status_ids: Vec<String>,
    /// Forward an anonymized copy to the target's instance
    pub forward: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn entity_ids_sort_in_creation_order() {
        let older = EntityId::new_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let newer = EntityId::new_at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert!(older.0 < newer.0);
    }

    #[test]
    fn account_locality_follows_domain() {
        let mut account = Account {
            id: EntityId::new().0,
            username: "zork".to_string(),
            domain: None,
            uri: "https://local.example/users/zork".to_string(),
            outbox_uri: "https://local.example/users/zork/outbox".to_string(),
            inbox_uri: "https://local.example/users/zork/inbox".to_string(),
            shared_inbox_uri: None,
            display_name: None,
            locked: false,
            private_key_pem: None,
            public_key_pem: "pem".to_string(),
            created_at: Utc::now(),
        };
        assert!(account.is_local());

        account.domain = Some("remote.example".to_string());
        assert!(!account.is_local());
        assert_eq!(account.key_id(), "https://local.example/users/zork#main-key");
    }
}
