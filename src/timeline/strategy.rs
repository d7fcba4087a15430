//! Strategy seam for the timeline engine.
//!
//! The engine indexes and pages *anything* that can yield a sortable ULID
//! and an author; what gets indexed, how it's filtered per owner, and how
//! it's hydrated into a client shape is injected through
//! [`TimelineStrategy`]. Statuses and notifications each provide one
//! strategy and share the whole engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which timeline of an owner a key addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimelineKind {
    /// The owner's home timeline
    Home,
    /// One of the owner's lists
    List(String),
    /// The owner's notifications
    Notifications,
    /// The instance-wide public firehose, served read-through
    Public,
    /// Statuses the owner has faved, served read-through
    Favourites,
}

impl TimelineKind {
    /// Stable label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::List(_) => "list",
            Self::Notifications => "notifications",
            Self::Public => "public",
            Self::Favourites => "favourites",
        }
    }
}

/// Identifies one timeline: an owning account plus a kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineKey {
    pub owner_id: String,
    pub kind: TimelineKind,
}

impl TimelineKey {
    pub fn home(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            kind: TimelineKind::Home,
        }
    }

    pub fn list(owner_id: impl Into<String>, list_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            kind: TimelineKind::List(list_id.into()),
        }
    }

    pub fn notifications(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            kind: TimelineKind::Notifications,
        }
    }

    pub fn public(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            kind: TimelineKind::Public,
        }
    }

    pub fn favourites(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            kind: TimelineKind::Favourites,
        }
    }
}

/// Anything the engine can index.
///
/// IDs must be ULIDs (or anything else that sorts lexically by creation
/// time); the index relies on string comparison for ordering.
pub trait Timelineable: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    fn author_id(&self) -> &str;

    /// For boost wrappers: the wrapped item's id.
    fn boost_of_id(&self) -> Option<&str> {
        None
    }

    /// For boost wrappers: the wrapped item's author.
    fn boost_of_author_id(&self) -> Option<&str> {
        None
    }
}

/// The slice of an item the index retains.
///
/// Enough to sort, deduplicate, collapse boosts, and wipe by author
/// without holding the full item in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub id: String,
    pub author_id: String,
    pub boost_of_id: Option<String>,
    pub boost_of_author_id: Option<String>,
}

impl EntryMeta {
    pub fn from_item<T: Timelineable>(item: &T) -> Self {
        Self {
            id: item.id().to_string(),
            author_id: item.author_id().to_string(),
            boost_of_id: item.boost_of_id().map(str::to_string),
            boost_of_author_id: item.boost_of_author_id().map(str::to_string),
        }
    }

    /// true if this entry is, or wraps, the item with `item_id`.
    pub fn involves_item(&self, item_id: &str) -> bool {
        self.id == item_id || self.boost_of_id.as_deref() == Some(item_id)
    }

    /// true if this entry was authored by, or wraps an item authored by,
    /// `account_id`.
    pub fn involves_author(&self, account_id: &str) -> bool {
        self.author_id == account_id || self.boost_of_author_id.as_deref() == Some(account_id)
    }
}

/// Domain behaviour injected into the engine.
#[async_trait]
pub trait TimelineStrategy: Send + Sync + 'static {
    /// What gets indexed.
    type Item: Timelineable;
    /// The hydrated client representation cached alongside index entries.
    type Prepared: Clone + Send + Sync + 'static;

    /// Fetch up to `limit` items for `key` from durable storage, strictly
    /// older than `max_id` when given, newest first. An empty vec means the
    /// durable timeline is exhausted.
    async fn grab(
        &self,
        key: &TimelineKey,
        max_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Self::Item>>;

    /// Whether `item` belongs in the timeline at `key`. Runs before every
    /// insert, for ingested items and grabbed backfill alike.
    async fn filter(&self, key: &TimelineKey, item: &Self::Item) -> Result<bool>;

    /// Hydrate the item with `item_id` into its client representation.
    async fn prepare(&self, key: &TimelineKey, item_id: &str) -> Result<Self::Prepared>;

    /// Whether inserting `candidate` should be skipped because `existing`
    /// is already indexed nearby. Called once per already-indexed entry
    /// within the reinsertion window, newest first.
    fn skip_insert(&self, key: &TimelineKey, candidate: &EntryMeta, existing: &EntryMeta) -> bool;
}

/// Skip-insert rule that collapses repeat boosts of the same original.
///
/// Suppresses the candidate when the nearby entry already shows the same
/// underlying item: a boost of something indexed, a second boost of the
/// same original, or the original of something already boosted.
pub fn collapses_boost(candidate: &EntryMeta, existing: &EntryMeta) -> bool {
    if let Some(boost_of) = candidate.boost_of_id.as_deref() {
        if existing.id == boost_of || existing.boost_of_id.as_deref() == Some(boost_of) {
            return true;
        }
    }
    existing.boost_of_id.as_deref() == Some(candidate.id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, boost_of: Option<&str>) -> EntryMeta {
        EntryMeta {
            id: id.to_string(),
            author_id: "author".to_string(),
            boost_of_id: boost_of.map(str::to_string),
            boost_of_author_id: boost_of.map(|_| "original_author".to_string()),
        }
    }

    #[test]
    fn boost_of_indexed_original_collapses() {
        let candidate = meta("boost1", Some("original"));
        let existing = meta("original", None);
        assert!(collapses_boost(&candidate, &existing));
    }

    #[test]
    fn second_boost_of_same_original_collapses() {
        let candidate = meta("boost2", Some("original"));
        let existing = meta("boost1", Some("original"));
        assert!(collapses_boost(&candidate, &existing));
    }

    #[test]
    fn original_arriving_after_its_boost_collapses() {
        let candidate = meta("original", None);
        let existing = meta("boost1", Some("original"));
        assert!(collapses_boost(&candidate, &existing));
    }

    #[test]
    fn unrelated_entries_do_not_collapse() {
        let candidate = meta("a", None);
        let existing = meta("b", None);
        assert!(!collapses_boost(&candidate, &existing));

        let candidate = meta("boost_a", Some("a"));
        let existing = meta("boost_b", Some("b"));
        assert!(!collapses_boost(&candidate, &existing));
    }

    #[test]
    fn involves_checks_cover_boost_wrappers() {
        let entry = meta("boost1", Some("original"));
        assert!(entry.involves_item("boost1"));
        assert!(entry.involves_item("original"));
        assert!(!entry.involves_item("other"));
        assert!(entry.involves_author("author"));
        assert!(entry.involves_author("original_author"));
        assert!(!entry.involves_author("stranger"));
    }
}
