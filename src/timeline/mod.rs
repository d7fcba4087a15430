//! Timeline engine
//!
//! An in-memory fan-out index over durable storage. Each (owner, kind)
//! pair gets its own [`Timeline`]: a strictly-descending, duplicate-free
//! index of ULIDs with an optional cached client representation per entry.
//! The [`Manager`] creates timelines lazily, routes the engine-wide
//! operations across all of them, and is generic over a
//! [`TimelineStrategy`] so statuses and notifications share the machinery.

pub mod cursor;
pub mod strategy;
mod timeline;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::config::TimelineConfig;
use crate::error::Result;
use crate::timeline::cursor::Cursor;
use crate::timeline::strategy::{TimelineKey, TimelineStrategy, Timelineable};
pub use crate::timeline::timeline::{
    Entry, IngestOutcome, PreparedEntry, Timeline, TimelinePage,
};

/// Owns every in-memory timeline for one strategy.
pub struct Manager<S: TimelineStrategy> {
    strategy: Arc<S>,
    config: TimelineConfig,
    registry: RwLock<HashMap<TimelineKey, Arc<Timeline<S>>>>,
}

impl<S: TimelineStrategy> Manager<S> {
    pub fn new(strategy: Arc<S>, config: TimelineConfig) -> Self {
        Self {
            strategy,
            config,
            registry: RwLock::new(HashMap::new()),
        }
    }

    /// Index one item into the timeline at `key`. Returns true when the
    /// item was inserted, false when filtered, collapsed, or a duplicate.
    pub async fn ingest_one(&self, key: TimelineKey, item: &S::Item) -> Result<bool> {
        let timeline = self.get_or_create(key);
        timeline.ingest(&self.strategy, item, false).await
    }

    /// Like [`Manager::ingest_one`] but also hydrates and caches the
    /// prepared representation when the insert lands.
    pub async fn ingest_and_prepare(&self, key: TimelineKey, item: &S::Item) -> Result<bool> {
        let timeline = self.get_or_create(key);
        timeline.ingest(&self.strategy, item, true).await
    }

    /// Serve one page of the timeline at `key`, newest first.
    pub async fn get_timeline(
        &self,
        key: TimelineKey,
        cursor: &Cursor,
    ) -> Result<TimelinePage<S::Prepared>> {
        let timeline = self.get_or_create(key);
        timeline.get(&self.strategy, cursor).await
    }

    /// Remove the item with `item_id` from every timeline that indexes it.
    /// Returns the keys of the timelines it was removed from, so the
    /// caller can push one delete per affected owner.
    pub async fn wipe_item_from_all_timelines(&self, item_id: &str) -> Result<Vec<TimelineKey>> {
        let mut affected = Vec::new();
        for timeline in self.snapshot() {
            if timeline.remove_item(item_id).await > 0 {
                affected.push(timeline.key().clone());
            }
        }
        debug!(item_id, timelines = affected.len(), "wiped item");
        Ok(affected)
    }

    /// Remove everything authored by `author_id` (and boost wrappers
    /// around that author's items) from every timeline owned by
    /// `owner_id`. Returns the total number of entries removed.
    pub async fn wipe_items_from_account(
        &self,
        owner_id: &str,
        author_id: &str,
    ) -> Result<usize> {
        let mut removed = 0;
        for timeline in self.snapshot() {
            if timeline.key().owner_id == owner_id {
                removed += timeline.remove_by_author(author_id).await;
            }
        }
        debug!(owner_id, author_id, removed, "wiped author's items");
        Ok(removed)
    }

    /// Invalidate the cached representation of `item_id` everywhere it is
    /// indexed. The entries stay; the next page request rehydrates them.
    pub async fn unprepare_item_from_all_timelines(&self, item_id: &str) -> Result<()> {
        for timeline in self.snapshot() {
            timeline.unprepare(item_id).await;
        }
        Ok(())
    }

    /// Number of entries currently indexed at `key` (0 when the timeline
    /// does not exist yet).
    pub async fn indexed_length(&self, key: &TimelineKey) -> usize {
        match self.lookup(key) {
            Some(timeline) => timeline.len().await,
            None => 0,
        }
    }

    /// Oldest id currently indexed at `key`.
    pub async fn oldest_indexed_id(&self, key: &TimelineKey) -> Option<String> {
        match self.lookup(key) {
            Some(timeline) => timeline.oldest_indexed_id().await,
            None => None,
        }
    }

    fn lookup(&self, key: &TimelineKey) -> Option<Arc<Timeline<S>>> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn get_or_create(&self, key: TimelineKey) -> Arc<Timeline<S>> {
        if let Some(timeline) = self.lookup(&key) {
            return timeline;
        }
        let mut registry = self
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        registry
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Timeline::new(key, self.config.clone())))
            .clone()
    }

    /// Snapshot of every live timeline; the registry lock is never held
    /// across an await.
    fn snapshot(&self) -> Vec<Arc<Timeline<S>>> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }
}
