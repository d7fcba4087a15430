//! A single in-memory timeline: the ordered index plus its prepared cache.

use tokio::sync::Mutex;
use tracing::warn;

use crate::config::TimelineConfig;
use crate::error::Result;
use crate::metrics;
use crate::timeline::cursor::Cursor;
use crate::timeline::strategy::{EntryMeta, TimelineKey, TimelineStrategy, Timelineable};

/// How many times a page request will reach into durable storage to
/// backfill a thin index before serving what it has.
const GRAB_RETRIES: usize = 5;

/// One indexed entry: sortable metadata plus the optionally-cached
/// prepared representation.
#[derive(Debug, Clone)]
pub struct Entry<P> {
    pub meta: EntryMeta,
    pub prepared: Option<P>,
}

/// Why an ingest did or didn't insert. Used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    Filtered,
    Duplicate,
    Collapsed,
}

impl IngestOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Filtered => "filtered",
            Self::Duplicate => "duplicate",
            Self::Collapsed => "collapsed",
        }
    }
}

/// An id paired with its prepared representation, as served to clients.
#[derive(Debug, Clone)]
pub struct PreparedEntry<P> {
    pub id: String,
    pub prepared: P,
}

/// One page of a timeline, newest first.
#[derive(Debug, Clone)]
pub struct TimelinePage<P> {
    pub entries: Vec<PreparedEntry<P>>,
    /// Whether older entries exist beyond this page.
    pub has_more: bool,
}

impl<P> TimelinePage<P> {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            has_more: false,
        }
    }

    /// Newest id on the page, for a `prev` paging link.
    pub fn newest_id(&self) -> Option<&str> {
        self.entries.first().map(|e| e.id.as_str())
    }

    /// Oldest id on the page, for a `next` paging link.
    pub fn oldest_id(&self) -> Option<&str> {
        self.entries.last().map(|e| e.id.as_str())
    }
}

/// One owner's timeline of one kind.
///
/// The index lives behind a `tokio::sync::Mutex` and is held across the
/// strategy's async calls, so a page request observes a consistent index
/// from backfill through hydration. Entries are kept strictly descending
/// by id with no duplicates.
pub struct Timeline<S: TimelineStrategy> {
    key: TimelineKey,
    config: TimelineConfig,
    inner: Mutex<Vec<Entry<S::Prepared>>>,
}

impl<S: TimelineStrategy> Timeline<S> {
    pub fn new(key: TimelineKey, config: TimelineConfig) -> Self {
        Self {
            key,
            config,
            inner: Mutex::new(Vec::new()),
        }
    }

    pub fn key(&self) -> &TimelineKey {
        &self.key
    }

    /// Number of indexed entries.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn oldest_indexed_id(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .last()
            .map(|entry| entry.meta.id.clone())
    }

    /// Run `item` through filter, skip-insert, and the duplicate check,
    /// then index it. Returns true only when the item was inserted.
    pub async fn ingest(&self, strategy: &S, item: &S::Item, prepare: bool) -> Result<bool> {
        if !strategy.filter(&self.key, item).await? {
            self.record_ingest(IngestOutcome::Filtered);
            return Ok(false);
        }

        let meta = EntryMeta::from_item(item);
        let mut entries = self.inner.lock().await;
        let outcome = Self::insert_indexed(&self.key, &self.config, strategy, &mut entries, meta);
        self.record_ingest(outcome);

        if outcome != IngestOutcome::Inserted {
            return Ok(false);
        }

        metrics::TIMELINE_ENTRIES
            .with_label_values(&[self.key.kind.label()])
            .set(entries.len() as i64);

        if prepare {
            // The lock is still held, so the entry cannot move under us.
            // A failed prepare leaves the entry uncached; the next page
            // request retries it.
            match strategy.prepare(&self.key, item.id()).await {
                Ok(prepared) => {
                    if let Some(entry) = entries.iter_mut().find(|e| e.meta.id == item.id()) {
                        entry.prepared = Some(prepared);
                    }
                }
                Err(e) => {
                    warn!(item = item.id(), error = %e, "prepare failed on ingest");
                }
            }
        }

        Ok(true)
    }

    /// Serve one page for `cursor`, backfilling the index from durable
    /// storage when it runs thin and hydrating any uncached entries.
    pub async fn get(&self, strategy: &S, cursor: &Cursor) -> Result<TimelinePage<S::Prepared>> {
        let limit = cursor.effective_limit(&self.config);
        let mut entries = self.inner.lock().await;

        // min_id pages backward toward the present and never backfills:
        // everything newer than min_id is already the hot end of the index.
        let selected: Vec<usize> = if let Some(min_id) = cursor.min_id.as_deref() {
            Self::select_before(&entries, min_id, cursor.max_id.as_deref(), limit)
        } else {
            self.fill_behind(strategy, &mut entries, cursor, limit).await?;
            Self::select_behind(
                &entries,
                cursor.max_id.as_deref(),
                cursor.since_id.as_deref(),
                limit,
            )
        };

        let has_more = match selected.last() {
            None => false,
            Some(&last) => entries
                .get(last + 1)
                .is_some_and(|next| match cursor.since_id.as_deref() {
                    Some(since) => next.meta.id.as_str() > since,
                    None => true,
                }),
        };

        let mut page = Vec::with_capacity(selected.len());
        for index in selected {
            let id = entries[index].meta.id.clone();
            let prepared = match &entries[index].prepared {
                Some(prepared) => {
                    metrics::PREPARE_CACHE_HITS_TOTAL
                        .with_label_values(&[self.key.kind.label()])
                        .inc();
                    prepared.clone()
                }
                None => {
                    metrics::PREPARE_CACHE_MISSES_TOTAL
                        .with_label_values(&[self.key.kind.label()])
                        .inc();
                    // One unpreparable entry must not fail the page: skip
                    // it and serve the rest.
                    match strategy.prepare(&self.key, &id).await {
                        Ok(prepared) => {
                            entries[index].prepared = Some(prepared.clone());
                            prepared
                        }
                        Err(e) => {
                            warn!(item = %id, error = %e, "skipping entry that failed to prepare");
                            continue;
                        }
                    }
                }
            };
            page.push(PreparedEntry { id, prepared });
        }

        metrics::TIMELINE_PAGES_SERVED_TOTAL
            .with_label_values(&[self.key.kind.label()])
            .inc();

        Ok(TimelinePage {
            entries: page,
            has_more,
        })
    }

    /// Drop every entry that is exactly `item_id`. Returns how many were
    /// removed (0 or 1, ids are unique per index).
    pub async fn remove_item(&self, item_id: &str) -> usize {
        let mut entries = self.inner.lock().await;
        let before = entries.len();
        entries.retain(|entry| entry.meta.id != item_id);
        let removed = before - entries.len();
        if removed > 0 {
            metrics::TIMELINE_ENTRIES
                .with_label_values(&[self.key.kind.label()])
                .set(entries.len() as i64);
        }
        removed
    }

    /// Drop every entry authored by `account_id`, including boost wrappers
    /// around that account's items. Returns how many were removed.
    pub async fn remove_by_author(&self, account_id: &str) -> usize {
        let mut entries = self.inner.lock().await;
        let before = entries.len();
        entries.retain(|entry| !entry.meta.involves_author(account_id));
        let removed = before - entries.len();
        if removed > 0 {
            metrics::TIMELINE_ENTRIES
                .with_label_values(&[self.key.kind.label()])
                .set(entries.len() as i64);
        }
        removed
    }

    /// Invalidate the cached representation of `item_id` (and of any boost
    /// wrapper around it) without touching its index position.
    pub async fn unprepare(&self, item_id: &str) -> bool {
        let mut entries = self.inner.lock().await;
        let mut touched = false;
        for entry in entries.iter_mut() {
            if entry.meta.involves_item(item_id) {
                entry.prepared = None;
                touched = true;
            }
        }
        touched
    }

    // --- index internals, all under the lock ---

    fn insert_indexed(
        key: &TimelineKey,
        config: &TimelineConfig,
        strategy: &S,
        entries: &mut Vec<Entry<S::Prepared>>,
        meta: EntryMeta,
    ) -> IngestOutcome {
        let window = entries.len().min(config.reinsertion_depth);
        for existing in &entries[..window] {
            if strategy.skip_insert(key, &meta, &existing.meta) {
                return IngestOutcome::Collapsed;
            }
        }

        // Entries are strictly descending, so partition_point lands on the
        // insert position and exposes an exact duplicate as the neighbour.
        let position = entries.partition_point(|entry| entry.meta.id > meta.id);
        if entries
            .get(position)
            .is_some_and(|entry| entry.meta.id == meta.id)
        {
            return IngestOutcome::Duplicate;
        }

        entries.insert(
            position,
            Entry {
                meta,
                prepared: None,
            },
        );

        // Evict the oldest tail past capacity; storage keeps the history.
        if entries.len() > config.max_entries {
            entries.truncate(config.max_entries);
        }

        IngestOutcome::Inserted
    }

    /// Indices of up to `limit` entries strictly older than `max_id` (when
    /// given) and strictly newer than `since_id` (when given), newest first.
    fn select_behind(
        entries: &[Entry<S::Prepared>],
        max_id: Option<&str>,
        since_id: Option<&str>,
        limit: usize,
    ) -> Vec<usize> {
        let start = match max_id {
            Some(max) => entries.partition_point(|entry| entry.meta.id.as_str() >= max),
            None => 0,
        };
        entries[start..]
            .iter()
            .enumerate()
            .take_while(|(_, entry)| match since_id {
                Some(since) => entry.meta.id.as_str() > since,
                None => true,
            })
            .take(limit)
            .map(|(offset, _)| start + offset)
            .collect()
    }

    /// Indices of the page immediately newer than `min_id`: the `limit`
    /// oldest entries strictly newer than it, still reported newest first.
    fn select_before(
        entries: &[Entry<S::Prepared>],
        min_id: &str,
        max_id: Option<&str>,
        limit: usize,
    ) -> Vec<usize> {
        let start = match max_id {
            Some(max) => entries.partition_point(|entry| entry.meta.id.as_str() >= max),
            None => 0,
        };
        let end = entries.partition_point(|entry| entry.meta.id.as_str() > min_id);
        let window = &entries[start..end];
        let skip = window.len().saturating_sub(limit);
        (start + skip..end).collect()
    }

    /// Pull older items from durable storage until the index can satisfy
    /// the request, the source is exhausted, or the retry bound is hit.
    ///
    /// Fills one entry past the page so the caller can tell whether older
    /// items remain, rather than reporting a cold index as exhausted.
    async fn fill_behind(
        &self,
        strategy: &S,
        entries: &mut Vec<Entry<S::Prepared>>,
        cursor: &Cursor,
        limit: usize,
    ) -> Result<()> {
        let wanted = limit + 1;
        for _ in 0..GRAB_RETRIES {
            let selected = Self::select_behind(
                entries,
                cursor.max_id.as_deref(),
                cursor.since_id.as_deref(),
                wanted,
            );
            if selected.len() >= wanted || entries.len() >= self.config.max_entries {
                return Ok(());
            }

            let oldest = entries.last().map(|entry| entry.meta.id.clone());
            let behind = match (&oldest, &cursor.max_id) {
                // Nothing indexed older than max_id yet: grab behind max_id.
                (Some(o), Some(m)) if o.as_str() >= m.as_str() => Some(m.clone()),
                (None, Some(m)) => Some(m.clone()),
                _ => oldest,
            };
            let grabbed = strategy.grab(&self.key, behind.as_deref(), wanted).await?;
            if grabbed.is_empty() {
                return Ok(());
            }

            for item in &grabbed {
                if strategy.filter(&self.key, item).await? {
                    let meta = EntryMeta::from_item(item);
                    Self::insert_indexed(&self.key, &self.config, strategy, entries, meta);
                }
            }

            metrics::TIMELINE_ENTRIES
                .with_label_values(&[self.key.kind.label()])
                .set(entries.len() as i64);
        }
        Ok(())
    }

    fn record_ingest(&self, outcome: IngestOutcome) {
        metrics::TIMELINE_INGESTS_TOTAL
            .with_label_values(&[self.key.kind.label(), outcome.label()])
            .inc();
    }
}
