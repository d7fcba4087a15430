//! Cursor parameters for timeline paging.

use serde::{Deserialize, Serialize};

use crate::config::TimelineConfig;

/// Client-supplied paging parameters.
///
/// Semantics follow the Mastodon paging convention:
/// - `max_id`: return entries strictly older than this id
/// - `since_id`: return no entries at or older than this id; the page still
///   starts from the newest available
/// - `min_id`: return the page of entries immediately newer than this id
///   (paging backward toward the present)
///
/// `min_id` and `since_id` are mutually exclusive; when both appear,
/// `min_id` wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub max_id: Option<String>,
    pub since_id: Option<String>,
    pub min_id: Option<String>,
    pub limit: Option<usize>,
}

impl Cursor {
    /// A cursor for the newest page with the default limit.
    pub fn top() -> Self {
        Self::default()
    }

    /// Page size after clamping to the configured bounds.
    pub fn effective_limit(&self, config: &TimelineConfig) -> usize {
        self.limit
            .unwrap_or(config.default_limit)
            .clamp(config.min_limit, config.max_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        let config = TimelineConfig::default();

        assert_eq!(Cursor::top().effective_limit(&config), 20);

        let mut cursor = Cursor::top();
        cursor.limit = Some(0);
        assert_eq!(cursor.effective_limit(&config), 1);

        cursor.limit = Some(500);
        assert_eq!(cursor.effective_limit(&config), 40);

        cursor.limit = Some(7);
        assert_eq!(cursor.effective_limit(&config), 7);
    }
}
