//! `Link` header construction for paged responses.
//!
//! Pages are addressed by the ids at their edges: `next` re-queries with
//! `max_id` set to the oldest id served, `prev` with `min_id` set to the
//! newest. `next` is omitted once the timeline is exhausted; `prev` is
//! offered on every non-empty page. An empty page produces no header at
//! all.

use http::HeaderValue;
use url::Url;

use crate::error::{AppError, Result};
use crate::timeline::TimelinePage;

/// Build the `Link` header value for `page` as served from `endpoint`.
///
/// `endpoint` is the full request URL of the timeline route; existing
/// paging parameters on it are replaced, everything else is preserved.
/// Returns `Ok(None)` for an empty page.
pub fn link_header<P>(
    endpoint: &Url,
    page: &TimelinePage<P>,
    limit: usize,
) -> Result<Option<HeaderValue>> {
    let (Some(newest), Some(oldest)) = (page.newest_id(), page.oldest_id()) else {
        return Ok(None);
    };

    let mut parts = Vec::with_capacity(2);
    if page.has_more {
        let next = rewrite(endpoint, &[("max_id", oldest), ("limit", &limit.to_string())]);
        parts.push(format!("<{next}>; rel=\"next\""));
    }
    let prev = rewrite(endpoint, &[("min_id", newest), ("limit", &limit.to_string())]);
    parts.push(format!("<{prev}>; rel=\"prev\""));

    let value = parts.join(", ");
    HeaderValue::from_str(&value)
        .map(Some)
        .map_err(|e| AppError::Conversion(format!("invalid Link header: {e}")))
}

/// Parse a `max_id` back out of a `next` link target, for clients (and
/// tests) walking a timeline to completion.
pub fn max_id_of(link_target: &str) -> Option<String> {
    let url = Url::parse(link_target).ok()?;
    url.query_pairs()
        .find(|(name, _)| name == "max_id")
        .map(|(_, value)| value.into_owned())
}

const PAGING_PARAMS: [&str; 4] = ["max_id", "since_id", "min_id", "limit"];

fn rewrite(endpoint: &Url, params: &[(&str, &str)]) -> Url {
    let mut url = endpoint.clone();
    let kept: Vec<(String, String)> = endpoint
        .query_pairs()
        .filter(|(name, _)| !PAGING_PARAMS.contains(&name.as_ref()))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (name, value) in &kept {
            pairs.append_pair(name, value);
        }
        for (name, value) in params {
            pairs.append_pair(name, value);
        }
    }
    url
}
