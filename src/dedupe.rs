use crate::types::{NormalizedItem, SeenItemRecord};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::{debug, info};
use url::Url;

/// Query parameters that only carry tracking state and never change the
/// identity of the linked document.
fn is_tracking_param(name: &str) -> bool {
    name.starts_with("utm_")
        || matches!(name, "fbclid" | "gclid" | "ref" | "source" | "mc_cid" | "mc_eid")
}

/// Normalize a URL into its identity form: lowercase scheme/host (the url
/// crate does this on parse), fragment dropped, tracking query parameters
/// stripped, trailing slashes removed. Returns `None` for empty or
/// unparseable input, in which case identity falls back to the content hash.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut url = Url::parse(trimmed).ok()?;
    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    Some(url.to_string().trim_end_matches('/').to_string())
}

/// Deterministic digest over normalized title + body. Items with equal
/// hashes are the same logical item even when their URLs differ.
pub fn content_hash(title: &str, body_text: &str) -> String {
    let blob = format!(
        "{}|{}",
        title.trim().to_lowercase(),
        body_text.trim().to_lowercase()
    );
    let mut hasher = Sha256::new();
    hasher.update(blob.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Identity keys for one item: content hash always, normalized URL when
/// the item has one.
pub fn identity_keys(item: &NormalizedItem) -> (String, Option<String>) {
    (
        content_hash(&item.title, &item.body_text),
        normalize_url(&item.url),
    )
}

/// Build the seen record persisted for a fully processed item.
pub fn seen_record(item: &NormalizedItem) -> SeenItemRecord {
    let (hash, url) = identity_keys(item);
    SeenItemRecord {
        content_hash: hash,
        url: url.unwrap_or_default(),
        first_seen_at: Utc::now(),
    }
}

/// Filter a batch against the persisted seen keys and against itself.
///
/// Candidates are ordered by `published_at` ascending, then source priority
/// (higher wins), then identity key as the stable tiebreak; the first
/// occurrence of a duplicate wins and the returned items keep that order.
/// Pure function: persisting new seen records is the orchestrator's job.
pub fn dedupe(mut candidates: Vec<NormalizedItem>, seen: &HashSet<String>) -> Vec<NormalizedItem> {
    let total = candidates.len();
    candidates.sort_by(|a, b| {
        (a.published_at, Reverse(a.source_priority), sort_key(a))
            .cmp(&(b.published_at, Reverse(b.source_priority), sort_key(b)))
    });

    let mut batch_keys: HashSet<String> = HashSet::new();
    let mut unique = Vec::new();

    for item in candidates {
        let (hash, url) = identity_keys(&item);
        let mut keys = vec![hash];
        if let Some(url) = url {
            keys.push(url);
        }

        if keys.iter().any(|k| seen.contains(k)) {
            debug!("Dropping already-seen item: {}", item.title);
            continue;
        }
        if keys.iter().any(|k| batch_keys.contains(k)) {
            debug!("Dropping in-batch duplicate: {}", item.title);
            continue;
        }
        batch_keys.extend(keys);
        unique.push(item);
    }

    let dropped = total - unique.len();
    if dropped > 0 {
        info!("Deduplication removed {} items ({} -> {})", dropped, total, unique.len());
    }
    unique
}

fn sort_key(item: &NormalizedItem) -> String {
    normalize_url(&item.url).unwrap_or_else(|| content_hash(&item.title, &item.body_text))
}
