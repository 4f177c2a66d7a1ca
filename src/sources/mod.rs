pub mod rss_feed;

pub use rss_feed::RssSource;

use crate::types::{NormalizedItem, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// A source of raw items. One source's failure must never fail the whole
/// run; the orchestrator logs it and continues with a reduced candidate set.
#[async_trait]
pub trait FetchSource: Send + Sync {
    /// Stable identifier of the originating feed/channel.
    fn source_id(&self) -> String;

    fn source_name(&self) -> String;

    /// 0-255, higher = more priority. Carried onto fetched items for the
    /// deduplicator's tie-break.
    fn priority(&self) -> u8;

    /// Fetch items published after `since`.
    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<NormalizedItem>>;
}

/// Fixed-item source for tests and offline runs. Returns its queued batch
/// once, then nothing, mimicking a feed that has gone quiet.
pub struct StaticSource {
    id: String,
    priority: u8,
    batches: Mutex<Vec<Vec<NormalizedItem>>>,
}

impl StaticSource {
    pub fn new(id: impl Into<String>, priority: u8) -> Self {
        Self {
            id: id.into(),
            priority,
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn push_batch(&self, items: Vec<NormalizedItem>) {
        self.batches.lock().expect("static source lock").push(items);
    }
}

#[async_trait]
impl FetchSource for StaticSource {
    fn source_id(&self) -> String {
        self.id.clone()
    }

    fn source_name(&self) -> String {
        format!("static:{}", self.id)
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<NormalizedItem>> {
        let mut batches = self.batches.lock().expect("static source lock");
        if batches.is_empty() {
            return Ok(Vec::new());
        }
        let batch = batches.remove(0);
        Ok(batch
            .into_iter()
            .filter(|item| item.published_at > since)
            .collect())
    }
}
