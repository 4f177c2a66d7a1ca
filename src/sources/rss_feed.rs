use super::FetchSource;
use crate::config::SourceConfig;
use crate::types::{BriefError, NormalizedItem, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use std::time::Duration;
use tracing::{debug, info, warn};

/// RSS/Atom feed source: fetches the feed document, parses it with feed-rs
/// and maps entries into `NormalizedItem`s inside the since-window.
pub struct RssSource {
    config: SourceConfig,
    client: reqwest::Client,
    max_items: usize,
}

impl RssSource {
    pub fn new(config: SourceConfig, timeout: Duration, max_items: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("world-brief/0.1")
            .timeout(timeout)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;
        Ok(Self {
            config,
            client,
            max_items,
        })
    }

    fn entry_to_item(&self, entry: feed_rs::model::Entry) -> Option<NormalizedItem> {
        // Entries without a publication date cannot be windowed; skip them.
        let published_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc))?;

        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());
        let url = entry
            .links
            .first()
            .map(|link| link.href.clone())
            .unwrap_or_default();

        let summary = entry.summary.map(|s| s.content);
        let body = entry
            .content
            .and_then(|c| c.body)
            .or(summary)
            .unwrap_or_default();

        let external_id = if entry.id.is_empty() {
            url.clone()
        } else {
            entry.id
        };

        Some(NormalizedItem {
            source_id: self.config.id.clone(),
            source_name: self.config.name.clone(),
            url,
            title: title.trim().to_string(),
            body_text: strip_html(&body),
            published_at,
            external_id,
            source_priority: self.config.priority,
        })
    }
}

#[async_trait]
impl FetchSource for RssSource {
    fn source_id(&self) -> String {
        self.config.id.clone()
    }

    fn source_name(&self) -> String {
        self.config.name.clone()
    }

    fn priority(&self) -> u8 {
        self.config.priority
    }

    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<NormalizedItem>> {
        debug!("Fetching feed {} ({})", self.config.name, self.config.url);

        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .map_err(|e| BriefError::Fetch(format!("{}: {}", self.config.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BriefError::Fetch(format!(
                "{}: HTTP {}",
                self.config.url, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BriefError::Fetch(format!("{}: {}", self.config.url, e)))?;
        let feed = parser::parse(body.as_bytes())
            .map_err(|e| BriefError::Parse(format!("{}: {}", self.config.url, e)))?;

        let mut items: Vec<NormalizedItem> = feed
            .entries
            .into_iter()
            .filter_map(|entry| self.entry_to_item(entry))
            .filter(|item| item.published_at > since)
            .collect();

        // Keep the most recent entries when the feed exceeds the cap.
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        if items.len() > self.max_items {
            warn!(
                "Feed {} returned {} items in window, capping at {}",
                self.config.name,
                items.len(),
                self.max_items
            );
            items.truncate(self.max_items);
        }

        info!("Fetched {} items from {}", items.len(), self.config.name);
        Ok(items)
    }
}

/// Drop HTML tags from feed summaries, collapsing the remaining whitespace.
fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
