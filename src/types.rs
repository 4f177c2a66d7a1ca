use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source-agnostic representation of one ingested piece of content.
///
/// Created by a fetch source once per run and read-only afterward:
/// classification and summarization results are attached as separate
/// records, never written back onto this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub source_id: String,
    pub source_name: String,
    /// Canonical link. May be empty for sources without stable URLs;
    /// identity then falls back to the content hash.
    pub url: String,
    pub title: String,
    pub body_text: String,
    pub published_at: DateTime<Utc>,
    /// Provider-side identifier (feed GUID, entry id) kept for logging.
    pub external_id: String,
    /// Source priority, 0-255, higher = more priority. Used as the
    /// duplicate tie-break after `published_at`.
    pub source_priority: u8,
}

/// A `NormalizedItem` plus the classification the LLM assigned to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedItem {
    pub item: NormalizedItem,
    pub category: String,
    /// Importance signal in `[0.0, 1.0]`, validated at the classifier
    /// boundary. 0.0 for fallback classifications.
    pub importance: f64,
    pub tags: Vec<String>,
}

/// Durable record of an item that has been reported, keyed by both its
/// content hash and its normalized URL. The set of these records grows
/// monotonically; pruning is an external concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeenItemRecord {
    pub content_hash: String,
    /// Normalized URL, empty when the item had none.
    pub url: String,
    pub first_seen_at: DateTime<Utc>,
}

impl SeenItemRecord {
    /// Lookup keys this record occupies in the seen store.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = vec![self.content_hash.as_str()];
        if !self.url.is_empty() {
            keys.push(self.url.as_str());
        }
        keys
    }
}

/// Final artifact of a run, handed to the delivery channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub subject: String,
    /// Plaintext briefing body.
    pub body: String,
    pub item_count: usize,
    pub word_count: usize,
    /// False when the summarizer exhausted its retries without landing
    /// inside the configured word band and the last result was accepted
    /// as a degraded report.
    pub within_length_target: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum BriefError {
    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse error: {0}")]
    Parse(String),

    /// The LLM call succeeded but the content was malformed or violated
    /// the output schema. Retryable.
    #[error("validation error: {0}")]
    Validation(String),

    /// The LLM call itself failed (transport, auth, timeout). Retryable,
    /// then fatal for the item or run.
    #[error("backend error: {0}")]
    Backend(String),

    /// Delivery failure is fatal for the run: no seen-state is committed.
    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, BriefError>;
