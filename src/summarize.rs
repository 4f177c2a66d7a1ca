use crate::llm::{LlmBackend, ResponseFormat};
use crate::retry::RetryPolicy;
use crate::types::{BriefError, ClassifiedItem, Report, Result};
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-item body cap inside the summarization prompt, in characters.
const ITEM_CONTEXT_LIMIT: usize = 500;

/// Produces the single plaintext briefing for a run: one LLM call over the
/// whole classified set, with the word count validated against a band and
/// corrected through bounded retries.
pub struct Summarizer {
    backend: Arc<dyn LlmBackend>,
    min_words: usize,
    max_words: usize,
    retry: RetryPolicy,
}

impl Summarizer {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        min_words: usize,
        max_words: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            min_words,
            max_words,
            retry,
        }
    }

    /// Summarize the classified set into a `Report`.
    ///
    /// Returns `Ok(None)` for empty input — the "nothing to send" signal,
    /// distinct from a failure. A report outside the word band after all
    /// retries is accepted but flagged via `within_length_target`; only
    /// backend failure on every attempt errors out.
    pub async fn summarize(&self, items: &[ClassifiedItem]) -> Result<Option<Report>> {
        if items.is_empty() {
            info!("No classified items, skipping summarization");
            return Ok(None);
        }

        let generated_at = Utc::now();
        let date = generated_at.format("%Y-%m-%d").to_string();
        let subject = format!("Daily World Brief — {}", date);
        let base_prompt = self.build_prompt(items, &date)?;

        let mut backoff = self.retry.backoff();
        let mut out_of_band: Option<(String, usize)> = None;
        let mut last_error: Option<BriefError> = None;

        for attempt in 1..=self.retry.max_attempts {
            let prompt = match &out_of_band {
                None => base_prompt.clone(),
                Some((_, words)) => format!(
                    "{}\n\nYour previous draft was {} words, which is outside the required \
                     {}-{} word range. Rewrite the briefing to fit that range while keeping \
                     every category covered.",
                    base_prompt, words, self.min_words, self.max_words
                ),
            };

            match self.backend.complete(&prompt, ResponseFormat::Text).await {
                Ok(body) => {
                    let body = body.trim().to_string();
                    let words = word_count(&body);
                    if (self.min_words..=self.max_words).contains(&words) {
                        info!("Briefing generated: {} words (attempt {})", words, attempt);
                        return Ok(Some(Report {
                            subject,
                            body,
                            item_count: items.len(),
                            word_count: words,
                            within_length_target: true,
                            generated_at,
                        }));
                    }
                    warn!(
                        "Briefing attempt {} is {} words, outside [{}, {}]",
                        attempt, words, self.min_words, self.max_words
                    );
                    out_of_band = Some((body, words));
                }
                Err(e) => {
                    warn!("Summarization attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                }
            }
            self.retry.wait(&mut backoff, attempt).await;
        }

        // A degraded-but-present report beats none at all.
        if let Some((body, words)) = out_of_band {
            warn!(
                "Accepting out-of-band briefing after {} attempts ({} words)",
                self.retry.max_attempts, words
            );
            return Ok(Some(Report {
                subject,
                body,
                item_count: items.len(),
                word_count: words,
                within_length_target: false,
                generated_at,
            }));
        }

        Err(last_error
            .unwrap_or_else(|| BriefError::Backend("summarization never ran".to_string())))
    }

    /// Group items by category into a JSON block for the prompt. BTreeMap
    /// keeps the category order deterministic across runs.
    fn build_prompt(&self, items: &[ClassifiedItem], date: &str) -> Result<String> {
        let mut grouped: BTreeMap<&str, Vec<serde_json::Value>> = BTreeMap::new();
        for classified in items {
            grouped
                .entry(classified.category.as_str())
                .or_default()
                .push(json!({
                    "title": classified.item.title,
                    "text": truncate_chars(&classified.item.body_text, ITEM_CONTEXT_LIMIT),
                    "url": classified.item.url,
                    "source": classified.item.source_name,
                    "published_at": classified.item.published_at.to_rfc3339(),
                    "importance": classified.importance,
                    "tags": classified.tags,
                }));
        }
        let items_json = serde_json::to_string_pretty(&grouped)?;

        Ok(format!(
            "You are a senior news editor writing the daily world briefing for {}.\n\
             Write one cohesive plaintext narrative (no markdown, no bullet lists) that \
             walks through the day's news, grouped by the categories below and leading \
             with the most important stories.\n\
             The briefing must be between {} and {} words.\n\n\
             Items by category:\n{}",
            date, self.min_words, self.max_words, items_json
        ))
    }
}

/// Whitespace-separated word count used for the length band check.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
