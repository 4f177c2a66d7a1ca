use crate::config::CategorySet;
use crate::llm::{LlmBackend, ResponseFormat};
use crate::retry::RetryPolicy;
use crate::types::{BriefError, ClassifiedItem, NormalizedItem, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cap on body text forwarded to the model, in characters.
const BODY_CONTEXT_LIMIT: usize = 1_500;

/// Assigns each item a category from the closed set plus an importance
/// score, enforcing a strict JSON output schema with bounded retries.
pub struct Classifier {
    backend: Arc<dyn LlmBackend>,
    categories: CategorySet,
    retry: RetryPolicy,
}

/// Schema the model must produce. `category` and `importance` are
/// required; missing keys fail deserialization and count as a
/// validation failure.
#[derive(Debug, Deserialize)]
struct ClassificationResponse {
    category: String,
    importance: f64,
    #[serde(default)]
    tags: Vec<String>,
}

impl Classifier {
    pub fn new(backend: Arc<dyn LlmBackend>, categories: CategorySet, retry: RetryPolicy) -> Self {
        Self {
            backend,
            categories,
            retry,
        }
    }

    /// Classify one item.
    ///
    /// Validation failures (malformed JSON, unknown category, out-of-range
    /// importance) retry with backoff and degrade to the fallback category
    /// once attempts are exhausted. Returns `Err` only when every attempt
    /// failed at the transport level, so the orchestrator can tell a dead
    /// backend from a confused one.
    pub async fn classify(&self, item: &NormalizedItem) -> Result<ClassifiedItem> {
        let prompt = self.build_prompt(item);
        let mut backoff = self.retry.backoff();
        let mut backend_failures = 0u32;
        let mut last_error: Option<BriefError> = None;

        for attempt in 1..=self.retry.max_attempts {
            match self.backend.complete(&prompt, ResponseFormat::Json).await {
                Ok(raw) => match self.parse_and_validate(&raw) {
                    Ok(response) => {
                        debug!(
                            "Classified {:?} as {} (importance {:.2}, attempt {})",
                            item.title, response.category, response.importance, attempt
                        );
                        return Ok(ClassifiedItem {
                            item: item.clone(),
                            category: response.category,
                            importance: response.importance,
                            tags: response.tags,
                        });
                    }
                    Err(e) => {
                        warn!(
                            "Classification attempt {} for {:?} rejected: {}",
                            attempt, item.title, e
                        );
                        last_error = Some(e);
                    }
                },
                Err(e @ BriefError::Backend(_)) => {
                    warn!(
                        "Classification attempt {} for {:?} failed at backend: {}",
                        attempt, item.title, e
                    );
                    backend_failures += 1;
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(
                        "Classification attempt {} for {:?} failed: {}",
                        attempt, item.title, e
                    );
                    last_error = Some(e);
                }
            }
            self.retry.wait(&mut backoff, attempt).await;
        }

        if backend_failures == self.retry.max_attempts {
            return Err(last_error
                .unwrap_or_else(|| BriefError::Backend("classification never ran".to_string())));
        }

        warn!(
            "Classification exhausted {} attempts for {:?}, using fallback category {}",
            self.retry.max_attempts,
            item.title,
            self.categories.fallback_category()
        );
        Ok(self.fallback_for(item))
    }

    /// Sentinel classification used when the model never produced a valid
    /// answer. Per-item failures degrade to this instead of failing the run.
    pub fn fallback_for(&self, item: &NormalizedItem) -> ClassifiedItem {
        ClassifiedItem {
            item: item.clone(),
            category: self.categories.fallback_category().to_string(),
            importance: 0.0,
            tags: Vec::new(),
        }
    }

    fn parse_and_validate(&self, raw: &str) -> Result<ClassificationResponse> {
        let value = extract_json(raw)?;
        let response: ClassificationResponse = serde_json::from_value(value)
            .map_err(|e| BriefError::Validation(format!("schema violation: {}", e)))?;
        let category = self.categories.validate(&response.category)?;
        if !(0.0..=1.0).contains(&response.importance) {
            return Err(BriefError::Validation(format!(
                "importance {} outside [0, 1]",
                response.importance
            )));
        }
        Ok(ClassificationResponse {
            category,
            importance: response.importance,
            tags: response.tags,
        })
    }

    fn build_prompt(&self, item: &NormalizedItem) -> String {
        let body = truncate_on_char_boundary(&item.body_text, BODY_CONTEXT_LIMIT);
        let category_list = self
            .categories
            .names()
            .iter()
            .map(|c| format!("  - {}", c))
            .collect::<Vec<_>>()
            .join("\n");

        // Empty bodies still get classified, on the title alone.
        format!(
            "You are a strict JSON-only news classifier.\n\
             Assign the item below to exactly one of these categories:\n{}\n\n\
             Respond with a single JSON object and nothing else:\n\
             {{\"category\": \"<one of the categories above, verbatim>\", \
             \"importance\": <number between 0.0 and 1.0>, \
             \"tags\": [\"<up to 5 short keywords>\"]}}\n\n\
             Source: {}\nURL: {}\nTitle: {}\nText: {}",
            category_list, item.source_name, item.url, item.title, body
        )
    }
}

/// Extract the first JSON object from model output, tolerating markdown
/// fences and surrounding prose. Anything without a parseable object is a
/// validation failure.
pub fn extract_json(text: &str) -> Result<serde_json::Value> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str(&cleaned[start..=end]).map_err(|e| {
                BriefError::Validation(format!("unparseable JSON object: {}", e))
            })
        }
        _ => Err(BriefError::Validation(format!(
            "no JSON object in response: {:?}",
            text.chars().take(120).collect::<String>()
        ))),
    }
}

fn truncate_on_char_boundary(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_tolerates_fences_and_prose() {
        let fenced = "```json\n{\"category\": \"Tech\"}\n```";
        assert_eq!(extract_json(fenced).unwrap()["category"], "Tech");

        let prose = "Sure! Here is the result: {\"category\": \"Tech\", \"importance\": 0.4}";
        assert_eq!(extract_json(prose).unwrap()["importance"], 0.4);

        assert!(extract_json("no object here").is_err());
        assert!(extract_json("{broken").is_err());
    }

    #[test]
    fn truncation_respects_utf8_boundaries() {
        let text = "héllo wörld".repeat(300);
        let cut = truncate_on_char_boundary(&text, BODY_CONTEXT_LIMIT);
        assert!(cut.len() <= BODY_CONTEXT_LIMIT);
        assert!(text.starts_with(cut));
    }
}
