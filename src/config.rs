use crate::retry::RetryPolicy;
use crate::types::{BriefError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration, loaded from a JSON file with env-independent
/// defaults for everything but the source list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefConfig {
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Ingestion window: items published within the last N hours.
    #[serde(default = "default_since_hours")]
    pub since_hours: i64,
    #[serde(default = "default_max_items_per_source")]
    pub max_items_per_source: usize,
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub url: String,
    /// 0-255, higher = more priority.
    #[serde(default = "default_source_priority")]
    pub priority: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub min_words: usize,
    pub max_words: usize,
    pub max_attempts: u32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            min_words: 500,
            max_words: 900,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    /// OpenAI-compatible endpoint base. `LLM_BASE_URL` overrides.
    pub base_url: Option<String>,
    /// Per-call timeout; a timeout is treated as a retryable backend
    /// failure, same as a malformed response.
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            timeout_seconds: 30,
        }
    }
}

impl Default for BriefConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            fallback_category: default_fallback_category(),
            sources: Vec::new(),
            since_hours: default_since_hours(),
            max_items_per_source: default_max_items_per_source(),
            fetch_timeout_seconds: default_fetch_timeout_seconds(),
            retry: RetryConfig::default(),
            summary: SummaryConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl BriefConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BriefError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| BriefError::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    pub fn category_set(&self) -> CategorySet {
        CategorySet::new(self.categories.clone(), self.fallback_category.clone())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }
}

/// Closed set of allowed categories. Membership is checked exactly
/// (case-sensitive) at the classifier boundary; the fallback category is
/// an always-available extra value on top of the configured list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySet {
    categories: Vec<String>,
    fallback: String,
}

impl CategorySet {
    pub fn new(categories: Vec<String>, fallback: String) -> Self {
        Self { categories, fallback }
    }

    /// True for configured categories and for the fallback sentinel.
    pub fn contains(&self, name: &str) -> bool {
        self.fallback == name || self.categories.iter().any(|c| c == name)
    }

    /// Accepts only exact members of the configured list. Anything else,
    /// including case mismatches, is a validation failure.
    pub fn validate(&self, name: &str) -> Result<String> {
        if self.categories.iter().any(|c| c == name) {
            Ok(name.to_string())
        } else {
            Err(BriefError::Validation(format!(
                "category {:?} is not in the configured set",
                name
            )))
        }
    }

    pub fn fallback_category(&self) -> &str {
        &self.fallback
    }

    pub fn names(&self) -> &[String] {
        &self.categories
    }
}

fn default_categories() -> Vec<String> {
    [
        "World",
        "Politics",
        "Business",
        "Technology",
        "Science",
        "Culture",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_fallback_category() -> String {
    "Other".to_string()
}

fn default_since_hours() -> i64 {
    24
}

fn default_max_items_per_source() -> usize {
    10
}

fn default_fetch_timeout_seconds() -> u64 {
    30
}

fn default_source_priority() -> u8 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_set_accepts_exact_members_only() {
        let set = CategorySet::new(
            vec!["Tech".to_string(), "World".to_string()],
            "Other".to_string(),
        );
        assert!(set.validate("Tech").is_ok());
        assert!(set.validate("tech").is_err());
        assert!(set.validate("Sports").is_err());
        // The fallback is a member for `contains` but not a valid LLM answer.
        assert!(set.contains("Other"));
        assert!(set.validate("Other").is_err());
    }

    #[test]
    fn config_defaults_cover_the_whole_surface() {
        let cfg: BriefConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.summary.min_words, 500);
        assert_eq!(cfg.summary.max_words, 900);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.since_hours, 24);
        assert!(cfg.category_set().contains("Other"));
    }
}
