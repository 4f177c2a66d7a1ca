#![allow(dead_code)]

use chrono::{Duration, Utc};
use std::time::Duration as StdDuration;
use world_brief::{CategorySet, NormalizedItem, RetryPolicy};

/// Retry policy with millisecond delays so retry loops finish quickly.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: StdDuration::from_millis(1),
        max_delay: StdDuration::from_millis(2),
    }
}

pub fn categories() -> CategorySet {
    CategorySet::new(
        vec![
            "World".to_string(),
            "Technology".to_string(),
            "Business".to_string(),
        ],
        "Other".to_string(),
    )
}

/// Item published `minutes_ago` minutes before now.
pub fn item(url: &str, title: &str, body: &str, minutes_ago: i64, priority: u8) -> NormalizedItem {
    NormalizedItem {
        source_id: "test-feed".to_string(),
        source_name: "Test Feed".to_string(),
        url: url.to_string(),
        title: title.to_string(),
        body_text: body.to_string(),
        published_at: Utc::now() - Duration::minutes(minutes_ago),
        external_id: format!("ext-{}", title),
        source_priority: priority,
    }
}

/// A well-formed classification response for the mock backend.
pub fn classification(category: &str, importance: f64) -> String {
    format!(
        "{{\"category\": \"{}\", \"importance\": {}, \"tags\": [\"test\"]}}",
        category, importance
    )
}

/// A plaintext body with exactly `n` words.
pub fn body_of_words(n: usize) -> String {
    (0..n)
        .map(|i| format!("word{}", i))
        .collect::<Vec<_>>()
        .join(" ")
}
