mod common;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{body_of_words, categories, classification, fast_retry, item};
use std::sync::Arc;
use world_brief::{
    BriefError, BriefPipeline, Classifier, FetchSource, LlmBackend, MemorySeenStore, MockBackend,
    NormalizedItem, RecordingDelivery, Result, RunOutcome, StaticSource, Summarizer,
};

fn since() -> DateTime<Utc> {
    Utc::now() - Duration::hours(24)
}

fn expect_delivered(outcome: RunOutcome) -> world_brief::Report {
    match outcome {
        RunOutcome::Delivered { report, .. } => report,
        other => panic!("expected Delivered, got {:?}", other),
    }
}

struct Harness {
    backend: Arc<MockBackend>,
    store: Arc<MemorySeenStore>,
    delivery: Arc<RecordingDelivery>,
}

impl Harness {
    fn new() -> Self {
        Self {
            backend: Arc::new(MockBackend::new()),
            store: Arc::new(MemorySeenStore::new()),
            delivery: Arc::new(RecordingDelivery::new()),
        }
    }

    /// Fresh pipeline over the shared backend/store/delivery, fed one
    /// static batch of items.
    fn pipeline(&self, items: Vec<NormalizedItem>) -> BriefPipeline {
        let backend: Arc<dyn LlmBackend> = self.backend.clone();
        let classifier = Classifier::new(backend.clone(), categories(), fast_retry());
        let summarizer = Summarizer::new(backend, 500, 900, fast_retry());
        let mut pipeline = BriefPipeline::new(
            classifier,
            summarizer,
            self.store.clone(),
            self.delivery.clone(),
        );
        let source = StaticSource::new("test-feed", 100);
        source.push_batch(items);
        pipeline.add_source(Box::new(source));
        pipeline
    }

    fn two_items(&self) -> Vec<NormalizedItem> {
        vec![
            item("https://a.example/one", "First story", "body one", 60, 100),
            item("https://a.example/two", "Second story", "body two", 30, 100),
        ]
    }

    fn script_happy_path(&self) {
        self.backend.push_response(classification("World", 0.8));
        self.backend.push_response(classification("Technology", 0.5));
        self.backend.push_response(body_of_words(650));
    }
}

#[tokio::test]
async fn full_run_delivers_and_commits_seen_state() {
    let harness = Harness::new();
    harness.script_happy_path();
    let pipeline = harness.pipeline(harness.two_items());

    let outcome = pipeline.run(since()).await.unwrap();
    let report = expect_delivered(outcome);

    assert_eq!(report.item_count, 2);
    assert_eq!(report.word_count, 650);
    assert!(report.within_length_target);
    assert!(report.subject.starts_with("Daily World Brief"));

    let sent = harness.delivery.sent_reports();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, report.body);

    // One record per item, keyed by both hash and normalized URL.
    assert_eq!(harness.store.record_count().await, 2);
    assert_eq!(harness.store.key_count().await, 4);
}

#[tokio::test]
async fn second_run_with_same_items_is_skipped_empty() {
    let harness = Harness::new();
    harness.script_happy_path();
    let first = harness.pipeline(harness.two_items());
    first.run(since()).await.unwrap();
    let calls_after_first = harness.backend.call_count();

    // Same candidates, unchanged store: the run must not classify or
    // deliver anything.
    let second = harness.pipeline(harness.two_items());
    let outcome = second.run(since()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::SkippedEmpty));
    assert_eq!(harness.backend.call_count(), calls_after_first);
    assert_eq!(harness.delivery.sent_reports().len(), 1);
    assert_eq!(harness.store.record_count().await, 2);
}

#[tokio::test]
async fn delivery_failure_leaves_seen_state_unchanged_and_rerun_reprocesses() {
    let harness = Harness::new();
    harness.script_happy_path();
    harness.delivery.fail_next(true);

    let first = harness.pipeline(harness.two_items());
    let err = first.run(since()).await.unwrap_err();
    assert!(matches!(err, BriefError::Delivery(_)));
    assert_eq!(harness.delivery.sent_reports().len(), 0);
    assert_eq!(harness.store.record_count().await, 0);

    // Nothing was marked seen, so the retried run reclassifies the same
    // candidates and delivers.
    harness.script_happy_path();
    let second = harness.pipeline(harness.two_items());
    let outcome = second.run(since()).await.unwrap();
    let report = expect_delivered(outcome);
    assert_eq!(report.item_count, 2);
    assert_eq!(harness.store.record_count().await, 2);
}

#[tokio::test]
async fn empty_fetch_skips_without_touching_backend() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(Vec::new());

    let outcome = pipeline.run(since()).await.unwrap();

    assert!(matches!(outcome, RunOutcome::SkippedEmpty));
    assert_eq!(harness.backend.call_count(), 0);
    assert_eq!(harness.store.record_count().await, 0);
}

#[tokio::test]
async fn backend_outage_for_every_item_fails_the_run() {
    let harness = Harness::new();
    // No scripted responses: every call errors at the backend, both items
    // exhaust their attempts.
    let pipeline = harness.pipeline(harness.two_items());

    let err = pipeline.run(since()).await.unwrap_err();

    assert!(matches!(err, BriefError::Backend(_)));
    assert_eq!(harness.delivery.sent_reports().len(), 0);
    assert_eq!(harness.store.record_count().await, 0);
}

#[tokio::test]
async fn single_item_backend_failure_degrades_to_fallback() {
    let harness = Harness::new();
    // First item (older, classified first): three backend errors.
    harness.backend.push_backend_error("boom");
    harness.backend.push_backend_error("boom");
    harness.backend.push_backend_error("boom");
    // Second item classifies fine, then the summary call.
    harness.backend.push_response(classification("World", 0.9));
    harness.backend.push_response(body_of_words(600));

    let pipeline = harness.pipeline(harness.two_items());
    let outcome = pipeline.run(since()).await.unwrap();

    let report = expect_delivered(outcome);
    assert_eq!(report.item_count, 2);

    // The failed item went into the briefing under the fallback category.
    let prompts = harness.backend.recorded_prompts();
    let (summary_prompt, _) = prompts.last().unwrap();
    assert!(summary_prompt.contains("\"Other\""));
    assert!(summary_prompt.contains("\"World\""));
}

#[tokio::test]
async fn in_batch_url_duplicates_collapse_before_classification() {
    let harness = Harness::new();
    harness.backend.push_response(classification("World", 0.7));
    harness.backend.push_response(body_of_words(640));

    // Same document once with and once without tracking parameters.
    let pipeline = harness.pipeline(vec![
        item("https://a.example/x?utm_source=y", "Tracked", "story", 60, 100),
        item("https://a.example/x", "Plain", "different body", 30, 100),
    ]);
    let outcome = pipeline.run(since()).await.unwrap();

    let report = expect_delivered(outcome);
    assert_eq!(report.item_count, 1);
    assert_eq!(harness.store.record_count().await, 1);
}

#[tokio::test]
async fn failing_source_reduces_candidates_but_run_continues() {
    struct BrokenSource;

    #[async_trait]
    impl FetchSource for BrokenSource {
        fn source_id(&self) -> String {
            "broken".to_string()
        }
        fn source_name(&self) -> String {
            "Broken Feed".to_string()
        }
        fn priority(&self) -> u8 {
            50
        }
        async fn fetch(&self, _since: DateTime<Utc>) -> Result<Vec<NormalizedItem>> {
            Err(BriefError::Fetch("connection refused".to_string()))
        }
    }

    let harness = Harness::new();
    harness.backend.push_response(classification("World", 0.6));
    harness.backend.push_response(body_of_words(620));

    let mut pipeline = harness.pipeline(vec![item(
        "https://a.example/only",
        "Only story",
        "body",
        45,
        100,
    )]);
    pipeline.add_source(Box::new(BrokenSource));

    let outcome = pipeline.run(since()).await.unwrap();
    let report = expect_delivered(outcome);
    assert_eq!(report.item_count, 1);
}
