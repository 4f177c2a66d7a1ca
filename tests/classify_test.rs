mod common;

use common::{categories, classification, fast_retry, item};
use std::sync::Arc;
use world_brief::{BriefError, Classifier, LlmBackend, MockBackend, ResponseFormat};

fn classifier(backend: &Arc<MockBackend>) -> Classifier {
    let backend: Arc<dyn LlmBackend> = backend.clone();
    Classifier::new(backend, categories(), fast_retry())
}

#[tokio::test]
async fn malformed_then_valid_response_uses_the_valid_attempt() {
    let backend = Arc::new(MockBackend::new());
    // Attempt 1: prose-wrapped object missing the required importance key.
    backend.push_response("Sure! {\"category\": \"Technology\"}");
    backend.push_response(classification("Technology", 0.7));
    let classifier = classifier(&backend);

    let subject = item("https://a.example/x", "Chip news", "some body", 60, 100);
    let classified = classifier.classify(&subject).await.unwrap();

    assert_eq!(classified.category, "Technology");
    assert_eq!(classified.importance, 0.7);
    assert_eq!(classified.tags, vec!["test".to_string()]);
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn unknown_category_on_every_attempt_degrades_to_fallback() {
    let backend = Arc::new(MockBackend::new());
    for _ in 0..3 {
        backend.push_response(classification("Sports", 0.5));
    }
    let classifier = classifier(&backend);

    let subject = item("https://a.example/x", "Match report", "body", 60, 100);
    let classified = classifier.classify(&subject).await.unwrap();

    assert_eq!(classified.category, "Other");
    assert_eq!(classified.importance, 0.0);
    assert!(classified.tags.is_empty());
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn out_of_range_importance_is_rejected_and_retried() {
    let backend = Arc::new(MockBackend::new());
    backend.push_response(classification("World", 1.5));
    backend.push_response(classification("World", -0.1));
    backend.push_response(classification("World", 0.9));
    let classifier = classifier(&backend);

    let subject = item("https://a.example/x", "Summit", "body", 60, 100);
    let classified = classifier.classify(&subject).await.unwrap();

    assert_eq!(classified.category, "World");
    assert_eq!(classified.importance, 0.9);
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn backend_failure_on_every_attempt_is_an_error_not_a_fallback() {
    let backend = Arc::new(MockBackend::new());
    // Empty script: every call fails at the backend.
    let classifier = classifier(&backend);

    let subject = item("https://a.example/x", "Unreachable", "body", 60, 100);
    let err = classifier.classify(&subject).await.unwrap_err();

    assert!(matches!(err, BriefError::Backend(_)));
    assert_eq!(backend.call_count(), 3);
}

#[tokio::test]
async fn mixed_backend_and_validation_failures_still_fall_back() {
    let backend = Arc::new(MockBackend::new());
    backend.push_backend_error("timeout");
    backend.push_response("not json at all");
    backend.push_backend_error("timeout");
    let classifier = classifier(&backend);

    // Not every attempt died at the transport, so the item degrades
    // instead of failing.
    let subject = item("https://a.example/x", "Flaky", "body", 60, 100);
    let classified = classifier.classify(&subject).await.unwrap();

    assert_eq!(classified.category, "Other");
}

#[tokio::test]
async fn empty_body_is_classified_on_the_title_alone() {
    let backend = Arc::new(MockBackend::new());
    backend.push_response(classification("Business", 0.4));
    let classifier = classifier(&backend);

    let subject = item("https://a.example/x", "Merger announced", "", 60, 100);
    let classified = classifier.classify(&subject).await.unwrap();
    assert_eq!(classified.category, "Business");

    let prompts = backend.recorded_prompts();
    let (prompt, format) = &prompts[0];
    assert_eq!(*format, ResponseFormat::Json);
    assert!(prompt.contains("Merger announced"));
    assert!(prompt.contains("- Business"));
}
