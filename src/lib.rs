pub mod classify;
pub mod config;
pub mod dedupe;
pub mod delivery;
pub mod llm;
pub mod pipeline;
pub mod retry;
pub mod sources;
pub mod store;
pub mod summarize;
pub mod types;

pub use classify::Classifier;
pub use config::{BriefConfig, CategorySet, SourceConfig};
pub use delivery::{Delivery, DryRunDelivery, RecordingDelivery, SmtpDelivery};
pub use llm::{LlmBackend, MockBackend, OpenAiBackend, ResponseFormat};
pub use pipeline::{BriefPipeline, RunOutcome};
pub use retry::RetryPolicy;
pub use sources::{FetchSource, RssSource, StaticSource};
pub use store::{MemorySeenStore, SeenStore, SqliteSeenStore};
pub use summarize::Summarizer;
pub use types::*;
