use crate::classify::Classifier;
use crate::dedupe;
use crate::delivery::Delivery;
use crate::sources::FetchSource;
use crate::store::SeenStore;
use crate::summarize::Summarizer;
use crate::types::{BriefError, ClassifiedItem, NormalizedItem, Report, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Terminal state of one pipeline run. A failed run is the `Err` arm of
/// the surrounding `Result`, carrying the `BriefError` cause.
#[derive(Debug)]
pub enum RunOutcome {
    /// The briefing was produced and delivered; seen-state was committed.
    Delivered { run_id: Uuid, report: Report },
    /// Nothing new to report. Not an error; seen-state is untouched.
    SkippedEmpty,
}

/// Orchestrates one run: fetch → dedupe → classify → summarize → deliver,
/// then one atomic seen-state commit. Owns all working state for the run
/// and releases it on exit; repeated runs over an unchanged source set are
/// idempotent.
pub struct BriefPipeline {
    sources: Vec<Box<dyn FetchSource>>,
    classifier: Classifier,
    summarizer: Summarizer,
    store: Arc<dyn SeenStore>,
    delivery: Arc<dyn Delivery>,
    archive_dir: Option<PathBuf>,
}

impl BriefPipeline {
    pub fn new(
        classifier: Classifier,
        summarizer: Summarizer,
        store: Arc<dyn SeenStore>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        Self {
            sources: Vec::new(),
            classifier,
            summarizer,
            store,
            delivery,
            archive_dir: None,
        }
    }

    pub fn add_source(&mut self, source: Box<dyn FetchSource>) {
        info!("Adding source to pipeline: {}", source.source_name());
        self.sources.push(source);
    }

    /// Archive the briefing body as `<dir>/<date>.txt` after delivery.
    pub fn set_archive_dir(&mut self, dir: PathBuf) {
        self.archive_dir = Some(dir);
    }

    /// Execute one full run over items published after `since`.
    pub async fn run(&self, since: DateTime<Utc>) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        info!(
            "Run {} starting: {} sources, window since {}",
            run_id,
            self.sources.len(),
            since
        );

        let candidates = self.fetch_all(since).await;
        if candidates.is_empty() {
            info!("Run {}: no items fetched, nothing to do", run_id);
            return Ok(RunOutcome::SkippedEmpty);
        }

        let seen = self.seen_snapshot(&candidates).await?;
        let survivors = dedupe::dedupe(candidates, &seen);
        if survivors.is_empty() {
            info!("Run {}: all items already seen, nothing to do", run_id);
            return Ok(RunOutcome::SkippedEmpty);
        }
        info!("Run {}: {} items survived dedup", run_id, survivors.len());

        let classified = self.classify_all(&survivors).await?;

        let report = match self.summarizer.summarize(&classified).await? {
            Some(report) => report,
            None => {
                info!("Run {}: summarizer signalled empty", run_id);
                return Ok(RunOutcome::SkippedEmpty);
            }
        };

        self.delivery.deliver(&report).await?;
        info!(
            "Run {}: briefing delivered via {} ({} items, {} words)",
            run_id,
            self.delivery.channel_name(),
            report.item_count,
            report.word_count
        );

        self.archive(&report);

        // Seen-state is committed only now, in one batch, so a failed or
        // interrupted run leaves the store exactly as it was and the next
        // run retries the same candidate set.
        let records: Vec<_> = survivors.iter().map(dedupe::seen_record).collect();
        self.store.batch_insert(&records).await?;
        info!("Run {}: committed {} seen records", run_id, records.len());

        Ok(RunOutcome::Delivered { run_id, report })
    }

    /// Fetch every source, downgrading per-source failures to warnings.
    async fn fetch_all(&self, since: DateTime<Utc>) -> Vec<NormalizedItem> {
        let mut candidates = Vec::new();
        for source in &self.sources {
            match source.fetch(since).await {
                Ok(items) => {
                    info!("Pulled {} items from {}", items.len(), source.source_name());
                    candidates.extend(items);
                }
                Err(e) => {
                    warn!("Source {} failed, skipping: {}", source.source_name(), e);
                }
            }
        }
        candidates
    }

    /// Look up the candidates' identity keys in the store, producing the
    /// in-memory snapshot the pure deduplicator filters against.
    async fn seen_snapshot(&self, candidates: &[NormalizedItem]) -> Result<HashSet<String>> {
        let mut seen = HashSet::new();
        for item in candidates {
            let (hash, url) = dedupe::identity_keys(item);
            for key in std::iter::once(hash).chain(url) {
                if !seen.contains(&key) && self.store.contains(&key).await? {
                    seen.insert(key);
                }
            }
        }
        Ok(seen)
    }

    /// Classify every survivor in order. Per-item failures degrade to the
    /// fallback category; the run itself only fails when the backend was
    /// unreachable for every single item.
    async fn classify_all(&self, survivors: &[NormalizedItem]) -> Result<Vec<ClassifiedItem>> {
        let total = survivors.len();
        let mut classified = Vec::with_capacity(total);
        let mut backend_failures = 0usize;

        for (index, item) in survivors.iter().enumerate() {
            info!("Classifying [{}/{}]: {}", index + 1, total, item.title);
            match self.classifier.classify(item).await {
                Ok(result) => classified.push(result),
                Err(e) => {
                    warn!(
                        "Classification of {:?} failed at backend, using fallback: {}",
                        item.title, e
                    );
                    backend_failures += 1;
                    classified.push(self.classifier.fallback_for(item));
                }
            }
        }

        if backend_failures == total {
            return Err(BriefError::Backend(format!(
                "LLM backend unreachable for all {} items",
                total
            )));
        }
        Ok(classified)
    }

    /// Best-effort archive of the delivered briefing; failure is logged,
    /// never fatal.
    fn archive(&self, report: &Report) {
        let Some(dir) = &self.archive_dir else {
            return;
        };
        let date = report.generated_at.format("%Y-%m-%d").to_string();
        let path = dir.join(format!("{}.txt", date));
        let result = std::fs::create_dir_all(dir)
            .and_then(|_| std::fs::write(&path, &report.body));
        match result {
            Ok(()) => info!("Briefing archived to {}", path.display()),
            Err(e) => error!("Could not archive briefing to {}: {}", path.display(), e),
        }
    }
}
