use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{error, info};
use world_brief::{
    BriefConfig, BriefPipeline, Classifier, Delivery, DryRunDelivery, LlmBackend, OpenAiBackend,
    RssSource, RunOutcome, SmtpDelivery, SqliteSeenStore, Summarizer,
};

/// Daily briefing agent: ingest feeds, deduplicate against previous runs,
/// classify and summarize with an LLM, and email one briefing per run.
#[derive(Parser, Debug)]
#[command(name = "world-brief", version)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "config/brief.json")]
    config: PathBuf,

    /// Print the briefing instead of emailing it.
    #[arg(long)]
    dry_run: bool,

    /// Override the ingestion window from the config file.
    #[arg(long)]
    since_hours: Option<i64>,

    /// Seen-state database file. Defaults to $SQLITE_PATH or world_brief.db.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Directory to archive delivered briefings into.
    #[arg(long, default_value = "output")]
    archive_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = BriefConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    if config.sources.is_empty() {
        anyhow::bail!("no sources configured in {}", args.config.display());
    }

    let since_hours = args.since_hours.unwrap_or(config.since_hours);
    let since = Utc::now() - Duration::hours(since_hours);

    let database = args.database.unwrap_or_else(|| {
        std::env::var("SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("world_brief.db"))
    });
    let store = Arc::new(
        SqliteSeenStore::open(&database)
            .await
            .with_context(|| format!("opening seen store {}", database.display()))?,
    );

    let backend = Arc::new(OpenAiBackend::from_env(&config.llm).context("configuring LLM backend")?);
    info!("LLM backend: {}", backend.backend_name());

    let dry_run = args.dry_run
        || matches!(
            std::env::var("DRY_RUN").as_deref(),
            Ok("1") | Ok("true") | Ok("yes")
        );
    let delivery: Arc<dyn Delivery> = if dry_run {
        Arc::new(DryRunDelivery::new())
    } else {
        Arc::new(SmtpDelivery::from_env().context("configuring SMTP delivery")?)
    };
    info!("Delivery channel: {}", delivery.channel_name());

    let retry = config.retry_policy();
    let classifier = Classifier::new(backend.clone(), config.category_set(), retry);
    let summarizer = Summarizer::new(
        backend,
        config.summary.min_words,
        config.summary.max_words,
        world_brief::RetryPolicy {
            max_attempts: config.summary.max_attempts,
            ..retry
        },
    );

    let mut pipeline = BriefPipeline::new(classifier, summarizer, store, delivery);
    pipeline.set_archive_dir(args.archive_dir.clone());

    let timeout = StdDuration::from_secs(config.fetch_timeout_seconds);
    for source_config in &config.sources {
        let source = RssSource::new(
            source_config.clone(),
            timeout,
            config.max_items_per_source,
        )
        .with_context(|| format!("building source {}", source_config.id))?;
        pipeline.add_source(Box::new(source));
    }

    match pipeline.run(since).await {
        Ok(RunOutcome::Delivered { run_id, report }) => {
            info!(
                "Run {} delivered: {:?} ({} items, {} words)",
                run_id, report.subject, report.item_count, report.word_count
            );
            Ok(())
        }
        Ok(RunOutcome::SkippedEmpty) => {
            info!("Nothing new to report");
            Ok(())
        }
        Err(e) => {
            error!("Run failed, seen-state unchanged: {}", e);
            Err(e.into())
        }
    }
}
