use crate::types::{BriefError, Report, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::AsyncSmtpTransport;
use lettre::{AsyncTransport, Tokio1Executor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::info;

/// Transmits the final report. A dry-run implementation must be
/// substitutable without changing orchestrator logic.
#[async_trait]
pub trait Delivery: Send + Sync {
    fn channel_name(&self) -> String;

    async fn deliver(&self, report: &Report) -> Result<()>;
}

/// Sends the briefing by SMTP.
pub struct SmtpDelivery {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpDelivery {
    /// Required env vars: `SMTP_HOST`, `SMTP_USER`, `SMTP_PASSWORD`,
    /// `EMAIL_FROM`, `EMAIL_TO`.
    pub fn from_env() -> Result<Self> {
        let host = require_env("SMTP_HOST")?;
        let user = require_env("SMTP_USER")?;
        let password = require_env("SMTP_PASSWORD")?;
        let from = require_env("EMAIL_FROM")?;
        let to = require_env("EMAIL_TO")?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .map_err(|e| BriefError::Config(format!("invalid SMTP_HOST: {}", e)))?
            .credentials(Credentials::new(user, password))
            .build();

        Ok(Self {
            mailer,
            from: parse_mailbox("EMAIL_FROM", &from)?,
            to: parse_mailbox("EMAIL_TO", &to)?,
        })
    }
}

#[async_trait]
impl Delivery for SmtpDelivery {
    fn channel_name(&self) -> String {
        "smtp".to_string()
    }

    async fn deliver(&self, report: &Report) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(&report.subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(report.body.clone())
            .map_err(|e| BriefError::Delivery(format!("cannot build email: {}", e)))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| BriefError::Delivery(format!("SMTP send failed: {}", e)))?;

        info!("Briefing emailed to {}", self.to);
        Ok(())
    }
}

/// Echoes the report to stdout instead of transmitting it.
#[derive(Default)]
pub struct DryRunDelivery;

impl DryRunDelivery {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Delivery for DryRunDelivery {
    fn channel_name(&self) -> String {
        "dry-run".to_string()
    }

    async fn deliver(&self, report: &Report) -> Result<()> {
        let separator = "=".repeat(72);
        println!("{}", separator);
        println!("Subject: {}", report.subject);
        println!(
            "Items: {}  Words: {}  Within target: {}",
            report.item_count, report.word_count, report.within_length_target
        );
        println!("{}", separator);
        println!("{}", report.body);
        println!("{}", separator);
        info!("Dry run: briefing printed instead of sent");
        Ok(())
    }
}

/// Test double that records delivered reports and can be told to fail.
#[derive(Default)]
pub struct RecordingDelivery {
    sent: Mutex<Vec<Report>>,
    fail_next: AtomicBool,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }

    pub fn sent_reports(&self) -> Vec<Report> {
        self.sent.lock().expect("recording delivery lock").clone()
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    fn channel_name(&self) -> String {
        "recording".to_string()
    }

    async fn deliver(&self, report: &Report) -> Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(BriefError::Delivery("simulated delivery failure".to_string()));
        }
        self.sent
            .lock()
            .expect("recording delivery lock")
            .push(report.clone());
        Ok(())
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| BriefError::Config(format!("missing required env var: {}", key)))
}

fn parse_mailbox(key: &str, value: &str) -> Result<Mailbox> {
    value
        .parse()
        .map_err(|e| BriefError::Config(format!("invalid {}: {}", key, e)))
}
