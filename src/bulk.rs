//! Bulk-send engine.
//!
//! A bulk job is a sequential awaited iteration -- never a parallel fan-out --
//! so outbound traffic stays throttled and results come back in input order.
//! One destination failing is recorded and the loop moves on; nothing short
//! of the process dying aborts a job.

use async_trait::async_trait;
use herald_core::{phone::format_phone_number, traits::Messenger, types::SendError};
use herald_store::{Contact, Store};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, warn};

/// Outcome of one destination in a bulk job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Success,
    Error,
    Skipped,
}

/// Per-destination result record.
#[derive(Debug, Clone, Serialize)]
pub struct SendResult {
    pub destination: String,
    pub status: SendStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate summary returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct BulkReport {
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
    pub results: Vec<SendResult>,
}

/// One destination with its (possibly personalized) message text.
#[derive(Debug, Clone)]
pub struct SendJob {
    pub destination: String,
    pub text: String,
}

/// Knobs for a bulk run.
#[derive(Debug, Clone, Default)]
pub struct BulkOptions {
    /// Optional image payload; the text becomes its caption.
    pub image: Option<Vec<u8>>,
    /// Check registration before each send and skip unregistered numbers.
    pub verify: bool,
    pub country_code: String,
}

/// Inter-message gate, decoupled from the loop so tests run without
/// real delays.
#[async_trait]
pub trait Pacer: Send {
    async fn pause(&mut self);
}

/// Fixed-interval gate used in production.
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn from_millis(ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(ms),
        }
    }
}

#[async_trait]
impl Pacer for FixedDelay {
    async fn pause(&mut self) {
        tokio::time::sleep(self.delay).await;
    }
}

/// No-op gate for tests.
pub struct NoDelay;

#[async_trait]
impl Pacer for NoDelay {
    async fn pause(&mut self) {}
}

/// Run a bulk job: send each destination its message sequentially, pausing
/// between sends, recording per-destination outcomes and contact updates.
pub async fn run_bulk(
    messenger: &dyn Messenger,
    store: &Store,
    jobs: &[SendJob],
    opts: &BulkOptions,
    pacer: &mut dyn Pacer,
) -> BulkReport {
    let mut results = Vec::with_capacity(jobs.len());
    let mut sent = 0usize;

    for (i, job) in jobs.iter().enumerate() {
        let number = format_phone_number(&job.destination, &opts.country_code);

        let outcome = send_one(messenger, store, &number, &job.text, opts).await;
        if outcome.status == SendStatus::Success {
            sent += 1;
        }
        results.push(SendResult {
            destination: job.destination.clone(),
            ..outcome
        });

        if i + 1 < jobs.len() {
            pacer.pause().await;
        }
    }

    BulkReport {
        sent,
        failed: jobs.len() - sent,
        total: jobs.len(),
        results,
    }
}

/// Process a single destination: verify, send, and record.
async fn send_one(
    messenger: &dyn Messenger,
    store: &Store,
    number: &str,
    text: &str,
    opts: &BulkOptions,
) -> SendResult {
    if opts.verify {
        match messenger.is_registered(number).await {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = store.mark_contact_status(number, "inactive").await {
                    warn!("failed to mark {number} inactive: {e}");
                }
                return SendResult {
                    destination: number.to_string(),
                    status: SendStatus::Skipped,
                    error: Some("not registered on whatsapp".into()),
                };
            }
            Err(e) => {
                return SendResult {
                    destination: number.to_string(),
                    status: SendStatus::Error,
                    error: Some(e.to_string()),
                };
            }
        }
    }

    let send_result = match &opts.image {
        Some(image) => messenger.send_image(number, image, text).await,
        None => messenger.send_text(number, text).await,
    };

    match send_result {
        Ok(()) => {
            if let Err(e) = store.record_send(number).await {
                error!("send to {number} succeeded but contact update failed: {e}");
            }
            SendResult {
                destination: number.to_string(),
                status: SendStatus::Success,
                error: None,
            }
        }
        Err(e) => {
            if let SendError::NotRegistered(_) = e {
                if let Err(se) = store.mark_contact_status(number, "inactive").await {
                    warn!("failed to mark {number} inactive: {se}");
                }
            }
            SendResult {
                destination: number.to_string(),
                status: SendStatus::Error,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Fill template placeholders from a contact record.
///
/// Supported: `{{name}}`, `{{phone}}`, `{{location}}`, `{{business}}`.
/// Missing fields fall back to generic copy rather than leaving holes.
pub fn personalize(template: &str, contact: &Contact) -> String {
    template
        .replace("{{name}}", contact.name.as_deref().unwrap_or("there"))
        .replace("{{phone}}", &contact.phone_number)
        .replace(
            "{{location}}",
            contact.location.as_deref().unwrap_or("your area"),
        )
        .replace(
            "{{business}}",
            contact.business_type.as_deref().unwrap_or("business"),
        )
}
