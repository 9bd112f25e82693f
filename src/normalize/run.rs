//! Normalization pipeline over the article collection.

use crate::normalize::client::ChatClient;
use crate::normalize::quotes::normalize_quotes;
use anyhow::{Context, Result};
use bson::oid::ObjectId;
use bson::{doc, Document};
use futures::StreamExt;
use mongodb::Collection;
use neon_import_mongodb_sink::MongoOpts;
use std::fmt;

/// Configuration for a normalization run.
pub struct NormalizeConfig {
    /// MongoDB connection options.
    pub mongo: MongoOpts,

    /// Maximum number of documents to process.
    pub limit: Option<u64>,

    /// Resume after this `_id` (exclusive).
    pub resume_from: Option<String>,

    /// Number of concurrent API calls.
    pub concurrency: usize,

    /// Preview changes without writing to the database.
    pub dry_run: bool,

    /// API key for the OpenAI-compatible endpoint.
    pub api_key: String,

    /// Base URL of the endpoint (defaults to the OpenAI API).
    pub base_url: Option<String>,

    /// Model name.
    pub model: String,
}

/// Counters reported after a normalization run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Documents that received a new normalized revision.
    pub normalized: u64,
    /// Documents skipped for having no usable text.
    pub skipped: u64,
    /// Documents where normalization or the write failed.
    pub failed: u64,
}

impl fmt::Display for NormalizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Normalization complete:")?;
        writeln!(f, "  normalized:  {}", self.normalized)?;
        writeln!(f, "  skipped:     {}", self.skipped)?;
        write!(f, "  failed:      {}", self.failed)
    }
}

/// Select documents with non-blank text and no normalized revision yet.
fn pending_filter(resume_from: Option<&ObjectId>) -> Document {
    let mut filter = doc! {
        "text": { "$type": "string", "$regex": r"\S" },
        "$or": [
            { "revisions": { "$exists": false } },
            { "revisions": { "$not": { "$elemMatch": { "revision_type": "normalized" } } } },
        ],
    };
    if let Some(oid) = resume_from {
        filter.insert("_id", doc! { "$gt": *oid });
    }
    filter
}

/// Run the normalization pipeline.
///
/// Per-document API failures are logged and counted; only connection-level
/// failures abort the run.
pub async fn run(config: NormalizeConfig) -> Result<NormalizeReport> {
    let collection = neon_import_mongodb_sink::connect(&config.mongo)
        .await
        .context("failed to connect to MongoDB")?;

    let client = ChatClient::new(config.api_key, config.base_url, config.model)?;

    let resume_from = config
        .resume_from
        .as_deref()
        .map(ObjectId::parse_str)
        .transpose()
        .context("invalid --resume-from ObjectId")?;
    let filter = pending_filter(resume_from.as_ref());

    let pending = collection.count_documents(filter.clone()).await?;
    tracing::info!("{pending} documents pending normalization");
    if config.dry_run {
        tracing::warn!("Running in dry-run mode - no revisions will be written");
    }

    let cursor = collection
        .find(filter)
        .sort(doc! { "_id": 1 })
        .await
        .context("failed to query pending documents")?;

    let limit = config.limit.unwrap_or(u64::MAX) as usize;
    let concurrency = config.concurrency.max(1);

    let client_ref = &client;
    let collection_ref = &collection;
    let dry_run = config.dry_run;

    let mut outcomes = cursor
        .take(limit)
        .map(|item| async move {
            let document = item.context("cursor failed while reading documents")?;
            process_document(collection_ref, client_ref, document, dry_run).await
        })
        .buffer_unordered(concurrency);

    let mut report = NormalizeReport::default();
    while let Some(outcome) = outcomes.next().await {
        match outcome {
            Ok(true) => report.normalized += 1,
            Ok(false) => report.skipped += 1,
            Err(e) => {
                tracing::warn!("Normalization failed: {e:#}");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        "Normalization finished: {} normalized, {} skipped, {} failed",
        report.normalized,
        report.skipped,
        report.failed
    );

    Ok(report)
}

/// Normalize one document's text and append a revision.
///
/// Returns `Ok(false)` when the document carries no usable text.
async fn process_document(
    collection: &Collection<Document>,
    client: &ChatClient,
    document: Document,
    dry_run: bool,
) -> Result<bool> {
    let id = document
        .get_object_id("_id")
        .context("document missing _id")?;
    let text = document.get_str("text").unwrap_or_default().trim();
    if text.is_empty() {
        return Ok(false);
    }

    let normalized = client
        .normalize_text(text)
        .await
        .with_context(|| format!("_id={id}"))?;
    let normalized = normalize_quotes(&normalized);

    let revision = doc! {
        "revision_type": "normalized",
        "normalized_at": chrono::Utc::now().timestamp(),
        "source_fields": ["text"],
        "text": normalized.as_str(),
    };

    if dry_run {
        tracing::info!("DRY-RUN _id={id} would append a normalized revision");
        tracing::debug!("--- ORIGINAL ---\n{text}\n--- NORMALIZED ---\n{normalized}");
        return Ok(true);
    }

    collection
        .update_one(
            doc! { "_id": id },
            doc! { "$push": { "revisions": revision } },
        )
        .await
        .with_context(|| format!("failed to update _id={id}"))?;

    tracing::debug!("Appended normalized revision to _id={id}");
    Ok(true)
}
