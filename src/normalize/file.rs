//! File-to-file normalization of a JSONL dump.
//!
//! Offline counterpart to the collection pipeline: reads a JSONL dump,
//! normalizes each entry's text, and writes normalized entries to one file
//! and failures to another. Entries carry marker fields so an interrupted
//! run can be resumed over the combined output.

use crate::normalize::client::{ChatClient, TextNormalizer};
use crate::normalize::quotes::normalize_quotes;
use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Marker set on entries that were normalized successfully.
const NORMALIZED_MARKER: &str = "_normalized";
/// Marker set on entries whose normalization failed.
const FAILED_MARKER: &str = "_normalization_failed";

/// Configuration for a file-to-file normalization run.
pub struct FileNormalizeConfig {
    /// Input JSONL file.
    pub input: PathBuf,

    /// Output file for normalized entries.
    pub output: PathBuf,

    /// Output file for entries whose normalization failed.
    pub failed: PathBuf,

    /// Maximum number of entries to process (counting already-marked ones).
    pub max_entries: Option<u64>,

    /// Reprocess entries already carrying a marker field.
    pub force_reprocess: bool,

    /// Append to the output files instead of overwriting them.
    pub append: bool,

    /// API key for the OpenAI-compatible endpoint.
    pub api_key: String,

    /// Base URL of the endpoint (defaults to the OpenAI API).
    pub base_url: Option<String>,

    /// Model name.
    pub model: String,
}

/// Counters reported after a file normalization run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileNormalizeReport {
    /// Entries newly normalized in this run.
    pub normalized: u64,
    /// Entries already carrying a marker, passed through unchanged.
    pub already_processed: u64,
    /// Entries skipped for having no usable text.
    pub skipped: u64,
    /// Entries that failed to parse or to normalize.
    pub failed: u64,
}

impl fmt::Display for FileNormalizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Normalization complete:")?;
        writeln!(f, "  normalized:         {}", self.normalized)?;
        writeln!(f, "  already processed:  {}", self.already_processed)?;
        writeln!(f, "  skipped (no text):  {}", self.skipped)?;
        write!(f, "  failed:             {}", self.failed)
    }
}

/// State of an entry before normalization.
#[derive(Debug, PartialEq, Eq)]
enum EntryState {
    /// No non-blank string under `text`.
    NoText,
    /// Already normalized in an earlier run.
    AlreadyNormalized,
    /// Already failed in an earlier run.
    AlreadyFailed,
    /// Ready to normalize.
    Pending,
}

fn classify(entry: &Map<String, Value>) -> EntryState {
    let has_text = matches!(entry.get("text"), Some(Value::String(s)) if !s.trim().is_empty());
    if !has_text {
        return EntryState::NoText;
    }
    if marker_set(entry, NORMALIZED_MARKER) {
        return EntryState::AlreadyNormalized;
    }
    if marker_set(entry, FAILED_MARKER) {
        return EntryState::AlreadyFailed;
    }
    EntryState::Pending
}

fn marker_set(entry: &Map<String, Value>, marker: &str) -> bool {
    entry.get(marker).and_then(Value::as_bool).unwrap_or(false)
}

/// Run a file-to-file normalization.
pub async fn run(config: FileNormalizeConfig) -> Result<FileNormalizeReport> {
    if !config.input.is_file() {
        bail!("input file {:?} not found", config.input);
    }

    tracing::info!("Normalizing {:?}", config.input);
    tracing::info!(
        "Output: {:?}, failed entries: {:?} (mode: {})",
        config.output,
        config.failed,
        if config.append { "append" } else { "overwrite" }
    );
    if config.force_reprocess {
        tracing::warn!("Force reprocess enabled - already-marked entries will be reprocessed");
    }

    let client = ChatClient::new(config.api_key, config.base_url, config.model)?;

    let input = File::open(&config.input)
        .with_context(|| format!("failed to open {:?}", config.input))?;
    let mut output = open_sink(&config.output, config.append)?;
    let mut failed = open_sink(&config.failed, config.append)?;

    let report = normalize_file_records(
        BufReader::new(input),
        &mut output,
        &mut failed,
        &client,
        config.max_entries,
        config.force_reprocess,
    )
    .await?;

    output.flush().context("failed to flush output file")?;
    failed.flush().context("failed to flush failed-entries file")?;

    tracing::info!(
        "Normalization finished: {} normalized, {} already processed, {} skipped, {} failed",
        report.normalized,
        report.already_processed,
        report.skipped,
        report.failed
    );

    Ok(report)
}

fn open_sink(path: &Path, append: bool) -> Result<BufWriter<File>> {
    let file = if append {
        OpenOptions::new().create(true).append(true).open(path)
    } else {
        File::create(path)
    }
    .with_context(|| format!("failed to open {path:?}"))?;
    Ok(BufWriter::new(file))
}

/// Stream entries from a reader through a normalizer into the output files.
pub async fn normalize_file_records<R: BufRead>(
    reader: R,
    output: &mut impl Write,
    failed: &mut impl Write,
    normalizer: &impl TextNormalizer,
    max_entries: Option<u64>,
    force_reprocess: bool,
) -> Result<FileNormalizeReport> {
    let mut report = FileNormalizeReport::default();

    for (line_number, line) in reader.lines().enumerate() {
        let line_number = (line_number + 1) as u64;
        let line = line.context("failed to read input line")?;
        if line.trim().is_empty() {
            continue;
        }

        if let Some(max) = max_entries {
            if report.normalized + report.already_processed >= max {
                tracing::info!("Reached maximum entries limit: {max}");
                break;
            }
        }

        let mut entry = match serde_json::from_str::<Value>(&line) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                tracing::warn!("Line {line_number}: not a JSON object");
                report.failed += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!("Line {line_number}: invalid JSON: {e}");
                report.failed += 1;
                continue;
            }
        };

        let mut state = classify(&entry);
        if force_reprocess
            && matches!(
                state,
                EntryState::AlreadyNormalized | EntryState::AlreadyFailed
            )
        {
            // Stale markers would contradict the fresh result.
            entry.remove(NORMALIZED_MARKER);
            entry.remove(FAILED_MARKER);
            state = EntryState::Pending;
        }

        match state {
            EntryState::NoText => {
                tracing::debug!("Line {line_number}: no text, skipped");
                report.skipped += 1;
            }
            EntryState::AlreadyNormalized => {
                write_entry(output, &entry)?;
                report.already_processed += 1;
            }
            EntryState::AlreadyFailed => {
                write_entry(failed, &entry)?;
                report.already_processed += 1;
            }
            EntryState::Pending => {
                let text = entry
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                match normalizer.normalize(&text).await {
                    Ok(normalized) => {
                        let normalized = normalize_quotes(&normalized);
                        entry.insert(
                            "_original_length".to_string(),
                            Value::from(text.chars().count() as u64),
                        );
                        entry.insert(
                            "_normalized_length".to_string(),
                            Value::from(normalized.chars().count() as u64),
                        );
                        entry.insert(NORMALIZED_MARKER.to_string(), Value::Bool(true));
                        entry.insert("text".to_string(), Value::String(normalized));
                        write_entry(output, &entry)?;
                        report.normalized += 1;
                        tracing::debug!("Line {line_number}: normalized");
                    }
                    Err(e) => {
                        tracing::warn!("Line {line_number}: normalization failed: {e:#}");
                        entry.insert(FAILED_MARKER.to_string(), Value::Bool(true));
                        write_entry(failed, &entry)?;
                        report.failed += 1;
                    }
                }
            }
        }
    }

    Ok(report)
}

fn write_entry(sink: &mut impl Write, entry: &Map<String, Value>) -> Result<()> {
    serde_json::to_writer(&mut *sink, entry).context("failed to serialize entry")?;
    writeln!(sink).context("failed to write entry")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io::Cursor;

    /// Offline normalizer: uppercases text, fails on demand.
    struct FakeNormalizer {
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl TextNormalizer for FakeNormalizer {
        async fn normalize(&self, text: &str) -> Result<String> {
            if self.fail_on == Some(text) {
                bail!("model unavailable");
            }
            Ok(text.to_uppercase())
        }
    }

    async fn run_over(
        input: &str,
        normalizer: &FakeNormalizer,
        max_entries: Option<u64>,
        force_reprocess: bool,
    ) -> (FileNormalizeReport, Vec<Map<String, Value>>, Vec<Map<String, Value>>) {
        let mut output = Vec::new();
        let mut failed = Vec::new();
        let report = normalize_file_records(
            Cursor::new(input.to_string()),
            &mut output,
            &mut failed,
            normalizer,
            max_entries,
            force_reprocess,
        )
        .await
        .unwrap();
        (report, parse_lines(&output), parse_lines(&failed))
    }

    fn parse_lines(bytes: &[u8]) -> Vec<Map<String, Value>> {
        String::from_utf8(bytes.to_vec())
            .unwrap()
            .lines()
            .map(|line| match serde_json::from_str(line).unwrap() {
                Value::Object(map) => map,
                other => panic!("expected object, got {other}"),
            })
            .collect()
    }

    fn ok_normalizer() -> FakeNormalizer {
        FakeNormalizer { fail_on: None }
    }

    #[tokio::test]
    async fn normalizes_entries_and_sets_markers() {
        let input = "{\"id\": 1, \"text\": \"hallo welt\"}\n";
        let (report, output, failed) = run_over(input, &ok_normalizer(), None, false).await;

        assert_eq!(report.normalized, 1);
        assert_eq!(report.failed, 0);
        assert!(failed.is_empty());

        let entry = &output[0];
        assert_eq!(entry["text"], "HALLO WELT");
        assert_eq!(entry["_normalized"], true);
        assert_eq!(entry["_original_length"], 10);
        assert_eq!(entry["_normalized_length"], 10);
    }

    #[tokio::test]
    async fn skips_entries_without_text() {
        let input = "{\"id\": 1}\n{\"id\": 2, \"text\": \"  \"}\n{\"id\": 3, \"text\": \"a\"}\n";
        let (report, output, _) = run_over(input, &ok_normalizer(), None, false).await;

        assert_eq!(report.skipped, 2);
        assert_eq!(report.normalized, 1);
        assert_eq!(output.len(), 1);
    }

    #[tokio::test]
    async fn passes_through_already_marked_entries() {
        let input = "\
{\"id\": 1, \"text\": \"done\", \"_normalized\": true}\n\
{\"id\": 2, \"text\": \"broken\", \"_normalization_failed\": true}\n";
        let (report, output, failed) = run_over(input, &ok_normalizer(), None, false).await;

        assert_eq!(report.already_processed, 2);
        assert_eq!(report.normalized, 0);
        // Already-normalized text is not sent to the API again.
        assert_eq!(output[0]["text"], "done");
        assert_eq!(failed[0]["text"], "broken");
    }

    #[tokio::test]
    async fn force_reprocess_renormalizes_marked_entries() {
        let input = "{\"id\": 1, \"text\": \"again\", \"_normalization_failed\": true}\n";
        let (report, output, failed) = run_over(input, &ok_normalizer(), None, true).await;

        assert_eq!(report.normalized, 1);
        assert_eq!(report.already_processed, 0);
        assert!(failed.is_empty());
        let entry = &output[0];
        assert_eq!(entry["text"], "AGAIN");
        assert_eq!(entry["_normalized"], true);
        assert!(!entry.contains_key("_normalization_failed"));
    }

    #[tokio::test]
    async fn failures_and_bad_lines_go_to_the_failed_file() {
        let input = "{\"id\": 1, \"text\": \"kaputt\"}\nnot json\n[1, 2]\n";
        let normalizer = FakeNormalizer {
            fail_on: Some("kaputt"),
        };
        let (report, output, failed) = run_over(input, &normalizer, None, false).await;

        assert_eq!(report.failed, 3);
        assert!(output.is_empty());
        // Unparseable lines are counted but cannot be written back.
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["_normalization_failed"], true);
        assert_eq!(failed[0]["text"], "kaputt");
    }

    #[tokio::test]
    async fn max_entries_counts_new_and_already_processed() {
        let input = "\
{\"id\": 1, \"text\": \"a\", \"_normalized\": true}\n\
{\"id\": 2, \"text\": \"b\"}\n\
{\"id\": 3, \"text\": \"c\"}\n";
        let (report, output, _) = run_over(input, &ok_normalizer(), Some(2), false).await;

        assert_eq!(report.already_processed + report.normalized, 2);
        assert_eq!(report.normalized, 1);
        assert_eq!(output.len(), 2);
    }

    #[tokio::test]
    async fn empty_input_completes_with_zero_counts() {
        let (report, output, failed) = run_over("", &ok_normalizer(), None, false).await;
        assert_eq!(report, FileNormalizeReport::default());
        assert!(output.is_empty());
        assert!(failed.is_empty());
    }

    #[test]
    fn classify_orders_text_check_before_markers() {
        let entry = match serde_json::json!({"_normalized": true}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(classify(&entry), EntryState::NoText);
    }
}
