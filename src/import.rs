//! JSONL import pipeline.
//!
//! Streams a line-delimited JSON file into the article collection in file
//! order, one record at a time. Malformed lines and duplicate identifiers
//! are counted and skipped; only connection and I/O failures abort the run.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bson::Document;
use mongodb::Collection;
use neon_import_jsonl_source::{ParsedLine, RawRecord, RecordReader};
use neon_import_mongodb_sink::{ConflictMode, InsertOutcome, MongoOpts};
use std::fmt;
use std::io::BufRead;
use std::path::PathBuf;

/// Configuration for a single import run.
#[derive(Clone, Debug)]
pub struct ImportConfig {
    /// Path to the JSONL input file.
    pub input: PathBuf,

    /// MongoDB connection options.
    pub mongo: MongoOpts,

    /// Field holding the stable record identifier (default: "id").
    pub id_field: String,

    /// What to do when a record's identifier already exists.
    pub on_conflict: ConflictMode,

    /// Whether to parse and count without writing data.
    pub dry_run: bool,
}

/// Counters reported after an import run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Total lines read from the input file, including blank ones.
    pub lines_read: u64,
    /// Records newly inserted.
    pub inserted: u64,
    /// Records skipped because their identifier was already present.
    pub duplicates: u64,
    /// Records that replaced an existing document (replace mode only).
    pub replaced: u64,
    /// Lines that failed to parse as a record.
    pub malformed: u64,
    /// Blank lines.
    pub blank: u64,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Import complete:")?;
        writeln!(f, "  lines read:  {}", self.lines_read)?;
        writeln!(f, "  inserted:    {}", self.inserted)?;
        writeln!(f, "  duplicates:  {}", self.duplicates)?;
        if self.replaced > 0 {
            writeln!(f, "  replaced:    {}", self.replaced)?;
        }
        writeln!(f, "  malformed:   {}", self.malformed)?;
        write!(f, "  blank:       {}", self.blank)
    }
}

/// Destination for well-formed records.
///
/// The import loop only needs one operation from its sink, so the seam is a
/// single-method trait; tests substitute an in-memory implementation.
#[async_trait]
pub trait RecordSink {
    async fn write(&self, record: &RawRecord) -> Result<InsertOutcome>;
}

/// Sink writing records into a MongoDB collection.
pub struct MongoSink {
    collection: Collection<Document>,
    id_field: String,
    on_conflict: ConflictMode,
    dry_run: bool,
}

impl MongoSink {
    pub fn new(
        collection: Collection<Document>,
        id_field: impl Into<String>,
        on_conflict: ConflictMode,
        dry_run: bool,
    ) -> Self {
        Self {
            collection,
            id_field: id_field.into(),
            on_conflict,
            dry_run,
        }
    }
}

#[async_trait]
impl RecordSink for MongoSink {
    async fn write(&self, record: &RawRecord) -> Result<InsertOutcome> {
        let document = neon_import_mongodb_sink::to_bson_document(&record.fields)
            .with_context(|| format!("record id {} is not valid BSON", record.id))?;

        if self.dry_run {
            return Ok(InsertOutcome::Inserted);
        }

        let outcome = neon_import_mongodb_sink::insert_record(
            &self.collection,
            document,
            &self.id_field,
            record.id,
            self.on_conflict,
        )
        .await?;
        Ok(outcome)
    }
}

/// Run a full import: connect, ensure the index, stream the file.
///
/// The connection handle is dropped on every exit path, success or not.
pub async fn run(config: ImportConfig) -> Result<ImportSummary> {
    if !config.input.is_file() {
        bail!("input file {:?} not found", config.input);
    }

    tracing::info!("Importing {:?}", config.input);
    if config.dry_run {
        tracing::warn!("Running in dry-run mode - no data will be written");
    }

    let collection = neon_import_mongodb_sink::connect(&config.mongo)
        .await
        .context("failed to connect to MongoDB")?;

    if !config.dry_run {
        neon_import_mongodb_sink::ensure_id_index(&collection, &config.id_field)
            .await
            .with_context(|| format!("failed to ensure index on '{}'", config.id_field))?;
    }

    let reader = neon_import_jsonl_source::open(&config.input, &config.id_field)
        .with_context(|| format!("failed to open {:?}", config.input))?;

    let sink = MongoSink::new(
        collection,
        config.id_field,
        config.on_conflict,
        config.dry_run,
    );

    import_records(reader, &sink).await
}

/// Stream records from a reader into a sink, tallying per-line outcomes.
pub async fn import_records<R: BufRead>(
    reader: RecordReader<R>,
    sink: &impl RecordSink,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for item in reader {
        let (line_number, parsed) = item.context("failed to read input line")?;
        summary.lines_read += 1;

        match parsed {
            ParsedLine::Blank => summary.blank += 1,
            ParsedLine::Malformed(e) => {
                tracing::warn!("Skipping line {line_number}: {e}");
                summary.malformed += 1;
            }
            ParsedLine::Record(record) => {
                let outcome = sink
                    .write(&record)
                    .await
                    .with_context(|| format!("failed to write record at line {line_number}"))?;
                match outcome {
                    InsertOutcome::Inserted => summary.inserted += 1,
                    InsertOutcome::DuplicateSkipped => {
                        tracing::debug!(
                            "Line {line_number}: id {} already present, skipped",
                            record.id
                        );
                        summary.duplicates += 1;
                    }
                    InsertOutcome::Replaced => {
                        tracing::debug!("Line {line_number}: id {} replaced", record.id);
                        summary.replaced += 1;
                    }
                }
            }
        }

        if summary.lines_read % 1000 == 0 {
            tracing::info!("Processed {} lines...", summary.lines_read);
        }
    }

    tracing::info!(
        "Import finished: {} inserted, {} duplicates, {} malformed",
        summary.inserted,
        summary.duplicates,
        summary.malformed
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Cursor;
    use std::sync::Mutex;

    /// In-memory sink tracking seen identifiers.
    struct MemorySink {
        seen: Mutex<HashSet<i64>>,
        on_conflict: ConflictMode,
    }

    impl MemorySink {
        fn new(on_conflict: ConflictMode) -> Self {
            Self {
                seen: Mutex::new(HashSet::new()),
                on_conflict,
            }
        }
    }

    #[async_trait]
    impl RecordSink for MemorySink {
        async fn write(&self, record: &RawRecord) -> Result<InsertOutcome> {
            let mut seen = self.seen.lock().unwrap();
            if seen.insert(record.id) {
                Ok(InsertOutcome::Inserted)
            } else {
                match self.on_conflict {
                    ConflictMode::Skip => Ok(InsertOutcome::DuplicateSkipped),
                    ConflictMode::Replace => Ok(InsertOutcome::Replaced),
                }
            }
        }
    }

    fn reader(input: &str) -> RecordReader<Cursor<String>> {
        RecordReader::new(Cursor::new(input.to_string()), "id")
    }

    #[tokio::test]
    async fn counts_add_up() {
        let input = "{\"id\": 1}\n{\"id\": 2}\nnot json\n\n{\"id\": 1}\n";
        let sink = MemorySink::new(ConflictMode::Skip);

        let summary = import_records(reader(input), &sink).await.unwrap();

        assert_eq!(summary.lines_read, 5);
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.blank, 1);
        assert_eq!(
            summary.inserted,
            summary.lines_read - summary.malformed - summary.duplicates - summary.blank
        );
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let input = "{\"id\": 1}\n{\"id\": 2}\n{\"id\": 3}\n";
        let sink = MemorySink::new(ConflictMode::Skip);

        let first = import_records(reader(input), &sink).await.unwrap();
        assert_eq!(first.inserted, 3);
        assert_eq!(first.duplicates, 0);

        let second = import_records(reader(input), &sink).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 3);
    }

    #[tokio::test]
    async fn replace_mode_counts_replacements() {
        let input = "{\"id\": 1}\n{\"id\": 1}\n";
        let sink = MemorySink::new(ConflictMode::Replace);

        let summary = import_records(reader(input), &sink).await.unwrap();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.replaced, 1);
        assert_eq!(summary.duplicates, 0);
    }

    #[tokio::test]
    async fn empty_input_completes_with_zero_counts() {
        let sink = MemorySink::new(ConflictMode::Skip);
        let summary = import_records(reader(""), &sink).await.unwrap();
        assert_eq!(summary, ImportSummary::default());
    }

    #[tokio::test]
    async fn missing_input_file_is_fatal() {
        let config = ImportConfig {
            input: PathBuf::from("/nonexistent/dump.jsonl"),
            mongo: MongoOpts {
                mongo_host: "localhost".to_string(),
                mongo_port: 27017,
                mongo_user: "admin".to_string(),
                mongo_password: "password".to_string(),
                mongo_db: "stern_neon_db".to_string(),
                mongo_collection: "articles".to_string(),
            },
            id_field: "id".to_string(),
            on_conflict: ConflictMode::Skip,
            dry_run: false,
        };

        let err = run(config).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn summary_display_lists_counts() {
        let summary = ImportSummary {
            lines_read: 10,
            inserted: 7,
            duplicates: 1,
            replaced: 0,
            malformed: 1,
            blank: 1,
        };
        let text = summary.to_string();
        assert!(text.contains("lines read:  10"));
        assert!(text.contains("inserted:    7"));
        assert!(!text.contains("replaced"));
    }
}
