//! Index maintenance and conflict-aware record writes.

use crate::error::MongoSinkError;
use bson::Document;
use clap::ValueEnum;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Collection, IndexModel};
use tracing::debug;

/// MongoDB server error code for a unique-key violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// What to do when a record's identifier already exists in the collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConflictMode {
    /// Leave the existing document untouched (insert-only, the default).
    Skip,
    /// Replace the existing document with the incoming record (upsert).
    Replace,
}

/// Outcome of writing a single record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new document was created.
    Inserted,
    /// A document with the same identifier exists; nothing was written.
    DuplicateSkipped,
    /// A document with the same identifier existed and was replaced.
    Replaced,
}

/// Ensure a unique index on the identifier field exists.
///
/// Creating an index that already exists is a no-op on the server, so this
/// is safe to call on every run.
pub async fn ensure_id_index(
    collection: &Collection<Document>,
    id_field: &str,
) -> Result<(), MongoSinkError> {
    let mut keys = Document::new();
    keys.insert(id_field, 1);

    let index = IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build();

    let result = collection.create_index(index).await?;
    debug!("Ensured unique index '{}' on '{}'", result.index_name, id_field);
    Ok(())
}

/// Write one record into the collection, keyed by its identifier.
pub async fn insert_record(
    collection: &Collection<Document>,
    document: Document,
    id_field: &str,
    id: i64,
    mode: ConflictMode,
) -> Result<InsertOutcome, MongoSinkError> {
    match mode {
        ConflictMode::Skip => match collection.insert_one(document).await {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::DuplicateSkipped),
            Err(e) => Err(e.into()),
        },
        ConflictMode::Replace => {
            let mut filter = Document::new();
            filter.insert(id_field, id);

            let result = collection
                .replace_one(filter, document)
                .upsert(true)
                .await?;
            if result.matched_count > 0 {
                Ok(InsertOutcome::Replaced)
            } else {
                Ok(InsertOutcome::Inserted)
            }
        }
    }
}

/// Convert a parsed JSON object into a BSON document.
pub fn to_bson_document(
    fields: &serde_json::Map<String, serde_json::Value>,
) -> Result<Document, MongoSinkError> {
    Ok(bson::to_document(fields)?)
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;

    #[test]
    fn converts_json_object_to_bson() {
        let value = serde_json::json!({
            "id": 42,
            "title": "Nachtgedanken",
            "subtitle": null,
            "created": 1199145600,
            "main_category": "kultur"
        });
        let serde_json::Value::Object(fields) = value else {
            unreachable!()
        };

        let doc = to_bson_document(&fields).unwrap();
        assert_eq!(doc.get_i64("id").unwrap(), 42);
        assert_eq!(doc.get_str("title").unwrap(), "Nachtgedanken");
        assert_eq!(doc.get("subtitle"), Some(&Bson::Null));
        assert_eq!(doc.get_i64("created").unwrap(), 1199145600);
    }

    #[test]
    fn conflict_mode_round_trips_through_clap() {
        assert_eq!(
            ConflictMode::from_str("skip", true).unwrap(),
            ConflictMode::Skip
        );
        assert_eq!(
            ConflictMode::from_str("replace", true).unwrap(),
            ConflictMode::Replace
        );
    }
}
