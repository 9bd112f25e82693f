//! MongoDB sink for the NEON article importer
//!
//! Connection handling, unique-index maintenance, and conflict-aware
//! single-record writes against the target article collection.

mod connect;
mod error;
mod insert;

pub use connect::{connect, MongoOpts};
pub use error::MongoSinkError;
pub use insert::{
    ensure_id_index, insert_record, to_bson_document, ConflictMode, InsertOutcome,
};
