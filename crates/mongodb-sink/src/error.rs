//! Error types for the MongoDB sink.

use thiserror::Error;

/// Errors that can occur while writing to MongoDB.
#[derive(Error, Debug)]
pub enum MongoSinkError {
    /// MongoDB connection or query error.
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    /// The record could not be represented as a BSON document.
    #[error("record is not representable as BSON: {0}")]
    Bson(#[from] bson::ser::Error),
}
