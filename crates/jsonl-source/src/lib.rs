//! JSONL source for the NEON article importer
//!
//! This crate reads line-delimited JSON files and parses each line into a
//! record keyed by a stable identifier field. Parse failures are reported
//! per line so the caller can skip and count them instead of aborting.

mod error;
mod reader;
mod record;

pub use error::ParseError;
pub use reader::{open, ParsedLine, RecordReader};
pub use record::RawRecord;
