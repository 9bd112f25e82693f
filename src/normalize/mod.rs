//! Text normalization pipelines.
//!
//! Two ways to clean article text via an OpenAI-compatible chat completions
//! API: in place against the MongoDB collection (appending revision
//! subdocuments, never overwriting originals), or file-to-file over a JSONL
//! dump (writing marked entries to output and failure files).

mod client;
mod file;
mod quotes;
mod run;

pub use client::{ChatClient, TextNormalizer};
pub use file::{run as run_file, FileNormalizeConfig, FileNormalizeReport};
pub use quotes::normalize_quotes;
pub use run::{run, NormalizeConfig, NormalizeReport};
