//! NEON article import library
//!
//! Pipelines for loading the archived NEON user-article dataset into MongoDB
//! and for curating it afterwards:
//!
//! - Import: stream a line-delimited JSON dump into the article collection,
//!   idempotently, with a unique index on the stable `id` field.
//! - Normalize: append LLM-normalized text revisions to imported articles
//!   via an OpenAI-compatible chat completions API, either in place against
//!   the collection or file-to-file over a JSONL dump.
//!
//! # CLI Usage
//!
//! ```bash
//! # Import the published dataset file
//! neon-import import stern_neon_user_poetry.jsonl
//!
//! # Re-running is safe: records already present are skipped
//! neon-import import stern_neon_user_poetry.jsonl
//!
//! # Replace changed records instead of skipping them
//! neon-import import updated_dump.jsonl --on-conflict replace
//!
//! # Append normalized text revisions (requires OPENAI_API_KEY)
//! neon-import normalize --limit 100 --dry-run
//!
//! # Normalize a dump file-to-file, without a database
//! neon-import normalize-file stern_neon_user_poetry.jsonl
//! ```

pub mod import;
pub mod normalize;

// Re-export source and sink crates for convenience
pub use neon_import_jsonl_source as jsonl;
pub use neon_import_mongodb_sink as sink;
