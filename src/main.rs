//! Command-line interface for neon-import
//!
//! # Usage Examples
//!
//! ## Import
//! ```bash
//! # Import the published dataset file into the default deployment
//! neon-import import stern_neon_user_poetry.jsonl
//!
//! # Point at another deployment via flags or MONGO_* environment variables
//! neon-import import articles.jsonl \
//!   --mongo-host db.internal --mongo-db neon --mongo-collection articles
//!
//! # Replace changed records instead of skipping duplicates
//! neon-import import articles.jsonl --on-conflict replace
//! ```
//!
//! ## Normalize
//! ```bash
//! # Preview normalization of 100 articles against a local endpoint
//! OPENAI_API_KEY=... neon-import normalize \
//!   --base-url http://localhost:11434/v1 --limit 100 --dry-run
//!
//! # Normalize a dump file-to-file, resumable over the combined output
//! OPENAI_API_KEY=... neon-import normalize-file dump.jsonl \
//!   -o normalized_entries.jsonl --failed failed_normalizations.jsonl
//! ```

use clap::{Parser, Subcommand};
use neon_import::import::{self, ImportConfig};
use neon_import::normalize::{self, FileNormalizeConfig, NormalizeConfig};
use neon_import_mongodb_sink::{ConflictMode, MongoOpts};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "neon-import")]
#[command(about = "Import and curate the archived NEON article dataset in MongoDB")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a line-delimited JSON dump into the article collection
    Import {
        /// Path to the JSONL input file
        #[arg(default_value = "stern_neon_user_poetry.jsonl")]
        input: PathBuf,

        /// MongoDB connection options
        #[command(flatten)]
        mongo: MongoOpts,

        /// Field holding the stable record identifier
        #[arg(long, default_value = "id")]
        id_field: String,

        /// What to do when a record's identifier already exists
        #[arg(long, value_enum, default_value = "skip")]
        on_conflict: ConflictMode,

        /// Parse and count records without writing data
        #[arg(long)]
        dry_run: bool,
    },

    /// Append normalized text revisions to imported articles
    Normalize {
        /// MongoDB connection options
        #[command(flatten)]
        mongo: MongoOpts,

        /// API key for the OpenAI-compatible endpoint
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Base URL of the endpoint (e.g. http://localhost:11434/v1)
        #[arg(long, env = "OPENAI_BASE_URL")]
        base_url: Option<String>,

        /// Model to use for normalization
        #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
        model: String,

        /// Maximum number of documents to process
        #[arg(long)]
        limit: Option<u64>,

        /// Resume after this ObjectId (exclusive)
        #[arg(long)]
        resume_from: Option<String>,

        /// Number of concurrent API calls
        #[arg(long, default_value = "5")]
        concurrency: usize,

        /// Preview changes without writing to the database
        #[arg(long)]
        dry_run: bool,
    },

    /// Normalize a JSONL dump file-to-file, without a database
    NormalizeFile {
        /// Path to the JSONL input file
        input: PathBuf,

        /// Output file for normalized entries
        #[arg(long, short = 'o', default_value = "normalized_entries.jsonl")]
        output: PathBuf,

        /// Output file for entries whose normalization failed
        #[arg(long, default_value = "failed_normalizations.jsonl")]
        failed: PathBuf,

        /// API key for the OpenAI-compatible endpoint
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Base URL of the endpoint (e.g. http://localhost:11434/v1)
        #[arg(long, env = "OPENAI_BASE_URL")]
        base_url: Option<String>,

        /// Model to use for normalization
        #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
        model: String,

        /// Maximum number of entries to process
        #[arg(long)]
        max_entries: Option<u64>,

        /// Reprocess entries already marked as normalized or failed
        #[arg(long)]
        force_reprocess: bool,

        /// Append to the output files instead of overwriting them
        #[arg(long)]
        append: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            input,
            mongo,
            id_field,
            on_conflict,
            dry_run,
        } => {
            let summary = import::run(ImportConfig {
                input,
                mongo,
                id_field,
                on_conflict,
                dry_run,
            })
            .await?;
            println!("{summary}");
        }
        Commands::Normalize {
            mongo,
            api_key,
            base_url,
            model,
            limit,
            resume_from,
            concurrency,
            dry_run,
        } => {
            let report = normalize::run(NormalizeConfig {
                mongo,
                limit,
                resume_from,
                concurrency,
                dry_run,
                api_key,
                base_url,
                model,
            })
            .await?;
            println!("{report}");
        }
        Commands::NormalizeFile {
            input,
            output,
            failed,
            api_key,
            base_url,
            model,
            max_entries,
            force_reprocess,
            append,
        } => {
            let report = normalize::run_file(FileNormalizeConfig {
                input,
                output,
                failed,
                max_entries,
                force_reprocess,
                append,
                api_key,
                base_url,
                model,
            })
            .await?;
            println!("{report}");
        }
    }

    Ok(())
}
