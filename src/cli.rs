//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Emend - chunked document correction with anchored, undoable edits
#[derive(Parser, Debug)]
#[command(name = "emend")]
#[command(version)]
#[command(about = "Run a completion service over a long document and anchor its corrections")]
#[command(
    long_about = "Emend splits a document into chunks, sends each chunk to a completion service, \
anchors the returned suggestions onto exact document offsets, and applies them with undo support."
)]
pub struct Cli {
    /// Config file (defaults to $EMEND_CONFIG, then ./emend.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the chunk boundaries for a document
    Chunk {
        /// Document to split
        file: PathBuf,

        /// Maximum chunk size in bytes
        #[arg(long)]
        max_chunk_size: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Compare two files line by line
    Diff {
        old: PathBuf,
        new: PathBuf,

        /// Print aligned blocks as JSON instead of a unified diff
        #[arg(long, default_value_t = false)]
        aligned: bool,
    },

    /// Anchor a suggestions file onto a document
    Anchor {
        /// Document the suggestions refer to
        document: PathBuf,

        /// JSON array of {original, corrected, explanation, type}
        suggestions: PathBuf,
    },

    /// Run the full pipeline against the configured completion service
    Run {
        /// Document to correct
        document: PathBuf,

        /// Completion service base URL (overrides config)
        #[arg(long)]
        endpoint: Option<String>,

        /// Chunks in flight at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Maximum chunk size in bytes
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Accept every correction in a file and write the corrected document
    Apply {
        /// Document the corrections were anchored on
        document: PathBuf,

        /// Corrections array, or a report from `emend run`
        corrections: PathBuf,

        /// Write the corrected document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
