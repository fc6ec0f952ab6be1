//! CLI command handlers.
//!
//! Each handler loads configuration, does its work through the library
//! crates, and writes results to stdout or an `--output` file. Errors carry
//! file context via `anyhow`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use emend::EmendConfig;
use emend_completion::{HttpCompletionClient, parse_suggestions};
use emend_core::{Correction, CorrectionSet, RawSuggestion};
use emend_diff::{DiffStats, aligned_blocks, line_diff, unified_diff};
use emend_pipeline::{
    AnchorResolver, CorrectionPipeline, DroppedCorrection, PoolProgress, RunController,
    filter_overlaps, split,
};
use emend_review::ReviewSession;
use serde::{Deserialize, Serialize};
use tokio::signal;
use tracing::{error, info, warn};
use url::Url;

use crate::cli::Commands;

/// Execute a CLI command.
///
/// This is the main command dispatcher that routes to the appropriate handler.
pub async fn execute_command(command: Commands, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Chunk {
            file,
            max_chunk_size,
            json,
        } => cmd_chunk(&file, max_chunk_size, json, config_path),

        Commands::Diff { old, new, aligned } => cmd_diff(&old, &new, aligned),

        Commands::Anchor {
            document,
            suggestions,
        } => cmd_anchor(&document, &suggestions, config_path),

        Commands::Run {
            document,
            endpoint,
            concurrency,
            chunk_size,
            output,
        } => {
            let overrides = RunOverrides {
                endpoint,
                concurrency,
                chunk_size,
            };
            cmd_run(&document, overrides, output, config_path).await
        }

        Commands::Apply {
            document,
            corrections,
            output,
        } => cmd_apply(&document, &corrections, output.as_deref(), config_path),
    }
}

/// Print chunk boundaries.
fn cmd_chunk(
    file: &Path,
    max_chunk_size: Option<usize>,
    json: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = EmendConfig::load(config_path)?;
    let mut chunking = config.pipeline.chunking;
    if let Some(size) = max_chunk_size {
        chunking.max_chunk_size = size;
    }

    let text = read_text(file)?;
    let chunks = split(&text, &chunking)?;
    info!(chunks = chunks.len(), max_chunk_size = chunking.max_chunk_size, "Split document");

    if json {
        write_output(None, &to_json(&chunks)?)
    } else {
        let table: String = chunks
            .iter()
            .map(|c| format!("{:>4}  {:>8}..{:<8} {:>6} bytes\n", c.index, c.start, c.end, c.len()))
            .collect();
        write_output(None, &table)
    }
}

/// Print a unified diff, or aligned blocks as JSON.
fn cmd_diff(old: &Path, new: &Path, aligned: bool) -> Result<()> {
    let old_text = read_text(old)?;
    let new_text = read_text(new)?;

    let stats = DiffStats::from_ops(&line_diff(&old_text, &new_text));
    info!(%stats, "Compared files");

    if aligned {
        write_output(None, &to_json(&aligned_blocks(&old_text, &new_text))?)
    } else if stats.has_changes() {
        write_output(None, &format!("{}\n", unified_diff(&old_text, &new_text)))
    } else {
        Ok(())
    }
}

/// Result of `emend anchor`.
#[derive(Debug, Serialize)]
struct AnchorOutput {
    corrections: CorrectionSet,
    unmatched: Vec<RawSuggestion>,
    dropped: Vec<DroppedCorrection>,
    duplicates: usize,
}

/// Anchor a suggestions file over the whole document.
fn cmd_anchor(document: &Path, suggestions: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = EmendConfig::load(config_path)?;
    let text = read_text(document)?;
    let suggestions = parse_suggestions(&read_text(suggestions)?);

    let result = AnchorResolver::new(config.pipeline.anchor).resolve(&suggestions, &text, 0);
    let filtered = filter_overlaps(result.mapped);
    let output = AnchorOutput {
        corrections: CorrectionSet::from_filtered(filtered.kept),
        unmatched: result.unmatched,
        dropped: filtered.dropped,
        duplicates: result.duplicates,
    };
    info!(
        suggestions = suggestions.len(),
        mapped = output.corrections.len(),
        unmatched = output.unmatched.len(),
        "Anchored suggestions"
    );
    write_output(None, &to_json(&output)?)
}

/// CLI values that override the config file for `emend run`.
#[derive(Debug, Default)]
struct RunOverrides {
    endpoint: Option<String>,
    concurrency: Option<usize>,
    chunk_size: Option<usize>,
}

impl RunOverrides {
    fn apply(self, config: &mut EmendConfig) -> Result<()> {
        if let Some(endpoint) = self.endpoint {
            let url = endpoint
                .parse::<Url>()
                .with_context(|| format!("Invalid endpoint URL: {endpoint}"))?;
            config.completion.base_url = Some(url);
        }
        if let Some(concurrency) = self.concurrency {
            config.pipeline.concurrency = concurrency;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.pipeline.chunking.max_chunk_size = chunk_size;
        }
        config.validate()?;
        Ok(())
    }
}

/// Run the full pipeline. Ctrl+C cancels the run.
async fn cmd_run(
    document: &Path,
    overrides: RunOverrides,
    output: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = EmendConfig::load(config_path)?;
    overrides.apply(&mut config)?;

    let text = read_text(document)?;
    let client = HttpCompletionClient::with_config(config.completion.clone())
        .context("Failed to create completion client")?;
    info!(endpoint = %client.endpoint(), "Using completion service");
    let pipeline = CorrectionPipeline::new(client, config.pipeline.clone())?;

    let controller = Arc::new(RunController::new());
    let cancel = controller.begin();
    let interrupt = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Received Ctrl+C, cancelling run");
                    controller.cancel_current();
                }
                Err(err) => error!("Failed to listen for Ctrl+C: {}", err),
            }
        })
    };

    let progress = |p: PoolProgress| info!(completed = p.completed, total = p.total, "Chunk finished");
    let result = pipeline.run(&text, &cancel, Some(&progress)).await;
    interrupt.abort();

    let report = result.context("Correction run failed")?;
    let summary = report.summary();
    if report.is_partial() {
        warn!(%summary, "Run finished with failed chunks");
    }
    write_output(output.as_deref(), &to_json(&report)?)?;
    info!(%summary, "Run complete");
    Ok(())
}

/// Either a bare corrections array or a report from `emend run`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CorrectionsFile {
    Bare(Vec<Correction>),
    Report { corrections: Vec<Correction> },
}

impl CorrectionsFile {
    fn into_corrections(self) -> Vec<Correction> {
        match self {
            Self::Bare(corrections) | Self::Report { corrections } => corrections,
        }
    }
}

/// Accept every correction and write the corrected document.
fn cmd_apply(
    document: &Path,
    corrections: &Path,
    output: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = EmendConfig::load(config_path)?;
    let text = read_text(document)?;
    let file: CorrectionsFile = serde_json::from_str(&read_text(corrections)?)
        .with_context(|| format!("Failed to parse corrections from {}", corrections.display()))?;

    let mut session = ReviewSession::new(text, config.review)?;
    let loaded = session.load(CorrectionSet::from_filtered(file.into_corrections()))?;
    let applied = session.accept_all()?;

    write_output(output, session.document())?;
    info!(loaded, applied, stats = %session.document_stats(), "Applied corrections");
    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(format!("{}\n", serde_json::to_string_pretty(value)?))
}

/// Write `content` to `path`, or to stdout when no path is given.
fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{content}");
            Ok(())
        }
    }
}
