//! Ingest command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio_util::sync::CancellationToken;

use crate::cli::output::get_formatter;
use crate::models::{Config, FileOutcome, OutputFormat};
use crate::services::{
    ChunkSplitter, IngestEvent, IngestionPipeline, OpenAiEmbedder, PdfTextExtractor,
    connect_vector_store, timestamped_collection_name,
};
use crate::utils::{RetryPolicy, list_pdf_files};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Folder containing the PDF manuals
    #[arg(required = true)]
    pub folder: PathBuf,

    /// Collection name (default: <collection_base>_<unix timestamp>)
    #[arg(long, short = 'c')]
    pub collection: Option<String>,

    /// Maximum characters per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Characters shared between consecutive chunks
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// Chunks per embedding/upsert batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Attempts per batch step before giving up on rate limits
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// List the PDFs that would be ingested without calling any service
    #[arg(long)]
    pub dry_run: bool,
}

impl IngestArgs {
    fn apply(&self, config: &mut Config) {
        let ing = &mut config.ingestion;
        if let Some(v) = self.chunk_size {
            ing.chunk_size = v;
        }
        if let Some(v) = self.chunk_overlap {
            ing.chunk_overlap = v;
        }
        if let Some(v) = self.batch_size {
            ing.batch_size = v;
        }
        if let Some(v) = self.max_attempts {
            ing.max_attempts = v;
        }
    }
}

pub async fn handle_ingest(
    args: IngestArgs,
    format: OutputFormat,
    verbose: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let mut config = Config::load()?;
    args.apply(&mut config);
    config.validate()?;
    let formatter = get_formatter(format);

    let files = list_pdf_files(&args.folder)
        .with_context(|| format!("cannot read folder {}", args.folder.display()))?;

    if args.dry_run {
        println!(
            "{}",
            formatter.format_message(&format!("Dry run: would ingest {} PDF files", files.len()))
        );
        for file in &files {
            println!("  {}", file.display());
        }
        return Ok(());
    }

    if files.is_empty() {
        println!("{}", formatter.format_message("No PDF files found to ingest."));
        return Ok(());
    }

    config.require_vector_store()?;
    config.require_openai_key()?;

    let store = connect_vector_store(&config.vector_store)
        .await
        .context("failed to connect to Qdrant")?;
    let embedder = Arc::new(OpenAiEmbedder::new(&config.openai)?);
    let splitter = ChunkSplitter::from_config(&config.ingestion)?;

    let collection = args
        .collection
        .clone()
        .unwrap_or_else(|| timestamped_collection_name(&config.vector_store.collection_base));

    let (tx, rx) = unbounded_channel();
    let pb = if format == OutputFormat::Text {
        ProgressBar::new(files.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(bar_style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(bar_style.progress_chars("#>-"));
    }
    let progress = tokio::spawn(render_progress(rx, pb, verbose));

    let pipeline = IngestionPipeline::new(store, embedder, Arc::new(PdfTextExtractor))
        .with_splitter(splitter)
        .with_retry_policy(RetryPolicy::from_config(&config.ingestion))
        .with_batch_size(config.ingestion.batch_size)
        .with_collection_schema(
            config.openai.embedding_dimension,
            config.vector_store.distance,
        )
        .with_cancellation(cancel)
        .with_progress(tx);

    let result = pipeline.ingest(&args.folder, &collection).await;
    // Dropping the pipeline closes the event channel and ends the renderer.
    drop(pipeline);
    let _ = progress.await;

    let report = result?;
    print!("{}", formatter.format_report(&report));

    if report.cancelled {
        anyhow::bail!("ingestion cancelled; collection {} is incomplete", collection);
    }
    if !report.is_success() {
        anyhow::bail!(
            "{} of {} files were not fully ingested",
            report.files_failed() + report.files_partial(),
            report.files_processed()
        );
    }
    Ok(())
}

async fn render_progress(mut rx: UnboundedReceiver<IngestEvent>, pb: ProgressBar, verbose: bool) {
    while let Some(event) = rx.recv().await {
        match event {
            IngestEvent::RunStarted { collection, .. } => {
                pb.println(format!("Ingesting into {}", style(collection).bold()));
            }
            IngestEvent::FileStarted { file_name, .. } => {
                pb.set_message(file_name);
            }
            IngestEvent::Chunked {
                file_name,
                chunks,
                batches,
            } if verbose => {
                pb.println(format!("  {file_name}: {chunks} chunks in {batches} batches"));
            }
            IngestEvent::Retrying {
                file_name,
                batch,
                attempt,
                delay,
                error,
            } => {
                pb.println(format!(
                    "  {} {file_name} batch {batch}: attempt {attempt} failed ({error}), retrying in {:.1}s",
                    style("!").yellow(),
                    delay.as_secs_f64()
                ));
            }
            IngestEvent::BatchFailed {
                file_name,
                batch,
                error,
            } => {
                pb.println(format!(
                    "  {} {file_name} batch {batch}: {error}",
                    style("✗").red()
                ));
            }
            IngestEvent::FileSkipped { file_name, reason } => {
                pb.println(format!("  {} {file_name}: {reason}", style("-").dim()));
            }
            IngestEvent::ExtractionFailed { file_name, error } => {
                pb.println(format!("  {} {file_name}: {error}", style("✗").red()));
            }
            IngestEvent::FileFinished { file_name, outcome } => {
                if verbose && outcome == FileOutcome::Succeeded {
                    pb.println(format!("  {} {file_name}", style("✓").green()));
                }
                pb.inc(1);
            }
            _ => {}
        }
    }
    pb.finish_and_clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: IngestArgs,
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = TestCli::parse_from([
            "test",
            "./manuals",
            "--chunk-size",
            "500",
            "--batch-size",
            "20",
        ]);
        let mut config = Config::default();
        cli.args.apply(&mut config);

        assert_eq!(cli.args.folder, PathBuf::from("./manuals"));
        assert_eq!(config.ingestion.chunk_size, 500);
        assert_eq!(config.ingestion.chunk_overlap, 200);
        assert_eq!(config.ingestion.batch_size, 20);
        assert!(cli.args.collection.is_none());
    }
}
