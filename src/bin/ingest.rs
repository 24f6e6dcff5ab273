use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use fashion_sense::config::AppConfig;
use fashion_sense::indexer::{ingest, IngestOptions};
use fashion_sense::logger;
use fashion_sense::rag::embeddings::EmbeddingGenerator;

#[derive(Parser, Debug)]
#[command(name = "fashion-ingest")]
#[command(about = "Embed the fashion dataset and write the vector index snapshot")]
struct Args {
    /// CSV dataset to ingest
    #[arg(short, long, env = "FASHION_DATASET")]
    dataset: Option<PathBuf>,

    /// Column whose value is recorded as each row's source
    #[arg(long)]
    source_column: Option<String>,

    /// Directory the snapshot is written to
    #[arg(long)]
    index_dir: Option<PathBuf>,

    /// Rows embedded per model call
    #[arg(long)]
    batch_size: Option<usize>,

    /// Settings file (defaults to $FASHION_CONFIG or fashion-sense.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let cfg = AppConfig::load(args.config.as_deref())?;
    logger::init(&cfg.logging.level)?;

    let options = IngestOptions {
        dataset_path: args.dataset.unwrap_or_else(|| cfg.dataset.path.clone()),
        source_column: args
            .source_column
            .unwrap_or_else(|| cfg.dataset.source_column.clone()),
        index_dir: args.index_dir.unwrap_or_else(|| cfg.index.dir.clone()),
        batch_size: args.batch_size.unwrap_or(cfg.embedding.batch_size),
    };

    if !options.dataset_path.exists() {
        anyhow::bail!("Dataset does not exist: {}", options.dataset_path.display());
    }

    println!("Initializing embedding model {}...", cfg.embedding.model);
    let embedder = EmbeddingGenerator::new(&cfg.embedding)?;

    println!("Ingesting {}", options.dataset_path.display());
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows {msg}")?
            .progress_chars("#>-"),
    );

    let report = match ingest(&options, &embedder, &pb) {
        Ok(report) => report,
        Err(e) => {
            pb.abandon_with_message("failed");
            return Err(e.into());
        }
    };
    pb.finish_with_message("done");

    println!("\nIngestion complete!");
    println!("  Rows indexed:    {}", report.records);
    println!("  Dimensions:      {}", report.dimension);
    println!("  Dataset sha256:  {}", report.dataset_sha256);
    println!("  Snapshot:        {}", report.snapshot_path.display());

    Ok(())
}
