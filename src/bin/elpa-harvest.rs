//! elpa-harvest - extract package metadata from `.el` files and tar archives
//!
//! Usage: elpa-harvest [--config FILE] [--index] [-v] FILE...
//!
//! Prints one JSON record per input. With `--index`, also prints the
//! `archive-contents` rendering of everything that was extracted.

use clap::Parser;
use elpa_harvester::harvest::codec::decode_details;
use elpa_harvester::harvest::pipeline::UploadPipeline;
use elpa_harvester::index::PackageIndex;
use elpa_harvester::{HarvestConfig, MemoryStore, PackageDetails};
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Extract Emacs Lisp package metadata from `.el` files and tar archives
#[derive(Parser, Debug)]
#[command(name = "elpa-harvest")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON harvest configuration
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the archive-contents index after the records
    #[arg(long)]
    index: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Package files to harvest
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,
}

#[derive(Serialize)]
struct Record<'a> {
    file: String,
    name: &'a str,
    version: &'a str,
    description: &'a str,
    author: &'a str,
    kind: &'a str,
    details: PackageDetails,
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    }
}

/// Returns `Ok(false)` when at least one file could not be read or extracted.
async fn run() -> Result<bool, Box<dyn Error>> {
    let args = Cli::parse();

    let filter = if args.verbose {
        EnvFilter::new("elpa_harvester=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("elpa_harvester=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match &args.config {
        Some(path) => HarvestConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => HarvestConfig::default(),
    };

    let store = Arc::new(MemoryStore::new());
    let pipeline = UploadPipeline::new(Arc::clone(&store), config);
    let all_ok = harvest_files(&pipeline, &args.files).await?;

    if args.index {
        print!("{}", PackageIndex::new(store).archive_contents().await?);
    }

    Ok(all_ok)
}

/// Harvests each file in turn. Returns `Ok(false)` if any of them failed.
async fn harvest_files(
    pipeline: &UploadPipeline<MemoryStore>,
    files: &[PathBuf],
) -> Result<bool, Box<dyn Error>> {
    let mut all_ok = true;

    for path in files {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) => {
                error!(file = %path.display(), error = %e, "Cannot read upload");
                eprintln!("{}: {}", path.display(), e);
                all_ok = false;
                continue;
            }
        };

        match pipeline.execute(&file_name, content).await {
            Ok(result) => {
                let pkg = &result.descriptor;
                let record = Record {
                    file: path.display().to_string(),
                    name: &pkg.name,
                    version: &pkg.latest_version,
                    description: &pkg.description,
                    author: &pkg.author,
                    kind: pkg.kind.as_str(),
                    details: decode_details(&pkg.details)?,
                };
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "Upload rejected");
                eprintln!("{}: {}", path.display(), e);
                all_ok = false;
            }
        }
    }

    Ok(all_ok)
}
