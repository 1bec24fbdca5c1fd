// src/main.rs
// CLOUDSEQ: Cloud Object Preprocessing and Parallel FASTA Indexing
// Entry point for the Command Line Interface.
// Handles local indexing, uploads, and preprocessing of objects on S3-compatible stores.

mod cli;

use cloudseq::parallel::ParallelProcessor;
use cloudseq::s3::S3Store;
use cloudseq::storage::ObjectStore;
use cloudseq::{CloudObject, IndexEntry, PartitionSpec, Preprocessor};
use crate::cli::{Cli, Commands, IndexFormat};

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // CONCURRENCY CONFIGURATION
    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.jobs)
        .build_global()
        .map_err(|e| anyhow::anyhow!("Failed to configure thread pool: {}", e))?;

    let num_threads = rayon::current_num_threads();
    if num_threads == 1 {
        eprintln!("[i] Mode: SEQUENTIAL (Single-threaded)");
    } else {
        eprintln!("[i] Mode: PARALLEL ({} threads active)", num_threads);
    }

    match cli.command {
        // COMMAND: INDEX (Local file)
        Commands::Index { input, chunk_size, workers, output, format } => {
            let spec = partition_spec(chunk_size, workers);
            eprintln!("[*] Indexing {}...", input.display());

            let path = input.clone();
            let index = tokio::task::spawn_blocking(move || ParallelProcessor::index_file(&path, spec))
                .await?
                .with_context(|| format!("Failed to index {}", input.display()))?;

            let entries = index.into_entries();
            match &output {
                Some(out) => {
                    let file = File::create(out).with_context(|| format!("Failed to create output: {}", out.display()))?;
                    write_index(BufWriter::new(file), &entries, format)?;
                }
                None => write_index(BufWriter::new(io::stdout().lock()), &entries, format)?,
            }

            eprintln!("[✔] Indexed {} sequences.", entries.len());
        }

        // COMMAND: UPLOAD
        Commands::Upload { input, path } => {
            let store = connect(&cli.storage).await?;
            eprintln!("[*] Uploading {} to {}...", input.display(), path);

            let object = CloudObject::from_file(store, &input, &path)
                .await
                .with_context(|| format!("Failed to upload {}", input.display()))?;

            eprintln!("[✔] Uploaded to s3://{}/{}.", object.obj_bucket(), object.obj_key());
        }

        // COMMAND: PREPROCESS (Map/Reduce or Batch)
        Commands::Preprocess { path, kind, chunk_size, workers, fetch_concurrency } => {
            let store = connect(&cli.storage).await?;
            let preprocessor = kind.build();
            let spec = match preprocessor {
                Preprocessor::Batch(_) => PartitionSpec::default(),
                Preprocessor::MapReduce(_) => partition_spec(chunk_size, workers),
            };

            let mut object = CloudObject::new(store, &path)?.with_fetch_concurrency(fetch_concurrency);
            eprintln!("[*] Preprocessing {} with '{}'...", path, kind);
            eprintln!("[i] Staging to s3://{}/{}", object.meta_bucket(), object.meta_key());

            object
                .force_preprocess(&preprocessor, spec)
                .await
                .with_context(|| format!("Failed to preprocess {}", path))?;

            eprintln!("[✔] Preprocessing Finished.");
            println!("--------------------------------------------------");
            for (key, value) in object.attributes() {
                println!("    {:<16} {}", key, value);
            }
            println!("--------------------------------------------------");
        }

        // COMMAND: STATUS
        Commands::Status { path } => {
            let store = connect(&cli.storage).await?;
            let mut object = CloudObject::new(store, &path)?;
            let (obj, meta) = object.fetch().await?;
            let size = obj.map(|h| h.size);
            let staged = meta.is_some();

            println!("    Object:          s3://{}/{}", object.obj_bucket(), object.obj_key());
            match size {
                Some(size) => println!("    Size:            {} bytes", size),
                None => println!("    Size:            (missing)"),
            }
            println!("    Meta Object:     s3://{}/{}", object.meta_bucket(), object.meta_key());
            println!("    Preprocessed:    {}", if staged { "yes" } else { "no" });
            for (key, value) in object.attributes() {
                println!("    {:<16} {}", format!("{}:", key), value);
            }
        }

        // COMMAND: SHOW-INDEX
        Commands::ShowIndex { path } => {
            let store = connect(&cli.storage).await?;
            let object = CloudObject::new(store, &path)?;
            let entries = object
                .load_index()
                .await
                .with_context(|| format!("No staged index for {} (run 'preprocess' first)", path))?;
            write_index(BufWriter::new(io::stdout().lock()), &entries, IndexFormat::Tsv)?;
        }

        // COMMAND: GET (Single sequence)
        Commands::Get { path, id, width } => {
            let store = connect(&cli.storage).await?;
            let mut object = CloudObject::new(store, &path)?;
            let bases = object
                .get_sequence(&id)
                .await
                .with_context(|| format!("Failed to fetch '{}' from {}", id, path))?;

            let mut out = BufWriter::new(io::stdout().lock());
            writeln!(out, ">{}", id)?;
            write_wrapped(&mut out, &bases, width)?;
            out.flush()?;
        }
    }
    Ok(())
}

/// clap rejects both options together; with neither, one partition per thread.
fn partition_spec(chunk_size: Option<u64>, workers: Option<usize>) -> PartitionSpec {
    match (chunk_size, workers) {
        (Some(size), _) => PartitionSpec::by_chunk_size(size),
        (None, Some(n)) => PartitionSpec::by_workers(n),
        (None, None) => PartitionSpec::by_workers(rayon::current_num_threads()),
    }
}

async fn connect(config: &cloudseq::config::StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    let store = S3Store::connect(config).await.context("Failed to configure S3 client")?;
    Ok(Arc::new(store))
}

fn write_index<W: Write>(mut out: W, entries: &[IndexEntry], format: IndexFormat) -> Result<()> {
    match format {
        IndexFormat::Tsv => {
            for entry in entries {
                writeln!(out, "{}", entry)?;
            }
        }
        IndexFormat::Json => {
            serde_json::to_writer_pretty(&mut out, entries)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn write_wrapped<W: Write>(out: &mut W, bases: &[u8], width: usize) -> io::Result<()> {
    if width == 0 {
        out.write_all(bases)?;
        return out.write_all(b"\n");
    }
    for line in bases.chunks(width) {
        out.write_all(line)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}
