// src/cli.rs
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use cloudseq::config::StorageConfig;
use cloudseq::PreprocessorKind;

#[derive(Parser)]
#[command(name = "cloudseq", author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(help_template = "\
{before-help}{name} v{version}
{author-with-newline}{about-with-newline}
{usage-heading}
{usage}

{all-args}{after-help}
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set the number of threads for the map phase.
    ///
    /// - 0: Auto-detect (Use all available cores).
    /// - 1: Sequential (Single-threaded, good for debugging).
    /// - >1: Force specific thread count.
    #[arg(short = 'j', long, global = true, default_value_t = 0, value_name = "THREADS")]
    pub jobs: usize,

    #[command(flatten)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IndexFormat {
    /// One line per sequence: id, span, header offset, base offset, base length
    Tsv,
    /// Pretty-printed JSON array of entries
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the sequence index of a local FASTA file.
    #[command(visible_alias = "idx")]
    Index {
        /// Input FASTA file
        #[arg(value_name = "FASTA_FILE")]
        input: PathBuf,

        /// Bytes per partition
        #[arg(short = 'c', long, conflicts_with = "workers", value_name = "BYTES")]
        chunk_size: Option<u64>,

        /// Number of partitions (defaults to the thread count)
        #[arg(short = 'w', long, value_name = "N")]
        workers: Option<usize>,

        /// Write the index here instead of stdout
        #[arg(short, long, value_name = "OUT_FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = IndexFormat::Tsv)]
        format: IndexFormat,
    },

    /// Upload a local file as a new cloud object (never overwrites).
    #[command(visible_alias = "put")]
    Upload {
        /// Local file to upload
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Destination, e.g. s3://bucket/key
        #[arg(value_name = "S3_PATH")]
        path: String,
    },

    /// Preprocess a cloud object and stage the result as its meta object.
    #[command(visible_alias = "prep")]
    Preprocess {
        /// Object to preprocess, e.g. s3://bucket/genome.fa
        #[arg(value_name = "S3_PATH")]
        path: String,

        /// Preprocessor to run ('fasta' or 'fasta-batch')
        #[arg(short = 'p', long, default_value = "fasta", value_parser = parse_kind, value_name = "NAME")]
        kind: PreprocessorKind,

        /// Bytes per partition
        #[arg(short = 'c', long, conflicts_with = "workers", value_name = "BYTES")]
        chunk_size: Option<u64>,

        /// Number of partitions
        #[arg(short = 'w', long, value_name = "N")]
        workers: Option<usize>,

        /// Range requests kept in flight while fetching partitions
        #[arg(long, default_value_t = cloudseq::cloud_object::DEFAULT_FETCH_CONCURRENCY, value_name = "N")]
        fetch_concurrency: usize,
    },

    /// Show whether an object exists and whether it has been preprocessed.
    #[command(visible_alias = "stat")]
    Status {
        #[arg(value_name = "S3_PATH")]
        path: String,
    },

    /// Print the staged index of a preprocessed object.
    #[command(visible_alias = "ls")]
    ShowIndex {
        #[arg(value_name = "S3_PATH")]
        path: String,
    },

    /// Fetch one sequence by id using the staged index.
    #[command(visible_alias = "cat")]
    Get {
        #[arg(value_name = "S3_PATH")]
        path: String,

        /// Sequence id (header text up to the first space)
        #[arg(value_name = "SEQ_ID")]
        id: String,

        /// Line width of the printed FASTA record (0: single line)
        #[arg(long, default_value_t = 60, value_name = "COLS")]
        width: usize,
    },
}

fn parse_kind(s: &str) -> Result<PreprocessorKind, String> {
    s.parse().map_err(|e: cloudseq::Error| e.to_string())
}
