//! Command-line interface wiring for the `sigbatch` binary.
//!
//! Loading the records, the field config, the template and the output
//! directory is fatal on failure. Rendering failures are per record and end up
//! in the returned [`BatchReport`].

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sigbatch::{
    BatchReport, DEFAULT_FILENAME_PATTERN, DEFAULT_METHOD, DEFAULT_QUALITY, OutputOptions,
    SignatureRenderer, load_field_config, load_records, run_batch,
};

pub mod utils;

use crate::cli::utils::{describe_error, open_template, prepare_output_dir};

/// Parsed CLI entrypoint for the `sigbatch` binary.
#[derive(Parser, Debug)]
#[command(
    name = "sigbatch",
    version,
    about = "Generate email signature images from a template, a CSV of people and a field layout"
)]
pub struct Cli {
    /// Background template image (PNG, JPEG or WebP).
    #[arg(long, value_name = "FILE")]
    pub template: PathBuf,

    /// Directory the signatures are written to (created if missing).
    #[arg(long = "output-dir", alias = "saida", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Delimited text file with one person per row.
    #[arg(long, alias = "dados", value_name = "CSV")]
    pub data: PathBuf,

    /// JSON document describing how each field is drawn.
    #[arg(long, value_name = "JSON")]
    pub config: PathBuf,

    /// Lossy output quality.
    #[arg(
        long,
        alias = "qualidade",
        default_value_t = DEFAULT_QUALITY,
        value_parser = clap::value_parser!(u8).range(0..=100)
    )]
    pub quality: u8,

    /// Compression effort, 0 (fastest) to 6 (smallest file).
    #[arg(
        long,
        alias = "metodo",
        default_value_t = DEFAULT_METHOD,
        value_parser = clap::value_parser!(u8).range(0..=6)
    )]
    pub method: u8,

    /// Output file name. Placeholders: {name}, {role}, {email}, {phone}.
    #[arg(
        long = "filename-pattern",
        alias = "nome-arquivo",
        value_name = "PATTERN",
        default_value = DEFAULT_FILENAME_PATTERN
    )]
    pub filename_pattern: String,

    /// Log per-field detail.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Load every input, then render the whole batch.
pub fn run(cli: Cli) -> Result<BatchReport> {
    let records = load_records(&cli.data)
        .with_context(|| format!("failed to load records from {}", cli.data.display()))?;
    let config = load_field_config(&cli.config)
        .with_context(|| format!("failed to load field config {}", cli.config.display()))?;
    prepare_output_dir(&cli.output_dir)?;
    let template = open_template(&cli.template)?;

    let options = OutputOptions {
        output_dir: cli.output_dir,
        quality: cli.quality,
        method: cli.method,
        filename_pattern: cli.filename_pattern,
    };
    let mut renderer =
        SignatureRenderer::new(template, options).context("invalid output options")?;

    let report = run_batch(&mut renderer, &records, &config);
    for path in &report.written {
        println!("Signature generated: {}", path.display());
    }
    for failure in &report.failures {
        println!(
            "Error processing {}: {}",
            failure.record,
            describe_error(&failure.error)
        );
    }
    Ok(report)
}
