//! Convenience helpers for the command handler.

use std::error::Error;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::DynamicImage;
use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber. `RUST_LOG` overrides the default level.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "sigbatch=debug" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Create the output directory, attaching path context to any error.
pub fn prepare_output_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create output directory {}", path.display()))
}

/// Open the background template once for the whole run.
pub fn open_template(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("failed to open template {}", path.display()))
}

/// Render an error and its sources as one `a: b: c` line.
pub fn describe_error(err: &(dyn Error + 'static)) -> String {
    std::iter::successors(Some(err), |&err| err.source())
        .map(|err| err.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}
