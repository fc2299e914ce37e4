//! Raster helpers: drawing field text and writing finished signatures.

mod output;
mod paint;

pub use output::{OutputError, OutputFormat, save_signature};
pub use paint::{TextStyle, draw_text_block};
