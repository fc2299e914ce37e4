//! Core library for batch email signature generation.
//!
//! Records come from a delimited text file, a JSON document describes where
//! and how each field is drawn, and every record is rendered onto its own copy
//! of a shared template image.

mod batch;
mod config;
mod encoding;
mod format;
mod image;
mod records;
mod render;

pub use batch::{BatchFailure, BatchReport, run_batch};
pub use config::{
    Alignment, ColorError, ConfigLoadError, DEFAULT_LINE_SPACING, FieldConfigSet, FieldRule,
    RESERVED_KEYS, Rgb, load_field_config,
};
pub use crate::image::{OutputError, OutputFormat, TextStyle, draw_text_block, save_signature};
pub use encoding::{SAMPLE_LEN, detect_encoding, detect_encoding_bytes};
pub use format::{FormatError, expand_pattern, format_field_text, wrap_text};
pub use records::{Record, TabularErrorKind, TabularLoadError, load_records, parse_records};
pub use render::{
    DEFAULT_FILENAME_PATTERN, DEFAULT_METHOD, DEFAULT_QUALITY, FieldText, OutputOptions,
    RenderError, SignatureRenderer, filename_tokens, output_filename, plan_fields,
};
