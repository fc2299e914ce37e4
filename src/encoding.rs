//! Encoding detection for record files.
//!
//! A byte-order mark decides outright. Otherwise a statistical detector looks
//! at a fixed-size sample from the start of the file.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

/// Number of leading bytes inspected when guessing the encoding of a file.
pub const SAMPLE_LEN: usize = 4096;

/// Guess the text encoding of the file at `path` from its first [`SAMPLE_LEN`] bytes.
///
/// Never fails. An unreadable file or an empty sample falls back to UTF-8; the
/// real I/O problem surfaces when the loader opens the file for parsing.
pub fn detect_encoding(path: &Path) -> &'static Encoding {
    let mut sample = Vec::with_capacity(SAMPLE_LEN);
    let read = File::open(path)
        .and_then(|file| file.take(SAMPLE_LEN as u64).read_to_end(&mut sample));
    if let Err(err) = read {
        tracing::debug!(
            path = %path.display(),
            error = %err,
            "encoding sample unreadable, falling back to UTF-8"
        );
        return UTF_8;
    }
    let whole_file = sample.len() < SAMPLE_LEN;
    guess(&sample, whole_file)
}

/// Same heuristic as [`detect_encoding`] over an in-memory buffer.
///
/// Only the first [`SAMPLE_LEN`] bytes are considered.
pub fn detect_encoding_bytes(bytes: &[u8]) -> &'static Encoding {
    let end = bytes.len().min(SAMPLE_LEN);
    guess(&bytes[..end], bytes.len() <= SAMPLE_LEN)
}

fn guess(sample: &[u8], last: bool) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return encoding;
    }
    // Pure ASCII carries no signal; every candidate decodes it identically.
    if sample.is_ascii() {
        tracing::debug!(len = sample.len(), "no encoding signal in sample, using UTF-8");
        return UTF_8;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(sample, last);
    detector.guess(None, true)
}
