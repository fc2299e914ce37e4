//! Batch driving: render every record and tally the outcome.

use std::path::PathBuf;

use crate::config::FieldConfigSet;
use crate::records::Record;
use crate::render::{RenderError, SignatureRenderer};

/// A record that could not be rendered.
#[derive(Debug)]
pub struct BatchFailure {
    /// Display identity of the record.
    pub record: String,
    pub error: RenderError,
}

/// Outcome of a batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.written.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable totals for the end of a run.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        if self.succeeded() > 0 {
            lines.push(format!(
                "{} signature(s) generated successfully",
                self.succeeded()
            ));
        }
        if self.failed() > 0 {
            lines.push(format!(
                "{} record(s) not processed due to errors",
                self.failed()
            ));
        }
        if lines.is_empty() {
            return "no records to process".to_string();
        }
        lines.join("\n")
    }
}

/// Render each record once, logging and collecting every outcome.
///
/// Records are independent: a failure is recorded and the batch moves on.
/// Records that expand to the same file name overwrite each other, so the
/// last one wins on disk while both count as written.
#[tracing::instrument(skip_all, fields(records = records.len()))]
pub fn run_batch(
    renderer: &mut SignatureRenderer,
    records: &[Record],
    config: &FieldConfigSet,
) -> BatchReport {
    let mut report = BatchReport::default();
    for record in records {
        match renderer.render(record, config) {
            Ok(path) => {
                tracing::info!(record = record.display_name(), path = %path.display(), "signature generated");
                report.written.push(path);
            }
            Err(error) => {
                tracing::warn!(record = record.display_name(), error = %error, "record failed");
                report.failures.push(BatchFailure {
                    record: record.display_name().to_string(),
                    error,
                });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldRule, Rgb};
    use crate::render::OutputOptions;
    use image::{DynamicImage, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    fn renderer(dir: &tempfile::TempDir) -> SignatureRenderer {
        let template = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            64,
            24,
            Rgba([250, 250, 250, 255]),
        ));
        SignatureRenderer::new(template, OutputOptions::new(dir.path())).unwrap()
    }

    #[test]
    fn failures_are_counted_and_the_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FieldConfigSet::new();
        config.insert(
            "role",
            FieldRule::new(dir.path().join("unused.ttf"), 12, (0, 0), Rgb(0, 0, 0)),
        );
        let records = [
            Record::from_pairs([("name", "Ana Silva"), ("email", "a@b.com")]),
            Record::from_pairs([("name", "Bruno"), ("email", "b@c.com")]),
        ];

        let report = run_batch(&mut renderer(&dir), &records, &config);
        assert_eq!(report.succeeded(), 0);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.failures[0].record, "Ana Silva");
        assert_eq!(report.failures[1].record, "Bruno");
        assert!(matches!(
            report.failures[0].error,
            RenderError::MissingField { .. }
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn mixed_batch_reports_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let records = [
            Record::from_pairs([("name", "Ana Silva")]),
            Record::from_pairs([("name", " ")]),
            Record::from_pairs([("name", "Carla")]),
        ];

        let report = run_batch(&mut renderer(&dir), &records, &FieldConfigSet::new());
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].record, "unnamed");
        assert!(matches!(report.failures[0].error, RenderError::EmptyName));
        assert_eq!(
            report.summary(),
            "2 signature(s) generated successfully\n1 record(s) not processed due to errors"
        );
        assert!(dir.path().join("Carla_signature.webp").is_file());
    }

    #[test]
    fn colliding_names_overwrite_the_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let records = [
            Record::from_pairs([("name", "Ana"), ("email", "ana@one.com")]),
            Record::from_pairs([("name", "Ana"), ("email", "ana@two.com")]),
        ];

        let report = run_batch(&mut renderer(&dir), &records, &FieldConfigSet::new());
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.written[0], report.written[1]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn empty_batch_has_a_summary() {
        let report = BatchReport::default();
        assert!(report.is_clean());
        assert_eq!(report.summary(), "no records to process");
    }
}
