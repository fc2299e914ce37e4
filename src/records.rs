//! Tolerant loading of delimited person records.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;

use crate::encoding::detect_encoding;

/// Columns consulted, in order, for a record's display name.
const NAME_FIELDS: [&str; 2] = ["name", "nome"];
const UNNAMED: &str = "unnamed";

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
const SNIFF_LINES: usize = 10;

/// One input row keyed by header column name. Values are already trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: IndexMap<String, String>,
}

impl Record {
    /// Build a record from `(column, value)` pairs, keeping their order.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of column `field`, possibly empty.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Whether the header had a `field` column.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Column names in header order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Value of the first name column present, blank or not.
    pub fn name(&self) -> Option<&str> {
        NAME_FIELDS.iter().find_map(|field| self.get(field))
    }

    /// Identity used in log lines and error messages.
    pub fn display_name(&self) -> &str {
        match self.name() {
            Some(name) if !name.trim().is_empty() => name,
            _ => UNNAMED,
        }
    }
}

/// Fatal failure while loading the record file. Nothing is returned on error.
#[derive(Debug, Error)]
#[error("failed to read tabular file {} ({encoding})", .path.display())]
pub struct TabularLoadError {
    pub path: PathBuf,
    /// Name of the encoding the file was decoded with.
    pub encoding: &'static str,
    #[source]
    pub kind: TabularErrorKind,
}

#[derive(Debug, Error)]
pub enum TabularErrorKind {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("contents are not valid {0}")]
    Decode(&'static str),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("file has no header row")]
    MissingHeader,
    #[error("column '{0}' appears more than once in the header")]
    DuplicateColumn(String),
    #[error(
        "row {row} does not match the header structure (expected columns: {})",
        .expected.join(", ")
    )]
    Structure { row: usize, expected: Vec<String> },
}

/// Load every non-blank row of the delimited file at `path`.
///
/// The encoding is sniffed from the leading bytes and the delimiter from the
/// file's own structure. Rows come back in file order with trimmed values.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_records(path: &Path) -> Result<Vec<Record>, TabularLoadError> {
    let encoding = detect_encoding(path);
    let fail = |kind: TabularErrorKind| TabularLoadError {
        path: path.to_path_buf(),
        encoding: encoding.name(),
        kind,
    };

    let bytes = fs::read(path).map_err(|err| fail(err.into()))?;
    let (text, had_errors) = encoding.decode_with_bom_removal(&bytes);
    if had_errors {
        return Err(fail(TabularErrorKind::Decode(encoding.name())));
    }
    let records = parse_records(&text).map_err(fail)?;
    tracing::info!(
        count = records.len(),
        encoding = encoding.name(),
        "loaded records"
    );
    Ok(records)
}

/// Parse already-decoded delimited text with a header row.
pub fn parse_records(text: &str) -> Result<Vec<Record>, TabularErrorKind> {
    let delimiter = sniff_delimiter(text);
    tracing::debug!(delimiter = %char::from(delimiter).escape_default(), "sniffed delimiter");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let header: Vec<String> = reader
        .headers()?
        .iter()
        .map(|column| column.trim().to_string())
        .collect();
    if header.is_empty() {
        return Err(TabularErrorKind::MissingHeader);
    }
    let mut seen = HashSet::new();
    for column in &header {
        if !seen.insert(column.as_str()) {
            return Err(TabularErrorKind::DuplicateColumn(column.clone()));
        }
    }

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row_number = idx + 1;
        let row = row?;
        if row.len() != header.len() {
            return Err(TabularErrorKind::Structure {
                row: row_number,
                expected: header.clone(),
            });
        }
        if row.iter().all(|value| value.trim().is_empty()) {
            tracing::debug!(row = row_number, "skipping blank row");
            continue;
        }
        records.push(Record::from_pairs(
            header
                .iter()
                .cloned()
                .zip(row.iter().map(|value| value.trim().to_string())),
        ));
    }
    Ok(records)
}

/// Pick the candidate delimiter that splits the leading lines most consistently.
///
/// A candidate seen the same number of times on every sampled line beats an
/// inconsistent one, then higher counts win, then candidate order.
fn sniff_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    let Some(header) = lines.first() else {
        return b',';
    };

    let mut best: Option<(bool, usize, u8)> = None;
    for &candidate in &DELIMITER_CANDIDATES {
        let header_count = count_unquoted(header, candidate);
        if header_count == 0 {
            continue;
        }
        let consistent = lines
            .iter()
            .all(|line| count_unquoted(line, candidate) == header_count);
        if best.is_none_or(|(c, n, _)| (consistent, header_count) > (c, n)) {
            best = Some((consistent, header_count, candidate));
        }
    }
    best.map(|(_, _, delimiter)| delimiter).unwrap_or(b',')
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut quoted = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            quoted = !quoted;
        } else if byte == delimiter && !quoted {
            count += 1;
        }
    }
    count
}
