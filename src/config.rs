//! Field layout configuration: which record fields are drawn, where and how.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use crate::format::{FormatError, validate_template};

/// Line spacing in pixels used when a rule does not set one.
pub const DEFAULT_LINE_SPACING: i32 = 4;

/// Layout attribute names that never count as required record fields, even
/// when they appear as top-level keys of the document.
pub const RESERVED_KEYS: [&str; 8] = [
    "format_template",
    "max_wrap_width",
    "line_spacing",
    "alignment",
    "formatar",
    "largura_maxima",
    "espacamento_linhas",
    "alinhamento",
];

/// Opaque RGB text color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("expected 3 components, got {0}")]
    Arity(usize),
    #[error("component '{0}' is not an integer")]
    NotInteger(String),
    #[error("component {0} is outside 0-255")]
    OutOfRange(i64),
}

impl Rgb {
    pub fn from_components(components: &[i64]) -> Result<Self, ColorError> {
        let [r, g, b] = components else {
            return Err(ColorError::Arity(components.len()));
        };
        let channel = |value: i64| u8::try_from(value).map_err(|_| ColorError::OutOfRange(value));
        Ok(Self(channel(*r)?, channel(*g)?, channel(*b)?))
    }
}

/// Parses the `"r,g,b"` form used by hand-written documents.
impl FromStr for Rgb {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let components = s
            .split(',')
            .map(|part| {
                let part = part.trim();
                part.parse::<i64>()
                    .map_err(|_| ColorError::NotInteger(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_components(&components)
    }
}

/// Horizontal alignment of the lines of a multi-line field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// How one record field is drawn onto the template.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub font_path: PathBuf,
    /// Em size in pixels.
    pub font_size: u32,
    /// Top-left corner of the text block.
    pub position: (i32, i32),
    pub color: Rgb,
    /// Template with a `{text}` placeholder for the field value.
    pub format_template: Option<String>,
    /// Wrap width in characters.
    pub max_wrap_width: Option<usize>,
    pub line_spacing: i32,
    pub alignment: Alignment,
}

impl FieldRule {
    pub fn new(
        font_path: impl Into<PathBuf>,
        font_size: u32,
        position: (i32, i32),
        color: Rgb,
    ) -> Self {
        Self {
            font_path: font_path.into(),
            font_size,
            position,
            color,
            format_template: None,
            max_wrap_width: None,
            line_spacing: DEFAULT_LINE_SPACING,
            alignment: Alignment::Left,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFieldRule {
    #[serde(alias = "caminho_fonte")]
    font_path: PathBuf,
    #[serde(alias = "tamanho_fonte")]
    font_size: u32,
    #[serde(alias = "posicao")]
    position: (i32, i32),
    #[serde(alias = "cor")]
    color: RawColor,
    #[serde(default, alias = "formatar")]
    format_template: Option<String>,
    #[serde(default, alias = "largura_maxima")]
    max_wrap_width: Option<usize>,
    #[serde(default, alias = "espacamento_linhas")]
    line_spacing: Option<i32>,
    #[serde(default, alias = "alinhamento")]
    alignment: Option<Alignment>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawColor {
    Components(Vec<i64>),
    Text(String),
}

impl RawColor {
    fn normalize(&self) -> Result<Rgb, ColorError> {
        match self {
            RawColor::Components(components) => Rgb::from_components(components),
            RawColor::Text(text) => text.parse(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read field config {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("field config is not a valid layout document")]
    Json(#[from] serde_json::Error),
    #[error("field '{field}': invalid color")]
    Color {
        field: String,
        #[source]
        source: ColorError,
    },
    #[error("field '{field}': invalid format template")]
    Template {
        field: String,
        #[source]
        source: FormatError,
    },
    #[error("field '{field}': {reason}")]
    InvalidRule { field: String, reason: String },
    #[error("field '{field}': font file {} does not exist", .path.display())]
    MissingFont { field: String, path: PathBuf },
}

/// Ordered set of field rules, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldConfigSet {
    rules: IndexMap<String, FieldRule>,
}

impl FieldConfigSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a layout document. Font files are not touched.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigLoadError> {
        let raw: IndexMap<String, RawFieldRule> = serde_json::from_str(text)?;
        let mut rules = IndexMap::with_capacity(raw.len());
        for (field, raw) in raw {
            let rule = build_rule(&field, raw)?;
            rules.insert(field, rule);
        }
        Ok(Self { rules })
    }

    /// Add or replace the rule for `field`. A new field goes last.
    pub fn insert(&mut self, field: impl Into<String>, rule: FieldRule) {
        self.rules.insert(field.into(), rule);
    }

    /// Rule for `field`, if the layout draws it.
    pub fn get(&self, field: &str) -> Option<&FieldRule> {
        self.rules.get(field)
    }

    /// Rules in drawing order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRule)> {
        self.rules.iter().map(|(field, rule)| (field.as_str(), rule))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Field names every record must carry: all keys except [`RESERVED_KEYS`].
    pub fn required_fields(&self) -> BTreeSet<&str> {
        self.rules
            .keys()
            .map(String::as_str)
            .filter(|field| !RESERVED_KEYS.contains(field))
            .collect()
    }

    fn check_font_files(&self) -> Result<(), ConfigLoadError> {
        for (field, rule) in &self.rules {
            if !rule.font_path.is_file() {
                return Err(ConfigLoadError::MissingFont {
                    field: field.clone(),
                    path: rule.font_path.clone(),
                });
            }
        }
        Ok(())
    }
}

fn build_rule(field: &str, raw: RawFieldRule) -> Result<FieldRule, ConfigLoadError> {
    let invalid = |reason: &str| ConfigLoadError::InvalidRule {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let color = raw.color.normalize().map_err(|source| ConfigLoadError::Color {
        field: field.to_string(),
        source,
    })?;
    if raw.font_size == 0 {
        return Err(invalid("font_size must be greater than zero"));
    }
    if raw.max_wrap_width == Some(0) {
        return Err(invalid("max_wrap_width must be greater than zero"));
    }
    if raw.line_spacing.is_some_and(|spacing| spacing < 0) {
        return Err(invalid("line_spacing must not be negative"));
    }
    if let Some(template) = &raw.format_template {
        validate_template(template).map_err(|source| ConfigLoadError::Template {
            field: field.to_string(),
            source,
        })?;
    }

    Ok(FieldRule {
        font_path: raw.font_path,
        font_size: raw.font_size,
        position: raw.position,
        color,
        format_template: raw.format_template,
        max_wrap_width: raw.max_wrap_width,
        line_spacing: raw.line_spacing.unwrap_or(DEFAULT_LINE_SPACING),
        alignment: raw.alignment.unwrap_or_default(),
    })
}

/// Read the layout document at `path` and check every referenced font exists.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_field_config(path: &Path) -> Result<FieldConfigSet, ConfigLoadError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = FieldConfigSet::from_json_str(&text)?;
    config.check_font_files()?;
    tracing::info!(fields = config.len(), "loaded field config");
    Ok(config)
}
