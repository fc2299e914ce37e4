//! Per-record signature rendering.
//!
//! A [`SignatureRenderer`] owns the template and the output options for a run.
//! Each call to [`SignatureRenderer::render`] validates one record against the
//! field configuration, draws its fields onto a private copy of the template
//! and writes the result. Errors are returned to the caller; nothing is
//! swallowed here.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;
use image::DynamicImage;
use thiserror::Error;

use crate::config::{FieldConfigSet, FieldRule};
use crate::format::{FormatError, expand_pattern, format_field_text};
use crate::image::{OutputError, OutputFormat, TextStyle, draw_text_block, save_signature};
use crate::records::Record;

pub const DEFAULT_QUALITY: u8 = 75;
pub const DEFAULT_METHOD: u8 = 6;
pub const DEFAULT_FILENAME_PATTERN: &str = "{name}_signature.webp";

const MAX_QUALITY: u8 = 100;
const MAX_METHOD: u8 = 6;

/// Where and how finished signatures are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOptions {
    pub output_dir: PathBuf,
    /// Lossy quality, 0-100.
    pub quality: u8,
    /// Compression effort, 0 (fast) to 6 (smallest).
    pub method: u8,
    /// File name pattern; see [`filename_tokens`] for the placeholders.
    pub filename_pattern: String,
}

impl OutputOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            quality: DEFAULT_QUALITY,
            method: DEFAULT_METHOD,
            filename_pattern: DEFAULT_FILENAME_PATTERN.to_string(),
        }
    }

    /// Check the options and resolve the output format from the pattern.
    ///
    /// The format comes from the pattern as written, so record values that
    /// contain dots never change it.
    fn validate(&self) -> Result<OutputFormat, RenderError> {
        if self.quality > MAX_QUALITY {
            return Err(RenderError::InvalidOptions(format!(
                "quality {} is outside 0-{MAX_QUALITY}",
                self.quality
            )));
        }
        if self.method > MAX_METHOD {
            return Err(RenderError::InvalidOptions(format!(
                "method {} is outside 0-{MAX_METHOD}",
                self.method
            )));
        }
        let sample = expand_filename(&Record::default(), &self.filename_pattern)?;
        Ok(OutputFormat::from_path(Path::new(&sample))?)
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(
        "record '{record}' is missing fields: {} (required: {})",
        .missing.join(", "),
        .required.join(", ")
    )]
    MissingField {
        record: String,
        missing: Vec<String>,
        required: Vec<String>,
    },
    #[error("name field is empty")]
    EmptyName,
    #[error("failed to load font {} at size {size}: {reason}", .path.display())]
    FontLoad {
        path: PathBuf,
        size: u32,
        reason: String,
    },
    #[error("field '{field}' could not be formatted")]
    Format {
        field: String,
        #[source]
        source: FormatError,
    },
    #[error("invalid filename pattern '{pattern}'")]
    Pattern {
        pattern: String,
        #[source]
        source: FormatError,
    },
    #[error("'{0}' is not a plain file name")]
    InvalidFilename(String),
    #[error("invalid output options: {0}")]
    InvalidOptions(String),
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// A field value after formatting, paired with the rule that places it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldText<'c> {
    pub field: &'c str,
    pub rule: &'c FieldRule,
    pub text: String,
}

/// Validate `record` against `config` and format every field it will draw.
///
/// Fields come back in config order. Config fields the record does not carry
/// are skipped.
pub fn plan_fields<'c>(
    record: &Record,
    config: &'c FieldConfigSet,
) -> Result<Vec<FieldText<'c>>, RenderError> {
    let required = config.required_fields();
    let missing: Vec<String> = required
        .iter()
        .filter(|field| !record.contains(field))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(RenderError::MissingField {
            record: record.display_name().to_string(),
            missing,
            required: required.iter().map(|field| field.to_string()).collect(),
        });
    }
    if record.name().is_some_and(|name| name.trim().is_empty()) {
        return Err(RenderError::EmptyName);
    }

    let mut planned = Vec::with_capacity(config.len());
    for (field, rule) in config.iter() {
        let Some(raw) = record.get(field) else {
            continue;
        };
        let text = format_field_text(raw, rule.format_template.as_deref(), rule.max_wrap_width)
            .map_err(|source| RenderError::Format {
                field: field.to_string(),
                source,
            })?;
        planned.push(FieldText { field, rule, text });
    }
    Ok(planned)
}

/// Placeholder values a filename pattern can use for `record`.
///
/// `{name}` is the display name with spaces as underscores, `{role}` the role
/// with spaces as underscores, `{email}` the address with `@` spelled `_at_`
/// and `{phone}` the number without parentheses, spaces or hyphens. The
/// legacy names `{nome}`, `{cargo}` and `{telefone}` are accepted as well.
pub fn filename_tokens(record: &Record) -> Vec<(&'static str, String)> {
    let lookup = |primary: &str, legacy: &str| {
        record
            .get(primary)
            .or_else(|| record.get(legacy))
            .unwrap_or_default()
    };
    let name = record.display_name().replace(' ', "_");
    let role = lookup("role", "cargo").replace(' ', "_");
    let email = record.get("email").unwrap_or_default().replace('@', "_at_");
    let phone: String = lookup("phone", "telefone")
        .chars()
        .filter(|&ch| !matches!(ch, '(' | ')' | ' ' | '-'))
        .collect();

    vec![
        ("name", name.clone()),
        ("nome", name),
        ("role", role.clone()),
        ("cargo", role),
        ("email", email),
        ("phone", phone.clone()),
        ("telefone", phone),
    ]
}

/// Expand `pattern` for `record` into a bare file name.
pub fn output_filename(record: &Record, pattern: &str) -> Result<String, RenderError> {
    let filename = expand_filename(record, pattern)?;
    if filename.trim().is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\'])
    {
        return Err(RenderError::InvalidFilename(filename));
    }
    Ok(filename)
}

fn expand_filename(record: &Record, pattern: &str) -> Result<String, RenderError> {
    let tokens = filename_tokens(record);
    let tokens: Vec<(&str, &str)> = tokens
        .iter()
        .map(|(name, value)| (*name, value.as_str()))
        .collect();
    expand_pattern(pattern, &tokens).map_err(|source| RenderError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Renders records onto copies of one shared template.
pub struct SignatureRenderer {
    template: DynamicImage,
    options: OutputOptions,
    format: OutputFormat,
    fonts: HashMap<PathBuf, FontArc>,
}

impl SignatureRenderer {
    pub fn new(template: DynamicImage, options: OutputOptions) -> Result<Self, RenderError> {
        let format = options.validate()?;
        Ok(Self {
            template,
            options,
            format,
            fonts: HashMap::new(),
        })
    }

    pub fn template(&self) -> &DynamicImage {
        &self.template
    }

    pub fn options(&self) -> &OutputOptions {
        &self.options
    }

    /// Encoding used for every file this renderer writes.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render one record and return the path written.
    #[tracing::instrument(skip_all, fields(record = record.display_name()))]
    pub fn render(
        &mut self,
        record: &Record,
        config: &FieldConfigSet,
    ) -> Result<PathBuf, RenderError> {
        let planned = plan_fields(record, config)?;
        let filename = output_filename(record, &self.options.filename_pattern)?;

        let mut canvas = self.template.to_rgba8();
        for FieldText { field, rule, text } in &planned {
            let font = self.font(&rule.font_path, rule.font_size)?;
            let style = TextStyle {
                font: &font,
                size: rule.font_size,
                color: rule.color,
                line_spacing: rule.line_spacing,
                alignment: rule.alignment,
            };
            draw_text_block(&mut canvas, rule.position, text, &style);
            tracing::trace!(field = *field, lines = text.lines().count(), "field drawn");
        }

        let path = self.options.output_dir.join(filename);
        save_signature(
            &canvas,
            &path,
            self.format,
            self.options.quality,
            self.options.method,
        )?;
        tracing::debug!(path = %path.display(), "signature written");
        Ok(path)
    }

    /// Render several records against the same template.
    ///
    /// Each record gets its own result; a failure never stops later records.
    pub fn render_all(
        &mut self,
        records: &[Record],
        config: &FieldConfigSet,
    ) -> Vec<Result<PathBuf, RenderError>> {
        records
            .iter()
            .map(|record| self.render(record, config))
            .collect()
    }

    fn font(&mut self, path: &Path, size: u32) -> Result<FontArc, RenderError> {
        if let Some(font) = self.fonts.get(path) {
            return Ok(font.clone());
        }
        let fail = |reason: String| RenderError::FontLoad {
            path: path.to_path_buf(),
            size,
            reason,
        };
        let bytes = fs::read(path).map_err(|err| fail(err.to_string()))?;
        let font = FontArc::try_from_vec(bytes).map_err(|err| fail(err.to_string()))?;
        self.fonts.insert(path.to_path_buf(), font.clone());
        Ok(font)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rgb;
    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    const SYSTEM_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

    fn template() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(160, 60, Rgba([255, 255, 255, 255])))
    }

    fn ana() -> Record {
        Record::from_pairs([
            ("name", "Ana Silva"),
            ("role", "Engineer"),
            ("email", "a@b.com"),
        ])
    }

    fn layout(font: &Path) -> FieldConfigSet {
        let mut config = FieldConfigSet::new();
        config.insert("name", FieldRule::new(font, 14, (10, 10), Rgb(0, 0, 0)));
        let mut role = FieldRule::new(font, 10, (10, 32), Rgb(60, 60, 60));
        role.format_template = Some("Role: {text}".into());
        config.insert("role", role);
        config
    }

    #[test]
    fn plans_fields_in_config_order_with_formatting() {
        let config = layout(Path::new("font.ttf"));
        let planned = plan_fields(&ana(), &config).unwrap();
        let texts: Vec<_> = planned
            .iter()
            .map(|item| (item.field, item.text.as_str(), item.rule.position))
            .collect();
        assert_eq!(
            texts,
            vec![
                ("name", "Ana Silva", (10, 10)),
                ("role", "Role: Engineer", (10, 32)),
            ]
        );
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let config = layout(Path::new("font.ttf"));
        let record = Record::from_pairs([("name", "Bruno"), ("email", "b@c.com")]);
        match plan_fields(&record, &config).unwrap_err() {
            RenderError::MissingField {
                record,
                missing,
                required,
            } => {
                assert_eq!(record, "Bruno");
                assert_eq!(missing, vec!["role".to_string()]);
                assert_eq!(required, vec!["name".to_string(), "role".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn blank_name_is_rejected() {
        let config = FieldConfigSet::new();
        let record = Record::from_pairs([("nome", "   "), ("email", "x@y.z")]);
        assert!(matches!(
            plan_fields(&record, &config),
            Err(RenderError::EmptyName)
        ));
    }

    #[test]
    fn filename_tokens_are_sanitized() {
        let record = Record::from_pairs([
            ("nome", "João da Silva"),
            ("cargo", "Gerente de Vendas"),
            ("email", "joao@empresa.com"),
            ("telefone", "(11) 98765-4321"),
        ]);
        assert_eq!(
            output_filename(&record, "{name}_{role}_{email}_{phone}.webp").unwrap(),
            "João_da_Silva_Gerente_de_Vendas_joao_at_empresa.com_11987654321.webp"
        );
        assert_eq!(
            output_filename(&record, "{nome}-{telefone}.png").unwrap(),
            "João_da_Silva-11987654321.png"
        );
        assert_eq!(
            output_filename(&ana(), DEFAULT_FILENAME_PATTERN).unwrap(),
            "Ana_Silva_signature.webp"
        );
        assert_eq!(
            output_filename(&Record::default(), "{name}{role}{phone}.webp").unwrap(),
            "unnamed.webp"
        );
    }

    #[test]
    fn unsafe_or_malformed_patterns_are_rejected() {
        assert!(matches!(
            output_filename(&ana(), "{department}.webp"),
            Err(RenderError::Pattern { .. })
        ));
        assert!(matches!(
            output_filename(&ana(), "../{name}.webp"),
            Err(RenderError::InvalidFilename(_))
        ));
        let mut options = OutputOptions::new("out");
        options.quality = 101;
        assert!(matches!(
            SignatureRenderer::new(template(), options),
            Err(RenderError::InvalidOptions(_))
        ));
        let mut options = OutputOptions::new("out");
        options.filename_pattern = "{name}.gif".into();
        assert!(matches!(
            SignatureRenderer::new(template(), options),
            Err(RenderError::Output(OutputError::UnsupportedExtension(_)))
        ));
    }

    #[test]
    fn renders_without_drawn_fields_and_keeps_template_intact() {
        let dir = tempfile::tempdir().unwrap();
        let mut renderer =
            SignatureRenderer::new(template(), OutputOptions::new(dir.path())).unwrap();
        let path = renderer.render(&ana(), &FieldConfigSet::new()).unwrap();

        assert_eq!(path, dir.path().join("Ana_Silva_signature.webp"));
        let written = image::open(&path).unwrap();
        assert_eq!((written.width(), written.height()), (160, 60));
        assert_eq!(renderer.template(), &template());
    }

    #[test]
    fn dots_in_record_values_do_not_change_the_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut options = OutputOptions::new(dir.path());
        options.filename_pattern = "{name}".into();
        let mut renderer = SignatureRenderer::new(template(), options).unwrap();
        assert_eq!(renderer.format(), OutputFormat::WebP);

        let records = [
            Record::from_pairs([("name", "Ana")]),
            Record::from_pairs([("name", "J. Smith")]),
        ];
        let results = renderer.render_all(&records, &FieldConfigSet::new());
        let written: Vec<PathBuf> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            written,
            vec![dir.path().join("Ana"), dir.path().join("J._Smith")]
        );
        let bytes = fs::read(&written[1]).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::WebP);
    }

    #[test]
    fn unreadable_font_fails_only_that_record() {
        let dir = tempfile::tempdir().unwrap();
        let font = dir.path().join("broken.ttf");
        fs::write(&font, b"definitely not a font").unwrap();
        let config = layout(&font);

        let mut renderer =
            SignatureRenderer::new(template(), OutputOptions::new(dir.path())).unwrap();
        match renderer.render(&ana(), &config).unwrap_err() {
            RenderError::FontLoad { path, size, .. } => {
                assert_eq!(path, font);
                assert_eq!(size, 14);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dir.path().join("Ana_Silva_signature.webp").exists());
    }

    #[test]
    fn render_all_keeps_going_after_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = FieldConfigSet::new();
        config.insert(
            "email",
            FieldRule::new(dir.path().join("absent.ttf"), 10, (0, 0), Rgb(0, 0, 0)),
        );
        let records = [
            Record::from_pairs([("name", "Ana")]),
            Record::from_pairs([("name", "")]),
        ];

        let mut renderer =
            SignatureRenderer::new(template(), OutputOptions::new(dir.path())).unwrap();
        let results = renderer.render_all(&records, &config);
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(RenderError::MissingField { .. })));
        assert!(matches!(results[1], Err(RenderError::MissingField { .. })));

        let results = renderer.render_all(&records, &FieldConfigSet::new());
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(RenderError::EmptyName)));
    }

    #[test]
    fn draws_text_with_a_real_font() {
        let font = Path::new(SYSTEM_FONT);
        if !font.is_file() {
            eprintln!("{SYSTEM_FONT} not available, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let mut options = OutputOptions::new(dir.path());
        options.filename_pattern = "{name}.png".into();
        let mut renderer = SignatureRenderer::new(template(), options).unwrap();

        let first = renderer.render(&ana(), &layout(font)).unwrap();
        let second = renderer.render(&ana(), &layout(font)).unwrap();
        assert_eq!(first, second);

        let written = image::open(&first).unwrap().to_rgba8();
        let inked = written.pixels().filter(|px| px.0[0] < 128).count();
        assert!(inked > 0, "text should darken some pixels");
        assert_eq!(renderer.template(), &template());
    }
}
