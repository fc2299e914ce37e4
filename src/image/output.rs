use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageError, RgbaImage};
use thiserror::Error;
use webp::WebPConfig;

/// Raster container chosen from the output file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Lossy WebP; also used when the file name has no extension.
    WebP,
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self, OutputError> {
        let Some(ext) = path.extension() else {
            return Ok(OutputFormat::WebP);
        };
        let ext = ext.to_string_lossy().to_ascii_lowercase();
        match ext.as_str() {
            "webp" => Ok(OutputFormat::WebP),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            _ => Err(OutputError::UnsupportedExtension(ext)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::WebP => write!(f, "webp"),
            OutputFormat::Jpeg => write!(f, "jpeg"),
            OutputFormat::Png => write!(f, "png"),
        }
    }
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("unsupported output extension '.{0}' (expected webp, jpg, jpeg or png)")]
    UnsupportedExtension(String),
    #[error("failed to encode {format} image")]
    Encode {
        format: OutputFormat,
        #[source]
        source: ImageError,
    },
    #[error("failed to encode webp image: {0}")]
    WebP(String),
    #[error("failed to write {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Encode `image` to `path` as `format`, whatever `path` ends in.
///
/// `quality` (0-100) drives WebP and JPEG. `method` (0-6) is the WebP
/// compression effort and picks the PNG compression level.
pub fn save_signature(
    image: &RgbaImage,
    path: &Path,
    format: OutputFormat,
    quality: u8,
    method: u8,
) -> Result<(), OutputError> {
    match format {
        OutputFormat::WebP => {
            let bytes = encode_webp(image, quality, method)?;
            fs::write(path, bytes).map_err(|source| OutputError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
        OutputFormat::Jpeg => write_encoded(path, format, |writer| {
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            JpegEncoder::new_with_quality(writer, quality.clamp(1, 100)).encode_image(&rgb)
        }),
        OutputFormat::Png => write_encoded(path, format, |writer| {
            PngEncoder::new_with_quality(writer, png_compression(method), FilterType::Adaptive)
                .write_image(
                    image.as_raw(),
                    image.width(),
                    image.height(),
                    ExtendedColorType::Rgba8,
                )
        }),
    }
}

fn write_encoded<F>(path: &Path, format: OutputFormat, encode: F) -> Result<(), OutputError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), ImageError>,
{
    let io_error = |source: std::io::Error| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    encode(&mut writer).map_err(|source| OutputError::Encode { format, source })?;
    writer.flush().map_err(io_error)
}

fn encode_webp(image: &RgbaImage, quality: u8, method: u8) -> Result<Vec<u8>, OutputError> {
    let mut config =
        WebPConfig::new().map_err(|_| OutputError::WebP("invalid encoder config".into()))?;
    config.lossless = 0;
    config.quality = f32::from(quality.min(100));
    config.method = i32::from(method.min(6));

    let memory = webp::Encoder::from_rgba(image.as_raw(), image.width(), image.height())
        .encode_advanced(&config)
        .map_err(|err| OutputError::WebP(format!("{err:?}")))?;
    Ok(memory.to_vec())
}

fn png_compression(method: u8) -> CompressionType {
    match method {
        0 | 1 => CompressionType::Fast,
        2..=4 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}
