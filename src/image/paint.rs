use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};

use crate::config::{Alignment, Rgb};

/// Visual parameters for one block of text.
#[derive(Debug, Clone, Copy)]
pub struct TextStyle<'a> {
    pub font: &'a FontArc,
    /// Em size in pixels.
    pub size: u32,
    pub color: Rgb,
    /// Extra pixels between consecutive lines.
    pub line_spacing: i32,
    pub alignment: Alignment,
}

/// Draw `text` with its top-left corner at `position`, one row per `\n`.
///
/// Lines are aligned against the widest line of the block, so `Center` and
/// `Right` only move lines that are shorter than it.
pub fn draw_text_block(
    canvas: &mut RgbaImage,
    position: (i32, i32),
    text: &str,
    style: &TextStyle<'_>,
) {
    let scale = em_scale(style.font, style.size);
    let line_height = style.font.as_scaled(scale).ascent().round() as i32 + style.line_spacing;
    let color = rgba(style.color);

    let lines: Vec<&str> = text.split('\n').collect();
    let widths: Vec<u32> = lines
        .iter()
        .map(|line| text_size(scale, style.font, line).0)
        .collect();
    let block_width = widths.iter().copied().max().unwrap_or(0);

    let (x, y) = position;
    for (row, (line, width)) in lines.iter().zip(&widths).enumerate() {
        if line.is_empty() {
            continue;
        }
        let offset = match style.alignment {
            Alignment::Left => 0,
            Alignment::Center => (block_width - width) / 2,
            Alignment::Right => block_width - width,
        };
        draw_text_mut(
            canvas,
            color,
            x + offset as i32,
            y + row as i32 * line_height,
            scale,
            style.font,
            line,
        );
    }
}

/// Convert an em size in pixels into the ascent-to-descent scale ab_glyph expects.
pub(crate) fn em_scale(font: &impl Font, size: u32) -> PxScale {
    let size = size as f32;
    match font.units_per_em() {
        Some(units) if units > 0.0 => PxScale::from(size * font.height_unscaled() / units),
        _ => PxScale::from(size),
    }
}

fn rgba(color: Rgb) -> Rgba<u8> {
    let Rgb(r, g, b) = color;
    Rgba([r, g, b, 0xff])
}
