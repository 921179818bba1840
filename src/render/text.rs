use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};
use std::path::Path;

use super::canvas::{Rgba, RgbaCanvas};

/// Rasterised label text for axis annotations.
pub struct TextOverlay {
    font: Font,
    font_size: f32,
}

impl TextOverlay {
    pub fn from_bytes(bytes: &[u8], font_size: f32) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(anyhow::Error::msg)
            .context("Failed to parse font")?;
        Ok(Self { font, font_size })
    }

    pub fn from_file(path: &Path, font_size: f32) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read font file: {}", path.display()))?;
        Self::from_bytes(&bytes, font_size)
    }

    pub fn line_height(&self) -> u32 {
        self.font
            .horizontal_line_metrics(self.font_size)
            .map_or(self.font_size, |m| m.new_line_size)
            .ceil() as u32
    }

    /// Composite text onto the canvas with its top-left corner at `(x, y)`.
    pub fn composite(&self, canvas: &mut RgbaCanvas, text: &str, x: i32, y: i32, color: Rgba) {
        let mut cursor_x = x;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.font_size);
            let glyph_y = y + self.font_size as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage == 0 {
                        continue;
                    }
                    canvas.blend_pixel(
                        cursor_x + metrics.xmin + gx as i32,
                        glyph_y + gy as i32,
                        color,
                        coverage as f32 / 255.0,
                    );
                }
            }

            cursor_x += metrics.advance_width.round() as i32;
        }
    }

    /// Measure the width of rendered text in pixels.
    pub fn measure_width(&self, text: &str) -> u32 {
        let width: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, self.font_size).advance_width)
            .sum();
        width.ceil() as u32
    }
}

/// Download a TTF/OTF font. Used when no local font is configured.
pub fn load_font_from_url(url: &str) -> Result<Vec<u8>> {
    log::info!("Downloading font from {}", url);
    let response = reqwest::blocking::get(url)
        .with_context(|| format!("Failed to request font: {}", url))?
        .error_for_status()
        .with_context(|| format!("Font download failed: {}", url))?;
    let bytes = response.bytes().context("Failed to read font body")?;
    Ok(bytes.to_vec())
}
