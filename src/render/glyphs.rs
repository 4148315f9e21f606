//! Glyph drawing for the mosaic.
//!
//! The worker only needs one primitive: draw a short string centred on an x
//! coordinate with its top edge at a y coordinate. [`FontPainter`] does this
//! with `ab_glyph`, caching coverage masks per character because a mosaic is
//! nothing but the ten digits repeated thousands of times.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use ab_glyph::{Font, FontArc, PxScale, ScaleFont, point};
use anyhow::{Context, Result, anyhow};
use fontdb::{Database, Family, Query, Source, Weight};
use tracing::{debug, info};

use crate::render::surface::Surface;

pub trait GlyphPainter: Send {
    /// Draws `text` horizontally centred on `center_x` with its top at `top`.
    /// `size` is the glyph height in surface pixels.
    fn draw_text(
        &mut self,
        surface: &mut Surface,
        text: &str,
        center_x: f32,
        top: f32,
        size: f32,
        color: [u8; 3],
    );
}

#[derive(Debug)]
struct CachedGlyph {
    // offset of the mask from the pen position (x) and the line top (y)
    left: i64,
    top: i64,
    width: usize,
    height: usize,
    coverage: Vec<f32>,
    advance: f32,
}

pub struct FontPainter {
    font: FontArc,
    cached_size: f32,
    cache: HashMap<char, CachedGlyph>,
}

impl FontPainter {
    #[must_use]
    pub fn new(font: FontArc) -> Self {
        Self {
            font,
            cached_size: 0.0,
            cache: HashMap::new(),
        }
    }

    fn glyph(&mut self, ch: char, size: f32) -> &CachedGlyph {
        if (self.cached_size - size).abs() > f32::EPSILON {
            debug!(size, "glyph cache reset for new size");
            self.cache.clear();
            self.cached_size = size;
        }
        let font = &self.font;
        self.cache
            .entry(ch)
            .or_insert_with(|| rasterize(font, ch, size))
    }

    fn text_width(&mut self, text: &str, size: f32) -> f32 {
        text.chars().map(|ch| self.glyph(ch, size).advance).sum()
    }
}

fn rasterize(font: &FontArc, ch: char, size: f32) -> CachedGlyph {
    let scale = PxScale::from(size);
    let scaled = font.as_scaled(scale);
    let id = scaled.glyph_id(ch);
    let advance = scaled.h_advance(id);
    let mut positioned = scaled.scaled_glyph(ch);
    positioned.position = point(0.0, scaled.ascent());

    let Some(outline) = font.outline_glyph(positioned) else {
        return CachedGlyph {
            left: 0,
            top: 0,
            width: 0,
            height: 0,
            coverage: Vec::new(),
            advance,
        };
    };
    let bounds = outline.px_bounds();
    let width = bounds.width().max(0.0) as usize;
    let height = bounds.height().max(0.0) as usize;
    let mut coverage = vec![0.0f32; width * height];
    outline.draw(|x, y, c| {
        let (x, y) = (x as usize, y as usize);
        if x < width && y < height {
            coverage[y * width + x] = c;
        }
    });
    CachedGlyph {
        left: bounds.min.x as i64,
        top: bounds.min.y as i64,
        width,
        height,
        coverage,
        advance,
    }
}

impl GlyphPainter for FontPainter {
    fn draw_text(
        &mut self,
        surface: &mut Surface,
        text: &str,
        center_x: f32,
        top: f32,
        size: f32,
        color: [u8; 3],
    ) {
        if size <= 0.0 || text.is_empty() {
            return;
        }
        let width = self.text_width(text, size);
        let mut pen_x = center_x - width / 2.0;
        let top = top.round() as i64;
        for ch in text.chars() {
            let glyph = self.glyph(ch, size);
            let origin_x = pen_x.round() as i64 + glyph.left;
            let origin_y = top + glyph.top;
            for row in 0..glyph.height {
                let line = &glyph.coverage[row * glyph.width..(row + 1) * glyph.width];
                for (col, &c) in line.iter().enumerate() {
                    if c > 0.0 {
                        surface.blend(origin_x + col as i64, origin_y + row as i64, color, c);
                    }
                }
            }
            pen_x += glyph.advance;
        }
    }
}

/// One `draw_text` call as seen by a [`RecordingPainter`].
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRun {
    pub text: String,
    pub center_x: f32,
    pub top: f32,
    pub size: f32,
    pub color: [u8; 3],
}

/// Painter that records calls instead of touching pixels. Cloned handles
/// share the same log, so a test can keep one while the worker owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingPainter {
    runs: Arc<Mutex<Vec<GlyphRun>>>,
}

impl RecordingPainter {
    #[must_use]
    pub fn runs(&self) -> Vec<GlyphRun> {
        self.runs.lock().map(|runs| runs.clone()).unwrap_or_default()
    }

    pub fn take(&self) -> Vec<GlyphRun> {
        self.runs
            .lock()
            .map(|mut runs| std::mem::take(&mut *runs))
            .unwrap_or_default()
    }
}

impl GlyphPainter for RecordingPainter {
    fn draw_text(
        &mut self,
        _surface: &mut Surface,
        text: &str,
        center_x: f32,
        top: f32,
        size: f32,
        color: [u8; 3],
    ) {
        if let Ok(mut runs) = self.runs.lock() {
            runs.push(GlyphRun {
                text: text.to_string(),
                center_x,
                top,
                size,
                color,
            });
        }
    }
}

/// Finds a bold monospace face, trying `families` in order, unless `path`
/// names a font file directly.
pub fn load_font(families: &[String], path: Option<&Path>) -> Result<FontArc> {
    if let Some(path) = path {
        let data =
            fs::read(path).with_context(|| format!("failed to read font at {}", path.display()))?;
        let font = FontArc::try_from_vec(data)
            .with_context(|| format!("failed to decode font at {}", path.display()))?;
        info!(path = %path.display(), "loaded configured font");
        return Ok(font);
    }

    let mut db = Database::new();
    db.load_system_fonts();

    let mut preferred: Vec<Family<'_>> =
        families.iter().map(|f| Family::Name(f.as_str())).collect();
    preferred.push(Family::Monospace);

    for family in preferred {
        if let Some(id) = db.query(&Query {
            families: &[family],
            weight: Weight::BOLD,
            ..Default::default()
        }) && let Some(font) = load_face(&db, id)?
        {
            return Ok(font);
        }
    }

    for face in db.faces() {
        if let Some(font) = load_face(&db, face.id)? {
            return Ok(font);
        }
    }

    Err(anyhow!("no usable system font found for the mosaic"))
}

fn load_face(db: &Database, id: fontdb::ID) -> Result<Option<FontArc>> {
    let face = db.face(id).context("missing font face in database")?;
    let font = match &face.source {
        Source::Binary(data) => Some(
            FontArc::try_from_vec(data.as_ref().as_ref().to_vec())
                .context("failed to decode font face from binary source")?,
        ),
        Source::File(path) => {
            let data = fs::read(path)
                .with_context(|| format!("failed to read font at {}", path.display()))?;
            Some(FontArc::try_from_vec(data).context("failed to decode font face from file data")?)
        }
        Source::SharedFile(_, data) => Some(
            FontArc::try_from_vec(data.as_ref().as_ref().to_vec())
                .context("failed to decode font face from shared file data")?,
        ),
    };
    if font.is_some() {
        info!(family = ?face.families.first().map(|(name, _)| name), "loaded system font");
    }
    Ok(font)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_painter_shares_log_between_clones() {
        let painter = RecordingPainter::default();
        let mut handle = painter.clone();
        let mut surface = Surface::new(4, 4, [0, 0, 0, 255]);
        handle.draw_text(&mut surface, "42", 2.0, 0.0, 3.0, [0, 255, 0]);
        let runs = painter.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "42");
        assert!(surface.as_image().pixels().all(|p| p.0 == [0, 0, 0, 255]));
        assert_eq!(painter.take().len(), 1);
        assert!(painter.runs().is_empty());
    }
}
