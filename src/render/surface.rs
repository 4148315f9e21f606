use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgba, RgbaImage};

/// The drawable surface. Created once by the coordinator, then owned by the
/// render worker for the rest of the session.
#[derive(Debug)]
pub struct Surface {
    canvas: RgbaImage,
    background: Rgba<u8>,
}

impl Surface {
    #[must_use]
    pub fn new(width: u32, height: u32, background: [u8; 4]) -> Self {
        let background = Rgba(background);
        Self {
            canvas: RgbaImage::from_pixel(width.max(1), height.max(1), background),
            background,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn clear(&mut self) {
        let background = self.background;
        for pixel in self.canvas.pixels_mut() {
            *pixel = background;
        }
    }

    /// Mixes `color` into the pixel at `(x, y)` by `coverage` in `[0, 1]`.
    /// Out-of-bounds writes are ignored so glyphs may straddle the edges.
    pub fn blend(&mut self, x: i64, y: i64, color: [u8; 3], coverage: f32) {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return;
        }
        let coverage = coverage.clamp(0.0, 1.0);
        if coverage <= 0.0 {
            return;
        }
        let pixel = self.canvas.get_pixel_mut(x as u32, y as u32);
        for c in 0..3 {
            let dst = f32::from(pixel[c]);
            let src = f32::from(color[c]);
            pixel[c] = (dst + (src - dst) * coverage).round() as u8;
        }
        pixel[3] = pixel[3].max((coverage * 255.0).round() as u8);
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.canvas.get_pixel_checked(x, y).map(|p| p.0)
    }

    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.canvas
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("failed to write surface snapshot to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_restores_background() {
        let mut surface = Surface::new(4, 2, [0, 0, 0, 255]);
        surface.blend(1, 1, [255, 0, 0], 1.0);
        assert_eq!(surface.pixel(1, 1), Some([255, 0, 0, 255]));
        surface.clear();
        assert_eq!(surface.pixel(1, 1), Some([0, 0, 0, 255]));
    }

    #[test]
    fn blend_ignores_out_of_bounds() {
        let mut surface = Surface::new(2, 2, [0, 0, 0, 255]);
        surface.blend(-1, 0, [255, 255, 255], 1.0);
        surface.blend(2, 0, [255, 255, 255], 1.0);
        assert!(surface.as_image().pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn partial_coverage_mixes() {
        let mut surface = Surface::new(1, 1, [0, 0, 0, 255]);
        surface.blend(0, 0, [0, 200, 0], 0.5);
        assert_eq!(surface.pixel(0, 0), Some([0, 100, 0, 255]));
    }
}
