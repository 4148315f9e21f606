//! Contrast/brightness adjustment applied while sampling a frame.
//!
//! Both adjustments collapse into one 256-entry lookup table so each channel
//! byte is touched exactly once per frame.

use image::RgbaImage;
use serde::Deserialize;

pub const FILTER_MIN: f32 = 0.0;
pub const FILTER_MAX: f32 = 2.0;

/// User-controlled filter values. `1.0` leaves the frame unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct FilterParams {
    /// Multiplier around mid-grey (CSS `contrast(contrast * 100%)`).
    pub contrast: f32,
    /// Linear multiplier (CSS `brightness(brightness)`).
    pub brightness: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            contrast: 1.0,
            brightness: 1.0,
        }
    }
}

impl FilterParams {
    pub fn set_contrast(&mut self, value: f32) {
        self.contrast = clamp_filter(value);
    }

    pub fn set_brightness(&mut self, value: f32) {
        self.brightness = clamp_filter(value);
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        (self.contrast - 1.0).abs() <= f32::EPSILON && (self.brightness - 1.0).abs() <= f32::EPSILON
    }
}

fn clamp_filter(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(FILTER_MIN, FILTER_MAX)
    } else {
        1.0
    }
}

/// Per-byte mapping for contrast followed by brightness.
#[derive(Clone)]
pub struct ToneCurve {
    table: [u8; 256],
}

impl ToneCurve {
    #[must_use]
    pub fn new(params: FilterParams) -> Self {
        let mut table = [0u8; 256];
        for (value, slot) in table.iter_mut().enumerate() {
            let v = value as f32 / 255.0;
            // each filter primitive clamps its own output
            let contrasted = ((v - 0.5) * params.contrast + 0.5).clamp(0.0, 1.0);
            let brightened = (contrasted * params.brightness).clamp(0.0, 1.0);
            *slot = (brightened * 255.0).round() as u8;
        }
        Self { table }
    }

    #[must_use]
    pub fn map(&self, value: u8) -> u8 {
        self.table[value as usize]
    }

    /// Rewrites RGB in place; alpha is left alone.
    pub fn apply(&self, image: &mut RgbaImage) {
        for pixel in image.pixels_mut() {
            pixel[0] = self.table[pixel[0] as usize];
            pixel[1] = self.table[pixel[1] as usize];
            pixel[2] = self.table[pixel[2] as usize];
        }
    }
}

impl std::fmt::Debug for ToneCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToneCurve")
            .field("black", &self.table[0])
            .field("mid", &self.table[128])
            .field("white", &self.table[255])
            .finish()
    }
}
