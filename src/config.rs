use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::processing::adjust::{FILTER_MAX, FILTER_MIN, FilterParams};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Where frames come from.
    pub source: SourceConfig,
    /// Initial contrast/brightness.
    pub filter: FilterParams,
    /// Cell size and its allowed range.
    pub viewport: ViewportConfig,
    /// Display viewport the drawable surface is derived from.
    pub display: DisplayConfig,
    /// Glyph appearance.
    pub render: RenderConfig,
    /// Loop timing.
    pub pipeline: PipelineConfig,
    /// Optional PNG output of the drawn surface.
    pub snapshot: SnapshotConfig,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        self.source.validate()?;
        ensure!(
            (FILTER_MIN..=FILTER_MAX).contains(&self.filter.contrast),
            "filter.contrast must be within [{FILTER_MIN}, {FILTER_MAX}]"
        );
        ensure!(
            (FILTER_MIN..=FILTER_MAX).contains(&self.filter.brightness),
            "filter.brightness must be within [{FILTER_MIN}, {FILTER_MAX}]"
        );
        self.viewport.validate()?;
        ensure!(
            self.display.width > 0 && self.display.height > 0,
            "display width and height must be greater than zero"
        );
        ensure!(
            self.display.surface_scale > 0.0,
            "display.surface-scale must be positive"
        );
        ensure!(
            self.pipeline.idle_retry > Duration::ZERO,
            "pipeline.idle-retry must be positive"
        );
        ensure!(
            self.pipeline.frame_rate_interval > Duration::ZERO,
            "pipeline.frame-rate-interval must be positive"
        );
        ensure!(self.snapshot.every >= 1, "snapshot.every must be >= 1");
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    #[default]
    TestPattern,
    StillImage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Requested capture width in pixels.
    pub width: u32,
    /// Requested width / height.
    pub aspect_ratio: f32,
    /// Image file for `still-image`.
    pub path: Option<PathBuf>,
    /// Per-channel jitter amplitude for `test-pattern`, emulating sensor noise.
    pub noise: u8,
    /// Seed for the test-pattern noise; random when absent.
    pub seed: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::TestPattern,
            width: 320,
            aspect_ratio: 16.0 / 9.0,
            path: None,
            noise: 0,
            seed: None,
        }
    }
}

impl SourceConfig {
    /// Requested capture resolution.
    #[must_use]
    pub fn resolution(&self) -> (u32, u32) {
        let height = (self.width as f32 / self.aspect_ratio).round().max(1.0) as u32;
        (self.width, height)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.width > 0, "source.width must be greater than zero");
        ensure!(
            self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0,
            "source.aspect-ratio must be positive"
        );
        if self.kind == SourceKind::StillImage {
            ensure!(
                self.path.is_some(),
                "source.path is required for kind still-image"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ViewportConfig {
    /// Surface pixels allotted to one source pixel (three stacked glyphs).
    pub cell_size: f32,
    pub min_cell_size: f32,
    pub max_cell_size: f32,
    /// Width of the minimap the `inset` drag command is measured against.
    pub minimap_width: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            cell_size: 24.0,
            min_cell_size: 24.0,
            max_cell_size: 72.0,
            minimap_width: 160.0,
        }
    }
}

impl ViewportConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.min_cell_size > 0.0,
            "viewport.min-cell-size must be positive"
        );
        ensure!(
            self.min_cell_size <= self.cell_size && self.cell_size <= self.max_cell_size,
            "viewport.cell-size must lie within [min-cell-size, max-cell-size]"
        );
        ensure!(
            self.minimap_width.is_finite() && self.minimap_width > 0.0,
            "viewport.minimap-width must be positive"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    /// Drawable surface size relative to the display viewport.
    pub surface_scale: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
            surface_scale: 2.0,
        }
    }
}

impl DisplayConfig {
    /// Drawable surface dimensions. Independent of the source resolution.
    #[must_use]
    pub fn surface_size(&self) -> (u32, u32) {
        let w = (self.width as f32 * self.surface_scale).round().max(1.0) as u32;
        let h = (self.height as f32 * self.surface_scale).round().max(1.0) as u32;
        (w, h)
    }
}

/// How each channel value is colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GlyphTint {
    /// Every digit is drawn at full channel intensity, so zeros stay legible.
    #[default]
    PureChannel,
    /// The digit takes its own value in its channel: red 128 is `rgb(128, 0, 0)`.
    ChannelIntensity,
}

impl GlyphTint {
    #[must_use]
    pub fn red(self, value: u8) -> [u8; 3] {
        [self.level(value), 0, 0]
    }

    #[must_use]
    pub fn green(self, value: u8) -> [u8; 3] {
        [0, self.level(value), 0]
    }

    #[must_use]
    pub fn blue(self, value: u8) -> [u8; 3] {
        [0, 0, self.level(value)]
    }

    fn level(self, value: u8) -> u8 {
        match self {
            Self::ChannelIntensity => value,
            Self::PureChannel => u8::MAX,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RenderConfig {
    /// RGBA the surface is cleared to before every draw.
    pub background: [u8; 4],
    pub glyph_tint: GlyphTint,
    /// Font families tried in order before falling back to any monospace face.
    pub font_families: Vec<String>,
    /// Explicit font file; skips system font discovery.
    pub font_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background: [0, 0, 0, 255],
            glyph_tint: GlyphTint::default(),
            font_families: vec![
                "DejaVu Sans Mono".to_string(),
                "Noto Sans Mono".to_string(),
            ],
            font_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// How often the coordinator retries sampling while the source is not ready.
    #[serde(with = "humantime_serde")]
    pub idle_retry: Duration,
    /// Window over which ready signals are counted for the frame rate.
    #[serde(with = "humantime_serde")]
    pub frame_rate_interval: Duration,
    /// Stop after this many completed frames.
    pub max_frames: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            idle_retry: Duration::from_millis(16),
            frame_rate_interval: Duration::from_secs(1),
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SnapshotConfig {
    pub path: Option<PathBuf>,
    /// Write every Nth drawn frame.
    pub every: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: None,
            every: 30,
        }
    }
}
