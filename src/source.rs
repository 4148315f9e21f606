//! Frame sources the pipeline can sample from.
//!
//! A real camera sits behind [`CameraAcquirer`]; the pipeline only needs the
//! [`VideoFrameSource`] it hands back. Two sources ship with the crate: an
//! animated test pattern and a still image, both at the requested capture
//! resolution.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::{ImageReader, RgbaImage};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, info};

use crate::config::{SourceConfig, SourceKind};
use crate::error::{AcquisitionError, DecodeError};

pub trait VideoFrameSource: Send {
    /// Native resolution. `(0, 0)` while the source is not decoding yet.
    fn dimensions(&self) -> (u32, u32);

    /// Composites the current frame into `target`, which the caller has
    /// already sized to [`Self::dimensions`].
    fn draw_into(&mut self, target: &mut RgbaImage) -> Result<(), DecodeError>;
}

pub trait CameraAcquirer {
    fn acquire(&self) -> Result<Box<dyn VideoFrameSource>, AcquisitionError>;
}

/// Builds the source described by the configuration.
#[derive(Debug, Clone)]
pub struct ConfiguredAcquirer {
    config: SourceConfig,
}

impl ConfiguredAcquirer {
    #[must_use]
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }
}

impl CameraAcquirer for ConfiguredAcquirer {
    fn acquire(&self) -> Result<Box<dyn VideoFrameSource>, AcquisitionError> {
        let (width, height) = self.config.resolution();
        match self.config.kind {
            SourceKind::TestPattern => {
                info!(width, height, "using test-pattern source");
                let mut source = TestPatternSource::new(width, height);
                if self.config.noise > 0 {
                    source = source.with_noise(self.config.noise, self.config.seed);
                }
                Ok(Box::new(source))
            }
            SourceKind::StillImage => {
                let path = self.config.path.as_deref().ok_or_else(|| {
                    AcquisitionError::DeviceUnavailable("still-image source has no path".into())
                })?;
                let source = StillImageSource::open(path, width)?;
                Ok(Box::new(source))
            }
        }
    }
}

/// Scrolling colour gradient, optionally with per-channel noise.
#[derive(Debug)]
pub struct TestPatternSource {
    width: u32,
    height: u32,
    frame: u32,
    warmup: Cell<u32>,
    noise: u8,
    rng: StdRng,
}

impl TestPatternSource {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame: 0,
            warmup: Cell::new(0),
            noise: 0,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Adds uniform jitter of up to `amplitude` on every channel.
    #[must_use]
    pub fn with_noise(mut self, amplitude: u8, seed: Option<u64>) -> Self {
        self.noise = amplitude;
        self.rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        self
    }

    /// Reports zero dimensions for the first `polls` calls to
    /// [`VideoFrameSource::dimensions`], like a device that is still starting.
    #[must_use]
    pub fn with_warmup(mut self, polls: u32) -> Self {
        self.warmup = Cell::new(polls);
        self
    }

    fn jitter(&mut self, value: u8) -> u8 {
        if self.noise == 0 {
            return value;
        }
        let amplitude = i16::from(self.noise);
        let delta = self.rng.random_range(-amplitude..=amplitude);
        (i16::from(value) + delta).clamp(0, 255) as u8
    }
}

impl VideoFrameSource for TestPatternSource {
    fn dimensions(&self) -> (u32, u32) {
        let remaining = self.warmup.get();
        if remaining > 0 {
            self.warmup.set(remaining - 1);
            (0, 0)
        } else {
            (self.width, self.height)
        }
    }

    fn draw_into(&mut self, target: &mut RgbaImage) -> Result<(), DecodeError> {
        let (w, h) = (u64::from(self.width.max(1)), u64::from(self.height.max(1)));
        let shift = u64::from(self.frame) % (w * (w + h));
        for y in 0..target.height() {
            let yy = u64::from(y);
            for x in 0..target.width() {
                let xx = u64::from(x);
                let r = (((xx + shift) % w) * 255 / w) as u8;
                let g = (yy * 255 / h) as u8;
                let b = (((xx + yy + 2 * shift) % (w + h)) * 255 / (w + h)) as u8;
                let px = [self.jitter(r), self.jitter(g), self.jitter(b), 255];
                target.put_pixel(x, y, image::Rgba(px));
            }
        }
        self.frame = self.frame.wrapping_add(1);
        Ok(())
    }
}

/// A decoded image replayed as every frame.
#[derive(Debug)]
pub struct StillImageSource {
    path: Option<PathBuf>,
    frame: RgbaImage,
}

impl StillImageSource {
    /// Decodes `path` and scales it to `width`, keeping its aspect ratio.
    pub fn open(path: &Path, width: u32) -> Result<Self, AcquisitionError> {
        let decoded = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?
            .to_rgba8();
        let (iw, ih) = decoded.dimensions();
        let height = ((ih as f32 * width as f32) / iw.max(1) as f32).round().max(1.0) as u32;
        let frame = if (iw, ih) == (width, height) {
            decoded
        } else {
            resize_rgba(&decoded, width, height)
                .map_err(|err| AcquisitionError::DeviceUnavailable(format!("{err:#}")))?
        };
        info!(
            path = %path.display(),
            width = frame.width(),
            height = frame.height(),
            "using still-image source"
        );
        Ok(Self {
            path: Some(path.to_path_buf()),
            frame,
        })
    }

    #[must_use]
    pub fn from_image(frame: RgbaImage) -> Self {
        Self { path: None, frame }
    }
}

impl VideoFrameSource for StillImageSource {
    fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    fn draw_into(&mut self, target: &mut RgbaImage) -> Result<(), DecodeError> {
        if target.dimensions() != self.frame.dimensions() {
            return Err(DecodeError::Stream(format!(
                "target {:?} does not match still frame {:?} from {:?}",
                target.dimensions(),
                self.frame.dimensions(),
                self.path
            )));
        }
        target.copy_from_slice(self.frame.as_raw());
        Ok(())
    }
}

fn resize_rgba(source: &RgbaImage, target_w: u32, target_h: u32) -> Result<RgbaImage> {
    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .context("failed to create source view for still-image resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("still-image resize failed")?;
    debug!(
        from = ?source.dimensions(),
        to = ?(target_w, target_h),
        "resized still image"
    );
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .context("resized buffer has unexpected length")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn warmup_reports_zero_dimensions() {
        let source = TestPatternSource::new(8, 4).with_warmup(2);
        assert_eq!(source.dimensions(), (0, 0));
        assert_eq!(source.dimensions(), (0, 0));
        assert_eq!(source.dimensions(), (8, 4));
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let mut a = TestPatternSource::new(8, 4).with_noise(10, Some(3));
        let mut b = TestPatternSource::new(8, 4).with_noise(10, Some(3));
        let mut fa = RgbaImage::new(8, 4);
        let mut fb = RgbaImage::new(8, 4);
        a.draw_into(&mut fa).unwrap();
        b.draw_into(&mut fb).unwrap();
        assert_eq!(fa, fb);
    }

    #[test]
    fn pattern_scrolls_between_frames() {
        let mut source = TestPatternSource::new(16, 9);
        let mut first = RgbaImage::new(16, 9);
        let mut second = RgbaImage::new(16, 9);
        source.draw_into(&mut first).unwrap();
        source.draw_into(&mut second).unwrap();
        assert_ne!(first, second);
        assert!(first.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn very_wide_pattern_draws_without_overflow() {
        let mut source = TestPatternSource::new(70_000, 2);
        let mut target = RgbaImage::new(70_000, 2);
        source.draw_into(&mut target).unwrap();
        source.draw_into(&mut target).unwrap();
        assert_eq!(target.get_pixel(69_999, 1)[3], 255);
    }

    #[test]
    fn still_image_is_resized_to_requested_width() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbaImage::from_pixel(64, 36, Rgba([90, 60, 30, 255]))
            .save(&path)
            .unwrap();

        let mut source = StillImageSource::open(&path, 32).unwrap();
        assert_eq!(source.dimensions(), (32, 18));
        let mut target = RgbaImage::new(32, 18);
        source.draw_into(&mut target).unwrap();
        let px = target.get_pixel(10, 10);
        for (got, want) in px.0.iter().zip([90u8, 60, 30, 255]) {
            assert!(got.abs_diff(want) <= 1, "{px:?}");
        }
    }

    #[test]
    fn missing_still_image_is_an_acquisition_error() {
        let err = StillImageSource::open(Path::new("/nonexistent/frame.png"), 32).unwrap_err();
        assert!(matches!(err, AcquisitionError::Io(_)));
    }
}
