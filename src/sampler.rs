//! Frame sampling: current source frame -> filtered [`PixelBuffer`].

use image::RgbaImage;
use tracing::debug;

use crate::error::DecodeError;
use crate::events::PixelBuffer;
use crate::processing::adjust::{FilterParams, ToneCurve};
use crate::source::VideoFrameSource;

/// Scratch state the sampler composites into. Owned by whoever owns the
/// sampler; nothing here is shared.
#[derive(Debug)]
pub struct CompositingContext {
    canvas: RgbaImage,
    curve_params: FilterParams,
    curve: ToneCurve,
}

impl Default for CompositingContext {
    fn default() -> Self {
        let params = FilterParams::default();
        Self {
            canvas: RgbaImage::new(0, 0),
            curve_params: params,
            curve: ToneCurve::new(params),
        }
    }
}

impl CompositingContext {
    fn fit(&mut self, width: u32, height: u32) {
        if self.canvas.dimensions() != (width, height) {
            debug!(width, height, "compositing canvas resized");
            self.canvas = RgbaImage::new(width, height);
        }
    }

    fn filter(&mut self, params: FilterParams) {
        if self.curve_params != params {
            self.curve = ToneCurve::new(params);
            self.curve_params = params;
        }
        self.curve.apply(&mut self.canvas);
    }
}

#[derive(Debug, Default)]
pub struct FrameSampler {
    context: CompositingContext,
}

impl FrameSampler {
    #[must_use]
    pub fn new(context: CompositingContext) -> Self {
        Self { context }
    }

    /// Samples the source at its native resolution with `params` applied.
    ///
    /// Returns `Ok(None)` while the source reports zero dimensions.
    pub fn sample(
        &mut self,
        source: &mut dyn VideoFrameSource,
        params: FilterParams,
    ) -> Result<Option<PixelBuffer>, DecodeError> {
        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            return Ok(None);
        }
        self.context.fit(width, height);
        source.draw_into(&mut self.context.canvas)?;

        if !params.is_identity() {
            self.context.filter(params);
        }
        PixelBuffer::new(width, height, self.context.canvas.as_raw().clone()).map(Some)
    }
}
