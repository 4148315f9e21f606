use crate::error::DecodeError;
use crate::render::surface::Surface;

/// One sampled frame: row-major RGBA8, top to bottom.
///
/// Built fresh for every dispatch and moved into the [`DrawRequest`]; nothing
/// writes to it after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DecodeError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(DecodeError::BadFrameSize {
                width,
                height,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// RGB of the pixel at `(x, y)`, or `None` outside the frame.
    #[must_use]
    pub fn rgb_at(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]])
    }
}

/// The only payload the coordinator ever sends to the worker after setup.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRequest {
    pub pixels: PixelBuffer,
    pub cell_size: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// Worker -> coordinator: the surface is idle again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadySignal;

/// Coordinator -> worker.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Hands the drawable surface over. Sent exactly once, first.
    InitSurface(Surface),
    Draw(DrawRequest),
}

/// Events produced by the input surface. Pan deltas are in display units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Pan { dx: f32, dy: f32 },
    /// Drag of the minimap rectangle, in minimap units.
    InsetDrag { dx: f32, dy: f32 },
    SetContrast(f32),
    SetBrightness(f32),
    SetCellSize(f32),
}

/// Ready signals counted over one frame-rate window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate(pub u32);
