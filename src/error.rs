use thiserror::Error;

/// Failure to obtain a frame source. Terminal for the session attempt.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The user (or platform policy) refused access to the device.
    #[error("camera permission denied")]
    PermissionDenied,

    /// No usable device, or the configured source cannot be opened.
    #[error("video device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Underlying IO error while opening a file-backed source.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The file-backed source could not be decoded.
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// A source failed after it was acquired. Sampling halts for that source.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("video source stopped producing frames: {0}")]
    Stream(String),

    #[error("frame buffer size {actual} does not match {width}x{height} RGBA")]
    BadFrameSize {
        width: u32,
        height: u32,
        actual: usize,
    },
}

/// A message arrived at the render worker outside the protocol.
///
/// The worker drops the offending message and keeps going; this never travels
/// back over the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("draw received before a surface was transferred")]
    NotInitialized,

    #[error("draw received while a previous draw is still in progress")]
    Busy,

    #[error("surface transferred more than once")]
    SurfaceAlreadySet,
}
