// Error type for the whole crate.
// Every variant states *where* things went wrong; capture errors are recoverable,
// glue errors (window/camera) are fatal to the binary only.

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An effect id that isn't in the catalog reached the selector.
    #[error("unknown effect id: {0:?}")]
    UnknownEffect(String),

    /// Direct selection attempted while a spin owns the selector.
    #[error("effect selection is locked while a spin is running")]
    SelectionLocked,

    /// The frame source hasn't produced its first frame yet.
    #[error("frame source not ready")]
    SourceNotReady,

    #[error("no supported encoding profile")]
    NoSupportedProfile,

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("encoding failure: {0}")]
    EncodingFailure(String),

    #[error("pixel buffer {width}x{height} needs {expected} bytes, got {actual}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("image encode error: {0}")]
    ImageEncode(#[from] image::ImageError),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("window init error: {0}")]
    WindowInit(String),

    #[error("window update error: {0}")]
    WindowUpdate(String),

    #[error("camera init error: {0}")]
    CameraInit(String),

    #[error("camera frame error: {0}")]
    CameraFrame(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::EncodingFailure(msg.into())
    }

    /// Errors a session survives; everything else ends the binary.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Error::WindowInit(_) | Error::WindowUpdate(_) | Error::CameraInit(_)
        )
    }
}
