//! Error types for FrameForge.

use thiserror::Error;

/// Main error type for FrameForge operations.
#[derive(Error, Debug)]
pub enum FrameForgeError {
    /// Encoder configuration rejected at construction time.
    #[error("Invalid encoder configuration: {0}")]
    InvalidConfig(String),

    /// Submitted frame rejected (plane size, stride, bit depth or sample range).
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// The encoder was flushed to completion or failed and accepts no more frames.
    #[error("Encoder is closed")]
    EncoderClosed,

    /// Diagnostics requested before the encoder is ready.
    #[error("Rate control statistics are unavailable")]
    Unavailable,

    /// The bitstream core failed to compress a unit. Fatal for the encoder.
    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    /// Malformed IVF data.
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    /// I/O error while writing or reading a container.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameForgeError {
    /// Whether the encoder can keep being used after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidFrame(_) | Self::Unavailable)
    }
}

/// Result type for FrameForge operations.
pub type Result<T> = std::result::Result<T, FrameForgeError>;
