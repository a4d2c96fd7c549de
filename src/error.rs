//! Error types for vodforge.

use crate::mp4::FourCC;
use thiserror::Error;

/// Result type for vodforge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for vodforge operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid MP4 file structure.
    #[error("Invalid MP4: {0}")]
    InvalidMp4(String),

    /// Missing required box in MP4 file.
    #[error("Missing required box: {0}")]
    MissingBox(&'static str),

    /// A required box is present but its payload is malformed.
    #[error("Invalid {box_type} box: {reason}")]
    InvalidBoxData {
        /// Type of the offending box.
        box_type: FourCC,
        /// What failed the length or value check.
        reason: String,
    },

    /// A declared box payload exceeds the supported maximum.
    #[error("Declared box size {0} exceeds the supported maximum")]
    FileTooLarge(u64),

    /// Unsupported codec.
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(FourCC),

    /// Buffer too small for operation.
    #[error("Buffer underflow: need {needed} bytes, have {available}")]
    BufferUnderflow {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// Semantic violation inside the byte codec.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Create an invalid MP4 error.
    pub fn invalid_mp4(msg: impl Into<String>) -> Self {
        Self::InvalidMp4(msg.into())
    }

    /// Create an invalid box data error.
    pub fn invalid_box(box_type: FourCC, reason: impl Into<String>) -> Self {
        Self::InvalidBoxData {
            box_type,
            reason: reason.into(),
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }
}
