//! Decoder error types.

use thiserror::Error;

/// Result type for decode operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors raised while decoding a capture.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Bad magic in both byte orders, or a header cut short.
    #[error("invalid capture format: {0}")]
    InvalidFormat(String),

    /// Header version is not the supported one.
    #[error("unsupported capture version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// Input ended inside a record.
    ///
    /// The loader treats this as the end of the capture.
    #[error("input truncated at offset {offset}: {needed} more bytes needed")]
    Truncated { offset: usize, needed: usize },

    /// Unknown tag byte; stream framing is lost.
    #[error("unknown token type {tag} at offset {offset}")]
    UnknownTokenType { tag: u8, offset: usize },

    /// The load was cancelled by the caller. No model is produced.
    #[error("load cancelled")]
    Cancelled,

    /// Invalid loader configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] netprof_core::Error),
}

impl DecodeError {
    /// Returns true if this is the cancelled outcome rather than a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DecodeError::Cancelled)
    }

    /// Returns true if the input simply ran out.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self, DecodeError::Truncated { .. })
    }
}
