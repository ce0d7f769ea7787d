//! Error types for netprof-core.

use thiserror::Error;

/// Result type alias for netprof-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for table lookups and token selection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Connection index not present in the address table.
    #[error("invalid address index: {0}")]
    InvalidAddressIndex(u32),

    /// Actor name could not be resolved to a class name.
    #[error("cannot derive class name for actor name index {index}")]
    ClassNameDerivationFailed { index: u32 },

    /// Frame or token index out of bounds.
    #[error("no token {token} in frame {frame}")]
    InvalidTokenRef { frame: usize, token: usize },
}
