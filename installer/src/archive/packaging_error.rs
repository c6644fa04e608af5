//! Error types for archive packaging operations.

use thiserror::Error;

/// Errors arising from archive packaging operations.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// An I/O operation failed (reading source files, writing the archive).
    #[error("I/O error during packaging: {0}")]
    Io(#[from] std::io::Error),

    /// The zip writer reported a failure.
    #[error("zip error during packaging: {0}")]
    Zip(#[from] zip::result::ZipError),
}
