//! Error types for archive value validation.

use thiserror::Error;

/// Errors arising from invalid archive-related values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveError {
    /// A truncated SHA-256 digest is not 16 lowercase hex characters.
    #[error("invalid truncated digest \"{value}\": {reason}")]
    InvalidDigest {
        /// The rejected digest string.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },
}

/// Result type alias using [`ArchiveError`].
pub type Result<T> = std::result::Result<T, ArchiveError>;
