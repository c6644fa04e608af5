//! Cached package archives: digests, download, extraction, and packaging.
//!
//! # Sub-modules
//!
//! - [`digest`] - Truncated SHA-256 newtype (`TruncatedDigest`) and hashing.
//! - [`download`] - Archive download trait and HTTP implementation.
//! - [`error`] - Validation errors for archive values.
//! - [`extraction`] - Zip extraction with path traversal protection.
//! - [`packaging`] - Reproducible zip creation for cache publication.
//! - [`packaging_error`] - Error types for packaging operations.

pub mod digest;
pub mod download;
pub mod error;
pub mod extraction;
pub mod packaging;
pub mod packaging_error;
