//! Error types for the dependency installer.
//!
//! This module defines the semantic error variants surfaced to users when
//! resolving, fetching, or building dependencies fails. Module-specific
//! errors (manifest, download, extraction, packaging) are wrapped so callers
//! can still match on the underlying cause.

use crate::archive::download::DownloadError;
use crate::archive::extraction::ExtractionError;
use crate::archive::packaging_error::PackagingError;
use crate::build::BuildStage;
use crate::manifest::{ConfigError, PackageName};
use camino::Utf8PathBuf;
use std::fmt;
use thiserror::Error;

/// The action a dependency was requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Fetch prebuilt archives from package caches.
    Download,
    /// Build from a registry recipe or from source.
    Build,
    /// Build and re-archive for publication to a cache.
    Package,
}

impl Action {
    /// Lowercase name of the action as used on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Build => "build",
            Self::Package => "package",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while installing dependencies.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The manifest is malformed or violates a constraint.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// One or more requested dependencies have no fulfillment for the action.
    #[error("cannot {action} {}: no matching recipe for this platform", join_names(.names))]
    PackageUnavailable {
        /// The action that was requested.
        action: Action,
        /// Every dependency without a fulfillment, in request order.
        names: Vec<PackageName>,
    },

    /// A downloaded archive does not match its pinned digest.
    #[error("integrity check failed for {package} ({path}): expected {expected}, got {actual}")]
    Integrity {
        /// Package whose archive was rejected.
        package: PackageName,
        /// Archive that was checked.
        path: Utf8PathBuf,
        /// Digest pinned in the manifest.
        expected: String,
        /// Digest of the downloaded bytes.
        actual: String,
    },

    /// A required external tool or toolchain could not be located.
    #[error("toolchain not found: {reason}")]
    ToolchainNotFound {
        /// Description of what is missing.
        reason: String,
    },

    /// A from-source build stage failed.
    #[error("{stage} failed for {package}{}: {message}", format_status(.status))]
    SourceBuild {
        /// Package being built.
        package: PackageName,
        /// Stage that failed.
        stage: BuildStage,
        /// Exit status of the failing command, if it ran to completion.
        status: Option<i32>,
        /// Captured diagnostic output.
        message: String,
    },

    /// Configuring the current project with CMake failed.
    #[error("configuring {source_dir} failed{}: {message}", format_status(.status))]
    Configure {
        /// Project source directory.
        source_dir: Utf8PathBuf,
        /// Exit status of CMake, if it ran to completion.
        status: Option<i32>,
        /// Captured diagnostic output.
        message: String,
    },

    /// An external command exceeded its timeout and was killed.
    #[error("{command} timed out after {seconds} seconds")]
    CommandTimeout {
        /// The command line that was killed.
        command: String,
        /// The timeout that elapsed.
        seconds: u64,
    },

    /// The registry client reported a failure.
    #[error("registry {operation} failed for {package}: {message}")]
    Registry {
        /// Package being resolved.
        package: String,
        /// Registry operation (`list`, `download`, `cache path`).
        operation: &'static str,
        /// Captured diagnostic output.
        message: String,
    },

    /// Downloading a cached archive failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Unpacking an archive failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Creating an archive failed.
    #[error(transparent)]
    Packaging(#[from] PackagingError),

    /// Another invocation holds the target directory lock.
    #[error("target directory {path} is locked by another installer run")]
    TargetLocked {
        /// The locked directory.
        path: Utf8PathBuf,
    },

    /// The target directory exists but is not writable.
    #[error("target directory {path} is not writable: {reason}")]
    TargetNotWritable {
        /// Path to the non-writable directory.
        path: Utf8PathBuf,
        /// Description of the underlying I/O error.
        reason: String,
    },

    /// Copying files into a target directory failed.
    #[error("staging failed: {reason}")]
    StagingFailed {
        /// Description of the staging failure.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

fn join_names(names: &[PackageName]) -> String {
    names
        .iter()
        .map(PackageName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_status(status: &Option<i32>) -> String {
    status.map_or_else(String::new, |code| format!(" (exit status {code})"))
}

/// Result type for installer operations.
pub type Result<T> = std::result::Result<T, InstallerError>;
