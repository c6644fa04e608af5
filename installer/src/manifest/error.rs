//! Error types for manifest loading and validation.
//!
//! Every structural or semantic problem in a manifest document is reported
//! through [`ConfigError`] before any network, registry, or build action runs.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while reading, validating, or writing a dependency manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The manifest file could not be read.
    #[error("failed to read manifest {path}")]
    Read {
        /// Path of the unreadable document.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed or does not match the schema.
    #[error("invalid manifest {path}: {reason}")]
    Parse {
        /// Path of the malformed document.
        path: Utf8PathBuf,
        /// Deserializer message, including the offending key where known.
        reason: String,
    },

    /// The document extension is neither `.json` nor `.toml`.
    #[error("unsupported manifest format for {path}; expected a .json or .toml file")]
    UnsupportedFormat {
        /// Path with the unrecognized extension.
        path: Utf8PathBuf,
    },

    /// One or more values do not match the field's pattern.
    #[error("invalid {title} {}; expected {pattern}", .values.join(", "))]
    Pattern {
        /// Human-readable name of the field.
        title: &'static str,
        /// The rejected values.
        values: Vec<String>,
        /// The pattern the values must match.
        pattern: &'static str,
    },

    /// A URL is missing an http(s) scheme or a host.
    #[error("invalid {title} URL {url}: {reason}")]
    InvalidUrl {
        /// Human-readable name of the field.
        title: &'static str,
        /// The rejected URL.
        url: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// An include entry is an absolute path.
    #[error("include {include} in {path} must be a relative path")]
    AbsoluteInclude {
        /// Document containing the include.
        path: Utf8PathBuf,
        /// The include entry as written.
        include: String,
    },

    /// Includes are nested deeper than the supported maximum.
    #[error("include depth exceeds {max} at {path}; check for include cycles")]
    IncludeDepthExceeded {
        /// Document that would exceed the depth.
        path: Utf8PathBuf,
        /// Maximum supported depth.
        max: usize,
    },

    /// A registry package references a query name that is not declared.
    #[error("registry package {package} references undeclared query {query}")]
    UnknownQuery {
        /// Package entry that references the query.
        package: String,
        /// Missing query name.
        query: String,
    },

    /// Default install-files are declared next to named build variants.
    #[error("build recipe {package} declares default install-files alongside named variants")]
    AmbiguousDefaultInstall {
        /// Recipe package name.
        package: String,
    },

    /// A named build variant declares no install selectors.
    #[error("variant {variant} of build recipe {package} must declare install-files")]
    VariantWithoutInstallFiles {
        /// Recipe package name.
        package: String,
        /// Variant name as written.
        variant: String,
    },

    /// An install selector is not a valid regular expression or rename pair.
    #[error("invalid install selector {selector:?} in build recipe {package}: {reason}")]
    InvalidSelector {
        /// Recipe package name.
        package: String,
        /// Selector as written.
        selector: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The manifest could not be serialized.
    #[error("failed to serialize manifest: {reason}")]
    Serialize {
        /// Serializer message.
        reason: String,
    },

    /// The serialized manifest could not be written.
    #[error("failed to write manifest {path}")]
    Write {
        /// Destination path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Build a [`ConfigError::Pattern`] for a single rejected value.
    pub(crate) fn pattern(title: &'static str, value: &str, pattern: &'static str) -> Self {
        Self::Pattern {
            title,
            values: vec![value.to_owned()],
            pattern,
        }
    }
}

/// Result type for manifest operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
