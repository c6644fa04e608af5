//! List command implementation.
//!
//! Reports which manifest dependencies can be downloaded from a package cache
//! and which can be built (from a registry recipe or from source) on a given
//! platform. Output is JSON on stdout for scripting.

use crate::error::{InstallerError, Result};
use crate::manifest::{DependencyManifest, PackageName};
use crate::output::write_stdout_line;
use crate::platform::Platform;
use serde::Serialize;
use std::io::Write;

/// Which lists to print.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListFilter {
    /// Both lists in one object.
    #[default]
    All,
    /// Only the downloadable names, as an array.
    DownloadableOnly,
    /// Only the buildable names, as an array.
    BuildableOnly,
}

impl ListFilter {
    /// Filter for the `--downloadable-only` and `--buildable-only` flags.
    #[must_use]
    pub const fn from_flags(downloadable_only: bool, buildable_only: bool) -> Self {
        match (downloadable_only, buildable_only) {
            (true, false) => Self::DownloadableOnly,
            (false, true) => Self::BuildableOnly,
            _ => Self::All,
        }
    }
}

/// Available dependencies on one platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AvailablePackages {
    /// Names with a package-cache entry.
    pub downloadable: Vec<PackageName>,
    /// Names with a registry or source recipe.
    pub buildable: Vec<PackageName>,
}

impl AvailablePackages {
    /// Collect the available names from `manifest` for `platform`.
    #[must_use]
    pub fn collect(manifest: &DependencyManifest, platform: Platform) -> Self {
        Self {
            downloadable: manifest.downloadable_packages(platform),
            buildable: manifest.buildable_packages(platform),
        }
    }

    /// Render as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::StagingFailed`] if serialisation fails.
    pub fn to_json(&self, filter: ListFilter) -> Result<String> {
        let rendered = match filter {
            ListFilter::All => serde_json::to_string_pretty(self),
            ListFilter::DownloadableOnly => serde_json::to_string_pretty(&self.downloadable),
            ListFilter::BuildableOnly => serde_json::to_string_pretty(&self.buildable),
        };
        rendered.map_err(|e| InstallerError::StagingFailed {
            reason: format!("cannot render package list: {e}"),
        })
    }
}

/// Print the dependencies of `manifest` available on `platform`.
///
/// # Errors
///
/// Returns an error if the JSON cannot be rendered or stdout cannot be
/// written.
pub fn run_list(
    manifest: &DependencyManifest,
    platform: Platform,
    filter: ListFilter,
    stdout: &mut dyn Write,
) -> Result<()> {
    let available = AvailablePackages::collect(manifest, platform);
    tracing::debug!(
        "{} downloadable and {} buildable packages for {platform}",
        available.downloadable.len(),
        available.buildable.len()
    );
    write_stdout_line(stdout, available.to_json(filter)?)
}
