//! Registry-resolved dependencies.
//!
//! A registry recipe names a package, a version, and an optional filter
//! expression. Resolution lists matching binaries already in the local
//! registry cache, downloads them when the list is empty, picks the best
//! candidate, and copies its `include/`, `lib/`, and `bin/` directories into
//! the target.
//!
//! # Sub-modules
//!
//! - [`conan`] - The Conan 2 command-line client.

pub mod conan;


use crate::error::{InstallerError, Result};
use crate::manifest::{RegistryQuery, Version};
use crate::stager::copy_tree;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;

pub use conan::ConanClient;

/// Directories copied from a registry package into the target.
pub const PACKAGE_SUBDIRS: [&str; 3] = ["include", "lib", "bin"];

/// Setting used to rank candidate binaries.
pub const RANKING_SETTING: &str = "compiler.version";

/// One binary package known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryBinary {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Recipe revision the binary belongs to.
    pub revision: String,
    /// Binary package identifier.
    pub package_id: String,
    /// Settings the binary was built with.
    pub settings: BTreeMap<String, String>,
    /// Options the binary was built with.
    pub options: BTreeMap<String, String>,
}

impl RegistryBinary {
    /// `name/version:package_id` reference.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}/{}:{}", self.name, self.version, self.package_id)
    }

    fn ranking_key(&self) -> &str {
        self.settings
            .get(RANKING_SETTING)
            .map_or("", String::as_str)
    }
}

/// Operations the resolver needs from a binary-package registry.
#[cfg_attr(test, mockall::automock)]
pub trait RegistryClient {
    /// Binaries matching `query` in the local registry cache.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Registry`] if the client fails.
    fn list(&self, query: &RegistryQuery) -> Result<Vec<RegistryBinary>>;

    /// Download binaries matching `query` from the query's remote and
    /// return what was downloaded.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Registry`] if the client fails.
    fn download(&self, query: &RegistryQuery) -> Result<Vec<RegistryBinary>>;

    /// Location of `binary` in the local registry cache.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Registry`] if the client fails.
    fn cache_path(&self, binary: &RegistryBinary) -> Result<Utf8PathBuf>;
}

/// Pick the binary with the highest compiler version.
///
/// Versions compare as strings; on ties the earlier binary wins.
#[must_use]
pub fn select_best(binaries: &[RegistryBinary]) -> Option<&RegistryBinary> {
    binaries.iter().fold(None, |best, candidate| match best {
        Some(current) if candidate.ranking_key() <= current.ranking_key() => Some(current),
        _ => Some(candidate),
    })
}

/// Resolve `query` through `client` and copy the chosen binary into
/// `target_dir`. Returns the installed version.
///
/// # Errors
///
/// Returns [`InstallerError::PackageUnavailable`] when no binary matches
/// even after downloading, [`InstallerError::Registry`] for client failures,
/// and staging errors if copying fails.
pub fn resolve_and_install(
    query: &RegistryQuery,
    target_dir: &Utf8Path,
    client: &dyn RegistryClient,
) -> Result<Version> {
    let mut binaries = client.list(query)?;
    if binaries.is_empty() {
        tracing::info!("downloading {} from {}", query.reference(), query.remote);
        binaries = client.download(query)?;
    }
    let best = select_best(&binaries).ok_or_else(|| InstallerError::PackageUnavailable {
        action: crate::error::Action::Build,
        names: vec![query.name.clone()],
    })?;

    let package_dir = client.cache_path(best)?;
    tracing::info!("installing {} from {package_dir}", best.reference());
    copy_package_dirs(query.name.as_str(), &package_dir, target_dir)?;
    Ok(query.version.clone())
}

/// Copy the standard package directories from `package_dir` into
/// `target_dir`, creating each target directory even when the package has
/// none.
///
/// `freetype` keeps its headers in `include/freetype2`, which is flattened
/// into `include/`.
///
/// # Errors
///
/// Returns an error if a directory cannot be created or a copy fails.
pub fn copy_package_dirs(package: &str, package_dir: &Utf8Path, target_dir: &Utf8Path) -> Result<()> {
    for subdir in PACKAGE_SUBDIRS {
        let source = if package == "freetype" && subdir == "include" {
            package_dir.join("include/freetype2")
        } else {
            package_dir.join(subdir)
        };
        let copied = copy_tree(&source, &target_dir.join(subdir))?;
        tracing::trace!("copied {copied} files from {source}");
    }
    Ok(())
}
