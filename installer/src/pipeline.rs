//! Fulfillment planning and execution for the download, build, and package
//! actions.
//!
//! Every selected dependency is mapped to exactly one fulfillment strategy
//! before anything touches the filesystem or network. Dependencies without a
//! strategy for the requested action are reported together in a single
//! [`InstallerError::PackageUnavailable`]. The plan then runs sequentially,
//! in selection order, into the target directory while holding the target's
//! lock.

use crate::archive::download::ArchiveDownloader;
use crate::archive::extraction::ArchiveExtractor;
use crate::archive::packaging::package_directory;
use crate::build::{BuildOptions, SourceBuilder};
use crate::cache::{CacheFetchConfig, fetch_cached_package};
use crate::error::{Action, InstallerError, Result};
use crate::manifest::package_cache::archive_file_name;
use crate::manifest::{
    BuildRecipe, CachedPackage, DependencyManifest, PackageCache, PackageName, RegistryQuery,
    Version,
};
use crate::output::write_stderr_line;
use crate::platform::Platform;
use crate::process::CommandExecutor;
use crate::registry::{ConanClient, RegistryClient, resolve_and_install};
use crate::stager::{Stager, prepare_dir};
use camino::Utf8Path;
use std::io::Write;

/// How one dependency will be fulfilled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fulfillment<'m> {
    /// Download a pinned archive from a package cache.
    Cache {
        /// The cache holding the archive.
        cache: &'m PackageCache,
        /// The pinned archive.
        package: &'m CachedPackage,
    },
    /// Resolve through the binary-package registry.
    Registry(RegistryQuery),
    /// Build from source.
    Source(&'m BuildRecipe),
}

impl Fulfillment<'_> {
    /// Short name of the strategy for progress output.
    #[must_use]
    pub const fn strategy(&self) -> &'static str {
        match self {
            Self::Cache { .. } => "package cache",
            Self::Registry(_) => "registry",
            Self::Source(_) => "source build",
        }
    }
}

/// A selected dependency and its strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDependency<'m> {
    /// Dependency name.
    pub name: PackageName,
    /// Chosen strategy.
    pub fulfillment: Fulfillment<'m>,
}

/// The per-invocation mapping from selected dependency to strategy.
pub type FulfillmentPlan<'m> = Vec<PlannedDependency<'m>>;

/// Choose the dependencies to act on.
///
/// Explicit names are validated and kept in the order given, without
/// duplicates. With no explicit names every manifest dependency is selected.
///
/// # Errors
///
/// Returns [`InstallerError::Config`] if a requested name is malformed.
pub fn select_packages(
    manifest: &DependencyManifest,
    requested: &[String],
) -> Result<Vec<PackageName>> {
    if requested.is_empty() {
        return Ok(manifest.dependencies().to_vec());
    }
    let mut selected: Vec<PackageName> = Vec::with_capacity(requested.len());
    for requested_name in requested {
        let name = PackageName::try_from(requested_name.as_str())?;
        if !selected.contains(&name) {
            selected.push(name);
        }
    }
    Ok(selected)
}

/// Map every selected dependency to a strategy for `action` on `platform`.
///
/// Download uses package caches only. Build and package prefer a registry
/// recipe and fall back to a source recipe.
///
/// # Errors
///
/// Returns [`InstallerError::PackageUnavailable`] listing every selected
/// name that has no strategy.
pub fn plan<'m>(
    manifest: &'m DependencyManifest,
    action: Action,
    selected: &[PackageName],
    platform: Platform,
) -> Result<FulfillmentPlan<'m>> {
    let mut planned = Vec::with_capacity(selected.len());
    let mut unavailable = Vec::new();
    for name in selected {
        let fulfillment = match action {
            Action::Download => manifest
                .find_cached_package(name.as_str(), platform)
                .map(|(cache, package)| Fulfillment::Cache { cache, package }),
            Action::Build | Action::Package => manifest
                .find_registry_query(name.as_str(), platform)
                .map(Fulfillment::Registry)
                .or_else(|| {
                    manifest
                        .find_build_recipe(name.as_str(), platform)
                        .map(Fulfillment::Source)
                }),
        };
        match fulfillment {
            Some(strategy) => planned.push(PlannedDependency {
                name: name.clone(),
                fulfillment: strategy,
            }),
            None => unavailable.push(name.clone()),
        }
    }
    if unavailable.is_empty() {
        Ok(planned)
    } else {
        Err(InstallerError::PackageUnavailable {
            action,
            names: unavailable,
        })
    }
}

/// External collaborators of a pipeline run.
pub struct Collaborators<'a> {
    /// Runs git, CMake, and the registry client.
    pub executor: &'a dyn CommandExecutor,
    /// Fetches cache archives.
    pub downloader: &'a dyn ArchiveDownloader,
    /// Unpacks cache archives.
    pub extractor: &'a dyn ArchiveExtractor,
    /// Registry client; discovered through `executor` on first use when
    /// absent.
    pub registry: Option<&'a dyn RegistryClient>,
}

/// Context for one pipeline run.
#[derive(Debug)]
pub struct PipelineContext<'a> {
    /// The requested action.
    pub action: Action,
    /// Explicitly requested dependencies; empty selects the manifest's.
    pub packages: &'a [String],
    /// Directory dependencies are installed into.
    pub target_dir: &'a Utf8Path,
    /// Directory holding cache archives.
    pub package_dir: &'a Utf8Path,
    /// Per-package build directories live below this directory.
    pub build_root: &'a Utf8Path,
    /// Remove the target's subdirectories before installing.
    pub clean: bool,
    /// Suppress progress output.
    pub quiet: bool,
    /// Source build settings.
    pub build: &'a BuildOptions,
}

/// What a pipeline run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Installed dependencies and their versions, in order.
    pub installed: Vec<(PackageName, Version)>,
    /// Cache descriptors of the archives written by the package action.
    pub packaged: Vec<CachedPackage>,
}

/// Plan and execute `context.action` for the selected dependencies.
///
/// # Errors
///
/// Returns an error if selection or planning fails, if the target cannot be
/// prepared or locked, or if any dependency fails to install. Execution stops
/// at the first failing dependency.
pub fn run_pipeline(
    manifest: &DependencyManifest,
    context: &PipelineContext<'_>,
    collaborators: &Collaborators<'_>,
    stderr: &mut dyn Write,
) -> Result<PipelineReport> {
    let selected = select_packages(manifest, context.packages)?;
    let planned = plan(manifest, context.action, &selected, context.build.platform)?;

    let stager = Stager::new(context.target_dir.to_owned());
    let _lock = stager.lock()?;
    stager.prepare(context.clean)?;

    let mut discovered: Option<ConanClient<'_>> = None;
    let mut report = PipelineReport::default();
    for dependency in &planned {
        // Cache fetches report their own progress.
        if !context.quiet && context.action != Action::Download {
            write_stderr_line(
                stderr,
                format!(
                    "{} {} ({})",
                    title(context.action),
                    dependency.name,
                    dependency.fulfillment.strategy()
                ),
            );
        }
        let build_dir = context.build_root.join(dependency.name.as_str());
        let version = match context.action {
            Action::Download | Action::Build => fulfill(
                dependency,
                context.target_dir,
                &build_dir,
                context,
                collaborators,
                &mut discovered,
                stderr,
            )?,
            Action::Package => {
                let package_root = build_dir.join("package");
                prepare_dir(&package_root, true)?;
                let version = fulfill(
                    dependency,
                    &package_root,
                    &build_dir,
                    context,
                    collaborators,
                    &mut discovered,
                    stderr,
                )?;
                let archive = context
                    .target_dir
                    .join(archive_file_name(&dependency.name, &version));
                let packed = package_directory(&package_root, &archive)?;
                tracing::debug!("packed {} files into {archive}", packed.file_count);
                report.packaged.push(CachedPackage {
                    name: dependency.name.clone(),
                    version: version.clone(),
                    digest: packed.digest,
                });
                version
            }
        };
        report.installed.push((dependency.name.clone(), version));
    }
    Ok(report)
}

const fn title(action: Action) -> &'static str {
    match action {
        Action::Download => "Downloading",
        Action::Build => "Building",
        Action::Package => "Packaging",
    }
}

fn fulfill<'a>(
    dependency: &PlannedDependency<'_>,
    target_dir: &Utf8Path,
    build_dir: &Utf8Path,
    context: &PipelineContext<'_>,
    collaborators: &Collaborators<'a>,
    discovered: &mut Option<ConanClient<'a>>,
    stderr: &mut dyn Write,
) -> Result<Version> {
    match &dependency.fulfillment {
        Fulfillment::Cache { cache, package } => {
            let config = CacheFetchConfig {
                target_dir,
                package_dir: context.package_dir,
                quiet: context.quiet,
            };
            fetch_cached_package(
                cache,
                package,
                &config,
                collaborators.downloader,
                collaborators.extractor,
                stderr,
            )?;
            Ok(package.version.clone())
        }
        Fulfillment::Registry(query) => {
            let client: &dyn RegistryClient = match collaborators.registry {
                Some(client) => client,
                None => {
                    if discovered.is_none() {
                        *discovered = Some(ConanClient::discover(collaborators.executor)?);
                    }
                    discovered
                        .as_ref()
                        .ok_or_else(|| InstallerError::ToolchainNotFound {
                            reason: "registry client unavailable".to_owned(),
                        })?
                }
            };
            resolve_and_install(query, target_dir, client)
        }
        Fulfillment::Source(recipe) => {
            SourceBuilder::new(collaborators.executor, context.build).build(
                recipe,
                target_dir,
                build_dir,
            )
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
