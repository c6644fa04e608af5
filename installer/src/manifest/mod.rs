//! Dependency manifest model and parser.
//!
//! A manifest lists the dependencies a project needs and the recipes that
//! can fulfil them: prebuilt package caches, registry recipes, and
//! from-source build recipes. Documents may include other documents; the
//! merged tree is validated completely before anything else happens.
//!
//! # Sub-modules
//!
//! - [`build_recipe`] - Source build recipes and their variants.
//! - [`document`] - The on-disk schema (JSON or TOML).
//! - [`error`] - [`ConfigError`].
//! - [`names`] - Validated name and version newtypes.
//! - [`package_cache`] - Prebuilt archive caches.
//! - [`registry_recipe`] - Registry-resolved packages.

pub mod build_recipe;
pub mod document;
pub mod error;
pub mod names;
pub mod package_cache;
mod patterns;
pub mod registry_recipe;


pub use build_recipe::{BuildRecipe, BuildType, BuildVariant, InstallSelector, VariantName};
pub use document::{CacheSource, DocumentFormat};
pub use error::ConfigError;
pub use names::{BranchName, CommitId, PackageName, QueryName, RepositoryId, Version};
pub use package_cache::{CachedPackage, PackageCache};
pub use registry_recipe::{RegistryQuery, RegistryRecipeSet};

use crate::platform::Platform;
use camino::{Utf8Path, Utf8PathBuf};
use document::{RawManifest, read_document, render_document};
use error::Result;
use patterns::FieldPattern;

/// Deepest include nesting accepted; the root document is depth 0.
pub const MAX_INCLUDE_DEPTH: usize = 8;

/// The validated, include-merged dependency manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyManifest {
    dependencies: Vec<PackageName>,
    package_caches: Vec<PackageCache>,
    registry_recipes: Vec<RegistryRecipeSet>,
    build_recipes: Vec<BuildRecipe>,
}

impl DependencyManifest {
    /// Parse and validate the manifest at `path` and everything it includes.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for unreadable or malformed documents,
    /// pattern violations, absolute includes, or includes nested deeper
    /// than [`MAX_INCLUDE_DEPTH`].
    pub fn parse(path: &Utf8Path) -> Result<Self> {
        let mut manifest = Self::parse_at_depth(path, 0)?;
        manifest.dependencies.sort();
        manifest.dependencies.dedup();
        tracing::debug!(
            "loaded manifest {path}: {} dependencies, {} caches, {} registry sets, {} build recipes",
            manifest.dependencies.len(),
            manifest.package_caches.len(),
            manifest.registry_recipes.len(),
            manifest.build_recipes.len()
        );
        Ok(manifest)
    }

    fn parse_at_depth(path: &Utf8Path, depth: usize) -> Result<Self> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(ConfigError::IncludeDepthExceeded {
                path: path.to_owned(),
                max: MAX_INCLUDE_DEPTH,
            });
        }
        tracing::trace!("reading manifest document {path} at depth {depth}");
        let raw = read_document(path)?;
        let base_dir = path.parent().map_or_else(Utf8PathBuf::new, Utf8Path::to_owned);

        FieldPattern::PackageName.check_all(
            "dependency name",
            raw.dependencies.iter().map(String::as_str),
        )?;
        let mut manifest = Self {
            dependencies: raw
                .dependencies
                .into_iter()
                .map(PackageName::try_from)
                .collect::<Result<_>>()?,
            package_caches: raw
                .package_caches
                .into_iter()
                .map(PackageCache::from_raw)
                .collect::<Result<_>>()?,
            registry_recipes: raw
                .registry_recipes
                .into_iter()
                .map(RegistryRecipeSet::from_raw)
                .collect::<Result<_>>()?,
            build_recipes: raw
                .build_recipes
                .into_iter()
                .map(|recipe| BuildRecipe::from_raw(recipe, &base_dir))
                .collect::<Result<_>>()?,
        };

        for include in &raw.includes {
            let include_path = Utf8Path::new(include);
            if include_path.is_absolute() || include.starts_with('/') {
                return Err(ConfigError::AbsoluteInclude {
                    path: path.to_owned(),
                    include: include.clone(),
                });
            }
            let included = Self::parse_at_depth(&base_dir.join(include_path), depth + 1)?;
            manifest.merge(included);
        }
        Ok(manifest)
    }

    fn merge(&mut self, other: Self) {
        self.dependencies.extend(other.dependencies);
        self.package_caches.extend(other.package_caches);
        self.registry_recipes.extend(other.registry_recipes);
        self.build_recipes.extend(other.build_recipes);
    }

    /// Required dependency names, sorted and unique.
    #[must_use]
    pub fn dependencies(&self) -> &[PackageName] {
        &self.dependencies
    }

    /// Declared package caches, in document order.
    #[must_use]
    pub fn package_caches(&self) -> &[PackageCache] {
        &self.package_caches
    }

    /// Declared registry recipe sets, in document order.
    #[must_use]
    pub fn registry_recipes(&self) -> &[RegistryRecipeSet] {
        &self.registry_recipes
    }

    /// Declared build recipes, in document order.
    #[must_use]
    pub fn build_recipes(&self) -> &[BuildRecipe] {
        &self.build_recipes
    }

    /// First cache for `platform` that pins `name`.
    #[must_use]
    pub fn find_cached_package(
        &self,
        name: &str,
        platform: Platform,
    ) -> Option<(&PackageCache, &CachedPackage)> {
        self.package_caches
            .iter()
            .filter(|cache| cache.platform() == platform)
            .find_map(|cache| cache.find(name).map(|package| (cache, package)))
    }

    /// Registry query for `name` from the first matching recipe set.
    #[must_use]
    pub fn find_registry_query(&self, name: &str, platform: Platform) -> Option<RegistryQuery> {
        self.registry_recipes
            .iter()
            .filter(|set| set.matches(platform))
            .find_map(|set| set.find(name))
    }

    /// First build recipe for `name` with at least one variant for `platform`.
    #[must_use]
    pub fn find_build_recipe(&self, name: &str, platform: Platform) -> Option<&BuildRecipe> {
        self.build_recipes.iter().find(|recipe| {
            recipe.name().as_str() == name && !recipe.variants_for(platform).is_empty()
        })
    }

    /// Names that can be fetched from a cache on `platform`.
    #[must_use]
    pub fn downloadable_packages(&self, platform: Platform) -> Vec<PackageName> {
        let names = self
            .package_caches
            .iter()
            .filter(|cache| cache.platform() == platform)
            .flat_map(|cache| cache.packages().iter().map(|p| p.name.clone()));
        sorted_unique(names)
    }

    /// Names that can be built on `platform`, from a registry or from source.
    #[must_use]
    pub fn buildable_packages(&self, platform: Platform) -> Vec<PackageName> {
        let registry = self
            .registry_recipes
            .iter()
            .filter(|set| set.matches(platform))
            .flat_map(|set| set.package_names().cloned());
        let source = self
            .build_recipes
            .iter()
            .filter(|recipe| !recipe.variants_for(platform).is_empty())
            .map(|recipe| recipe.name().clone());
        sorted_unique(registry.chain(source))
    }

    /// Serialize the merged manifest as a single document without includes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if rendering fails.
    pub fn render(&self, format: DocumentFormat) -> Result<String> {
        render_document(&self.to_raw(), format)
    }

    /// Serialize the merged manifest to `path`, choosing the format from the
    /// extension.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for unsupported extensions, serialization
    /// failures, or write failures.
    pub fn write_to(&self, path: &Utf8Path) -> Result<()> {
        let text = self.render(DocumentFormat::from_path(path)?)?;
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_owned(),
            source,
        })
    }

    fn to_raw(&self) -> RawManifest {
        RawManifest {
            dependencies: self.dependencies.iter().map(ToString::to_string).collect(),
            includes: Vec::new(),
            package_caches: self.package_caches.iter().map(PackageCache::to_raw).collect(),
            registry_recipes: self
                .registry_recipes
                .iter()
                .map(RegistryRecipeSet::to_raw)
                .collect(),
            build_recipes: self.build_recipes.iter().map(BuildRecipe::to_raw).collect(),
        }
    }
}

fn sorted_unique(iter: impl Iterator<Item = PackageName>) -> Vec<PackageName> {
    let mut names: Vec<PackageName> = iter.collect();
    names.sort();
    names.dedup();
    names
}
