//! Build recipes: dependencies built from source with CMake.
//!
//! A recipe pins a repository at a branch and commit, optionally patches the
//! checkout, and describes one or more build variants. Recipe-level options
//! and install-files form the default `:release:` variant; named variants
//! inherit the default options and override individual keys.

use super::document::{RawBuildRecipe, RawVariant};
use super::error::{ConfigError, Result};
use super::names::{BranchName, CommitId, PackageName, RepositoryId, Version, split_entry};
use super::patterns::FieldPattern;
use crate::platform::Platform;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

/// Name of the variant described by the recipe-level fields.
pub const DEFAULT_VARIANT: &str = ":release:";

/// CMake build configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuildType {
    /// Unoptimized build with debug information.
    Debug,
    /// Optimized build.
    Release,
}

impl BuildType {
    /// Lowercase name as used in variant names and directory names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    /// Capitalized name passed to CMake as `CMAKE_BUILD_TYPE` and `--config`.
    #[must_use]
    pub const fn cmake_name(self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Release => "Release",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `platform?:build-type:suffix?` variant name.
///
/// # Examples
///
/// ```
/// use deps_installer::manifest::{BuildType, VariantName};
/// use deps_installer::platform::Platform;
///
/// let name = VariantName::parse("windows:debug:static").unwrap();
/// assert_eq!(name.platform, Some(Platform::Windows));
/// assert_eq!(name.build_type, BuildType::Debug);
/// assert_eq!(name.dir_suffix(), "debug_static");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantName {
    /// Platform filter; `None` builds everywhere.
    pub platform: Option<Platform>,
    /// Build configuration.
    pub build_type: BuildType,
    /// Optional suffix distinguishing variants with the same build type.
    pub suffix: Option<String>,
}

impl VariantName {
    /// Parse a variant name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Pattern`] if `name` is malformed.
    pub fn parse(name: &str) -> Result<Self> {
        FieldPattern::VariantName.check("build variant", name)?;
        let mut parts = name.split(':');
        let platform = parts.next().and_then(Platform::from_name);
        let build_type = match parts.next() {
            Some("debug") => BuildType::Debug,
            _ => BuildType::Release,
        };
        let suffix = parts
            .next()
            .filter(|suffix| !suffix.is_empty())
            .map(str::to_owned);
        Ok(Self {
            platform,
            build_type,
            suffix,
        })
    }

    /// Whether this variant is built on `platform`.
    #[must_use]
    pub fn matches(&self, platform: Platform) -> bool {
        self.platform.is_none_or(|p| p == platform)
    }

    /// Directory suffix: the build type, plus `_<suffix>` when present.
    #[must_use]
    pub fn dir_suffix(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!("{}_{suffix}", self.build_type),
            None => self.build_type.to_string(),
        }
    }
}

impl fmt::Display for VariantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.platform.map_or("", Platform::as_str),
            self.build_type,
            self.suffix.as_deref().unwrap_or_default()
        )
    }
}

/// Selects files from an install tree for copying into the target.
#[derive(Debug, Clone)]
pub enum InstallSelector {
    /// Copy every file whose `/`-separated relative path fully matches.
    Pattern {
        /// The selector as written.
        source: String,
        /// Anchored compiled expression.
        regex: Regex,
    },
    /// Copy one file to a new relative path.
    Rename {
        /// Relative path inside the install tree.
        from: String,
        /// Relative path inside the target.
        to: String,
    },
}

impl InstallSelector {
    /// Parse a selector: `old:new` is a rename pair, anything else a regex.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSelector`] for an invalid expression or
    /// a rename pair with an empty side.
    pub fn parse(package: &str, selector: &str) -> Result<Self> {
        let invalid = |reason: String| ConfigError::InvalidSelector {
            package: package.to_owned(),
            selector: selector.to_owned(),
            reason,
        };
        if let Some((from, to)) = selector.split_once(':') {
            if from.is_empty() || to.is_empty() {
                return Err(invalid("rename pairs need both paths".to_owned()));
            }
            return Ok(Self::Rename {
                from: from.to_owned(),
                to: to.to_owned(),
            });
        }
        let regex = Regex::new(&format!("^(?:{selector})$")).map_err(|e| invalid(e.to_string()))?;
        Ok(Self::Pattern {
            source: selector.to_owned(),
            regex,
        })
    }

    /// The selector as written in the manifest.
    #[must_use]
    pub fn as_written(&self) -> String {
        match self {
            Self::Pattern { source, .. } => source.clone(),
            Self::Rename { from, to } => format!("{from}:{to}"),
        }
    }
}

impl PartialEq for InstallSelector {
    fn eq(&self, other: &Self) -> bool {
        self.as_written() == other.as_written()
    }
}

impl Eq for InstallSelector {}

/// One platform/configuration-specific build of a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVariant {
    name: VariantName,
    options: BTreeMap<String, String>,
    overrides: BTreeMap<String, String>,
    install: Vec<InstallSelector>,
}

impl BuildVariant {
    /// The parsed variant name.
    #[must_use]
    pub const fn name(&self) -> &VariantName {
        &self.name
    }

    /// Effective CMake options: the default variant's options with this
    /// variant's overrides applied.
    #[must_use]
    pub const fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Install selectors; never empty.
    #[must_use]
    pub fn install_selectors(&self) -> &[InstallSelector] {
        &self.install
    }

    /// Build directory name, e.g. `build_release_static`.
    #[must_use]
    pub fn build_dir_name(&self) -> String {
        format!("build_{}", self.name.dir_suffix())
    }

    /// Install directory name, e.g. `install_release_static`.
    #[must_use]
    pub fn install_dir_name(&self) -> String {
        format!("install_{}", self.name.dir_suffix())
    }

    fn to_raw(&self) -> RawVariant {
        RawVariant {
            options: self.overrides.clone(),
            install_files: self.install.iter().map(InstallSelector::as_written).collect(),
        }
    }
}

/// A recipe for building a dependency from source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecipe {
    name: PackageName,
    version: Version,
    repository: RepositoryId,
    branch: BranchName,
    commit: CommitId,
    patches: Vec<Utf8PathBuf>,
    declared_patches: Vec<String>,
    after_checkout: Vec<String>,
    default_variant: BuildVariant,
    default_install_declared: bool,
    variants: Vec<BuildVariant>,
}

impl BuildRecipe {
    /// Validate a raw recipe declared in a document located in `base_dir`.
    pub(crate) fn from_raw(raw: RawBuildRecipe, base_dir: &Utf8Path) -> Result<Self> {
        let parts = split_entry("build recipe package", &raw.package, &[2], "name:version")?;
        let [raw_name, raw_version] = parts.as_slice() else {
            return Err(ConfigError::pattern(
                "build recipe package",
                &raw.package,
                "name:version",
            ));
        };
        let name = PackageName::try_from(*raw_name)?;
        let version = Version::try_from(*raw_version)?;

        if !raw.variants.is_empty() && !raw.install_files.is_empty() {
            return Err(ConfigError::AmbiguousDefaultInstall {
                package: name.to_string(),
            });
        }

        let default_install_declared = !raw.install_files.is_empty();
        let default_variant = BuildVariant {
            name: VariantName::parse(DEFAULT_VARIANT)?,
            options: raw.options.clone(),
            overrides: raw.options,
            install: parse_selectors(&name, &raw.install_files)?,
        };

        let variants = raw
            .variants
            .into_iter()
            .map(|(variant, body)| named_variant(&name, &default_variant, &variant, body))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            repository: RepositoryId::try_from(raw.repository)?,
            branch: BranchName::try_from(raw.branch)?,
            commit: CommitId::try_from(raw.commit)?,
            patches: raw.patches.iter().map(|p| base_dir.join(p)).collect(),
            declared_patches: raw.patches,
            after_checkout: raw.after_checkout_commands,
            name,
            version,
            default_variant,
            default_install_declared,
            variants,
        })
    }

    pub(crate) fn to_raw(&self) -> RawBuildRecipe {
        let default = self.default_variant.to_raw();
        RawBuildRecipe {
            package: format!("{}:{}", self.name, self.version),
            repository: self.repository.to_string(),
            branch: self.branch.to_string(),
            commit: self.commit.to_string(),
            patches: self.declared_patches.clone(),
            after_checkout_commands: self.after_checkout.clone(),
            options: default.options,
            install_files: if self.default_install_declared {
                default.install_files
            } else {
                Vec::new()
            },
            variants: self
                .variants
                .iter()
                .map(|v| (v.name.to_string(), v.to_raw()))
                .collect(),
        }
    }

    /// Dependency name.
    #[must_use]
    pub const fn name(&self) -> &PackageName {
        &self.name
    }

    /// Pinned version.
    #[must_use]
    pub const fn version(&self) -> &Version {
        &self.version
    }

    /// Source repository.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryId {
        &self.repository
    }

    /// Branch to check out.
    #[must_use]
    pub const fn branch(&self) -> &BranchName {
        &self.branch
    }

    /// Commit the checkout is pinned to.
    #[must_use]
    pub const fn commit(&self) -> &CommitId {
        &self.commit
    }

    /// Patch files, resolved against the declaring document's directory.
    #[must_use]
    pub fn patches(&self) -> &[Utf8PathBuf] {
        &self.patches
    }

    /// Shell commands run in the checkout after patching.
    #[must_use]
    pub fn after_checkout_commands(&self) -> &[String] {
        &self.after_checkout
    }

    /// The default variant built when no named variants are declared.
    #[must_use]
    pub const fn default_variant(&self) -> &BuildVariant {
        &self.default_variant
    }

    /// Variants built on `platform`: the named variants whose filter
    /// matches, or the default variant when none are declared.
    #[must_use]
    pub fn variants_for(&self, platform: Platform) -> Vec<&BuildVariant> {
        if self.variants.is_empty() {
            return vec![&self.default_variant];
        }
        self.variants
            .iter()
            .filter(|v| v.name.matches(platform))
            .collect()
    }
}

fn named_variant(
    package: &PackageName,
    default: &BuildVariant,
    variant: &str,
    body: RawVariant,
) -> Result<BuildVariant> {
    let name = VariantName::parse(variant)?;
    if body.install_files.is_empty() {
        return Err(ConfigError::VariantWithoutInstallFiles {
            package: package.to_string(),
            variant: variant.to_owned(),
        });
    }
    let mut options = default.options.clone();
    options.extend(body.options.clone());
    Ok(BuildVariant {
        name,
        options,
        overrides: body.options,
        install: parse_selectors(package, &body.install_files)?,
    })
}

fn parse_selectors(package: &PackageName, selectors: &[String]) -> Result<Vec<InstallSelector>> {
    if selectors.is_empty() {
        return Ok(vec![InstallSelector::parse(package.as_str(), ".*")?]);
    }
    selectors
        .iter()
        .map(|selector| InstallSelector::parse(package.as_str(), selector))
        .collect()
}
