//! Registry recipes: dependencies resolved through a binary-package registry.

use super::document::RawRegistryRecipeSet;
use super::error::{ConfigError, Result};
use super::names::{PackageName, QueryName, Version, split_entry};
use crate::platform::Platform;
use std::collections::BTreeMap;

/// Registry remote used when a recipe set does not name one.
pub const DEFAULT_REMOTE: &str = "conancenter";

const ENTRY_SHAPE: &str = "name:version:query";

/// Everything needed to ask the registry for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryQuery {
    /// Dependency name.
    pub name: PackageName,
    /// Requested version.
    pub version: Version,
    /// Package filter expression passed to the registry; `None` when the
    /// named query is empty.
    pub filter: Option<String>,
    /// Registry remote to download from.
    pub remote: String,
}

impl RegistryQuery {
    /// The `name/version` reference understood by the registry.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RegistryPackage {
    name: PackageName,
    version: Version,
    query: QueryName,
}

/// A group of registry packages sharing an optional platform filter and a
/// set of named query expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRecipeSet {
    platform: Option<Platform>,
    remote: Option<String>,
    queries: BTreeMap<QueryName, String>,
    packages: Vec<RegistryPackage>,
}

impl RegistryRecipeSet {
    pub(crate) fn from_raw(raw: RawRegistryRecipeSet) -> Result<Self> {
        let queries = raw
            .queries
            .into_iter()
            .map(|(name, expr)| Ok((QueryName::try_from(name)?, expr)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        let packages = raw
            .packages
            .iter()
            .map(|entry| parse_package(entry, &queries))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            platform: raw.platform,
            remote: raw.remote,
            queries,
            packages,
        })
    }

    pub(crate) fn to_raw(&self) -> RawRegistryRecipeSet {
        RawRegistryRecipeSet {
            platform: self.platform,
            remote: self.remote.clone(),
            queries: self
                .queries
                .iter()
                .map(|(name, expr)| (name.to_string(), expr.clone()))
                .collect(),
            packages: self
                .packages
                .iter()
                .map(|p| format!("{}:{}:{}", p.name, p.version, p.query))
                .collect(),
        }
    }

    /// Whether this set applies to `platform`. Sets without a platform apply
    /// everywhere.
    #[must_use]
    pub fn matches(&self, platform: Platform) -> bool {
        self.platform.is_none_or(|p| p == platform)
    }

    /// Names of the packages in this set.
    pub fn package_names(&self) -> impl Iterator<Item = &PackageName> {
        self.packages.iter().map(|p| &p.name)
    }

    /// Build the registry query for `name`, if this set declares it.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<RegistryQuery> {
        let package = self.packages.iter().find(|p| p.name.as_str() == name)?;
        let filter = self
            .queries
            .get(&package.query)
            .filter(|expr| !expr.trim().is_empty())
            .cloned();
        Some(RegistryQuery {
            name: package.name.clone(),
            version: package.version.clone(),
            filter,
            remote: self
                .remote
                .clone()
                .unwrap_or_else(|| DEFAULT_REMOTE.to_owned()),
        })
    }
}

fn parse_package(entry: &str, queries: &BTreeMap<QueryName, String>) -> Result<RegistryPackage> {
    let parts = split_entry("registry package", entry, &[3], ENTRY_SHAPE)?;
    let [name, version, raw_query] = parts.as_slice() else {
        return Err(ConfigError::pattern("registry package", entry, ENTRY_SHAPE));
    };
    let query = QueryName::try_from(*raw_query)?;
    if !queries.contains_key(&query) {
        return Err(ConfigError::UnknownQuery {
            package: entry.to_owned(),
            query: query.to_string(),
        });
    }
    Ok(RegistryPackage {
        name: PackageName::try_from(*name)?,
        version: Version::try_from(*version)?,
        query,
    })
}
