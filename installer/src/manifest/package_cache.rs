//! Prebuilt package caches.

use super::document::{CacheSource, RawPackageCache};
use super::error::{ConfigError, Result};
use super::names::{PackageName, Version, split_entry};
use super::patterns::{FieldPattern, check_url};
use crate::archive::digest::TruncatedDigest;
use crate::archive::download::archive_url;
use crate::platform::Platform;
use std::fmt;

const ENTRY_SHAPE: &str = "name:version:hash";

/// A package pinned in a cache by version and truncated archive digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPackage {
    /// Dependency name.
    pub name: PackageName,
    /// Pinned version.
    pub version: Version,
    /// Truncated SHA-256 of the archive.
    pub digest: TruncatedDigest,
}

impl CachedPackage {
    /// Parse a `name:version:hash` descriptor.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError::Pattern`] naming the malformed part.
    ///
    /// # Examples
    ///
    /// ```
    /// use deps_installer::manifest::CachedPackage;
    ///
    /// let pinned = CachedPackage::parse("zlib:1.3:0123456789abcdef").unwrap();
    /// assert_eq!(pinned.archive_name(), "zlib_1.3.zip");
    /// assert_eq!(pinned.to_string(), "zlib:1.3:0123456789abcdef");
    /// ```
    pub fn parse(entry: &str) -> Result<Self> {
        let parts = split_entry("cached package", entry, &[3], ENTRY_SHAPE)?;
        let [name, version, digest] = parts.as_slice() else {
            return Err(ConfigError::pattern("cached package", entry, ENTRY_SHAPE));
        };
        FieldPattern::TruncatedHash.check("archive hash", digest)?;
        Ok(Self {
            name: PackageName::try_from(*name)?,
            version: Version::try_from(*version)?,
            digest: TruncatedDigest::try_from(*digest).map_err(|_| {
                ConfigError::pattern("archive hash", digest, FieldPattern::TruncatedHash.source())
            })?,
        })
    }

    /// File name of the archive: `<name>_<version>.zip`.
    #[must_use]
    pub fn archive_name(&self) -> String {
        archive_file_name(&self.name, &self.version)
    }
}

impl fmt::Display for CachedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.version, self.digest)
    }
}

/// File name of a package archive for `name` at `version`.
#[must_use]
pub fn archive_file_name(name: &PackageName, version: &Version) -> String {
    format!("{name}_{version}.zip")
}

/// A static HTTP location holding prebuilt archives for one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCache {
    source: CacheSource,
    platform: Platform,
    url: String,
    packages: Vec<CachedPackage>,
}

impl PackageCache {
    pub(crate) fn from_raw(raw: RawPackageCache) -> Result<Self> {
        check_url("package cache", &raw.url)?;
        let packages = raw
            .packages
            .iter()
            .map(|entry| CachedPackage::parse(entry))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            source: raw.source,
            platform: raw.platform,
            url: raw.url,
            packages,
        })
    }

    pub(crate) fn to_raw(&self) -> RawPackageCache {
        RawPackageCache {
            source: self.source,
            platform: self.platform,
            url: self.url.clone(),
            packages: self.packages.iter().map(ToString::to_string).collect(),
        }
    }

    /// Platform this cache serves.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Base URL of the cache.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Packages pinned in this cache.
    #[must_use]
    pub fn packages(&self) -> &[CachedPackage] {
        &self.packages
    }

    /// Look up a pinned package by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&CachedPackage> {
        self.packages.iter().find(|p| p.name.as_str() == name)
    }

    /// Full download URL for a pinned package.
    #[must_use]
    pub fn archive_url(&self, package: &CachedPackage) -> String {
        archive_url(&self.url, &package.archive_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn raw_cache(url: &str, packages: &[&str]) -> RawPackageCache {
        RawPackageCache {
            source: CacheSource::Custom,
            platform: Platform::Linux,
            url: url.to_owned(),
            packages: packages.iter().map(|p| (*p).to_owned()).collect(),
        }
    }

    #[test]
    fn builds_download_url_from_descriptor() {
        let cache = PackageCache::from_raw(raw_cache(
            "https://example/cache",
            &["zlib:1.3:0123456789abcdef"],
        ))
        .expect("valid cache");
        let pinned = cache.find("zlib").expect("zlib pinned");

        assert_eq!(
            cache.archive_url(pinned),
            "https://example/cache/zlib_1.3.zip"
        );
    }

    #[rstest]
    #[case::missing_hash("zlib:1.3")]
    #[case::bad_name("ZLIB:1.3:0123456789abcdef")]
    #[case::bad_version("zlib:latest:0123456789abcdef")]
    #[case::short_hash("zlib:1.3:0123")]
    #[case::uppercase_hash("zlib:1.3:0123456789ABCDEF")]
    fn rejects_malformed_descriptors(#[case] entry: &str) {
        assert!(matches!(
            CachedPackage::parse(entry),
            Err(ConfigError::Pattern { .. })
        ));
    }

    #[test]
    fn hash_errors_name_the_archive_hash_field() {
        match CachedPackage::parse("zlib:1.3:0123456789abcdeg") {
            Err(ConfigError::Pattern {
                title,
                values,
                pattern,
            }) => {
                assert_eq!(title, "archive hash");
                assert_eq!(values, vec!["0123456789abcdeg".to_owned()]);
                assert_eq!(pattern, "[a-f0-9]{16}");
            }
            other => panic!("expected a hash pattern error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_url_without_host() {
        let result = PackageCache::from_raw(raw_cache("https://", &[]));
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }
}
