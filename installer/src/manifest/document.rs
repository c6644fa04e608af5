//! On-disk manifest schema.
//!
//! These structs mirror the document layout one-to-one and are converted to
//! the validated model in the sibling modules. Unknown keys are rejected.

use super::error::{ConfigError, Result};
use crate::platform::Platform;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a package cache's archives are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheSource {
    /// Archives attached to releases of a registry mirror.
    #[serde(alias = "github_release")]
    RegistryMirror,
    /// Archives on an arbitrary static HTTP host.
    Custom,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct RawManifest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) includes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) package_caches: Vec<RawPackageCache>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) registry_recipes: Vec<RawRegistryRecipeSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) build_recipes: Vec<RawBuildRecipe>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct RawPackageCache {
    #[serde(rename = "type")]
    pub(crate) source: CacheSource,
    pub(crate) platform: Platform,
    pub(crate) url: String,
    pub(crate) packages: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct RawRegistryRecipeSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) remote: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) queries: BTreeMap<String, String>,
    pub(crate) packages: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct RawBuildRecipe {
    pub(crate) package: String,
    pub(crate) repository: String,
    pub(crate) branch: String,
    pub(crate) commit: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) patches: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) after_checkout_commands: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) options: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) install_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "declaration_order")]
    pub(crate) variants: Vec<(String, RawVariant)>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub(crate) struct RawVariant {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub(crate) options: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) install_files: Vec<String>,
}

/// A map field kept as `(key, value)` pairs in the order the document
/// declares them. Duplicate keys are rejected.
mod declaration_order {
    use serde::de::{Deserialize, Deserializer, Error, MapAccess, Visitor};
    use serde::ser::{Serialize, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    pub(crate) fn serialize<S, V>(entries: &[(String, V)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_map(entries.iter().map(|(key, value)| (key, value)))
    }

    pub(crate) fn deserialize<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }

    struct EntriesVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries: Vec<(String, V)> = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, V>()? {
                if entries.iter().any(|(seen, _)| *seen == key) {
                    return Err(A::Error::custom(format!("duplicate key `{key}`")));
                }
                entries.push((key, value));
            }
            Ok(entries)
        }
    }
}

/// Serialization format of a manifest document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.json` documents.
    Json,
    /// `.toml` documents.
    Toml,
}

impl DocumentFormat {
    /// Pick the format from the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedFormat`] for any other extension.
    pub fn from_path(path: &Utf8Path) -> Result<Self> {
        match path.extension() {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat {
                path: path.to_owned(),
            }),
        }
    }
}

pub(crate) fn read_document(path: &Utf8Path) -> Result<RawManifest> {
    let format = DocumentFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    let parsed = match format {
        DocumentFormat::Json => serde_json::from_str(&text).map_err(|e| e.to_string()),
        DocumentFormat::Toml => toml::from_str(&text).map_err(|e| e.to_string()),
    };
    parsed.map_err(|reason| ConfigError::Parse {
        path: path.to_owned(),
        reason,
    })
}

pub(crate) fn render_document(raw: &RawManifest, format: DocumentFormat) -> Result<String> {
    let rendered = match format {
        DocumentFormat::Json => serde_json::to_string_pretty(raw).map_err(|e| e.to_string()),
        DocumentFormat::Toml => toml::to_string_pretty(raw).map_err(|e| e.to_string()),
    };
    rendered.map_err(|reason| ConfigError::Serialize { reason })
}
