//! Validated string newtypes used throughout the manifest model.
//!
//! Each type guarantees its value matches the corresponding field pattern,
//! so code receiving one never has to re-check it.

use super::error::{ConfigError, Result};
use super::patterns::FieldPattern;
use serde::Serialize;
use std::fmt;

macro_rules! validated_string {
    ($(#[$meta:meta])* $name:ident, $pattern:expr, $title:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Return the value as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ConfigError;

            fn try_from(value: &str) -> Result<Self> {
                $pattern.check($title, value)?;
                Ok(Self(value.to_owned()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = ConfigError;

            fn try_from(value: String) -> Result<Self> {
                $pattern.check($title, &value)?;
                Ok(Self(value))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

validated_string!(
    /// A dependency name such as `zlib` or `libpng`.
    ///
    /// # Examples
    ///
    /// ```
    /// use deps_installer::manifest::PackageName;
    ///
    /// let name = PackageName::try_from("zlib").unwrap();
    /// assert_eq!(name.as_str(), "zlib");
    /// assert!(PackageName::try_from("ZLib").is_err());
    /// ```
    PackageName,
    FieldPattern::PackageName,
    "package name"
);

validated_string!(
    /// A dotted numeric version with an optional `-N` revision suffix.
    Version,
    FieldPattern::Version,
    "version"
);

validated_string!(
    /// The name of a registry query filter declared in a recipe set.
    QueryName,
    FieldPattern::QueryName,
    "query name"
);

validated_string!(
    /// A full 40 character git commit id.
    CommitId,
    FieldPattern::CommitId,
    "commit id"
);

validated_string!(
    /// A git branch or tag name.
    BranchName,
    FieldPattern::Branch,
    "branch name"
);

validated_string!(
    /// An `owner/project` source repository identifier.
    RepositoryId,
    FieldPattern::Repository,
    "repository"
);

impl RepositoryId {
    /// The URL the repository is cloned from.
    #[must_use]
    pub fn clone_url(&self) -> String {
        format!("https://github.com/{}.git", self.0)
    }
}

/// Split a `name:version[:extra]` package entry into its validated parts.
pub(crate) fn split_entry<'a>(
    title: &'static str,
    entry: &'a str,
    expected_parts: &[usize],
    pattern: &'static str,
) -> Result<Vec<&'a str>> {
    let parts: Vec<&str> = entry.split(':').collect();
    if expected_parts.contains(&parts.len()) {
        Ok(parts)
    } else {
        Err(ConfigError::pattern(title, entry, pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn repository_clone_url_targets_github() {
        let repo = RepositoryId::try_from("madler/zlib").expect("valid repository");
        assert_eq!(repo.clone_url(), "https://github.com/madler/zlib.git");
    }

    #[rstest]
    #[case("zlib:1.3", &[2], true)]
    #[case("zlib:1.3:abc", &[2], false)]
    #[case("zlib:1.3:abc", &[2, 3], true)]
    #[case("zlib", &[2, 3], false)]
    fn split_entry_checks_arity(
        #[case] entry: &str,
        #[case] arity: &[usize],
        #[case] ok: bool,
    ) {
        assert_eq!(split_entry("package", entry, arity, "name:version").is_ok(), ok);
    }

    #[test]
    fn version_error_names_the_field() {
        let err = Version::try_from("one").expect_err("version should be rejected");
        assert!(err.to_string().contains("invalid version one"));
    }
}
