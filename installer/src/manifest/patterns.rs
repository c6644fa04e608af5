//! Field patterns shared by the manifest validators.

use super::error::{ConfigError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// The value shapes a manifest field may be constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldPattern {
    PackageName,
    Version,
    TruncatedHash,
    CommitId,
    Branch,
    Repository,
    QueryName,
    VariantName,
}

static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| anchored(PACKAGE_NAME_SOURCE));
static VERSION: LazyLock<Regex> = LazyLock::new(|| anchored(VERSION_SOURCE));
static TRUNCATED_HASH: LazyLock<Regex> = LazyLock::new(|| anchored(TRUNCATED_HASH_SOURCE));
static COMMIT_ID: LazyLock<Regex> = LazyLock::new(|| anchored(COMMIT_ID_SOURCE));
static BRANCH: LazyLock<Regex> = LazyLock::new(|| anchored(BRANCH_SOURCE));
static REPOSITORY: LazyLock<Regex> = LazyLock::new(|| anchored(REPOSITORY_SOURCE));
static VARIANT_NAME: LazyLock<Regex> = LazyLock::new(|| anchored(VARIANT_NAME_SOURCE));

const PACKAGE_NAME_SOURCE: &str = "[a-z][a-z0-9-]*";
const VERSION_SOURCE: &str = r"\d+(\.\d+)*(-\d+)?";
const TRUNCATED_HASH_SOURCE: &str = "[a-f0-9]{16}";
const COMMIT_ID_SOURCE: &str = "[a-f0-9]{40}";
const BRANCH_SOURCE: &str = "[A-Za-z0-9_.-]+";
const REPOSITORY_SOURCE: &str = "[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+";
const VARIANT_NAME_SOURCE: &str = "(windows|linux)?:(release|debug):([a-z][a-z0-9-]*)?";

#[expect(
    clippy::expect_used,
    reason = "field patterns are fixed literals exercised by the unit tests"
)]
fn anchored(source: &str) -> Regex {
    Regex::new(&format!("^(?:{source})$")).expect("field pattern must compile")
}

impl FieldPattern {
    /// The pattern text reported in validation errors.
    pub(crate) const fn source(self) -> &'static str {
        match self {
            Self::PackageName | Self::QueryName => PACKAGE_NAME_SOURCE,
            Self::Version => VERSION_SOURCE,
            Self::TruncatedHash => TRUNCATED_HASH_SOURCE,
            Self::CommitId => COMMIT_ID_SOURCE,
            Self::Branch => BRANCH_SOURCE,
            Self::Repository => REPOSITORY_SOURCE,
            Self::VariantName => VARIANT_NAME_SOURCE,
        }
    }

    fn regex(self) -> &'static Regex {
        match self {
            Self::PackageName | Self::QueryName => &PACKAGE_NAME,
            Self::Version => &VERSION,
            Self::TruncatedHash => &TRUNCATED_HASH,
            Self::CommitId => &COMMIT_ID,
            Self::Branch => &BRANCH,
            Self::Repository => &REPOSITORY,
            Self::VariantName => &VARIANT_NAME,
        }
    }

    /// Whether `value` matches the whole pattern.
    pub(crate) fn is_match(self, value: &str) -> bool {
        self.regex().is_match(value)
    }

    /// Check a single value, naming the field in the error.
    pub(crate) fn check(self, title: &'static str, value: &str) -> Result<()> {
        if self.is_match(value) {
            Ok(())
        } else {
            Err(ConfigError::pattern(title, value, self.source()))
        }
    }

    /// Check every value, reporting all offenders together.
    pub(crate) fn check_all<'a, I>(self, title: &'static str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let rejected: Vec<String> = values
            .into_iter()
            .filter(|value| !self.is_match(value))
            .map(str::to_owned)
            .collect();
        if rejected.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Pattern {
                title,
                values: rejected,
                pattern: self.source(),
            })
        }
    }
}

/// Validate that `url` uses http(s) and names a host.
pub(crate) fn check_url(title: &'static str, url: &str) -> Result<()> {
    let invalid = |reason| ConfigError::InvalidUrl {
        title,
        url: url.to_owned(),
        reason,
    };
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| invalid("scheme must be http or https"))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(invalid("host is missing"));
    }
    Ok(())
}
