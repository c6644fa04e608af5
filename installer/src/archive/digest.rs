//! Truncated SHA-256 digests used to pin cached archives.
//!
//! Cache descriptors carry the first 64 bits of the archive's SHA-256,
//! rendered as 16 lowercase hex characters.

use super::error::{ArchiveError, Result};
use camino::Utf8Path;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Read;

/// Number of hex characters in a truncated digest.
pub const TRUNCATED_DIGEST_LEN: usize = 16;

/// The first 64 bits of a SHA-256 digest in lowercase hex.
///
/// # Examples
///
/// ```
/// use deps_installer::archive::digest::TruncatedDigest;
///
/// let digest = TruncatedDigest::try_from("0123456789abcdef").unwrap();
/// assert_eq!(digest.as_str(), "0123456789abcdef");
/// assert!(TruncatedDigest::try_from("0123456789ABCDEF").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TruncatedDigest(String);

impl TruncatedDigest {
    /// Return the digest as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncate a full SHA-256 output to its first eight bytes.
    fn from_sha256(bytes: &[u8]) -> Self {
        let hex = bytes
            .iter()
            .take(TRUNCATED_DIGEST_LEN / 2)
            .map(|byte| format!("{byte:02x}"))
            .collect();
        Self(hex)
    }
}

impl TryFrom<&str> for TruncatedDigest {
    type Error = ArchiveError;

    fn try_from(value: &str) -> Result<Self> {
        validate_digest(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for TruncatedDigest {
    type Error = ArchiveError;

    fn try_from(value: String) -> Result<Self> {
        validate_digest(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for TruncatedDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TruncatedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_digest(value: &str) -> Result<()> {
    if value.len() != TRUNCATED_DIGEST_LEN {
        return Err(ArchiveError::InvalidDigest {
            value: value.to_owned(),
            reason: format!("expected {TRUNCATED_DIGEST_LEN} characters, got {}", value.len()),
        });
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return Err(ArchiveError::InvalidDigest {
            value: value.to_owned(),
            reason: "digest must be lowercase hexadecimal".to_owned(),
        });
    }
    Ok(())
}

/// Compute the truncated SHA-256 digest of a file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be opened or read.
pub fn compute_sha256_64(path: &Utf8Path) -> std::io::Result<TruncatedDigest> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(TruncatedDigest::from_sha256(&hasher.finalize()))
}

/// Compute the truncated SHA-256 digest of an in-memory buffer.
#[must_use]
pub fn digest_bytes(bytes: &[u8]) -> TruncatedDigest {
    TruncatedDigest::from_sha256(&Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::rstest;

    #[test]
    fn digest_of_known_input() {
        // sha256("hello") = 2cf24dba5fb0a30e26e83b2ac5b9e29e...
        assert_eq!(digest_bytes(b"hello").as_str(), "2cf24dba5fb0a30e");
    }

    #[test]
    fn file_digest_matches_buffer_digest() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join("blob.bin")).expect("utf8 path");
        let payload = vec![7u8; 20_000];
        fs::write(&path, &payload).expect("write payload");

        let from_file = compute_sha256_64(&path).expect("hash file");
        assert_eq!(from_file, digest_bytes(&payload));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = compute_sha256_64(Utf8Path::new("/definitely/not/here.zip"));
        assert!(result.is_err());
    }

    #[rstest]
    #[case::too_short("0123")]
    #[case::uppercase("0123456789ABCDEF")]
    #[case::non_hex("0123456789abcdeg")]
    fn rejects_malformed_digests(#[case] value: &str) {
        assert!(matches!(
            TruncatedDigest::try_from(value),
            Err(ArchiveError::InvalidDigest { .. })
        ));
    }
}
