//! Archive download for prebuilt package caches.
//!
//! Provides a trait-based abstraction over HTTP so the cache fetcher can be
//! exercised without network access.

use camino::Utf8Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Network timeout for a single archive download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Trait for downloading cached package archives.
///
/// # Examples
///
/// ```
/// use deps_installer::archive::download::HttpDownloader;
///
/// let downloader = HttpDownloader;
/// // Use downloader.download(url, dest) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveDownloader {
    /// Download `url` into the file at `dest`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server answers with an
    /// error status, or the body cannot be written.
    fn download(&self, url: &str, dest: &Utf8Path) -> Result<(), DownloadError>;
}

/// Errors arising from archive download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested archive was not found (HTTP 404).
    #[error("archive not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based downloader using `ureq`.
///
/// Certificate verification is disabled; archives are checked against
/// their pinned digest instead.
pub struct HttpDownloader;

impl ArchiveDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Utf8Path) -> Result<(), DownloadError> {
        tracing::debug!("downloading {url} to {dest}");
        let response = http_agent()
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response.into_body().as_reader(), &mut file)
            .map_err(DownloadError::Io)?;
        Ok(())
    }
}

/// Join a cache base URL and an archive file name without doubling slashes.
///
/// # Examples
///
/// ```
/// use deps_installer::archive::download::archive_url;
///
/// assert_eq!(
///     archive_url("https://example.com/cache", "zlib_1.3.zip"),
///     "https://example.com/cache/zlib_1.3.zip",
/// );
/// assert_eq!(
///     archive_url("https://example.com/cache/", "zlib_1.3.zip"),
///     "https://example.com/cache/zlib_1.3.zip",
/// );
/// ```
#[must_use]
pub fn archive_url(base: &str, file_name: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{file_name}")
    } else {
        format!("{base}/{file_name}")
    }
}

/// Shared `ureq` agent with timeout and TLS configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let tls = ureq::tls::TlsConfig::builder()
            .disable_verification(true)
            .build();
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .tls_config(tls)
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_url_appends_separator_once() {
        assert_eq!(
            archive_url("https://cache.test/deps", "png_1.6.zip"),
            "https://cache.test/deps/png_1.6.zip"
        );
        assert_eq!(
            archive_url("https://cache.test/deps/", "png_1.6.zip"),
            "https://cache.test/deps/png_1.6.zip"
        );
    }

    #[test]
    fn map_ureq_error_maps_404_to_not_found() {
        let err = ureq::Error::StatusCode(404);
        let mapped = map_ureq_error("https://cache.test/zlib_1.3.zip", &err);
        assert!(matches!(mapped, DownloadError::NotFound { .. }));
    }

    #[test]
    fn map_ureq_error_maps_other_status_to_http_error() {
        let err = ureq::Error::StatusCode(503);
        let mapped = map_ureq_error("https://cache.test/zlib_1.3.zip", &err);
        assert!(matches!(mapped, DownloadError::HttpError { .. }));
    }
}
