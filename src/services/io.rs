//! Local image I/O service
//!
//! Lets the compositor read sources from disk as well as over HTTP, which is
//! what the CLI needs when composing local files, and writes composites back.

use crate::{
    error::{ComposeError, Result},
    services::assets::{AssetFetcher, FetchFailure, HttpFetcher},
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Service for reading and writing image files
pub struct ImageIOService;

impl ImageIOService {
    /// Whether a source reference points at the network
    #[must_use]
    pub fn is_remote(reference: &str) -> bool {
        reference.starts_with("http://") || reference.starts_with("https://")
    }

    /// Resolve a `file://` URL or plain path to a filesystem path
    #[must_use]
    pub fn local_path(reference: &str) -> PathBuf {
        PathBuf::from(reference.strip_prefix("file://").unwrap_or(reference))
    }

    /// Write encoded image bytes, creating parent directories
    ///
    /// # Errors
    /// - Failed to create the output directory or write the file
    pub fn save_bytes<P: AsRef<Path>>(bytes: &[u8], path: P) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ComposeError::persist(format!(
                        "Failed to create output directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        std::fs::write(path_ref, bytes).map_err(|e| {
            ComposeError::persist(format!("Failed to write '{}': {}", path_ref.display(), e))
        })?;

        log::debug!("Wrote {} bytes to {}", bytes.len(), path_ref.display());
        Ok(())
    }
}

/// Fetcher that serves local paths from disk and delegates URLs to HTTP
pub struct LocalOrHttpFetcher {
    http: HttpFetcher,
}

impl LocalOrHttpFetcher {
    #[must_use]
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AssetFetcher for LocalOrHttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchFailure> {
        if ImageIOService::is_remote(url) {
            return self.http.fetch(url).await;
        }

        let path = ImageIOService::local_path(url);
        tokio::fs::read(&path).await.map_err(|e| {
            let status = (e.kind() == std::io::ErrorKind::NotFound).then_some(404);
            FetchFailure {
                status,
                message: format!("Failed to read '{}': {}", path.display(), e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_reference_classification() {
        assert!(ImageIOService::is_remote("https://cdn.test/a.png"));
        assert!(!ImageIOService::is_remote("/tmp/a.png"));
        assert_eq!(
            ImageIOService::local_path("file:///tmp/a.png"),
            PathBuf::from("/tmp/a.png")
        );
    }

    #[tokio::test]
    async fn test_local_fetch_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.png");
        ImageIOService::save_bytes(b"not really a png", &path).unwrap();

        let fetcher = LocalOrHttpFetcher::new(HttpFetcher::new(Duration::from_secs(5)).unwrap());
        let bytes = fetcher.fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"not really a png");
    }

    #[tokio::test]
    async fn test_missing_local_file_reports_not_found() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.png");

        let fetcher = LocalOrHttpFetcher::new(HttpFetcher::new(Duration::from_secs(5)).unwrap());
        let failure = fetcher.fetch(missing.to_str().unwrap()).await.unwrap_err();
        assert_eq!(failure.status, Some(404));
        assert!(failure.message.contains("missing.png"));
    }
}
