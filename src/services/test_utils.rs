//! Test utilities and in-memory collaborators
//!
//! This module provides mock implementations of the fetch, upload and search
//! traits so the compositor and orchestrator can be exercised end-to-end
//! without network access. Every mock records its calls for verification.

use crate::{
    error::{ComposeError, Result},
    search::{Candidate, PhotoSources, SearchIndex, SEARCH_SERVICE},
    services::{
        assets::{AssetFetcher, AssetFormat, AssetStore, FetchFailure},
        ImageCodec,
    },
};
use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Encode a solid-color PNG
#[must_use]
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba(rgba));
    ImageCodec::encode_png(&image).expect("encoding an in-memory PNG cannot fail")
}

/// Encode a cut-out: an opaque orange ellipse on a fully transparent canvas
#[must_use]
pub fn cutout_png(width: u32, height: u32) -> Vec<u8> {
    let cx = f64::from(width) / 2.0;
    let cy = f64::from(height) / 2.0;
    let image = RgbaImage::from_fn(width, height, |x, y| {
        let dx = (f64::from(x) + 0.5 - cx) / cx;
        let dy = (f64::from(y) + 0.5 - cy) / cy;
        if dx * dx + dy * dy <= 1.0 {
            Rgba([230, 120, 30, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    ImageCodec::encode_png(&image).expect("encoding an in-memory PNG cannot fail")
}

/// Search candidate with predictable rendition URLs
#[must_use]
pub fn candidate(id: u64, width: u32, height: u32) -> Candidate {
    let url = |name: &str| format!("https://images.test/{}/{}.jpg", id, name);
    Candidate {
        id,
        width,
        height,
        alt: format!("photo {}", id),
        src: PhotoSources {
            original: url("original"),
            large2x: url("large2x"),
            large: url("large"),
            medium: url("medium"),
            small: url("small"),
            portrait: url("portrait"),
            landscape: url("landscape"),
            tiny: url("tiny"),
        },
    }
}

#[derive(Debug, Clone)]
enum MockResponse {
    Bytes(Vec<u8>),
    Status(u16),
    Transport(String),
}

/// Fetcher serving canned responses by URL; unknown URLs answer 404
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: HashMap<String, MockResponse>,
    call_history: Mutex<Vec<String>>,
}

impl MockFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_bytes(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.responses
            .insert(url.to_string(), MockResponse::Bytes(bytes));
        self
    }

    #[must_use]
    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses
            .insert(url.to_string(), MockResponse::Status(status));
        self
    }

    /// Simulate a connection failure (timeout, DNS, reset)
    #[must_use]
    pub fn with_transport_error(mut self, url: &str, message: &str) -> Self {
        self.responses
            .insert(url.to_string(), MockResponse::Transport(message.to_string()));
        self
    }

    /// URLs fetched so far, in call order
    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchFailure> {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(url.to_string());
        }

        match self.responses.get(url) {
            Some(MockResponse::Bytes(bytes)) => Ok(bytes.clone()),
            Some(MockResponse::Status(status)) => Err(FetchFailure::status(*status, url)),
            Some(MockResponse::Transport(message)) => Err(FetchFailure::transport(message.clone())),
            None => Err(FetchFailure::status(404, url)),
        }
    }
}

/// Asset store keeping uploads in memory
#[derive(Debug, Default)]
pub struct RecordingAssetStore {
    uploads: Mutex<Vec<Vec<u8>>>,
    should_fail: bool,
}

impl RecordingAssetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose uploads are always rejected
    #[must_use]
    pub fn new_failing() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            should_fail: true,
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn uploads(&self) -> Vec<Vec<u8>> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetStore for RecordingAssetStore {
    async fn upload(&self, bytes: &[u8], format: AssetFormat) -> Result<String> {
        if self.should_fail {
            return Err(ComposeError::persist("Mock asset host rejected upload"));
        }

        let mut uploads = self
            .uploads
            .lock()
            .map_err(|_| ComposeError::internal("upload log poisoned"))?;
        uploads.push(bytes.to_vec());
        Ok(format!(
            "https://assets.test/composites/{}.{}",
            uploads.len(),
            format.extension()
        ))
    }
}

/// Search index returning a fixed candidate list (or a fixed failure)
#[derive(Debug, Default)]
pub struct ScriptedSearchIndex {
    candidates: Vec<Candidate>,
    fail_status: Option<u16>,
    calls: AtomicUsize,
    last_request: Mutex<Option<(String, String, u32)>>,
}

impl ScriptedSearchIndex {
    #[must_use]
    pub fn with_candidates(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    /// An index that always answers with `status`
    #[must_use]
    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::default()
        }
    }

    /// Number of searches performed
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(query, orientation, per_page)` of the latest search
    pub fn last_request(&self) -> Option<(String, String, u32)> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchIndex for ScriptedSearchIndex {
    async fn search(
        &self,
        query: &str,
        orientation: &str,
        per_page: u32,
    ) -> Result<Vec<Candidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some((query.to_string(), orientation.to_string(), per_page));
        }

        if let Some(status) = self.fail_status {
            return Err(ComposeError::upstream(
                SEARCH_SERVICE,
                format!("HTTP {}", status),
            ));
        }
        Ok(self.candidates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fetcher_records_calls() {
        let fetcher = MockFetcher::new().with_bytes("a", vec![1, 2, 3]);
        assert_eq!(fetcher.fetch("a").await.unwrap(), vec![1, 2, 3]);
        assert_eq!(fetcher.fetch("b").await.unwrap_err().status, Some(404));
        assert_eq!(fetcher.get_call_history(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_recording_store_numbers_uploads() {
        let store = RecordingAssetStore::new();
        let first = store.upload(&[1], AssetFormat::Png).await.unwrap();
        let second = store.upload(&[2], AssetFormat::Png).await.unwrap();
        assert_eq!(first, "https://assets.test/composites/1.png");
        assert_eq!(second, "https://assets.test/composites/2.png");
        assert_eq!(store.upload_count(), 2);

        let failing = RecordingAssetStore::new_failing();
        assert!(failing.upload(&[1], AssetFormat::Png).await.is_err());
        assert_eq!(failing.upload_count(), 0);
    }

    #[test]
    fn test_cutout_has_transparent_corners() {
        let bytes = cutout_png(20, 30);
        let image = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(image.get_pixel(0, 0)[3], 0);
        assert_eq!(image.get_pixel(10, 15)[3], 255);
    }
}
