//! Background search over a stock-photo index
//!
//! A free-text prompt is normalized into a query through the keyword table,
//! the index is asked for landscape candidates, and the largest candidate
//! (with a small bonus for landscape shape) wins.

use crate::{
    config::{KeywordTable, SearchConfig},
    error::{ComposeError, Result},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Name used for the stock-photo service in upstream errors
pub const SEARCH_SERVICE: &str = "pexels";

/// Renditions offered by the index for one photo
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoSources {
    pub original: String,
    pub large2x: String,
    pub large: String,
    pub medium: String,
    pub small: String,
    pub portrait: String,
    pub landscape: String,
    pub tiny: String,
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub alt: String,
    pub src: PhotoSources,
}

impl Candidate {
    #[must_use]
    pub fn is_landscape(&self) -> bool {
        self.width >= self.height
    }

    /// `width * height * (1 + 0.1 * is_landscape)`
    #[must_use]
    pub fn score(&self) -> f64 {
        let area = u64::from(self.width) * u64::from(self.height);
        let bonus = if self.is_landscape() { 1.1 } else { 1.0 };
        area as f64 * bonus
    }

    /// Preferred rendition: landscape, then large 2x, then large, then original
    #[must_use]
    pub fn best_rendition(&self) -> Option<&str> {
        [
            &self.src.landscape,
            &self.src.large2x,
            &self.src.large,
            &self.src.original,
        ]
        .into_iter()
        .find(|url| !url.is_empty())
        .map(String::as_str)
    }
}

/// Highest-scoring candidate; on equal scores the earliest one wins
#[must_use]
pub fn pick_best(candidates: &[Candidate]) -> Option<&Candidate> {
    let mut best: Option<&Candidate> = None;
    for candidate in candidates {
        match best {
            Some(current) if candidate.score() <= current.score() => {},
            _ => best = Some(candidate),
        }
    }
    best
}

/// Stock-photo index
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Query the index
    ///
    /// # Errors
    /// - `ComposeError::Upstream` for transport failures and non-success statuses
    async fn search(&self, query: &str, orientation: &str, per_page: u32)
        -> Result<Vec<Candidate>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<Candidate>,
}

/// Pexels-compatible HTTPS index client
#[derive(Debug, Clone)]
pub struct PexelsIndex {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl PexelsIndex {
    /// Create an index client from search settings
    ///
    /// # Errors
    /// - Missing API key
    /// - Failed to create HTTP client
    pub fn new(config: &SearchConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ComposeError::validation(
                "PEXELS_API_KEY is not set. Add it to your environment variables.",
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                ComposeError::internal(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl SearchIndex for PexelsIndex {
    async fn search(
        &self,
        query: &str,
        orientation: &str,
        per_page: u32,
    ) -> Result<Vec<Candidate>> {
        let per_page = per_page.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .query(&[
                ("query", query),
                ("orientation", orientation),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ComposeError::upstream(SEARCH_SERVICE, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Search index error");
            return Err(ComposeError::upstream(
                SEARCH_SERVICE,
                format!("HTTP {}", status),
            ));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            ComposeError::upstream(SEARCH_SERVICE, format!("malformed response: {}", e))
        })?;

        Ok(parsed.photos)
    }
}

/// Prompt-driven background resolver
pub struct BackgroundSearch {
    index: Arc<dyn SearchIndex>,
    keywords: KeywordTable,
    orientation: String,
    per_page: u32,
}

impl BackgroundSearch {
    #[must_use]
    pub fn new(index: Arc<dyn SearchIndex>, config: &SearchConfig) -> Self {
        Self {
            index,
            keywords: config.keywords.clone(),
            orientation: config.orientation.clone(),
            per_page: config.per_page,
        }
    }

    /// Query sent to the index for a prompt
    #[must_use]
    pub fn normalize(&self, prompt: &str) -> String {
        self.keywords.normalize(prompt)
    }

    /// Resolve a prompt to a background image URL
    ///
    /// # Errors
    /// - `ComposeError::Upstream` when the index fails or the winner has no rendition
    /// - `ComposeError::NoResults` when the index returns nothing
    #[instrument(skip(self))]
    pub async fn search(&self, prompt: &str) -> Result<String> {
        let query = self.normalize(prompt);
        debug!(query = %query, "Normalized background prompt");

        let candidates = self
            .index
            .search(&query, &self.orientation, self.per_page)
            .await?;

        let best = pick_best(&candidates).ok_or_else(|| ComposeError::no_results(&query))?;
        let url = best.best_rendition().ok_or_else(|| {
            ComposeError::upstream(
                SEARCH_SERVICE,
                format!("photo {} has no usable rendition", best.id),
            )
        })?;

        info!(
            query = %query,
            candidates = candidates.len(),
            photo_id = best.id,
            width = best.width,
            height = best.height,
            "Selected background candidate"
        );
        Ok(url.to_string())
    }
}
