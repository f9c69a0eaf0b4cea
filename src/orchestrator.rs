//! Composition orchestrator
//!
//! Entry point for applying a background to a user's image. The orchestrator
//! validates the request, checks ownership and prerequisites, resolves the
//! background (catalog or search), composes, persists, and settles credits.
//!
//! Ordering guarantees:
//! - identifiers and prompt length are validated before any collaborator is called
//! - image lookup, ownership and the removed-background check happen before
//!   the mode arguments are resolved and before the ledger, catalog or search
//!   index are consulted
//! - under [`CreditPolicy::ChargeOnSuccess`] the credit is taken only after the
//!   composite is uploaded and the record updated
//! - under [`CreditPolicy::ReserveUpfront`] the credit is reserved before any
//!   billable work and refunded if a later step fails

use crate::{
    catalog::BackgroundCatalog,
    compositor::Compositor,
    config::{ComposeParameters, CreditPolicy, OrchestratorConfig, ServiceConfig},
    error::{ComposeError, Result},
    ledger::CreditLedger,
    repository::ImageRepository,
    search::{BackgroundSearch, PexelsIndex},
    services::{AssetFetcher, AssetFormat, AssetStore, CloudinaryStore, HttpFetcher},
    types::{ApplyBackgroundRequest, BackgroundSource, CompositionResult, ImageRecord, Mode},
    utils::RequestValidator,
};
use instant::Instant;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Fetch timeout used when none is configured
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Composite that has been uploaded and recorded
struct Persisted {
    record: ImageRecord,
    url: String,
    bytes: Vec<u8>,
}

/// Coordinates catalog, search, compositor, asset store, repository and ledger
pub struct CompositionOrchestrator {
    repository: Arc<dyn ImageRepository>,
    ledger: Arc<dyn CreditLedger>,
    store: Arc<dyn AssetStore>,
    compositor: Compositor,
    search: BackgroundSearch,
    catalog: BackgroundCatalog,
    config: OrchestratorConfig,
}

impl CompositionOrchestrator {
    /// Start assembling an orchestrator from its collaborators
    #[must_use]
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Orchestrator wired to the HTTP fetcher, the stock-photo index and the
    /// signed-upload asset host described by `config`
    ///
    /// # Errors
    /// - Missing search API key or asset host credentials
    /// - Failed to create an HTTP client
    pub fn with_http_services(
        config: &ServiceConfig,
        repository: Arc<dyn ImageRepository>,
        ledger: Arc<dyn CreditLedger>,
    ) -> Result<Self> {
        let timeout = config
            .orchestrator
            .fetch_timeout_secs
            .map_or(DEFAULT_FETCH_TIMEOUT, Duration::from_secs);
        let fetcher = HttpFetcher::new(timeout)?;
        let index = PexelsIndex::new(&config.search)?;
        let store = CloudinaryStore::new(config.asset_host.clone())?;

        Self::builder()
            .repository(repository)
            .ledger(ledger)
            .store(Arc::new(store))
            .fetcher(Arc::new(fetcher))
            .search(BackgroundSearch::new(Arc::new(index), &config.search))
            .config(config.orchestrator.clone())
            .build()
    }

    #[must_use]
    pub fn catalog(&self) -> &BackgroundCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Apply a preset or searched background to an image
    ///
    /// # Errors
    /// - `Validation` for malformed ids or missing/oversized mode arguments
    /// - `NotFound` for an unknown image or preset
    /// - `Authorization` when the image belongs to another user
    /// - `Precondition` when the image has no removed-background variant
    /// - `InsufficientCredits` for a generated background with a zero balance
    /// - `NoResults` / `Upstream` from the search index
    /// - `Fetch` / `Decode` from the compositor
    /// - `Persist` / `Upstream` from the asset store or repository
    #[instrument(skip(self, request), fields(mode = %request.mode))]
    pub async fn apply_background(
        &self,
        request: &ApplyBackgroundRequest,
    ) -> Result<CompositionResult> {
        let started = Instant::now();
        let validated = RequestValidator::validate(request)?;
        let (image, subject_url) = self
            .load_image(validated.image_id, validated.user_id)
            .await?;

        let source = validated.source()?;

        let (persisted, credits_deducted) = match &source {
            BackgroundSource::Preset { id } => (self.apply_preset(&image, &subject_url, id).await?, 0),
            BackgroundSource::Generated { prompt } => {
                self.apply_generated(&image, &subject_url, prompt).await?
            },
        };

        info!(
            image_id = %image.id,
            user_id = %image.user_id,
            final_url = %persisted.url,
            credits_deducted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Background applied"
        );

        Ok(CompositionResult {
            image: persisted.record,
            final_url: persisted.url,
            credits_deducted,
            bytes: persisted.bytes,
        })
    }

    /// Fetch the record and check ownership and the removed-background variant
    async fn load_image(&self, image_id: Uuid, user_id: Uuid) -> Result<(ImageRecord, String)> {
        let image = self
            .repository
            .find_by_id(image_id)
            .await?
            .ok_or_else(|| ComposeError::not_found("Image"))?;

        if image.user_id != user_id {
            warn!(image_id = %image_id, user_id = %user_id, "Image owned by another user");
            return Err(ComposeError::authorization(format!(
                "image {} does not belong to user {}",
                image_id, user_id
            )));
        }

        let subject_url = image
            .removed_bg_url
            .clone()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                ComposeError::precondition("This image has no removed background yet")
            })?;

        Ok((image, subject_url))
    }

    async fn apply_preset(
        &self,
        image: &ImageRecord,
        subject_url: &str,
        background_id: &str,
    ) -> Result<Persisted> {
        let preset = self
            .catalog
            .by_id(background_id)
            .ok_or_else(|| ComposeError::not_found(format!("Background '{}'", background_id)))?;
        debug!(preset = %preset.id, category = %preset.category, "Resolved preset background");

        let params = preset.parameters(&self.config.compose);
        self.render_and_persist(image.id, subject_url, &preset.image_url, &params, Mode::Preset)
            .await
    }

    async fn apply_generated(
        &self,
        image: &ImageRecord,
        subject_url: &str,
        prompt: &str,
    ) -> Result<(Persisted, u32)> {
        let user_id = image.user_id;

        match self.config.credit_policy {
            CreditPolicy::ChargeOnSuccess => {
                if !self.ledger.has_credits(user_id).await? {
                    return Err(ComposeError::insufficient_credits(user_id.to_string()));
                }

                let persisted = self.generate(image.id, subject_url, prompt).await?;

                // Balance may have been spent by a concurrent request since the check
                let credits = if self.ledger.decrement_if_positive(user_id).await? {
                    1
                } else {
                    warn!(user_id = %user_id, "Balance exhausted before charge; composite kept uncharged");
                    0
                };
                Ok((persisted, credits))
            },
            CreditPolicy::ReserveUpfront => {
                if !self.ledger.decrement_if_positive(user_id).await? {
                    return Err(ComposeError::insufficient_credits(user_id.to_string()));
                }
                debug!(user_id = %user_id, "Credit reserved");

                match self.generate(image.id, subject_url, prompt).await {
                    Ok(persisted) => Ok((persisted, 1)),
                    Err(e) => {
                        if let Err(refund_error) = self.ledger.refund(user_id).await {
                            error!(
                                user_id = %user_id,
                                error = %refund_error,
                                "Failed to refund reserved credit"
                            );
                        }
                        Err(e)
                    },
                }
            },
        }
    }

    async fn generate(&self, image_id: Uuid, subject_url: &str, prompt: &str) -> Result<Persisted> {
        let background_url = self.search.search(prompt).await?;
        self.render_and_persist(
            image_id,
            subject_url,
            &background_url,
            &self.config.compose,
            Mode::Generate,
        )
        .await
    }

    async fn render_and_persist(
        &self,
        image_id: Uuid,
        subject_url: &str,
        background_url: &str,
        params: &ComposeParameters,
        mode: Mode,
    ) -> Result<Persisted> {
        let bytes = self
            .compositor
            .compose(subject_url, background_url, params)
            .await?;

        let url = self.store.upload(&bytes, AssetFormat::Png).await?;
        debug!(url = %url, bytes = bytes.len(), "Composite uploaded");

        let record = self
            .repository
            .update_replaced(image_id, &url, mode.image_kind())
            .await?;

        Ok(Persisted { record, url, bytes })
    }
}

/// Builder for [`CompositionOrchestrator`]
#[derive(Default)]
pub struct OrchestratorBuilder {
    repository: Option<Arc<dyn ImageRepository>>,
    ledger: Option<Arc<dyn CreditLedger>>,
    store: Option<Arc<dyn AssetStore>>,
    fetcher: Option<Arc<dyn AssetFetcher>>,
    search: Option<BackgroundSearch>,
    catalog: Option<BackgroundCatalog>,
    config: OrchestratorConfig,
}

impl OrchestratorBuilder {
    #[must_use]
    pub fn repository(mut self, repository: Arc<dyn ImageRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    #[must_use]
    pub fn ledger(mut self, ledger: Arc<dyn CreditLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn AssetStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    #[must_use]
    pub fn search(mut self, search: BackgroundSearch) -> Self {
        self.search = Some(search);
        self
    }

    /// Replace the built-in preset catalog
    #[must_use]
    pub fn catalog(mut self, catalog: BackgroundCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn credit_policy(mut self, policy: CreditPolicy) -> Self {
        self.config.credit_policy = policy;
        self
    }

    #[must_use]
    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    /// - A required collaborator was not supplied
    /// - The configured compose parameters are out of range
    pub fn build(self) -> Result<CompositionOrchestrator> {
        fn required<T>(value: Option<T>, name: &str) -> Result<T> {
            value.ok_or_else(|| ComposeError::validation(format!("{} is required", name)))
        }

        self.config.compose.validate()?;

        Ok(CompositionOrchestrator {
            repository: required(self.repository, "image repository")?,
            ledger: required(self.ledger, "credit ledger")?,
            store: required(self.store, "asset store")?,
            compositor: Compositor::new(required(self.fetcher, "asset fetcher")?),
            search: required(self.search, "background search")?,
            catalog: self.catalog.unwrap_or_default(),
            config: self.config,
        })
    }
}
