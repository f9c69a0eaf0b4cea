#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # bgcompose
//!
//! Background composition for cut-out subjects: place a transparent-background
//! image onto a curated preset or a stock photo found from a free-text prompt,
//! with a soft drop shadow, and settle the credit cost of generated backgrounds.
//!
//! ## Features
//!
//! - **Compositor**: concurrent fetch, background blur, Lanczos subject resize,
//!   color adjustment, drop shadow, bottom-centered placement, lossless PNG
//! - **Preset catalog**: curated backgrounds with per-background parameter tweaks
//! - **Background search**: keyword-table prompt normalization and deterministic
//!   best-candidate selection over a stock-photo index
//! - **Orchestration**: ownership and precondition checks, credit gating with a
//!   choice of charge-on-success or reserve-upfront policies
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgcompose::{
//!     ApplyBackgroundRequest, CompositionOrchestrator, InMemoryImageRepository,
//!     InMemoryLedger, ServiceConfig,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::from_env()?;
//! let orchestrator = CompositionOrchestrator::with_http_services(
//!     &config,
//!     Arc::new(InMemoryImageRepository::new()),
//!     Arc::new(InMemoryLedger::new()),
//! )?;
//!
//! let request = ApplyBackgroundRequest::preset(
//!     "5b0a7c1e-8c8e-4d3f-9a64-0f5b6c1d2e3f",
//!     "0e4f2b9a-1c3d-4e5f-8a7b-6c5d4e3f2a1b",
//!     "studio-soft",
//! );
//! let result = orchestrator.apply_background(&request).await?;
//! println!("{} -> {}", result.message(), result.final_url);
//! # Ok(())
//! # }
//! ```
//!
//! ## Composing without orchestration
//!
//! ```rust,no_run
//! use bgcompose::{ComposeParameters, Compositor, HttpFetcher};
//! use std::{sync::Arc, time::Duration};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let compositor = Compositor::new(Arc::new(HttpFetcher::new(Duration::from_secs(30))?));
//! let params = ComposeParameters::builder().scale(0.5).add_shadow(false).build()?;
//! let png = compositor
//!     .compose("https://cdn.example/cutout.png", "https://cdn.example/bg.jpg", &params)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): `bgcompose` binary and tracing subscriber setup
//! - `webp-support` (default): WebP source decoding
//! - `tracing-json`: JSON log output for the CLI

pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod repository;
pub mod search;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

// Public API exports
pub use catalog::{BackgroundCatalog, Category, PresetBackground};
pub use compositor::{compose_bytes, compose_images, Composite, Compositor, Placement};
pub use config::{
    AssetHostConfig, ComposeOverrides, ComposeParameters, ComposeParametersBuilder, CreditPolicy,
    KeywordRule, KeywordTable, OrchestratorConfig, SearchConfig, ServiceConfig,
};
pub use error::{ComposeError, ImageSide, Result, Stage};
pub use ledger::{CreditLedger, CreditPackage, InMemoryLedger};
pub use orchestrator::{CompositionOrchestrator, OrchestratorBuilder};
pub use repository::{ImageRepository, InMemoryImageRepository};
pub use search::{pick_best, BackgroundSearch, Candidate, PexelsIndex, PhotoSources, SearchIndex};
pub use services::{
    AssetFetcher, AssetFormat, AssetStore, CloudinaryStore, FetchFailure, HttpFetcher, ImageCodec,
    ImageIOService, LocalOrHttpFetcher,
};
pub use types::{
    ApplyBackgroundRequest, BackgroundSource, CompositionResult, ImageKind, ImageRecord, Mode,
};
pub use utils::{NumericValidator, RequestValidator, ValidatedRequest};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Compose two encoded images already held in memory
///
/// Decoding, blur, resize and encoding run on the blocking pool.
///
/// # Examples
///
/// ```rust,no_run
/// use bgcompose::{compose_from_bytes, ComposeParameters};
///
/// # async fn example(subject: Vec<u8>, background: Vec<u8>) -> anyhow::Result<()> {
/// let png = compose_from_bytes(subject, background, &ComposeParameters::default()).await?;
/// std::fs::write("composite.png", png)?;
/// # Ok(())
/// # }
/// ```
pub async fn compose_from_bytes(
    subject: Vec<u8>,
    background: Vec<u8>,
    params: &ComposeParameters,
) -> Result<Vec<u8>> {
    params.validate()?;
    let params = params.clone();
    tokio::task::spawn_blocking(move || compose_bytes(&background, &subject, &params)).await?
}
