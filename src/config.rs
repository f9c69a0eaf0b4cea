//! Configuration types for background composition operations

use crate::error::{ComposeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Maximum prompt length accepted for generated backgrounds, in characters
pub const MAX_PROMPT_CHARS: usize = 250;

/// Largest accepted blur radius, in pixels, for both background and shadow
pub const MAX_BLUR_RADIUS: f32 = 250.0;

/// Default stock-photo search endpoint
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.pexels.com/v1/search";

/// Visual knobs controlling how a subject is placed on a background
///
/// Every field has an independent default, so callers only set what they
/// want to change. Instances are built per call; there is no shared
/// mutable defaults object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeParameters {
    /// Fraction of the background width the subject may occupy, in (0, 1]
    pub scale: f32,
    /// Gaussian blur radius applied to the background (0 disables)
    pub bg_blur: f32,
    /// Subject saturation multiplier (1.0 = identity)
    pub saturation: f32,
    /// Subject brightness multiplier (1.0 = identity)
    pub brightness: f32,
    /// Render a soft drop shadow under the subject
    pub add_shadow: bool,
    /// Horizontal shadow offset in pixels
    pub shadow_offset_x: i32,
    /// Vertical shadow offset in pixels
    pub shadow_offset_y: i32,
    /// Shadow blur radius in pixels
    pub shadow_blur: f32,
    /// Distance between the subject's bottom edge and the background's, in pixels
    pub bottom_margin: u32,
}

impl Default for ComposeParameters {
    fn default() -> Self {
        Self {
            scale: 0.6,
            bg_blur: 1.5,
            saturation: 0.95,
            brightness: 1.0,
            add_shadow: true,
            shadow_offset_x: 8,
            shadow_offset_y: 18,
            shadow_blur: 20.0,
            bottom_margin: 8,
        }
    }
}

impl ComposeParameters {
    /// Create a new parameter builder starting from the declared defaults
    #[must_use]
    pub fn builder() -> ComposeParametersBuilder {
        ComposeParametersBuilder::default()
    }

    /// Return a copy with every populated override applied
    #[must_use]
    pub fn with_overrides(&self, overrides: &ComposeOverrides) -> Self {
        let mut merged = self.clone();
        if let Some(scale) = overrides.scale {
            merged.scale = scale;
        }
        if let Some(bg_blur) = overrides.bg_blur {
            merged.bg_blur = bg_blur;
        }
        if let Some(saturation) = overrides.saturation {
            merged.saturation = saturation;
        }
        if let Some(brightness) = overrides.brightness {
            merged.brightness = brightness;
        }
        if let Some(add_shadow) = overrides.add_shadow {
            merged.add_shadow = add_shadow;
        }
        if let Some(x) = overrides.shadow_offset_x {
            merged.shadow_offset_x = x;
        }
        if let Some(y) = overrides.shadow_offset_y {
            merged.shadow_offset_y = y;
        }
        if let Some(shadow_blur) = overrides.shadow_blur {
            merged.shadow_blur = shadow_blur;
        }
        if let Some(bottom_margin) = overrides.bottom_margin {
            merged.bottom_margin = bottom_margin;
        }
        merged
    }

    /// Validate all parameters
    ///
    /// # Validation Rules
    ///
    /// - scale: (0, 1]
    /// - blur radii: [0, 250]
    /// - saturation/brightness: finite and non-negative
    ///
    /// # Errors
    /// - `ComposeError::Validation` naming the parameter and its valid range
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 || self.scale > 1.0 {
            return Err(ComposeError::parameter_value_error(
                "scale",
                self.scale,
                "(0, 1]",
                Some(0.6),
            ));
        }

        for (name, value, recommended) in [
            ("background blur", self.bg_blur, 1.5),
            ("shadow blur", self.shadow_blur, 20.0),
        ] {
            if !value.is_finite() || !(0.0..=MAX_BLUR_RADIUS).contains(&value) {
                return Err(ComposeError::parameter_value_error(
                    name,
                    value,
                    "[0, 250]",
                    Some(recommended),
                ));
            }
        }

        for (name, value, recommended) in [
            ("saturation", self.saturation, 0.95),
            ("brightness", self.brightness, 1.0),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ComposeError::parameter_value_error(
                    name,
                    value,
                    ">= 0",
                    Some(recommended),
                ));
            }
        }

        Ok(())
    }
}

/// Builder for `ComposeParameters`
#[derive(Debug, Default)]
pub struct ComposeParametersBuilder {
    params: ComposeParameters,
}

impl ComposeParametersBuilder {
    #[must_use]
    pub fn scale(mut self, scale: f32) -> Self {
        self.params.scale = scale;
        self
    }

    #[must_use]
    pub fn bg_blur(mut self, radius: f32) -> Self {
        self.params.bg_blur = radius;
        self
    }

    #[must_use]
    pub fn saturation(mut self, saturation: f32) -> Self {
        self.params.saturation = saturation;
        self
    }

    #[must_use]
    pub fn brightness(mut self, brightness: f32) -> Self {
        self.params.brightness = brightness;
        self
    }

    #[must_use]
    pub fn add_shadow(mut self, enabled: bool) -> Self {
        self.params.add_shadow = enabled;
        self
    }

    /// Set the shadow offset relative to the subject placement
    #[must_use]
    pub fn shadow_offset(mut self, x: i32, y: i32) -> Self {
        self.params.shadow_offset_x = x;
        self.params.shadow_offset_y = y;
        self
    }

    #[must_use]
    pub fn shadow_blur(mut self, radius: f32) -> Self {
        self.params.shadow_blur = radius;
        self
    }

    #[must_use]
    pub fn bottom_margin(mut self, margin: u32) -> Self {
        self.params.bottom_margin = margin;
        self
    }

    /// Build and validate the parameters
    ///
    /// # Errors
    /// - Any parameter outside its valid range
    pub fn build(self) -> Result<ComposeParameters> {
        self.params.validate()?;
        Ok(self.params)
    }
}

/// Partial parameter set, e.g. per-background catalog defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeOverrides {
    pub scale: Option<f32>,
    pub bg_blur: Option<f32>,
    pub saturation: Option<f32>,
    pub brightness: Option<f32>,
    pub add_shadow: Option<bool>,
    pub shadow_offset_x: Option<i32>,
    pub shadow_offset_y: Option<i32>,
    pub shadow_blur: Option<f32>,
    pub bottom_margin: Option<u32>,
}

impl ComposeOverrides {
    /// Overrides that change nothing
    pub const NONE: Self = Self {
        scale: None,
        bg_blur: None,
        saturation: None,
        brightness: None,
        add_shadow: None,
        shadow_offset_x: None,
        shadow_offset_y: None,
        shadow_blur: None,
        bottom_margin: None,
    };
}

/// One keyword rule: any listed keyword maps the prompt to `query`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keywords: Vec<String>,
    pub query: String,
}

/// Prompt-to-query keyword table used by background search
///
/// Rules are checked in order against the lower-cased prompt; the first rule
/// with a keyword contained in the prompt wins. Unmatched prompts become
/// `"<prompt><fallback_suffix>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTable {
    pub rules: Vec<KeywordRule>,
    #[serde(default = "default_fallback_suffix")]
    pub fallback_suffix: String,
}

fn default_fallback_suffix() -> String {
    " background".to_string()
}

impl Default for KeywordTable {
    fn default() -> Self {
        let rule = |keywords: &[&str], query: &str| KeywordRule {
            keywords: keywords.iter().map(ToString::to_string).collect(),
            query: query.to_string(),
        };

        Self {
            rules: vec![
                rule(&["office"], "modern office background"),
                rule(&["nature", "forest"], "nature background"),
                rule(&["city", "urban"], "city skyline background"),
                rule(&["studio"], "studio backdrop"),
                rule(&["gradient"], "gradient background"),
            ],
            fallback_suffix: default_fallback_suffix(),
        }
    }
}

impl KeywordTable {
    /// Load a keyword table from a JSON file
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not a valid keyword table
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = std::fs::read_to_string(path_ref).map_err(|e| {
            ComposeError::validation(format!(
                "Failed to read keyword table '{}': {}",
                path_ref.display(),
                e
            ))
        })?;
        Self::from_json_str(&content)
    }

    /// Parse a keyword table from JSON text
    ///
    /// # Errors
    /// - Text is not a valid keyword table
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| ComposeError::validation(format!("Invalid keyword table: {}", e)))
    }

    /// Turn a free-text prompt into a search query
    #[must_use]
    pub fn normalize(&self, prompt: &str) -> String {
        let lower = prompt.to_lowercase();

        self.rules
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|keyword| lower.contains(&keyword.to_lowercase()))
            })
            .map_or_else(
                || format!("{}{}", prompt, self.fallback_suffix),
                |rule| rule.query.clone(),
            )
    }
}

/// Stock-photo search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key: String,
    /// Requested orientation (the index's own vocabulary)
    pub orientation: String,
    /// Maximum candidates requested per query
    pub per_page: u32,
    pub timeout_secs: u64,
    pub keywords: KeywordTable,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            api_key: String::new(),
            orientation: "landscape".to_string(),
            per_page: 30,
            timeout_secs: 30,
            keywords: KeywordTable::default(),
        }
    }
}

impl SearchConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Content host settings for persisting composites
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHostConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Optional folder the composites are uploaded into
    pub folder: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AssetHostConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            folder: None,
            timeout_secs: 60,
        }
    }
}

impl AssetHostConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Upload endpoint for image assets
    #[must_use]
    pub fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        )
    }
}

/// When the credit for a generated background is taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreditPolicy {
    /// Check the balance first, deduct after the composite is persisted
    #[default]
    ChargeOnSuccess,
    /// Atomically reserve one credit before billable work, refund on failure
    ReserveUpfront,
}

/// Orchestrator settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub credit_policy: CreditPolicy,
    /// Parameters used for generated backgrounds (presets merge their own overrides)
    pub compose: ComposeParameters,
    /// Timeout for subject/background fetches
    pub fetch_timeout_secs: Option<u64>,
}

/// Full service configuration, usually assembled from the environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub search: SearchConfig,
    pub asset_host: AssetHostConfig,
    pub orchestrator: OrchestratorConfig,
}

impl ServiceConfig {
    /// Build a configuration from environment variables
    ///
    /// Reads `PEXELS_API_KEY` (required), `PEXELS_ENDPOINT`,
    /// `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY`, `CLOUDINARY_API_SECRET`,
    /// `CLOUDINARY_FOLDER` and `BGCOMPOSE_KEYWORDS` (path to a JSON keyword table).
    ///
    /// # Errors
    /// - `PEXELS_API_KEY` missing or empty
    /// - Keyword table file unreadable or invalid
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// # Errors
    /// - Same as [`ServiceConfig::from_env`]
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = get("PEXELS_API_KEY").ok_or_else(|| {
            ComposeError::validation(
                "PEXELS_API_KEY is not set. Add it to your environment variables.",
            )
        })?;

        let mut config = Self::default();
        config.search.api_key = api_key;
        if let Some(endpoint) = get("PEXELS_ENDPOINT") {
            config.search.endpoint = endpoint;
        }
        if let Some(path) = get("BGCOMPOSE_KEYWORDS") {
            config.search.keywords = KeywordTable::from_json_file(path)?;
        }

        config.asset_host.cloud_name = get("CLOUDINARY_CLOUD_NAME").unwrap_or_default();
        config.asset_host.api_key = get("CLOUDINARY_API_KEY").unwrap_or_default();
        config.asset_host.api_secret = get("CLOUDINARY_API_SECRET").unwrap_or_default();
        config.asset_host.folder = get("CLOUDINARY_FOLDER");

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_parameters() {
        let params = ComposeParameters::default();
        assert!((params.scale - 0.6).abs() < f32::EPSILON);
        assert!((params.bg_blur - 1.5).abs() < f32::EPSILON);
        assert!((params.saturation - 0.95).abs() < f32::EPSILON);
        assert!((params.brightness - 1.0).abs() < f32::EPSILON);
        assert!(params.add_shadow);
        assert_eq!(params.shadow_offset_x, 8);
        assert_eq!(params.shadow_offset_y, 18);
        assert!((params.shadow_blur - 20.0).abs() < f32::EPSILON);
        assert_eq!(params.bottom_margin, 8);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_scale_validation() {
        assert!(ComposeParameters::builder().scale(1.0).build().is_ok());
        assert!(ComposeParameters::builder().scale(0.01).build().is_ok());

        let err = ComposeParameters::builder().scale(0.0).build().unwrap_err();
        assert!(err.to_string().contains("scale"));
        assert!(ComposeParameters::builder().scale(1.2).build().is_err());
        assert!(ComposeParameters::builder().scale(f32::NAN).build().is_err());
    }

    #[test]
    fn test_negative_blur_rejected() {
        let err = ComposeParameters::builder()
            .bg_blur(-1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ComposeError::Validation(_)));
        assert!(err.to_string().contains("background blur"));
    }

    #[test]
    fn test_blur_radius_upper_bound() {
        assert!(ComposeParameters::builder()
            .bg_blur(MAX_BLUR_RADIUS)
            .shadow_blur(MAX_BLUR_RADIUS)
            .build()
            .is_ok());

        let err = ComposeParameters::builder()
            .shadow_blur(1.0e6)
            .build()
            .unwrap_err();
        assert!(matches!(err, ComposeError::Validation(_)));
        assert!(err.to_string().contains("shadow blur"));

        let err = ComposeParameters::builder()
            .bg_blur(1.0e12)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("background blur"));

        let overrides = ComposeOverrides {
            bg_blur: Some(f32::INFINITY),
            ..ComposeOverrides::default()
        };
        assert!(ComposeParameters::default()
            .with_overrides(&overrides)
            .validate()
            .is_err());
    }

    #[test]
    fn test_overrides_only_touch_populated_fields() {
        let overrides = ComposeOverrides {
            scale: Some(0.5),
            add_shadow: Some(false),
            ..ComposeOverrides::default()
        };
        let merged = ComposeParameters::default().with_overrides(&overrides);
        assert!((merged.scale - 0.5).abs() < f32::EPSILON);
        assert!(!merged.add_shadow);
        assert_eq!(merged.bottom_margin, 8);
        assert_eq!(
            ComposeParameters::default().with_overrides(&ComposeOverrides::NONE),
            ComposeParameters::default()
        );
    }

    #[test]
    fn test_parameters_deserialize_with_missing_fields() {
        let params: ComposeParameters = serde_json::from_str(r#"{"scale": 0.4}"#).unwrap();
        assert!((params.scale - 0.4).abs() < f32::EPSILON);
        assert_eq!(params.shadow_offset_y, 18);
    }

    #[test]
    fn test_keyword_normalization() {
        let table = KeywordTable::default();
        assert_eq!(table.normalize("cozy office"), "modern office background");
        assert_eq!(table.normalize("Deep FOREST trail"), "nature background");
        assert_eq!(table.normalize("urban night"), "city skyline background");
        assert_eq!(table.normalize("photo studio"), "studio backdrop");
        assert_eq!(table.normalize("pastel gradient"), "gradient background");
        assert_eq!(table.normalize("Beach sunset"), "Beach sunset background");
    }

    #[test]
    fn test_keyword_table_from_json() {
        let table = KeywordTable::from_json_str(
            r#"{"rules": [{"keywords": ["beach", "sea"], "query": "ocean background"}]}"#,
        )
        .unwrap();
        assert_eq!(table.normalize("by the sea"), "ocean background");
        assert_eq!(table.normalize("office"), "office background");
        assert!(KeywordTable::from_json_str("not json").is_err());
    }

    #[test]
    fn test_service_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("PEXELS_API_KEY", "px-key"),
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "ck"),
            ("CLOUDINARY_API_SECRET", "cs"),
        ]
        .into_iter()
        .collect();

        let config =
            ServiceConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap();
        assert_eq!(config.search.api_key, "px-key");
        assert_eq!(config.search.endpoint, DEFAULT_SEARCH_ENDPOINT);
        assert_eq!(config.search.per_page, 30);
        assert_eq!(
            config.asset_host.upload_url(),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
        assert_eq!(config.orchestrator.credit_policy, CreditPolicy::ChargeOnSuccess);
    }

    #[test]
    fn test_service_config_requires_search_key() {
        let err = ServiceConfig::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains("PEXELS_API_KEY"));

        let err = ServiceConfig::from_lookup(|_| Some("  ".to_string())).unwrap_err();
        assert!(err.to_string().contains("PEXELS_API_KEY"));
    }
}
