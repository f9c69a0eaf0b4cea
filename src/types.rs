//! Request, record and result types shared across the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Type tag stored on an image record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    /// Uploaded as-is
    #[serde(rename = "original")]
    Original,
    /// Background removed by the segmentation service
    #[serde(rename = "removed")]
    Removed,
    /// Composited onto a catalog background
    #[serde(rename = "preset-bg")]
    PresetBackground,
    /// Composited onto a searched background
    #[serde(rename = "ai-bg")]
    GeneratedBackground,
}

impl ImageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Removed => "removed",
            Self::PresetBackground => "preset-bg",
            Self::GeneratedBackground => "ai-bg",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's image as stored by the image repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_url: String,
    /// Cut-out produced by background removal, if that step has run
    pub removed_bg_url: Option<String>,
    /// Final composite, if a background has been applied
    pub replaced_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: ImageKind,
    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Create a freshly uploaded record
    #[must_use]
    pub fn new(id: Uuid, user_id: Uuid, original_url: impl Into<String>) -> Self {
        Self {
            id,
            user_id,
            original_url: original_url.into(),
            removed_bg_url: None,
            replaced_url: None,
            kind: ImageKind::Original,
            updated_at: Utc::now(),
        }
    }

    /// Attach a background-removed variant
    #[must_use]
    pub fn with_removed_bg(mut self, url: impl Into<String>) -> Self {
        self.removed_bg_url = Some(url.into());
        self.kind = ImageKind::Removed;
        self
    }
}

/// Requested background mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Preset,
    Generate,
}

impl Mode {
    /// Type tag an image receives after a successful composition in this mode
    #[must_use]
    pub fn image_kind(self) -> ImageKind {
        match self {
            Self::Preset => ImageKind::PresetBackground,
            Self::Generate => ImageKind::GeneratedBackground,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preset => write!(f, "preset"),
            Self::Generate => write!(f, "generate"),
        }
    }
}

/// Unvalidated request as it arrives from a handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyBackgroundRequest {
    pub image_id: String,
    pub user_id: String,
    pub mode: Mode,
    #[serde(default, rename = "backgroundId")]
    pub background_id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl ApplyBackgroundRequest {
    /// Request a catalog background
    #[must_use]
    pub fn preset(
        image_id: impl Into<String>,
        user_id: impl Into<String>,
        background_id: impl Into<String>,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            user_id: user_id.into(),
            mode: Mode::Preset,
            background_id: Some(background_id.into()),
            prompt: None,
        }
    }

    /// Request a searched background for a prompt
    #[must_use]
    pub fn generate(
        image_id: impl Into<String>,
        user_id: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            user_id: user_id.into(),
            mode: Mode::Generate,
            background_id: None,
            prompt: Some(prompt.into()),
        }
    }
}

/// Where the background comes from; exactly one variant per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundSource {
    /// Catalog entry, free
    Preset { id: String },
    /// Stock-photo search for a prompt, costs one credit
    Generated { prompt: String },
}

impl BackgroundSource {
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self {
            Self::Preset { .. } => Mode::Preset,
            Self::Generated { .. } => Mode::Generate,
        }
    }

    /// Credits a successful composition with this source costs
    #[must_use]
    pub fn cost(&self) -> u32 {
        match self {
            Self::Preset { .. } => 0,
            Self::Generated { .. } => 1,
        }
    }
}

/// Successful orchestration outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionResult {
    /// Updated image record
    pub image: ImageRecord,
    /// Persisted composite URL
    pub final_url: String,
    /// Credits taken by this call (0 or 1)
    pub credits_deducted: u32,
    /// Encoded PNG bytes
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl CompositionResult {
    #[must_use]
    pub fn credit_charged(&self) -> bool {
        self.credits_deducted > 0
    }

    /// User-facing confirmation reflecting what the ledger actually took
    #[must_use]
    pub fn message(&self) -> &'static str {
        match (self.image.kind, self.credit_charged()) {
            (ImageKind::GeneratedBackground, true) => {
                "AI background generated & applied successfully (1 credit used)"
            },
            (ImageKind::GeneratedBackground, false) => {
                "AI background generated & applied successfully (no credits used)"
            },
            _ => "Background applied successfully (no credits used)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_kind_serializes_to_tags() {
        assert_eq!(
            serde_json::to_string(&ImageKind::PresetBackground).unwrap(),
            "\"preset-bg\""
        );
        assert_eq!(
            serde_json::to_string(&ImageKind::GeneratedBackground).unwrap(),
            "\"ai-bg\""
        );
        assert_eq!(Mode::Generate.image_kind().to_string(), "ai-bg");
    }

    #[test]
    fn test_request_deserializes_from_handler_body() {
        let request: ApplyBackgroundRequest = serde_json::from_str(
            r#"{"image_id": "a", "user_id": "b", "mode": "preset", "backgroundId": "studio-soft"}"#,
        )
        .unwrap();
        assert_eq!(request.mode, Mode::Preset);
        assert_eq!(request.background_id.as_deref(), Some("studio-soft"));
        assert!(request.prompt.is_none());
    }

    #[test]
    fn test_background_source_cost() {
        let preset = BackgroundSource::Preset {
            id: "studio-soft".to_string(),
        };
        let generated = BackgroundSource::Generated {
            prompt: "cozy office".to_string(),
        };
        assert_eq!(preset.cost(), 0);
        assert_eq!(generated.cost(), 1);
        assert_eq!(generated.mode(), Mode::Generate);
    }

    #[test]
    fn test_record_with_removed_bg() {
        let record = ImageRecord::new(Uuid::new_v4(), Uuid::new_v4(), "https://host/a.jpg")
            .with_removed_bg("https://host/a.png");
        assert_eq!(record.kind, ImageKind::Removed);
        assert_eq!(record.removed_bg_url.as_deref(), Some("https://host/a.png"));
        assert!(record.replaced_url.is_none());
    }

    #[test]
    fn test_message_follows_charge() {
        let mut image = ImageRecord::new(Uuid::new_v4(), Uuid::new_v4(), "https://host/a.jpg");
        image.kind = ImageKind::GeneratedBackground;
        let mut result = CompositionResult {
            image,
            final_url: "https://host/c.png".to_string(),
            credits_deducted: 1,
            bytes: Vec::new(),
        };
        assert_eq!(
            result.message(),
            "AI background generated & applied successfully (1 credit used)"
        );

        result.credits_deducted = 0;
        assert_eq!(
            result.message(),
            "AI background generated & applied successfully (no credits used)"
        );

        result.image.kind = ImageKind::PresetBackground;
        assert_eq!(result.message(), "Background applied successfully (no credits used)");
    }
}
