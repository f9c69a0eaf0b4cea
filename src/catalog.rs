//! Curated preset backgrounds
//!
//! The catalog is static data: it is built once and only read afterwards, so
//! lookups need no locking and preset compositions never touch the network
//! beyond fetching the background image itself.

use crate::config::{ComposeOverrides, ComposeParameters};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base URL of the hosted preset images
pub const PRESET_ASSET_BASE: &str = "https://res.cloudinary.com/bgcompose/image/upload/presets";

/// Grouping shown to users when browsing presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Studio,
    Office,
    Outdoor,
    Abstract,
}

impl Category {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Studio => "studio",
            Self::Office => "office",
            Self::Outdoor => "outdoor",
            Self::Abstract => "abstract",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetBackground {
    pub id: String,
    pub label: String,
    pub image_url: String,
    pub category: Category,
    /// Per-background tweaks merged onto the default parameters
    #[serde(default)]
    pub compose: ComposeOverrides,
}

impl PresetBackground {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        image_url: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            image_url: image_url.into(),
            category,
            compose: ComposeOverrides::NONE,
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: ComposeOverrides) -> Self {
        self.compose = overrides;
        self
    }

    /// Effective parameters for this background
    #[must_use]
    pub fn parameters(&self, base: &ComposeParameters) -> ComposeParameters {
        base.with_overrides(&self.compose)
    }
}

fn hosted(id: &str) -> String {
    format!("{}/{}.png", PRESET_ASSET_BASE, id)
}

/// Read-only set of preset backgrounds
#[derive(Debug, Clone)]
pub struct BackgroundCatalog {
    entries: Vec<PresetBackground>,
}

impl Default for BackgroundCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BackgroundCatalog {
    /// The shipped presets
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_entries(vec![
            PresetBackground::new(
                "studio-soft",
                "Studio - Soft Light",
                hosted("studio-soft"),
                Category::Studio,
            ),
            PresetBackground::new(
                "studio-dark",
                "Studio - Dark Gradient",
                hosted("studio-dark"),
                Category::Studio,
            )
            .with_overrides(ComposeOverrides {
                brightness: Some(1.05),
                ..ComposeOverrides::NONE
            }),
            PresetBackground::new(
                "office-modern",
                "Modern Office",
                hosted("office-modern"),
                Category::Office,
            ),
            PresetBackground::new(
                "outdoor-city",
                "Outdoor - City Blur",
                hosted("outdoor-city"),
                Category::Outdoor,
            )
            .with_overrides(ComposeOverrides {
                bg_blur: Some(4.0),
                ..ComposeOverrides::NONE
            }),
        ])
    }

    /// Catalog over arbitrary entries; later duplicates of an id are ignored
    #[must_use]
    pub fn from_entries(entries: Vec<PresetBackground>) -> Self {
        let mut unique: Vec<PresetBackground> = Vec::with_capacity(entries.len());
        for entry in entries {
            if unique.iter().any(|existing| existing.id == entry.id) {
                log::warn!("Duplicate preset id '{}' ignored", entry.id);
                continue;
            }
            unique.push(entry);
        }
        Self { entries: unique }
    }

    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<&PresetBackground> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    #[must_use]
    pub fn list(&self) -> &[PresetBackground] {
        &self.entries
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &PresetBackground> {
        self.entries
            .iter()
            .filter(move |entry| entry.category == category)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_presets() {
        let catalog = BackgroundCatalog::builtin();
        assert_eq!(catalog.len(), 4);

        let soft = catalog.by_id("studio-soft").unwrap();
        assert_eq!(soft.category, Category::Studio);
        assert!(soft.image_url.ends_with("/studio-soft.png"));
        assert_eq!(soft.compose, ComposeOverrides::NONE);

        assert!(catalog.by_id("missing").is_none());
        assert!(catalog.by_id("Studio-Soft").is_none());
    }

    #[test]
    fn test_by_category() {
        let catalog = BackgroundCatalog::default();
        let studio: Vec<_> = catalog.by_category(Category::Studio).map(|e| e.id.as_str()).collect();
        assert_eq!(studio, vec!["studio-soft", "studio-dark"]);
        assert_eq!(catalog.by_category(Category::Abstract).count(), 0);
    }

    #[test]
    fn test_overrides_merge_onto_defaults() {
        let catalog = BackgroundCatalog::builtin();
        let base = ComposeParameters::default();

        let city = catalog.by_id("outdoor-city").unwrap().parameters(&base);
        assert!((city.bg_blur - 4.0).abs() < f32::EPSILON);
        assert!((city.scale - base.scale).abs() < f32::EPSILON);

        let soft = catalog.by_id("studio-soft").unwrap().parameters(&base);
        assert_eq!(soft, base);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let catalog = BackgroundCatalog::from_entries(vec![
            PresetBackground::new("a", "First", "https://x/1.png", Category::Abstract),
            PresetBackground::new("a", "Second", "https://x/2.png", Category::Abstract),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.by_id("a").unwrap().label, "First");
    }

    #[test]
    fn test_category_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Category::Outdoor).unwrap(), "\"outdoor\"");
    }
}
