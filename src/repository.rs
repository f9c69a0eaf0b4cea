//! Image record storage

use crate::{
    error::{ComposeError, Result},
    types::{ImageKind, ImageRecord},
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Persistence for image records
#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ImageRecord>>;

    /// Store a composite URL and type tag on an existing record
    ///
    /// # Errors
    /// - `ComposeError::NotFound` if the record vanished
    /// - `ComposeError::Persist` if the write failed
    async fn update_replaced(&self, id: Uuid, url: &str, kind: ImageKind) -> Result<ImageRecord>;
}

/// Repository kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryImageRepository {
    records: Mutex<HashMap<Uuid, ImageRecord>>,
}

impl InMemoryImageRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record
    pub fn insert(&self, record: ImageRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(record.id, record);
        }
    }

    /// Snapshot of a record, bypassing the async trait
    pub fn get(&self, id: Uuid) -> Option<ImageRecord> {
        self.records.lock().ok()?.get(&id).cloned()
    }
}

#[async_trait]
impl ImageRepository for InMemoryImageRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ImageRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| ComposeError::internal("image repository lock poisoned"))?;
        Ok(records.get(&id).cloned())
    }

    async fn update_replaced(&self, id: Uuid, url: &str, kind: ImageKind) -> Result<ImageRecord> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| ComposeError::persist("image repository lock poisoned"))?;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| ComposeError::not_found("Image"))?;

        record.replaced_url = Some(url.to_string());
        record.kind = kind;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_replaced() {
        let repo = InMemoryImageRepository::new();
        let record = ImageRecord::new(Uuid::new_v4(), Uuid::new_v4(), "https://host/a.jpg")
            .with_removed_bg("https://host/a.png");
        let before = record.updated_at;
        repo.insert(record.clone());

        let updated = repo
            .update_replaced(record.id, "https://host/final.png", ImageKind::PresetBackground)
            .await
            .unwrap();
        assert_eq!(updated.replaced_url.as_deref(), Some("https://host/final.png"));
        assert_eq!(updated.kind, ImageKind::PresetBackground);
        assert_eq!(updated.removed_bg_url, record.removed_bg_url);
        assert!(updated.updated_at >= before);
        assert_eq!(repo.get(record.id).unwrap(), updated);
    }

    #[tokio::test]
    async fn test_missing_record() {
        let repo = InMemoryImageRepository::new();
        let id = Uuid::new_v4();
        assert!(repo.find_by_id(id).await.unwrap().is_none());

        let err = repo
            .update_replaced(id, "https://host/x.png", ImageKind::GeneratedBackground)
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 404);
    }
}
