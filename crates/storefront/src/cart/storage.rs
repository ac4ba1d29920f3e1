//! Guest cart persistence.
//!
//! The guest cart is exactly one record: the serialized line-item list for
//! this browser profile. Nothing else in the engine touches persistent local
//! state.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

use sundrift_core::LineItem;

/// Errors from guest cart storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored record could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Where the guest cart record lives.
///
/// Selected by the cart store's identity mode: guest mutations write here,
/// authenticated carts live behind the cart gateway instead.
#[async_trait]
pub trait GuestCartStorage: Send + Sync {
    /// Load the persisted line items; `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<Vec<LineItem>>, StorageError>;

    /// Persist the full line-item list, replacing any previous record.
    async fn save(&self, items: &[LineItem]) -> Result<(), StorageError>;

    /// Delete the record.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// JSON-file-backed guest cart storage.
pub struct JsonFileCartStorage {
    path: PathBuf,
}

impl JsonFileCartStorage {
    /// Create storage backed by the given file path.
    ///
    /// Parent directories are created on the first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl GuestCartStorage for JsonFileCartStorage {
    async fn load(&self) -> Result<Option<Vec<LineItem>>, StorageError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save(&self, items: &[LineItem]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(items)?;
        fs::write(&self.path, bytes).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory guest cart storage for tests and development.
#[derive(Default)]
pub struct MemoryCartStorage {
    record: RwLock<Option<Vec<LineItem>>>,
}

impl MemoryCartStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently persisted record, for assertions.
    pub async fn persisted(&self) -> Option<Vec<LineItem>> {
        self.record.read().await.clone()
    }
}

#[async_trait]
impl GuestCartStorage for MemoryCartStorage {
    async fn load(&self) -> Result<Option<Vec<LineItem>>, StorageError> {
        Ok(self.record.read().await.clone())
    }

    async fn save(&self, items: &[LineItem]) -> Result<(), StorageError> {
        *self.record.write().await = Some(items.to_vec());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.record.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sundrift_core::{Money, ProductRef};

    fn items() -> Vec<LineItem> {
        vec![
            LineItem::new(ProductRef::new("prod-1"), Money::from_major(100), 2),
            LineItem::new(ProductRef::new("prod-2"), Money::from_major(50), 1),
        ]
    }

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileCartStorage::new(dir.path().join("nested/guest_cart.json"));

        assert!(storage.load().await.unwrap().is_none());

        let items = items();
        storage.save(&items).await.unwrap();
        assert_eq!(storage.load().await.unwrap(), Some(items));

        storage.clear().await.unwrap();
        assert!(storage.load().await.unwrap().is_none());
        // Clearing twice is fine.
        storage.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_storage_corrupt_record_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guest_cart.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let storage = JsonFileCartStorage::new(&path);
        assert!(matches!(
            storage.load().await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryCartStorage::new();
        assert!(storage.load().await.unwrap().is_none());

        let items = items();
        storage.save(&items).await.unwrap();
        assert_eq!(storage.persisted().await, Some(items));

        storage.clear().await.unwrap();
        assert!(storage.persisted().await.is_none());
    }
}
