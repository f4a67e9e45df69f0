//! Storage abstraction for page persistence.
//!
//! A document is stored as a list of pages, each holding one portable scene.
//! Backends only offer the primitive steps; the save coordinator composes
//! them into a full replace.

mod file;
mod memory;

pub use file::FilePageStorage;
pub use memory::MemoryPageStorage;

use crate::portable::PortableScene;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Duplicate page index {0}")]
    DuplicatePage(usize),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async storage operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One persisted page.
///
/// `data` holds a serialized [`PortableScene`] and is stored exactly as
/// written, including keys this crate does not know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPage {
    pub page_index: usize,
    pub data: Value,
}

impl StoredPage {
    pub fn from_scene(page_index: usize, scene: &PortableScene) -> Result<Self, serde_json::Error> {
        Ok(Self {
            page_index,
            data: serde_json::to_value(scene)?,
        })
    }

    /// Decode the page's scene.
    pub fn scene(&self) -> Result<PortableScene, serde_json::Error> {
        PortableScene::deserialize(&self.data)
    }
}

/// Trait for page storage backends.
pub trait PageStorage: Send + Sync {
    /// All pages of a document, ascending by index. Unknown documents have none.
    fn load_pages(&self, document_id: &str) -> BoxFuture<'_, StorageResult<Vec<StoredPage>>>;

    /// Remove every stored page of a document.
    fn delete_pages(&self, document_id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// Store a batch of pages.
    fn insert_pages(
        &self,
        document_id: &str,
        pages: Vec<StoredPage>,
    ) -> BoxFuture<'_, StorageResult<()>>;

    /// Update the document's last-modified marker (milliseconds since the epoch).
    fn touch_document(&self, document_id: &str, modified_ms: u64)
    -> BoxFuture<'_, StorageResult<()>>;

    /// Last-modified marker, if the document was ever touched.
    fn last_modified(&self, document_id: &str) -> BoxFuture<'_, StorageResult<Option<u64>>>;
}

/// First `page_index` that appears more than once in a batch, if any.
pub fn duplicate_page_index(pages: &[StoredPage]) -> Option<usize> {
    let mut seen = HashSet::with_capacity(pages.len());
    pages
        .iter()
        .map(|p| p.page_index)
        .find(|index| !seen.insert(*index))
}

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn page(index: usize) -> StoredPage {
        StoredPage {
            page_index: index,
            data: json!({}),
        }
    }

    #[test]
    fn test_duplicate_page_index() {
        assert_eq!(duplicate_page_index(&[]), None);
        assert_eq!(duplicate_page_index(&[page(0), page(2), page(1)]), None);
        assert_eq!(duplicate_page_index(&[page(0), page(1), page(1), page(0)]), Some(1));
    }

    #[test]
    fn test_scene_decoding() {
        let stored = StoredPage {
            page_index: 0,
            data: json!({ "objects": [{ "type": "rect" }], "version": "5.3.0" }),
        };
        let scene = stored.scene().unwrap();
        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.canvas_width, 794.0);

        let bad = StoredPage {
            page_index: 0,
            data: json!({ "objects": "nope" }),
        };
        assert!(bad.scene().is_err());

        let encoded = StoredPage::from_scene(3, &PortableScene::default()).unwrap();
        assert_eq!(encoded.page_index, 3);
        assert_eq!(encoded.data["background"], "#ffffff");
    }
}
