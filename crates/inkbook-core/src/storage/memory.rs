//! In-memory storage implementation.

use super::{BoxFuture, PageStorage, StorageError, StorageResult, StoredPage, duplicate_page_index};
use std::collections::HashMap;
use std::future::ready;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default, Clone)]
struct DocumentRecord {
    pages: Vec<StoredPage>,
    modified: Option<u64>,
}

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryPageStorage {
    documents: RwLock<HashMap<String, DocumentRecord>>,
    inserts: AtomicUsize,
    fail_inserts: AtomicBool,
}

impl MemoryPageStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful insert batches so far.
    pub fn write_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Make every following insert fail, to exercise error paths.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    fn with_documents<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, DocumentRecord>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut docs = self
            .documents
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        f(&mut docs)
    }
}

impl PageStorage for MemoryPageStorage {
    fn load_pages(&self, document_id: &str) -> BoxFuture<'_, StorageResult<Vec<StoredPage>>> {
        let result = self.with_documents(|docs| {
            let mut pages = docs
                .get(document_id)
                .map(|d| d.pages.clone())
                .unwrap_or_default();
            pages.sort_by_key(|p| p.page_index);
            Ok(pages)
        });
        Box::pin(ready(result))
    }

    fn delete_pages(&self, document_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let result = self.with_documents(|docs| {
            if let Some(doc) = docs.get_mut(document_id) {
                doc.pages.clear();
            }
            Ok(())
        });
        Box::pin(ready(result))
    }

    fn insert_pages(
        &self,
        document_id: &str,
        pages: Vec<StoredPage>,
    ) -> BoxFuture<'_, StorageResult<()>> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Box::pin(ready(Err(StorageError::Other(
                "insert rejected".to_string(),
            ))));
        }
        if let Some(index) = duplicate_page_index(&pages) {
            return Box::pin(ready(Err(StorageError::DuplicatePage(index))));
        }
        let result = self.with_documents(|docs| {
            docs.entry(document_id.to_string())
                .or_default()
                .pages
                .extend(pages);
            Ok(())
        });
        if result.is_ok() {
            self.inserts.fetch_add(1, Ordering::SeqCst);
        }
        Box::pin(ready(result))
    }

    fn touch_document(
        &self,
        document_id: &str,
        modified_ms: u64,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let result = self.with_documents(|docs| {
            docs.entry(document_id.to_string()).or_default().modified = Some(modified_ms);
            Ok(())
        });
        Box::pin(ready(result))
    }

    fn last_modified(&self, document_id: &str) -> BoxFuture<'_, StorageResult<Option<u64>>> {
        let result = self.with_documents(|docs| Ok(docs.get(document_id).and_then(|d| d.modified)));
        Box::pin(ready(result))
    }
}
