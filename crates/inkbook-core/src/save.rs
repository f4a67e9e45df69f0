//! Save coordination for notebook documents.
//!
//! Saves are full replaces: every stored page of the document is deleted and
//! the current ready pages are inserted. At most one save per document runs
//! at a time; a second request while one is in flight is rejected as a
//! [`SaveOutcome::Conflict`] rather than queued.

use crate::config::NotebookConfig;
use crate::notebook::Notebook;
use crate::storage::{PageStorage, StorageError, StoredPage, duplicate_page_index, now_millis};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Quiet period before a debounced save fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// Pause between deleting old pages and inserting new ones.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// A notebook shared between the editing side and background saves.
pub type SharedNotebook = Arc<Mutex<Notebook>>;

/// Timing of the save coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveConfig {
    pub settle_delay: Duration,
    pub debounce_window: Duration,
    /// Delay of the second save after a page is added.
    pub add_page_followup: Duration,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
            debounce_window: DEBOUNCE_WINDOW,
            add_page_followup: DEBOUNCE_WINDOW,
        }
    }
}

/// How a save attempt ended, short of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { pages: usize },
    /// Another save of the same document was in flight. Nothing was written.
    Conflict,
    /// No page was ready. Storage was not touched.
    NothingToSave,
}

/// Save failures. The in-memory notebook is never modified by a failed save.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Failed to serialize pages: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to delete existing pages: {0}")]
    Delete(#[source] StorageError),
    #[error("Failed to insert pages: {0}")]
    Insert(#[source] StorageError),
    #[error("Page index {0} appears more than once")]
    DuplicatePageIndex(usize),
    #[error("Notebook lock poisoned")]
    Poisoned,
}

/// Marks a document as being saved until dropped.
struct InFlight {
    saves: Arc<DashMap<String, ()>>,
    document_id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.saves.remove(&self.document_id);
    }
}

/// A gathered batch waiting for its storage round trip.
///
/// The document stays marked as in flight until the batch is committed or
/// dropped.
pub struct PendingSave<S: PageStorage> {
    storage: Arc<S>,
    settle_delay: Duration,
    pages: Vec<StoredPage>,
    guard: InFlight,
}

impl<S: PageStorage> PendingSave<S> {
    pub fn document_id(&self) -> &str {
        &self.guard.document_id
    }

    pub fn pages(&self) -> &[StoredPage] {
        &self.pages
    }

    /// Replace the stored pages: delete, settle, insert, touch.
    pub async fn commit(self) -> Result<SaveOutcome, SaveError> {
        let document_id = self.guard.document_id.as_str();
        let count = self.pages.len();
        log::info!("Saving {} pages for document {}", count, document_id);

        self.storage
            .delete_pages(document_id)
            .await
            .map_err(SaveError::Delete)?;
        tokio::time::sleep(self.settle_delay).await;
        self.storage
            .insert_pages(document_id, self.pages)
            .await
            .map_err(SaveError::Insert)?;

        if let Err(e) = self
            .storage
            .touch_document(document_id, now_millis())
            .await
        {
            log::warn!("Failed to update modification time of {}: {}", document_id, e);
        }

        log::debug!("Saved {} pages for document {}", count, document_id);
        Ok(SaveOutcome::Saved { pages: count })
    }
}

/// Result of starting a save.
pub enum SaveStart<S: PageStorage> {
    Started(PendingSave<S>),
    Skipped(SaveOutcome),
}

/// Coordinates saves of notebook documents to a storage backend.
pub struct SaveCoordinator<S: PageStorage + 'static> {
    storage: Arc<S>,
    config: SaveConfig,
    in_flight: Arc<DashMap<String, ()>>,
    debounced: DashMap<String, (u64, JoinHandle<()>)>,
    generation: AtomicU64,
}

impl<S: PageStorage + 'static> SaveCoordinator<S> {
    pub fn new(storage: Arc<S>, config: SaveConfig) -> Self {
        Self {
            storage,
            config,
            in_flight: Arc::new(DashMap::new()),
            debounced: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    /// Whether a save of this document is in flight.
    pub fn is_saving(&self, document_id: &str) -> bool {
        self.in_flight.contains_key(document_id)
    }

    /// Whether a debounced save of this document is waiting to fire.
    pub fn has_pending_debounce(&self, document_id: &str) -> bool {
        self.debounced.contains_key(document_id)
    }

    fn try_mark(&self, document_id: &str) -> Option<InFlight> {
        match self.in_flight.entry(document_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(InFlight {
                    saves: Arc::clone(&self.in_flight),
                    document_id: document_id.to_string(),
                })
            }
        }
    }

    /// Gather a notebook's ready pages for saving.
    ///
    /// Runs synchronously so the caller can keep editing once it returns.
    pub fn begin(&self, notebook: &Notebook) -> Result<SaveStart<S>, SaveError> {
        let document_id = notebook.document_id();
        let Some(guard) = self.try_mark(document_id) else {
            log::info!("Save already in progress for document {}, skipping", document_id);
            return Ok(SaveStart::Skipped(SaveOutcome::Conflict));
        };

        let pages = notebook.portable_pages()?;
        if pages.is_empty() {
            log::debug!("No ready pages in document {}, nothing to save", document_id);
            return Ok(SaveStart::Skipped(SaveOutcome::NothingToSave));
        }

        Ok(SaveStart::Started(PendingSave {
            storage: Arc::clone(&self.storage),
            settle_delay: self.config.settle_delay,
            pages,
            guard,
        }))
    }

    /// Start saving an already serialized batch, stored as given.
    ///
    /// Page indices must be distinct; this is checked before the in-flight
    /// mark so a malformed batch never reports a conflict.
    pub fn begin_batch(
        &self,
        document_id: &str,
        mut pages: Vec<StoredPage>,
    ) -> Result<SaveStart<S>, SaveError> {
        if let Some(index) = duplicate_page_index(&pages) {
            log::warn!("Rejected batch for {} with duplicate page index {}", document_id, index);
            return Err(SaveError::DuplicatePageIndex(index));
        }
        let Some(guard) = self.try_mark(document_id) else {
            log::info!("Save already in progress for document {}, skipping", document_id);
            return Ok(SaveStart::Skipped(SaveOutcome::Conflict));
        };
        pages.sort_by_key(|p| p.page_index);
        Ok(SaveStart::Started(PendingSave {
            storage: Arc::clone(&self.storage),
            settle_delay: self.config.settle_delay,
            pages,
            guard,
        }))
    }

    /// Save a notebook now.
    pub async fn save(&self, notebook: &SharedNotebook) -> Result<SaveOutcome, SaveError> {
        let start = {
            let notebook = notebook.lock().map_err(|_| SaveError::Poisoned)?;
            self.begin(&notebook)?
        };
        match start {
            SaveStart::Started(pending) => pending.commit().await,
            SaveStart::Skipped(outcome) => Ok(outcome),
        }
    }

    /// Save a batch of already serialized pages.
    pub async fn save_batch(
        &self,
        document_id: &str,
        pages: Vec<StoredPage>,
    ) -> Result<SaveOutcome, SaveError> {
        match self.begin_batch(document_id, pages)? {
            SaveStart::Started(pending) => pending.commit().await,
            SaveStart::Skipped(outcome) => Ok(outcome),
        }
    }

    /// Schedule a save after the debounce window. Each call restarts the
    /// window for that document.
    pub fn debounced_save(self: &Arc<Self>, notebook: SharedNotebook) -> Result<(), SaveError> {
        let document_id = notebook
            .lock()
            .map_err(|_| SaveError::Poisoned)?
            .document_id()
            .to_string();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let this = Arc::clone(self);
        let key = document_id.clone();
        let window = self.config.debounce_window;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            this.debounced.remove_if(&key, |_, (g, _)| *g == generation);
            // The save runs in its own task so a later trigger cannot abort it.
            let saver = Arc::clone(&this);
            tokio::spawn(async move {
                log_result(&key, saver.save(&notebook).await);
            });
        });

        if let Some((_, (_, previous))) = self.debounced.remove(&document_id) {
            previous.abort();
        }
        self.debounced.insert(document_id, (generation, handle));
        Ok(())
    }

    /// Drop a waiting debounced save.
    pub fn cancel_debounce(&self, document_id: &str) -> bool {
        match self.debounced.remove(document_id) {
            Some((_, (_, handle))) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Save right after a page was added, then again once the new page's
    /// surface has had time to become ready.
    pub async fn save_after_add_page(
        self: &Arc<Self>,
        notebook: &SharedNotebook,
    ) -> Result<SaveOutcome, SaveError> {
        let first = self.save(notebook).await;
        let this = Arc::clone(self);
        let notebook = Arc::clone(notebook);
        let delay = self.config.add_page_followup;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let document_id = match notebook.lock() {
                Ok(nb) => nb.document_id().to_string(),
                Err(_) => return,
            };
            log_result(&document_id, this.save(&notebook).await);
        });
        first
    }

    /// Load a notebook. Failures and empty documents give one blank page.
    pub async fn load(&self, document_id: &str, config: NotebookConfig) -> Notebook {
        match self.storage.load_pages(document_id).await {
            Ok(pages) if pages.is_empty() => {
                log::debug!("Document {} has no pages, starting blank", document_id);
                Notebook::blank(document_id, config)
            }
            Ok(pages) => {
                log::debug!("Loaded {} pages for document {}", pages.len(), document_id);
                Notebook::from_stored(document_id, pages, config)
            }
            Err(e) => {
                log::error!("Failed to load document {}: {}", document_id, e);
                Notebook::blank(document_id, config)
            }
        }
    }
}

fn log_result(document_id: &str, result: Result<SaveOutcome, SaveError>) {
    match result {
        Ok(SaveOutcome::Saved { pages }) => {
            log::debug!("Background save of {} wrote {} pages", document_id, pages)
        }
        Ok(outcome) => log::debug!("Background save of {}: {:?}", document_id, outcome),
        Err(e) => log::error!("Background save of {} failed: {}", document_id, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Rectangle, Shape};
    use crate::storage::MemoryPageStorage;
    use kurbo::Point;
    use serde_json::json;

    fn coordinator() -> Arc<SaveCoordinator<MemoryPageStorage>> {
        Arc::new(SaveCoordinator::new(
            Arc::new(MemoryPageStorage::new()),
            SaveConfig::default(),
        ))
    }

    fn shared(pages: usize) -> SharedNotebook {
        let mut nb = Notebook::blank("doc", NotebookConfig::default());
        for _ in 1..pages {
            nb.add_page();
        }
        nb.mark_all_ready();
        Arc::new(Mutex::new(nb))
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_full_replace() {
        let coord = coordinator();
        let nb = shared(3);
        nb.lock()
            .unwrap()
            .page_mut(1)
            .unwrap()
            .scene
            .add_shape(Shape::Rect(Rectangle::new(Point::ZERO, 5.0, 5.0)));

        assert_eq!(
            coord.save(&nb).await.unwrap(),
            SaveOutcome::Saved { pages: 3 }
        );
        nb.lock().unwrap().delete_page(0).unwrap();
        assert_eq!(
            coord.save(&nb).await.unwrap(),
            SaveOutcome::Saved { pages: 2 }
        );

        let stored = coord.storage().load_pages("doc").await.unwrap();
        let idx: Vec<_> = stored.iter().map(|p| p.page_index).collect();
        assert_eq!(idx, vec![0, 1]);
        assert_eq!(stored[0].scene().unwrap().objects.len(), 1);
        assert!(coord.storage().last_modified("doc").await.unwrap().is_some());
        assert!(!coord.is_saving("doc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_save_conflicts() {
        let coord = coordinator();
        let nb = shared(1);

        let (a, b) = tokio::join!(coord.save(&nb), coord.save(&nb));
        assert_eq!(a.unwrap(), SaveOutcome::Saved { pages: 1 });
        assert_eq!(b.unwrap(), SaveOutcome::Conflict);
        assert_eq!(coord.storage().write_count(), 1);
        assert!(!coord.is_saving("doc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_documents_do_not_conflict() {
        let coord = coordinator();
        let a = shared(1);
        let b = Arc::new(Mutex::new(Notebook::blank("other", NotebookConfig::default())));
        b.lock().unwrap().mark_all_ready();

        let (ra, rb) = tokio::join!(coord.save(&a), coord.save(&b));
        assert_eq!(ra.unwrap(), SaveOutcome::Saved { pages: 1 });
        assert_eq!(rb.unwrap(), SaveOutcome::Saved { pages: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_ready_skips_storage() {
        let coord = coordinator();
        let nb = Arc::new(Mutex::new(Notebook::blank("doc", NotebookConfig::default())));
        assert_eq!(coord.save(&nb).await.unwrap(), SaveOutcome::NothingToSave);
        assert_eq!(coord.storage().write_count(), 0);
        assert_eq!(coord.storage().last_modified("doc").await.unwrap(), None);
        assert!(!coord.is_saving("doc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_insert_releases_lock() {
        let coord = coordinator();
        let nb = shared(2);
        coord.storage().set_fail_inserts(true);

        let err = coord.save(&nb).await.unwrap_err();
        assert!(matches!(err, SaveError::Insert(_)));
        assert!(!coord.is_saving("doc"));
        assert_eq!(nb.lock().unwrap().len(), 2);

        coord.storage().set_fail_inserts(false);
        assert_eq!(
            coord.save(&nb).await.unwrap(),
            SaveOutcome::Saved { pages: 2 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_commit_lets_editing_continue() {
        let coord = coordinator();
        let nb = shared(1);

        let start = coord.begin(&nb.lock().unwrap()).unwrap();
        let SaveStart::Started(pending) = start else {
            panic!("save should start");
        };
        assert!(coord.is_saving("doc"));

        // Edits after gathering do not leak into the batch.
        nb.lock().unwrap().add_page();
        assert_eq!(pending.pages().len(), 1);
        assert_eq!(pending.document_id(), "doc");

        pending.commit().await.unwrap();
        assert!(!coord.is_saving("doc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_pending_save_releases_lock() {
        let coord = coordinator();
        let nb = shared(1);
        let start = coord.begin(&nb.lock().unwrap()).unwrap();
        assert!(coord.is_saving("doc"));
        drop(start);
        assert!(!coord.is_saving("doc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_triggers() {
        let coord = coordinator();
        let nb = shared(1);

        coord.debounced_save(Arc::clone(&nb)).unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        coord.debounced_save(Arc::clone(&nb)).unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        // 1.2 s after the first trigger, but only 0.6 s after the last one.
        assert_eq!(coord.storage().write_count(), 0);
        assert!(coord.has_pending_debounce("doc"));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(coord.storage().write_count(), 1);
        assert!(!coord.has_pending_debounce("doc"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_debounce() {
        let coord = coordinator();
        let nb = shared(1);
        coord.debounced_save(Arc::clone(&nb)).unwrap();
        assert!(coord.cancel_debounce("doc"));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(coord.storage().write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_page_saves_twice() {
        let coord = coordinator();
        let nb = shared(1);
        let new_page = nb.lock().unwrap().add_page();

        assert_eq!(
            coord.save_after_add_page(&nb).await.unwrap(),
            SaveOutcome::Saved { pages: 1 }
        );
        nb.lock().unwrap().mark_surface_ready(new_page);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(coord.storage().write_count(), 2);
        assert_eq!(coord.storage().load_pages("doc").await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_batch_keeps_given_indices() {
        let coord = coordinator();
        let page = |i| StoredPage {
            page_index: i,
            data: json!({}),
        };
        let outcome = coord.save_batch("doc", vec![page(2), page(0)]).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Saved { pages: 2 });
        let idx: Vec<_> = coord
            .storage()
            .load_pages("doc")
            .await
            .unwrap()
            .iter()
            .map(|p| p.page_index)
            .collect();
        assert_eq!(idx, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_load_falls_back_to_blank() {
        let coord = coordinator();
        let nb = coord.load("missing", NotebookConfig::default()).await;
        assert_eq!(nb.len(), 1);
        assert_eq!(nb.document_id(), "missing");

        coord
            .storage()
            .insert_pages(
                "doc",
                vec![StoredPage {
                    page_index: 0,
                    data: json!({
                        "objects": [
                            { "type": "rect", "width": 1, "height": 1 },
                            { "type": "hologram" },
                            { "type": "arrow", "points": [0, 0, 5, 5] }
                        ]
                    }),
                }],
            )
            .await
            .unwrap();
        let nb = coord.load("doc", NotebookConfig::default()).await;
        assert_eq!(nb.page(0).unwrap().scene.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_batch_rejects_duplicate_indices() {
        let coord = coordinator();
        let page = |i| StoredPage {
            page_index: i,
            data: json!({}),
        };
        coord.save_batch("doc", vec![page(0)]).await.unwrap();

        let err = coord
            .save_batch("doc", vec![page(0), page(1), page(0)])
            .await
            .unwrap_err();
        assert!(matches!(err, SaveError::DuplicatePageIndex(0)));
        assert!(!coord.is_saving("doc"));
        // The previous save is left intact.
        assert_eq!(coord.storage().load_pages("doc").await.unwrap().len(), 1);
        assert_eq!(coord.storage().write_count(), 1);
    }
}
