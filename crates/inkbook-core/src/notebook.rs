//! Page store: the ordered pages of one notebook document.

use crate::config::NotebookConfig;
use crate::laser::LaserSession;
use crate::portable::SceneReviver;
use crate::scene::Scene;
use crate::storage::StoredPage;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

/// Stable identifier of a page. Survives re-indexing.
pub type PageId = Uuid;

/// Whether a page's drawing surface exists yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceState {
    /// The host has not built the surface; the page is not saved.
    #[default]
    Pending,
    Ready,
}

/// Errors from page store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("Cannot delete the last page")]
    LastPage,
    #[error("Page index {index} out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },
}

/// One page of a notebook.
#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    index: usize,
    pub scene: Scene,
    surface: SurfaceState,
    pub laser: LaserSession,
}

impl Page {
    /// An empty page with a pending surface.
    pub fn blank(index: usize, config: &NotebookConfig) -> Self {
        Self::with_scene(
            index,
            Scene::new(
                config.page_size.width(),
                config.page_size.height(),
                config.background,
            ),
        )
    }

    pub fn with_scene(index: usize, scene: Scene) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            scene,
            surface: SurfaceState::Pending,
            laser: LaserSession::new(),
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn surface(&self) -> SurfaceState {
        self.surface
    }

    pub fn is_ready(&self) -> bool {
        self.surface == SurfaceState::Ready
    }

    /// Drop every laser stroke and cancel the session's timers.
    fn release_laser(&mut self) {
        for id in self.laser.strokes().to_vec() {
            self.scene.remove_shape(id);
        }
        self.laser.reset();
    }
}

/// A notebook document: ordered pages and a current page.
#[derive(Debug, Clone)]
pub struct Notebook {
    document_id: String,
    pages: Vec<Page>,
    current: usize,
    pub config: NotebookConfig,
}

impl Notebook {
    /// A notebook with a single blank page.
    pub fn blank(document_id: impl Into<String>, config: NotebookConfig) -> Self {
        let pages = vec![Page::blank(0, &config)];
        Self {
            document_id: document_id.into(),
            pages,
            current: 0,
            config,
        }
    }

    /// Rebuild a notebook from stored pages.
    ///
    /// Pages are ordered by their stored index; records that fail to revive
    /// are skipped and a page whose data cannot be decoded comes back blank.
    /// No pages at all yields one blank page.
    pub fn from_stored(
        document_id: impl Into<String>,
        mut stored: Vec<StoredPage>,
        config: NotebookConfig,
    ) -> Self {
        if stored.is_empty() {
            return Self::blank(document_id, config);
        }
        stored.sort_by_key(|p| p.page_index);
        let reviver = SceneReviver::new(config.shape_defaults.clone());
        let document_id = document_id.into();
        let pages = stored
            .iter()
            .enumerate()
            .map(|(index, page)| match page.scene() {
                Ok(portable) => Page::with_scene(index, Scene::from_portable(&portable, &reviver)),
                Err(e) => {
                    log::warn!(
                        "Page {} of {} could not be decoded, starting it blank: {}",
                        page.page_index,
                        document_id,
                        e
                    );
                    Page::blank(index, &config)
                }
            })
            .collect();
        Self {
            document_id,
            pages,
            current: 0,
            config,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Never true: a notebook keeps at least one page.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn page_mut(&mut self, index: usize) -> Option<&mut Page> {
        self.pages.get_mut(index)
    }

    pub fn page_by_id(&self, id: PageId) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn page_by_id_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.id == id)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_page(&self) -> &Page {
        &self.pages[self.current]
    }

    pub fn current_page_mut(&mut self) -> &mut Page {
        &mut self.pages[self.current]
    }

    pub fn set_current_page(&mut self, index: usize) -> Result<(), PageError> {
        self.check_index(index)?;
        self.current = index;
        Ok(())
    }

    /// Append an empty page. Its surface starts out pending.
    pub fn add_page(&mut self) -> PageId {
        let page = Page::blank(self.pages.len(), &self.config);
        let id = page.id;
        log::debug!("Added page {} to {}", page.index, self.document_id);
        self.pages.push(page);
        id
    }

    /// Remove a page and renumber the rest. The last page cannot be deleted.
    pub fn delete_page(&mut self, index: usize) -> Result<(), PageError> {
        self.check_index(index)?;
        if self.pages.len() == 1 {
            return Err(PageError::LastPage);
        }
        let mut page = self.pages.remove(index);
        page.release_laser();
        log::debug!("Released surface of page {} ({})", index, page.id);

        self.reindex();
        if self.current >= self.pages.len() || self.current > index {
            self.current = self.current.saturating_sub(1);
        }
        Ok(())
    }

    /// Empty a page, reset its background and drop its laser strokes.
    pub fn clear_page(&mut self, index: usize) -> Result<(), PageError> {
        self.check_index(index)?;
        let background = self.config.background;
        let page = &mut self.pages[index];
        page.laser.reset();
        page.scene.clear();
        page.scene.background = background;
        Ok(())
    }

    /// Whether the page's surface is ready. Unknown pages are not.
    pub fn readiness(&self, id: PageId) -> bool {
        self.page_by_id(id).is_some_and(Page::is_ready)
    }

    /// Record that the host built the surface for a page.
    pub fn mark_surface_ready(&mut self, id: PageId) -> bool {
        match self.page_by_id_mut(id) {
            Some(page) => {
                page.surface = SurfaceState::Ready;
                true
            }
            None => false,
        }
    }

    /// Mark every page ready, for hosts without deferred surfaces.
    pub fn mark_all_ready(&mut self) {
        for page in &mut self.pages {
            page.surface = SurfaceState::Ready;
        }
    }

    /// Advance laser timelines on every page. Returns true if any scene changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.pages
            .iter_mut()
            .fold(false, |changed, page| page.laser.advance(&mut page.scene, now) | changed)
    }

    /// Earliest laser deadline across all pages.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pages.iter().filter_map(|p| p.laser.next_deadline()).min()
    }

    /// Encode ready pages for persistence.
    ///
    /// Pending pages are skipped and the result is numbered consecutively
    /// from zero.
    pub fn portable_pages(&self) -> Result<Vec<StoredPage>, serde_json::Error> {
        let mut out = Vec::with_capacity(self.pages.len());
        for page in self.pages.iter().filter(|p| p.is_ready()) {
            out.push(StoredPage::from_scene(out.len(), &page.scene.to_portable()?)?);
        }
        Ok(out)
    }

    fn reindex(&mut self) {
        for (i, page) in self.pages.iter_mut().enumerate() {
            page.index = i;
        }
    }

    fn check_index(&self, index: usize) -> Result<(), PageError> {
        if index < self.pages.len() {
            Ok(())
        } else {
            Err(PageError::OutOfRange {
                index,
                len: self.pages.len(),
            })
        }
    }
}
