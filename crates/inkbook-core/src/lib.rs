//! InkBook Core Library
//!
//! Scene engine for multi-page vector notebooks: shapes and the arrow
//! composite, drawing tools, the laser pointer, the portable scene format,
//! the page store and the save coordinator.

pub mod config;
pub mod laser;
pub mod notebook;
pub mod portable;
pub mod save;
pub mod scene;
pub mod shapes;
pub mod storage;
pub mod tools;

pub use config::{NotebookConfig, PageSize};
pub use laser::{LaserPhase, LaserSession};
pub use notebook::{Notebook, Page, PageError, PageId, SurfaceState};
pub use portable::{PortableScene, Revived, Reviver, SceneReviver};
pub use save::{SaveConfig, SaveCoordinator, SaveError, SaveOutcome, SharedNotebook};
pub use scene::Scene;
pub use storage::{FilePageStorage, MemoryPageStorage, PageStorage, StorageError, StoredPage};
pub use tools::{BrushSettings, ToolKind, ToolManager};
