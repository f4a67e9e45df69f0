//! Notebook configuration.

use crate::shapes::{SerializableColor, ShapeDefaults};
use crate::tools::BrushSettings;

/// Page size presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    /// A4 ratio at 96 dpi.
    #[default]
    Standard,
    /// Narrower preset used on tablets.
    Tablet,
}

impl PageSize {
    pub fn width(self) -> f64 {
        match self {
            PageSize::Standard => 794.0,
            PageSize::Tablet => 600.0,
        }
    }

    pub fn height(self) -> f64 {
        match self {
            PageSize::Standard => 1123.0,
            PageSize::Tablet => 848.0,
        }
    }

    /// Pick the preset for a viewport width.
    pub fn for_viewport(width: f64) -> Self {
        if width < Self::Standard.width() {
            PageSize::Tablet
        } else {
            PageSize::Standard
        }
    }
}

/// Settings applied to every page of a notebook.
#[derive(Debug, Clone, PartialEq)]
pub struct NotebookConfig {
    pub page_size: PageSize,
    /// Background of new and cleared pages.
    pub background: SerializableColor,
    /// Initial brush.
    pub brush: BrushSettings,
    pub shape_defaults: ShapeDefaults,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            page_size: PageSize::Standard,
            background: SerializableColor::white(),
            brush: BrushSettings::default(),
            shape_defaults: ShapeDefaults::default(),
        }
    }
}

impl NotebookConfig {
    pub fn with_page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = page_size;
        self
    }
}
