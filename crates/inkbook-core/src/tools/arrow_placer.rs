//! Two-click arrow placement.

use crate::notebook::{Notebook, PageId};
use crate::shapes::{Arrow, Line, Shape, ShapeFlags, ShapeId, ShapeStyle};
use kurbo::Point;

/// Dash pattern of the placement preview.
pub const PREVIEW_DASH: [f64; 2] = [5.0, 5.0];

#[derive(Debug, Clone, Copy)]
struct PendingArrow {
    /// Page holding the preview.
    page: PageId,
    start: Point,
    preview: ShapeId,
}

/// Result of a placement click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// First click: the start point is recorded and a preview is showing.
    Started { preview: ShapeId },
    /// Second click: the arrow was added.
    Placed { arrow: ShapeId },
}

/// Places an arrow with two clicks on the current page, showing a dashed
/// preview in between.
#[derive(Debug, Clone, Default)]
pub struct ArrowPlacer {
    pending: Option<PendingArrow>,
}

impl ArrowPlacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Page holding the pending preview, if any.
    pub fn pending_page(&self) -> Option<PageId> {
        self.pending.map(|p| p.page)
    }

    /// Handle a click at `point` on the current page.
    ///
    /// A placement started on another page is cancelled first, so the click
    /// starts a new one here.
    pub fn click(&mut self, notebook: &mut Notebook, point: Point, style: ShapeStyle) -> Placement {
        let current = notebook.current_page().id();
        if self.pending.is_some_and(|p| p.page != current) {
            self.cancel(notebook);
        }

        let scene = &mut notebook.current_page_mut().scene;
        match self.pending.take() {
            None => {
                let mut preview = Line::with_style(point, point, style);
                preview.dash = Some(PREVIEW_DASH.to_vec());
                preview.flags = ShapeFlags::transient();
                let preview = scene.add_shape(Shape::Line(preview));
                self.pending = Some(PendingArrow {
                    page: current,
                    start: point,
                    preview,
                });
                Placement::Started { preview }
            }
            Some(pending) => {
                scene.remove_shape(pending.preview);
                let arrow = scene.add_shape(Shape::Arrow(Arrow::with_style(
                    pending.start,
                    point,
                    style,
                )));
                Placement::Placed { arrow }
            }
        }
    }

    /// Move the preview's free end to follow the pointer. Only tracks while
    /// the preview's page is current.
    pub fn track(&mut self, notebook: &mut Notebook, point: Point) -> bool {
        let Some(pending) = self.pending else {
            return false;
        };
        let page = notebook.current_page_mut();
        if page.id() != pending.page {
            return false;
        }
        match page.scene.get_mut(pending.preview) {
            Some(Shape::Line(line)) => {
                line.end = point;
                true
            }
            _ => false,
        }
    }

    /// Abort a pending placement and remove the preview from the page that
    /// holds it. Returns true when something was cancelled.
    pub fn cancel(&mut self, notebook: &mut Notebook) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        if let Some(page) = notebook.page_by_id_mut(pending.page) {
            page.scene.remove_shape(pending.preview);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotebookConfig;

    fn notebook() -> Notebook {
        Notebook::blank("doc", NotebookConfig::default())
    }

    #[test]
    fn test_two_clicks_place_arrow() {
        let mut nb = notebook();
        let mut placer = ArrowPlacer::new();

        let Placement::Started { preview } =
            placer.click(&mut nb, Point::new(10.0, 10.0), ShapeStyle::default())
        else {
            panic!("first click should start");
        };
        let scene = &nb.current_page().scene;
        let line = scene.get(preview).and_then(Shape::as_line).unwrap();
        assert_eq!(line.dash.as_deref(), Some(&PREVIEW_DASH[..]));
        assert!(line.flags.temporary);
        assert!(!line.flags.selectable);
        assert_eq!(placer.pending_page(), Some(nb.current_page().id()));

        assert!(placer.track(&mut nb, Point::new(60.0, 40.0)));
        assert_eq!(
            nb.current_page()
                .scene
                .get(preview)
                .and_then(Shape::as_line)
                .unwrap()
                .end,
            Point::new(60.0, 40.0)
        );

        let Placement::Placed { arrow } =
            placer.click(&mut nb, Point::new(80.0, 10.0), ShapeStyle::default())
        else {
            panic!("second click should place");
        };
        let scene = &nb.current_page().scene;
        assert!(!scene.contains(preview));
        assert_eq!(scene.len(), 1);
        let arrow = scene.get(arrow).and_then(Shape::as_arrow).unwrap();
        assert_eq!(arrow.points(), [10.0, 10.0, 80.0, 10.0]);
        assert!(!placer.is_pending());
    }

    #[test]
    fn test_cancel_removes_preview() {
        let mut nb = notebook();
        let mut placer = ArrowPlacer::new();
        placer.click(&mut nb, Point::new(10.0, 10.0), ShapeStyle::default());
        assert_eq!(nb.current_page().scene.len(), 1);

        assert!(placer.cancel(&mut nb));
        assert!(nb.current_page().scene.is_empty());
        assert!(!placer.cancel(&mut nb));
        assert!(!placer.track(&mut nb, Point::ZERO));
    }

    #[test]
    fn test_cancel_after_page_change_cleans_origin_page() {
        let mut nb = notebook();
        nb.add_page();
        let mut placer = ArrowPlacer::new();
        placer.click(&mut nb, Point::new(10.0, 10.0), ShapeStyle::default());

        nb.set_current_page(1).unwrap();
        assert!(!placer.track(&mut nb, Point::new(50.0, 50.0)));
        assert!(placer.cancel(&mut nb));
        assert!(nb.page(0).unwrap().scene.is_empty());
        assert!(nb.page(1).unwrap().scene.is_empty());
    }

    #[test]
    fn test_click_on_other_page_restarts_there() {
        let mut nb = notebook();
        nb.add_page();
        let mut placer = ArrowPlacer::new();
        placer.click(&mut nb, Point::new(10.0, 10.0), ShapeStyle::default());

        nb.set_current_page(1).unwrap();
        let placement = placer.click(&mut nb, Point::new(30.0, 30.0), ShapeStyle::default());
        assert!(matches!(placement, Placement::Started { .. }));
        assert!(nb.page(0).unwrap().scene.is_empty());
        assert_eq!(nb.page(1).unwrap().scene.len(), 1);
        assert_eq!(placer.pending_page(), Some(nb.page(1).unwrap().id()));

        let Placement::Placed { arrow } =
            placer.click(&mut nb, Point::new(90.0, 30.0), ShapeStyle::default())
        else {
            panic!("second click should place");
        };
        let arrow = nb.page(1).unwrap().scene.get(arrow).and_then(Shape::as_arrow).unwrap();
        assert_eq!(arrow.points(), [30.0, 30.0, 90.0, 30.0]);
    }

    #[test]
    fn test_cancel_after_origin_page_deleted() {
        let mut nb = notebook();
        nb.add_page();
        nb.set_current_page(1).unwrap();
        let mut placer = ArrowPlacer::new();
        placer.click(&mut nb, Point::new(10.0, 10.0), ShapeStyle::default());

        nb.delete_page(1).unwrap();
        assert!(placer.cancel(&mut nb));
        assert!(nb.current_page().scene.is_empty());
    }
}
