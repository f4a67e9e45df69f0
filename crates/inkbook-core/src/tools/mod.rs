//! Tool system for notebook pages.

mod arrow_placer;
mod freehand;
mod placement;

pub use arrow_placer::{ArrowPlacer, PREVIEW_DASH, Placement};
pub use freehand::{
    MIN_LINE_LENGTH, STRAIGHT_TOLERANCE, arrow_from_stroke, perpendicular_distance,
    straight_chord, straighten,
};
pub use placement::{
    PLACED_CIRCLE_RADIUS, PLACED_RECT_RADIUS, PLACED_RECT_SIZE, place_circle, place_rectangle,
    place_textbox,
};

use crate::laser::{self, LaserSession};
use crate::notebook::Notebook;
use crate::shapes::{Path, SerializableColor, Shape, ShapeDefaults, ShapeId, ShapeStyle};
use kurbo::Point;
use std::time::Instant;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToolKind {
    Select,
    #[default]
    Pen,
    /// Freehand stroke reduced to an arrow on release.
    ArrowBrush,
    /// Two-click arrow placement.
    Arrow,
    Laser,
    Rectangle,
    Circle,
    Text,
}

impl ToolKind {
    /// Tools that capture a freehand stroke between pointer down and up.
    pub fn is_stroke_tool(self) -> bool {
        matches!(self, ToolKind::Pen | ToolKind::ArrowBrush | ToolKind::Laser)
    }
}

/// Brush color and width for new strokes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushSettings {
    pub color: SerializableColor,
    pub width: f64,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            color: SerializableColor::black(),
            width: 3.0,
        }
    }
}

/// State of a tool interaction.
#[derive(Debug, Clone, Default)]
pub enum ToolState {
    /// Tool is idle, waiting for interaction.
    #[default]
    Idle,
    /// A stroke is being captured.
    Stroking {
        /// Samples so far.
        points: Vec<Point>,
    },
}

/// Manages the current tool and routes pointer input to a page.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    /// Currently selected tool.
    pub current_tool: ToolKind,
    /// Current state of the tool.
    pub state: ToolState,
    pub brush: BrushSettings,
    pub defaults: ShapeDefaults,
    placer: ArrowPlacer,
}

impl ToolManager {
    /// Create a new tool manager.
    pub fn new(brush: BrushSettings, defaults: ShapeDefaults) -> Self {
        Self {
            brush,
            defaults,
            ..Self::default()
        }
    }

    /// Switch tools. A pending arrow placement is cancelled and its preview
    /// removed from whichever page holds it; laser sessions keep running.
    pub fn set_tool(&mut self, tool: ToolKind, notebook: &mut Notebook) {
        if tool != self.current_tool {
            self.placer.cancel(notebook);
        }
        self.current_tool = tool;
        self.state = ToolState::Idle;
    }

    /// Brush style for strokes and arrows.
    pub fn stroke_style(&self) -> ShapeStyle {
        ShapeStyle {
            stroke_color: Some(self.brush.color),
            stroke_width: self.brush.width,
            ..ShapeStyle::from_defaults(&self.defaults)
        }
    }

    /// Change the brush color and recolor `selected` on the current page, if any.
    pub fn set_color(
        &mut self,
        color: SerializableColor,
        notebook: &mut Notebook,
        selected: Option<ShapeId>,
    ) {
        self.brush.color = color;
        let scene = &mut notebook.current_page_mut().scene;
        if let Some(shape) = selected.and_then(|id| scene.get_mut(id)) {
            shape.recolor(color);
        }
    }

    /// Pointer pressed on the current page. Click tools act here and return
    /// the created shape.
    pub fn pointer_down(&mut self, notebook: &mut Notebook, point: Point) -> Option<ShapeId> {
        let shape = match self.current_tool {
            tool if tool.is_stroke_tool() => {
                if tool == ToolKind::Laser {
                    notebook.current_page_mut().laser.stroke_started();
                }
                self.state = ToolState::Stroking {
                    points: vec![point],
                };
                return None;
            }
            ToolKind::Arrow => {
                return match self.placer.click(notebook, point, self.stroke_style()) {
                    Placement::Started { .. } => None,
                    Placement::Placed { arrow } => Some(arrow),
                };
            }
            ToolKind::Rectangle => {
                Shape::Rect(place_rectangle(point, &self.brush, &self.defaults))
            }
            ToolKind::Circle => Shape::Circle(place_circle(point, &self.brush, &self.defaults)),
            ToolKind::Text => Shape::Textbox(place_textbox(point, &self.brush, &self.defaults)),
            _ => return None,
        };
        Some(notebook.current_page_mut().scene.add_shape(shape))
    }

    /// Pointer moved.
    pub fn pointer_move(&mut self, notebook: &mut Notebook, point: Point) {
        match &mut self.state {
            ToolState::Stroking { points } => points.push(point),
            ToolState::Idle if self.current_tool == ToolKind::Arrow => {
                self.placer.track(notebook, point);
            }
            ToolState::Idle => {}
        }
    }

    /// Pointer released. Finishes a stroke on the current page and returns
    /// the shape it became.
    pub fn pointer_up(
        &mut self,
        notebook: &mut Notebook,
        point: Point,
        now: Instant,
    ) -> Option<ShapeId> {
        let ToolState::Stroking { mut points } = std::mem::take(&mut self.state) else {
            return None;
        };
        if points.last() != Some(&point) {
            points.push(point);
        }

        let page = notebook.current_page_mut();
        match self.current_tool {
            ToolKind::Pen => {
                let path = Path::with_style(points, self.stroke_style());
                let shape = match straighten(&path) {
                    Some(line) => Shape::Line(line),
                    None => Shape::Path(path),
                };
                Some(page.scene.add_shape(shape))
            }
            ToolKind::ArrowBrush => {
                let arrow = arrow_from_stroke(&points, self.stroke_style())?;
                Some(page.scene.add_shape(Shape::Arrow(arrow)))
            }
            ToolKind::Laser => {
                let stroke = LaserSession::make_stroke(points, self.brush.width);
                Some(laser::commit_stroke(&mut page.laser, &mut page.scene, stroke, now))
            }
            _ => None,
        }
    }

    /// Escape key. Cancels a pending arrow placement or an open stroke.
    pub fn escape(&mut self, notebook: &mut Notebook) -> bool {
        let stroke = matches!(
            std::mem::take(&mut self.state),
            ToolState::Stroking { .. }
        );
        self.placer.cancel(notebook) || stroke
    }

    /// Check if a stroke is being captured.
    pub fn is_active(&self) -> bool {
        matches!(self.state, ToolState::Stroking { .. })
    }

    pub fn is_placing_arrow(&self) -> bool {
        self.placer.is_pending()
    }

    /// Live preview of the stroke being captured, for the host to draw.
    pub fn preview_shape(&self) -> Option<Shape> {
        let ToolState::Stroking { points } = &self.state else {
            return None;
        };
        if points.len() < 2 {
            return None;
        }
        let path = if self.current_tool == ToolKind::Laser {
            LaserSession::make_stroke(points.clone(), self.brush.width)
        } else {
            let mut path = Path::with_style(points.clone(), self.stroke_style());
            path.flags = crate::shapes::ShapeFlags::transient();
            path
        };
        Some(Shape::Path(path))
    }
}
