//! Click-to-place primitives.

use super::BrushSettings;
use crate::shapes::{
    Circle, PLACEHOLDER_TEXT, Rectangle, ShapeDefaults, ShapeStyle, Textbox,
};
use kurbo::Point;

/// Side of a rectangle placed with one click.
pub const PLACED_RECT_SIZE: f64 = 100.0;

/// Corner radius of a placed rectangle.
pub const PLACED_RECT_RADIUS: f64 = 10.0;

/// Radius of a circle placed with one click.
pub const PLACED_CIRCLE_RADIUS: f64 = 50.0;

/// Offset from the click to the top-left of a placed text box.
const TEXT_OFFSET: (f64, f64) = (50.0, 12.0);

fn outline_style(brush: &BrushSettings, defaults: &ShapeDefaults) -> ShapeStyle {
    ShapeStyle {
        stroke_color: Some(brush.color),
        fill_color: None,
        ..ShapeStyle::from_defaults(defaults)
    }
}

/// A rounded 100×100 outline centred on the click.
pub fn place_rectangle(at: Point, brush: &BrushSettings, defaults: &ShapeDefaults) -> Rectangle {
    let mut rect = Rectangle::centered(at, PLACED_RECT_SIZE, PLACED_RECT_SIZE);
    rect.rx = PLACED_RECT_RADIUS;
    rect.ry = PLACED_RECT_RADIUS;
    rect.style = outline_style(brush, defaults);
    rect
}

/// A circle outline centred on the click.
pub fn place_circle(at: Point, brush: &BrushSettings, defaults: &ShapeDefaults) -> Circle {
    let mut circle = Circle::new(at, PLACED_CIRCLE_RADIUS);
    circle.style = outline_style(brush, defaults);
    circle
}

/// A placeholder text box just up and left of the click, filled with the brush color.
pub fn place_textbox(at: Point, brush: &BrushSettings, defaults: &ShapeDefaults) -> Textbox {
    let mut text = Textbox::new(
        Point::new(at.x - TEXT_OFFSET.0, at.y - TEXT_OFFSET.1),
        PLACEHOLDER_TEXT,
    );
    text.style.fill_color = Some(brush.color);
    text.style.chrome = defaults.chrome;
    text
}
