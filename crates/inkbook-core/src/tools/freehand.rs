//! Freehand stroke interpretation.
//!
//! A finished pen stroke that stays close to its chord becomes a straight
//! [`Line`]; the arrow brush turns any stroke into an [`Arrow`] between its
//! first and last samples.

use crate::shapes::{Arrow, Line, Path, ShapeStyle};
use kurbo::Point;

/// Maximum distance of any sample from the chord for a stroke to count as straight.
pub const STRAIGHT_TOLERANCE: f64 = 5.0;

/// Shortest chord that is converted to a line.
pub const MIN_LINE_LENGTH: f64 = 10.0;

/// Perpendicular distance from `point` to the infinite line through
/// `line_start` and `line_end`.
pub fn perpendicular_distance(point: Point, line_start: Point, line_end: Point) -> f64 {
    let dx = line_end.x - line_start.x;
    let dy = line_end.y - line_start.y;

    let line_len = (dx * dx + dy * dy).sqrt();
    if line_len < f64::EPSILON {
        // Line is a point
        return (point - line_start).hypot();
    }

    // Twice the triangle area over the base
    (dy * point.x - dx * point.y + line_end.x * line_start.y - line_end.y * line_start.x).abs()
        / line_len
}

/// The chord of a stroke, if the stroke is straight enough to replace.
///
/// Needs at least two samples, a chord of at least [`MIN_LINE_LENGTH`] and
/// every interior sample within [`STRAIGHT_TOLERANCE`] of it.
pub fn straight_chord(points: &[Point]) -> Option<(Point, Point)> {
    let (&first, rest) = points.split_first()?;
    let (&last, interior) = rest.split_last()?;

    if (last - first).hypot() < MIN_LINE_LENGTH {
        return None;
    }
    interior
        .iter()
        .all(|p| perpendicular_distance(*p, first, last) <= STRAIGHT_TOLERANCE)
        .then_some((first, last))
}

/// Replace a straight pen path with a line carrying its stroke, width and
/// selectability. Returns `None` when the path should be kept as drawn.
pub fn straighten(path: &Path) -> Option<Line> {
    let (start, end) = straight_chord(&path.points)?;
    let mut line = Line::with_style(
        start,
        end,
        ShapeStyle {
            fill_color: None,
            ..path.style.clone()
        },
    );
    line.flags.selectable = path.flags.selectable;
    Some(line)
}

/// Arrow brush: keep only the endpoints of a stroke.
pub fn arrow_from_stroke(points: &[Point], style: ShapeStyle) -> Option<Arrow> {
    match points {
        [first, .., last] => Some(Arrow::with_style(*first, *last, style)),
        _ => None,
    }
}
