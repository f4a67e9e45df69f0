//! Line shape.

use super::{ShapeError, ShapeFlags, ShapeId, ShapeStyle, ShapeTrait, Transform};
use crate::portable::{CommonRecord, LineRecord, decode_record, encode_record};
use kurbo::{Affine, BezPath, Line as KurboLine, Point, Rect};
use serde_json::Value;
use uuid::Uuid;

/// A straight line segment with an optional dash pattern.
#[derive(Debug, Clone)]
pub struct Line {
    pub(crate) id: ShapeId,
    /// Start point.
    pub start: Point,
    /// End point.
    pub end: Point,
    /// Alternating dash and gap lengths (None = solid).
    pub dash: Option<Vec<f64>>,
    pub style: ShapeStyle,
    pub flags: ShapeFlags,
    pub transform: Transform,
}

impl Line {
    /// Create a new line.
    pub fn new(start: Point, end: Point) -> Self {
        Self::with_style(start, end, ShapeStyle::default())
    }

    pub fn with_style(start: Point, end: Point, style: ShapeStyle) -> Self {
        Self {
            id: Uuid::new_v4(),
            start,
            end,
            dash: None,
            style,
            flags: ShapeFlags::default(),
            transform: Transform::default(),
        }
    }

    /// Get the length of the line.
    pub fn length(&self) -> f64 {
        (self.end - self.start).hypot()
    }

    /// Get the midpoint of the line.
    pub fn midpoint(&self) -> Point {
        self.start.midpoint(self.end)
    }

    /// Get as a kurbo Line.
    pub fn as_kurbo(&self) -> KurboLine {
        KurboLine::new(self.start, self.end)
    }

    pub fn to_portable(&self) -> Result<Value, serde_json::Error> {
        let record = LineRecord {
            common: CommonRecord::capture(self.bounds(), &self.style, &self.flags, &self.transform),
            x1: self.start.x,
            y1: self.start.y,
            x2: self.end.x,
            y2: self.end.y,
            stroke_dash_array: self.dash.clone(),
        };
        encode_record(super::ShapeKind::Line, &record)
    }

    pub fn from_portable(value: &Value) -> Result<Self, ShapeError> {
        let record: LineRecord = decode_record("line", value)?;
        record.common.check_finite("line")?;
        if ![record.x1, record.y1, record.x2, record.y2]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(ShapeError::NonFinite("line"));
        }
        let mut line = Line::with_style(
            Point::new(record.x1, record.y1),
            Point::new(record.x2, record.y2),
            record.common.style(),
        );
        line.dash = record.stroke_dash_array.filter(|d| !d.is_empty());
        line.flags = record.common.flags();
        line.transform = record.common.transform();
        Ok(line)
    }
}

impl ShapeTrait for Line {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn bounds(&self) -> Rect {
        Rect::from_points(self.start, self.end)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        super::point_to_segment_dist(point, self.start, self.end)
            <= tolerance + self.style.stroke_width / 2.0
    }

    fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        path.move_to(self.start);
        path.line_to(self.end);
        path
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn apply_affine(&mut self, affine: Affine) {
        self.start = affine * self.start;
        self.end = affine * self.end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_line_creation() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(100.0, 100.0));
        assert!((line.length() - 141.42135623730951).abs() < 0.0001);
        assert_eq!(line.midpoint(), Point::new(50.0, 50.0));
    }

    #[test]
    fn test_hit_test() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        assert!(line.hit_test(Point::new(50.0, 0.0), 1.0));
        assert!(line.hit_test(Point::new(50.0, 2.0), 2.0));
        assert!(!line.hit_test(Point::new(50.0, 20.0), 2.0));
    }

    #[test]
    fn test_dash_roundtrip() {
        let mut line = Line::new(Point::new(1.0, 2.0), Point::new(3.0, 4.0));
        line.dash = Some(vec![5.0, 5.0]);
        let value = line.to_portable().unwrap();
        assert_eq!(value["type"], "line");
        assert_eq!(value["strokeDashArray"], json!([5.0, 5.0]));

        let back = Line::from_portable(&value).unwrap();
        assert_eq!(back.start, line.start);
        assert_eq!(back.end, line.end);
        assert_eq!(back.dash, Some(vec![5.0, 5.0]));
    }

    #[test]
    fn test_solid_line_omits_dash() {
        let line = Line::new(Point::ZERO, Point::new(10.0, 0.0));
        let value = line.to_portable().unwrap();
        assert!(value.get("strokeDashArray").is_none());
    }
}
