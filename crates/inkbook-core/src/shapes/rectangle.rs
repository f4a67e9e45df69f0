//! Rectangle shape.

use super::{ShapeError, ShapeFlags, ShapeId, ShapeStyle, ShapeTrait, Transform};
use crate::portable::{CommonRecord, RectRecord, decode_record, encode_record};
use kurbo::{Affine, BezPath, Point, Rect, RoundedRect, Shape as KurboShape};
use serde_json::Value;
use uuid::Uuid;

/// A rectangle shape with optional rounded corners.
#[derive(Debug, Clone)]
pub struct Rectangle {
    pub(crate) id: ShapeId,
    /// Top-left corner position.
    pub position: Point,
    /// Width of the rectangle.
    pub width: f64,
    /// Height of the rectangle.
    pub height: f64,
    /// Horizontal corner radius.
    pub rx: f64,
    /// Vertical corner radius.
    pub ry: f64,
    pub style: ShapeStyle,
    pub flags: ShapeFlags,
    pub transform: Transform,
}

impl Rectangle {
    /// Create a new rectangle.
    pub fn new(position: Point, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            width,
            height,
            rx: 0.0,
            ry: 0.0,
            style: ShapeStyle::default(),
            flags: ShapeFlags::default(),
            transform: Transform::default(),
        }
    }

    /// Create a rectangle of the given size centred on a point.
    pub fn centered(center: Point, width: f64, height: f64) -> Self {
        Self::new(
            Point::new(center.x - width / 2.0, center.y - height / 2.0),
            width,
            height,
        )
    }

    /// Create a rectangle from two corner points.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        let rect = Rect::from_points(p1, p2);
        Self::new(rect.origin(), rect.width(), rect.height())
    }

    /// Get the rectangle as a kurbo Rect.
    pub fn as_rect(&self) -> Rect {
        Rect::from_origin_size(self.position, (self.width, self.height))
    }

    pub fn to_portable(&self) -> Result<Value, serde_json::Error> {
        let record = RectRecord {
            common: CommonRecord::capture(self.bounds(), &self.style, &self.flags, &self.transform),
            rx: self.rx,
            ry: self.ry,
        };
        encode_record(super::ShapeKind::Rect, &record)
    }

    pub fn from_portable(value: &Value) -> Result<Self, ShapeError> {
        let record: RectRecord = decode_record("rect", value)?;
        record.common.check_finite("rect")?;
        let common = &record.common;
        let mut rect = Rectangle::new(
            Point::new(common.left, common.top),
            common.width.max(0.0),
            common.height.max(0.0),
        );
        rect.rx = record.rx.max(0.0);
        rect.ry = record.ry.max(0.0);
        rect.style = common.style();
        rect.flags = common.flags();
        rect.transform = common.transform();
        Ok(rect)
    }
}

impl ShapeTrait for Rectangle {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn bounds(&self) -> Rect {
        self.as_rect()
    }

    /// Rectangles are picked anywhere inside their bounds, matching how the
    /// page selects objects by their box.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let reach = tolerance + self.style.stroke_width / 2.0;
        self.as_rect().inflate(reach, reach).contains(point)
    }

    fn to_path(&self) -> BezPath {
        let radius = self.rx.max(self.ry);
        if radius > 0.0 {
            RoundedRect::from_rect(self.as_rect(), radius).to_path(0.1)
        } else {
            self.as_rect().to_path(0.1)
        }
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn apply_affine(&mut self, affine: Affine) {
        let rect = affine.transform_rect_bbox(self.as_rect());
        self.position = rect.origin();
        self.width = rect.width();
        self.height = rect.height();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rectangle_creation() {
        let rect = Rectangle::new(Point::new(10.0, 20.0), 100.0, 50.0);
        assert!((rect.position.x - 10.0).abs() < f64::EPSILON);
        assert!((rect.position.y - 20.0).abs() < f64::EPSILON);
        assert!((rect.width - 100.0).abs() < f64::EPSILON);
        assert!((rect.height - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rectangle_centered() {
        let rect = Rectangle::centered(Point::new(200.0, 300.0), 100.0, 100.0);
        assert_eq!(rect.position, Point::new(150.0, 250.0));
    }

    #[test]
    fn test_rectangle_from_corners() {
        let rect = Rectangle::from_corners(Point::new(100.0, 100.0), Point::new(50.0, 50.0));
        assert!((rect.position.x - 50.0).abs() < f64::EPSILON);
        assert!((rect.position.y - 50.0).abs() < f64::EPSILON);
        assert!((rect.width - 50.0).abs() < f64::EPSILON);
        assert!((rect.height - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_test() {
        let rect = Rectangle::new(Point::new(0.0, 0.0), 100.0, 100.0);
        assert!(rect.hit_test(Point::new(50.0, 50.0), 0.0));
        assert!(!rect.hit_test(Point::new(150.0, 50.0), 0.0));
        assert!(rect.hit_test(Point::new(105.0, 50.0), 10.0)); // Within tolerance
    }

    #[test]
    fn test_portable_roundtrip() {
        let mut rect = Rectangle::new(Point::new(10.0, 20.0), 100.0, 50.0);
        rect.rx = 10.0;
        rect.ry = 10.0;
        rect.transform.angle = 30.0;
        let value = rect.to_portable().unwrap();
        assert_eq!(value["type"], "rect");
        assert_eq!(value["left"], 10.0);
        assert_eq!(value["width"], 100.0);
        assert_eq!(value["fill"], "transparent");

        let back = Rectangle::from_portable(&value).unwrap();
        assert_eq!(back.as_rect(), rect.as_rect());
        assert_eq!(back.rx, 10.0);
        assert_eq!(back.transform.angle, 30.0);
        assert_eq!(back.style.fill_color, None);
    }

    #[test]
    fn test_from_portable_rejects_non_numeric() {
        let err = Rectangle::from_portable(&json!({ "type": "rect", "width": "wide" }));
        assert!(matches!(err, Err(ShapeError::InvalidRecord { kind: "rect", .. })));
    }
}
