//! Circle shape.

use super::{ShapeError, ShapeFlags, ShapeId, ShapeStyle, ShapeTrait, Transform};
use crate::portable::{CircleRecord, CommonRecord, decode_record, encode_record};
use kurbo::{Affine, BezPath, Circle as KurboCircle, Point, Rect, Shape as KurboShape};
use serde_json::Value;
use uuid::Uuid;

/// A circle shape.
#[derive(Debug, Clone)]
pub struct Circle {
    pub(crate) id: ShapeId,
    /// Center point.
    pub center: Point,
    pub radius: f64,
    pub style: ShapeStyle,
    pub flags: ShapeFlags,
    pub transform: Transform,
}

impl Circle {
    /// Create a new circle.
    pub fn new(center: Point, radius: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            center,
            radius,
            style: ShapeStyle::default(),
            flags: ShapeFlags::default(),
            transform: Transform::default(),
        }
    }

    /// Get as a kurbo Circle.
    pub fn as_kurbo(&self) -> KurboCircle {
        KurboCircle::new(self.center, self.radius)
    }

    pub fn to_portable(&self) -> Result<Value, serde_json::Error> {
        let record = CircleRecord {
            common: CommonRecord::capture(self.bounds(), &self.style, &self.flags, &self.transform),
            radius: self.radius,
        };
        encode_record(super::ShapeKind::Circle, &record)
    }

    /// Rebuild from a record; `left`/`top` locate the bounding box corner.
    pub fn from_portable(value: &Value) -> Result<Self, ShapeError> {
        let record: CircleRecord = decode_record("circle", value)?;
        record.common.check_finite("circle")?;
        if !record.radius.is_finite() {
            return Err(ShapeError::NonFinite("circle"));
        }
        let radius = record.radius.max(0.0);
        let common = &record.common;
        let mut circle = Circle::new(Point::new(common.left + radius, common.top + radius), radius);
        circle.style = common.style();
        circle.flags = common.flags();
        circle.transform = common.transform();
        Ok(circle)
    }
}

impl ShapeTrait for Circle {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn bounds(&self) -> Rect {
        Rect::new(
            self.center.x - self.radius,
            self.center.y - self.radius,
            self.center.x + self.radius,
            self.center.y + self.radius,
        )
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.center).hypot() <= self.radius + tolerance + self.style.stroke_width / 2.0
    }

    fn to_path(&self) -> BezPath {
        self.as_kurbo().to_path(0.1)
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn apply_affine(&mut self, affine: Affine) {
        self.center = affine * self.center;
        let [a, b, c, d, _, _] = affine.as_coeffs();
        let scale = ((a * d - b * c).abs()).sqrt();
        self.radius *= scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_bounds() {
        let circle = Circle::new(Point::new(100.0, 100.0), 50.0);
        let bounds = circle.bounds();
        assert!((bounds.x0 - 50.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_test() {
        let circle = Circle::new(Point::new(0.0, 0.0), 10.0);
        assert!(circle.hit_test(Point::new(5.0, 5.0), 0.0));
        assert!(!circle.hit_test(Point::new(20.0, 0.0), 1.0));
    }

    #[test]
    fn test_portable_roundtrip() {
        let circle = Circle::new(Point::new(100.0, 80.0), 50.0);
        let value = circle.to_portable().unwrap();
        assert_eq!(value["type"], "circle");
        assert_eq!(value["left"], 50.0);
        assert_eq!(value["top"], 30.0);

        let back = Circle::from_portable(&value).unwrap();
        assert_eq!(back.center, circle.center);
        assert_eq!(back.radius, 50.0);
    }

    #[test]
    fn test_translate_keeps_radius() {
        let mut circle = Circle::new(Point::new(0.0, 0.0), 10.0);
        circle.apply_affine(Affine::translate((5.0, 5.0)));
        assert_eq!(circle.center, Point::new(5.0, 5.0));
        assert!((circle.radius - 10.0).abs() < 1e-9);
    }
}
