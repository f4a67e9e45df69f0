//! Freehand path shape.

use super::{SerializableColor, ShapeError, ShapeFlags, ShapeId, ShapeStyle, ShapeTrait, Transform};
use crate::portable::{CommonRecord, PathRecord, decode_record, encode_record};
use kurbo::{Affine, BezPath, Point, Rect};
use serde_json::Value;
use uuid::Uuid;

/// Soft glow drawn around a stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    pub color: SerializableColor,
    /// Blur radius in page units.
    pub blur: f64,
}

/// A freehand path (series of sampled points).
#[derive(Debug, Clone)]
pub struct Path {
    pub(crate) id: ShapeId,
    /// Points in the path.
    pub points: Vec<Point>,
    /// Optional glow, used by laser strokes.
    pub glow: Option<Glow>,
    pub style: ShapeStyle,
    pub flags: ShapeFlags,
    pub transform: Transform,
}

impl Path {
    /// Create a new empty path.
    pub fn new() -> Self {
        Self::from_points(Vec::new())
    }

    /// Create from existing points.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self::with_style(points, ShapeStyle::default())
    }

    pub fn with_style(points: Vec<Point>, style: ShapeStyle) -> Self {
        Self {
            id: Uuid::new_v4(),
            points,
            glow: None,
            style,
            flags: ShapeFlags::default(),
            transform: Transform::default(),
        }
    }

    /// Add a point to the path.
    pub fn add_point(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Get the number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the path is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Encode as a record with `M`/`L` path commands.
    pub fn to_portable(&self) -> Result<Value, serde_json::Error> {
        let mut commands: Vec<Vec<Value>> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let op = if i == 0 { "M" } else { "L" };
                vec![Value::from(op), Value::from(p.x), Value::from(p.y)]
            })
            .collect();
        if let [only] = self.points.as_slice() {
            commands.push(vec![Value::from("L"), Value::from(only.x), Value::from(only.y)]);
        }
        let record = PathRecord {
            common: CommonRecord::capture(self.bounds(), &self.style, &self.flags, &self.transform),
            path: commands,
        };
        encode_record(super::ShapeKind::Path, &record)
    }

    /// Rebuild from a record. Curve commands keep their end points only.
    pub fn from_portable(value: &Value) -> Result<Self, ShapeError> {
        let record: PathRecord = decode_record("path", value)?;
        record.common.check_finite("path")?;
        let mut points = Vec::with_capacity(record.path.len());
        for command in &record.path {
            let Some(op) = command.first().and_then(Value::as_str) else {
                continue;
            };
            let arity = match op.to_ascii_uppercase().as_str() {
                "M" | "L" => 2,
                "Q" => 4,
                "C" => 6,
                _ => continue,
            };
            if command.len() != arity + 1 {
                continue;
            }
            let x = command[arity - 1].as_f64();
            let y = command[arity].as_f64();
            match (x, y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
                    points.push(Point::new(x, y))
                }
                _ => return Err(ShapeError::NonFinite("path")),
            }
        }
        let mut path = Path::with_style(points, record.common.style());
        path.flags = record.common.flags();
        path.transform = record.common.transform();
        Ok(path)
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeTrait for Path {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn bounds(&self) -> Rect {
        super::points_bounds(&self.points)
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let reach = tolerance + self.style.stroke_width / 2.0;
        match self.points.as_slice() {
            [] => false,
            [only] => (point - *only).hypot() <= reach,
            points => super::point_to_polyline_dist(point, points) <= reach,
        }
    }

    fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();

        if let Some((first, rest)) = self.points.split_first() {
            path.move_to(*first);
            for point in rest {
                path.line_to(*point);
            }
        }

        path
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn apply_affine(&mut self, affine: Affine) {
        for point in &mut self.points {
            *point = affine * *point;
        }
    }
}
