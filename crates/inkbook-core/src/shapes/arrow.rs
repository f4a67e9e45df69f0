//! Arrow shape.
//!
//! An arrow is a composite: a shaft line plus a filled triangular head. Only
//! the two endpoints and the stroke are authoritative; both leaves are
//! recomputed from them on every access and never persisted.

use super::{
    DEFAULT_STROKE_WIDTH, SerializableColor, ShapeError, ShapeFlags, ShapeId, ShapeStyle,
    ShapeTrait, Transform,
};
use crate::portable::{ArrowRecord, CommonRecord, decode_record};
use kurbo::{Affine, BezPath, Line as KurboLine, Point, Rect};
use uuid::Uuid;

/// Angle between the shaft and each head wing (36°).
pub const ARROW_HEAD_ANGLE: f64 = std::f64::consts::PI / 5.0;

/// Shortest head, used for thin strokes.
pub const MIN_HEAD_LENGTH: f64 = 12.0;

/// Head length per unit of stroke width.
const HEAD_LENGTH_PER_WIDTH: f64 = 8.0;

/// Pull-back of the shaft end from the head base, per axis.
const SHAFT_EPSILON: f64 = 1.0;

/// Endpoints used when a record carries none.
const FALLBACK_POINTS: [f64; 4] = [0.0, 0.0, 100.0, 100.0];

/// Derived leaf geometry of an arrow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrowParts {
    /// Shaft from the start point to just inside the head base.
    pub shaft: KurboLine,
    /// Head triangle: tip, first wing, second wing.
    pub head: [Point; 3],
    pub shaft_selectable: bool,
    pub head_selectable: bool,
}

/// An arrow between two points.
#[derive(Debug, Clone)]
pub struct Arrow {
    pub(crate) id: ShapeId,
    start: Point,
    end: Point,
    /// Style properties. The head is filled with the stroke color.
    pub style: ShapeStyle,
    pub flags: ShapeFlags,
    pub transform: Transform,
}

impl Arrow {
    /// Create a new arrow with the default style.
    pub fn new(start: Point, end: Point) -> Self {
        Self::with_style(start, end, ShapeStyle::default())
    }

    /// Create an arrow with an explicit style.
    pub fn with_style(start: Point, end: Point, style: ShapeStyle) -> Self {
        Self {
            id: Uuid::new_v4(),
            start,
            end,
            style,
            flags: ShapeFlags::default(),
            transform: Transform::default(),
        }
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    /// Authoritative endpoints as `[x1, y1, x2, y2]`.
    pub fn points(&self) -> [f64; 4] {
        [self.start.x, self.start.y, self.end.x, self.end.y]
    }

    pub fn set_endpoints(&mut self, start: Point, end: Point) {
        self.start = start;
        self.end = end;
    }

    /// Stroke width, falling back to the default when unset or invalid.
    pub fn stroke_width(&self) -> f64 {
        if self.style.stroke_width > 0.0 {
            self.style.stroke_width
        } else {
            DEFAULT_STROKE_WIDTH
        }
    }

    /// Head length grows with the stroke width but never drops below the minimum.
    pub fn head_length(&self) -> f64 {
        MIN_HEAD_LENGTH.max(self.stroke_width() * HEAD_LENGTH_PER_WIDTH)
    }

    /// Shaft angle in radians.
    pub fn angle(&self) -> f64 {
        (self.end.y - self.start.y).atan2(self.end.x - self.start.x)
    }

    /// Get the length of the arrow.
    pub fn length(&self) -> f64 {
        (self.end - self.start).hypot()
    }

    /// Compute the leaf geometry from the endpoints.
    pub fn parts(&self) -> ArrowParts {
        let angle = self.angle();
        let head_length = self.head_length();
        let wing = |offset: f64| {
            Point::new(
                self.end.x - head_length * (angle + offset).cos(),
                self.end.y - head_length * (angle + offset).sin(),
            )
        };
        let wing1 = wing(-ARROW_HEAD_ANGLE);
        let wing2 = wing(ARROW_HEAD_ANGLE);
        let base = Point::new(
            (wing1.x + wing2.x) / 2.0 - SHAFT_EPSILON,
            (wing1.y + wing2.y) / 2.0 - SHAFT_EPSILON,
        );
        ArrowParts {
            shaft: KurboLine::new(self.start, base),
            head: [self.end, wing1, wing2],
            shaft_selectable: false,
            head_selectable: false,
        }
    }

    /// Stroke color for both leaves.
    pub fn color(&self) -> SerializableColor {
        self.style
            .stroke_color
            .unwrap_or_else(SerializableColor::black)
    }

    /// Portable record: endpoints, stroke and generic transform fields only.
    pub fn to_portable(&self) -> Result<serde_json::Value, serde_json::Error> {
        let record = ArrowRecord {
            common: CommonRecord::capture(self.bounds(), &self.style, &self.flags, &self.transform),
            points: Some(self.points().to_vec()),
        };
        crate::portable::encode_record(super::ShapeKind::Arrow, &record)
    }

    /// Rebuild an arrow from its portable record.
    ///
    /// Only `points` and the stroke feed the geometry; any persisted leaf
    /// objects are ignored. The composite is always selectable and evented.
    pub fn from_portable(value: &serde_json::Value) -> Result<Self, ShapeError> {
        let record: ArrowRecord = decode_record("arrow", value)?;
        record.common.check_finite("arrow")?;
        let points = record.points.unwrap_or_else(|| FALLBACK_POINTS.to_vec());
        let [x1, y1, x2, y2] = <[f64; 4]>::try_from(points.as_slice())
            .map_err(|_| ShapeError::ArrowPoints(points.len()))?;
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(ShapeError::NonFinite("arrow"));
        }

        let mut style = record.common.style();
        if style.stroke_color.is_none_or(|c| c.is_transparent()) {
            style.stroke_color = Some(SerializableColor::black());
        }
        if style.stroke_width.is_nan() || style.stroke_width <= 0.0 {
            style.stroke_width = DEFAULT_STROKE_WIDTH;
        }

        let mut arrow = Arrow::with_style(Point::new(x1, y1), Point::new(x2, y2), style);
        arrow.transform = record.common.transform();
        arrow.flags.selectable = true;
        arrow.flags.evented = true;
        Ok(arrow)
    }
}

impl ShapeTrait for Arrow {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn bounds(&self) -> Rect {
        let parts = self.parts();
        super::points_bounds(&[self.start, parts.head[0], parts.head[1], parts.head[2]])
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let parts = self.parts();
        if super::point_to_segment_dist(point, parts.shaft.p0, parts.shaft.p1)
            <= tolerance + self.stroke_width() / 2.0
        {
            return true;
        }

        // Point in triangle test
        fn sign(p1: Point, p2: Point, p3: Point) -> f64 {
            (p1.x - p3.x) * (p2.y - p3.y) - (p2.x - p3.x) * (p1.y - p3.y)
        }

        let [tip, left, right] = parts.head;
        let d1 = sign(point, tip, left);
        let d2 = sign(point, left, right);
        let d3 = sign(point, right, tip);

        let has_neg = (d1 < 0.0) || (d2 < 0.0) || (d3 < 0.0);
        let has_pos = (d1 > 0.0) || (d2 > 0.0) || (d3 > 0.0);

        !(has_neg && has_pos)
    }

    fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        if self.start == self.end {
            return path;
        }
        let parts = self.parts();

        path.move_to(parts.shaft.p0);
        path.line_to(parts.shaft.p1);

        let [tip, left, right] = parts.head;
        path.move_to(tip);
        path.line_to(left);
        path.line_to(right);
        path.close_path();

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
