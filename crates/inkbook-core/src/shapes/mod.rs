//! Shape definitions for notebook pages.

mod arrow;
mod circle;
mod image;
mod line;
mod path;
mod rectangle;
mod textbox;

pub use arrow::{ARROW_HEAD_ANGLE, Arrow, ArrowParts, MIN_HEAD_LENGTH};
pub use circle::Circle;
pub use image::{IMAGE_INSERT_ORIGIN, Image, ImageFormat};
pub use line::Line;
pub use path::{Glow, Path};
pub use rectangle::Rectangle;
pub use textbox::{DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE, PLACEHOLDER_TEXT, Textbox};

use kurbo::{Affine, BezPath, Point, Rect, Vec2};
use peniko::Color;
use thiserror::Error;
use uuid::Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub const fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse a CSS-style color as written by the notebook front end.
    ///
    /// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa`, `transparent` and `none`.
    /// Returns `None` for anything else.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("transparent") || value.eq_ignore_ascii_case("none") {
            return Some(Self::transparent());
        }
        let hex = value.strip_prefix('#')?;
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 17;
                }
                Some(Self::new(out[0], out[1], out[2], 255))
            }
            6 => Some(Self::new(
                channel(hex.get(0..2)?)?,
                channel(hex.get(2..4)?)?,
                channel(hex.get(4..6)?)?,
                255,
            )),
            8 => Some(Self::new(
                channel(hex.get(0..2)?)?,
                channel(hex.get(2..4)?)?,
                channel(hex.get(4..6)?)?,
                channel(hex.get(6..8)?)?,
            )),
            _ => None,
        }
    }

    /// Format as a lowercase hex string (`#rrggbb`, or `#rrggbbaa` when not opaque).
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// How selection corner handles are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CornerStyle {
    #[default]
    Circle,
    Rect,
}

/// Selection chrome shared by every shape on a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionChrome {
    pub corner_style: CornerStyle,
    pub corner_color: SerializableColor,
    pub corner_stroke_color: SerializableColor,
    pub border_color: SerializableColor,
    pub transparent_corners: bool,
    pub corner_size: f64,
    pub padding: f64,
}

impl Default for SelectionChrome {
    fn default() -> Self {
        let accent = SerializableColor::new(0x00, 0xbf, 0xff, 255);
        Self {
            corner_style: CornerStyle::Circle,
            corner_color: accent,
            corner_stroke_color: accent,
            border_color: accent,
            transparent_corners: false,
            corner_size: 7.0,
            padding: 2.0,
        }
    }
}

/// Default configuration handed to shape constructors.
///
/// Tools build their shapes from this rather than from any shared mutable
/// base, so two notebooks can carry different defaults side by side.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDefaults {
    pub stroke_color: SerializableColor,
    pub stroke_width: f64,
    pub chrome: SelectionChrome,
}

impl Default for ShapeDefaults {
    fn default() -> Self {
        Self {
            stroke_color: SerializableColor::black(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            chrome: SelectionChrome::default(),
        }
    }
}

/// Stroke width used when none is given.
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;

/// Style properties for shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeStyle {
    /// Stroke color (None = no stroke).
    pub stroke_color: Option<SerializableColor>,
    /// Stroke width.
    pub stroke_width: f64,
    /// Fill color (None = no fill).
    pub fill_color: Option<SerializableColor>,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    pub opacity: f64,
    /// Selection chrome.
    pub chrome: SelectionChrome,
}

impl ShapeStyle {
    /// A stroked, unfilled style built from the given defaults.
    pub fn from_defaults(defaults: &ShapeDefaults) -> Self {
        Self {
            stroke_color: Some(defaults.stroke_color),
            stroke_width: defaults.stroke_width,
            fill_color: None,
            opacity: 1.0,
            chrome: defaults.chrome,
        }
    }

    /// A stroked style with an explicit color and width.
    pub fn stroked(color: SerializableColor, width: f64) -> Self {
        Self {
            stroke_color: Some(color),
            stroke_width: width,
            ..Self::default()
        }
    }

    /// Get the stroke color as a peniko Color.
    pub fn stroke(&self) -> Option<Color> {
        self.stroke_color.map(|c| c.into())
    }

    /// Get the fill color as a peniko Color.
    pub fn fill(&self) -> Option<Color> {
        self.fill_color.map(|c| c.into())
    }

    /// Get the stroke color with opacity applied.
    pub fn stroke_with_opacity(&self) -> Option<Color> {
        self.stroke_color.map(|c| self.apply_opacity(c))
    }

    /// Get the fill color with opacity applied.
    pub fn fill_with_opacity(&self) -> Option<Color> {
        self.fill_color.map(|c| self.apply_opacity(c))
    }

    fn apply_opacity(&self, color: SerializableColor) -> Color {
        let alpha = (color.a as f64 * self.opacity.clamp(0.0, 1.0)) as u8;
        Color::from_rgba8(color.r, color.g, color.b, alpha)
    }

    fn has_visible_fill(&self) -> bool {
        self.fill_color.is_some_and(|c| !c.is_transparent())
    }
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self::from_defaults(&ShapeDefaults::default())
    }
}

/// Behavioural flags shared by every shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeFlags {
    /// Transient shapes (previews, laser strokes) never reach the portable form.
    pub temporary: bool,
    /// Whether the user can select the shape.
    pub selectable: bool,
    /// Whether the shape receives pointer events.
    pub evented: bool,
    /// Part of a laser fade session.
    pub laser: bool,
}

impl ShapeFlags {
    /// Flags for a non-interactive transient shape.
    pub fn transient() -> Self {
        Self {
            temporary: true,
            selectable: false,
            evented: false,
            laser: false,
        }
    }
}

impl Default for ShapeFlags {
    fn default() -> Self {
        Self {
            temporary: false,
            selectable: true,
            evented: true,
            laser: false,
        }
    }
}

/// Scale and rotation applied on top of a shape's geometry.
///
/// The origin is the top-left corner of the untransformed bounds, matching
/// how the front end positions objects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale_x: f64,
    pub scale_y: f64,
    /// Rotation in degrees.
    pub angle: f64,
}

impl Transform {
    pub fn is_identity(&self) -> bool {
        self.scale_x == 1.0 && self.scale_y == 1.0 && self.angle == 0.0
    }

    /// Affine that applies this transform around `origin`.
    pub fn affine_about(&self, origin: Point) -> Affine {
        let o = origin.to_vec2();
        Affine::translate(o)
            * Affine::rotate(self.angle.to_radians())
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
            * Affine::translate(-o)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
        }
    }
}

/// Unique identifier for shapes.
pub type ShapeId = Uuid;

/// Errors raised while rebuilding a shape from its portable record.
#[derive(Debug, Error)]
pub enum ShapeError {
    #[error("Invalid {kind} record: {source}")]
    InvalidRecord {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Arrow needs 4 point coordinates, got {0}")]
    ArrowPoints(usize),
    #[error("Non-finite coordinate in {0} record")]
    NonFinite(&'static str),
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = Vec2::new(b.x - a.x, b.y - a.y);
    let pv = Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    ((point.x - proj.x).powi(2) + (point.y - proj.y).powi(2)).sqrt()
}

/// Minimum distance from a point to a polyline (sequence of connected segments).
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| point_to_segment_dist(point, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}

/// Bounding box of a set of points (`Rect::ZERO` when empty).
pub(crate) fn points_bounds(points: &[Point]) -> Rect {
    let Some(first) = points.first() else {
        return Rect::ZERO;
    };
    points
        .iter()
        .skip(1)
        .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
}

/// Common trait for all shapes.
pub trait ShapeTrait {
    /// Get the unique identifier.
    fn id(&self) -> ShapeId;

    /// Get the bounding box of the untransformed geometry.
    fn bounds(&self) -> Rect;

    /// Check if a point (in untransformed shape space) hits this shape.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool;

    /// Get the path representation for rendering.
    fn to_path(&self) -> BezPath;

    /// Get the style.
    fn style(&self) -> &ShapeStyle;

    /// Get mutable style.
    fn style_mut(&mut self) -> &mut ShapeStyle;

    /// Bake an affine into the geometry.
    fn apply_affine(&mut self, affine: Affine);
}

/// The kinds of shape a page can hold.
///
/// This is the single dispatch table for portable type tags: every record is
/// revived through [`ShapeKind::from_tag`], so adding a composite only means
/// adding a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Path,
    Rect,
    Circle,
    Textbox,
    Image,
    Line,
    Arrow,
}

impl ShapeKind {
    /// Portable type tag.
    pub fn tag(self) -> &'static str {
        match self {
            ShapeKind::Path => "path",
            ShapeKind::Rect => "rect",
            ShapeKind::Circle => "circle",
            ShapeKind::Textbox => "textbox",
            ShapeKind::Image => "image",
            ShapeKind::Line => "line",
            ShapeKind::Arrow => "arrow",
        }
    }

    /// Resolve a portable type tag. Unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "path" => Some(ShapeKind::Path),
            "rect" => Some(ShapeKind::Rect),
            "circle" => Some(ShapeKind::Circle),
            "textbox" | "text" | "i-text" => Some(ShapeKind::Textbox),
            "image" => Some(ShapeKind::Image),
            "line" => Some(ShapeKind::Line),
            "arrow" => Some(ShapeKind::Arrow),
            _ => None,
        }
    }

    /// Whether this kind is built from derived leaf parts.
    pub fn is_composite(self) -> bool {
        matches!(self, ShapeKind::Arrow)
    }
}

/// Tagged union over every shape variant.
#[derive(Debug, Clone)]
pub enum Shape {
    Path(Path),
    Rect(Rectangle),
    Circle(Circle),
    Textbox(Textbox),
    Image(Image),
    Line(Line),
    Arrow(Arrow),
}

macro_rules! each_shape {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            Shape::Path($s) => $body,
            Shape::Rect($s) => $body,
            Shape::Circle($s) => $body,
            Shape::Textbox($s) => $body,
            Shape::Image($s) => $body,
            Shape::Line($s) => $body,
            Shape::Arrow($s) => $body,
        }
    };
}

impl Shape {
    pub fn id(&self) -> ShapeId {
        each_shape!(self, s => s.id())
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Path(_) => ShapeKind::Path,
            Shape::Rect(_) => ShapeKind::Rect,
            Shape::Circle(_) => ShapeKind::Circle,
            Shape::Textbox(_) => ShapeKind::Textbox,
            Shape::Image(_) => ShapeKind::Image,
            Shape::Line(_) => ShapeKind::Line,
            Shape::Arrow(_) => ShapeKind::Arrow,
        }
    }

    /// Bounds of the untransformed geometry.
    pub fn bounds(&self) -> Rect {
        each_shape!(self, s => s.bounds())
    }

    /// Bounds after scale and rotation.
    pub fn world_bounds(&self) -> Rect {
        let bounds = self.bounds();
        let transform = self.transform();
        if transform.is_identity() {
            return bounds;
        }
        transform.affine_about(bounds.origin()).transform_rect_bbox(bounds)
    }

    /// Full affine mapping shape geometry into page space.
    pub fn affine(&self) -> Affine {
        self.transform().affine_about(self.bounds().origin())
    }

    /// Hit test in page space.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let local = self.affine().inverse() * point;
        each_shape!(self, s => s.hit_test(local, tolerance))
    }

    pub fn to_path(&self) -> BezPath {
        each_shape!(self, s => s.to_path())
    }

    pub fn style(&self) -> &ShapeStyle {
        each_shape!(self, s => s.style())
    }

    pub fn style_mut(&mut self) -> &mut ShapeStyle {
        each_shape!(self, s => s.style_mut())
    }

    pub fn flags(&self) -> &ShapeFlags {
        each_shape!(self, s => &s.flags)
    }

    pub fn flags_mut(&mut self) -> &mut ShapeFlags {
        each_shape!(self, s => &mut s.flags)
    }

    pub fn transform(&self) -> &Transform {
        each_shape!(self, s => &s.transform)
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        each_shape!(self, s => &mut s.transform)
    }

    pub fn apply_affine(&mut self, affine: Affine) {
        each_shape!(self, s => s.apply_affine(affine))
    }

    /// Move the shape by an offset.
    pub fn translate(&mut self, offset: Vec2) {
        self.apply_affine(Affine::translate(offset));
    }

    pub fn is_temporary(&self) -> bool {
        self.flags().temporary
    }

    /// Regenerate the shape's ID with a new unique identifier.
    pub fn regenerate_id(&mut self) {
        let new_id = Uuid::new_v4();
        each_shape!(self, s => s.id = new_id)
    }

    /// Change the user-visible color of the shape.
    ///
    /// Text is filled, strokes are stroked, closed primitives keep their
    /// transparent interior and only recolor the channels already in use.
    pub fn recolor(&mut self, color: SerializableColor) {
        let kind = self.kind();
        let style = self.style_mut();
        match kind {
            ShapeKind::Textbox => style.fill_color = Some(color),
            ShapeKind::Path | ShapeKind::Line | ShapeKind::Arrow => {
                style.stroke_color = Some(color)
            }
            ShapeKind::Rect | ShapeKind::Circle => {
                if style.has_visible_fill() {
                    style.fill_color = Some(color);
                }
                if style.stroke_color.is_some() {
                    style.stroke_color = Some(color);
                }
            }
            ShapeKind::Image => {
                if style.has_visible_fill() {
                    style.fill_color = Some(color);
                } else if style.stroke_color.is_some() {
                    style.stroke_color = Some(color);
                } else {
                    style.fill_color = Some(color);
                }
            }
        }
    }

    pub fn as_arrow(&self) -> Option<&Arrow> {
        match self {
            Shape::Arrow(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&Line> {
        match self {
            Shape::Line(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Shape::Path(p) => Some(p),
            _ => None,
        }
    }
}
