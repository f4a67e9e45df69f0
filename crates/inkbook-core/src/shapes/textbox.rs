//! Text box shape.

use super::{ShapeError, ShapeFlags, ShapeId, ShapeStyle, ShapeTrait, Transform};
use crate::portable::{CommonRecord, TextboxRecord, decode_record, encode_record};
use kurbo::{Affine, BezPath, Point, Rect, Shape as KurboShape};
use serde_json::Value;
use uuid::Uuid;

/// Font size for new text boxes.
pub const DEFAULT_FONT_SIZE: f64 = 24.0;

/// Font stack for new text boxes.
pub const DEFAULT_FONT_FAMILY: &str = "Inter, system-ui, sans-serif";

/// Placeholder text for a freshly placed box.
pub const PLACEHOLDER_TEXT: &str = "Enter the text";

/// Line height relative to the font size.
const LINE_HEIGHT: f64 = 1.16;

/// Average glyph advance relative to the font size, for approximate bounds.
const CHAR_WIDTH: f64 = 0.5;

/// A text box. Text is drawn with the fill color.
#[derive(Debug, Clone)]
pub struct Textbox {
    pub(crate) id: ShapeId,
    /// Position (top-left corner of the text box).
    pub position: Point,
    /// The text content.
    pub text: String,
    /// Font size in pixels.
    pub font_size: f64,
    pub font_family: String,
    /// Explicit box width; approximated from the text when None.
    pub width: Option<f64>,
    pub style: ShapeStyle,
    pub flags: ShapeFlags,
    pub transform: Transform,
}

impl Textbox {
    /// Create a new text box with black text.
    pub fn new(position: Point, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            text: text.into(),
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            width: None,
            style: ShapeStyle {
                stroke_color: None,
                stroke_width: 0.0,
                fill_color: Some(super::SerializableColor::black()),
                ..ShapeStyle::default()
            },
            flags: ShapeFlags::default(),
            transform: Transform::default(),
        }
    }

    /// Approximate laid-out size (width, height).
    pub fn approximate_size(&self) -> (f64, f64) {
        let lines = self.text.split('\n');
        let (count, longest) = lines.fold((0usize, 0usize), |(n, w), line| {
            (n + 1, w.max(line.chars().count()))
        });
        let width = self
            .width
            .unwrap_or(longest as f64 * self.font_size * CHAR_WIDTH);
        (width, count.max(1) as f64 * self.font_size * LINE_HEIGHT)
    }

    pub fn to_portable(&self) -> Result<Value, serde_json::Error> {
        let record = TextboxRecord {
            common: CommonRecord::capture(self.bounds(), &self.style, &self.flags, &self.transform),
            text: self.text.clone(),
            font_size: Some(self.font_size),
            font_family: Some(self.font_family.clone()),
            fixed_width: self.width.is_some(),
        };
        encode_record(super::ShapeKind::Textbox, &record)
    }

    pub fn from_portable(value: &Value) -> Result<Self, ShapeError> {
        let record: TextboxRecord = decode_record("textbox", value)?;
        record.common.check_finite("textbox")?;
        let common = &record.common;
        let mut textbox = Textbox::new(Point::new(common.left, common.top), record.text.clone());
        if let Some(size) = record.font_size.filter(|s| s.is_finite() && *s > 0.0) {
            textbox.font_size = size;
        }
        if let Some(family) = record.font_family.as_ref().filter(|f| !f.is_empty()) {
            textbox.font_family = family.clone();
        }
        if record.fixed_width && common.width > 0.0 {
            textbox.width = Some(common.width);
        }
        textbox.style = common.style();
        textbox.flags = common.flags();
        textbox.transform = common.transform();
        Ok(textbox)
    }
}

impl ShapeTrait for Textbox {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.position, self.approximate_size())
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.bounds().inflate(tolerance, tolerance).contains(point)
    }

    fn to_path(&self) -> BezPath {
        // Text is rendered by the host; the box stands in for selection.
        self.bounds().to_path(0.1)
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn apply_affine(&mut self, affine: Affine) {
        self.position = affine * self.position;
    }
}
