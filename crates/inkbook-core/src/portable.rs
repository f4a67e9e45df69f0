//! Portable scene records.
//!
//! The portable form is the JSON the notebook front end reads and writes:
//! one object per shape with a `type` discriminator and camelCase fields.
//! Each kind has a typed record that flattens the shared [`CommonRecord`].

use crate::shapes::{
    SerializableColor, Shape, ShapeDefaults, ShapeError, ShapeKind, ShapeStyle, Transform,
};
use kurbo::Rect;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A page scene in its portable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortableScene {
    #[serde(default)]
    pub objects: Vec<Value>,
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default = "default_canvas_width")]
    pub canvas_width: f64,
    #[serde(default = "default_canvas_height")]
    pub canvas_height: f64,
}

impl Default for PortableScene {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            background: default_background(),
            canvas_width: default_canvas_width(),
            canvas_height: default_canvas_height(),
        }
    }
}

fn default_background() -> String {
    SerializableColor::white().to_hex()
}

fn default_canvas_width() -> f64 {
    crate::config::PageSize::Standard.width()
}

fn default_canvas_height() -> f64 {
    crate::config::PageSize::Standard.height()
}

fn one() -> f64 {
    1.0
}

/// Accept any JSON value for a color slot and keep only plain strings.
///
/// Gradients and patterns are not modelled; they revive as "no color".
fn lenient_color<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_str().map(str::to_owned)))
}

/// Fields every record carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonRecord {
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default, deserialize_with = "lenient_color")]
    pub stroke: Option<String>,
    #[serde(default)]
    pub stroke_width: Option<f64>,
    #[serde(default, deserialize_with = "lenient_color")]
    pub fill: Option<String>,
    #[serde(default = "one")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evented: Option<bool>,
}

impl CommonRecord {
    /// Capture the shared fields of a shape.
    pub fn capture(
        bounds: Rect,
        style: &ShapeStyle,
        flags: &crate::shapes::ShapeFlags,
        transform: &Transform,
    ) -> Self {
        Self {
            left: bounds.x0,
            top: bounds.y0,
            width: bounds.width(),
            height: bounds.height(),
            scale_x: transform.scale_x,
            scale_y: transform.scale_y,
            angle: transform.angle,
            stroke: style.stroke_color.map(|c| c.to_hex()),
            stroke_width: Some(style.stroke_width),
            fill: Some(
                style
                    .fill_color
                    .map(|c| c.to_hex())
                    .unwrap_or_else(|| "transparent".to_string()),
            ),
            opacity: style.opacity,
            selectable: Some(flags.selectable),
            evented: Some(flags.evented),
        }
    }

    /// Style described by the record. Unparseable colors count as absent.
    pub fn style(&self) -> ShapeStyle {
        let fill_color = self
            .fill
            .as_deref()
            .and_then(SerializableColor::parse)
            .filter(|c| !c.is_transparent());
        ShapeStyle {
            stroke_color: self.stroke.as_deref().and_then(SerializableColor::parse),
            stroke_width: self.stroke_width.unwrap_or(0.0),
            fill_color,
            opacity: self.opacity.clamp(0.0, 1.0),
            ..ShapeStyle::default()
        }
    }

    pub fn transform(&self) -> Transform {
        Transform {
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            angle: self.angle,
        }
    }

    /// Apply recorded interaction flags on top of the defaults.
    pub fn flags(&self) -> crate::shapes::ShapeFlags {
        let mut flags = crate::shapes::ShapeFlags::default();
        if let Some(selectable) = self.selectable {
            flags.selectable = selectable;
        }
        if let Some(evented) = self.evented {
            flags.evented = evented;
        }
        flags
    }

    pub(crate) fn check_finite(&self, kind: &'static str) -> Result<(), ShapeError> {
        let all = [
            self.left,
            self.top,
            self.width,
            self.height,
            self.scale_x,
            self.scale_y,
            self.angle,
        ];
        if all.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(ShapeError::NonFinite(kind))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRecord {
    #[serde(flatten)]
    pub common: CommonRecord,
    #[serde(default)]
    pub path: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectRecord {
    #[serde(flatten)]
    pub common: CommonRecord,
    #[serde(default)]
    pub rx: f64,
    #[serde(default)]
    pub ry: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleRecord {
    #[serde(flatten)]
    pub common: CommonRecord,
    #[serde(default)]
    pub radius: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextboxRecord {
    #[serde(flatten)]
    pub common: CommonRecord,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub font_family: Option<String>,
    /// Set when `width` is a user-chosen box width rather than the text's extent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fixed_width: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    #[serde(flatten)]
    pub common: CommonRecord,
    #[serde(default)]
    pub src: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRecord {
    #[serde(flatten)]
    pub common: CommonRecord,
    #[serde(default)]
    pub x1: f64,
    #[serde(default)]
    pub y1: f64,
    #[serde(default)]
    pub x2: f64,
    #[serde(default)]
    pub y2: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_dash_array: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrowRecord {
    #[serde(flatten)]
    pub common: CommonRecord,
    #[serde(default)]
    pub points: Option<Vec<f64>>,
}

/// Serialize a typed record and stamp its `type` discriminator.
pub(crate) fn encode_record<T: Serialize>(
    kind: ShapeKind,
    record: &T,
) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut value {
        map.insert("type".to_string(), Value::String(kind.tag().to_string()));
    }
    Ok(value)
}

/// Deserialize a typed record, naming the kind on failure.
pub(crate) fn decode_record<T: for<'de> Deserialize<'de>>(
    kind: &'static str,
    value: &Value,
) -> Result<T, ShapeError> {
    T::deserialize(value).map_err(|source| ShapeError::InvalidRecord { kind, source })
}

/// Result of reviving one record.
#[derive(Debug)]
pub enum Revived {
    Shape(Shape),
    Skip,
}

/// Turns portable records back into shapes.
///
/// A reviver decides per record; skipping a record never aborts the scene.
pub trait Reviver {
    fn revive(&self, record: &Value) -> Revived;
}

/// Default reviver: dispatches on the `type` tag through [`ShapeKind`].
#[derive(Debug, Clone, Default)]
pub struct SceneReviver {
    defaults: ShapeDefaults,
}

impl SceneReviver {
    pub fn new(defaults: ShapeDefaults) -> Self {
        Self { defaults }
    }
}

impl Reviver for SceneReviver {
    fn revive(&self, record: &Value) -> Revived {
        let Some(tag) = record.get("type").and_then(Value::as_str) else {
            log::warn!("Skipping portable record without a type");
            return Revived::Skip;
        };
        let Some(kind) = ShapeKind::from_tag(tag) else {
            log::warn!("Skipping unknown shape type '{}'", tag);
            return Revived::Skip;
        };
        match kind.revive(record) {
            Ok(mut shape) => {
                shape.style_mut().chrome = self.defaults.chrome;
                Revived::Shape(shape)
            }
            Err(e) => {
                log::warn!("Skipping {} record: {}", tag, e);
                Revived::Skip
            }
        }
    }
}

impl ShapeKind {
    /// Rebuild a shape of this kind from its portable record.
    pub fn revive(self, record: &Value) -> Result<Shape, ShapeError> {
        use crate::shapes::{Arrow, Circle, Image, Line, Path, Rectangle, Textbox};
        Ok(match self {
            ShapeKind::Path => Shape::Path(Path::from_portable(record)?),
            ShapeKind::Rect => Shape::Rect(Rectangle::from_portable(record)?),
            ShapeKind::Circle => Shape::Circle(Circle::from_portable(record)?),
            ShapeKind::Textbox => Shape::Textbox(Textbox::from_portable(record)?),
            ShapeKind::Image => Shape::Image(Image::from_portable(record)?),
            ShapeKind::Line => Shape::Line(Line::from_portable(record)?),
            ShapeKind::Arrow => Shape::Arrow(Arrow::from_portable(record)?),
        })
    }
}

impl Shape {
    /// Encode this shape as a portable record.
    pub fn to_portable(&self) -> Result<Value, serde_json::Error> {
        match self {
            Shape::Path(s) => s.to_portable(),
            Shape::Rect(s) => s.to_portable(),
            Shape::Circle(s) => s.to_portable(),
            Shape::Textbox(s) => s.to_portable(),
            Shape::Image(s) => s.to_portable(),
            Shape::Line(s) => s.to_portable(),
            Shape::Arrow(s) => s.to_portable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_common_defaults() {
        let common: CommonRecord = serde_json::from_value(json!({})).unwrap();
        assert_eq!(common.scale_x, 1.0);
        assert_eq!(common.scale_y, 1.0);
        assert_eq!(common.opacity, 1.0);
        assert!(common.stroke.is_none());
        assert!(common.flags().selectable);
    }

    #[test]
    fn test_lenient_fill() {
        let common: CommonRecord = serde_json::from_value(json!({
            "fill": { "type": "linear", "colorStops": [] },
            "stroke": "#ff0000"
        }))
        .unwrap();
        assert!(common.fill.is_none());
        let style = common.style();
        assert_eq!(style.stroke_color, Some(SerializableColor::new(255, 0, 0, 255)));
        assert_eq!(style.fill_color, None);
    }

    #[test]
    fn test_transparent_fill_is_none() {
        let common: CommonRecord =
            serde_json::from_value(json!({ "fill": "transparent" })).unwrap();
        assert_eq!(common.style().fill_color, None);
    }

    #[test]
    fn test_portable_scene_defaults() {
        let scene: PortableScene = serde_json::from_value(json!({ "objects": [] })).unwrap();
        assert_eq!(scene.background, "#ffffff");
        assert_eq!(scene.canvas_width, 794.0);
        assert_eq!(scene.canvas_height, 1123.0);

        let value = serde_json::to_value(PortableScene::default()).unwrap();
        assert!(value.get("canvasWidth").is_some());
    }

    #[test]
    fn test_reviver_skips_unknown_and_untyped() {
        let reviver = SceneReviver::default();
        assert!(matches!(
            reviver.revive(&json!({ "type": "polygon", "points": [] })),
            Revived::Skip
        ));
        assert!(matches!(reviver.revive(&json!({ "left": 1 })), Revived::Skip));
        assert!(matches!(
            reviver.revive(&json!({ "type": "arrow", "points": [0, 0, 10] })),
            Revived::Skip
        ));
    }

    #[test]
    fn test_reviver_applies_chrome() {
        let mut defaults = ShapeDefaults::default();
        defaults.chrome.corner_size = 11.0;
        let reviver = SceneReviver::new(defaults);
        let Revived::Shape(shape) =
            reviver.revive(&json!({ "type": "rect", "width": 10, "height": 10 }))
        else {
            panic!("rect should revive");
        };
        assert_eq!(shape.style().chrome.corner_size, 11.0);
    }

    #[test]
    fn test_record_type_stamp() {
        let value = encode_record(
            ShapeKind::Circle,
            &CircleRecord {
                common: serde_json::from_value(json!({})).unwrap(),
                radius: 5.0,
            },
        )
        .unwrap();
        assert_eq!(value["type"], "circle");
        assert_eq!(value["radius"], 5.0);
    }
}
