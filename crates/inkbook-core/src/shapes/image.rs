//! Image shape for embedding raster images.

use super::{ShapeError, ShapeFlags, ShapeId, ShapeStyle, ShapeTrait, Transform};
use crate::portable::{CommonRecord, ImageRecord, decode_record, encode_record};
use base64::{Engine, engine::general_purpose::STANDARD};
use kurbo::{Affine, BezPath, Point, Rect, Shape as KurboShape};
use serde_json::Value;
use uuid::Uuid;

/// Where inserted images land on the page.
pub const IMAGE_INSERT_ORIGIN: Point = Point::new(100.0, 50.0);

/// Share of the page an inserted image may cover on each axis.
const IMAGE_FIT_RATIO: f64 = 0.8;

/// Image format for embedded image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG format.
    Png,
    /// JPEG format.
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Get MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Detect format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(ImageFormat::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::WebP);
        }

        None
    }

    /// Sniff the format of a `data:` URL.
    ///
    /// Base64 payloads are checked by magic bytes first; the declared MIME
    /// type is the fallback. Plain URLs yield `None`.
    pub fn sniff_data_url(src: &str) -> Option<Self> {
        let rest = src.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let mime = header.split(';').next().unwrap_or_default();
        if header.ends_with(";base64") {
            // Only the first few bytes are needed for the magic number.
            let n = payload.len().min(24);
            let head = payload.get(..n - n % 4).unwrap_or_default();
            if let Some(format) = STANDARD
                .decode(head)
                .ok()
                .and_then(|bytes| Self::from_magic_bytes(&bytes))
            {
                return Some(format);
            }
        }
        Self::from_mime_type(mime)
    }
}

/// An image shape that displays a raster image.
#[derive(Debug, Clone)]
pub struct Image {
    pub(crate) id: ShapeId,
    /// Top-left corner position.
    pub position: Point,
    /// Original image width in pixels.
    pub natural_width: f64,
    /// Original image height in pixels.
    pub natural_height: f64,
    /// Image source: a URL or a `data:` URL.
    pub src: String,
    /// Format detected from a `data:` URL.
    pub format: Option<ImageFormat>,
    /// Style properties (stroke used for optional border).
    pub style: ShapeStyle,
    pub flags: ShapeFlags,
    /// Display scale lives in the transform.
    pub transform: Transform,
}

impl Image {
    pub fn new(position: Point, src: impl Into<String>, natural_width: f64, natural_height: f64) -> Self {
        let src = src.into();
        Self {
            id: Uuid::new_v4(),
            position,
            natural_width,
            natural_height,
            format: ImageFormat::sniff_data_url(&src),
            src,
            style: ShapeStyle {
                stroke_color: None,
                stroke_width: 0.0,
                ..ShapeStyle::default()
            },
            flags: ShapeFlags::default(),
            transform: Transform::default(),
        }
    }

    /// Build an image from raw bytes, embedding them as a `data:` URL.
    pub fn from_bytes(position: Point, data: &[u8], natural_width: f64, natural_height: f64) -> Option<Self> {
        let format = ImageFormat::from_magic_bytes(data)?;
        let src = format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(data));
        Some(Self::new(position, src, natural_width, natural_height))
    }

    /// Place an image for insertion: fixed origin, uniformly scaled to fit
    /// within 80% of the page.
    pub fn place_fitted(
        src: impl Into<String>,
        natural_width: f64,
        natural_height: f64,
        page_width: f64,
        page_height: f64,
    ) -> Self {
        let mut image = Self::new(IMAGE_INSERT_ORIGIN, src, natural_width, natural_height);
        if natural_width > 0.0 && natural_height > 0.0 {
            let scale = (page_width * IMAGE_FIT_RATIO / natural_width)
                .min(page_height * IMAGE_FIT_RATIO / natural_height);
            image.transform.scale_x = scale;
            image.transform.scale_y = scale;
        }
        image
    }

    /// Display size after scaling.
    pub fn display_size(&self) -> (f64, f64) {
        (
            self.natural_width * self.transform.scale_x,
            self.natural_height * self.transform.scale_y,
        )
    }

    /// Decoded bytes of a base64 `data:` URL.
    pub fn data(&self) -> Option<Vec<u8>> {
        let rest = self.src.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        if !header.ends_with(";base64") {
            return None;
        }
        STANDARD.decode(payload).ok()
    }

    /// Get the unscaled bounding rectangle.
    pub fn as_rect(&self) -> Rect {
        Rect::from_origin_size(self.position, (self.natural_width, self.natural_height))
    }

    pub fn to_portable(&self) -> Result<Value, serde_json::Error> {
        let record = ImageRecord {
            common: CommonRecord::capture(self.bounds(), &self.style, &self.flags, &self.transform),
            src: self.src.clone(),
        };
        encode_record(super::ShapeKind::Image, &record)
    }

    pub fn from_portable(value: &Value) -> Result<Self, ShapeError> {
        let record: ImageRecord = decode_record("image", value)?;
        record.common.check_finite("image")?;
        let common = &record.common;
        let mut image = Image::new(
            Point::new(common.left, common.top),
            record.src,
            common.width.max(0.0),
            common.height.max(0.0),
        );
        image.style = common.style();
        image.flags = common.flags();
        image.transform = common.transform();
        Ok(image)
    }
}

impl ShapeTrait for Image {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn bounds(&self) -> Rect {
        self.as_rect()
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.as_rect().inflate(tolerance, tolerance).contains(point)
    }

    fn to_path(&self) -> BezPath {
        // Bounding box as path (for selection rendering)
        self.as_rect().to_path(0.1)
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

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_magic_bytes() {
        assert_eq!(ImageFormat::from_magic_bytes(&PNG_HEADER), Some(ImageFormat::Png));
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"GIF89a"), None);
    }

    #[test]
    fn test_sniff_data_url() {
        let png = format!("data:image/jpeg;base64,{}", STANDARD.encode(PNG_HEADER));
        // Magic bytes win over the declared type.
        assert_eq!(ImageFormat::sniff_data_url(&png), Some(ImageFormat::Png));
        assert_eq!(
            ImageFormat::sniff_data_url("data:image/webp;base64,AAAA"),
            Some(ImageFormat::WebP)
        );
        assert_eq!(ImageFormat::sniff_data_url("https://example.com/a.png"), None);
    }

    #[test]
    fn test_from_bytes() {
        let image = Image::from_bytes(Point::ZERO, &PNG_HEADER, 10.0, 10.0).unwrap();
        assert!(image.src.starts_with("data:image/png;base64,"));
        assert_eq!(image.format, Some(ImageFormat::Png));
        assert_eq!(image.data().unwrap(), PNG_HEADER.to_vec());
        assert!(Image::from_bytes(Point::ZERO, b"nope", 1.0, 1.0).is_none());
    }

    #[test]
    fn test_place_fitted() {
        // 1000x500 on a 794x1123 page: width limits (635.2 / 1000).
        let image = Image::place_fitted("a.png", 1000.0, 500.0, 794.0, 1123.0);
        assert_eq!(image.position, Point::new(100.0, 50.0));
        assert!((image.transform.scale_x - 0.6352).abs() < 1e-9);
        assert_eq!(image.transform.scale_x, image.transform.scale_y);
        let (w, h) = image.display_size();
        assert!((w - 635.2).abs() < 1e-9);
        assert!((h - 317.6).abs() < 1e-9);
    }

    #[test]
    fn test_portable_roundtrip() {
        let image = Image::place_fitted("https://example.com/a.png", 200.0, 100.0, 600.0, 848.0);
        let value = image.to_portable().unwrap();
        assert_eq!(value["type"], "image");
        assert_eq!(value["width"], 200.0);

        let back = Image::from_portable(&value).unwrap();
        assert_eq!(back.src, image.src);
        assert_eq!(back.natural_width, 200.0);
        assert_eq!(back.transform.scale_x, image.transform.scale_x);
    }
}
