//! Geometry and document model shared by every pipeline stage.
//!
//! These are plain value types. The only behaviour they carry is the
//! arithmetic needed to keep their invariants: a [`BoundingBox`] is never
//! empty and, once attached to a [`Page`], never leaves the page extent.
//!
//! Coordinates are page pixels with the origin at the top-left corner.
//! Boxes are half-open: a box covers columns `left..right` and rows
//! `top..bottom`.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

// ── BoundingBox ──────────────────────────────────────────────────────────

/// An axis-aligned pixel rectangle, `left < right` and `top < bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BoundingBox {
    /// Build a box, returning `None` when it would be empty.
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Option<Self> {
        (left < right && top < bottom).then_some(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Convert floating-point edges into the smallest pixel box that covers
    /// them, clamped to a `width × height` page.
    ///
    /// Returns `None` if nothing of the box lies on the page.
    pub fn from_edges(
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
        width: u32,
        height: u32,
    ) -> Option<Self> {
        if !(left.is_finite() && top.is_finite() && right.is_finite() && bottom.is_finite()) {
            return None;
        }
        let clamp_x = |v: f32| v.clamp(0.0, width as f32);
        let clamp_y = |v: f32| v.clamp(0.0, height as f32);
        let l = clamp_x(left.min(right)).floor() as u32;
        let r = clamp_x(left.max(right)).ceil() as u32;
        let t = clamp_y(top.min(bottom)).floor() as u32;
        let b = clamp_y(top.max(bottom)).ceil() as u32;
        Self::new(l, t, r, b)
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn center_y(&self) -> f32 {
        (self.top + self.bottom) as f32 / 2.0
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Grow by `margin` pixels on every side without leaving a
    /// `width × height` page.
    pub fn expand(&self, margin: u32, width: u32, height: u32) -> BoundingBox {
        BoundingBox {
            left: self.left.saturating_sub(margin),
            top: self.top.saturating_sub(margin),
            right: self.right.saturating_add(margin).min(width),
            bottom: self.bottom.saturating_add(margin).min(height),
        }
    }

    /// True when the two boxes share at least one pixel.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// True when the box lies fully inside a `width × height` page.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right <= width && self.bottom <= height
    }
}

// ── Character class ──────────────────────────────────────────────────────

/// Coarse shape of a piece of text, used to pick a plausible replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharClass {
    Alphabetic,
    Numeric,
    Mixed,
    PunctuationHeavy,
}

impl CharClass {
    /// Classify `text`, ignoring whitespace.
    ///
    /// More than half punctuation/symbols is `PunctuationHeavy`; otherwise
    /// letters-only is `Alphabetic`, digits-only (separators allowed) is
    /// `Numeric`, and anything with both is `Mixed`.
    pub fn of(text: &str) -> CharClass {
        let mut letters = 0usize;
        let mut digits = 0usize;
        let mut other = 0usize;
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            if c.is_alphabetic() {
                letters += 1;
            } else if c.is_numeric() {
                digits += 1;
            } else {
                other += 1;
            }
        }
        let total = letters + digits + other;
        if total == 0 || other * 2 > total {
            return CharClass::PunctuationHeavy;
        }
        match (letters > 0, digits > 0) {
            (true, false) => CharClass::Alphabetic,
            (false, true) => CharClass::Numeric,
            _ => CharClass::Mixed,
        }
    }
}

// ── Token ────────────────────────────────────────────────────────────────

/// One recognised text fragment on a page.
///
/// Produced once by the extractor and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub bbox: BoundingBox,
    /// Recogniser confidence in `[0, 1]`.
    pub confidence: f32,
    pub class: CharClass,
    /// Confidence was below the configured floor.
    pub low_confidence: bool,
    /// Index of the reading-order line band the token belongs to.
    pub line: usize,
}

impl Token {
    /// Average glyph width, used for the merge-gap threshold.
    pub fn char_width(&self) -> f32 {
        let chars = self.text.chars().filter(|c| !c.is_whitespace()).count();
        self.bbox.width() as f32 / chars.max(1) as f32
    }
}

// ── Raster / Page / Document ─────────────────────────────────────────────

/// A page's pixel buffer and the resolution it was rasterised at.
///
/// The image is reference-counted so the recogniser can read it on a
/// blocking thread while the page stays owned by its worker; the compositor
/// takes it back with [`Arc::make_mut`].
#[derive(Debug, Clone)]
pub struct Raster {
    pub image: Arc<RgbImage>,
    pub dpi: u32,
}

impl Raster {
    pub fn new(image: RgbImage, dpi: u32) -> Self {
        Self {
            image: Arc::new(image),
            dpi,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

/// One page of a document.
#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based position in the source document.
    pub index: usize,
    pub raster: Raster,
    /// Tokens in reading order. Empty until extraction ran.
    pub tokens: Vec<Token>,
}

impl Page {
    pub fn new(index: usize, raster: Raster) -> Self {
        Self {
            index,
            raster,
            tokens: Vec::new(),
        }
    }

    /// 1-based page number for reports and logs.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Image encodings accepted as input and reproduced on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Png,
    Jpeg,
    Tiff,
    Bmp,
}

impl ImageKind {
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            ImageKind::Png => image::ImageFormat::Png,
            ImageKind::Jpeg => image::ImageFormat::Jpeg,
            ImageKind::Tiff => image::ImageFormat::Tiff,
            ImageKind::Bmp => image::ImageFormat::Bmp,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "tif" | "tiff" => Some(ImageKind::Tiff),
            "bmp" => Some(ImageKind::Bmp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
            ImageKind::Tiff => "tiff",
            ImageKind::Bmp => "bmp",
        }
    }
}

/// What the input file was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Image(ImageKind),
    Pdf,
}

/// What the assembled artifact will be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Image(ImageKind),
    Pdf,
}

impl OutputFormat {
    /// A single-page image stays an image; a PDF (or anything with several
    /// pages) becomes a PDF.
    pub fn for_source(source: SourceFormat, page_count: usize) -> Self {
        match source {
            SourceFormat::Image(kind) if page_count == 1 => OutputFormat::Image(kind),
            _ => OutputFormat::Pdf,
        }
    }
}

/// All pages of one input plus where they came from.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub source: SourceFormat,
    pub dpi: u32,
    /// Ordered by `Page::index`.
    pub pages: Vec<Page>,
}

// ── MatchRegion ──────────────────────────────────────────────────────────

/// A page area selected for replacement.
///
/// Created by the selector, completed by the generator, consumed by the
/// compositor. Never persisted and never logged: `original` holds the
/// sensitive text.
#[derive(Clone, PartialEq)]
pub struct MatchRegion {
    /// Union of the member token boxes plus the configured margin.
    pub bbox: BoundingBox,
    /// Member token texts joined by single spaces.
    pub original: String,
    /// Dominant class of `original`.
    pub class: CharClass,
    /// Number of tokens merged into this region.
    pub token_count: usize,
    /// Filled in by the generator.
    pub replacement: Option<String>,
}

impl std::fmt::Debug for MatchRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchRegion")
            .field("bbox", &self.bbox)
            .field(
                "original",
                &format_args!("<{} chars>", self.original.chars().count()),
            )
            .field("class", &self.class)
            .field("token_count", &self.token_count)
            .field("replacement", &self.replacement)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_boxes_are_rejected() {
        assert!(BoundingBox::new(5, 5, 5, 10).is_none());
        assert!(BoundingBox::new(5, 10, 8, 10).is_none());
        assert!(BoundingBox::new(5, 5, 6, 6).is_some());
    }

    #[test]
    fn from_edges_clamps_and_covers() {
        let b = BoundingBox::from_edges(-3.2, 1.5, 10.1, 20.0, 8, 100).unwrap();
        assert_eq!(b, BoundingBox::new(0, 1, 8, 20).unwrap());
        assert!(BoundingBox::from_edges(50.0, 0.0, 60.0, 5.0, 40, 40).is_none());
        assert!(BoundingBox::from_edges(f32::NAN, 0.0, 1.0, 1.0, 4, 4).is_none());
    }

    #[test]
    fn expand_stays_on_page() {
        let b = BoundingBox::new(1, 1, 98, 48).unwrap();
        let e = b.expand(2, 100, 50);
        assert_eq!(e, BoundingBox::new(0, 0, 100, 50).unwrap());
        assert!(e.fits_within(100, 50));
    }

    #[test]
    fn union_and_intersection() {
        let a = BoundingBox::new(0, 0, 10, 10).unwrap();
        let b = BoundingBox::new(10, 0, 20, 10).unwrap();
        assert!(!a.intersects(&b), "touching edges do not overlap");
        let c = BoundingBox::new(9, 9, 12, 12).unwrap();
        assert!(a.intersects(&c));
        assert_eq!(a.union(&b), BoundingBox::new(0, 0, 20, 10).unwrap());
    }

    #[test]
    fn char_class_detection() {
        assert_eq!(CharClass::of("Smith"), CharClass::Alphabetic);
        assert_eq!(CharClass::of("123-45-6789"), CharClass::Numeric);
        assert_eq!(CharClass::of("AB12CD"), CharClass::Mixed);
        assert_eq!(CharClass::of("--/--"), CharClass::PunctuationHeavy);
        assert_eq!(CharClass::of("   "), CharClass::PunctuationHeavy);
        assert_eq!(CharClass::of("John Smith,"), CharClass::Alphabetic);
    }

    #[test]
    fn output_format_follows_source() {
        assert_eq!(
            OutputFormat::for_source(SourceFormat::Image(ImageKind::Png), 1),
            OutputFormat::Image(ImageKind::Png)
        );
        assert_eq!(
            OutputFormat::for_source(SourceFormat::Pdf, 1),
            OutputFormat::Pdf
        );
        assert_eq!(
            OutputFormat::for_source(SourceFormat::Image(ImageKind::Tiff), 3),
            OutputFormat::Pdf
        );
    }

    #[test]
    fn region_debug_hides_original_text() {
        let region = MatchRegion {
            bbox: BoundingBox::new(0, 0, 4, 4).unwrap(),
            original: "123-45-6789".into(),
            class: CharClass::Numeric,
            token_count: 1,
            replacement: None,
        };
        let dbg = format!("{region:?}");
        assert!(!dbg.contains("6789"), "got: {dbg}");
        assert!(dbg.contains("11 chars"));
    }
}
