//! Collaborator interfaces and their default implementations.
//!
//! The pipeline never talks to pdfium, an OCR model, or a word list
//! directly. Each external capability sits behind a narrow trait so the core
//! can run against deterministic fakes in tests and so callers can plug in
//! their own engines (Tesseract over FFI, a cloud OCR API, …):
//!
//! | Trait                | Default                                   |
//! |----------------------|-------------------------------------------|
//! | [`Rasterizer`]       | [`pdfium::PdfiumRasterizer`]              |
//! | [`Recognizer`]       | `ocr::OcrsRecognizer` (feature `ocr`)     |
//! | [`SyntheticGenerator`] | [`synthetic::LocaleWordGenerator`]      |
//! | [`Recomposer`]       | [`pdfium::PdfiumRecomposer`]              |
//!
//! All traits are `Send + Sync` because page workers share one instance
//! through an `Arc`.

#[cfg(feature = "ocr")]
pub mod ocr;
pub mod pdfium;
pub mod synthetic;

use crate::error::GenerationUnavailable;
use crate::model::{CharClass, OutputFormat, SourceFormat};
use image::RgbImage;
use rand::RngCore;
use std::path::Path;
use thiserror::Error;

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine itself could not be loaded (missing library or models).
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The engine ran but could not process this input.
    #[error("{0}")]
    Failed(String),
}

/// One word as reported by a recognition engine, in page pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedWord {
    pub text: String,
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    /// In `[0, 1]`; engines that do not score words report `1.0`.
    pub confidence: f32,
}

/// Turns an input file into raster pages.
pub trait Rasterizer: Send + Sync {
    /// Number of pages without rendering them.
    fn page_count(&self, path: &Path, format: SourceFormat) -> Result<usize, EngineError>;

    /// Render every page at `dpi`, in document order.
    fn rasterize(
        &self,
        path: &Path,
        format: SourceFormat,
        dpi: u32,
    ) -> Result<Vec<RgbImage>, EngineError>;
}

/// Finds words on a whole page.
pub trait Recognizer: Send + Sync {
    /// Recognise every word on `image`.
    ///
    /// `language` is an ISO-639-2 style hint (`"eng"`, `"fra"`); engines
    /// that cannot use it ignore it. `confidence_floor` is advisory: the
    /// extractor flags low-confidence words itself.
    fn recognize(
        &self,
        image: &RgbImage,
        language: &str,
        confidence_floor: f32,
    ) -> Result<Vec<RecognizedWord>, EngineError>;
}

/// Produces plausible replacement content for one run of characters.
pub trait SyntheticGenerator: Send + Sync {
    /// Generate about `length_hint` characters of `class`-shaped content for
    /// `locale`, drawing randomness only from `rng`.
    fn generate(
        &self,
        class: CharClass,
        length_hint: usize,
        locale: &str,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationUnavailable>;
}

/// Encodes finished raster pages into the output artifact.
pub trait Recomposer: Send + Sync {
    fn assemble(
        &self,
        pages: &[&RgbImage],
        dpi: u32,
        format: OutputFormat,
    ) -> Result<Vec<u8>, EngineError>;
}
