//! Error types for the edgequake-redact library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`RedactError`] — **Fatal**: the run cannot produce a safe artifact
//!   (bad parameters, unreadable input, assembly failure, cancellation).
//!   Returned as `Err(RedactError)` from the top-level `redact*` functions,
//!   and no output is written.
//!
//! * [`PageError`] — **Non-fatal**: recognition failed on one page. The page
//!   is emitted without replacements and the failure is stored in its
//!   [`crate::output::PageReport`] so callers can see exactly which pages
//!   went through unredacted.
//!
//! The rule separating the two: anything that could leave residual
//! sensitive text in an artifact *without telling anyone* is fatal.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-redact library.
#[derive(Debug, Error)]
pub enum RedactError {
    // ── Parameter errors ──────────────────────────────────────────────────
    /// Configuration rejected before any I/O took place.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file is neither a supported image nor a PDF.
    #[error(
        "Unsupported input format for '{path}': {detail}\n\
Supported: png, jpg, jpeg, tiff, tif, bmp, pdf."
    )]
    UnsupportedFormat { path: PathBuf, detail: String },

    /// The input could not be turned into raster pages.
    #[error("Rasterisation failed: {detail}")]
    Rasterization { detail: String },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// A collaborator (pdfium, OCR models, fonts) could not be loaded.
    #[error("{engine} is unavailable: {detail}")]
    EngineUnavailable { engine: String, detail: String },

    /// The redacted pages could not be encoded into the output artifact.
    #[error("Assembly failed: {detail}")]
    Assembly { detail: String },

    // ── Run outcome errors ────────────────────────────────────────────────
    /// Strict mode: at least one page failed recognition.
    ///
    /// Also returned by [`crate::output::RedactionOutput::into_result`].
    #[error("{failed}/{total} pages failed recognition and would be emitted unredacted")]
    PartialFailure { failed: usize, total: usize },

    /// The run was cancelled; no artifact was produced.
    #[error("Redaction cancelled; no output was written")]
    Cancelled,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RedactError {
    /// The caller handed us something unusable: bad flags or a bad file.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            RedactError::InvalidParameter(_)
                | RedactError::FileNotFound { .. }
                | RedactError::PermissionDenied { .. }
                | RedactError::UnsupportedFormat { .. }
        )
    }

    /// A collaborator (rasteriser, OCR, recomposer, file system) failed.
    pub fn is_collaborator_error(&self) -> bool {
        matches!(
            self,
            RedactError::Rasterization { .. }
                | RedactError::EngineUnavailable { .. }
                | RedactError::Assembly { .. }
                | RedactError::OutputWriteFailed { .. }
                | RedactError::Internal(_)
        )
    }
}

/// A non-fatal error for a single page.
///
/// The page is passed through with zero replacements, which is a
/// correctness risk, so every `PageError` is surfaced in the run summary.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The recogniser could not process the page.
    #[error("Page {page}: recognition failed: {detail}")]
    Recognition { page: usize, detail: String },

    /// The recogniser did not answer in time.
    #[error("Page {page}: recognition timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

impl PageError {
    pub fn page(&self) -> usize {
        match self {
            PageError::Recognition { page, .. } | PageError::Timeout { page, .. } => *page,
        }
    }
}

/// The synthetic content service cannot serve a class/locale combination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("synthetic content unavailable: {reason}")]
pub struct GenerationUnavailable {
    pub reason: String,
}

impl GenerationUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
