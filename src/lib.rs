//! # edgequake-redact
//!
//! Find machine-recognised text in scanned images and PDFs and replace it
//! with sanitised content, producing an output of the same visual format.
//!
//! ## Why this crate?
//!
//! In a scan the sensitive data (names, IDs, addresses) exists only as
//! pixels. Text-layer redaction tools cannot see it. This crate rasterises
//! each page, finds the words with OCR, picks the ones to hide with a
//! regular expression (or all of them), paints over them and draws a
//! replacement in their place, then rebuilds the image or PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image / PDF
//!  │
//!  ├─ 1. Input      validate path, sniff the real format
//!  ├─ 2. Render     rasterise pages (pdfium, spawn_blocking)
//!  │    ┌──────────── per page, concurrently ───────────────┐
//!  ├─ 3.│ Extract   one OCR call → tokens in reading order   │
//!  ├─ 4.│ Select    pattern match, merge neighbours          │
//!  ├─ 5.│ Generate  fixed literal or synthetic look-alike    │
//!  ├─ 6.│ Composite erase with border colour, draw new text  │
//!  │    └───────────────────────────────────────────────────┘
//!  └─ 7. Assemble   same image format, or a PDF, in page order
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_redact::{redact_to_file, RedactionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedactionConfig::builder()
//!         .pattern(r"\d{3}-\d{2}-\d{4}")
//!         .replacement_text("[SSN]")
//!         .build()?;
//!     let output = redact_to_file("scan.png", "scan.redacted.png", &config).await?;
//!     eprint!("{}", output.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Safety model
//!
//! - Every pixel inside a selected region is overwritten, whatever is drawn
//!   on top of it.
//! - A page whose recognition fails is emitted **unredacted** and listed in
//!   [`RedactionOutput::failed_pages`]; set `strict` to fail the run
//!   instead.
//! - A cancelled or failed run writes nothing.
//! - Logs and reports never contain recognised text.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr-redact` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `ocr`   | on      | Default recogniser on `ocrs`; without it a [`Recognizer`] must be injected |
//!
//! Disable both when embedding the library with your own OCR engine:
//! ```toml
//! edgequake-redact = { version = "0.1", default-features = false }
//! ```
//!
//! ## Font
//!
//! Replacement text is drawn with DejaVu Sans Mono, embedded in the library.
//! The font keeps its own licence, shipped as `assets/LICENSE-DejaVu`; pass
//! a different font with [`RedactionConfigBuilder::font_path`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cancel;
pub mod config;
pub mod engines;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod redact;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cancel::CancellationFlag;
pub use config::{RedactionConfig, RedactionConfigBuilder, ReplacementMode};
pub use engines::{
    EngineError, Rasterizer, RecognizedWord, Recognizer, Recomposer, SyntheticGenerator,
};
pub use error::{GenerationUnavailable, PageError, RedactError};
pub use model::{BoundingBox, CharClass, ImageKind, MatchRegion, OutputFormat, SourceFormat, Token};
pub use output::{Diagnostic, DocumentInfo, PageReport, PageStatus, RedactionOutput, RedactionStats};
pub use progress::{NoopProgressCallback, ProgressCallback, RedactionProgressCallback};
pub use redact::{inspect, redact, redact_from_bytes, redact_sync, redact_to_file};
