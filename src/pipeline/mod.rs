//! Pipeline stages for OCR redaction.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested on its own against fake collaborators.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ extract ──▶ select ──▶ generate ──▶ composite ──▶ assemble
//! (path)    (pages)    (tokens)    (regions)  (text)       (pixels)      (artifact)
//! ```
//!
//! 1. [`input`]     — validate the path and sniff the real format
//! 2. [`render`]    — rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`extract`]   — one recognition call per page, normalised into tokens
//!    in reading order
//! 4. [`select`]    — pattern match tokens and merge neighbours into regions
//! 5. [`generate`]  — fixed or synthetic replacement text per region
//! 6. [`composite`] — erase each region and draw its replacement
//! 7. [`assemble`]  — encode the pages back into an image or PDF
//!
//! Stages 3–6 run per page inside one worker; the rest run once per
//! document.

pub mod assemble;
pub mod composite;
pub mod extract;
pub mod generate;
pub mod input;
pub mod render;
pub mod select;
