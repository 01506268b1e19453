//! Progress-callback trait for per-page redaction events.
//!
//! Inject an [`Arc<dyn RedactionProgressCallback>`] via
//! [`crate::config::RedactionConfigBuilder::progress_callback`] to receive
//! events as page workers move through the pipeline.
//!
//! # Example
//!
//! ```rust
//! use edgequake_redact::{RedactionProgressCallback, RedactionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     regions: Arc<AtomicUsize>,
//! }
//!
//! impl RedactionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, regions: usize) {
//!         self.regions.fetch_add(regions, Ordering::SeqCst);
//!         eprintln!("Page {}/{}: {} regions", page_num, total_pages, regions);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     regions: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = RedactionConfig::builder()
//!     .progress_callback(counter as Arc<dyn RedactionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// Pages run concurrently, so `on_page_*` may be called from several
/// threads at once and in any page order. All methods default to no-ops.
pub trait RedactionProgressCallback: Send + Sync {
    /// Called once after rasterisation, before any page worker starts.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when a worker picks up a page.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page has been composited.
    ///
    /// # Arguments
    /// * `page_num` — 1-indexed page number
    /// * `regions`  — number of regions replaced on the page
    fn on_page_complete(&self, page_num: usize, total_pages: usize, regions: usize) {
        let _ = (page_num, total_pages, regions);
    }

    /// Called when recognition failed and the page passes through unredacted.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has finished, before assembly.
    fn on_run_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RedactionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RedactionConfig`].
pub type ProgressCallback = Arc<dyn RedactionProgressCallback>;
