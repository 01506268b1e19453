//! Redaction entry points and per-page orchestration.
//!
//! A run has three phases:
//!
//! 1. **Document phase**: validate the config, resolve the input, bind the
//!    collaborators, rasterise every page.
//! 2. **Page phase**: pages fan out to up to `concurrency` workers. Each
//!    worker owns its page and runs extract → select → generate → composite
//!    in order, checking the cancellation flag between stages. A
//!    recognition failure is recorded on the page report and the page passes
//!    through untouched; it never stops sibling pages.
//! 3. **Assembly phase**: once every worker is done, pages are sorted back
//!    into document order and encoded.
//!
//! Cancellation observed anywhere, or a page failure in strict mode, ends
//! the run with an error and no artifact.

use crate::config::RedactionConfig;
use crate::engines::pdfium::{PdfiumRasterizer, PdfiumRecomposer};
use crate::engines::synthetic::LocaleWordGenerator;
use crate::engines::{Rasterizer, Recognizer, Recomposer, SyntheticGenerator};
use crate::error::RedactError;
use crate::model::{OutputFormat, Page, SourceFormat};
use crate::output::{
    Diagnostic, DocumentInfo, PageReport, PageStatus, RedactionOutput, RedactionStats,
};
use crate::pipeline::composite::{load_font, Compositor};
use crate::pipeline::select::{select_regions, SelectOptions};
use crate::pipeline::{assemble, extract, generate, input, render};
use futures::stream::{self, StreamExt};
use image::RgbImage;
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Redact an image or PDF and return the artifact with its report.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(RedactionOutput)` even when some pages failed recognition; those
/// pages are in the artifact unredacted and listed by
/// [`RedactionOutput::failed_pages`]. Use
/// [`RedactionOutput::into_result`] or `strict` to treat them as errors.
///
/// # Errors
/// Returns `Err(RedactError)` for fatal errors only:
/// - invalid configuration (before any file is opened)
/// - missing, unreadable or unsupported input
/// - a collaborator that cannot be bound, rasterisation or assembly failure
/// - cancellation, or any page failure when `strict` is set
pub async fn redact(
    input_path: impl AsRef<Path>,
    config: &RedactionConfig,
) -> Result<RedactionOutput, RedactError> {
    let total_start = Instant::now();
    let input_path = input_path.as_ref();

    // ── Step 1: Validate config ──────────────────────────────────────────
    config.validate()?;
    let pattern = config.compiled_pattern()?;
    let compositor = Compositor::new(load_font(config.font_path.as_deref())?, config);

    // ── Step 2: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_path)?;
    info!(
        "Starting redaction: {} ({:?}, {} bytes)",
        resolved.path.display(),
        resolved.format,
        resolved.file_size
    );

    // ── Step 3: Bind collaborators ───────────────────────────────────────
    let rasterizer = resolve_rasterizer(config);
    let recomposer = resolve_recomposer(config);
    let generator = resolve_generator(config);
    let recognizer = resolve_recognizer(config)?;
    config.cancellation.check()?;

    // ── Step 4: Rasterise ────────────────────────────────────────────────
    let render_start = Instant::now();
    let document = render::rasterize_document(&resolved, rasterizer, config.dpi).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    let total_pages = document.pages.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total_pages);
    }

    // ── Step 5: Per-page workers ─────────────────────────────────────────
    let worker = Arc::new(PageWorker {
        config: config.clone(),
        pattern,
        recognizer,
        generator,
        compositor,
        total_pages,
    });

    let process_start = Instant::now();
    let results: Vec<Result<PageOutcome, RedactError>> = stream::iter(
        document.pages.into_iter().map(|page| {
            let worker = Arc::clone(&worker);
            async move { worker.process(page).await }
        }),
    )
    .buffer_unordered(config.concurrency)
    .collect()
    .await;
    let process_duration_ms = process_start.elapsed().as_millis() as u64;

    let mut outcomes = Vec::with_capacity(results.len());
    for result in results {
        outcomes.push(result?);
    }
    config.cancellation.check()?;

    // Completion order is arbitrary; the artifact follows document order.
    outcomes.sort_by_key(|o| o.page.index);

    let mut pages = Vec::with_capacity(total_pages);
    let mut reports = Vec::with_capacity(total_pages);
    let mut diagnostics = Vec::new();
    for outcome in outcomes {
        pages.push(outcome.page);
        reports.push(outcome.report);
        diagnostics.extend(outcome.diagnostics);
    }

    let failed = reports
        .iter()
        .filter(|r| r.status == PageStatus::RecognitionFailed)
        .count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total_pages, total_pages - failed);
    }
    if failed > 0 {
        warn!(
            "{}/{} pages failed recognition and will be emitted unredacted",
            failed, total_pages
        );
        if config.strict {
            return Err(RedactError::PartialFailure {
                failed,
                total: total_pages,
            });
        }
    }

    // ── Step 6: Assemble ─────────────────────────────────────────────────
    config.cancellation.check()?;
    let assembly_start = Instant::now();
    let (artifact, output_format) =
        assemble::assemble_document(&pages, document.source, document.dpi, recomposer).await?;
    let assembly_duration_ms = assembly_start.elapsed().as_millis() as u64;

    // ── Step 7: Stats ────────────────────────────────────────────────────
    let mut stats = RedactionStats {
        render_duration_ms,
        process_duration_ms,
        assembly_duration_ms,
        ..Default::default()
    };
    stats.tally(&reports, &diagnostics);
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Redaction complete: {} regions on {}/{} pages, {}ms total",
        stats.total_regions, stats.redacted_pages, total_pages, stats.total_duration_ms
    );

    Ok(RedactionOutput {
        artifact,
        source_format: document.source,
        output_format,
        dpi: document.dpi,
        pages: reports,
        diagnostics,
        stats,
    })
}

/// Redact and write the artifact to `output_path`.
///
/// Passing the input path replaces the input in place. The write is atomic
/// (temp file in the destination directory, then rename), so a failed or
/// cancelled run leaves any existing file untouched.
pub async fn redact_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &RedactionConfig,
) -> Result<RedactionOutput, RedactError> {
    let output_path = output_path.as_ref();
    check_output_extension(input_path.as_ref(), output_path)?;

    let output = redact(input_path, config).await?;
    write_atomic(output_path, &output.artifact)?;
    info!("Wrote {}", output_path.display());
    Ok(output)
}

/// Synchronous wrapper around [`redact`].
///
/// Creates a temporary tokio runtime internally.
pub fn redact_sync(
    input_path: impl AsRef<Path>,
    config: &RedactionConfig,
) -> Result<RedactionOutput, RedactError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| RedactError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(redact(input_path, config))
}

/// Redact an in-memory image or PDF.
///
/// The bytes are written to a managed temp file (removed on return) whose
/// extension matches the sniffed format.
///
/// # Example
/// ```rust,no_run
/// use edgequake_redact::{redact_from_bytes, RedactionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("scan.png")?;
/// let config = RedactionConfig::builder().pattern(r"\d{3}-\d{2}-\d{4}").build()?;
/// let output = redact_from_bytes(&bytes, &config).await?;
/// std::fs::write("scan.redacted.png", &output.artifact)?;
/// # Ok(())
/// # }
/// ```
pub async fn redact_from_bytes(
    bytes: &[u8],
    config: &RedactionConfig,
) -> Result<RedactionOutput, RedactError> {
    let format = input::sniff_format(bytes).ok_or_else(|| RedactError::UnsupportedFormat {
        path: "<memory>".into(),
        detail: "content is not a supported image or PDF".into(),
    })?;
    let suffix = match format {
        SourceFormat::Pdf => ".pdf".to_string(),
        SourceFormat::Image(kind) => format!(".{}", kind.extension()),
    };

    let mut tmp = tempfile::Builder::new()
        .suffix(&suffix)
        .tempfile()
        .map_err(|e| RedactError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| RedactError::Internal(format!("tempfile write: {e}")))?;
    // `tmp` is dropped (and the file deleted) when `redact` returns
    redact(tmp.path(), config).await
}

/// Format, page count and size of an input, without recognition.
///
/// Uses the configured rasteriser (or the default one) to count pages.
pub async fn inspect(
    input_path: impl AsRef<Path>,
    config: &RedactionConfig,
) -> Result<DocumentInfo, RedactError> {
    let resolved = input::resolve_input(input_path)?;
    let page_count = render::count_pages(&resolved, resolve_rasterizer(config)).await?;
    Ok(DocumentInfo {
        source_format: resolved.format,
        page_count,
        file_size: resolved.file_size,
    })
}

// ── Page worker ──────────────────────────────────────────────────────────

/// Everything a page worker needs; shared read-only across workers.
struct PageWorker {
    config: RedactionConfig,
    pattern: Option<Regex>,
    recognizer: Arc<dyn Recognizer>,
    generator: Arc<dyn SyntheticGenerator>,
    compositor: Compositor,
    total_pages: usize,
}

struct PageOutcome {
    page: Page,
    report: PageReport,
    diagnostics: Vec<Diagnostic>,
}

impl PageWorker {
    /// Run one page through extract → select → generate → composite.
    ///
    /// Only cancellation is an `Err`; recognition failures are reported on
    /// the outcome.
    async fn process(&self, mut page: Page) -> Result<PageOutcome, RedactError> {
        let start = Instant::now();
        let page_num = page.number();
        let cancel = &self.config.cancellation;
        let cb = self.config.progress_callback.as_ref();

        if let Some(cb) = cb {
            cb.on_page_start(page_num, self.total_pages);
        }

        // ── Extract ──────────────────────────────────────────────────────
        cancel.check()?;
        let recognizer = Arc::clone(&self.recognizer);
        let tokens = match extract::extract_tokens(&page, recognizer, &self.config).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("{} (page emitted unredacted)", e);
                if let Some(cb) = cb {
                    cb.on_page_error(page_num, self.total_pages, &e.to_string());
                }
                let report = PageReport {
                    page_num,
                    status: PageStatus::RecognitionFailed,
                    token_count: 0,
                    low_confidence_tokens: 0,
                    region_count: 0,
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: Some(e),
                };
                return Ok(PageOutcome {
                    page,
                    report,
                    diagnostics: Vec::new(),
                });
            }
        };
        page.tokens = tokens;

        // ── Select ───────────────────────────────────────────────────────
        cancel.check()?;
        let mut regions = select_regions(
            &page.tokens,
            self.pattern.as_ref(),
            SelectOptions::from(&self.config),
            page.raster.width(),
            page.raster.height(),
        );
        let region_count = regions.len();
        debug!("Page {}: {} regions selected", page_num, region_count);

        // ── Generate ─────────────────────────────────────────────────────
        cancel.check()?;
        let mut diagnostics = generate::generate_replacements(
            &mut regions,
            page_num,
            &self.config,
            self.generator.as_ref(),
        );

        // ── Composite ────────────────────────────────────────────────────
        cancel.check()?;
        if !regions.is_empty() {
            let compositor = self.compositor.clone();
            // Take the page's handle so `make_mut` can reuse the buffer.
            let empty = Arc::new(RgbImage::new(0, 0));
            let mut image = std::mem::replace(&mut page.raster.image, empty);
            let (image, composite_diags) = tokio::task::spawn_blocking(move || {
                let diags = compositor.apply(Arc::make_mut(&mut image), &regions, page_num);
                (image, diags)
            })
            .await
            .map_err(|e| RedactError::Internal(format!("Composite task panicked: {}", e)))?;
            page.raster.image = image;
            diagnostics.extend(composite_diags);
        }

        let status = if region_count > 0 {
            PageStatus::Redacted
        } else {
            PageStatus::NoMatches
        };
        let report = PageReport {
            page_num,
            status,
            token_count: page.tokens.len(),
            low_confidence_tokens: page.tokens.iter().filter(|t| t.low_confidence).count(),
            region_count,
            duration_ms: start.elapsed().as_millis() as u64,
            error: None,
        };

        if let Some(cb) = cb {
            cb.on_page_complete(page_num, self.total_pages, region_count);
        }

        Ok(PageOutcome {
            page,
            report,
            diagnostics,
        })
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn resolve_rasterizer(config: &RedactionConfig) -> Arc<dyn Rasterizer> {
    config
        .rasterizer
        .clone()
        .unwrap_or_else(|| Arc::new(PdfiumRasterizer))
}

fn resolve_recomposer(config: &RedactionConfig) -> Arc<dyn Recomposer> {
    config
        .recomposer
        .clone()
        .unwrap_or_else(|| Arc::new(PdfiumRecomposer))
}

fn resolve_generator(config: &RedactionConfig) -> Arc<dyn SyntheticGenerator> {
    config
        .generator
        .clone()
        .unwrap_or_else(|| Arc::new(LocaleWordGenerator))
}

/// The injected recogniser, else `ocrs` with the default model directory.
fn resolve_recognizer(config: &RedactionConfig) -> Result<Arc<dyn Recognizer>, RedactError> {
    if let Some(ref recognizer) = config.recognizer {
        return Ok(Arc::clone(recognizer));
    }
    default_recognizer()
}

#[cfg(feature = "ocr")]
fn default_recognizer() -> Result<Arc<dyn Recognizer>, RedactError> {
    crate::engines::ocr::OcrsRecognizer::with_defaults()
        .map(|r| Arc::new(r) as Arc<dyn Recognizer>)
        .map_err(|e| RedactError::EngineUnavailable {
            engine: "OCR engine".into(),
            detail: e.to_string(),
        })
}

#[cfg(not(feature = "ocr"))]
fn default_recognizer() -> Result<Arc<dyn Recognizer>, RedactError> {
    Err(RedactError::EngineUnavailable {
        engine: "OCR engine".into(),
        detail: "built without the `ocr` feature; inject a Recognizer".into(),
    })
}

/// The output must be the same kind of file the input produces: a PDF for
/// PDFs, the same image encoding for images.
fn check_output_extension(input_path: &Path, output_path: &Path) -> Result<(), RedactError> {
    // An unknown input extension is reported by input resolution.
    let Some(source) = input::format_from_extension(input_path) else {
        return Ok(());
    };
    let target = input::format_from_extension(output_path).ok_or_else(|| {
        RedactError::InvalidParameter(format!(
            "output '{}' has no supported extension",
            output_path.display()
        ))
    })?;
    let expected = OutputFormat::for_source(source, 1);
    if OutputFormat::for_source(target, 1) != expected {
        return Err(RedactError::InvalidParameter(format!(
            "output '{}' must be {:?} to match the input",
            output_path.display(),
            expected
        )));
    }
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RedactError> {
    let write_err = |source: std::io::Error| RedactError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
