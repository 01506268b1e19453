//! Whole-pipeline tests against deterministic collaborators.
//!
//! Images go through the real `image`-based rasteriser and recomposer (no
//! pdfium needed); recognition is faked so every run is reproducible. PDF
//! inputs use a fake rasteriser and recomposer, since the pipeline only sees
//! raster pages either way.

use edgequake_redact::{
    inspect, redact, redact_from_bytes, redact_to_file, CancellationFlag, Diagnostic, EngineError,
    OutputFormat, PageStatus, Rasterizer, RecognizedWord, Recognizer, Recomposer, RedactError,
    RedactionConfig, RedactionConfigBuilder, RedactionProgressCallback, ReplacementMode,
    SourceFormat,
};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLUE: Rgb<u8> = Rgb([20, 40, 200]);
const RED: Rgb<u8> = Rgb([210, 10, 10]);

fn word(text: &str, left: u32, top: u32, right: u32, bottom: u32) -> RecognizedWord {
    RecognizedWord {
        text: text.to_string(),
        left: left as f32,
        top: top as f32,
        right: right as f32,
        bottom: bottom as f32,
        confidence: 0.95,
    }
}

fn paint(img: &mut RgbImage, w: &RecognizedWord, color: Rgb<u8>) {
    for y in w.top as u32..w.bottom as u32 {
        for x in w.left as u32..w.right as u32 {
            img.put_pixel(x, y, color);
        }
    }
}

/// "John Smith, SSN 123-45-6789": names in blue, the number in red.
fn ssn_page() -> (RgbImage, Vec<RecognizedWord>) {
    let words = vec![
        word("John", 10, 10, 50, 30),
        word("Smith,", 58, 10, 110, 30),
        word("SSN", 118, 10, 150, 30),
        word("123-45-6789", 170, 10, 280, 30),
    ];
    let mut img = RgbImage::from_pixel(400, 40, WHITE);
    for w in &words[..3] {
        paint(&mut img, w, BLUE);
    }
    paint(&mut img, &words[3], RED);
    (img, words)
}

/// Answers by page width so concurrent pages get their own words back.
#[derive(Default)]
struct ByWidth {
    pages: HashMap<u32, Result<Vec<RecognizedWord>, EngineError>>,
    calls: AtomicUsize,
}

impl ByWidth {
    fn with(mut self, width: u32, words: Vec<RecognizedWord>) -> Self {
        self.pages.insert(width, Ok(words));
        self
    }

    fn failing(mut self, width: u32) -> Self {
        self.pages
            .insert(width, Err(EngineError::Failed("engine crashed".into())));
        self
    }
}

impl Recognizer for ByWidth {
    fn recognize(
        &self,
        image: &RgbImage,
        _language: &str,
        _confidence_floor: f32,
    ) -> Result<Vec<RecognizedWord>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(&image.width())
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Serves fixed pages for a `.pdf` path.
struct FakePdf(Vec<RgbImage>);

impl Rasterizer for FakePdf {
    fn page_count(&self, _path: &Path, _format: SourceFormat) -> Result<usize, EngineError> {
        Ok(self.0.len())
    }

    fn rasterize(
        &self,
        _path: &Path,
        _format: SourceFormat,
        _dpi: u32,
    ) -> Result<Vec<RgbImage>, EngineError> {
        Ok(self.0.clone())
    }
}

/// Keeps the pages it was asked to assemble.
#[derive(Default)]
struct Capture(Mutex<Vec<RgbImage>>);

impl Recomposer for Capture {
    fn assemble(
        &self,
        pages: &[&RgbImage],
        _dpi: u32,
        format: OutputFormat,
    ) -> Result<Vec<u8>, EngineError> {
        let mut kept = self.0.lock().unwrap();
        kept.clear();
        kept.extend(pages.iter().map(|p| (*p).clone()));
        Ok(format!("{format:?}:{}", pages.len()).into_bytes())
    }
}

fn write_png(dir: &Path, name: &str, img: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    img.save_with_format(&path, ImageFormat::Png).unwrap();
    path
}

fn write_fake_pdf(dir: &Path) -> PathBuf {
    let path = dir.join("doc.pdf");
    std::fs::write(&path, b"%PDF-1.7\n%fake\n").unwrap();
    path
}

fn decode(bytes: &[u8]) -> RgbImage {
    image::load_from_memory(bytes).unwrap().to_rgb8()
}

fn config_with(recognizer: Arc<dyn Recognizer>) -> RedactionConfigBuilder {
    RedactionConfig::builder()
        .recognizer(recognizer)
        .concurrency(4)
}

fn count(img: &RgbImage, color: Rgb<u8>) -> usize {
    img.pixels().filter(|p| **p == color).count()
}

// ── Single image ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn ssn_is_replaced_and_names_are_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let (img, words) = ssn_page();
    let input = write_png(dir.path(), "scan.png", &img);

    let recognizer = Arc::new(ByWidth::default().with(400, words));
    let config = config_with(recognizer)
        .pattern(r"\d{3}-\d{2}-\d{4}")
        .replacement_text("[SSN]")
        .build()
        .unwrap();

    let output = redact(&input, &config).await.unwrap();
    assert_eq!(
        output.output_format,
        OutputFormat::Image(edgequake_redact::ImageKind::Png)
    );
    assert_eq!(output.pages.len(), 1);
    assert_eq!(output.pages[0].status, PageStatus::Redacted);
    assert_eq!(output.pages[0].token_count, 4);
    assert_eq!(output.pages[0].region_count, 1);

    let out = decode(&output.artifact);
    assert_eq!(out.dimensions(), img.dimensions());

    // Nothing of the original number survives.
    assert_eq!(count(&out, RED), 0);
    // The names are pixel-identical.
    assert_eq!(count(&out, BLUE), count(&img, BLUE));
    for y in 0..40 {
        for x in 0..160 {
            assert_eq!(out.get_pixel(x, y), img.get_pixel(x, y), "({x},{y})");
        }
    }
    // Something was drawn in the replaced region.
    let drawn = (168..282)
        .flat_map(|x| (8..32).map(move |y| (x, y)))
        .filter(|&(x, y)| out.get_pixel(x, y)[0] < 128)
        .count();
    assert!(drawn > 0, "replacement text should be visible");
}

#[tokio::test]
async fn no_pattern_replaces_every_token() {
    let dir = tempfile::tempdir().unwrap();
    let (img, words) = ssn_page();
    let input = write_png(dir.path(), "scan.png", &img);

    let config = config_with(Arc::new(ByWidth::default().with(400, words)))
        .build()
        .unwrap();
    let output = redact(&input, &config).await.unwrap();

    assert!(output.pages[0].region_count >= 1);
    let out = decode(&output.artifact);
    assert_eq!(count(&out, RED), 0);
    assert_eq!(count(&out, BLUE), 0);
}

#[tokio::test]
async fn non_matching_page_is_bit_identical() {
    let dir = tempfile::tempdir().unwrap();
    let (img, words) = ssn_page();
    let input = write_png(dir.path(), "scan.png", &img);

    let config = config_with(Arc::new(ByWidth::default().with(400, words)))
        .pattern("^nothing-like-this$")
        .build()
        .unwrap();
    let output = redact(&input, &config).await.unwrap();

    assert_eq!(output.pages[0].status, PageStatus::NoMatches);
    assert_eq!(output.no_match_pages(), vec![1]);
    assert!(output.failed_pages().is_empty());
    assert_eq!(decode(&output.artifact), img);
    assert!(output.summary().contains("No matches"));
}

#[tokio::test]
async fn empty_page_passes_through() {
    let dir = tempfile::tempdir().unwrap();
    let img = RgbImage::from_pixel(120, 80, Rgb([240, 236, 228]));
    let input = write_png(dir.path(), "blank.png", &img);

    let config = config_with(Arc::new(ByWidth::default())).build().unwrap();
    let output = redact(&input, &config).await.unwrap();

    assert_eq!(output.pages[0].token_count, 0);
    assert_eq!(output.pages[0].region_count, 0);
    assert_eq!(output.stats.total_regions, 0);
    assert_eq!(decode(&output.artifact), img);
}

#[tokio::test]
async fn same_input_same_output() {
    let dir = tempfile::tempdir().unwrap();
    let (img, words) = ssn_page();
    let input = write_png(dir.path(), "scan.png", &img);
    let recognizer: Arc<dyn Recognizer> = Arc::new(ByWidth::default().with(400, words));

    for mode in [ReplacementMode::Fixed, ReplacementMode::Synthetic] {
        let config = config_with(Arc::clone(&recognizer))
            .pattern(r"\d")
            .replacement(mode)
            .synthetic_seed(42)
            .build()
            .unwrap();
        let first = redact(&input, &config).await.unwrap();
        let second = redact(&input, &config).await.unwrap();
        assert_eq!(first.artifact, second.artifact, "{mode:?}");
    }
}

#[tokio::test]
async fn long_replacement_is_truncated_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    let words = vec![word("42", 20, 20, 44, 32)];
    let mut img = RgbImage::from_pixel(200, 60, WHITE);
    paint(&mut img, &words[0], RED);
    let input = write_png(dir.path(), "small.png", &img);

    let config = config_with(Arc::new(ByWidth::default().with(200, words)))
        .replacement_text("THIS REPLACEMENT IS FAR TOO LONG TO FIT")
        .min_font_px(8.0)
        .build()
        .unwrap();
    let output = redact(&input, &config).await.unwrap();

    assert_eq!(output.stats.replacement_overflows, 1);
    assert!(output
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::ReplacementOverflow { page: 1, .. })));

    // The overflow stays inside the region (box plus the default margin).
    let out = decode(&output.artifact);
    assert_eq!(count(&out, RED), 0);
    for (x, y, p) in out.enumerate_pixels() {
        let inside = (18..46).contains(&x) && (18..34).contains(&y);
        if !inside {
            assert_eq!(*p, WHITE, "({x},{y}) changed outside the region");
        }
    }
}

#[tokio::test]
async fn bytes_in_memory_are_redacted() {
    let (img, words) = ssn_page();
    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, ImageFormat::Png).unwrap();

    let config = config_with(Arc::new(ByWidth::default().with(400, words)))
        .pattern(r"\d")
        .build()
        .unwrap();
    let output = redact_from_bytes(png.get_ref(), &config).await.unwrap();
    assert_eq!(count(&decode(&output.artifact), RED), 0);
}

// ── Colour handling ──────────────────────────────────────────────────────────

#[tokio::test]
async fn opaque_rgba_image_is_redacted() {
    let dir = tempfile::tempdir().unwrap();
    let (img, words) = ssn_page();
    let input = dir.path().join("scan.png");
    DynamicImage::ImageRgb8(img.clone())
        .to_rgba8()
        .save_with_format(&input, ImageFormat::Png)
        .unwrap();

    let config = config_with(Arc::new(ByWidth::default().with(400, words)))
        .pattern(r"\d{3}-\d{2}-\d{4}")
        .build()
        .unwrap();
    let output = redact(&input, &config).await.unwrap();

    let out = decode(&output.artifact);
    assert_eq!(count(&out, RED), 0);
    assert_eq!(count(&out, BLUE), count(&img, BLUE));
}

#[tokio::test]
async fn transparent_image_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut img = RgbaImage::from_pixel(64, 32, Rgba([255, 255, 255, 255]));
    img.put_pixel(5, 5, Rgba([0, 0, 0, 0]));
    let input = dir.path().join("overlay.png");
    img.save_with_format(&input, ImageFormat::Png).unwrap();
    let recognizer = Arc::new(ByWidth::default());

    let config = config_with(recognizer.clone()).build().unwrap();
    let err = redact(&input, &config).await.unwrap_err();

    assert!(matches!(err, RedactError::Rasterization { .. }), "{err}");
    assert!(err.is_collaborator_error());
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sixteen_bit_image_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let img = ImageBuffer::<Rgb<u16>, Vec<u16>>::from_pixel(40, 20, Rgb([1000, 2000, 3000]));
    let input = dir.path().join("deep.png");
    img.save_with_format(&input, ImageFormat::Png).unwrap();
    let output_path = dir.path().join("deep.redacted.png");

    let config = config_with(Arc::new(ByWidth::default())).build().unwrap();
    let err = redact_to_file(&input, &output_path, &config)
        .await
        .unwrap_err();

    assert!(matches!(err, RedactError::Rasterization { .. }), "{err}");
    assert!(!output_path.exists());
}

// ── Multi-page documents ─────────────────────────────────────────────────────

/// Three pages, told apart by width, each with one red word.
fn three_pages() -> (Vec<RgbImage>, ByWidth) {
    let mut pages = Vec::new();
    let mut recognizer = ByWidth::default();
    for width in [300, 301, 302] {
        let w = word("555-12-3456", 40, 20, 140, 40);
        let mut img = RgbImage::from_pixel(width, 60, WHITE);
        paint(&mut img, &w, RED);
        pages.push(img);
        recognizer = recognizer.with(width, vec![w]);
    }
    (pages, recognizer)
}

#[tokio::test]
async fn failed_page_is_emitted_unredacted_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fake_pdf(dir.path());
    let (pages, recognizer) = three_pages();
    let recomposer = Arc::new(Capture::default());

    let config = config_with(Arc::new(recognizer.failing(301)))
        .rasterizer(Arc::new(FakePdf(pages.clone())))
        .recomposer(recomposer.clone())
        .pattern(r"\d{3}-\d{2}-\d{4}")
        .build()
        .unwrap();
    let output = redact(&input, &config).await.unwrap();

    assert_eq!(output.source_format, SourceFormat::Pdf);
    assert_eq!(output.output_format, OutputFormat::Pdf);
    assert_eq!(output.failed_pages(), vec![2]);
    assert_eq!(output.stats.failed_pages, 1);
    assert_eq!(output.stats.redacted_pages, 2);
    assert!(output.pages[1].error.is_some());
    assert!(output.summary().contains("RECOGNITION FAILED"));

    let assembled = recomposer.0.lock().unwrap();
    let widths: Vec<u32> = assembled.iter().map(|p| p.width()).collect();
    assert_eq!(widths, vec![300, 301, 302]);
    assert_eq!(assembled[1], pages[1]);
    assert_eq!(count(&assembled[0], RED), 0);
    assert_eq!(count(&assembled[2], RED), 0);

    assert!(matches!(
        output.into_result(),
        Err(RedactError::PartialFailure {
            failed: 1,
            total: 3
        })
    ));
}

#[tokio::test]
async fn strict_mode_fails_without_assembling() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fake_pdf(dir.path());
    let (pages, recognizer) = three_pages();
    let recomposer = Arc::new(Capture::default());

    let config = config_with(Arc::new(recognizer.failing(301)))
        .rasterizer(Arc::new(FakePdf(pages)))
        .recomposer(recomposer.clone())
        .strict(true)
        .build()
        .unwrap();
    let err = redact(&input, &config).await.unwrap_err();

    assert!(matches!(
        err,
        RedactError::PartialFailure {
            failed: 1,
            total: 3
        }
    ));
    assert!(recomposer.0.lock().unwrap().is_empty());
}

#[derive(Default)]
struct Recording {
    started: AtomicUsize,
    run_total: AtomicUsize,
    pages_started: AtomicUsize,
    regions: AtomicUsize,
    errors: Mutex<Vec<usize>>,
    success: AtomicUsize,
}

impl RedactionProgressCallback for Recording {
    fn on_run_start(&self, total_pages: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.run_total.store(total_pages, Ordering::SeqCst);
    }

    fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
        self.pages_started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_page_complete(&self, _page_num: usize, _total_pages: usize, regions: usize) {
        self.regions.fetch_add(regions, Ordering::SeqCst);
    }

    fn on_page_error(&self, page_num: usize, _total_pages: usize, _error: &str) {
        self.errors.lock().unwrap().push(page_num);
    }

    fn on_run_complete(&self, _total_pages: usize, success_count: usize) {
        self.success.store(success_count, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_events_cover_every_page() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fake_pdf(dir.path());
    let (pages, recognizer) = three_pages();
    let events = Arc::new(Recording::default());

    let config = config_with(Arc::new(recognizer.failing(302)))
        .rasterizer(Arc::new(FakePdf(pages)))
        .recomposer(Arc::new(Capture::default()))
        .pattern(r"\d")
        .progress_callback(events.clone())
        .build()
        .unwrap();
    redact(&input, &config).await.unwrap();

    assert_eq!(events.started.load(Ordering::SeqCst), 1);
    assert_eq!(events.run_total.load(Ordering::SeqCst), 3);
    assert_eq!(events.pages_started.load(Ordering::SeqCst), 3);
    assert_eq!(events.regions.load(Ordering::SeqCst), 2);
    assert_eq!(*events.errors.lock().unwrap(), vec![3]);
    assert_eq!(events.success.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn single_worker_matches_many_workers() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fake_pdf(dir.path());
    let (pages, _) = three_pages();

    let mut assembled = Vec::new();
    for concurrency in [1, 3] {
        let (_, recognizer) = three_pages();
        let recomposer = Arc::new(Capture::default());
        let config = config_with(Arc::new(recognizer))
            .rasterizer(Arc::new(FakePdf(pages.clone())))
            .recomposer(recomposer.clone())
            .concurrency(concurrency)
            .build()
            .unwrap();
        redact(&input, &config).await.unwrap();
        let kept = recomposer.0.lock().unwrap().clone();
        assembled.push(kept);
    }
    assert_eq!(assembled[0], assembled[1]);
}

#[tokio::test]
async fn inspect_counts_pages_without_recognition() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fake_pdf(dir.path());
    let (pages, recognizer) = three_pages();
    let recognizer = Arc::new(recognizer);

    let config = config_with(recognizer.clone())
        .rasterizer(Arc::new(FakePdf(pages)))
        .build()
        .unwrap();
    let info = inspect(&input, &config).await.unwrap();

    assert_eq!(info.source_format, SourceFormat::Pdf);
    assert_eq!(info.page_count, 3);
    assert_eq!(info.file_size, std::fs::metadata(&input).unwrap().len());
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
}

// ── Cancellation and output files ────────────────────────────────────────────

/// Cancels the run from inside recognition.
struct CancelOnRecognize(CancellationFlag);

impl Recognizer for CancelOnRecognize {
    fn recognize(
        &self,
        _image: &RgbImage,
        _language: &str,
        _confidence_floor: f32,
    ) -> Result<Vec<RecognizedWord>, EngineError> {
        self.0.cancel();
        Ok(vec![word("secret", 2, 2, 20, 10)])
    }
}

#[tokio::test]
async fn cancelled_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (img, _) = ssn_page();
    let input = write_png(dir.path(), "scan.png", &img);
    let output_path = dir.path().join("out.png");

    let flag = CancellationFlag::new();
    let config = RedactionConfig::builder()
        .recognizer(Arc::new(CancelOnRecognize(flag.clone())))
        .cancellation(flag)
        .build()
        .unwrap();
    let err = redact_to_file(&input, &output_path, &config)
        .await
        .unwrap_err();

    assert!(matches!(err, RedactError::Cancelled));
    assert!(!output_path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn cancelled_before_start_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (img, words) = ssn_page();
    let input = write_png(dir.path(), "scan.png", &img);
    let recognizer = Arc::new(ByWidth::default().with(400, words));

    let flag = CancellationFlag::new();
    flag.cancel();
    let config = config_with(recognizer.clone())
        .cancellation(flag)
        .build()
        .unwrap();
    let err = redact_to_file(&input, &input, &config).await.unwrap_err();

    assert!(matches!(err, RedactError::Cancelled));
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(image::open(&input).unwrap().to_rgb8(), img);
}

#[tokio::test]
async fn redact_in_place_replaces_the_input() {
    let dir = tempfile::tempdir().unwrap();
    let (img, words) = ssn_page();
    let input = write_png(dir.path(), "scan.png", &img);

    let config = config_with(Arc::new(ByWidth::default().with(400, words)))
        .pattern(r"\d{3}-\d{2}-\d{4}")
        .build()
        .unwrap();
    let output = redact_to_file(&input, &input, &config).await.unwrap();

    let on_disk = std::fs::read(&input).unwrap();
    assert_eq!(on_disk, output.artifact);
    assert_eq!(count(&decode(&on_disk), RED), 0);
    // No temp files left behind.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn output_extension_must_match_the_output_format() {
    let dir = tempfile::tempdir().unwrap();
    let (img, words) = ssn_page();
    let input = write_png(dir.path(), "scan.png", &img);
    let recognizer = Arc::new(ByWidth::default().with(400, words));

    let config = config_with(recognizer.clone()).build().unwrap();
    let err = redact_to_file(&input, dir.path().join("scan.pdf"), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, RedactError::InvalidParameter(_)));
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_input_is_reported() {
    let config = config_with(Arc::new(ByWidth::default())).build().unwrap();
    let err = redact("/nonexistent/scan.png", &config).await.unwrap_err();
    assert!(matches!(err, RedactError::FileNotFound { .. }));
    assert!(err.is_input_error());
}
