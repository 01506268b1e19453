//! Configuration types for OCR redaction runs.
//!
//! All run behaviour is controlled through [`RedactionConfig`], built via its
//! [`RedactionConfigBuilder`]. The config is immutable once built and is
//! cloned into every page worker, so no stage reads global state.
//!
//! `build()` validates every field and fails with
//! [`RedactError::InvalidParameter`] before any file is opened.

use crate::cancel::CancellationFlag;
use crate::engines::{Rasterizer, Recognizer, Recomposer, SyntheticGenerator};
use crate::error::RedactError;
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Lowest accepted rasterisation DPI. Below this OCR accuracy collapses.
pub const MIN_DPI: u32 = 50;
/// Highest accepted rasterisation DPI. Above this an A4 page exceeds ~130 MP.
pub const MAX_DPI: u32 = 1200;

static RE_LOCALE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{2,3}_[A-Z]{2}$").unwrap());

static RE_LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_]+(\+[A-Za-z_]+)*$").unwrap());

/// How replacement text is produced for each region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementMode {
    /// Every region gets `replacement_text` verbatim. (default)
    #[default]
    Fixed,
    /// Regions get shape-preserving content from the synthetic generator,
    /// in `locale`. Falls back to `replacement_text` per region.
    Synthetic,
}

/// Configuration for a redaction run.
///
/// Built via [`RedactionConfig::builder()`] or [`RedactionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_redact::{RedactionConfig, ReplacementMode};
///
/// let config = RedactionConfig::builder()
///     .dpi(300)
///     .pattern(r"\d{3}-\d{2}-\d{4}")
///     .replacement_text("[SSN]")
///     .build()
///     .unwrap();
/// assert_eq!(config.replacement, ReplacementMode::Fixed);
/// ```
#[derive(Clone)]
pub struct RedactionConfig {
    /// Rasterisation DPI for PDF pages. Range: 50–1200. Default: 200.
    pub dpi: u32,

    /// Recognition language hint (`eng`, `fra`, `deu+eng`). Default: `eng`.
    pub language: String,

    /// Tokens below this confidence are flagged low-confidence. Default: 0.
    pub confidence_floor: f32,

    /// Whether low-confidence tokens may still be selected. Default: true.
    ///
    /// Leaving this on errs towards over-redaction: a half-legible name is
    /// still a name.
    pub match_low_confidence: bool,

    /// Regular expression selecting tokens. `None` selects every token.
    pub pattern: Option<String>,

    /// Fixed literal or synthetic content. Default: [`ReplacementMode::Fixed`].
    pub replacement: ReplacementMode,

    /// Literal used in fixed mode and as the synthetic fallback.
    /// Default: `REDACTED`.
    pub replacement_text: String,

    /// Locale for synthetic content (`en_US`, `fr_FR`). Default: `en_US`.
    pub locale: String,

    /// Merge neighbours whose horizontal gap is below this many median
    /// character widths of their line. Default: 2.0.
    pub merge_gap_factor: f32,

    /// When set, neighbours only merge if `min(h) / max(h)` reaches this
    /// ratio. Default: None (height is ignored).
    pub merge_height_ratio: Option<f32>,

    /// Reading-order line band height as a multiple of the median token
    /// height. Default: 1.5.
    pub line_band_factor: f32,

    /// Pixels added around every region to cover anti-aliased glyph edges.
    /// Default: 2.
    pub box_margin: u32,

    /// Smallest font size (px) the compositor will render. Default: 8.
    pub min_font_px: f32,

    /// Width (px) of the ring sampled outside a region to pick the fill
    /// colour. Default: 3.
    pub fill_sample_width: u32,

    /// Channel standard deviation of the sampled ring above which a
    /// low-confidence-fill diagnostic is raised. Default: 40.
    pub fill_variance_threshold: f32,

    /// Number of pages processed at once. Default: available CPUs.
    pub concurrency: usize,

    /// Per-page recognition timeout in seconds. Default: 120.
    pub recognition_timeout_secs: u64,

    /// Abort without output if any page fails recognition. Default: false.
    pub strict: bool,

    /// Seed for synthetic content; equal seeds give equal output. Default: 0.
    pub synthetic_seed: u64,

    /// TrueType/OpenType font for replacement text. Default: embedded
    /// DejaVu Sans Mono.
    pub font_path: Option<PathBuf>,

    /// Injected collaborators. `None` resolves to the built-in engine.
    pub rasterizer: Option<Arc<dyn Rasterizer>>,
    pub recognizer: Option<Arc<dyn Recognizer>>,
    pub generator: Option<Arc<dyn SyntheticGenerator>>,
    pub recomposer: Option<Arc<dyn Recomposer>>,

    /// Optional progress callback for per-page events.
    pub progress_callback: Option<ProgressCallback>,

    /// Cooperative cancellation handle shared with every page worker.
    pub cancellation: CancellationFlag,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            language: "eng".to_string(),
            confidence_floor: 0.0,
            match_low_confidence: true,
            pattern: None,
            replacement: ReplacementMode::default(),
            replacement_text: "REDACTED".to_string(),
            locale: "en_US".to_string(),
            merge_gap_factor: 2.0,
            merge_height_ratio: None,
            line_band_factor: 1.5,
            box_margin: 2,
            min_font_px: 8.0,
            fill_sample_width: 3,
            fill_variance_threshold: 40.0,
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            recognition_timeout_secs: 120,
            strict: false,
            synthetic_seed: 0,
            font_path: None,
            rasterizer: None,
            recognizer: None,
            generator: None,
            recomposer: None,
            progress_callback: None,
            cancellation: CancellationFlag::new(),
        }
    }
}

impl fmt::Debug for RedactionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedactionConfig")
            .field("dpi", &self.dpi)
            .field("language", &self.language)
            .field("confidence_floor", &self.confidence_floor)
            .field("match_low_confidence", &self.match_low_confidence)
            .field("pattern", &self.pattern)
            .field("replacement", &self.replacement)
            .field("replacement_text", &self.replacement_text)
            .field("locale", &self.locale)
            .field("merge_gap_factor", &self.merge_gap_factor)
            .field("merge_height_ratio", &self.merge_height_ratio)
            .field("line_band_factor", &self.line_band_factor)
            .field("box_margin", &self.box_margin)
            .field("min_font_px", &self.min_font_px)
            .field("fill_sample_width", &self.fill_sample_width)
            .field("fill_variance_threshold", &self.fill_variance_threshold)
            .field("concurrency", &self.concurrency)
            .field("recognition_timeout_secs", &self.recognition_timeout_secs)
            .field("strict", &self.strict)
            .field("synthetic_seed", &self.synthetic_seed)
            .field("font_path", &self.font_path)
            .field("rasterizer", &self.rasterizer.as_ref().map(|_| "<dyn>"))
            .field("recognizer", &self.recognizer.as_ref().map(|_| "<dyn>"))
            .field("generator", &self.generator.as_ref().map(|_| "<dyn>"))
            .field("recomposer", &self.recomposer.as_ref().map(|_| "<dyn>"))
            .field("progress_callback", &self.progress_callback.is_some())
            .field("cancellation", &self.cancellation)
            .finish()
    }
}

impl RedactionConfig {
    /// Create a new builder for `RedactionConfig`.
    pub fn builder() -> RedactionConfigBuilder {
        RedactionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Compile the selection pattern, if any.
    pub fn compiled_pattern(&self) -> Result<Option<Regex>, RedactError> {
        self.pattern
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    RedactError::InvalidParameter(format!("pattern does not compile: {e}"))
                })
            })
            .transpose()
    }

    /// Check every field. Called by [`RedactionConfigBuilder::build`] and
    /// again at the start of every run, since fields are public.
    pub fn validate(&self) -> Result<(), RedactError> {
        let invalid = |msg: String| Err(RedactError::InvalidParameter(msg));

        if !(MIN_DPI..=MAX_DPI).contains(&self.dpi) {
            return invalid(format!("DPI must be {MIN_DPI}–{MAX_DPI}, got {}", self.dpi));
        }
        if !RE_LANGUAGE.is_match(&self.language) {
            return invalid(format!("language hint '{}' is not valid", self.language));
        }
        if !(0.0..=1.0).contains(&self.confidence_floor) {
            return invalid(format!(
                "confidence floor must be 0–1, got {}",
                self.confidence_floor
            ));
        }
        self.compiled_pattern()?;
        if self.replacement_text.trim().is_empty() {
            return invalid("replacement text must not be empty".into());
        }
        if !RE_LOCALE.is_match(&self.locale) {
            return invalid(format!(
                "locale '{}' is not of the form ll_CC (e.g. en_US)",
                self.locale
            ));
        }
        if !(self.merge_gap_factor > 0.0) {
            return invalid(format!(
                "merge gap factor must be > 0, got {}",
                self.merge_gap_factor
            ));
        }
        if let Some(r) = self.merge_height_ratio {
            if !(r > 0.0 && r <= 1.0) {
                return invalid(format!("merge height ratio must be in (0, 1], got {r}"));
            }
        }
        if !(self.line_band_factor > 0.0) {
            return invalid(format!(
                "line band factor must be > 0, got {}",
                self.line_band_factor
            ));
        }
        if !(self.min_font_px >= 1.0) {
            return invalid(format!("minimum font size must be ≥ 1px, got {}", self.min_font_px));
        }
        if self.fill_sample_width == 0 {
            return invalid("fill sample width must be ≥ 1".into());
        }
        if !(self.fill_variance_threshold >= 0.0 && self.fill_variance_threshold.is_finite()) {
            return invalid(format!(
                "fill variance threshold must be a finite value ≥ 0, got {}",
                self.fill_variance_threshold
            ));
        }
        if self.concurrency == 0 {
            return invalid("concurrency must be ≥ 1".into());
        }
        if self.recognition_timeout_secs == 0 {
            return invalid("recognition timeout must be ≥ 1s".into());
        }
        Ok(())
    }
}

/// Builder for [`RedactionConfig`].
///
/// Setters store values as given; range checks happen in [`build`](Self::build)
/// so an out-of-range DPI is reported rather than silently clamped.
#[derive(Debug)]
pub struct RedactionConfigBuilder {
    config: RedactionConfig,
}

impl RedactionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn confidence_floor(mut self, floor: f32) -> Self {
        self.config.confidence_floor = floor;
        self
    }

    pub fn match_low_confidence(mut self, v: bool) -> Self {
        self.config.match_low_confidence = v;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.pattern = Some(pattern.into());
        self
    }

    pub fn replacement(mut self, mode: ReplacementMode) -> Self {
        self.config.replacement = mode;
        self
    }

    pub fn replacement_text(mut self, text: impl Into<String>) -> Self {
        self.config.replacement_text = text.into();
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.config.locale = locale.into();
        self
    }

    pub fn merge_gap_factor(mut self, factor: f32) -> Self {
        self.config.merge_gap_factor = factor;
        self
    }

    pub fn merge_height_ratio(mut self, ratio: f32) -> Self {
        self.config.merge_height_ratio = Some(ratio);
        self
    }

    pub fn line_band_factor(mut self, factor: f32) -> Self {
        self.config.line_band_factor = factor;
        self
    }

    pub fn box_margin(mut self, px: u32) -> Self {
        self.config.box_margin = px;
        self
    }

    pub fn min_font_px(mut self, px: f32) -> Self {
        self.config.min_font_px = px;
        self
    }

    pub fn fill_sample_width(mut self, px: u32) -> Self {
        self.config.fill_sample_width = px;
        self
    }

    pub fn fill_variance_threshold(mut self, threshold: f32) -> Self {
        self.config.fill_variance_threshold = threshold;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn recognition_timeout_secs(mut self, secs: u64) -> Self {
        self.config.recognition_timeout_secs = secs;
        self
    }

    pub fn strict(mut self, v: bool) -> Self {
        self.config.strict = v;
        self
    }

    pub fn synthetic_seed(mut self, seed: u64) -> Self {
        self.config.synthetic_seed = seed;
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn SyntheticGenerator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn recomposer(mut self, recomposer: Arc<dyn Recomposer>) -> Self {
        self.config.recomposer = Some(recomposer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancellation(mut self, flag: CancellationFlag) -> Self {
        self.config.cancellation = flag;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RedactionConfig, RedactError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
