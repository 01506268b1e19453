//! CLI binary for edgequake-redact.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RedactionConfig`, writes the artifact and prints the run summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_redact::{
    inspect, redact_to_file, CancellationFlag, ProgressCallback, RedactError, RedactionConfig,
    RedactionOutput, RedactionProgressCallback, ReplacementMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── Exit codes ───────────────────────────────────────────────────────────────

const EXIT_INPUT: u8 = 2;
const EXIT_COLLABORATOR: u8 = 3;
const EXIT_PAGES_FAILED: u8 = 4;
const EXIT_CANCELLED: u8 = 130;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Live progress bar plus one log line per page. Pages finish out of
/// order, so start times are keyed by page number.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` reports the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Rendering");
        bar.set_message("Opening input…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Redacting");
        self.bar.reset_eta();
    }

    fn elapsed(&self, page_num: usize) -> String {
        let elapsed_ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0))
    }
}

impl RedactionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, regions: usize) {
        let mark = if regions == 0 { yellow("○") } else { green("✓") };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<12}  {}",
            mark,
            page_num,
            total,
            dim(&format!("{regions:>4} regions")),
            self.elapsed(page_num),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            self.elapsed(page_num),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _total_pages: usize, _success_count: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Replace every recognised word with REDACTED, in place
  ocr-redact scan.png

  # Hide social security numbers, write a new file
  ocr-redact -p '\d{3}-\d{2}-\d{4}' -r '[SSN]' scan.png -o scan.redacted.png

  # Realistic look-alike names in a French document
  ocr-redact -p '^[A-Z][a-z]+$' --fake --fake-locale fr_FR lettre.pdf -o lettre.pdf

  # Fail instead of emitting unredacted pages
  ocr-redact --strict -p '\d{16}' statement.pdf -o statement.redacted.pdf

  # Machine-readable report
  ocr-redact --json -p '@' contacts.tiff -o contacts.out.tiff > report.json

EXIT STATUS:
  0    every page processed
  2    bad arguments or unreadable input
  3    rasteriser, OCR engine, assembly or output write failed
  4    one or more pages failed recognition (emitted unredacted unless --strict)
  130  cancelled (Ctrl-C); nothing was written

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium (PDF input only)
  OCRS_MODEL_DIR    Directory with text-detection.rten and text-recognition.rten
  RUST_LOG          Log filter, overrides -v / -q

SETUP:
  OCR models are read from ~/.cache/ocrs. Run `ocrs` (cargo install ocrs-cli)
  once to download them, or pass --ocr-models DIR.
"#;

/// Find OCR-recognised text in images and PDFs and replace it.
#[derive(Parser, Debug)]
#[command(
    name = "ocr-redact",
    version,
    about = "Find OCR-recognised text in images and PDFs and replace it with sanitised content",
    long_about = "Rasterise an image or PDF, recognise its words with OCR, select the ones \
matching a regular expression (or all of them), paint over each region with the surrounding \
background colour and draw a replacement in its place. The output has the same format as the \
input.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image (png, jpg, tiff, bmp) or PDF file.
    input: PathBuf,

    /// Output path. Defaults to replacing the input in place.
    #[arg(short, long, env = "OCR_REDACT_OUTPUT")]
    output: Option<PathBuf>,

    /// Replacement text, also the fallback when synthetic content is unavailable.
    #[arg(
        short = 'r',
        long = "replacement",
        env = "OCR_REDACT_REPLACEMENT",
        default_value = "REDACTED"
    )]
    replacement: String,

    /// OCR language hint (e.g. eng, eng+fra).
    #[arg(short = 'l', long, env = "OCR_REDACT_LANG", default_value = "eng")]
    lang: String,

    /// Rasterisation DPI for PDF pages (50–1200).
    #[arg(short = 'd', long, env = "OCR_REDACT_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(50..=1200))]
    dpi: u32,

    /// Regular expression selecting tokens to replace. Omit to replace every token.
    #[arg(short = 'p', long, env = "OCR_REDACT_PATTERN")]
    pattern: Option<String>,

    /// Replace with shape-preserving synthetic content instead of the fixed text.
    #[arg(short = 'f', long = "fake")]
    fake: bool,

    /// Locale for synthetic content.
    #[arg(long, env = "OCR_REDACT_FAKE_LOCALE", default_value = "en_US")]
    fake_locale: String,

    /// Words below this OCR confidence (0.0–1.0) are flagged low-confidence.
    #[arg(long, default_value_t = 0.0)]
    confidence_floor: f32,

    /// Never replace low-confidence words.
    #[arg(long)]
    skip_low_confidence: bool,

    /// Merge gap, as a multiple of the line's median character width.
    #[arg(long, default_value_t = 2.0)]
    merge_gap: f32,

    /// Pixels added around each replaced region.
    #[arg(long, default_value_t = 2)]
    margin: u32,

    /// Smallest font size tried before truncating a replacement.
    #[arg(long, default_value_t = 8.0)]
    min_font: f32,

    /// Pages processed concurrently. Defaults to the number of CPUs.
    #[arg(short, long, env = "OCR_REDACT_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Per-page recognition timeout in seconds.
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Fail with no output if any page fails recognition.
    #[arg(long, env = "OCR_REDACT_STRICT")]
    strict: bool,

    /// Seed for synthetic content.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// TTF/OTF font for replacement text. Defaults to the embedded DejaVu Sans Mono.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Directory holding the OCR model files.
    #[arg(long, env = "OCRS_MODEL_DIR")]
    ocr_models: Option<PathBuf>,

    /// Print format and page count only, no OCR.
    #[arg(long)]
    inspect_only: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR_REDACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR_REDACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR_REDACT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(code) => code,
        Err(err) => {
            let code = exit_code_for(&err);
            if code != EXIT_CANCELLED || !cli.quiet {
                eprintln!("{} {:#}", red("error:"), err);
            }
            ExitCode::from(code)
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<ExitCode> {
    let cancellation = CancellationFlag::new();
    {
        let flag = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                flag.cancel();
            }
        });
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let config = RedactionConfig::default();
        let info = inspect(&cli.input, &config)
            .await
            .context("Failed to inspect input")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialise info")?
            );
        } else {
            println!("File:    {}", cli.input.display());
            println!("Format:  {:?}", info.source_format);
            println!("Pages:   {}", info.page_count);
            println!("Size:    {} bytes", info.file_size);
        }
        return Ok(ExitCode::SUCCESS);
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn RedactionProgressCallback>)
    } else {
        None
    };

    let config = build_config(cli, progress_cb, cancellation)?;
    let output_path = cli.output.clone().unwrap_or_else(|| cli.input.clone());

    // ── Run ──────────────────────────────────────────────────────────────
    let output = redact_to_file(&cli.input, &output_path, &config).await?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialise report")?
        );
    }
    if !cli.quiet {
        print_summary(&output, &output_path);
    }

    if output.stats.failed_pages > 0 {
        Ok(ExitCode::from(EXIT_PAGES_FAILED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Map CLI args to `RedactionConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancellation: CancellationFlag,
) -> Result<RedactionConfig> {
    let mut builder = RedactionConfig::builder()
        .dpi(cli.dpi)
        .language(cli.lang.clone())
        .confidence_floor(cli.confidence_floor)
        .match_low_confidence(!cli.skip_low_confidence)
        .replacement(if cli.fake {
            ReplacementMode::Synthetic
        } else {
            ReplacementMode::Fixed
        })
        .replacement_text(cli.replacement.clone())
        .locale(cli.fake_locale.clone())
        .merge_gap_factor(cli.merge_gap)
        .box_margin(cli.margin)
        .min_font_px(cli.min_font)
        .recognition_timeout_secs(cli.timeout)
        .strict(cli.strict)
        .synthetic_seed(cli.seed)
        .cancellation(cancellation);

    if let Some(ref pattern) = cli.pattern {
        builder = builder.pattern(pattern.clone());
    }
    if let Some(n) = cli.concurrency {
        builder = builder.concurrency(n);
    }
    if let Some(ref font) = cli.font {
        builder = builder.font_path(font.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    if let Some(ref dir) = cli.ocr_models {
        builder = with_models(builder, dir)?;
    }

    Ok(builder.build()?)
}

#[cfg(feature = "ocr")]
fn with_models(
    builder: edgequake_redact::RedactionConfigBuilder,
    dir: &std::path::Path,
) -> Result<edgequake_redact::RedactionConfigBuilder> {
    use edgequake_redact::engines::ocr::{OcrModels, OcrsRecognizer};

    let recognizer = OcrsRecognizer::new(&OcrModels::from_dir(dir)).map_err(|e| {
        RedactError::EngineUnavailable {
            engine: "OCR engine".into(),
            detail: e.to_string(),
        }
    })?;
    Ok(builder.recognizer(Arc::new(recognizer)))
}

#[cfg(not(feature = "ocr"))]
fn with_models(
    _builder: edgequake_redact::RedactionConfigBuilder,
    _dir: &std::path::Path,
) -> Result<edgequake_redact::RedactionConfigBuilder> {
    Err(RedactError::InvalidParameter(
        "--ocr-models needs a build with the `ocr` feature".into(),
    )
    .into())
}

fn print_summary(output: &RedactionOutput, path: &std::path::Path) {
    let s = &output.stats;
    let mark = if s.failed_pages == 0 {
        green("✔")
    } else {
        red("✘")
    };
    eprintln!(
        "{}  {}/{} pages redacted  {}ms  →  {}",
        mark,
        s.redacted_pages,
        s.total_pages,
        s.total_duration_ms,
        bold(&path.display().to_string()),
    );
    for line in output.summary().lines().skip(1) {
        let line = if line.starts_with("RECOGNITION FAILED") {
            red(line)
        } else {
            yellow(line)
        };
        eprintln!("   {line}");
    }
    eprintln!(
        "   {}",
        dim(&format!(
            "{} tokens, {} regions  (render {}ms, pages {}ms, assembly {}ms)",
            s.total_tokens,
            s.total_regions,
            s.render_duration_ms,
            s.process_duration_ms,
            s.assembly_duration_ms
        ))
    );
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<RedactError>() {
        Some(RedactError::Cancelled) => EXIT_CANCELLED,
        Some(RedactError::PartialFailure { .. }) => EXIT_PAGES_FAILED,
        Some(e) if e.is_input_error() => EXIT_INPUT,
        Some(e) if e.is_collaborator_error() => EXIT_COLLABORATOR,
        // anyhow-only failures are local CLI problems (serialisation)
        _ => 1,
    }
}
