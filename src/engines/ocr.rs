//! Default recogniser on `ocrs`, a pure-Rust OCR engine run through `rten`.
//!
//! # Model setup
//!
//! Two model files are needed at runtime:
//!
//! - `text-detection.rten` locates words on the page;
//! - `text-recognition.rten` reads the characters of each line.
//!
//! Running `ocrs` (from `cargo install ocrs-cli`) once downloads both into
//! `$XDG_CACHE_HOME/ocrs`, usually `~/.cache/ocrs`, which is where
//! [`OcrModels::default`] looks. `OCRS_MODEL_DIR` overrides that.
//!
//! `ocrs` ships Latin-script models only and reports no per-word score, so
//! the language hint is ignored and every word has confidence `1.0`.
//!
//! Build `ocrs` and `rten` with optimisations: debug builds are 10–100×
//! slower.

use super::{EngineError, RecognizedWord, Recognizer};
use image::RgbImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

fn default_model_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("OCRS_MODEL_DIR") {
        PathBuf::from(dir)
    } else if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Where the two model files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrModels {
    pub detection: PathBuf,
    pub recognition: PathBuf,
}

impl Default for OcrModels {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrModels {
    /// Both models under `dir`, with their standard file names.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection: dir.join(DETECTION_MODEL_FILENAME),
            recognition: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    fn load(path: &Path, what: &str) -> Result<Model, EngineError> {
        if !path.exists() {
            return Err(EngineError::Unavailable(format!(
                "{what} model not found at {}; run `ocrs` once to download models \
                 or pass --ocr-models",
                path.display()
            )));
        }
        Model::load_file(path).map_err(|e| {
            EngineError::Unavailable(format!(
                "failed to load {what} model from {}: {e}",
                path.display()
            ))
        })
    }
}

/// [`Recognizer`] backed by `ocrs`. Loading the models is the expensive
/// part, so build one and share it across pages.
pub struct OcrsRecognizer {
    engine: OcrEngine,
}

impl std::fmt::Debug for OcrsRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrsRecognizer").finish_non_exhaustive()
    }
}

impl OcrsRecognizer {
    pub fn new(models: &OcrModels) -> Result<Self, EngineError> {
        info!("Loading OCR models from {}", models.detection.display());
        let detection_model = OcrModels::load(&models.detection, "detection")?;
        let recognition_model = OcrModels::load(&models.recognition, "recognition")?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|e| EngineError::Unavailable(format!("failed to initialise ocrs: {e}")))?;

        Ok(Self { engine })
    }

    /// Models from the default cache directory.
    pub fn with_defaults() -> Result<Self, EngineError> {
        Self::new(&OcrModels::default())
    }
}

impl Recognizer for OcrsRecognizer {
    fn recognize(
        &self,
        image: &RgbImage,
        _language: &str,
        _confidence_floor: f32,
    ) -> Result<Vec<RecognizedWord>, EngineError> {
        let failed = |stage: &str, e: &dyn std::fmt::Display| {
            EngineError::Failed(format!("{stage} failed: {e}"))
        };

        let source = ImageSource::from_bytes(image.as_raw(), image.dimensions())
            .map_err(|e| failed("image conversion", &e))?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|e| failed("preprocessing", &e))?;

        let word_rects = self
            .engine
            .detect_words(&input)
            .map_err(|e| failed("word detection", &e))?;
        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        let lines = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|e| failed("line recognition", &e))?;

        let words: Vec<RecognizedWord> = lines
            .iter()
            .flatten()
            .flat_map(|line| line.words())
            .map(|word| {
                let rect = word.bounding_rect();
                RecognizedWord {
                    text: word.to_string(),
                    left: rect.left() as f32,
                    top: rect.top() as f32,
                    right: rect.right() as f32,
                    bottom: rect.bottom() as f32,
                    confidence: 1.0,
                }
            })
            .collect();

        debug!(
            "ocrs: {} word boxes, {} lines, {} words",
            word_rects.len(),
            line_rects.len(),
            words.len()
        );
        Ok(words)
    }
}
