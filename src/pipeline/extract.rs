//! Token extraction: one recognition call per page, then normalisation.
//!
//! The recogniser is called once per page, never per region, so it keeps
//! whole-page context. Its raw words are then cleaned up here:
//!
//! 1. empty strings and boxes that fall off the page are dropped;
//! 2. boxes are snapped outward to whole pixels and clamped to the page;
//! 3. every token gets a [`CharClass`] and a low-confidence flag;
//! 4. tokens are put in reading order.
//!
//! ## Reading order
//!
//! Baselines jitter by a few pixels between words on one printed line, so a
//! plain `(top, left)` sort interleaves neighbouring words. Instead tokens
//! are grouped into line bands first: sorted by vertical centre, a token
//! joins the current band while its centre is within half a band height of
//! the band's running mean centre, where band height is the median token
//! height × `line_band_factor`. Within a band tokens sort by left edge.

use crate::config::RedactionConfig;
use crate::engines::{EngineError, RecognizedWord, Recognizer};
use crate::error::PageError;
use crate::model::{BoundingBox, CharClass, Page, Token};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Run recognition on `page` and return its tokens in reading order.
///
/// The recogniser runs on a blocking thread under the configured timeout. A
/// page that times out is a page failure; the stray blocking call finishes
/// in the background and its result is discarded.
pub async fn extract_tokens(
    page: &Page,
    recognizer: Arc<dyn Recognizer>,
    config: &RedactionConfig,
) -> Result<Vec<Token>, PageError> {
    let page_num = page.number();
    if page.raster.is_empty() {
        return Err(PageError::Recognition {
            page: page_num,
            detail: "raster is empty".into(),
        });
    }

    let image = Arc::clone(&page.raster.image);
    let language = config.language.clone();
    let floor = config.confidence_floor;
    let task =
        tokio::task::spawn_blocking(move || recognizer.recognize(&image, &language, floor));

    let secs = config.recognition_timeout_secs;
    let words = match tokio::time::timeout(Duration::from_secs(secs), task).await {
        Err(_) => {
            return Err(PageError::Timeout {
                page: page_num,
                secs,
            })
        }
        Ok(Err(join)) => {
            return Err(PageError::Recognition {
                page: page_num,
                detail: format!("recogniser panicked: {join}"),
            })
        }
        Ok(Ok(Err(EngineError::Unavailable(detail) | EngineError::Failed(detail)))) => {
            return Err(PageError::Recognition {
                page: page_num,
                detail,
            })
        }
        Ok(Ok(Ok(words))) => words,
    };

    let raw = words.len();
    let tokens = normalize_words(
        words,
        page.raster.width(),
        page.raster.height(),
        config.confidence_floor,
        config.line_band_factor,
    );
    if tokens.len() < raw {
        warn!(
            "Page {}: dropped {} of {} recognised words (empty or off-page)",
            page_num,
            raw - tokens.len(),
            raw
        );
    }
    debug!(
        "Page {}: {} tokens on {} lines",
        page_num,
        tokens.len(),
        tokens.last().map(|t| t.line + 1).unwrap_or(0)
    );
    Ok(tokens)
}

/// Turn raw recogniser words into validated tokens in reading order.
pub fn normalize_words(
    words: Vec<RecognizedWord>,
    width: u32,
    height: u32,
    confidence_floor: f32,
    line_band_factor: f32,
) -> Vec<Token> {
    let mut tokens: Vec<Token> = words
        .into_iter()
        .filter_map(|w| {
            let text = w.text.trim();
            if text.is_empty() {
                return None;
            }
            let bbox = BoundingBox::from_edges(w.left, w.top, w.right, w.bottom, width, height)?;
            let confidence = if w.confidence.is_nan() {
                0.0
            } else {
                w.confidence.clamp(0.0, 1.0)
            };
            Some(Token {
                text: text.to_string(),
                bbox,
                confidence,
                class: CharClass::of(text),
                low_confidence: confidence < confidence_floor,
                line: 0,
            })
        })
        .collect();

    order_tokens(&mut tokens, line_band_factor);
    tokens
}

/// Assign line bands and sort into reading order, in place.
pub fn order_tokens(tokens: &mut [Token], line_band_factor: f32) {
    if tokens.is_empty() {
        return;
    }

    let heights: Vec<f32> = tokens.iter().map(|t| t.bbox.height() as f32).collect();
    let band_height = (median(heights).unwrap_or(1.0) * line_band_factor).max(1.0);
    let half_band = band_height / 2.0;

    tokens.sort_by(|a, b| a.bbox.center_y().total_cmp(&b.bbox.center_y()));

    let mut line = 0usize;
    let mut band_sum = tokens[0].bbox.center_y();
    let mut band_len = 1usize;
    tokens[0].line = 0;
    for token in tokens.iter_mut().skip(1) {
        let center = token.bbox.center_y();
        let band_mean = band_sum / band_len as f32;
        if center - band_mean > half_band {
            line += 1;
            band_sum = center;
            band_len = 1;
        } else {
            band_sum += center;
            band_len += 1;
        }
        token.line = line;
    }

    tokens.sort_by(|a, b| a.line.cmp(&b.line).then(a.bbox.left.cmp(&b.bbox.left)));
}

/// Median of a list of values; the mean of the two middle values for even
/// lengths.
pub(crate) fn median(mut values: Vec<f32>) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}
