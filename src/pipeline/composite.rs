//! Region compositor: erase each region and draw its replacement.
//!
//! For every region, in order:
//!
//! 1. **Fill colour.** Pixels in a ring `fill_sample_width` wide just
//!    outside the box are sampled, skipping anything inside any region, and
//!    the per-channel median is taken. If the samples vary a lot (textured
//!    or photographic background) a [`Diagnostic::LowConfidenceFill`] is
//!    recorded. A region with no usable ring falls back to the median of
//!    its own pixels.
//! 2. **Erase.** The whole box is overwritten. Every pixel inside it is
//!    replaced, whatever the replacement text turns out to be.
//! 3. **Draw.** The replacement is rendered centred in black or white,
//!    whichever contrasts with the fill. The font shrinks 1px at a time from
//!    the box height down to `min_font_px`; if the text is still too wide it
//!    is cut and ends with `…`, recorded as
//!    [`Diagnostic::ReplacementOverflow`].
//!
//! Text is drawn on a box-sized canvas that is then copied over the page,
//! so nothing can ever be drawn outside the box.
//!
//! All fill colours are sampled before any region is painted, so the order
//! of regions does not change the colours. Overlapping regions are
//! reported, and later ones paint over earlier ones.

use crate::config::RedactionConfig;
use crate::error::RedactError;
use crate::model::{BoundingBox, MatchRegion};
use crate::output::Diagnostic;
use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::Path;
use tracing::{debug, warn};

/// DejaVu Sans Mono, under the Bitstream Vera licence in `assets/LICENSE-DejaVu`.
static EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");

const ELLIPSIS: char = '…';

/// Load the replacement font: `path` if given, else the embedded DejaVu
/// Sans Mono.
pub fn load_font(path: Option<&Path>) -> Result<FontArc, RedactError> {
    match path {
        None => FontArc::try_from_slice(EMBEDDED_FONT)
            .map_err(|e| RedactError::Internal(format!("embedded font is unreadable: {e}"))),
        Some(p) => {
            let bytes = std::fs::read(p).map_err(|e| {
                RedactError::InvalidParameter(format!("cannot read font '{}': {e}", p.display()))
            })?;
            FontArc::try_from_vec(bytes).map_err(|e| {
                RedactError::InvalidParameter(format!(
                    "'{}' is not a usable font: {e}",
                    p.display()
                ))
            })
        }
    }
}

/// Paints regions onto page rasters. One per run, shared by all workers.
#[derive(Clone)]
pub struct Compositor {
    font: FontArc,
    min_font_px: f32,
    fill_sample_width: u32,
    fill_variance_threshold: f32,
}

/// Text after fitting it into a box.
#[derive(Debug, Clone, PartialEq)]
struct Fitted {
    text: String,
    size: f32,
    width: u32,
    height: u32,
    truncated: bool,
    /// Taller than the box even at the floor size; the canvas cuts it.
    clipped: bool,
}

impl Compositor {
    pub fn new(font: FontArc, config: &RedactionConfig) -> Self {
        Self {
            font,
            min_font_px: config.min_font_px,
            fill_sample_width: config.fill_sample_width,
            fill_variance_threshold: config.fill_variance_threshold,
        }
    }

    /// Erase and redraw every region on `image`, returning the diagnostics.
    pub fn apply(
        &self,
        image: &mut RgbImage,
        regions: &[MatchRegion],
        page_num: usize,
    ) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if regions.is_empty() {
            return diagnostics;
        }

        for (i, a) in regions.iter().enumerate() {
            for (j, b) in regions.iter().enumerate().skip(i + 1) {
                if a.bbox.intersects(&b.bbox) {
                    warn!("Page {}: regions {} and {} overlap", page_num, i, j);
                    diagnostics.push(Diagnostic::RegionOverlapDetected {
                        page: page_num,
                        first: i,
                        second: j,
                    });
                }
            }
        }

        let boxes: Vec<BoundingBox> = regions.iter().map(|r| r.bbox).collect();
        let fills: Vec<(Rgb<u8>, f32)> = boxes
            .iter()
            .map(|b| self.estimate_fill(image, b, &boxes))
            .collect();

        for (idx, (region, (fill, spread))) in regions.iter().zip(fills).enumerate() {
            if spread > self.fill_variance_threshold {
                debug!(
                    "Page {} region {}: border spread {:.1} above threshold",
                    page_num, idx, spread
                );
                diagnostics.push(Diagnostic::LowConfidenceFill {
                    page: page_num,
                    region: idx,
                    spread,
                });
            }

            let Some(bbox) = clip(&region.bbox, image.width(), image.height()) else {
                continue;
            };
            let mut canvas = RgbImage::from_pixel(bbox.width(), bbox.height(), fill);

            let replacement = region.replacement.as_deref().unwrap_or_default();
            if !replacement.is_empty() {
                let fitted = self.fit(replacement, bbox.width(), bbox.height());
                if fitted.truncated || fitted.clipped {
                    let replacement_chars = replacement.chars().count();
                    let rendered_chars = if fitted.truncated {
                        fitted.text.chars().count().saturating_sub(1)
                    } else {
                        replacement_chars
                    };
                    warn!(
                        "Page {} region {}: replacement does not fit, {} of {} chars drawn",
                        page_num, idx, rendered_chars, replacement_chars
                    );
                    diagnostics.push(Diagnostic::ReplacementOverflow {
                        page: page_num,
                        region: idx,
                        replacement_chars,
                        rendered_chars,
                    });
                }
                if !fitted.text.is_empty() {
                    let x = (bbox.width() as i32 - fitted.width as i32) / 2;
                    let y = (bbox.height() as i32 - fitted.height as i32) / 2;
                    draw_text_mut(
                        &mut canvas,
                        ink_for(fill),
                        x,
                        y,
                        PxScale::from(fitted.size),
                        &self.font,
                        &fitted.text,
                    );
                }
            }

            image::imageops::replace(image, &canvas, bbox.left as i64, bbox.top as i64);
        }

        diagnostics
    }

    /// Median colour of the ring around `bbox` and the largest per-channel
    /// standard deviation of the samples.
    fn estimate_fill(
        &self,
        image: &RgbImage,
        bbox: &BoundingBox,
        all: &[BoundingBox],
    ) -> (Rgb<u8>, f32) {
        let w = self.fill_sample_width;
        let x0 = bbox.left.saturating_sub(w);
        let y0 = bbox.top.saturating_sub(w);
        let x1 = bbox.right.saturating_add(w).min(image.width());
        let y1 = bbox.bottom.saturating_add(w).min(image.height());

        let mut samples = Vec::new();
        for y in y0..y1 {
            for x in x0..x1 {
                if all.iter().any(|b| b.contains(x, y)) {
                    continue;
                }
                samples.push(*image.get_pixel(x, y));
            }
        }

        if samples.is_empty() {
            // The box touches the page or other regions on every side.
            for y in bbox.top..bbox.bottom.min(image.height()) {
                for x in bbox.left..bbox.right.min(image.width()) {
                    samples.push(*image.get_pixel(x, y));
                }
            }
            let (fill, spread) = median_and_spread(&samples);
            return (fill, spread.max(self.fill_variance_threshold + 1.0));
        }

        median_and_spread(&samples)
    }

    /// Pick the largest font size at which `text` fits, truncating at the
    /// floor if needed.
    fn fit(&self, text: &str, box_w: u32, box_h: u32) -> Fitted {
        let min = self.min_font_px;
        let mut size = (box_h as f32).max(min);
        loop {
            let (w, h) = text_size(PxScale::from(size), &self.font, text);
            if w <= box_w && (h <= box_h || size <= min) {
                return Fitted {
                    text: text.to_string(),
                    size,
                    width: w,
                    height: h,
                    truncated: false,
                    clipped: h > box_h,
                };
            }
            if size <= min {
                break;
            }
            size = (size - 1.0).max(min);
        }

        let chars: Vec<char> = text.chars().collect();
        for keep in (0..chars.len()).rev() {
            let candidate: String = chars[..keep]
                .iter()
                .chain(std::iter::once(&ELLIPSIS))
                .collect();
            let (w, h) = text_size(PxScale::from(min), &self.font, &candidate);
            if w <= box_w {
                return Fitted {
                    text: candidate,
                    size: min,
                    width: w,
                    height: h,
                    truncated: true,
                    clipped: h > box_h,
                };
            }
        }

        Fitted {
            text: String::new(),
            size: min,
            width: 0,
            height: 0,
            truncated: true,
            clipped: false,
        }
    }
}

fn clip(b: &BoundingBox, width: u32, height: u32) -> Option<BoundingBox> {
    BoundingBox::new(b.left, b.top, b.right.min(width), b.bottom.min(height))
}

fn median_and_spread(samples: &[Rgb<u8>]) -> (Rgb<u8>, f32) {
    if samples.is_empty() {
        return (Rgb([255, 255, 255]), 0.0);
    }
    let mut fill = [0u8; 3];
    let mut spread = 0.0f32;
    for c in 0..3 {
        let mut channel: Vec<u8> = samples.iter().map(|p| p.0[c]).collect();
        channel.sort_unstable();
        fill[c] = channel[channel.len() / 2];

        let n = channel.len() as f32;
        let mean = channel.iter().map(|&v| v as f32).sum::<f32>() / n;
        let sq: f32 = channel.iter().map(|&v| (v as f32 - mean).powi(2)).sum();
        let var = sq / n;
        spread = spread.max(var.sqrt());
    }
    (Rgb(fill), spread)
}

/// Black on light fills, white on dark ones.
fn ink_for(fill: Rgb<u8>) -> Rgb<u8> {
    let [r, g, b] = fill.0;
    let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    if luma >= 128.0 {
        Rgb([0, 0, 0])
    } else {
        Rgb([255, 255, 255])
    }
}
