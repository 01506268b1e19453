//! Match selection: tokens → replaceable regions.
//!
//! Each token is tested on its own against the pattern (a match anywhere in
//! its text is enough). Consecutive matching tokens are then merged in one
//! greedy pass over the reading order, which rebuilds phrases such as full
//! names that recognition split into words. Two neighbours merge when:
//!
//! - they share a line band;
//! - the horizontal gap between them is below `merge_gap_factor` × the
//!   median character width of that line;
//! - if `merge_height_ratio` is set, their heights are similar enough.
//!
//! A non-matching token always breaks a run, so a region never swallows text
//! that was not selected.

use crate::config::RedactionConfig;
use crate::model::{BoundingBox, CharClass, MatchRegion, Token};
use crate::pipeline::extract::median;
use regex::Regex;
use std::collections::HashMap;

/// Knobs for [`select_regions`], taken from [`RedactionConfig`].
#[derive(Debug, Clone, Copy)]
pub struct SelectOptions {
    pub match_low_confidence: bool,
    pub merge_gap_factor: f32,
    pub merge_height_ratio: Option<f32>,
    pub box_margin: u32,
}

impl From<&RedactionConfig> for SelectOptions {
    fn from(c: &RedactionConfig) -> Self {
        Self {
            match_low_confidence: c.match_low_confidence,
            merge_gap_factor: c.merge_gap_factor,
            merge_height_ratio: c.merge_height_ratio,
            box_margin: c.box_margin,
        }
    }
}

/// Whether one token is selected.
pub fn token_matches(token: &Token, pattern: Option<&Regex>, match_low_confidence: bool) -> bool {
    if token.low_confidence && !match_low_confidence {
        return false;
    }
    pattern.is_none_or(|re| re.is_match(&token.text))
}

/// Group the page's tokens (already in reading order) into regions.
///
/// Returns an empty vector when nothing matches. Region boxes are clamped
/// to the `width × height` page.
pub fn select_regions(
    tokens: &[Token],
    pattern: Option<&Regex>,
    opts: SelectOptions,
    width: u32,
    height: u32,
) -> Vec<MatchRegion> {
    let line_char_width = median_char_width_per_line(tokens);

    let mut regions = Vec::new();
    let mut run: Vec<&Token> = Vec::new();

    for token in tokens {
        if !token_matches(token, pattern, opts.match_low_confidence) {
            flush(&mut run, &mut regions, opts.box_margin, width, height);
            continue;
        }
        let joins = run
            .last()
            .is_some_and(|prev| should_merge(prev, token, &line_char_width, &opts));
        if !joins {
            flush(&mut run, &mut regions, opts.box_margin, width, height);
        }
        run.push(token);
    }
    flush(&mut run, &mut regions, opts.box_margin, width, height);

    regions
}

fn should_merge(
    prev: &Token,
    next: &Token,
    line_char_width: &HashMap<usize, f32>,
    opts: &SelectOptions,
) -> bool {
    if prev.line != next.line {
        return false;
    }
    let char_width = line_char_width.get(&next.line).copied().unwrap_or(0.0);
    // Overlapping boxes count as a zero gap.
    let gap = (next.bbox.left as f32 - prev.bbox.right as f32).max(0.0);
    if gap >= opts.merge_gap_factor * char_width {
        return false;
    }
    match opts.merge_height_ratio {
        Some(min_ratio) => {
            let (a, b) = (prev.bbox.height() as f32, next.bbox.height() as f32);
            a.min(b) / a.max(b) >= min_ratio
        }
        None => true,
    }
}

fn median_char_width_per_line(tokens: &[Token]) -> HashMap<usize, f32> {
    let mut widths: HashMap<usize, Vec<f32>> = HashMap::new();
    for t in tokens {
        widths.entry(t.line).or_default().push(t.char_width());
    }
    widths
        .into_iter()
        .filter_map(|(line, w)| median(w).map(|m| (line, m)))
        .collect()
}

fn flush(
    run: &mut Vec<&Token>,
    regions: &mut Vec<MatchRegion>,
    margin: u32,
    width: u32,
    height: u32,
) {
    let Some(first) = run.first() else {
        return;
    };
    let union: BoundingBox = run
        .iter()
        .skip(1)
        .fold(first.bbox, |acc, t| acc.union(&t.bbox));
    let original = run
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    regions.push(MatchRegion {
        bbox: union.expand(margin, width, height),
        class: CharClass::of(&original),
        original,
        token_count: run.len(),
        replacement: None,
    });
    run.clear();
}
