//! Replacement generation: fill in `MatchRegion::replacement`.
//!
//! In fixed mode every region gets the configured literal. In synthetic
//! mode the region's text is split into alphanumeric runs and separators;
//! separators are kept and each run is replaced by generator output of the
//! same class and length, re-cased like the original. `123-45-6789` thus
//! becomes another `ddd-dd-dddd`, and `John Smith` two capitalised words.
//!
//! Every region gets its own RNG seeded from `(seed, page, region)`, so the
//! output does not depend on which worker ran first.

use crate::config::{RedactionConfig, ReplacementMode};
use crate::engines::SyntheticGenerator;
use crate::error::GenerationUnavailable;
use crate::model::{CharClass, MatchRegion};
use crate::output::Diagnostic;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::warn;

/// Set a replacement on every region of one page.
///
/// Never fails: a region the generator cannot serve gets the fixed literal
/// and a [`Diagnostic::GenerationFallback`].
pub fn generate_replacements(
    regions: &mut [MatchRegion],
    page_num: usize,
    config: &RedactionConfig,
    generator: &dyn SyntheticGenerator,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for (idx, region) in regions.iter_mut().enumerate() {
        let replacement = match config.replacement {
            ReplacementMode::Fixed => config.replacement_text.clone(),
            ReplacementMode::Synthetic => {
                let mut rng = region_rng(config.synthetic_seed, page_num, idx);
                match synthesize(region, &config.locale, generator, &mut rng) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(
                            "Page {} region {}: no synthetic content ({}), using literal",
                            page_num, idx, e.reason
                        );
                        diagnostics.push(Diagnostic::GenerationFallback {
                            page: page_num,
                            region: idx,
                            reason: e.reason,
                        });
                        config.replacement_text.clone()
                    }
                }
            }
        };
        region.replacement = Some(replacement);
    }

    diagnostics
}

fn region_rng(seed: u64, page_num: usize, region: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ ((page_num as u64) << 32 | region as u64))
}

/// Build shape-preserving content for one region.
pub fn synthesize(
    region: &MatchRegion,
    locale: &str,
    generator: &dyn SyntheticGenerator,
    rng: &mut dyn RngCore,
) -> Result<String, GenerationUnavailable> {
    let runs = split_runs(&region.original);

    // Nothing alphanumeric to mirror: ask for the region as a whole.
    if !runs.iter().any(|r| r.alnum) {
        let len = region.original.chars().count();
        let text = generator.generate(region.class, len, locale, rng)?;
        return non_empty(text);
    }

    let mut out = String::with_capacity(region.original.len());
    for run in runs {
        if !run.alnum {
            out.push_str(run.text);
            continue;
        }
        let class = CharClass::of(run.text);
        let len = run.text.chars().count();
        let generated = non_empty(generator.generate(class, len, locale, rng)?)?;
        out.push_str(&match_case(run.text, &generated));
    }
    Ok(out)
}

fn non_empty(text: String) -> Result<String, GenerationUnavailable> {
    if text.trim().is_empty() {
        Err(GenerationUnavailable::new("generator returned empty text"))
    } else {
        Ok(text)
    }
}

struct Run<'a> {
    text: &'a str,
    alnum: bool,
}

fn split_runs(text: &str) -> Vec<Run<'_>> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;
    for (i, c) in text.char_indices() {
        let alnum = c.is_alphanumeric();
        match current {
            Some(kind) if kind == alnum => {}
            Some(kind) => {
                runs.push(Run {
                    text: &text[start..i],
                    alnum: kind,
                });
                start = i;
                current = Some(alnum);
            }
            None => current = Some(alnum),
        }
    }
    if let Some(kind) = current {
        runs.push(Run {
            text: &text[start..],
            alnum: kind,
        });
    }
    runs
}

/// Re-case `generated` after `original`: all caps stays all caps, a
/// capitalised word stays capitalised, otherwise lower case.
fn match_case(original: &str, generated: &str) -> String {
    let letters: Vec<char> = original.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return generated.to_string();
    }
    if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) {
        return generated.to_uppercase();
    }
    let lower = generated.to_lowercase();
    if letters[0].is_uppercase() {
        let mut chars = lower.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => lower,
        }
    } else {
        lower
    }
}
