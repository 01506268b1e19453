//! Built-in synthetic content: locale word lists plus random digits.
//!
//! Small and deterministic given the RNG. Alphabetic runs become a word of
//! the closest available length from the locale's list; numeric runs keep
//! their exact length; mixed runs become random upper-case letters and
//! digits. Punctuation-only content and unknown locales are unavailable, so
//! the pipeline falls back to the fixed literal.

use super::SyntheticGenerator;
use crate::error::GenerationUnavailable;
use crate::model::CharClass;
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};

const EN_WORDS: &[&str] = &[
    "Al", "Ray", "Lee", "Cole", "Hart", "Ford", "Price", "Baker", "Grant", "Miller",
    "Carter", "Hughes", "Porter", "Bennett", "Russell", "Sullivan", "Whitaker",
    "Henderson", "Montgomery",
];

const FR_WORDS: &[&str] = &[
    "Le", "Roy", "Blanc", "Petit", "Henri", "Martin", "Durand", "Lefebvre", "Moreau",
    "Laurent", "Girard", "Fontaine", "Rousseau", "Chevalier", "Beaumarchais",
];

const DE_WORDS: &[&str] = &[
    "Ott", "Funk", "Klein", "Braun", "Weber", "Becker", "Fischer", "Schmidt",
    "Hoffmann", "Wagner", "Zimmermann", "Schneider", "Hartmann", "Lindemann",
];

const ES_WORDS: &[&str] = &[
    "Gil", "Ruiz", "Diaz", "Vega", "Navarro", "Moreno", "Romero", "Alonso", "Serrano",
    "Castillo", "Fernandez", "Dominguez", "Rodriguez",
];

const IT_WORDS: &[&str] = &[
    "Re", "Neri", "Conti", "Rossi", "Greco", "Bruno", "Ricci", "Marino", "Lombardi",
    "Esposito", "Romano", "Ferrari", "Colombo", "Bernardi",
];

const ALNUM: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ0123456789";

/// [`SyntheticGenerator`] with built-in word lists for a few locales.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocaleWordGenerator;

impl LocaleWordGenerator {
    /// Locales with a word list.
    pub const LOCALES: &'static [&'static str] =
        &["en_US", "en_GB", "fr_FR", "de_DE", "es_ES", "it_IT"];

    fn words(locale: &str) -> Option<&'static [&'static str]> {
        match locale {
            "en_US" | "en_GB" => Some(EN_WORDS),
            "fr_FR" => Some(FR_WORDS),
            "de_DE" => Some(DE_WORDS),
            "es_ES" => Some(ES_WORDS),
            "it_IT" => Some(IT_WORDS),
            _ => None,
        }
    }
}

fn digits(length: usize, rng: &mut dyn RngCore) -> String {
    (0..length)
        .map(|i| {
            // No leading zero on multi-digit numbers.
            let low = if i == 0 && length > 1 { 1 } else { 0 };
            char::from(b'0' + rng.random_range(low..10u8))
        })
        .collect()
}

fn closest_word(words: &[&'static str], length: usize, rng: &mut dyn RngCore) -> Option<String> {
    let best = words
        .iter()
        .map(|w| w.chars().count().abs_diff(length))
        .min()?;
    let candidates: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| w.chars().count().abs_diff(length) == best)
        .collect();
    candidates.choose(rng).map(|w| w.to_string())
}

impl SyntheticGenerator for LocaleWordGenerator {
    fn generate(
        &self,
        class: CharClass,
        length_hint: usize,
        locale: &str,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationUnavailable> {
        let Some(words) = Self::words(locale) else {
            return Err(GenerationUnavailable::new(format!("no word list for locale {locale}")));
        };
        let length = length_hint.max(1);

        match class {
            CharClass::Numeric => Ok(digits(length, rng)),
            CharClass::Alphabetic => closest_word(words, length, rng)
                .ok_or_else(|| GenerationUnavailable::new("empty word list")),
            CharClass::Mixed => Ok((0..length)
                .map(|_| char::from(ALNUM[rng.random_range(0..ALNUM.len())]))
                .collect()),
            CharClass::PunctuationHeavy => Err(GenerationUnavailable::new(
                "no synthetic content for punctuation",
            )),
        }
    }
}
