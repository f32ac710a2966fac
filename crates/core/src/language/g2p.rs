//! Grapheme-to-phoneme conversion.
//!
//! Pronunciations come from a CMU-format dictionary when one is loaded, and
//! from a [`G2p`] model otherwise. [`RuleBasedG2p`] is the built-in English
//! model for out-of-vocabulary words.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::types::{Locale, Phoneme};

#[derive(Debug, Error)]
pub enum G2pError {
    #[error("{model} does not support locale '{locale}'")]
    UnsupportedLocale { model: String, locale: String },
    #[error("could not phonemize '{word}': {message}")]
    Failed { word: String, message: String },
}

/// Grapheme-to-phoneme model.
///
/// An empty `Ok` result is the "unknown" marker: the model ran but has no
/// pronunciation for the word.
pub trait G2p: Send + Sync {
    /// Model name for logs.
    fn name(&self) -> &str;

    fn phonemize_word(&self, word: &str, locale: &Locale) -> Result<Vec<Phoneme>, G2pError>;
}

/// Pronunciation dictionary in CMU format.
///
/// Format: one word per line, "WORD  PH1 PH2 PH3 ..."
/// Lines starting with ";;;" are comments; "WORD(2)" marks a variant.
#[derive(Debug, Clone, Default)]
pub struct PronunciationDictionary {
    entries: HashMap<String, Vec<Vec<Phoneme>>>,
}

impl PronunciationDictionary {
    pub fn from_cmu_str(data: &str) -> Self {
        let mut entries: HashMap<String, Vec<Vec<Phoneme>>> = HashMap::new();
        for line in data.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(";;;") {
                continue;
            }
            let Some((word_raw, phonemes_str)) = line.split_once(char::is_whitespace) else {
                continue;
            };

            // Strip variant marker: WORD(2) -> WORD
            let word = word_raw
                .split('(')
                .next()
                .unwrap_or(word_raw)
                .to_uppercase();

            let phonemes = Phoneme::parse_list(phonemes_str);
            if !phonemes.is_empty() {
                entries.entry(word).or_default().push(phonemes);
            }
        }
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pronunciation dictionary: {}", path.display()))?;
        let dict = Self::from_cmu_str(&data);
        log::info!("Loaded {} dictionary entries from {}", dict.len(), path.display());
        Ok(dict)
    }

    /// First pronunciation variant, case-insensitive.
    pub fn lookup(&self, word: &str) -> Option<&[Phoneme]> {
        self.entries
            .get(&word.to_uppercase())
            .and_then(|variants| variants.first())
            .map(Vec::as_slice)
    }

    /// All pronunciation variants for a word.
    pub fn lookup_all(&self, word: &str) -> Option<&[Vec<Phoneme>]> {
        self.entries.get(&word.to_uppercase()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Letter and digraph rules for English words, producing ARPABET.
///
/// A best-effort approximation for words missing from the dictionary.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedG2p;

impl G2p for RuleBasedG2p {
    fn name(&self) -> &str {
        "rules-en"
    }

    fn phonemize_word(&self, word: &str, locale: &Locale) -> Result<Vec<Phoneme>, G2pError> {
        if locale.language() != "en" {
            return Err(G2pError::UnsupportedLocale {
                model: self.name().to_string(),
                locale: locale.to_string(),
            });
        }
        Ok(english_rules(word).into_iter().map(Phoneme::parse).collect())
    }
}

fn digraph(a: char, b: char) -> Option<&'static str> {
    let p = match (a, b) {
        ('t', 'h') => "TH",
        ('s', 'h') => "SH",
        ('c', 'h') => "CH",
        ('n', 'g') => "NG",
        ('p', 'h') => "F",
        ('w', 'h') => "W",
        ('c', 'k') => "K",
        ('e', 'e') | ('e', 'a') => "IY1",
        ('o', 'o') => "UW1",
        ('o', 'u') => "AW1",
        ('o', 'w') => "OW1",
        ('a', 'i') | ('a', 'y') => "EY1",
        ('o', 'i') | ('o', 'y') => "OY1",
        _ => return None,
    };
    Some(p)
}

/// Returns no phonemes for input without letters.
fn english_rules(word: &str) -> Vec<&'static str> {
    let chars: Vec<char> = word.to_lowercase().chars().collect();
    let mut phonemes = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if let Some(&next) = chars.get(i + 1) {
            if let Some(p) = digraph(chars[i], next) {
                phonemes.push(p);
                i += 2;
                continue;
            }
        }

        match chars[i] {
            'a' => phonemes.push("AE1"),
            'b' => phonemes.push("B"),
            // c before e/i/y = S, otherwise K
            'c' => match chars.get(i + 1) {
                Some('e' | 'i' | 'y') => phonemes.push("S"),
                _ => phonemes.push("K"),
            },
            'd' => phonemes.push("D"),
            // Silent e at end of word
            'e' if i == chars.len() - 1 && !phonemes.is_empty() => {}
            'e' => phonemes.push("EH1"),
            'f' => phonemes.push("F"),
            'g' => phonemes.push("G"),
            'h' => phonemes.push("HH"),
            'i' => phonemes.push("IH1"),
            'j' => phonemes.push("JH"),
            'k' | 'q' => phonemes.push("K"),
            'l' => phonemes.push("L"),
            'm' => phonemes.push("M"),
            'n' => phonemes.push("N"),
            'o' => phonemes.push("AA1"),
            'p' => phonemes.push("P"),
            'r' => phonemes.push("R"),
            's' => phonemes.push("S"),
            't' => phonemes.push("T"),
            'u' => phonemes.push("AH1"),
            'v' => phonemes.push("V"),
            'w' => phonemes.push("W"),
            'x' => {
                phonemes.push("K");
                phonemes.push("S");
            }
            'y' if phonemes.is_empty() => phonemes.push("Y"),
            'y' => phonemes.push("IY1"),
            'z' => phonemes.push("Z"),
            _ => {}
        }
        i += 1;
    }

    phonemes
}
