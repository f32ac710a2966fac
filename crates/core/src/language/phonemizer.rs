//! Reference text to word-segmented phoneme sequences.
//!
//! Each word goes dictionary → G2P model (retried) → placeholder. A word
//! that cannot be phonemized becomes a one-phoneme placeholder span instead
//! of failing the request. Results are cached per `(word, locale)` for the
//! lifetime of the [`Phonemizer`], which is meant to be shared across
//! requests behind an `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::language::g2p::{G2p, PronunciationDictionary, RuleBasedG2p};
use crate::types::{Locale, Phoneme, PhonemeSequence};

/// Per-word phonemization outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum WordPronunciation {
    Known(Vec<Phoneme>),
    /// No dictionary entry and the model failed; use the placeholder
    Fallback,
}

type CacheKey = (String, Locale);

pub struct Phonemizer {
    /// Dictionaries keyed by primary language subtag
    dictionaries: HashMap<String, PronunciationDictionary>,
    model: Option<Arc<dyn G2p>>,
    attempts: usize,
    capacity: Option<usize>,
    cache: RwLock<HashMap<CacheKey, WordPronunciation>>,
}

impl Default for Phonemizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Phonemizer {
    /// No dictionary, rule-based English model, two attempts, unbounded cache.
    pub fn new() -> Self {
        Self {
            dictionaries: HashMap::new(),
            model: Some(Arc::new(RuleBasedG2p)),
            attempts: 2,
            capacity: None,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_dictionary(mut self, language: &str, dictionary: PronunciationDictionary) -> Self {
        self.dictionaries
            .insert(Locale::new(language).language().to_string(), dictionary);
        self
    }

    pub fn with_model(mut self, model: Arc<dyn G2p>) -> Self {
        self.model = Some(model);
        self
    }

    /// Dictionary lookups only; misses become placeholders.
    pub fn without_model(mut self) -> Self {
        self.model = None;
        self
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Stop caching new words once `capacity` entries are held.
    pub fn with_cache_capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    /// Phonemize whitespace-separated text into word spans.
    pub fn phonemize(&self, text: &str, locale: &Locale) -> PhonemeSequence {
        let mut seq = PhonemeSequence::new();
        for word in tokenize(text) {
            match self.pronounce_word(&word, locale) {
                WordPronunciation::Known(phonemes) => {
                    seq.push_word(&word, phonemes);
                }
                WordPronunciation::Fallback => seq.push_fallback_word(&word),
            }
        }
        seq
    }

    /// Cached pronunciation for a single (already tokenized) word.
    pub fn pronounce_word(&self, word: &str, locale: &Locale) -> WordPronunciation {
        let key = (word.to_lowercase(), locale.clone());

        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }

        let resolved = self.resolve(word, locale);

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        let full = self.capacity.is_some_and(|cap| cache.len() >= cap);
        if full {
            log::debug!("Phonemizer cache full, not caching '{}'", word);
        } else {
            cache.insert(key, resolved.clone());
        }
        resolved
    }

    fn resolve(&self, word: &str, locale: &Locale) -> WordPronunciation {
        if let Some(phonemes) = self
            .dictionaries
            .get(locale.language())
            .and_then(|d| d.lookup(word))
        {
            return WordPronunciation::Known(phonemes.to_vec());
        }

        let Some(model) = &self.model else {
            log::warn!("No pronunciation for '{}' ({}), using placeholder", word, locale);
            return WordPronunciation::Fallback;
        };

        for attempt in 1..=self.attempts {
            match model.phonemize_word(word, locale) {
                Ok(phonemes) if !phonemes.is_empty() => {
                    log::debug!("G2P ({}) phonemized '{}'", model.name(), word);
                    return WordPronunciation::Known(phonemes);
                }
                Ok(_) => {
                    log::debug!("G2P ({}) has no pronunciation for '{}'", model.name(), word);
                    break;
                }
                Err(e) => {
                    log::debug!("G2P ({}) attempt {} failed: {}", model.name(), attempt, e);
                }
            }
        }

        log::warn!("Could not phonemize '{}' ({}), using placeholder", word, locale);
        WordPronunciation::Fallback
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear_cache(&self) {
        self.cache.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Split text into words, stripping edge punctuation and dropping empties.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(strip_punct)
        .filter(|w| !w.is_empty())
        .collect()
}

fn strip_punct(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
        .trim_matches('\'')
        .to_string()
}
