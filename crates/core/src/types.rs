use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::assess::report::PronunciationReport;
use crate::error::AssessError;
use crate::language::phoneme_table::{self, PhonemeClass};

/// Symbol used for the placeholder pronunciation of a word that could not
/// be phonemized.
pub const UNKNOWN_SYMBOL: &str = "?";

/// A single phoneme.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Phoneme {
    /// ARPABET ("AE") or IPA ("æ") symbol without stress marks
    pub symbol: String,
    /// Stress level (0, 1, 2) when the notation carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress: Option<u8>,
}

impl Phoneme {
    pub fn new(symbol: impl Into<String>, stress: Option<u8>) -> Self {
        Self {
            symbol: symbol.into(),
            stress,
        }
    }

    /// Parse a phoneme token in ARPABET ("AE1") or IPA ("ˈæ") notation.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if let Some(rest) = token.strip_prefix('ˈ') {
            return Self::new(rest, Some(1));
        }
        if let Some(rest) = token.strip_prefix('ˌ') {
            return Self::new(rest, Some(2));
        }
        let base = phoneme_table::strip_stress(token);
        if base.len() < token.len() && phoneme_table::is_arpabet(base) {
            let stress = token[base.len()..].parse::<u8>().ok();
            return Self::new(base, stress);
        }
        Self::new(token, None)
    }

    /// Parse a whitespace- or comma-separated list of phoneme tokens.
    pub fn parse_list(text: &str) -> Vec<Phoneme> {
        text.split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(Phoneme::parse)
            .collect()
    }

    /// Placeholder phoneme for an unknown word.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_SYMBOL, None)
    }

    pub fn is_unknown(&self) -> bool {
        self.symbol == UNKNOWN_SYMBOL
    }

    /// Notation-independent comparison key (IPA is mapped to ARPABET).
    pub fn canonical(&self) -> String {
        phoneme_table::canonical_symbol(&self.symbol)
    }

    pub fn class(&self) -> PhonemeClass {
        if self.is_unknown() {
            return PhonemeClass::Unknown;
        }
        phoneme_table::class_of(&self.symbol)
    }
}

impl fmt::Display for Phoneme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stress {
            Some(s) if phoneme_table::is_arpabet(&self.symbol) => write!(f, "{}{}", self.symbol, s),
            Some(1) => write!(f, "ˈ{}", self.symbol),
            Some(2) => write!(f, "ˌ{}", self.symbol),
            _ => write!(f, "{}", self.symbol),
        }
    }
}

/// A word and the phonemes it covers in its parent sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSpan {
    pub text: String,
    /// First phoneme index (inclusive)
    pub start: usize,
    /// Last phoneme index (exclusive)
    pub end: usize,
    /// Pronunciation is a placeholder because phonemization failed
    #[serde(default)]
    pub fallback: bool,
}

impl WordSpan {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Ordered phonemes partitioned into word spans.
///
/// Spans are contiguous, non-empty and cover every phoneme. Sequences built
/// through [`PhonemeSequence::push_word`] hold this by construction;
/// deserialized ones can be checked with [`PhonemeSequence::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhonemeSequence {
    phonemes: Vec<Phoneme>,
    words: Vec<WordSpan>,
}

impl PhonemeSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sequence with a single span covering all phonemes, for recognizer
    /// output that has no word boundaries.
    pub fn unsegmented(text: &str, phonemes: Vec<Phoneme>) -> Self {
        let mut seq = Self::new();
        seq.push_word(text, phonemes);
        seq
    }

    /// Append a word. Returns `false` (and appends nothing) when `phonemes`
    /// is empty.
    pub fn push_word(&mut self, text: &str, phonemes: Vec<Phoneme>) -> bool {
        self.push_span(text, phonemes, false)
    }

    /// Append a word with the single-phoneme placeholder pronunciation.
    pub fn push_fallback_word(&mut self, text: &str) {
        self.push_span(text, vec![Phoneme::unknown()], true);
    }

    fn push_span(&mut self, text: &str, phonemes: Vec<Phoneme>, fallback: bool) -> bool {
        if phonemes.is_empty() {
            return false;
        }
        let start = self.phonemes.len();
        self.phonemes.extend(phonemes);
        self.words.push(WordSpan {
            text: text.to_string(),
            start,
            end: self.phonemes.len(),
            fallback,
        });
        true
    }

    pub fn phonemes(&self) -> &[Phoneme] {
        &self.phonemes
    }

    pub fn words(&self) -> &[WordSpan] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.phonemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phonemes.is_empty()
    }

    /// Index of the word span containing phoneme `index`.
    pub fn word_index_of(&self, index: usize) -> Option<usize> {
        if index >= self.phonemes.len() {
            return None;
        }
        let pos = self.words.partition_point(|w| w.end <= index);
        (pos < self.words.len()).then_some(pos)
    }

    /// Phonemes of one word.
    pub fn word_phonemes(&self, word_index: usize) -> &[Phoneme] {
        self.words
            .get(word_index)
            .map(|w| &self.phonemes[w.range()])
            .unwrap_or(&[])
    }

    /// Space-separated phoneme symbols, words separated by " | ".
    pub fn render(&self) -> String {
        self.words
            .iter()
            .map(|w| {
                self.phonemes[w.range()]
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Check the span invariant.
    pub fn validate(&self) -> Result<(), AssessError> {
        let mut cursor = 0;
        for (i, w) in self.words.iter().enumerate() {
            if w.start != cursor {
                return Err(AssessError::invalid_input(format!(
                    "word {} ('{}') starts at {} but previous span ended at {}",
                    i, w.text, w.start, cursor
                )));
            }
            if w.is_empty() {
                return Err(AssessError::invalid_input(format!(
                    "word {} ('{}') has an empty phoneme span",
                    i, w.text
                )));
            }
            cursor = w.end;
        }
        if cursor != self.phonemes.len() {
            return Err(AssessError::invalid_input(format!(
                "word spans cover {} of {} phonemes",
                cursor,
                self.phonemes.len()
            )));
        }
        Ok(())
    }
}

/// Recognizer output for one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Caller-supplied audio identifier, or the audio fingerprint
    pub raw_audio_ref: String,
    pub transcript: String,
    pub recognized_phonemes: PhonemeSequence,
    /// Recognizer confidence in [0, 1]
    pub confidence: f64,
    pub phoneme_source: PhonemeSource,
}

/// Where the recognized phonemes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhonemeSource {
    /// Phoneme-level hints returned by the recognizer
    RecognizerHints,
    /// Phonemized recognizer transcript
    Transcript,
}

/// Pronunciation error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Reference phoneme was not pronounced
    Omission,
    WrongVowel,
    WrongConsonant,
    /// Correct phoneme, wrong stress level
    StressShift,
    /// Extra sound with no reference counterpart
    Insertion,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Omission => "omission",
            ErrorKind::WrongVowel => "wrong vowel",
            ErrorKind::WrongConsonant => "wrong consonant",
            ErrorKind::StressShift => "stress shift",
            ErrorKind::Insertion => "insertion",
        };
        f.write_str(s)
    }
}

/// Per-word annotations that do not change the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordFlag {
    /// Recognizer confidence for the utterance was below threshold
    LowConfidence,
    /// Reference pronunciation is a placeholder
    UnknownWordFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordScore {
    pub word: String,
    /// Position of the word in the reference text
    pub word_index: usize,
    pub phoneme_count: usize,
    pub phoneme_error_count: usize,
    pub error_types: BTreeSet<ErrorKind>,
    /// Reference phonemes involved in errors, in order
    pub error_phonemes: Vec<String>,
    /// Score in [0, 1]
    pub score: f64,
    pub flags: BTreeSet<WordFlag>,
}

impl WordScore {
    pub fn has_flag(&self, flag: WordFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// A word chosen for focused practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillWord {
    pub word: String,
    /// `1 - word_score`
    pub severity: f64,
    pub rationale: BTreeSet<ErrorKind>,
    /// Errors recorded for this word in past sessions
    pub history_count: u32,
    pub focus_phonemes: Vec<String>,
}

/// Non-fatal conditions attached to a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    LowConfidence { confidence: f64, threshold: f64 },
    UnknownWord { word: String, word_index: usize },
}

/// Normalized lookup key for a word: lowercase, edge punctuation removed.
pub fn word_key(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Cumulative per-word error counts from earlier reports.
///
/// Owned by the caller; the engine only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PracticeSession {
    counts: BTreeMap<String, u32>,
}

impl PracticeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        let mut session = Self::new();
        for (word, count) in counts {
            *session.counts.entry(word_key(word.as_ref())).or_insert(0) += count;
        }
        session
    }

    pub fn error_count(&self, word: &str) -> u32 {
        self.counts.get(&word_key(word)).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Fold a finished report into this history.
    pub fn record(&mut self, report: &PronunciationReport) {
        for ws in report.word_scores() {
            if ws.phoneme_error_count > 0 {
                *self.counts.entry(word_key(&ws.word)).or_insert(0) +=
                    ws.phoneme_error_count as u32;
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read practice history: {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse practice history: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write practice history: {}", path.display()))
    }
}

/// Mono audio samples in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_s(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn duration_ms(&self) -> u64 {
        (self.duration_s() * 1000.0).round() as u64
    }

    /// SHA-256 over the sample rate and sample data, as a 64-char hex string.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sample_rate.to_le_bytes());
        for s in &self.samples {
            hasher.update(s.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Audio facts recorded in a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioSummary {
    pub sample_rate: u32,
    /// Duration of the input before normalization
    pub input_duration_ms: u64,
    /// Duration after trimming / gating
    pub duration_ms: u64,
    pub voiced_ms: u64,
}

/// Language tag such as "en-US", stored lowercase with '-' separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Locale(String);

impl Locale {
    pub fn new(tag: &str) -> Self {
        Self(tag.trim().replace('_', "-").to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary language subtag ("en" for "en-us").
    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or("")
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::new("en-US")
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Locale {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for Locale {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<Locale> for String {
    fn from(l: Locale) -> Self {
        l.0
    }
}
