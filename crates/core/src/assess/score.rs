//! Per-word and overall scoring of an alignment.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::assess::align::AlignmentResult;
use crate::types::{ErrorKind, PhonemeSequence, WordFlag, WordScore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub overall_score: f64,
    pub word_scores: Vec<WordScore>,
}

#[derive(Default)]
struct WordAccumulator {
    cost: f64,
    errors: usize,
    error_types: BTreeSet<ErrorKind>,
    error_phonemes: Vec<String>,
}

/// Score `alignment` against the word spans of `reference`.
///
/// Insertions belong to the word of the closest preceding reference
/// phoneme; leading insertions belong to the first word. Errors on a
/// placeholder phoneme cost as usual but carry no error type.
pub fn score(
    reference: &PhonemeSequence,
    recognized_len: usize,
    alignment: &AlignmentResult,
    low_confidence: bool,
) -> ScoreSummary {
    if reference.is_empty() {
        // Nothing to say vs. nothing said is perfect; anything said is not
        let overall_score = if recognized_len == 0 { 1.0 } else { 0.0 };
        return ScoreSummary {
            overall_score,
            word_scores: Vec::new(),
        };
    }

    let words = reference.words();
    let phonemes = reference.phonemes();
    let mut acc: Vec<WordAccumulator> = words.iter().map(|_| WordAccumulator::default()).collect();
    let mut last_ref: Option<usize> = None;

    for op in &alignment.ops {
        let ref_idx = op.reference_index();
        if ref_idx.is_some() {
            last_ref = ref_idx;
        }
        let Some(kind) = op.error_kind() else {
            continue;
        };

        let word_idx = last_ref
            .and_then(|r| reference.word_index_of(r))
            .unwrap_or(0);
        let Some(word) = acc.get_mut(word_idx) else {
            continue;
        };

        word.cost += op.cost();
        word.errors += 1;

        match ref_idx.and_then(|r| phonemes.get(r)) {
            Some(p) if p.is_unknown() => {}
            Some(p) => {
                word.error_types.insert(kind);
                let symbol = p.to_string();
                if !word.error_phonemes.contains(&symbol) {
                    word.error_phonemes.push(symbol);
                }
            }
            None => {
                word.error_types.insert(kind);
            }
        }
    }

    let word_scores: Vec<WordScore> = words
        .iter()
        .zip(acc)
        .enumerate()
        .map(|(word_index, (span, a))| {
            let phoneme_count = span.len();
            let score = (1.0 - a.cost / phoneme_count as f64).clamp(0.0, 1.0);
            let mut flags = BTreeSet::new();
            if low_confidence {
                flags.insert(WordFlag::LowConfidence);
            }
            if span.fallback {
                flags.insert(WordFlag::UnknownWordFallback);
            }
            WordScore {
                word: span.text.clone(),
                word_index,
                phoneme_count,
                phoneme_error_count: a.errors,
                error_types: a.error_types,
                error_phonemes: a.error_phonemes,
                score,
                flags,
            }
        })
        .collect();

    let overall_score = if recognized_len == 0 {
        0.0
    } else {
        weighted_mean(&word_scores)
    };

    ScoreSummary {
        overall_score,
        word_scores,
    }
}

/// Phoneme-count-weighted mean of word scores.
fn weighted_mean(word_scores: &[WordScore]) -> f64 {
    let total: usize = word_scores.iter().map(|w| w.phoneme_count).sum();
    if total == 0 {
        return 0.0;
    }
    let weighted: f64 = word_scores
        .iter()
        .map(|w| w.score * w.phoneme_count as f64)
        .sum();
    (weighted / total as f64).clamp(0.0, 1.0)
}
