//! Practice-word selection.
//!
//! Ranks words by severity (`1 - score`), then by how often the learner
//! got them wrong before, then by first appearance in the reference text.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::AssessError;
use crate::types::{word_key, DrillWord, PracticeSession, WordScore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrillConfig {
    pub max_drill_words: usize,
    /// Minimum severity for a word to be drilled
    pub drill_severity_threshold: f64,
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            max_drill_words: 5,
            drill_severity_threshold: 0.15,
        }
    }
}

impl DrillConfig {
    pub fn validate(&self) -> Result<(), AssessError> {
        if !(0.0..=1.0).contains(&self.drill_severity_threshold) {
            return Err(AssessError::invalid_config(format!(
                "drill_severity_threshold must be in [0, 1], got {}",
                self.drill_severity_threshold
            )));
        }
        Ok(())
    }
}

struct Candidate {
    first_index: usize,
    drill: DrillWord,
}

/// Choose up to `max_drill_words` words to practice.
///
/// Repeated words are merged (highest severity, union of error types and
/// focus phonemes). Words with no classified error, such as placeholder
/// pronunciations, are never drilled.
pub fn select_drills(
    word_scores: &[WordScore],
    history: Option<&PracticeSession>,
    config: &DrillConfig,
) -> Vec<DrillWord> {
    let mut candidates: Vec<Candidate> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for (position, ws) in word_scores.iter().enumerate() {
        let key = word_key(&ws.word);
        let severity = (1.0 - ws.score).clamp(0.0, 1.0);

        match by_key.get(&key) {
            Some(&idx) => {
                let drill = &mut candidates[idx].drill;
                drill.severity = drill.severity.max(severity);
                drill.rationale.extend(ws.error_types.iter().copied());
                for p in &ws.error_phonemes {
                    if !drill.focus_phonemes.contains(p) {
                        drill.focus_phonemes.push(p.clone());
                    }
                }
            }
            None => {
                let history_count = history.map(|h| h.error_count(&key)).unwrap_or(0);
                by_key.insert(key, candidates.len());
                candidates.push(Candidate {
                    first_index: position,
                    drill: DrillWord {
                        word: ws.word.clone(),
                        severity,
                        rationale: ws.error_types.iter().copied().collect::<BTreeSet<_>>(),
                        history_count,
                        focus_phonemes: ws.error_phonemes.clone(),
                    },
                });
            }
        }
    }

    candidates.retain(|c| {
        c.drill.severity >= config.drill_severity_threshold && !c.drill.rationale.is_empty()
    });

    candidates.sort_by(|a, b| {
        b.drill
            .severity
            .total_cmp(&a.drill.severity)
            .then_with(|| b.drill.history_count.cmp(&a.drill.history_count))
            .then_with(|| a.first_index.cmp(&b.first_index))
    });
    candidates.truncate(config.max_drill_words);

    log::debug!("Selected {} drill words", candidates.len());
    candidates.into_iter().map(|c| c.drill).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorKind, WordFlag};

    fn ws(word: &str, score: f64, kinds: &[ErrorKind], phonemes: &[&str]) -> WordScore {
        WordScore {
            word: word.to_string(),
            word_index: 0,
            phoneme_count: 3,
            phoneme_error_count: kinds.len(),
            error_types: kinds.iter().copied().collect(),
            error_phonemes: phonemes.iter().map(|p| p.to_string()).collect(),
            score,
            flags: BTreeSet::new(),
        }
    }

    fn config(k: usize) -> DrillConfig {
        DrillConfig {
            max_drill_words: k,
            ..DrillConfig::default()
        }
    }

    #[test]
    fn test_sorted_by_severity_and_bounded() {
        let scores = vec![
            ws("one", 0.8, &[ErrorKind::WrongVowel], &["AH1"]),
            ws("two", 0.2, &[ErrorKind::Omission], &["T"]),
            ws("three", 0.5, &[ErrorKind::WrongConsonant], &["TH"]),
            ws("four", 0.6, &[ErrorKind::StressShift], &["AO1"]),
        ];
        let drills = select_drills(&scores, None, &config(3));
        let words: Vec<_> = drills.iter().map(|d| d.word.as_str()).collect();
        assert_eq!(words, vec!["two", "three", "four"]);
        assert!(drills.windows(2).all(|w| w[0].severity >= w[1].severity));
    }

    #[test]
    fn test_threshold_excludes_near_perfect() {
        let scores = vec![
            ws("fine", 0.9, &[ErrorKind::StressShift], &["IY1"]),
            ws("perfect", 1.0, &[], &[]),
        ];
        assert!(select_drills(&scores, None, &config(5)).is_empty());
    }

    #[test]
    fn test_history_breaks_ties() {
        let scores = vec![
            ws("cat", 0.5, &[ErrorKind::WrongVowel], &["AE1"]),
            ws("think", 0.5, &[ErrorKind::WrongConsonant], &["TH"]),
        ];
        let history = PracticeSession::from_counts([("Think", 4)]);
        let drills = select_drills(&scores, Some(&history), &config(5));
        assert_eq!(drills[0].word, "think");
        assert_eq!(drills[0].history_count, 4);
        assert_eq!(drills[1].history_count, 0);
    }

    #[test]
    fn test_first_occurrence_breaks_remaining_ties() {
        let scores = vec![
            ws("b", 0.5, &[ErrorKind::WrongVowel], &[]),
            ws("a", 0.5, &[ErrorKind::WrongVowel], &[]),
        ];
        let drills = select_drills(&scores, None, &config(5));
        assert_eq!(drills[0].word, "b");
    }

    #[test]
    fn test_duplicate_words_merge() {
        let scores = vec![
            ws("The", 0.6, &[ErrorKind::WrongVowel], &["AH0"]),
            ws("cat", 0.7, &[ErrorKind::Omission], &["T"]),
            ws("the", 0.2, &[ErrorKind::WrongConsonant], &["DH", "AH0"]),
        ];
        let drills = select_drills(&scores, None, &config(5));
        assert_eq!(drills.len(), 2);
        let the = &drills[0];
        assert_eq!(the.word, "The");
        assert!((the.severity - 0.8).abs() < 1e-9);
        assert_eq!(
            the.rationale,
            BTreeSet::from([ErrorKind::WrongVowel, ErrorKind::WrongConsonant])
        );
        assert_eq!(the.focus_phonemes, vec!["AH0", "DH"]);
    }

    #[test]
    fn test_fallback_only_word_not_drilled() {
        let mut placeholder = ws("zork", 0.0, &[], &[]);
        placeholder.flags.insert(WordFlag::UnknownWordFallback);
        assert!(select_drills(&[placeholder], None, &config(5)).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let scores: Vec<_> = (0..20)
            .map(|i| {
                ws(
                    &format!("w{}", i % 7),
                    (i % 5) as f64 / 5.0,
                    &[ErrorKind::Omission],
                    &["K"],
                )
            })
            .collect();
        let history = PracticeSession::from_counts([("w1", 2), ("w3", 2)]);
        let a = select_drills(&scores, Some(&history), &config(5));
        let b = select_drills(&scores, Some(&history), &config(5));
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        assert!(a.len() <= 5);
    }

    #[test]
    fn test_zero_k_yields_nothing() {
        let scores = vec![ws("cat", 0.0, &[ErrorKind::Omission], &["K"])];
        assert!(select_drills(&scores, None, &config(0)).is_empty());
    }

    #[test]
    fn test_validate_threshold() {
        let bad = DrillConfig {
            drill_severity_threshold: 1.5,
            ..DrillConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
