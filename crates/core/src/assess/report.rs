//! Immutable pronunciation report.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::assess::align::AlignmentResult;
use crate::assess::score::ScoreSummary;
use crate::types::{AudioSummary, DrillWord, PhonemeSequence, Utterance, Warning, WordScore};

/// Round to 4 decimal places for display output.
fn round4(x: f64) -> f64 {
    (x * 10000.0).round() / 10000.0
}

/// Result of one assessment. Fields are read-only once assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PronunciationReport {
    utterance: Utterance,
    reference_phonemes: PhonemeSequence,
    alignment: AlignmentResult,
    overall_score: f64,
    word_scores: Vec<WordScore>,
    drill_words: Vec<DrillWord>,
    warnings: Vec<Warning>,
    audio: AudioSummary,
}

impl PronunciationReport {
    /// Package pipeline outputs and derive report-level warnings.
    pub fn assemble(
        audio: AudioSummary,
        utterance: Utterance,
        reference_phonemes: PhonemeSequence,
        alignment: AlignmentResult,
        summary: ScoreSummary,
        drill_words: Vec<DrillWord>,
        confidence_threshold: f64,
    ) -> Self {
        let mut warnings = Vec::new();
        if utterance.confidence < confidence_threshold {
            warnings.push(Warning::LowConfidence {
                confidence: utterance.confidence,
                threshold: confidence_threshold,
            });
        }
        for (word_index, word) in reference_phonemes.words().iter().enumerate() {
            if word.fallback {
                warnings.push(Warning::UnknownWord {
                    word: word.text.clone(),
                    word_index,
                });
            }
        }

        Self {
            utterance,
            reference_phonemes,
            alignment,
            overall_score: summary.overall_score,
            word_scores: summary.word_scores,
            drill_words,
            warnings,
            audio,
        }
    }

    pub fn utterance(&self) -> &Utterance {
        &self.utterance
    }

    pub fn reference_phonemes(&self) -> &PhonemeSequence {
        &self.reference_phonemes
    }

    pub fn alignment(&self) -> &AlignmentResult {
        &self.alignment
    }

    pub fn overall_score(&self) -> f64 {
        self.overall_score
    }

    pub fn word_scores(&self) -> &[WordScore] {
        &self.word_scores
    }

    pub fn drill_words(&self) -> &[DrillWord] {
        &self.drill_words
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn audio(&self) -> &AudioSummary {
        &self.audio
    }

    pub fn is_low_confidence(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, Warning::LowConfidence { .. }))
    }

    /// Compact JSON view for the feedback generator.
    pub fn to_json_value(&self) -> serde_json::Value {
        let words: Vec<serde_json::Value> = self
            .word_scores
            .iter()
            .map(|w| {
                serde_json::json!({
                    "word": w.word,
                    "index": w.word_index,
                    "score": round4(w.score),
                    "phonemes": self.reference_phonemes.word_phonemes(w.word_index)
                        .iter()
                        .map(|p| p.to_string())
                        .collect::<Vec<_>>(),
                    "errors": w.error_types,
                    "error_phonemes": w.error_phonemes,
                    "flags": w.flags,
                })
            })
            .collect();

        let drills: Vec<serde_json::Value> = self
            .drill_words
            .iter()
            .map(|d| {
                serde_json::json!({
                    "word": d.word,
                    "severity": round4(d.severity),
                    "rationale": d.rationale,
                    "history_count": d.history_count,
                    "focus_phonemes": d.focus_phonemes,
                })
            })
            .collect();

        serde_json::json!({
            "audio_ref": self.utterance.raw_audio_ref,
            "transcript": self.utterance.transcript,
            "confidence": round4(self.utterance.confidence),
            "phoneme_source": self.utterance.phoneme_source,
            "overall_score": round4(self.overall_score),
            "reference_phonemes": self.reference_phonemes.render(),
            "recognized_phonemes": self.utterance.recognized_phonemes.render(),
            "alignment_cost": round4(self.alignment.total_cost),
            "words": words,
            "drills": drills,
            "warnings": self.warnings,
            "audio": self.audio,
        })
    }

    /// SHA-256 of [`Self::to_json_value`], as a 64-char hex string.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_json_value().to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assess::align::{align, CostModel};
    use crate::assess::score::score;
    use crate::types::{Phoneme, PhonemeSource};

    fn report(confidence: f64, with_fallback: bool) -> PronunciationReport {
        let mut reference = PhonemeSequence::new();
        reference.push_word("cat", Phoneme::parse_list("K AE1 T"));
        if with_fallback {
            reference.push_fallback_word("zork");
        }
        let recognized = PhonemeSequence::unsegmented("cat", Phoneme::parse_list("K AE1 T"));
        let alignment = align(&reference, &recognized, &CostModel::default());
        let summary = score(&reference, recognized.len(), &alignment, confidence < 0.3);
        let utterance = Utterance {
            raw_audio_ref: "clip".into(),
            transcript: "cat".into(),
            recognized_phonemes: recognized,
            confidence,
            phoneme_source: PhonemeSource::Transcript,
        };
        let audio = AudioSummary {
            sample_rate: 16000,
            input_duration_ms: 1200,
            duration_ms: 900,
            voiced_ms: 700,
        };
        PronunciationReport::assemble(audio, utterance, reference, alignment, summary, vec![], 0.3)
    }

    #[test]
    fn test_low_confidence_warning() {
        let r = report(0.1, false);
        assert!(r.is_low_confidence());
        assert_eq!(r.overall_score(), 1.0);
        assert!(!report(0.9, false).is_low_confidence());
    }

    #[test]
    fn test_unknown_word_warning() {
        let r = report(0.9, true);
        assert_eq!(
            r.warnings(),
            &[Warning::UnknownWord {
                word: "zork".into(),
                word_index: 1
            }]
        );
    }

    #[test]
    fn test_json_field_names() {
        let v = report(0.9, false).to_json_value();
        assert_eq!(v["overall_score"], 1.0);
        assert_eq!(v["transcript"], "cat");
        assert_eq!(v["words"][0]["word"], "cat");
        assert_eq!(v["words"][0]["phonemes"][1], "AE1");
        assert_eq!(v["reference_phonemes"], "K AE1 T");
        assert!(v["drills"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_serde_roundtrip_preserves_report() {
        let r = report(0.1, true);
        let json = serde_json::to_string(&r).unwrap();
        let back: PronunciationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_digest_stable() {
        let a = report(0.9, false);
        let b = report(0.9, false);
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
        assert_ne!(a.digest(), report(0.1, false).digest());
    }
}
