//! Natural-language feedback from a finished report.
//!
//! The production generator is an external language model that consumes
//! [`PronunciationReport::to_json_value`]. [`SummaryFeedback`] is a local
//! plain-text renderer used by the CLI.

use std::fmt::Write;

use anyhow::Result;

use crate::assess::report::PronunciationReport;
use crate::language::phoneme_table;
use crate::types::{ErrorKind, Warning};

pub trait FeedbackGenerator: Send + Sync {
    fn generate_feedback(&self, report: &PronunciationReport) -> Result<String>;
}

/// Short plain-text summary of scores, errors and drills.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryFeedback;

impl FeedbackGenerator for SummaryFeedback {
    fn generate_feedback(&self, report: &PronunciationReport) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "Overall score: {:.0}%", report.overall_score() * 100.0)?;

        for warning in report.warnings() {
            match warning {
                Warning::LowConfidence { confidence, .. } => writeln!(
                    out,
                    "Note: the recording was hard to recognize (confidence {:.0}%), \
                     so this result may be unreliable.",
                    confidence * 100.0
                )?,
                Warning::UnknownWord { word, .. } => {
                    writeln!(out, "Note: no pronunciation is known for \"{}\".", word)?
                }
            }
        }

        let mistakes: Vec<_> = report
            .word_scores()
            .iter()
            .filter(|w| !w.error_types.is_empty())
            .collect();
        if mistakes.is_empty() {
            writeln!(out, "Every word was pronounced correctly.")?;
        } else {
            writeln!(out)?;
            for w in mistakes {
                let kinds: Vec<String> = w.error_types.iter().map(ErrorKind::to_string).collect();
                write!(out, "  {:<14} {:>4.0}%  {}", w.word, w.score * 100.0, kinds.join(", "))?;
                if !w.error_phonemes.is_empty() {
                    write!(out, " ({})", w.error_phonemes.join(" "))?;
                }
                writeln!(out)?;
            }
        }

        if !report.drill_words().is_empty() {
            writeln!(out)?;
            writeln!(out, "Practice these words:")?;
            for (i, d) in report.drill_words().iter().enumerate() {
                write!(out, "  {}. {}", i + 1, d.word)?;
                if let Some(hint) = d.focus_phonemes.first().and_then(|p| phoneme_table::describe(p)) {
                    write!(out, " (focus on the {} {})", hint, d.focus_phonemes[0])?;
                }
                writeln!(out)?;
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assess::align::{align, CostModel};
    use crate::assess::drill::{select_drills, DrillConfig};
    use crate::assess::score::score;
    use crate::types::{AudioSummary, Phoneme, PhonemeSequence, PhonemeSource, Utterance};

    fn report(recognized: &str, confidence: f64) -> PronunciationReport {
        let mut reference = PhonemeSequence::new();
        reference.push_word("think", Phoneme::parse_list("TH IH1 NG K"));
        let recognized = PhonemeSequence::unsegmented("sink", Phoneme::parse_list(recognized));
        let alignment = align(&reference, &recognized, &CostModel::default());
        let summary = score(&reference, recognized.len(), &alignment, confidence < 0.3);
        let drills = select_drills(&summary.word_scores, None, &DrillConfig::default());
        let utterance = Utterance {
            raw_audio_ref: "a".into(),
            transcript: "sink".into(),
            recognized_phonemes: recognized,
            confidence,
            phoneme_source: PhonemeSource::RecognizerHints,
        };
        let audio = AudioSummary {
            sample_rate: 16000,
            input_duration_ms: 800,
            duration_ms: 800,
            voiced_ms: 800,
        };
        PronunciationReport::assemble(audio, utterance, reference, alignment, summary, drills, 0.3)
    }

    #[test]
    fn test_summary_lists_errors_and_drills() {
        let text = SummaryFeedback.generate_feedback(&report("S IY1 NG K", 0.9)).unwrap();
        assert!(text.starts_with("Overall score: 75%"));
        assert!(text.contains("wrong vowel, wrong consonant (TH IH1)"));
        assert!(text.contains("1. think (focus on the voiceless dental fricative TH)"));
    }

    #[test]
    fn test_summary_perfect() {
        let text = SummaryFeedback.generate_feedback(&report("TH IH1 NG K", 0.1)).unwrap();
        assert!(text.contains("Every word was pronounced correctly."));
        assert!(text.contains("hard to recognize"));
        assert!(!text.contains("Practice"));
    }
}
