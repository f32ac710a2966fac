//! Assessment pipeline orchestration.
//!
//! normalize → (phonemize reference ∥ recognize) → align → score → drills
//! → report. Whole-request failures abort before alignment and never
//! produce a report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::assess::align::try_align;
use crate::assess::drill::select_drills;
use crate::assess::report::PronunciationReport;
use crate::assess::score::score;
use crate::audio::normalize;
use crate::config::AssessmentConfig;
use crate::error::AssessError;
use crate::language::g2p::PronunciationDictionary;
use crate::language::phonemizer::Phonemizer;
use crate::language::recognize::{self, Recognizer};
use crate::types::{AudioBuffer, PhonemeSequence, PracticeSession, Utterance};

/// One reference text and one spoken attempt.
#[derive(Debug, Clone)]
pub struct AssessmentRequest {
    pub reference_text: String,
    pub audio: AudioBuffer,
    /// Identifier recorded in the report; defaults to the audio fingerprint
    pub audio_ref: Option<String>,
    pub history: Option<PracticeSession>,
}

impl AssessmentRequest {
    pub fn new(reference_text: &str, audio: AudioBuffer) -> Self {
        Self {
            reference_text: reference_text.to_string(),
            audio,
            audio_ref: None,
            history: None,
        }
    }

    pub fn with_audio_ref(mut self, audio_ref: &str) -> Self {
        self.audio_ref = Some(audio_ref.to_string());
        self
    }

    pub fn with_history(mut self, history: PracticeSession) -> Self {
        self.history = Some(history);
        self
    }
}

/// Cooperative cancellation flag shared between the caller and a running
/// assessment. Checked between stages; alignment itself runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn check_cancelled(cancel: Option<&CancellationToken>, stage: &str) -> Result<(), AssessError> {
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        log::debug!("Assessment cancelled {}", stage);
        return Err(AssessError::Cancelled);
    }
    Ok(())
}

/// Runs assessments. Safe to share across threads; holds no per-request
/// state.
pub struct Assessor {
    config: AssessmentConfig,
    phonemizer: Arc<Phonemizer>,
    recognizer: Arc<dyn Recognizer>,
}

impl Assessor {
    /// Fails with [`AssessError::InvalidConfig`] for an invalid config.
    pub fn new(
        config: AssessmentConfig,
        phonemizer: Arc<Phonemizer>,
        recognizer: Arc<dyn Recognizer>,
    ) -> Result<Self, AssessError> {
        config.validate()?;
        Ok(Self {
            config,
            phonemizer,
            recognizer,
        })
    }

    /// Phonemizer honoring the G2P knobs of `config`.
    pub fn build_phonemizer(
        config: &AssessmentConfig,
        dictionary: Option<PronunciationDictionary>,
    ) -> Phonemizer {
        let mut phonemizer = Phonemizer::new()
            .with_attempts(config.g2p_attempts)
            .with_cache_capacity(config.cache_capacity);
        if let Some(dictionary) = dictionary {
            phonemizer = phonemizer.with_dictionary(config.locale.language(), dictionary);
        }
        phonemizer
    }

    pub fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    pub fn phonemizer(&self) -> &Phonemizer {
        &self.phonemizer
    }

    /// Assess one spoken attempt against its reference text.
    pub fn assess(
        &self,
        request: &AssessmentRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<PronunciationReport, AssessError> {
        let config = &self.config;
        check_cancelled(cancel, "before start")?;

        let normalized = normalize(&request.audio, &config.audio)?;
        log::debug!(
            "Normalized audio: {} ms -> {} ms ({} ms voiced)",
            normalized.input_duration_ms,
            normalized.audio.duration_ms(),
            normalized.voiced_ms
        );
        check_cancelled(cancel, "after normalization")?;

        let audio_ref = request
            .audio_ref
            .clone()
            .unwrap_or_else(|| request.audio.fingerprint());

        let (reference, utterance) = self.phonemize_and_recognize(
            &request.reference_text,
            &normalized.audio,
            &audio_ref,
        )?;
        log::debug!(
            "Reference: {} words, {} phonemes; recognized {} phonemes",
            reference.words().len(),
            reference.len(),
            utterance.recognized_phonemes.len()
        );
        check_cancelled(cancel, "before alignment")?;

        let alignment = try_align(
            &reference,
            &utterance.recognized_phonemes,
            &config.costs,
            config.max_alignment_cells,
        )?;

        let low_confidence = utterance.confidence < config.confidence_threshold;
        if low_confidence {
            log::warn!(
                "Low recognizer confidence {:.2} (threshold {:.2})",
                utterance.confidence,
                config.confidence_threshold
            );
        }
        let summary = score(
            &reference,
            utterance.recognized_phonemes.len(),
            &alignment,
            low_confidence,
        );
        let drills = select_drills(&summary.word_scores, request.history.as_ref(), &config.drills);

        let report = PronunciationReport::assemble(
            normalized.summary(),
            utterance,
            reference,
            alignment,
            summary,
            drills,
            config.confidence_threshold,
        );
        log::info!(
            "Assessed {} words: score {:.3}, {} drill words, {} warnings",
            report.word_scores().len(),
            report.overall_score(),
            report.drill_words().len(),
            report.warnings().len()
        );
        Ok(report)
    }

    fn phonemize_and_recognize(
        &self,
        text: &str,
        audio: &AudioBuffer,
        audio_ref: &str,
    ) -> Result<(PhonemeSequence, Utterance), AssessError> {
        let locale = &self.config.locale;
        let phonemizer = self.phonemizer.as_ref();
        let recognizer = self.recognizer.as_ref();

        if !self.config.parallel_phonemize {
            let reference = phonemizer.phonemize(text, locale);
            let utterance = recognize::extract(recognizer, phonemizer, audio, audio_ref, locale)?;
            return Ok((reference, utterance));
        }

        std::thread::scope(|s| {
            let handle = s.spawn(|| phonemizer.phonemize(text, locale));
            let utterance = recognize::extract(recognizer, phonemizer, audio, audio_ref, locale);
            let reference = handle
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            utterance.map(|u| (reference, u))
        })
    }
}
