//! Speech recognizer interface and recognized-phoneme extraction.
//!
//! The recognizer is an external collaborator. When it returns phoneme
//! hints they are used directly; otherwise its transcript is phonemized
//! with the same [`Phonemizer`] as the reference text.

use thiserror::Error;

use crate::error::AssessError;
use crate::language::phonemizer::Phonemizer;
use crate::types::{AudioBuffer, Locale, PhonemeSequence, PhonemeSource, Utterance};

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("recognizer unavailable: {0}")]
    Unavailable(String),
    #[error("recognition failed: {0}")]
    Failed(String),
}

/// Recognizer output.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub transcript: String,
    pub phoneme_hints: Option<PhonemeSequence>,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

/// Speech recognition backend.
pub trait Recognizer: Send + Sync {
    /// Backend name for logs and error messages.
    fn name(&self) -> &str;

    fn transcribe(&self, audio: &AudioBuffer, locale: &Locale) -> Result<Transcription, RecognitionError>;
}

/// Returns a fixed transcription regardless of the audio.
///
/// Used when the transcript is already known (the caller ran recognition
/// elsewhere) and in tests.
#[derive(Debug, Clone)]
pub struct ScriptedRecognizer {
    transcription: Transcription,
}

impl ScriptedRecognizer {
    pub fn new(transcript: &str) -> Self {
        Self {
            transcription: Transcription {
                transcript: transcript.to_string(),
                phoneme_hints: None,
                confidence: 1.0,
            },
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.transcription.confidence = confidence;
        self
    }

    pub fn with_hints(mut self, hints: PhonemeSequence) -> Self {
        self.transcription.phoneme_hints = Some(hints);
        self
    }
}

impl Recognizer for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted"
    }

    fn transcribe(&self, _audio: &AudioBuffer, _locale: &Locale) -> Result<Transcription, RecognitionError> {
        Ok(self.transcription.clone())
    }
}

/// Run the recognizer and derive the recognized phoneme sequence.
pub fn extract(
    recognizer: &dyn Recognizer,
    phonemizer: &Phonemizer,
    audio: &AudioBuffer,
    raw_audio_ref: &str,
    locale: &Locale,
) -> Result<Utterance, AssessError> {
    let transcription = recognizer.transcribe(audio, locale).map_err(|source| {
        AssessError::RecognitionUnavailable {
            recognizer: recognizer.name().to_string(),
            source,
        }
    })?;
    Ok(utterance_from_transcription(transcription, phonemizer, raw_audio_ref, locale))
}

/// Build an [`Utterance`] from recognizer output.
pub fn utterance_from_transcription(
    transcription: Transcription,
    phonemizer: &Phonemizer,
    raw_audio_ref: &str,
    locale: &Locale,
) -> Utterance {
    let confidence = clamp_confidence(transcription.confidence);

    let hints = transcription.phoneme_hints.filter(|hints| match hints.validate() {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Ignoring malformed phoneme hints: {}", e);
            false
        }
    });

    let (recognized_phonemes, phoneme_source) = match hints {
        Some(hints) => (hints, PhonemeSource::RecognizerHints),
        None => (
            phonemizer.phonemize(&transcription.transcript, locale),
            PhonemeSource::Transcript,
        ),
    };

    log::debug!(
        "Recognized {} phonemes from {:?} (confidence {:.2})",
        recognized_phonemes.len(),
        phoneme_source,
        confidence
    );

    Utterance {
        raw_audio_ref: raw_audio_ref.to_string(),
        transcript: transcription.transcript.trim().to_string(),
        recognized_phonemes,
        confidence,
        phoneme_source,
    }
}

fn clamp_confidence(c: f64) -> f64 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::g2p::PronunciationDictionary;
    use crate::types::Phoneme;

    struct OfflineRecognizer;

    impl Recognizer for OfflineRecognizer {
        fn name(&self) -> &str {
            "offline"
        }

        fn transcribe(&self, _audio: &AudioBuffer, _locale: &Locale) -> Result<Transcription, RecognitionError> {
            Err(RecognitionError::Unavailable("service down".into()))
        }
    }

    fn phonemizer() -> Phonemizer {
        Phonemizer::new().with_dictionary(
            "en",
            PronunciationDictionary::from_cmu_str("CAT  K AE1 T\nSAT  S AE1 T\n"),
        )
    }

    fn audio() -> AudioBuffer {
        AudioBuffer::new(vec![0.0; 160], 16000)
    }

    fn en() -> Locale {
        Locale::default()
    }

    #[test]
    fn test_transcript_strategy() {
        let r = ScriptedRecognizer::new(" cat sat ").with_confidence(0.9);
        let u = extract(&r, &phonemizer(), &audio(), "clip-1", &en()).unwrap();
        assert_eq!(u.transcript, "cat sat");
        assert_eq!(u.phoneme_source, PhonemeSource::Transcript);
        assert_eq!(u.recognized_phonemes.render(), "K AE1 T | S AE1 T");
        assert_eq!(u.raw_audio_ref, "clip-1");
        assert!((u.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hint_strategy() {
        let hints = PhonemeSequence::unsegmented("cat", Phoneme::parse_list("k æ t"));
        let r = ScriptedRecognizer::new("cat").with_hints(hints.clone());
        let u = extract(&r, &phonemizer(), &audio(), "clip", &en()).unwrap();
        assert_eq!(u.phoneme_source, PhonemeSource::RecognizerHints);
        assert_eq!(u.recognized_phonemes, hints);
    }

    #[test]
    fn test_malformed_hints_fall_back_to_transcript() {
        let hints: PhonemeSequence = serde_json::from_str(
            r#"{"phonemes": [{"symbol": "k"}], "words": []}"#,
        )
        .unwrap();
        let r = ScriptedRecognizer::new("cat").with_hints(hints);
        let u = extract(&r, &phonemizer(), &audio(), "clip", &en()).unwrap();
        assert_eq!(u.phoneme_source, PhonemeSource::Transcript);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let p = phonemizer();
        let u = extract(&ScriptedRecognizer::new("cat").with_confidence(1.7), &p, &audio(), "a", &en()).unwrap();
        assert_eq!(u.confidence, 1.0);
        let u = extract(&ScriptedRecognizer::new("cat").with_confidence(f64::NAN), &p, &audio(), "a", &en()).unwrap();
        assert_eq!(u.confidence, 0.0);
    }

    #[test]
    fn test_recognizer_failure_is_typed() {
        let err = extract(&OfflineRecognizer, &phonemizer(), &audio(), "a", &en()).unwrap_err();
        match err {
            AssessError::RecognitionUnavailable { recognizer, .. } => assert_eq!(recognizer, "offline"),
            other => panic!("expected RecognitionUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_transcript_gives_empty_sequence() {
        let u = extract(&ScriptedRecognizer::new(""), &phonemizer(), &audio(), "a", &en()).unwrap();
        assert!(u.recognized_phonemes.is_empty());
    }
}
