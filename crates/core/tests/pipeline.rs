//! End-to-end assessment pipeline tests.
//!
//! Run with: `cargo test -p phonoscore-core --test pipeline`

use std::sync::Arc;

use phonoscore_core::assess::align::AlignmentOp;
use phonoscore_core::audio::io::{load_audio, write_wav};
use phonoscore_core::language::g2p::PronunciationDictionary;
use phonoscore_core::language::recognize::{
    RecognitionError, Recognizer, ScriptedRecognizer, Transcription,
};
use phonoscore_core::types::{
    AudioBuffer, ErrorKind, Locale, Phoneme, PhonemeSequence, PhonemeSource, PracticeSession,
    Warning, WordFlag,
};
use phonoscore_core::{AssessError, AssessmentConfig, AssessmentRequest, Assessor};

const DICT: &str = ";;; test dictionary
CAT  K AE1 T
SAT  S AE1 T
THE  DH AH0
ON  AA1 N
MAT  M AE1 T
";

fn tone(seconds: f64, sample_rate: u32) -> AudioBuffer {
    let n = (seconds * sample_rate as f64) as usize;
    let samples = (0..n)
        .map(|i| 0.4 * (2.0 * std::f64::consts::PI * 180.0 * i as f64 / sample_rate as f64).sin())
        .collect();
    AudioBuffer::new(samples, sample_rate)
}

fn assessor_with(recognizer: impl Recognizer + 'static) -> Assessor {
    let config = AssessmentConfig::default();
    let phonemizer =
        Assessor::build_phonemizer(&config, Some(PronunciationDictionary::from_cmu_str(DICT)));
    Assessor::new(config, Arc::new(phonemizer), Arc::new(recognizer)).unwrap()
}

struct OfflineRecognizer;

impl Recognizer for OfflineRecognizer {
    fn name(&self) -> &str {
        "offline"
    }

    fn transcribe(&self, _audio: &AudioBuffer, _locale: &Locale) -> Result<Transcription, RecognitionError> {
        Err(RecognitionError::Unavailable("connection refused".into()))
    }
}

#[test]
fn test_cat_sat_with_ipa_hints() {
    let hints = PhonemeSequence::unsegmented("cat set", Phoneme::parse_list("k æ t s ɛ t"));
    let assessor = assessor_with(ScriptedRecognizer::new("cat set").with_hints(hints));

    let report = assessor
        .assess(&AssessmentRequest::new("cat sat", tone(1.0, 16000)), None)
        .unwrap();

    assert_eq!(report.utterance().phoneme_source, PhonemeSource::RecognizerHints);
    assert_eq!(report.reference_phonemes().render(), "K AE1 T | S AE1 T");

    let errors: Vec<&AlignmentOp> = report.alignment().ops.iter().filter(|op| !op.is_match()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].reference_index(), Some(4));
    assert_eq!(errors[0].recognized_index(), Some(4));
    assert!((errors[0].cost() - 0.5).abs() < 1e-9);

    let words = report.word_scores();
    assert_eq!(words[0].score, 1.0);
    assert!((words[1].score - 0.8333).abs() < 1e-3);
    assert!(words[1].error_types.contains(&ErrorKind::WrongVowel));
    assert!((report.overall_score() - 0.9167).abs() < 1e-3);
    assert!(report.alignment().is_valid_for(6, 6));
}

#[test]
fn test_perfect_reading_scores_one() {
    let assessor = assessor_with(ScriptedRecognizer::new("The cat sat on the mat."));
    let report = assessor
        .assess(
            &AssessmentRequest::new("The cat sat on the mat.", tone(1.5, 16000)),
            None,
        )
        .unwrap();
    assert_eq!(report.overall_score(), 1.0);
    assert_eq!(report.alignment().total_cost, 0.0);
    assert!(report.drill_words().is_empty());
    assert!(report.warnings().is_empty());
}

#[test]
fn test_empty_audio_is_too_short() {
    let assessor = assessor_with(ScriptedRecognizer::new("cat"));
    let err = assessor
        .assess(&AssessmentRequest::new("cat", AudioBuffer::new(vec![], 16000)), None)
        .unwrap_err();
    assert!(matches!(err, AssessError::AudioTooShort { .. }));
}

#[test]
fn test_short_blip_is_too_short() {
    let assessor = assessor_with(ScriptedRecognizer::new("cat"));
    let mut samples = vec![0.0; 16000];
    samples.extend(tone(0.1, 16000).samples);
    samples.extend(vec![0.0; 16000]);
    let err = assessor
        .assess(&AssessmentRequest::new("cat", AudioBuffer::new(samples, 16000)), None)
        .unwrap_err();
    match err {
        AssessError::AudioTooShort { voiced_ms, min_ms } => {
            assert!(voiced_ms < min_ms);
            assert_eq!(min_ms, 300);
        }
        other => panic!("expected AudioTooShort, got {:?}", other),
    }
}

#[test]
fn test_low_confidence_is_a_warning() {
    let assessor = assessor_with(ScriptedRecognizer::new("cat sat").with_confidence(0.1));
    let report = assessor
        .assess(&AssessmentRequest::new("cat sat", tone(1.0, 16000)), None)
        .unwrap();
    assert_eq!(report.overall_score(), 1.0);
    assert!(report.warnings().iter().any(|w| matches!(
        w,
        Warning::LowConfidence { confidence, threshold }
            if (*confidence - 0.1).abs() < 1e-9 && (*threshold - 0.3).abs() < 1e-9
    )));
    assert!(report
        .word_scores()
        .iter()
        .all(|w| w.has_flag(WordFlag::LowConfidence)));
}

#[test]
fn test_recognizer_outage_is_fatal() {
    let assessor = assessor_with(OfflineRecognizer);
    let err = assessor
        .assess(&AssessmentRequest::new("cat", tone(1.0, 16000)), None)
        .unwrap_err();
    assert!(matches!(err, AssessError::RecognitionUnavailable { .. }));
    assert!(err.to_string().contains("offline"));
}

#[test]
fn test_nothing_recognized_scores_zero() {
    let assessor = assessor_with(ScriptedRecognizer::new(""));
    let report = assessor
        .assess(&AssessmentRequest::new("cat sat", tone(1.0, 16000)), None)
        .unwrap();
    assert_eq!(report.overall_score(), 0.0);
    assert!(report
        .alignment()
        .ops
        .iter()
        .all(|op| matches!(op, AlignmentOp::Deletion { .. })));
}

#[test]
fn test_wav_file_at_other_sample_rate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("attempt.wav");
    write_wav(&path, &tone(1.0, 22050)).unwrap();

    let audio = load_audio(&path).unwrap();
    assert_eq!(audio.sample_rate, 22050);

    let assessor = assessor_with(ScriptedRecognizer::new("cat"));
    let report = assessor.assess(&AssessmentRequest::new("cat", audio), None).unwrap();
    assert_eq!(report.audio().sample_rate, 16000);
    assert!(report.audio().voiced_ms >= 800);
}

#[test]
fn test_history_round_trip() {
    let assessor = assessor_with(ScriptedRecognizer::new("cat set"));
    let request = AssessmentRequest::new("cat sat", tone(1.0, 16000));
    let first = assessor.assess(&request, None).unwrap();

    let mut history = PracticeSession::new();
    history.record(&first);
    assert_eq!(history.error_count("sat"), 1);
    assert_eq!(history.error_count("cat"), 0);

    let second = assessor.assess(&request.with_history(history), None).unwrap();
    assert_eq!(second.drill_words()[0].word, "sat");
    assert_eq!(second.drill_words()[0].history_count, 1);
}

#[test]
fn test_deterministic_and_thread_safe() {
    let assessor = Arc::new(assessor_with(ScriptedRecognizer::new("the cat set on a mat")));
    let request = Arc::new(AssessmentRequest::new("The cat sat on the mat", tone(1.0, 16000)));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let assessor = Arc::clone(&assessor);
            let request = Arc::clone(&request);
            std::thread::spawn(move || assessor.assess(&request, None).unwrap().digest())
        })
        .collect();
    let digests: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(digests.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_placeholder_extras_not_charged_to_previous_word() {
    let assessor = assessor_with(ScriptedRecognizer::new("cat bob"));
    let report = assessor
        .assess(&AssessmentRequest::new("cat 123", tone(1.0, 16000)), None)
        .unwrap();

    let words = report.word_scores();
    assert_eq!(words[0].word, "cat");
    assert_eq!(words[0].score, 1.0);
    assert!(words[0].error_types.is_empty());
    assert_eq!(words[0].phoneme_error_count, 0);
    assert!(words[1].has_flag(WordFlag::UnknownWordFallback));
    assert!(report.drill_words().iter().all(|d| d.word != "cat"));
    assert!(report.warnings().iter().any(|w| matches!(w, Warning::UnknownWord { word_index: 1, .. })));
}
