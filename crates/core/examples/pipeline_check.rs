//! Diagnostic: run the assessment pipeline on synthetic audio.
//!
//! Run with: cargo run -p phonoscore-core --example pipeline_check

use std::sync::Arc;

use phonoscore_core::feedback::{FeedbackGenerator, SummaryFeedback};
use phonoscore_core::language::g2p::PronunciationDictionary;
use phonoscore_core::language::recognize::ScriptedRecognizer;
use phonoscore_core::types::AudioBuffer;
use phonoscore_core::{AssessmentConfig, AssessmentRequest, Assessor};

const DICT: &str = "THE  DH AH0\nTHREE  TH R IY1\nTREES  T R IY1 Z\n";

fn main() {
    println!("=== Phonoscore Pipeline Diagnostic ===\n");

    // 1. Synthetic "speech": 1.2s of 200 Hz tone with silence either side
    println!("1. Generating 1.2s tone at 16000 Hz...");
    let sr = 16000u32;
    let mut samples = vec![0.0; 4000];
    samples.extend((0..(sr as usize * 12 / 10)).map(|i| {
        (2.0 * std::f64::consts::PI * 200.0 * i as f64 / sr as f64).sin() * 0.5
    }));
    samples.extend(vec![0.0; 4000]);
    let audio = AudioBuffer::new(samples, sr);
    println!("   OK: {} ms of audio", audio.duration_ms());

    // 2. Build the assessor with a scripted recognizer
    println!("2. Building assessor...");
    let config = AssessmentConfig::default();
    let phonemizer =
        Assessor::build_phonemizer(&config, Some(PronunciationDictionary::from_cmu_str(DICT)));
    let recognizer = ScriptedRecognizer::new("the tree trees").with_confidence(0.8);
    let assessor = match Assessor::new(config, Arc::new(phonemizer), Arc::new(recognizer)) {
        Ok(a) => {
            println!("   OK: config valid");
            a
        }
        Err(e) => {
            eprintln!("   FAIL: {}", e);
            std::process::exit(1);
        }
    };

    // 3. Assess
    println!("3. Assessing \"the three trees\"...");
    let request = AssessmentRequest::new("the three trees", audio);
    let report = match assessor.assess(&request, None) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("   FAIL: {}", e);
            std::process::exit(1);
        }
    };
    println!(
        "   OK: {} ms voiced, score {:.3}",
        report.audio().voiced_ms,
        report.overall_score()
    );

    // 4. Feedback
    println!("4. Feedback:\n");
    match SummaryFeedback.generate_feedback(&report) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("   FAIL: {}", e),
    }

    println!("=== Pipeline diagnostic complete ===");
    println!("Report digest: {}", report.digest());
}
