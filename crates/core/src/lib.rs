//! Pronunciation assessment: align a learner's spoken phonemes against a
//! reference text and report per-word scores, error types and drill words.

pub mod assess;
pub mod audio;
pub mod config;
pub mod error;
pub mod feedback;
pub mod language;
pub mod types;

pub use assess::{AssessmentRequest, Assessor, CancellationToken, PronunciationReport};
pub use config::AssessmentConfig;
pub use error::AssessError;
