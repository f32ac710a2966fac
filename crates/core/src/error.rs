use thiserror::Error;

use crate::language::recognize::RecognitionError;

/// Request-level failures. No report is produced when one of these occurs.
#[derive(Debug, Error)]
pub enum AssessError {
    #[error("audio too short: {voiced_ms} ms of voiced audio, need at least {min_ms} ms")]
    AudioTooShort { voiced_ms: u64, min_ms: u64 },
    #[error("speech recognition unavailable ({recognizer}): {source}")]
    RecognitionUnavailable {
        recognizer: String,
        #[source]
        source: RecognitionError,
    },
    #[error("analysis cancelled")]
    Cancelled,
    #[error("alignment too large: {cells} cells exceeds the limit of {limit}")]
    InputTooLarge { cells: usize, limit: usize },
    #[error("audio processing failed while {context}: {message}")]
    AudioProcessing {
        context: &'static str,
        message: String,
    },
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl AssessError {
    pub(crate) fn audio(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::AudioProcessing {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// True when the failure came from the input audio rather than a
    /// collaborator or the configuration.
    pub fn is_audio_error(&self) -> bool {
        matches!(self, Self::AudioTooShort { .. } | Self::AudioProcessing { .. })
    }
}
