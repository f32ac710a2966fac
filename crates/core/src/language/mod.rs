pub mod g2p;
pub mod phoneme_table;
pub mod phonemizer;
pub mod recognize;
#[cfg(feature = "whisper-native")]
pub mod transcribe;

pub use phonemizer::{Phonemizer, WordPronunciation};
pub use recognize::{Recognizer, ScriptedRecognizer, Transcription};
