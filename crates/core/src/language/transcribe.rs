//! Whisper speech recognition.
//!
//! Uses native whisper-rs bindings with automatic model download. Only
//! compiled with the `whisper-native` feature.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::language::recognize::{RecognitionError, Recognizer, Transcription};
use crate::types::{AudioBuffer, Locale};

const WHISPER_SAMPLE_RATE: u32 = 16000;

const HF_MODEL_BASE: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Recognizer backed by a local whisper.cpp GGML model.
pub struct WhisperRecognizer {
    model_name: String,
    ctx: WhisperContext,
}

impl WhisperRecognizer {
    /// Load a model by name ("base", "small.en", ...), downloading it into
    /// the cache directory on first use.
    pub fn load(model_name: &str, model_dir: Option<&Path>) -> Result<Self> {
        let model_path = find_model(model_name, model_dir)?;
        let path_str = model_path
            .to_str()
            .with_context(|| format!("Model path is not valid UTF-8: {}", model_path.display()))?;
        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .context("Failed to load whisper model")?;
        log::info!("Loaded whisper model '{}'", model_name);
        Ok(Self {
            model_name: model_name.to_string(),
            ctx,
        })
    }
}

impl Recognizer for WhisperRecognizer {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn transcribe(&self, audio: &AudioBuffer, locale: &Locale) -> Result<Transcription, RecognitionError> {
        let samples = if audio.sample_rate != WHISPER_SAMPLE_RATE {
            crate::audio::io::resample(&audio.samples, audio.sample_rate, WHISPER_SAMPLE_RATE)
                .map_err(|e| RecognitionError::Failed(format!("{:#}", e)))?
        } else {
            audio.samples.clone()
        };
        let samples_f32: Vec<f32> = samples.iter().map(|&s| s as f32).collect();

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(locale.language()));
        params.set_print_progress(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| RecognitionError::Unavailable(format!("Failed to create whisper state: {}", e)))?;
        state
            .full(params, &samples_f32)
            .map_err(|e| RecognitionError::Failed(format!("Whisper inference failed: {}", e)))?;

        let failed = |e: whisper_rs::WhisperError| RecognitionError::Failed(e.to_string());
        let n_segments = state.full_n_segments().map_err(failed)?;
        let mut text_parts = Vec::new();
        let mut probabilities = Vec::new();

        for i in 0..n_segments {
            let segment_text = state.full_get_segment_text(i).map_err(failed)?;
            text_parts.push(segment_text.trim().to_string());

            let n_tokens = state.full_n_tokens(i).map_err(failed)?;
            for j in 0..n_tokens {
                let token_text = state.full_get_token_text(i, j).map_err(failed)?;
                let trimmed = token_text.trim();
                // Skip special tokens
                if trimmed.is_empty() || (trimmed.starts_with('[') && trimmed.ends_with(']')) {
                    continue;
                }
                let token_data = state.full_get_token_data(i, j).map_err(failed)?;
                probabilities.push(token_data.p as f64);
            }
        }

        Ok(Transcription {
            transcript: text_parts.join(" ").trim().to_string(),
            phoneme_hints: None,
            confidence: mean_probability(&probabilities),
        })
    }
}

/// Mean token probability; 0 when no tokens were produced.
fn mean_probability(probabilities: &[f64]) -> f64 {
    if probabilities.is_empty() {
        return 0.0;
    }
    probabilities.iter().sum::<f64>() / probabilities.len() as f64
}

/// Construct the download URL for a whisper GGML model.
fn model_download_url(model_name: &str) -> String {
    format!("{}/ggml-{}.bin", HF_MODEL_BASE, model_name)
}

/// Find a whisper model file, downloading if necessary.
fn find_model(model_name: &str, model_dir: Option<&Path>) -> Result<PathBuf> {
    let filename = format!("ggml-{}.bin", model_name);

    if let Some(dir) = model_dir {
        let path = dir.join(&filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let cache_dir = cache_dir().join("phonoscore").join("models");
    let path = cache_dir.join(&filename);
    if path.exists() {
        return Ok(path);
    }

    log::info!("Whisper model '{}' not found locally, downloading...", model_name);
    download_model(model_name, &cache_dir)
}

/// Download a whisper GGML model from Hugging Face.
fn download_model(model_name: &str, dest_dir: &Path) -> Result<PathBuf> {
    use std::io::{Read, Write};

    let url = model_download_url(model_name);
    let dest_path = dest_dir.join(format!("ggml-{}.bin", model_name));

    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create model directory: {}", dest_dir.display()))?;

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(1800))
        .build()
        .context("Failed to build HTTP client")?;

    log::info!("Downloading {} ...", url);
    let mut response = client.get(&url).send().context("Failed to download model")?;
    if !response.status().is_success() {
        bail!("Download failed: HTTP {} for {}", response.status(), url);
    }

    let total_size = response.content_length();
    if let Some(size) = total_size {
        log::info!("Model size: {:.1} MB", size as f64 / 1_048_576.0);
    }

    // Temp file in the same directory so the final rename is atomic
    let mut tmp_file =
        tempfile::NamedTempFile::new_in(dest_dir).context("Failed to create temp file")?;

    let mut downloaded: u64 = 0;
    let mut buf = [0u8; 64 * 1024];
    let mut last_log_pct = 0u64;
    loop {
        let n = response.read(&mut buf).context("Error reading download")?;
        if n == 0 {
            break;
        }
        tmp_file.write_all(&buf[..n]).context("Error writing model")?;
        downloaded += n as u64;

        if let Some(total) = total_size.filter(|&t| t > 0) {
            let pct = downloaded * 100 / total;
            if pct >= last_log_pct + 10 {
                log::info!("Download progress: {}%", pct);
                last_log_pct = pct;
            }
        }
    }

    if let Some(expected) = total_size {
        if downloaded != expected {
            bail!("Incomplete download: got {} bytes, expected {}", downloaded, expected);
        }
    }

    tmp_file
        .persist(&dest_path)
        .map_err(|e| anyhow::anyhow!("Failed to save model to {}: {}", dest_path.display(), e))?;

    log::info!("Model saved to {}", dest_path.display());
    Ok(dest_path)
}

fn cache_dir() -> PathBuf {
    std::env::var("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            std::env::var("HOME")
                .map(|h| PathBuf::from(h).join(".cache"))
                .unwrap_or_else(|_| std::env::temp_dir())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_download_url() {
        assert_eq!(
            model_download_url("base"),
            "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.bin"
        );
    }

    #[test]
    fn test_find_model_prefers_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("ggml-tiny.bin");
        std::fs::write(&model_path, b"fake model data").unwrap();

        let found = find_model("tiny", Some(dir.path())).unwrap();
        assert_eq!(found, model_path);
    }

    #[test]
    fn test_mean_probability() {
        assert_eq!(mean_probability(&[]), 0.0);
        assert!((mean_probability(&[0.5, 1.0]) - 0.75).abs() < 1e-12);
    }
}
