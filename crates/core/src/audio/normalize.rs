//! Audio normalization ahead of recognition: DC removal, resampling,
//! optional denoising, silence trimming and voice-activity gating.

use serde::{Deserialize, Serialize};

use crate::audio::analysis::{db_to_amplitude, frame_rms, high_pass, percentile, remove_dc};
use crate::audio::io::resample;
use crate::error::AssessError;
use crate::types::{AudioBuffer, AudioSummary};

const HIGH_PASS_HZ: f64 = 80.0;

/// Options recognized by [`normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub target_sample_rate: u32,
    pub trim_silence: bool,
    pub vad_enabled: bool,
    pub denoise_enabled: bool,
    /// Minimum voiced audio required to proceed
    pub min_voiced_ms: u64,
    /// Frames quieter than this (dBFS) count as silence
    pub silence_threshold_db: f64,
    pub frame_ms: u32,
    /// Unvoiced frames kept after a voiced frame when gating
    pub vad_hangover_frames: usize,
    /// Silence kept on either side of the trimmed region
    pub trim_padding_ms: u32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            trim_silence: true,
            vad_enabled: false,
            denoise_enabled: false,
            min_voiced_ms: 300,
            silence_threshold_db: -40.0,
            frame_ms: 20,
            vad_hangover_frames: 3,
            trim_padding_ms: 50,
        }
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAudio {
    pub audio: AudioBuffer,
    pub voiced_ms: u64,
    pub input_duration_ms: u64,
}

impl NormalizedAudio {
    pub fn summary(&self) -> AudioSummary {
        AudioSummary {
            sample_rate: self.audio.sample_rate,
            input_duration_ms: self.input_duration_ms,
            duration_ms: self.audio.duration_ms(),
            voiced_ms: self.voiced_ms,
        }
    }
}

/// Normalize raw audio for recognition.
///
/// Fails with [`AssessError::AudioTooShort`] when less than
/// `min_voiced_ms` of voiced audio is present.
pub fn normalize(raw: &AudioBuffer, config: &NormalizeConfig) -> Result<NormalizedAudio, AssessError> {
    if raw.sample_rate == 0 {
        return Err(AssessError::invalid_input("audio has a sample rate of 0"));
    }
    if config.target_sample_rate == 0 || config.frame_ms == 0 {
        return Err(AssessError::invalid_config(
            "target_sample_rate and frame_ms must be positive",
        ));
    }
    let input_duration_ms = raw.duration_ms();
    if raw.is_empty() {
        return Err(AssessError::AudioTooShort {
            voiced_ms: 0,
            min_ms: config.min_voiced_ms,
        });
    }

    let sr = config.target_sample_rate;
    let mut samples = remove_dc(&raw.samples);
    if raw.sample_rate != sr {
        log::debug!("Resampling {} Hz -> {} Hz", raw.sample_rate, sr);
        samples = resample(&samples, raw.sample_rate, sr)
            .map_err(|e| AssessError::audio("resampling", e))?;
    }

    let frame_len = ((sr as usize * config.frame_ms as usize) / 1000).max(1);

    if config.denoise_enabled {
        high_pass(&mut samples, sr, HIGH_PASS_HZ);
        noise_gate(&mut samples, frame_len);
    }

    let threshold = db_to_amplitude(config.silence_threshold_db);
    let voiced: Vec<bool> = frame_rms(&samples, frame_len)
        .into_iter()
        .map(|rms| rms >= threshold)
        .collect();

    let voiced_samples: usize = voiced
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v)
        .map(|(i, _)| frame_bounds(i, frame_len, samples.len()).len())
        .sum();
    let voiced_ms = (voiced_samples as u64 * 1000) / sr as u64;

    // Resampling a few samples can leave no frames at all
    if voiced_ms < config.min_voiced_ms || !voiced.contains(&true) {
        return Err(AssessError::AudioTooShort {
            voiced_ms,
            min_ms: config.min_voiced_ms,
        });
    }

    // Frame range kept by trimming, then the per-frame keep mask from VAD.
    let (first, last) = voiced_extent(&voiced);
    let (keep_from, keep_to) = if config.trim_silence {
        let pad = (config.trim_padding_ms / config.frame_ms) as usize;
        (first.saturating_sub(pad), (last + pad).min(voiced.len() - 1))
    } else {
        (0, voiced.len() - 1)
    };

    let keep = if config.vad_enabled {
        vad_mask(&voiced, config.vad_hangover_frames)
    } else {
        vec![true; voiced.len()]
    };

    let mut out = Vec::with_capacity(samples.len());
    for frame in keep_from..=keep_to {
        if keep[frame] {
            out.extend_from_slice(&samples[frame_bounds(frame, frame_len, samples.len())]);
        }
    }

    log::debug!(
        "Normalized audio: {} ms in, {} ms out, {} ms voiced",
        input_duration_ms,
        (out.len() as u64 * 1000) / sr as u64,
        voiced_ms
    );

    Ok(NormalizedAudio {
        audio: AudioBuffer::new(out, sr),
        voiced_ms,
        input_duration_ms,
    })
}

fn frame_bounds(frame: usize, frame_len: usize, total: usize) -> std::ops::Range<usize> {
    let start = frame * frame_len;
    start..(start + frame_len).min(total)
}

/// Indices of the first and last voiced frames. Caller guarantees at least
/// one voiced frame.
fn voiced_extent(voiced: &[bool]) -> (usize, usize) {
    let first = voiced.iter().position(|&v| v).unwrap_or(0);
    let last = voiced.iter().rposition(|&v| v).unwrap_or(voiced.len() - 1);
    (first, last)
}

/// Voiced frames plus `hangover` frames after each voiced run.
fn vad_mask(voiced: &[bool], hangover: usize) -> Vec<bool> {
    let mut mask = Vec::with_capacity(voiced.len());
    let mut remaining = 0usize;
    for &v in voiced {
        if v {
            remaining = hangover;
            mask.push(true);
        } else if remaining > 0 {
            remaining -= 1;
            mask.push(true);
        } else {
            mask.push(false);
        }
    }
    mask
}

/// Silence frames whose RMS is below twice the estimated noise floor.
///
/// The floor is the 10th-percentile frame RMS. Signals without a clear gap
/// between floor and peak (steady tones, all-noise input) are left alone.
fn noise_gate(samples: &mut [f64], frame_len: usize) {
    let rms = frame_rms(samples, frame_len);
    let floor = percentile(&rms, 0.1);
    let peak = rms.iter().copied().fold(0.0f64, f64::max);
    let gate = floor * 2.0;
    if gate <= 0.0 || gate >= peak * 0.5 {
        return;
    }

    for (i, &level) in rms.iter().enumerate() {
        if level < gate {
            let range = frame_bounds(i, frame_len, samples.len());
            samples[range].iter_mut().for_each(|s| *s = 0.0);
        }
    }
}
