//! Audio I/O: WAV read/write, compressed-format decoding, resampling.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

use crate::types::AudioBuffer;

/// Read a WAV file into a mono buffer.
///
/// - Normalizes int16/int32 to f64 in [-1, 1]
/// - Passes through float WAVs as f64
/// - Averages channels if stereo/multi-channel
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to read WAV samples")?
        }
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| v as f64))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read WAV samples")?,
    };

    Ok(AudioBuffer::new(downmix(&interleaved, channels), spec.sample_rate))
}

/// Write a buffer to a 16-bit PCM mono WAV file.
///
/// Clips values to [-1, 1] before conversion.
/// Creates parent directories if needed.
pub fn write_wav(path: &Path, audio: &AudioBuffer) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    for &sample in &audio.samples {
        let clipped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clipped * 32767.0) as i16)?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

/// Load any supported audio file as a mono buffer at its native rate.
///
/// WAV goes through hound; everything else through symphonia.
pub fn load_audio(path: &Path) -> Result<AudioBuffer> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);
    if is_wav {
        read_wav(path)
    } else {
        decode_audio(path)
    }
}

/// Decode WAV, MP3 or MP4/AAC audio with symphonia, averaging channels.
pub fn decode_audio(input_path: &Path) -> Result<AudioBuffer> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
    use symphonia::core::errors::Error as SymphError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(input_path)
        .with_context(|| format!("Failed to open: {}", input_path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = input_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Unsupported format: {}", input_path.display()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio track found")?;

    let track_id = track.id;
    let source_sr = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Unsupported codec")?;

    let mut all_samples: Vec<f64> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut sample_buf = SampleBuffer::<f64>::new(decoded.frames() as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                all_samples.extend(downmix(sample_buf.samples(), channels));
            }
            Err(SymphError::DecodeError(e)) => {
                log::debug!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if all_samples.is_empty() {
        anyhow::bail!("No audio decoded from {}", input_path.display());
    }

    Ok(AudioBuffer::new(all_samples, source_sr))
}

/// Average interleaved frames down to one channel.
fn downmix(interleaved: &[f64], channels: usize) -> Vec<f64> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64)
        .collect()
}

/// Resample audio from source sample rate to target sample rate.
///
/// Uses rubato for high-quality resampling.
pub fn resample(samples: &[f64], from_sr: u32, to_sr: u32) -> Result<Vec<f64>> {
    if from_sr == to_sr {
        return Ok(samples.to_vec());
    }

    if samples.is_empty() {
        return Ok(vec![]);
    }

    use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_sr as f64 / from_sr as f64;
    let mut resampler = SincFixedIn::<f64>::new(
        ratio,
        2.0,
        params,
        samples.len(),
        1, // mono
    )?;

    let input = vec![samples.to_vec()];
    let output = resampler.process(&input, None)?;

    Ok(output.into_iter().next().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(n: usize, sr: u32) -> Vec<f64> {
        (0..n)
            .map(|i| (i as f64 / sr as f64 * 440.0 * std::f64::consts::TAU).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.wav");
        let audio = AudioBuffer::new(sine(1000, 16000), 16000);
        write_wav(&path, &audio).unwrap();

        let read = read_wav(&path).unwrap();
        assert_eq!(read.sample_rate, 16000);
        assert_eq!(read.samples.len(), audio.samples.len());

        // 16-bit quantization introduces small error
        for (a, b) in audio.samples.iter().zip(read.samples.iter()) {
            assert!((a - b).abs() < 0.001, "sample mismatch: {} vs {}", a, b);
        }
    }

    #[test]
    fn test_write_clips_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clipping.wav");
        write_wav(&path, &AudioBuffer::new(vec![-2.0, -1.0, 0.0, 1.0, 2.0], 16000)).unwrap();

        let read = read_wav(&path).unwrap();
        assert!(read.samples[0] >= -1.0 && read.samples[0] <= -0.99);
        assert!(read.samples[4] >= 0.99 && read.samples[4] <= 1.0);
    }

    #[test]
    fn test_read_stereo_downmixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16384i16).unwrap(); // left
            writer.write_sample(0i16).unwrap(); // right
        }
        writer.finalize().unwrap();

        let read = read_wav(&path).unwrap();
        assert_eq!(read.sample_rate, 8000);
        assert_eq!(read.samples.len(), 100);
        assert!((read.samples[0] - 0.25).abs() < 0.001);
    }

    #[test]
    fn test_load_audio_dispatches_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.WAV");
        write_wav(&path, &AudioBuffer::new(sine(1600, 16000), 16000)).unwrap();
        let audio = load_audio(&path).unwrap();
        assert_eq!(audio.samples.len(), 1600);
    }

    #[test]
    fn test_decode_audio_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decode.wav");
        write_wav(&path, &AudioBuffer::new(sine(16000, 16000), 16000)).unwrap();
        let audio = decode_audio(&path).unwrap();
        assert_eq!(audio.sample_rate, 16000);
        assert!(audio.samples.len() >= 15000 && audio.samples.len() <= 16000,
            "Expected ~16000 samples, got {}", audio.samples.len());
    }

    #[test]
    fn test_downmix() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[1.0, 2.0], 1), vec![1.0, 2.0]);
    }

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![1.0, 2.0, 3.0];
        assert_eq!(resample(&samples, 16000, 16000).unwrap(), samples);
    }

    #[test]
    fn test_resample_upsample() {
        let samples: Vec<f64> = (0..4000).map(|i| (i as f64 / 4000.0 * std::f64::consts::TAU).sin()).collect();
        let result = resample(&samples, 8000, 16000).unwrap();
        // Sinc resampler loses samples at edges due to filter length; allow wide tolerance
        assert!(result.len() >= 7000 && result.len() <= 8500,
            "Expected ~8000 samples, got {}", result.len());
    }

    #[test]
    fn test_resample_empty() {
        assert!(resample(&[], 16000, 8000).unwrap().is_empty());
    }
}
