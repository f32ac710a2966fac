//! Audio analysis: RMS energy, frame energy, noise floor estimation and
//! simple filters used by the normalizer.

/// Compute RMS energy of the entire signal.
pub fn compute_rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// RMS of consecutive non-overlapping frames. The last frame may be short.
pub fn frame_rms(samples: &[f64], frame_len: usize) -> Vec<f64> {
    if frame_len == 0 {
        return vec![];
    }
    samples.chunks(frame_len).map(compute_rms).collect()
}

/// Value at quantile `q` (0..=1) of `values`, or 0 for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let idx = ((sorted.len() - 1) as f64 * q.clamp(0.0, 1.0)).round() as usize;
    sorted[idx]
}

pub fn db_to_amplitude(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Subtract the mean so silence sits at zero.
pub fn remove_dc(samples: &[f64]) -> Vec<f64> {
    if samples.is_empty() {
        return vec![];
    }
    let mean: f64 = samples.iter().sum::<f64>() / samples.len() as f64;
    samples.iter().map(|s| s - mean).collect()
}

/// First-order high-pass filter, in place.
pub fn high_pass(samples: &mut [f64], sr: u32, cutoff_hz: f64) {
    if samples.is_empty() || sr == 0 || cutoff_hz <= 0.0 {
        return;
    }
    let rc = 1.0 / (std::f64::consts::TAU * cutoff_hz);
    let dt = 1.0 / sr as f64;
    let alpha = rc / (rc + dt);

    let mut prev_in = samples[0];
    let mut prev_out = 0.0;
    samples[0] = 0.0;
    for s in samples.iter_mut().skip(1) {
        let x = *s;
        let y = alpha * (prev_out + x - prev_in);
        *s = y;
        prev_in = x;
        prev_out = y;
    }
}
