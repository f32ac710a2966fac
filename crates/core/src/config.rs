//! Per-assessor configuration.
//!
//! All keys are optional and flat in JSON; nested option groups are
//! flattened so `{"lenient_stress": true, "max_drill_words": 3}` is a valid
//! config file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::assess::align::CostModel;
use crate::assess::drill::DrillConfig;
use crate::audio::NormalizeConfig;
use crate::error::AssessError;
use crate::types::Locale;

/// Languages with a phoneme taxonomy.
const SUPPORTED_LANGUAGES: &[&str] = &["en"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentConfig {
    pub locale: Locale,
    /// Recognizer confidence below this adds a low-confidence warning
    pub confidence_threshold: f64,
    #[serde(flatten)]
    pub audio: NormalizeConfig,
    #[serde(flatten)]
    pub costs: CostModel,
    #[serde(flatten)]
    pub drills: DrillConfig,
    /// G2P model attempts per out-of-vocabulary word
    pub g2p_attempts: usize,
    /// Bound on cached word pronunciations; `None` is unbounded
    pub cache_capacity: Option<usize>,
    /// Largest alignment matrix accepted, in cells
    pub max_alignment_cells: usize,
    /// Phonemize the reference while the recognizer runs
    pub parallel_phonemize: bool,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            confidence_threshold: 0.3,
            audio: NormalizeConfig::default(),
            costs: CostModel::default(),
            drills: DrillConfig::default(),
            g2p_attempts: 2,
            cache_capacity: None,
            max_alignment_cells: 4_000_000,
            parallel_phonemize: true,
        }
    }
}

impl AssessmentConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse config JSON")?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = Self::from_json_str(&data)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AssessError> {
        if !SUPPORTED_LANGUAGES.contains(&self.locale.language()) {
            return Err(AssessError::invalid_config(format!(
                "unsupported locale '{}'",
                self.locale
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AssessError::invalid_config(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.audio.target_sample_rate == 0 || self.audio.frame_ms == 0 {
            return Err(AssessError::invalid_config(
                "target_sample_rate and frame_ms must be positive",
            ));
        }
        if self.g2p_attempts == 0 {
            return Err(AssessError::invalid_config("g2p_attempts must be at least 1"));
        }
        self.costs.validate()?;
        self.drills.validate()?;
        Ok(())
    }
}
