//! Pipeline configuration.
//!
//! Every knob of the preprocessor and the feature extractor lives here so the
//! exact settings used to build a prototype file can be stored next to the
//! prototypes and reused at classification time.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectrumError};

/// Lowest / highest polynomial degree accepted for baseline fitting.
pub const MIN_BASELINE_DEGREE: usize = 1;
pub const MAX_BASELINE_DEGREE: usize = 8;

// ---------------------------------------------------------------------------
// Normalization mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NormalizeMode {
    #[default]
    MinMax,
    ZScore,
    None,
}

impl FromStr for NormalizeMode {
    type Err = SpectrumError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minmax" => Ok(NormalizeMode::MinMax),
            "zscore" => Ok(NormalizeMode::ZScore),
            "none" => Ok(NormalizeMode::None),
            other => Err(SpectrumError::configuration(format!(
                "normalize mode must be one of: minmax, zscore, none (got '{other}')"
            ))),
        }
    }
}

impl TryFrom<String> for NormalizeMode {
    type Error = SpectrumError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<NormalizeMode> for String {
    fn from(mode: NormalizeMode) -> String {
        mode.to_string()
    }
}

impl fmt::Display for NormalizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NormalizeMode::MinMax => "minmax",
            NormalizeMode::ZScore => "zscore",
            NormalizeMode::None => "none",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Duplicate wavenumber policy
// ---------------------------------------------------------------------------

/// What to do with repeated wavenumbers once the spectrum is sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DuplicatePolicy {
    /// Strict mode: duplicates are a validation error.
    #[default]
    Reject,
    /// Lenient mode: duplicates are kept in sorted order.
    Tolerate,
}

impl FromStr for DuplicatePolicy {
    type Err = SpectrumError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" | "strict" => Ok(DuplicatePolicy::Reject),
            "tolerate" | "lenient" => Ok(DuplicatePolicy::Tolerate),
            other => Err(SpectrumError::configuration(format!(
                "duplicate policy must be one of: reject, tolerate (got '{other}')"
            ))),
        }
    }
}

impl TryFrom<String> for DuplicatePolicy {
    type Error = SpectrumError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DuplicatePolicy> for String {
    fn from(policy: DuplicatePolicy) -> String {
        match policy {
            DuplicatePolicy::Reject => "reject".to_string(),
            DuplicatePolicy::Tolerate => "tolerate".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Component configs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Inclusive (low, high) wavenumber window. Ignored when it would leave
    /// fewer than the minimum number of points.
    pub crop: Option<(f64, f64)>,
    /// Moving-average window; raised to at least 3 and to the next odd value.
    pub smooth_window: usize,
    /// Baseline polynomial degree, clamped into [1, 8].
    pub baseline_degree: usize,
    pub normalize: NormalizeMode,
    pub duplicates: DuplicatePolicy,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            crop: Some((700.0, 1800.0)),
            smooth_window: 9,
            baseline_degree: 3,
            normalize: NormalizeMode::MinMax,
            duplicates: DuplicatePolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub max_peaks: usize,
    /// Minimum prominence as a fraction of the signal range.
    pub peak_prominence_ratio: f64,
    /// `false` leaves every peak slot zero.
    pub detect_peaks: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_peaks: 10,
            peak_prominence_ratio: 0.02,
            detect_peaks: true,
        }
    }
}

impl FeatureConfig {
    /// Length of every feature vector produced with this config.
    pub fn feature_dim(&self) -> usize {
        crate::pipeline::features::SCALAR_FEATURES + 3 * self.max_peaks
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub features: FeatureConfig,
}

impl PipelineConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(text)
            .map_err(|e| SpectrumError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_json_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((lo, hi)) = self.preprocess.crop {
            if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                return Err(SpectrumError::configuration(format!(
                    "crop bounds must be finite with low < high (got {lo}, {hi})"
                )));
            }
        }
        if self.preprocess.smooth_window == 0 {
            return Err(SpectrumError::configuration("smooth_window must be positive"));
        }
        if self.features.max_peaks == 0 {
            return Err(SpectrumError::configuration("max_peaks must be at least 1"));
        }
        let ratio = self.features.peak_prominence_ratio;
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(SpectrumError::configuration(format!(
                "peak_prominence_ratio must be finite and non-negative (got {ratio})"
            )));
        }
        Ok(())
    }
}
