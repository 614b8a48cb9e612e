//! The numeric pipeline.
//!
//! ```text
//!   Spectrum ──► preprocess ──► ConditionedSpectrum
//!                                      │
//!                                      ▼
//!                         FeatureExtractor (+ PeakDetector)
//!                                      │
//!                                      ▼
//!   PrototypeSet ─────────────►  classify ──► Classification
//!        ▲
//!        │  (offline)
//!   PrototypeBuilder ◄── labeled reference spectra
//! ```
//!
//! Every stage is a pure function of its inputs.

pub mod baseline;
pub mod classifier;
pub mod features;
pub mod peaks;
pub mod preprocess;
pub mod prototypes;
pub mod stats;

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::confidence::ConfidencePolicy;
use crate::data::model::{ConditionedSpectrum, FeatureVector, Spectrum};
use crate::error::{Result, SpectrumError};

pub use classifier::{classify, cosine_similarity, Classification};
pub use features::FeatureExtractor;
pub use peaks::{NoPeaks, PeakDetector, ProminencePeaks};
pub use preprocess::preprocess;
pub use prototypes::{build_from_features, BuildOptions, PrototypeBuilder, PrototypeMetadata, PrototypeSet};

/// Result of running the whole online path on one spectrum.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub conditioned: ConditionedSpectrum,
    pub features: FeatureVector,
    /// `None` when no prototypes are available.
    pub classification: Option<Classification>,
    pub confidence: f64,
}

impl Analysis {
    pub fn feature_dim(&self) -> usize {
        self.features.dim()
    }
}

/// Preprocess, extract and, when prototypes are available, classify.
///
/// An empty prototype set is not an error here: the analysis carries no
/// classification and the confidence falls back to a signal heuristic.
pub fn analyze(
    spectrum: &Spectrum,
    config: &PipelineConfig,
    extractor: &FeatureExtractor,
    prototypes: &PrototypeSet,
    policy: &ConfidencePolicy,
) -> Result<Analysis> {
    let conditioned = preprocess(spectrum, &config.preprocess)?;
    let features = extractor.extract(&conditioned)?;

    let classification = match classify(&features, prototypes) {
        Ok(c) => Some(c),
        Err(SpectrumError::EmptyPrototypeSet) => None,
        Err(e) => return Err(e),
    };
    let confidence = match &classification {
        Some(c) => policy.from_similarity(c.best_score),
        None => policy.from_signal(&conditioned.y_processed),
    };

    Ok(Analysis {
        conditioned,
        features,
        classification,
        confidence,
    })
}
