//! Offline prototype construction.
//!
//! One prototype per label: the arithmetic mean of the label's raw feature
//! vectors, L2-normalized once after averaging.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::data::model::{FeatureVector, LabeledSpectrum};
use crate::error::{Result, SpectrumError};

use super::features::FeatureExtractor;
use super::preprocess::preprocess;

/// Guard added to vector norms before dividing.
pub const NORM_EPS: f64 = 1e-12;

/// `v / (‖v‖ + eps)`; an all-zero vector stays all zero.
pub fn l2_normalize(v: &[f64]) -> Vec<f64> {
    let norm = l2_norm(v);
    v.iter().map(|x| x / (norm + NORM_EPS)).collect()
}

/// Euclidean norm, scaled by the largest magnitude so that squaring cannot
/// overflow or underflow.
pub fn l2_norm(v: &[f64]) -> f64 {
    let scale = v.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return scale;
    }
    scale * v.iter().map(|x| (x / scale).powi(2)).sum::<f64>().sqrt()
}

// ---------------------------------------------------------------------------
// PrototypeSet
// ---------------------------------------------------------------------------

/// Label → prototype vector, every vector of the same dimension.
///
/// Immutable once built; share it behind an `Arc` and replace it wholesale.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrototypeSet {
    dim: usize,
    prototypes: BTreeMap<String, Vec<f64>>,
}

impl PrototypeSet {
    /// Validate that all vectors share one dimension. An empty map gives an
    /// empty set with dimension 0.
    pub fn new(prototypes: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        let dim = prototypes.values().next().map_or(0, Vec::len);
        if let Some(bad) = prototypes.values().find(|v| v.len() != dim) {
            return Err(SpectrumError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }
        Ok(PrototypeSet { dim, prototypes })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&[f64]> {
        self.prototypes.get(label).map(Vec::as_slice)
    }

    /// Labels in ascending order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.prototypes.keys().map(String::as_str)
    }

    /// (label, vector) pairs in ascending label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.prototypes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.prototypes
    }
}

// ---------------------------------------------------------------------------
// Build metadata
// ---------------------------------------------------------------------------

/// Facts about a build, persisted next to the prototypes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PrototypeMetadata {
    pub labels: Vec<String>,
    pub feature_dim: usize,
    pub num_samples: usize,
    #[serde(default)]
    pub samples_per_label: BTreeMap<String, usize>,
    #[serde(default)]
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildOptions {
    /// Use at most this many samples, in dataset order.
    pub max_samples: Option<usize>,
    /// Log and skip samples that fail preprocessing or extraction instead of
    /// aborting the build.
    pub skip_invalid: bool,
}

// ---------------------------------------------------------------------------
// PrototypeBuilder
// ---------------------------------------------------------------------------

pub struct PrototypeBuilder<'a> {
    config: &'a PipelineConfig,
    extractor: &'a FeatureExtractor,
    options: BuildOptions,
}

impl<'a> PrototypeBuilder<'a> {
    pub fn new(config: &'a PipelineConfig, extractor: &'a FeatureExtractor) -> Self {
        PrototypeBuilder {
            config,
            extractor,
            options: BuildOptions::default(),
        }
    }

    pub fn options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Preprocess and featurize every sample, then aggregate per label.
    pub fn build(&self, dataset: &[LabeledSpectrum]) -> Result<(PrototypeSet, PrototypeMetadata)> {
        let cap = self.options.max_samples.unwrap_or(dataset.len());
        let mut features = Vec::with_capacity(cap.min(dataset.len()));
        let mut skipped = 0;

        for (i, sample) in dataset.iter().take(cap).enumerate() {
            let result = preprocess(&sample.spectrum, &self.config.preprocess)
                .and_then(|conditioned| self.extractor.extract(&conditioned));
            match result {
                Ok(v) => features.push((sample.label.clone(), v)),
                Err(e) if self.options.skip_invalid => {
                    log::warn!("Skipping sample {i} (label {}): {e}", sample.label);
                    skipped += 1;
                }
                Err(e) => {
                    return Err(match e {
                        SpectrumError::Validation(msg) => {
                            SpectrumError::Validation(format!("sample {i}: {msg}"))
                        }
                        other => other,
                    })
                }
            }
        }

        let (set, mut meta) = build_from_features(features)?;
        meta.skipped = skipped;
        log::info!(
            "Built {} prototypes (dim {}) from {} samples, {} skipped",
            set.len(),
            set.dim(),
            meta.num_samples,
            skipped
        );
        Ok((set, meta))
    }
}

/// Aggregate labeled raw feature vectors into one prototype per label.
pub fn build_from_features<I>(features: I) -> Result<(PrototypeSet, PrototypeMetadata)>
where
    I: IntoIterator<Item = (String, FeatureVector)>,
{
    let mut sums: BTreeMap<String, (Vec<f64>, usize)> = BTreeMap::new();
    let mut dim: Option<usize> = None;
    let mut num_samples = 0;

    for (label, vector) in features {
        let expected = *dim.get_or_insert(vector.dim());
        if vector.dim() != expected {
            return Err(SpectrumError::DimensionMismatch {
                expected,
                actual: vector.dim(),
            });
        }
        let (sum, count) = sums
            .entry(label)
            .or_insert_with(|| (vec![0.0; expected], 0));
        for (s, v) in sum.iter_mut().zip(vector.as_slice()) {
            *s += v;
        }
        *count += 1;
        num_samples += 1;
    }

    let Some(feature_dim) = dim else {
        return Err(SpectrumError::validation(
            "no feature vectors were produced from the reference dataset",
        ));
    };

    let samples_per_label: BTreeMap<String, usize> =
        sums.iter().map(|(k, (_, n))| (k.clone(), *n)).collect();
    let prototypes: BTreeMap<String, Vec<f64>> = sums
        .into_iter()
        .map(|(label, (sum, n))| {
            let mean: Vec<f64> = sum.iter().map(|s| s / n as f64).collect();
            (label, l2_normalize(&mean))
        })
        .collect();

    let meta = PrototypeMetadata {
        labels: prototypes.keys().cloned().collect(),
        feature_dim,
        num_samples,
        samples_per_label,
        skipped: 0,
    };
    Ok((PrototypeSet::new(prototypes)?, meta))
}
