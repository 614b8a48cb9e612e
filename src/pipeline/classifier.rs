//! Online nearest-prototype classification by cosine similarity.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::model::FeatureVector;
use crate::error::{Result, SpectrumError};

use super::prototypes::{l2_normalize, PrototypeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub best_label: String,
    /// Cosine similarity of the best match, in [-1, 1].
    pub best_score: f64,
    pub all_scores: BTreeMap<String, f64>,
}

/// Cosine similarity of the guarded L2-normalizations of `a` and `b`,
/// clamped into [-1, 1]. Zero vectors score 0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let a = l2_normalize(a);
    let b = l2_normalize(b);
    let dot: f64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
    // `+ 0.0` folds -0.0 into 0.0 so equal scores compare equal
    dot.clamp(-1.0, 1.0) + 0.0
}

/// Ranking of two (label, score) candidates: higher score first, exact ties
/// broken by ascending label. `0.0` and `-0.0` are the same score.
pub fn rank_candidates(a: (&str, f64), b: (&str, f64)) -> Ordering {
    (b.1 + 0.0)
        .total_cmp(&(a.1 + 0.0))
        .then_with(|| a.0.cmp(b.0))
}

/// Score `features` against every prototype and pick the best label.
pub fn classify(features: &FeatureVector, prototypes: &PrototypeSet) -> Result<Classification> {
    if prototypes.is_empty() {
        return Err(SpectrumError::EmptyPrototypeSet);
    }
    if features.dim() != prototypes.dim() {
        return Err(SpectrumError::DimensionMismatch {
            expected: prototypes.dim(),
            actual: features.dim(),
        });
    }
    if features.as_slice().iter().any(|v| !v.is_finite()) {
        return Err(SpectrumError::validation(
            "feature vector contains NaN or Inf values",
        ));
    }

    let all_scores: BTreeMap<String, f64> = prototypes
        .iter()
        .map(|(label, proto)| (label.to_string(), cosine_similarity(features.as_slice(), proto)))
        .collect();

    let (best_label, best_score) = all_scores
        .iter()
        .map(|(label, &score)| (label.as_str(), score))
        .min_by(|a, b| rank_candidates(*a, *b))
        .ok_or(SpectrumError::EmptyPrototypeSet)?;

    Ok(Classification {
        best_label: best_label.to_string(),
        best_score,
        all_scores,
    })
}
