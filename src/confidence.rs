use serde::{Deserialize, Serialize};

use crate::pipeline::stats;

// ---------------------------------------------------------------------------
// Confidence policy: similarity score → user-facing confidence
// ---------------------------------------------------------------------------

/// Heuristic mapping of a similarity into a bounded confidence value.
///
/// This is not a calibrated probability; the bounds are service policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidencePolicy {
    pub floor: f64,
    pub ceiling: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            floor: 0.50,
            ceiling: 0.95,
        }
    }
}

impl ConfidencePolicy {
    /// Map a cosine similarity in [-1, 1] onto [0, 1], then clamp to the
    /// policy bounds.
    pub fn from_similarity(&self, score: f64) -> f64 {
        self.clamp((score + 1.0) / 2.0)
    }

    /// Fallback when no classification is available: a signal-to-roughness
    /// ratio of the processed intensities.
    pub fn from_signal(&self, y: &[f64]) -> f64 {
        let rough: Vec<f64> = stats::diff(y).iter().map(|d| d.abs()).collect();
        let snr_like = stats::std_dev(y) / (stats::mean(&rough) + 1e-9);
        self.clamp(0.50 + 0.10 * (snr_like / 10.0))
    }

    fn clamp(&self, value: f64) -> f64 {
        value.max(self.floor).min(self.ceiling)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_maps_into_bounds() {
        let p = ConfidencePolicy::default();
        assert_eq!(p.from_similarity(1.0), 0.95);
        assert_eq!(p.from_similarity(-1.0), 0.50);
        assert!((p.from_similarity(0.6) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn signal_fallback_is_bounded() {
        let p = ConfidencePolicy::default();
        let smooth: Vec<f64> = (0..200).map(|i| (i as f64 / 30.0).sin()).collect();
        let jagged: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let c_smooth = p.from_signal(&smooth);
        let c_jagged = p.from_signal(&jagged);
        assert!(c_smooth > c_jagged);
        assert!((0.5..=0.95).contains(&c_smooth));
        // std 1, mean |dy| 2
        assert!((c_jagged - 0.505).abs() < 1e-9);
    }
}
