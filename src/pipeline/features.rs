use std::sync::Arc;

use crate::config::FeatureConfig;
use crate::data::model::{ConditionedSpectrum, FeatureVector};
use crate::error::{Result, SpectrumError};

use super::peaks::{NoPeaks, Peak, PeakDetector, ProminencePeaks};
use super::stats;

/// Number of scalar descriptors at the head of every feature vector.
pub const SCALAR_FEATURES: usize = 17;

/// Shortest spectrum the extractor accepts.
pub const MIN_FEATURE_POINTS: usize = 10;

const SCALAR_NAMES: [&str; SCALAR_FEATURES] = [
    "min",
    "max",
    "mean",
    "std",
    "median",
    "iqr",
    "abs_diff_mean",
    "abs_diff_std",
    "sign_changes",
    "area",
    "energy",
    "l1",
    "l2",
    "l1_over_l2",
    "centroid",
    "spread",
    "peak_count",
];

// ---------------------------------------------------------------------------
// Scalar descriptors
// ---------------------------------------------------------------------------

/// The 17 statistical descriptors, in vector order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScalarFeatures {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub median: f64,
    pub iqr: f64,
    pub abs_diff_mean: f64,
    pub abs_diff_std: f64,
    pub sign_changes: f64,
    pub area: f64,
    pub energy: f64,
    pub l1: f64,
    pub l2: f64,
    pub l1_over_l2: f64,
    pub centroid: f64,
    pub spread: f64,
    pub peak_count: f64,
}

impl ScalarFeatures {
    fn compute(x: &[f64], y: &[f64]) -> Self {
        let (min, max) = stats::min_max(y);

        let mut sorted = y.to_vec();
        sorted.sort_by(f64::total_cmp);
        let median = stats::percentile_sorted(&sorted, 50.0);
        let iqr = stats::percentile_sorted(&sorted, 75.0) - stats::percentile_sorted(&sorted, 25.0);

        let dy = stats::diff(y);
        let abs_dy: Vec<f64> = dy.iter().map(|d| d.abs()).collect();
        let sign_changes = dy
            .windows(2)
            .filter(|w| stats::sign(w[0]) != stats::sign(w[1]))
            .count() as f64;

        let energy: f64 = y.iter().map(|v| v * v).sum();
        let l1: f64 = y.iter().map(|v| v.abs()).sum();
        let l2 = energy.sqrt();
        let l1_over_l2 = if l2 != 0.0 { l1 / l2 } else { 0.0 };

        // y shifted to a zero minimum serves as the weight of each x
        let weights: Vec<f64> = y.iter().map(|v| v - min).collect();
        let w_sum: f64 = weights.iter().sum();
        let (centroid, spread) = if w_sum > 0.0 {
            let c = x.iter().zip(&weights).map(|(xi, w)| xi * w).sum::<f64>() / w_sum;
            let var = x
                .iter()
                .zip(&weights)
                .map(|(xi, w)| (xi - c).powi(2) * w)
                .sum::<f64>()
                / w_sum;
            (c, var.sqrt())
        } else {
            (stats::mean(x), stats::std_dev(x))
        };

        ScalarFeatures {
            min,
            max,
            mean: stats::mean(y),
            std: stats::std_dev(y),
            median,
            iqr,
            abs_diff_mean: stats::mean(&abs_dy),
            abs_diff_std: stats::std_dev(&abs_dy),
            sign_changes,
            area: stats::trapezoid(x, y),
            energy,
            l1,
            l2,
            l1_over_l2,
            centroid,
            spread,
            peak_count: 0.0,
        }
    }

    pub fn to_array(&self) -> [f64; SCALAR_FEATURES] {
        [
            self.min,
            self.max,
            self.mean,
            self.std,
            self.median,
            self.iqr,
            self.abs_diff_mean,
            self.abs_diff_std,
            self.sign_changes,
            self.area,
            self.energy,
            self.l1,
            self.l2,
            self.l1_over_l2,
            self.centroid,
            self.spread,
            self.peak_count,
        ]
    }
}

/// Column names matching a vector built with `max_peaks` slots.
pub fn feature_names(max_peaks: usize) -> Vec<String> {
    let mut names: Vec<String> = SCALAR_NAMES.iter().map(|s| s.to_string()).collect();
    for group in ["peak_position", "peak_height", "peak_prominence"] {
        names.extend((0..max_peaks).map(|i| format!("{group}_{i}")));
    }
    names
}

// ---------------------------------------------------------------------------
// FeatureExtractor
// ---------------------------------------------------------------------------

/// Turns a conditioned spectrum into a `17 + 3·max_peaks` fingerprint.
#[derive(Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    detector: Arc<dyn PeakDetector>,
}

impl FeatureExtractor {
    /// Extractor with prominence-based peak detection, or none at all when
    /// `config.detect_peaks` is off.
    pub fn new(config: FeatureConfig) -> Self {
        let detector: Arc<dyn PeakDetector> = if config.detect_peaks {
            Arc::new(ProminencePeaks)
        } else {
            Arc::new(NoPeaks)
        };
        Self::with_detector(config, detector)
    }

    pub fn with_detector(config: FeatureConfig, detector: Arc<dyn PeakDetector>) -> Self {
        FeatureExtractor { config, detector }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn feature_dim(&self) -> usize {
        self.config.feature_dim()
    }

    pub fn extract(&self, spectrum: &ConditionedSpectrum) -> Result<FeatureVector> {
        self.extract_arrays(&spectrum.x, &spectrum.y_processed)
    }

    pub fn extract_arrays(&self, x: &[f64], y: &[f64]) -> Result<FeatureVector> {
        if x.len() != y.len() || x.len() < MIN_FEATURE_POINTS {
            return Err(SpectrumError::validation(format!(
                "x and y must have the same length of at least {MIN_FEATURE_POINTS} (got {} and {})",
                x.len(),
                y.len()
            )));
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(SpectrumError::validation("feature input contains NaN or Inf values"));
        }

        let mut scalars = ScalarFeatures::compute(x, y);

        let range = scalars.max - scalars.min;
        let ratio = self.config.peak_prominence_ratio;
        let min_prominence = if range != 0.0 { ratio * range } else { ratio };
        let mut peaks = self.detector.detect(x, y, min_prominence);
        scalars.peak_count = peaks.len() as f64;

        // tallest first; equal heights keep index order
        peaks.sort_by(|a, b| b.height.total_cmp(&a.height));
        peaks.truncate(self.config.max_peaks);

        Ok(assemble(&scalars, &peaks, self.config.max_peaks))
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

impl std::fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// `[scalars] ⧺ [positions] ⧺ [heights] ⧺ [prominences]`, zero padded.
fn assemble(scalars: &ScalarFeatures, peaks: &[Peak], max_peaks: usize) -> FeatureVector {
    let mut out = Vec::with_capacity(SCALAR_FEATURES + 3 * max_peaks);
    out.extend_from_slice(&scalars.to_array());
    let slots = |f: fn(&Peak) -> f64| {
        let mut v: Vec<f64> = peaks.iter().map(f).collect();
        v.resize(max_peaks, 0.0);
        v
    };
    out.extend(slots(|p| p.position));
    out.extend(slots(|p| p.height));
    out.extend(slots(|p| p.prominence));
    FeatureVector::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::peaks::NoPeaks;

    fn axis(n: usize) -> Vec<f64> {
        (0..n).map(|i| 1000.0 + 2.0 * i as f64).collect()
    }

    fn gaussians(x: &[f64], peaks: &[(f64, f64, f64)]) -> Vec<f64> {
        x.iter()
            .map(|&v| {
                peaks
                    .iter()
                    .map(|&(mu, sd, amp)| amp * (-(v - mu).powi(2) / (2.0 * sd * sd)).exp())
                    .sum()
            })
            .collect()
    }

    #[test]
    fn vector_length_is_fixed_for_any_peak_count() {
        let x = axis(200);
        let flat_ramp: Vec<f64> = x.iter().map(|v| v / 1000.0).collect();
        let many = gaussians(
            &x,
            &(0..15)
                .map(|i| (1010.0 + 25.0 * i as f64, 3.0, 1.0 + 0.01 * i as f64))
                .collect::<Vec<_>>(),
        );
        for max_peaks in [1, 5, 10, 20] {
            let fx = FeatureExtractor::new(FeatureConfig {
                max_peaks,
                ..FeatureConfig::default()
            });
            for y in [&flat_ramp, &many] {
                let v = fx.extract_arrays(&x, y).unwrap();
                assert_eq!(v.dim(), 17 + 3 * max_peaks);
                assert_eq!(v.dim(), fx.feature_dim());
            }
        }
    }

    #[test]
    fn scalar_descriptors_on_known_signal() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let fx = FeatureExtractor::with_detector(FeatureConfig::default(), Arc::new(NoPeaks));
        let v = fx.extract_arrays(&x, &y).unwrap();
        let s = v.as_slice();
        assert_eq!(s[0], 0.0); // min
        assert_eq!(s[1], 1.0); // max
        assert_eq!(s[2], 0.5); // mean
        assert_eq!(s[3], 0.5); // std
        assert_eq!(s[4], 0.5); // median
        assert_eq!(s[5], 1.0); // iqr
        assert_eq!(s[6], 1.0); // mean |dy|
        assert_eq!(s[7], 0.0); // std |dy|
        assert_eq!(s[8], 8.0); // sign changes
        assert_eq!(s[9], 4.5); // area
        assert_eq!(s[10], 5.0); // energy
        assert_eq!(s[11], 5.0); // l1
        assert!((s[12] - 5f64.sqrt()).abs() < 1e-12);
        assert!((s[13] - 5f64.sqrt()).abs() < 1e-12);
        assert_eq!(s[14], 5.0); // centroid of odd positions
        assert!((s[15] - 8f64.sqrt()).abs() < 1e-12);
        assert_eq!(s[16], 0.0); // no detector
        assert!(s[17..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn zero_signal_falls_back_to_unweighted_axis_stats() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y = vec![0.0; 10];
        let v = FeatureExtractor::default().extract_arrays(&x, &y).unwrap();
        let s = v.as_slice();
        assert_eq!(s[13], 0.0);
        assert_eq!(s[14], 4.5);
        assert!((s[15] - stats::std_dev(&x)).abs() < 1e-12);
        assert_eq!(s[16], 0.0);
    }

    #[test]
    fn peaks_ranked_by_height_with_matching_prominence() {
        let x = axis(300);
        let y = gaussians(&x, &[(1100.0, 6.0, 0.4), (1300.0, 6.0, 1.0), (1500.0, 6.0, 0.7)]);
        let fx = FeatureExtractor::new(FeatureConfig {
            max_peaks: 5,
            peak_prominence_ratio: 0.02,
            detect_peaks: true,
        });
        let v = fx.extract_arrays(&x, &y).unwrap();
        let s = v.as_slice();
        assert_eq!(s[16], 3.0);
        let positions = &s[17..22];
        let heights = &s[22..27];
        let proms = &s[27..32];
        assert_eq!(&positions[..3], &[1300.0, 1500.0, 1100.0]);
        assert!(heights[0] > heights[1] && heights[1] > heights[2]);
        // well separated peaks on a zero floor: prominence equals height
        for k in 0..3 {
            assert!((proms[k] - heights[k]).abs() < 1e-6);
        }
        assert!(positions[3..].iter().chain(&heights[3..]).chain(&proms[3..]).all(|&v| v == 0.0));
    }

    #[test]
    fn switched_off_detection_leaves_peak_slots_empty() {
        let x = axis(300);
        let y = gaussians(&x, &[(1100.0, 6.0, 0.4), (1300.0, 6.0, 1.0)]);
        let fx = FeatureExtractor::new(FeatureConfig {
            detect_peaks: false,
            ..FeatureConfig::default()
        });
        let v = fx.extract_arrays(&x, &y).unwrap();
        assert_eq!(v.dim(), 47);
        assert!(v.as_slice()[16..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn peak_count_counts_all_detected_peaks_beyond_capacity() {
        let x = axis(400);
        let centers: Vec<(f64, f64, f64)> =
            (0..6).map(|i| (1050.0 + 120.0 * i as f64, 5.0, 1.0 + i as f64 * 0.1)).collect();
        let y = gaussians(&x, &centers);
        let fx = FeatureExtractor::new(FeatureConfig {
            max_peaks: 2,
            ..FeatureConfig::default()
        });
        let v = fx.extract_arrays(&x, &y).unwrap();
        assert_eq!(v.as_slice()[16], 6.0);
        assert_eq!(v.dim(), 23);
        // two tallest: last two centers
        assert_eq!(&v.as_slice()[17..19], &[1650.0, 1530.0]);
    }

    #[test]
    fn rejects_short_or_mismatched_input() {
        let fx = FeatureExtractor::default();
        let x = axis(9);
        assert!(matches!(
            fx.extract_arrays(&x, &x),
            Err(SpectrumError::Validation(_))
        ));
        let x = axis(12);
        assert!(matches!(
            fx.extract_arrays(&x, &x[..11]),
            Err(SpectrumError::Validation(_))
        ));
    }

    #[test]
    fn names_line_up_with_vector() {
        let names = feature_names(10);
        assert_eq!(names.len(), 47);
        assert_eq!(names[16], "peak_count");
        assert_eq!(names[17], "peak_position_0");
        assert_eq!(names[46], "peak_prominence_9");
    }
}
