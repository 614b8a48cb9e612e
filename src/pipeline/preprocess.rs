use crate::config::{DuplicatePolicy, NormalizeMode, PreprocessConfig};
use crate::data::model::{ConditionedSpectrum, Spectrum};
use crate::error::{Result, SpectrumError};

use super::baseline::polynomial_baseline;
use super::stats;

/// Minimum number of points in a spectrum, and in a crop window for the crop
/// to take effect.
pub const MIN_POINTS: usize = 20;

// A spectrum is constant when its intensity range is within `CONST_ATOL`
// plus float rounding at the signal's magnitude.
const CONST_ATOL: f64 = 1e-8;
const CONST_RTOL: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Sort, crop, smooth, baseline-correct and normalize a raw spectrum.
pub fn preprocess(spectrum: &Spectrum, config: &PreprocessConfig) -> Result<ConditionedSpectrum> {
    preprocess_arrays(&spectrum.x, &spectrum.y, config)
}

/// Same as [`preprocess`], on bare arrays.
pub fn preprocess_arrays(x: &[f64], y: &[f64], config: &PreprocessConfig) -> Result<ConditionedSpectrum> {
    validate(x, y)?;

    let (x, y_raw) = sort_by_wavenumber(x, y);
    if config.duplicates == DuplicatePolicy::Reject {
        if let Some(w) = x.windows(2).find(|w| w[0] == w[1]) {
            return Err(SpectrumError::validation(format!(
                "spectrum x-axis contains duplicate value {}",
                w[0]
            )));
        }
    }

    let (x, y_raw) = match config.crop {
        Some((lo, hi)) => crop(x, y_raw, lo, hi),
        None => (x, y_raw),
    };

    let y_smooth = moving_average(&y_raw, config.smooth_window);
    let baseline = polynomial_baseline(&x, &y_smooth, config.baseline_degree);
    let corrected: Vec<f64> = y_smooth
        .iter()
        .zip(&baseline)
        .map(|(s, b)| s - b)
        .collect();
    let y_processed = normalize(&corrected, config.normalize);

    Ok(ConditionedSpectrum {
        x,
        y_raw,
        y_processed,
    })
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

fn validate(x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(SpectrumError::validation(format!(
            "x and y length mismatch: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    if x.len() < MIN_POINTS {
        return Err(SpectrumError::validation(format!(
            "spectrum must contain at least {MIN_POINTS} points (got {})",
            x.len()
        )));
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(SpectrumError::validation("spectrum contains NaN or Inf values"));
    }
    let (lo, hi) = stats::min_max(y);
    let magnitude = lo.abs().max(hi.abs());
    if hi - lo <= CONST_ATOL + CONST_RTOL * magnitude {
        return Err(SpectrumError::validation(
            "spectrum intensity is constant (no signal)",
        ));
    }
    Ok(())
}

/// Stable sort of the pairs by wavenumber.
fn sort_by_wavenumber(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut order: Vec<usize> = (0..x.len()).collect();
    order.sort_by(|&a, &b| x[a].total_cmp(&x[b]));
    (
        order.iter().map(|&i| x[i]).collect(),
        order.iter().map(|&i| y[i]).collect(),
    )
}

/// Keep `lo <= x <= hi` unless that leaves fewer than [`MIN_POINTS`].
pub fn crop(x: Vec<f64>, y: Vec<f64>, lo: f64, hi: f64) -> (Vec<f64>, Vec<f64>) {
    let inside = x.iter().filter(|&&v| v >= lo && v <= hi).count();
    if inside < MIN_POINTS {
        log::debug!("Crop [{lo}, {hi}] keeps {inside} points; using full range");
        return (x, y);
    }
    x.into_iter()
        .zip(y)
        .filter(|(xi, _)| *xi >= lo && *xi <= hi)
        .unzip()
}

/// Centered moving average with edge padding. The output has the input's
/// length; the window is at least 3 and always odd.
pub fn moving_average(y: &[f64], window: usize) -> Vec<f64> {
    let n = y.len();
    if n == 0 {
        return Vec::new();
    }
    let mut window = window.max(3);
    if window % 2 == 0 {
        window += 1;
    }
    let half = (window / 2) as isize;
    let last = (n - 1) as isize;
    let at = |i: isize| y[i.clamp(0, last) as usize];

    (0..n as isize)
        .map(|i| (i - half..=i + half).map(at).sum::<f64>() / window as f64)
        .collect()
}

pub fn normalize(y: &[f64], mode: NormalizeMode) -> Vec<f64> {
    match mode {
        NormalizeMode::MinMax => {
            let (lo, hi) = stats::min_max(y);
            let range = hi - lo;
            let denom = if range != 0.0 { range } else { 1.0 };
            y.iter().map(|v| (v - lo) / denom).collect()
        }
        NormalizeMode::ZScore => {
            let mu = stats::mean(y);
            let sd = stats::std_dev(y);
            let denom = if sd != 0.0 { sd } else { 1.0 };
            y.iter().map(|v| (v - mu) / denom).collect()
        }
        NormalizeMode::None => y.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{raman_axis, SyntheticSpectrum};

    fn no_crop() -> PreprocessConfig {
        PreprocessConfig {
            crop: None,
            ..PreprocessConfig::default()
        }
    }

    fn sample(n: usize) -> Spectrum {
        SyntheticSpectrum::new(raman_axis(n, 600.0, 1900.0))
            .peak(1000.0, 12.0, 1.0)
            .peak(1450.0, 20.0, 0.6)
            .slope(2e-4)
            .noise(0.01)
            .render(7)
    }

    #[test]
    fn constant_twenty_points_fails_and_one_outlier_in_21_passes() {
        let x: Vec<f64> = (0..20).map(|i| 800.0 + i as f64).collect();
        let err = preprocess_arrays(&x, &[1.0; 20], &no_crop()).unwrap_err();
        assert!(matches!(err, SpectrumError::Validation(msg) if msg.contains("constant")));

        let x: Vec<f64> = (0..21).map(|i| 800.0 + i as f64).collect();
        let mut y = vec![1.0; 21];
        y[10] = 2.0;
        let out = preprocess_arrays(&x, &y, &no_crop()).unwrap();
        assert_eq!(out.len(), 21);
    }

    #[test]
    fn small_variation_at_high_count_levels_is_signal() {
        let x: Vec<f64> = (0..40).map(|i| 800.0 + i as f64).collect();
        let y: Vec<f64> = (0..40)
            .map(|i| 1e6 + if i % 2 == 0 { 10.0 } else { -10.0 })
            .collect();
        let out = preprocess_arrays(&x, &y, &no_crop()).unwrap();
        assert_eq!(out.len(), 40);

        let flat = vec![1e6; 40];
        assert!(matches!(
            preprocess_arrays(&x, &flat, &no_crop()),
            Err(SpectrumError::Validation(msg)) if msg.contains("constant")
        ));
    }

    #[test]
    fn rejects_malformed_input() {
        let x: Vec<f64> = (0..25).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..25).map(|i| (i % 3) as f64).collect();

        assert!(matches!(
            preprocess_arrays(&x[..24], &y, &no_crop()),
            Err(SpectrumError::Validation(_))
        ));
        assert!(matches!(
            preprocess_arrays(&x[..19], &y[..19], &no_crop()),
            Err(SpectrumError::Validation(_))
        ));

        let mut bad = y.clone();
        bad[3] = f64::NAN;
        assert!(matches!(
            preprocess_arrays(&x, &bad, &no_crop()),
            Err(SpectrumError::Validation(_))
        ));
        let mut bad_x = x.clone();
        bad_x[0] = f64::INFINITY;
        assert!(matches!(
            preprocess_arrays(&bad_x, &y, &no_crop()),
            Err(SpectrumError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_policy_decides_duplicate_handling() {
        let mut x: Vec<f64> = (0..30).map(|i| 900.0 + i as f64).collect();
        x[7] = x[6];
        let y: Vec<f64> = (0..30).map(|i| ((i as f64) / 3.0).sin()).collect();

        let strict = no_crop();
        let err = preprocess_arrays(&x, &y, &strict).unwrap_err();
        assert!(matches!(err, SpectrumError::Validation(msg) if msg.contains("duplicate")));

        let lenient = PreprocessConfig {
            duplicates: DuplicatePolicy::Tolerate,
            ..no_crop()
        };
        let out = preprocess_arrays(&x, &y, &lenient).unwrap();
        assert_eq!(out.len(), 30);
        assert!(out.x.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn output_is_sorted_and_raw_follows_x() {
        let sp = sample(120);
        let mut x = sp.x.clone();
        let mut y = sp.y.clone();
        x.reverse();
        y.reverse();
        let out = preprocess_arrays(&x, &y, &no_crop()).unwrap();
        assert!(out.x.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(out.x, sp.x);
        assert_eq!(out.y_raw, sp.y);
    }

    #[test]
    fn crop_applies_only_when_enough_points_remain() {
        let sp = sample(300);
        let cfg = PreprocessConfig {
            crop: Some((700.0, 1800.0)),
            ..PreprocessConfig::default()
        };
        let out = preprocess(&sp, &cfg).unwrap();
        assert!(out.len() < 300);
        assert!(out.x.iter().all(|&v| (700.0..=1800.0).contains(&v)));

        let narrow = PreprocessConfig {
            crop: Some((1000.0, 1010.0)),
            ..PreprocessConfig::default()
        };
        let out = preprocess(&sp, &narrow).unwrap();
        assert_eq!(out.x, sp.x);
    }

    #[test]
    fn minmax_spans_unit_interval() {
        let out = preprocess(&sample(200), &no_crop()).unwrap();
        let (lo, hi) = stats::min_max(&out.y_processed);
        assert_eq!(lo, 0.0);
        assert!((hi - 1.0).abs() < 1e-12);
        assert!(out.y_processed.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn degenerate_minmax_is_all_zero() {
        assert_eq!(normalize(&[3.0; 5], NormalizeMode::MinMax), vec![0.0; 5]);
        assert_eq!(normalize(&[3.0; 5], NormalizeMode::ZScore), vec![0.0; 5]);
    }

    #[test]
    fn zscore_has_zero_mean_unit_std() {
        let cfg = PreprocessConfig {
            normalize: NormalizeMode::ZScore,
            ..no_crop()
        };
        let out = preprocess(&sample(200), &cfg).unwrap();
        assert!(stats::mean(&out.y_processed).abs() < 1e-9);
        assert!((stats::std_dev(&out.y_processed) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn none_mode_passes_baseline_corrected_signal() {
        let cfg = PreprocessConfig {
            normalize: NormalizeMode::None,
            ..no_crop()
        };
        let out = preprocess(&sample(200), &cfg).unwrap();
        // residual of a least-squares fit with an intercept sums to ~0
        assert!(stats::mean(&out.y_processed).abs() < 1e-9);
    }

    #[test]
    fn moving_average_pads_edges_and_forces_odd_window() {
        let y = [0.0, 0.0, 3.0, 0.0, 0.0];
        assert_eq!(moving_average(&y, 3), vec![0.0, 1.0, 1.0, 1.0, 0.0]);
        // window 2 -> 3
        assert_eq!(moving_average(&y, 2), moving_average(&y, 3));
        // window 4 -> 5; left edge sees [0, 0, 0, 0, 3]
        let w5 = moving_average(&y, 4);
        assert!((w5[0] - 0.6).abs() < 1e-12);
        assert!((w5[2] - 0.6).abs() < 1e-12);
        assert_eq!(moving_average(&[1.0, 5.0], 9).len(), 2);
    }
}
