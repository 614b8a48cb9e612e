//! Least-squares polynomial baseline.
//!
//! The abscissa is mapped affinely onto [-1, 1] before building the
//! Vandermonde matrix, and the system is solved through an SVD. Rank-deficient
//! fits take the minimum-norm solution.

use nalgebra::{DMatrix, DVector};

use crate::config::{MAX_BASELINE_DEGREE, MIN_BASELINE_DEGREE};

/// Singular values below this fraction of the largest one count as zero.
const RANK_TOL: f64 = 1e-12;

/// Fit a polynomial of `degree` (clamped into [1, 8]) to (x, y) and return
/// its evaluation at every x.
pub fn polynomial_baseline(x: &[f64], y: &[f64], degree: usize) -> Vec<f64> {
    let n = x.len().min(y.len());
    if n == 0 {
        return Vec::new();
    }
    let degree = degree.clamp(MIN_BASELINE_DEGREE, MAX_BASELINE_DEGREE);
    let terms = (degree + 1).min(n);

    let t = scale_to_unit(&x[..n]);
    let design = DMatrix::from_fn(n, terms, |i, j| t[i].powi(j as i32));
    let coeffs = least_squares(design, &y[..n]);
    t.iter().map(|&ti| horner(coeffs.as_slice(), ti)).collect()
}

/// Map x affinely onto [-1, 1]. A zero-width axis maps to all zeros.
fn scale_to_unit(x: &[f64]) -> Vec<f64> {
    let lo = x.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let half = (hi - lo) / 2.0;
    if half <= 0.0 {
        return vec![0.0; x.len()];
    }
    let mid = lo + half;
    x.iter().map(|&xi| (xi - mid) / half).collect()
}

/// Minimum-norm solution of min ‖A c − b‖ through the SVD of A.
fn least_squares(design: DMatrix<f64>, b: &[f64]) -> DVector<f64> {
    let terms = design.ncols();
    let rhs = DVector::from_column_slice(b);
    let svd = design.svd(true, true);
    let eps = RANK_TOL * svd.singular_values.max();
    svd.solve(&rhs, eps)
        .unwrap_or_else(|_| DVector::zeros(terms))
}

fn horner(coeffs: &[f64], t: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * t + c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(n: usize, start: f64, step: f64) -> Vec<f64> {
        (0..n).map(|i| start + i as f64 * step).collect()
    }

    #[test]
    fn reproduces_cubic_on_raman_axis() {
        let x = axis(200, 700.0, 5.5);
        let y: Vec<f64> = x
            .iter()
            .map(|&v| {
                let u = v / 1000.0;
                0.3 - 1.2 * u + 0.8 * u * u - 0.1 * u * u * u
            })
            .collect();
        let base = polynomial_baseline(&x, &y, 3);
        for (b, yi) in base.iter().zip(&y) {
            assert!((b - yi).abs() < 1e-9, "{b} vs {yi}");
        }
    }

    #[test]
    fn linear_fit_of_noisy_line_is_least_squares() {
        let x = axis(5, 0.0, 1.0);
        let y = vec![0.0, 1.0, 0.0, 1.0, 0.0];
        let base = polynomial_baseline(&x, &y, 1);
        // mean 0.4, zero slope by symmetry
        for b in base {
            assert!((b - 0.4).abs() < 1e-12);
        }
    }

    #[test]
    fn degree_is_clamped() {
        let x = axis(30, 0.0, 1.0);
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let base = polynomial_baseline(&x, &y, 0);
        for (b, yi) in base.iter().zip(&y) {
            assert!((b - yi).abs() < 1e-9);
        }
        let high = polynomial_baseline(&x, &y, 50);
        for (b, yi) in high.iter().zip(&y) {
            assert!((b - yi).abs() < 1e-6);
        }
    }

    #[test]
    fn design_matrix_is_scaled_vandermonde() {
        let t = scale_to_unit(&[700.0, 1250.0, 1800.0]);
        assert_eq!(t, vec![-1.0, 0.0, 1.0]);
        let coeffs = least_squares(
            DMatrix::from_fn(3, 3, |i, j| t[i].powi(j as i32)),
            &[2.0, 1.0, 4.0],
        );
        // exact interpolation: 1 + 1.0 t + 2.0 t^2
        for (c, want) in coeffs.iter().zip([1.0, 1.0, 2.0]) {
            assert!((c - want).abs() < 1e-12, "{c} vs {want}");
        }
    }

    #[test]
    fn repeated_abscissa_falls_back_to_mean() {
        let x = vec![5.0; 20];
        let y: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let base = polynomial_baseline(&x, &y, 3);
        for b in base {
            assert!((b - 9.5).abs() < 1e-9);
        }
    }
}
