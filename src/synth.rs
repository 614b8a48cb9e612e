//! Deterministic synthetic Raman spectra for tests, demos and the
//! `generate_sample` binary.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::data::model::Spectrum;

/// `n` evenly spaced wavenumbers from `start` to `end` inclusive.
pub fn raman_axis(n: usize, start: f64, end: f64) -> Vec<f64> {
    if n < 2 {
        return vec![start; n];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + i as f64 * step).collect()
}

pub fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

// ---------------------------------------------------------------------------
// SyntheticSpectrum
// ---------------------------------------------------------------------------

/// Gaussian bands on a linear background with optional white noise.
#[derive(Debug, Clone)]
pub struct SyntheticSpectrum {
    axis: Vec<f64>,
    bands: Vec<(f64, f64, f64)>,
    offset: f64,
    slope: f64,
    noise: f64,
}

impl SyntheticSpectrum {
    pub fn new(axis: Vec<f64>) -> Self {
        SyntheticSpectrum {
            axis,
            bands: Vec::new(),
            offset: 0.1,
            slope: 0.0,
            noise: 0.0,
        }
    }

    /// Add a band at `center` with standard deviation `width`.
    pub fn peak(mut self, center: f64, width: f64, amplitude: f64) -> Self {
        self.bands.push((center, width, amplitude));
        self
    }

    pub fn offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Background slope per wavenumber unit.
    pub fn slope(mut self, slope: f64) -> Self {
        self.slope = slope;
        self
    }

    pub fn noise(mut self, std_dev: f64) -> Self {
        self.noise = std_dev;
        self
    }

    pub fn render(&self, seed: u64) -> Spectrum {
        let mut rng = StdRng::seed_from_u64(seed);
        // zero, negative or non-finite noise levels render a clean spectrum
        let noise = Normal::new(0.0, self.noise)
            .ok()
            .filter(|_| self.noise > 0.0);
        let x0 = self.axis.first().copied().unwrap_or(0.0);
        let y = self
            .axis
            .iter()
            .map(|&wn| {
                let signal: f64 = self
                    .bands
                    .iter()
                    .map(|&(mu, sigma, amp)| gaussian(wn, mu, sigma, amp))
                    .sum();
                let background = self.offset + self.slope * (wn - x0);
                let jitter = noise.as_ref().map_or(0.0, |d| d.sample(&mut rng));
                signal + background + jitter
            })
            .collect();
        Spectrum::new(self.axis.clone(), y)
    }
}
