//! Peak detection strategies.
//!
//! The feature extractor does not decide on its own whether peak features are
//! available: the caller hands it a [`PeakDetector`]. [`ProminencePeaks`] is
//! the real detector; [`NoPeaks`] reports nothing, so every peak slot of the
//! feature vector is zero.

/// A detected local maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub index: usize,
    pub position: f64,
    pub height: f64,
    pub prominence: f64,
}

pub trait PeakDetector: Send + Sync {
    /// Peaks of `y` with prominence at least `min_prominence`, in index order.
    fn detect(&self, x: &[f64], y: &[f64], min_prominence: f64) -> Vec<Peak>;
}

// ---------------------------------------------------------------------------
// ProminencePeaks
// ---------------------------------------------------------------------------

/// Local maxima filtered by topographic prominence.
///
/// Flat tops count as one peak located at the middle sample of the plateau.
/// The first and last samples are never peaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProminencePeaks;

impl PeakDetector for ProminencePeaks {
    fn detect(&self, x: &[f64], y: &[f64], min_prominence: f64) -> Vec<Peak> {
        let n = x.len().min(y.len());
        local_maxima(&y[..n])
            .into_iter()
            .filter_map(|index| {
                let prominence = prominence(&y[..n], index);
                (prominence >= min_prominence).then(|| Peak {
                    index,
                    position: x[index],
                    height: y[index],
                    prominence,
                })
            })
            .collect()
    }
}

/// Indices of local maxima, plateaus reduced to their (lower) middle index.
pub fn local_maxima(y: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if y.len() < 3 {
        return peaks;
    }
    let last = y.len() - 1;
    let mut i = 1;
    while i < last {
        if y[i - 1] < y[i] {
            let mut ahead = i + 1;
            while ahead < last && y[ahead] == y[i] {
                ahead += 1;
            }
            if y[ahead] < y[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Height of `y[peak]` above the higher of the two minima found by walking
/// outwards until a strictly higher sample (or the border) is reached.
///
/// Each walk is linear in the distance it covers, so a staircase of rising
/// peaks costs O(n²) over all peaks. Spectra of a few thousand points stay
/// cheap; much longer signals would want a stack-based sweep.
pub fn prominence(y: &[f64], peak: usize) -> f64 {
    let top = y[peak];

    let mut left_min = top;
    for &v in y[..=peak].iter().rev() {
        if v > top {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = top;
    for &v in &y[peak..] {
        if v > top {
            break;
        }
        right_min = right_min.min(v);
    }

    top - left_min.max(right_min)
}

// ---------------------------------------------------------------------------
// NoPeaks
// ---------------------------------------------------------------------------

/// Peak detection switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPeaks;

impl PeakDetector for NoPeaks {
    fn detect(&self, _x: &[f64], _y: &[f64], _min_prominence: f64) -> Vec<Peak> {
        Vec::new()
    }
}
