use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectrumError};

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a metadata column
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value (label, split, operator, ...).
/// Must be `Ord` because datasets index unique values in `BTreeSet`s.
#[derive(Debug, Clone)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// Equality follows `Ord` (floats by `total_cmp`) so the `BTreeSet` indices
// stay consistent.
impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn rank(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Render the value as a class label. `Null` has no label.
    pub fn as_label(&self) -> Option<String> {
        match self {
            MetadataValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Parse a free-text cell, guessing the narrowest type.
    pub fn guess(s: &str) -> Self {
        if s.is_empty() {
            return MetadataValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return MetadataValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return MetadataValue::Float(f);
        }
        match s {
            "true" => MetadataValue::Bool(true),
            "false" => MetadataValue::Bool(false),
            _ => MetadataValue::String(s.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Spectrum – raw measurement
// ---------------------------------------------------------------------------

/// A raw spectrum as uploaded: wavenumbers and intensities, unsorted and
/// unvalidated.
#[derive(Debug, Clone, Default)]
pub struct Spectrum {
    /// Wavenumber axis (x).
    pub x: Vec<f64>,
    /// Intensity axis (y), expected to have the same length as `x`.
    pub y: Vec<f64>,
    /// Dynamic metadata columns: column_name → value.
    pub metadata: BTreeMap<String, MetadataValue>,
}

impl Spectrum {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        Spectrum {
            x,
            y,
            metadata: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ConditionedSpectrum – preprocessor output
// ---------------------------------------------------------------------------

/// Sorted, cropped, smoothed, baseline-corrected and normalized spectrum.
/// `y_raw` is the sorted (and cropped) input, kept for plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionedSpectrum {
    pub x: Vec<f64>,
    pub y_raw: Vec<f64>,
    pub y_processed: Vec<f64>,
}

impl ConditionedSpectrum {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Keep at most `max_points` samples at evenly spaced indices
    /// (first and last always included).
    pub fn downsampled(&self, max_points: usize) -> ConditionedSpectrum {
        let n = self.len();
        if max_points == 0 || n <= max_points {
            return self.clone();
        }
        let idx: Vec<usize> = if max_points == 1 {
            vec![0]
        } else {
            (0..max_points)
                .map(|i| i * (n - 1) / (max_points - 1))
                .collect()
        };
        let pick = |v: &[f64]| idx.iter().map(|&i| v[i]).collect::<Vec<f64>>();
        ConditionedSpectrum {
            x: pick(&self.x),
            y_raw: pick(&self.y_raw),
            y_processed: pick(&self.y_processed),
        }
    }
}

// ---------------------------------------------------------------------------
// FeatureVector – fixed-length fingerprint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        FeatureVector(values)
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Labeled reference data
// ---------------------------------------------------------------------------

/// One reference sample: a raw spectrum with its class label.
#[derive(Debug, Clone)]
pub struct LabeledSpectrum {
    pub label: String,
    pub spectrum: Spectrum,
}

/// A loaded dataset with pre-computed column indices.
#[derive(Debug, Clone, Default)]
pub struct SpectralDataset {
    /// All spectra (rows).
    pub spectra: Vec<Spectrum>,
    /// Ordered list of metadata column names (excludes x, y).
    pub column_names: Vec<String>,
    /// For each metadata column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<MetadataValue>>,
}

impl SpectralDataset {
    /// Build column indices from the loaded spectra.
    pub fn from_spectra(spectra: Vec<Spectrum>) -> Self {
        let mut unique_values: BTreeMap<String, BTreeSet<MetadataValue>> = BTreeMap::new();
        for sp in &spectra {
            for (col, val) in &sp.metadata {
                unique_values
                    .entry(col.clone())
                    .or_default()
                    .insert(val.clone());
            }
        }
        let column_names = unique_values.keys().cloned().collect();
        SpectralDataset {
            spectra,
            column_names,
            unique_values,
        }
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    /// Sorted distinct labels found in `label_column`.
    pub fn labels(&self, label_column: &str) -> Vec<String> {
        self.unique_values
            .get(label_column)
            .map(|vals| vals.iter().filter_map(MetadataValue::as_label).collect())
            .unwrap_or_default()
    }

    /// Pair every spectrum with the label stored in `label_column`.
    ///
    /// Fails with `Validation` on the first row without a usable label.
    pub fn into_labeled(self, label_column: &str) -> Result<Vec<LabeledSpectrum>> {
        self.spectra
            .into_iter()
            .enumerate()
            .map(|(i, spectrum)| {
                let label = spectrum
                    .metadata
                    .get(label_column)
                    .and_then(MetadataValue::as_label)
                    .ok_or_else(|| {
                        SpectrumError::validation(format!(
                            "row {i} has no value in label column '{label_column}'"
                        ))
                    })?;
                Ok(LabeledSpectrum { label, spectrum })
            })
            .collect()
    }
}
