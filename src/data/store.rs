use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::SpectrumError;
use crate::pipeline::{PrototypeMetadata, PrototypeSet};

// ---------------------------------------------------------------------------
// Prototype file
// ---------------------------------------------------------------------------

/// On-disk JSON layout:
///
/// ```json
/// {
///   "split": "reference",
///   "feature_dim": 47,
///   "num_samples": 3000,
///   "labels": ["0", "1"],
///   "prototypes": { "0": [...], "1": [...] },
///   "samples_per_label": { "0": 1500, "1": 1500 },
///   "config": { "preprocess": {...}, "features": {...} }
/// }
/// ```
///
/// Only `feature_dim` and `prototypes` are required when reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrototypeFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<String>,
    pub feature_dim: usize,
    #[serde(default, alias = "N")]
    pub num_samples: usize,
    #[serde(default)]
    pub labels: Vec<String>,
    pub prototypes: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub samples_per_label: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PipelineConfig>,
}

impl PrototypeFile {
    pub fn new(
        set: &PrototypeSet,
        meta: &PrototypeMetadata,
        config: &PipelineConfig,
        split: Option<String>,
    ) -> Self {
        PrototypeFile {
            split,
            feature_dim: set.dim(),
            num_samples: meta.num_samples,
            labels: meta.labels.clone(),
            prototypes: set.as_map().clone(),
            samples_per_label: meta.samples_per_label.clone(),
            config: Some(config.clone()),
        }
    }

    /// Validate the vectors against `feature_dim` and split the file into
    /// the prototype set and the recorded config.
    pub fn into_parts(self) -> crate::Result<(PrototypeSet, Option<PipelineConfig>)> {
        if let Some(v) = self.prototypes.values().find(|v| v.len() != self.feature_dim) {
            return Err(SpectrumError::DimensionMismatch {
                expected: self.feature_dim,
                actual: v.len(),
            });
        }
        Ok((PrototypeSet::new(self.prototypes)?, self.config))
    }
}

pub fn save_prototypes(path: &Path, file: &PrototypeFile) -> Result<()> {
    let text = serde_json::to_string_pretty(file).context("serializing prototypes")?;
    std::fs::write(path, text)
        .with_context(|| format!("writing prototypes to {}", path.display()))?;
    Ok(())
}

/// Read a prototype file. A missing file is not an error: it yields `None`.
pub fn load_prototypes(path: &Path) -> Result<Option<PrototypeFile>> {
    if !path.exists() {
        log::warn!("Prototype file {} not found", path.display());
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading prototypes from {}", path.display()))?;
    let file: PrototypeFile = serde_json::from_str(&text)
        .with_context(|| format!("parsing prototypes from {}", path.display()))?;
    Ok(Some(file))
}

// ---------------------------------------------------------------------------
// Label display map
// ---------------------------------------------------------------------------

/// Optional label → human readable name mapping.
pub type LabelMap = BTreeMap<String, String>;

pub fn load_label_map(path: &Path) -> Result<LabelMap> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading label map {}", path.display()))?;
    let map: LabelMap = serde_json::from_str(&text)
        .with_context(|| format!("parsing label map {}", path.display()))?;
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::FeatureVector;
    use crate::pipeline::build_from_features;

    #[test]
    fn save_then_load_keeps_prototypes_and_config() {
        let (set, meta) = build_from_features(vec![
            ("x".to_string(), FeatureVector::new(vec![1.0, 2.0, 2.0])),
            ("y".to_string(), FeatureVector::new(vec![0.0, 0.0, 5.0])),
        ])
        .unwrap();
        let mut config = PipelineConfig::default();
        config.preprocess.crop = None;
        let file = PrototypeFile::new(&set, &meta, &config, Some("reference".into()));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prototypes.json");
        save_prototypes(&path, &file).unwrap();

        let loaded = load_prototypes(&path).unwrap().unwrap();
        assert_eq!(loaded, file);
        let (back, cfg) = loaded.into_parts().unwrap();
        assert_eq!(back, set);
        assert_eq!(cfg, Some(config));
    }

    #[test]
    fn minimal_legacy_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        std::fs::write(
            &path,
            r#"{"labels": ["0"], "feature_dim": 2, "N": 4, "prototypes": {"0": [0.6, 0.8]}}"#,
        )
        .unwrap();
        let file = load_prototypes(&path).unwrap().unwrap();
        assert_eq!(file.num_samples, 4);
        let (set, cfg) = file.into_parts().unwrap();
        assert_eq!(set.get("0"), Some(&[0.6, 0.8][..]));
        assert!(cfg.is_none());
    }

    #[test]
    fn declared_dimension_must_match_vectors() {
        let file = PrototypeFile {
            split: None,
            feature_dim: 3,
            num_samples: 1,
            labels: vec!["a".into()],
            prototypes: [("a".to_string(), vec![1.0, 0.0])].into_iter().collect(),
            samples_per_label: BTreeMap::new(),
            config: None,
        };
        assert_eq!(
            file.into_parts().unwrap_err(),
            SpectrumError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn absent_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_prototypes(&dir.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn label_map_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        std::fs::write(&path, r#"{"0": "S. aureus", "1": "E. coli"}"#).unwrap();
        let map = load_label_map(&path).unwrap();
        assert_eq!(map["1"], "E. coli");
    }
}
