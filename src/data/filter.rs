use std::collections::BTreeSet;

use super::model::{MetadataValue, SpectralDataset};

// ---------------------------------------------------------------------------
// Row selection by metadata
// ---------------------------------------------------------------------------

/// Indices of spectra whose `column` value is in `selected`.
///
/// A spectrum without the column passes only if `Null` is selected. An
/// empty selection matches nothing.
pub fn matching_indices(
    dataset: &SpectralDataset,
    column: &str,
    selected: &BTreeSet<MetadataValue>,
) -> Vec<usize> {
    dataset
        .spectra
        .iter()
        .enumerate()
        .filter(|(_, sp)| match sp.metadata.get(column) {
            Some(value) => selected.contains(value),
            None => selected.contains(&MetadataValue::Null),
        })
        .map(|(i, _)| i)
        .collect()
}

/// Keep only the rows whose `column` renders as one of `values`
/// (e.g. `split = reference`). Column indices are rebuilt for the subset.
pub fn select_rows(dataset: SpectralDataset, column: &str, values: &[String]) -> SpectralDataset {
    let Some(all) = dataset.unique_values.get(column) else {
        log::warn!("Column '{column}' not present; selection keeps nothing");
        return SpectralDataset::default();
    };
    let selected: BTreeSet<MetadataValue> = all
        .iter()
        .filter(|v| values.iter().any(|want| *want == v.to_string()))
        .cloned()
        .collect();

    let keep: BTreeSet<usize> = matching_indices(&dataset, column, &selected)
        .into_iter()
        .collect();
    let before = dataset.len();
    let spectra = dataset
        .spectra
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, sp)| sp)
        .collect();
    let subset = SpectralDataset::from_spectra(spectra);
    log::debug!(
        "Selected {} of {before} spectra where {column} in {values:?}",
        subset.len()
    );
    subset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Spectrum;

    fn row(split: Option<&str>, label: i64) -> Spectrum {
        let mut sp = Spectrum::new(vec![0.0], vec![0.0]);
        if let Some(s) = split {
            sp.metadata
                .insert("split".into(), MetadataValue::String(s.into()));
        }
        sp.metadata.insert("label".into(), MetadataValue::Integer(label));
        sp
    }

    fn dataset() -> SpectralDataset {
        SpectralDataset::from_spectra(vec![
            row(Some("reference"), 0),
            row(Some("test"), 1),
            row(None, 2),
            row(Some("reference"), 3),
        ])
    }

    #[test]
    fn selects_by_rendered_value() {
        let subset = select_rows(dataset(), "split", &["reference".to_string()]);
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.labels("label"), vec!["0", "3"]);

        let by_int = select_rows(dataset(), "label", &["1".to_string(), "2".to_string()]);
        assert_eq!(by_int.len(), 2);
    }

    #[test]
    fn missing_column_value_only_matches_null() {
        let ds = dataset();
        let mut selected = BTreeSet::new();
        selected.insert(MetadataValue::Null);
        assert_eq!(matching_indices(&ds, "split", &selected), vec![2]);
        assert!(matching_indices(&ds, "split", &BTreeSet::new()).is_empty());
    }

    #[test]
    fn unknown_column_selects_nothing() {
        assert!(select_rows(dataset(), "operator", &["Alice".to_string()]).is_empty());
    }
}
