use std::path::Path;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::{Array1, Array2};
use ndarray_npy::read_npy;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{LabeledSpectrum, MetadataValue, SpectralDataset, Spectrum};

// ---------------------------------------------------------------------------
// Single spectrum upload
// ---------------------------------------------------------------------------

const X_CANDIDATES: [&str; 6] = [
    "wavelength",
    "wavenumber",
    "ramanshift",
    "raman_shift",
    "shift",
    "x",
];
const Y_CANDIDATES: [&str; 3] = ["intensity", "y", "signal"];

/// Load one spectrum from a two-column CSV.
///
/// Header names are matched case-insensitively; the first candidate found
/// wins (`wavelength` before `x`, `intensity` before `y`). Rows with an empty
/// or `nan` cell in either column are dropped.
pub fn load_spectrum_csv(path: &Path) -> Result<Spectrum> {
    let reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening spectrum CSV {}", path.display()))?;
    read_spectrum_csv(reader)
}

pub fn read_spectrum_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Spectrum> {
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();

    let find = |candidates: &[&str]| {
        candidates
            .iter()
            .find_map(|c| headers.iter().position(|h| h == c))
    };
    let (Some(x_idx), Some(y_idx)) = (find(&X_CANDIDATES), find(&Y_CANDIDATES)) else {
        bail!(
            "CSV must include wavelength/wavenumber + intensity columns. Found columns: {headers:?}"
        );
    };

    let mut x = Vec::new();
    let mut y = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let (Some(xv), Some(yv)) = (
            parse_cell(record.get(x_idx).unwrap_or(""), row_no, "x")?,
            parse_cell(record.get(y_idx).unwrap_or(""), row_no, "y")?,
        ) else {
            continue;
        };
        x.push(xv);
        y.push(yv);
    }
    Ok(Spectrum::new(x, y))
}

/// `None` for a missing value, error for text that is not a number.
fn parse_cell(cell: &str, row: usize, col: &str) -> Result<Option<f64>> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let v = cell
        .parse::<f64>()
        .with_context(|| format!("Row {row}, {col}: '{cell}' is not a number"))?;
    Ok(Some(v))
}

// ---------------------------------------------------------------------------
// Reference datasets
// ---------------------------------------------------------------------------

/// Load a spectral dataset from a file. Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – `x` and `y` list columns (recommended)
/// * `.json`    – `[{ "x": [...], "y": [...], "label": ..., ...meta }, ...]`
/// * `.csv`     – columns `x` and `y` containing semicolon-separated floats
pub fn load_dataset(path: &Path) -> Result<SpectralDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading dataset {}", path.display()))?;

    log::info!(
        "Loaded {} spectra with columns {:?} from {}",
        dataset.len(),
        dataset.column_names,
        path.display()
    );
    Ok(dataset)
}

fn load_json(path: &Path) -> Result<SpectralDataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json_records(&text)
}

fn parse_json_records(text: &str) -> Result<SpectralDataset> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut spectra = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let x = json_array_to_f64(obj.get("x"), i, "x")?;
        let y = json_array_to_f64(obj.get("y"), i, "y")?;

        let metadata = obj
            .iter()
            .filter(|(key, _)| *key != "x" && *key != "y")
            .map(|(key, val)| (key.clone(), json_to_metadata(val)))
            .collect();

        spectra.push(Spectrum { x, y, metadata });
    }
    Ok(SpectralDataset::from_spectra(spectra))
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number"))
        })
        .collect()
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => MetadataValue::Integer(i),
            (None, Some(f)) => MetadataValue::Float(f),
            _ => MetadataValue::String(n.to_string()),
        },
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

/// CSV dataset layout: header row, `x` and `y` cells hold semicolon-separated
/// floats (`"700.0;702.0;704.0"`), every other column is metadata.
fn load_csv(path: &Path) -> Result<SpectralDataset> {
    let reader = csv::Reader::from_path(path).context("opening CSV")?;
    read_csv_records(reader)
}

fn read_csv_records<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<SpectralDataset> {
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let x_idx = headers
        .iter()
        .position(|h| h == "x")
        .context("CSV missing 'x' column")?;
    let y_idx = headers
        .iter()
        .position(|h| h == "y")
        .context("CSV missing 'y' column")?;

    let mut spectra = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let x = parse_semicolon_floats(record.get(x_idx).unwrap_or(""), row_no, "x")?;
        let y = parse_semicolon_floats(record.get(y_idx).unwrap_or(""), row_no, "y")?;

        let metadata = record
            .iter()
            .enumerate()
            .filter(|(col_idx, _)| *col_idx != x_idx && *col_idx != y_idx)
            .map(|(col_idx, value)| (headers[col_idx].clone(), MetadataValue::guess(value)))
            .collect();

        spectra.push(Spectrum { x, y, metadata });
    }
    Ok(SpectralDataset::from_spectra(spectra))
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

/// Parquet layout: `x` and `y` as List/LargeList of Float64 or Float32, all
/// other columns scalar metadata (strings, ints, floats, bools). Files from
/// both Pandas and Polars work.
fn load_parquet(path: &Path) -> Result<SpectralDataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?
        .build()
        .context("building parquet reader")?;

    let mut spectra = Vec::new();
    for (batch_no, batch) in reader.enumerate() {
        let batch = batch.with_context(|| format!("reading record batch {batch_no}"))?;
        spectra.extend(batch_spectra(&batch)?);
    }
    Ok(SpectralDataset::from_spectra(spectra))
}

fn batch_spectra(batch: &RecordBatch) -> Result<Vec<Spectrum>> {
    let schema = batch.schema();
    let x_idx = required_column(&schema, "x")?;
    let y_idx = required_column(&schema, "y")?;
    let (x_col, y_col) = (batch.column(x_idx), batch.column(y_idx));

    let meta_cols: Vec<(&str, &ArrayRef)> = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .enumerate()
        .filter(|(i, _)| *i != x_idx && *i != y_idx)
        .map(|(_, (field, col))| (field.name().as_str(), col))
        .collect();

    (0..batch.num_rows())
        .map(|row| {
            let x = list_row(x_col, row).with_context(|| format!("Row {row}: bad 'x'"))?;
            let y = list_row(y_col, row).with_context(|| format!("Row {row}: bad 'y'"))?;
            let metadata = meta_cols
                .iter()
                .map(|(name, col)| (name.to_string(), scalar_cell(col, row)))
                .collect();
            Ok(Spectrum { x, y, metadata })
        })
        .collect()
}

fn required_column(schema: &Schema, name: &str) -> Result<usize> {
    schema
        .index_of(name)
        .map_err(|_| anyhow::anyhow!("Parquet file missing '{name}' column"))
}

/// One row of a numeric list column as f64. Null entries become NaN so that
/// preprocessing rejects them.
fn list_row(col: &ArrayRef, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null list");
    }
    let values: ArrayRef = match col.data_type() {
        DataType::List(_) => col.as_list::<i32>().value(row),
        DataType::LargeList(_) => col.as_list::<i64>().value(row),
        other => bail!("expected a list column, got {other:?}"),
    };
    match values.data_type() {
        DataType::Float64 => Ok(values
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect()),
        DataType::Float32 => Ok(values
            .as_primitive::<Float32Type>()
            .iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect()),
        other => bail!("list items are {other:?}, expected Float64 or Float32"),
    }
}

fn scalar_cell(col: &ArrayRef, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => MetadataValue::String(col.as_string::<i32>().value(row).to_owned()),
        DataType::LargeUtf8 => MetadataValue::String(col.as_string::<i64>().value(row).to_owned()),
        DataType::Int32 => {
            MetadataValue::Integer(i64::from(col.as_primitive::<Int32Type>().value(row)))
        }
        DataType::Int64 => MetadataValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => {
            MetadataValue::Float(f64::from(col.as_primitive::<Float32Type>().value(row)))
        }
        DataType::Float64 => MetadataValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => MetadataValue::Bool(col.as_boolean().value(row)),
        other => MetadataValue::String(format!("{other:?}")),
    }
}

// ---------------------------------------------------------------------------
// NumPy split directory
// ---------------------------------------------------------------------------

/// Load a labeled split stored as NumPy arrays:
///
/// * `wavenumbers.npy` – shared x axis, shape (W,)
/// * `X_{split}.npy`   – intensities, shape (N, W)
/// * `y_{split}.npy`   – numeric labels, shape (N,)
pub fn load_npy_split(dir: &Path, split: &str) -> Result<Vec<LabeledSpectrum>> {
    let w = read_f64_vector(&dir.join("wavenumbers.npy"))?;
    let x_path = dir.join(format!("X_{split}.npy"));
    let x = read_f64_matrix(&x_path)?;
    let y = read_labels(&dir.join(format!("y_{split}.npy")))?;

    if x.nrows() != y.len() {
        bail!(
            "X/y sample mismatch for split={split}: {} vs {}",
            x.nrows(),
            y.len()
        );
    }
    if x.ncols() != w.len() {
        bail!(
            "X columns must match wavenumbers: {} vs {}",
            x.ncols(),
            w.len()
        );
    }

    log::info!(
        "Loaded split '{split}': {} spectra x {} wavenumbers",
        x.nrows(),
        w.len()
    );
    Ok(x.rows()
        .into_iter()
        .zip(y)
        .map(|(row, label)| LabeledSpectrum {
            label,
            spectrum: Spectrum::new(w.clone(), row.to_vec()),
        })
        .collect())
}

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("Missing dataset file: {}", path.display());
    }
    Ok(())
}

fn read_f64_vector(path: &Path) -> Result<Vec<f64>> {
    ensure_exists(path)?;
    if let Ok(a) = read_npy::<_, Array1<f64>>(path) {
        return Ok(a.to_vec());
    }
    let a: Array1<f32> =
        read_npy(path).with_context(|| format!("reading {} as a 1-D float array", path.display()))?;
    Ok(a.iter().map(|&v| f64::from(v)).collect())
}

fn read_f64_matrix(path: &Path) -> Result<Array2<f64>> {
    ensure_exists(path)?;
    if let Ok(a) = read_npy::<_, Array2<f64>>(path) {
        return Ok(a);
    }
    let a: Array2<f32> =
        read_npy(path).with_context(|| format!("reading {} as a 2-D float array", path.display()))?;
    Ok(a.mapv(f64::from))
}

/// Integer labels render as `"3"`, float labels as their shortest form.
fn read_labels(path: &Path) -> Result<Vec<String>> {
    ensure_exists(path)?;
    if let Ok(a) = read_npy::<_, Array1<i64>>(path) {
        return Ok(a.iter().map(i64::to_string).collect());
    }
    if let Ok(a) = read_npy::<_, Array1<i32>>(path) {
        return Ok(a.iter().map(i32::to_string).collect());
    }
    let a: Array1<f64> = read_npy(path)
        .with_context(|| format!("reading {} as a 1-D numeric label array", path.display()))?;
    Ok(a.iter()
        .map(|&v| MetadataValue::Float(v).to_string())
        .collect())
}
