use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Builder, Int64Array, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use rusty_raman::synth::{raman_axis, SyntheticSpectrum};

/// Band sets (center, width, amplitude) per synthetic class.
fn class_bands() -> Vec<(&'static str, Vec<(f64, f64, f64)>)> {
    vec![
        ("0", vec![(1004.0, 8.0, 1.0), (1450.0, 18.0, 0.6), (1660.0, 15.0, 0.5)]),
        ("1", vec![(850.0, 10.0, 0.7), (1240.0, 20.0, 0.9), (1580.0, 12.0, 0.4)]),
        ("2", vec![(780.0, 9.0, 0.5), (1100.0, 14.0, 0.8), (1335.0, 16.0, 1.0)]),
    ]
}

#[derive(Default)]
struct Rows {
    x: Vec<Vec<f64>>,
    y: Vec<Vec<f64>>,
    label: Vec<String>,
    split: Vec<&'static str>,
    operator: Vec<&'static str>,
    id: Vec<i64>,
}

fn list_column(rows: &[Vec<f64>]) -> arrow::array::ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        builder.values().append_slice(row);
        builder.append(true);
    }
    builder.finish()
}

fn main() -> Result<()> {
    env_logger::init();

    let output_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data.parquet"));

    let mut rng = StdRng::seed_from_u64(42);
    let slope_factor = Normal::new(1.0, 0.3).context("slope distribution")?;
    let band_shift = Normal::new(0.0, 1.5).context("band shift distribution")?;
    let band_scale = Normal::new(1.0, 0.05).context("band scale distribution")?;
    // 600 → 1900 cm⁻¹, wider than the default crop window
    let wavenumbers = raman_axis(1000, 600.0, 1900.0);
    let operators = ["Alice", "Bob"];
    let per_class = 20;

    let mut rows = Rows::default();
    for (label, bands) in class_bands() {
        for i in 0..per_class {
            let mut synth = SyntheticSpectrum::new(wavenumbers.clone())
                .offset(0.2 + 0.1 * rng.random::<f64>())
                .slope(1e-4 * slope_factor.sample(&mut rng))
                .noise(0.01);
            for &(mu, sigma, amp) in &bands {
                let shift = band_shift.sample(&mut rng);
                let scale = band_scale.sample(&mut rng);
                synth = synth.peak(mu + shift, sigma, amp * scale);
            }
            let sp = synth.render(rng.random());

            rows.x.push(sp.x);
            rows.y.push(sp.y);
            rows.label.push(label.to_string());
            rows.split.push(if i % 5 == 4 { "test" } else { "reference" });
            rows.operator.push(operators[i % operators.len()]);
            rows.id.push(rows.id.len() as i64);
        }
    }

    let item = Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("x", DataType::List(item.clone()), false),
        Field::new("y", DataType::List(item), false),
        Field::new("label", DataType::Utf8, false),
        Field::new("split", DataType::Utf8, false),
        Field::new("operator", DataType::Utf8, false),
        Field::new("measurement_id", DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(list_column(&rows.x)),
            Arc::new(list_column(&rows.y)),
            Arc::new(StringArray::from(rows.label.clone())),
            Arc::new(StringArray::from(rows.split.clone())),
            Arc::new(StringArray::from(rows.operator.clone())),
            Arc::new(Int64Array::from(rows.id.clone())),
        ],
    )
    .context("assembling record batch")?;

    let file = std::fs::File::create(&output_path)
        .with_context(|| format!("creating {}", output_path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;

    println!(
        "Wrote {} labeled spectra ({} wavenumbers each) to {}",
        rows.id.len(),
        wavenumbers.len(),
        output_path.display()
    );
    Ok(())
}
