mod cli;

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use cli::{BuildCommand, ClassifyCommand, Cli, Commands, FeaturesCommand, PreprocessCommand};
use rusty_raman::confidence::ConfidencePolicy;
use rusty_raman::data::{filter, loader, store};
use rusty_raman::pipeline::{
    self, features::feature_names, BuildOptions, FeatureExtractor, PrototypeBuilder,
};
use rusty_raman::state::PrototypeStore;
use rusty_raman::LabeledSpectrum;

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Commands::Preprocess(cmd) => run_preprocess(cmd),
        Commands::Features(cmd) => run_features(cmd),
        Commands::Build(cmd) => run_build(cmd),
        Commands::Classify(cmd) => run_classify(cmd),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// preprocess / features
// ---------------------------------------------------------------------------

fn run_preprocess(cmd: PreprocessCommand) -> Result<()> {
    let config = cmd.pipeline.resolve(None)?;
    let spectrum = loader::load_spectrum_csv(&cmd.spectrum)?;
    let conditioned = pipeline::preprocess(&spectrum, &config.preprocess)
        .with_context(|| format!("preprocessing {}", cmd.spectrum.display()))?;
    log::info!(
        "Conditioned {} of {} points from {}",
        conditioned.len(),
        spectrum.len(),
        cmd.spectrum.display()
    );
    match cmd.max_points {
        Some(max) => print_json(&conditioned.downsampled(max)),
        None => print_json(&conditioned),
    }
}

#[derive(Serialize)]
struct FeatureReport {
    feature_dim: usize,
    names: Vec<String>,
    features: Vec<f64>,
}

fn run_features(cmd: FeaturesCommand) -> Result<()> {
    let config = cmd.pipeline.resolve(None)?;
    let spectrum = loader::load_spectrum_csv(&cmd.spectrum)?;
    let conditioned = pipeline::preprocess(&spectrum, &config.preprocess)
        .with_context(|| format!("preprocessing {}", cmd.spectrum.display()))?;
    let features = FeatureExtractor::new(config.features.clone()).extract(&conditioned)?;
    print_json(&FeatureReport {
        feature_dim: features.dim(),
        names: feature_names(config.features.max_peaks),
        features: features.into_inner(),
    })
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

fn run_build(cmd: BuildCommand) -> Result<()> {
    let config = cmd.pipeline.resolve(None)?;

    let samples: Vec<LabeledSpectrum> = match (&cmd.dataset, &cmd.npy_dir) {
        (Some(path), _) => {
            let mut dataset = loader::load_dataset(path)?;
            for sel in &cmd.select {
                let (column, value) = cli::parse_selection(sel)?;
                dataset = filter::select_rows(dataset, &column, &[value]);
            }
            let labels = dataset.labels(&cmd.label_column);
            log::info!("Labels in '{}': {labels:?}", cmd.label_column);
            dataset.into_labeled(&cmd.label_column)?
        }
        (None, Some(dir)) => loader::load_npy_split(dir, &cmd.split)?,
        (None, None) => anyhow::bail!("either --dataset or --npy-dir is required"),
    };

    let fx = FeatureExtractor::new(config.features.clone());
    let (set, meta) = PrototypeBuilder::new(&config, &fx)
        .options(BuildOptions {
            max_samples: cmd.max_samples,
            skip_invalid: cmd.skip_invalid,
        })
        .build(&samples)
        .context("building prototypes")?;

    let file = store::PrototypeFile::new(&set, &meta, &config, Some(cmd.split.clone()));
    store::save_prototypes(&cmd.output, &file)?;
    println!(
        "Saved prototypes to {}: labels={:?}, feature_dim={}, N={}",
        cmd.output.display(),
        meta.labels,
        meta.feature_dim,
        meta.num_samples
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ClassifyReport {
    spectrum: String,
    feature_dim: usize,
    label: Option<String>,
    label_display: Option<String>,
    score: Option<f64>,
    confidence: f64,
    all_scores: Option<BTreeMap<String, f64>>,
}

fn run_classify(cmd: ClassifyCommand) -> Result<()> {
    let store = PrototypeStore::open(&cmd.prototypes)?;
    let published = store.snapshot();
    // settings recorded at build time keep online features comparable
    let config = cmd.pipeline.resolve(published.config.clone())?;
    let label_map = match &cmd.label_map {
        Some(path) => store::load_label_map(path)?,
        None => store::LabelMap::new(),
    };

    let spectrum = loader::load_spectrum_csv(&cmd.spectrum)?;
    let analysis = pipeline::analyze(
        &spectrum,
        &config,
        &FeatureExtractor::new(config.features.clone()),
        &published.prototypes,
        &ConfidencePolicy::default(),
    )
    .with_context(|| format!("analyzing {}", cmd.spectrum.display()))?;

    if analysis.classification.is_none() {
        log::warn!("No prototypes loaded; confidence falls back to signal heuristic");
    }
    let classification = analysis.classification.as_ref();
    let label = classification.map(|c| c.best_label.clone());
    let label_display = label
        .as_ref()
        .map(|l| label_map.get(l).cloned().unwrap_or_else(|| l.clone()));

    print_json(&ClassifyReport {
        spectrum: cli::display_path(&cmd.spectrum),
        feature_dim: analysis.feature_dim(),
        label,
        label_display,
        score: classification.map(|c| c.best_score),
        confidence: (analysis.confidence * 1000.0).round() / 1000.0,
        all_scores: classification.map(|c| c.all_scores.clone()),
    })
}
