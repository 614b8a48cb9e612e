//! Command line interface for the rusty-raman pipeline.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use rusty_raman::{DuplicatePolicy, NormalizeMode, PipelineConfig};

/// Raman spectrum conditioning, fingerprinting and prototype classification
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Condition a spectrum and print x / raw / processed arrays as JSON
    Preprocess(PreprocessCommand),

    /// Print the feature vector of a spectrum as JSON
    Features(FeaturesCommand),

    /// Build per-label prototypes from a labeled reference dataset
    Build(BuildCommand),

    /// Classify a spectrum against a prototype file
    Classify(ClassifyCommand),
}

#[derive(Parser, Debug)]
pub struct PreprocessCommand {
    /// Two-column spectrum CSV
    pub spectrum: PathBuf,

    /// Downsample the output to at most this many points
    #[arg(long)]
    pub max_points: Option<usize>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Parser, Debug)]
pub struct FeaturesCommand {
    /// Two-column spectrum CSV
    pub spectrum: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Parser, Debug)]
pub struct BuildCommand {
    /// Reference dataset (.parquet, .json or .csv)
    #[arg(long, conflicts_with = "npy_dir", required_unless_present = "npy_dir")]
    pub dataset: Option<PathBuf>,

    /// Directory with wavenumbers.npy, X_<split>.npy and y_<split>.npy
    #[arg(long)]
    pub npy_dir: Option<PathBuf>,

    /// Split name, recorded in the output and used to pick npy files
    #[arg(long, default_value = "reference")]
    pub split: String,

    /// Metadata column holding the class label
    #[arg(long, default_value = "label")]
    pub label_column: String,

    /// Keep only rows where COLUMN equals VALUE (repeatable)
    #[arg(long, value_name = "COLUMN=VALUE")]
    pub select: Vec<String>,

    /// Use at most this many samples
    #[arg(long)]
    pub max_samples: Option<usize>,

    /// Skip samples that fail validation instead of aborting
    #[arg(long)]
    pub skip_invalid: bool,

    /// Output prototype file
    #[arg(short, long, default_value = "prototypes.json")]
    pub output: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Parser, Debug)]
pub struct ClassifyCommand {
    /// Two-column spectrum CSV
    pub spectrum: PathBuf,

    /// Prototype file produced by `build`
    #[arg(short, long, default_value = "prototypes.json")]
    pub prototypes: PathBuf,

    /// JSON object mapping labels to display names
    #[arg(long)]
    pub label_map: Option<PathBuf>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

/// Pipeline settings shared by every command. Flags override the config
/// file, which overrides the defaults.
#[derive(Args, Debug, Default)]
pub struct PipelineArgs {
    /// JSON pipeline config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Crop window in wavenumbers
    #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"], conflicts_with = "no_crop")]
    pub crop: Option<Vec<f64>>,

    /// Disable cropping
    #[arg(long)]
    pub no_crop: bool,

    /// Moving-average window (forced odd, at least 3)
    #[arg(long)]
    pub smooth_window: Option<usize>,

    /// Baseline polynomial degree (clamped into 1..=8)
    #[arg(long)]
    pub baseline_degree: Option<usize>,

    /// Normalization: minmax, zscore or none
    #[arg(long)]
    pub normalize: Option<NormalizeMode>,

    /// Keep duplicate wavenumbers instead of rejecting the spectrum
    #[arg(long)]
    pub tolerate_duplicates: bool,

    /// Number of peak slots in the feature vector
    #[arg(long)]
    pub max_peaks: Option<usize>,

    /// Minimum peak prominence as a fraction of the signal range
    #[arg(long)]
    pub peak_prominence_ratio: Option<f64>,

    /// Skip peak detection (all peak features zero)
    #[arg(long)]
    pub no_peaks: bool,
}

impl PipelineArgs {
    /// Resolve the effective config starting from `base` (or the config
    /// file, or the defaults).
    pub fn resolve(&self, base: Option<PipelineConfig>) -> anyhow::Result<PipelineConfig> {
        let mut cfg = match (&self.config, base) {
            (Some(path), _) => PipelineConfig::from_json_file(path)?,
            (None, Some(base)) => base,
            (None, None) => PipelineConfig::default(),
        };
        let pre = &mut cfg.preprocess;
        if let Some(bounds) = &self.crop {
            pre.crop = Some((bounds[0], bounds[1]));
        }
        if self.no_crop {
            pre.crop = None;
        }
        if let Some(w) = self.smooth_window {
            pre.smooth_window = w;
        }
        if let Some(d) = self.baseline_degree {
            pre.baseline_degree = d;
        }
        if let Some(mode) = self.normalize {
            pre.normalize = mode;
        }
        if self.tolerate_duplicates {
            pre.duplicates = DuplicatePolicy::Tolerate;
        }
        if let Some(n) = self.max_peaks {
            cfg.features.max_peaks = n;
        }
        if let Some(r) = self.peak_prominence_ratio {
            cfg.features.peak_prominence_ratio = r;
        }
        if self.no_peaks {
            cfg.features.detect_peaks = false;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Split `COLUMN=VALUE`.
pub fn parse_selection(s: &str) -> anyhow::Result<(String, String)> {
    match s.split_once('=') {
        Some((col, val)) if !col.trim().is_empty() => {
            Ok((col.trim().to_string(), val.trim().to_string()))
        }
        _ => anyhow::bail!("selection must look like COLUMN=VALUE (got '{s}')"),
    }
}

pub fn display_path(p: &Path) -> String {
    p.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| p.display().to_string())
}
