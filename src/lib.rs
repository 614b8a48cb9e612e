//! Raman spectrum conditioning, fingerprinting and prototype classification.
//!
//! The numeric core lives in [`pipeline`]; [`data`] holds the types it works
//! on plus file adapters, [`state`] publishes prototype sets to concurrent
//! readers.

pub mod confidence;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod state;
pub mod synth;

pub use config::{DuplicatePolicy, FeatureConfig, NormalizeMode, PipelineConfig, PreprocessConfig};
pub use data::model::{ConditionedSpectrum, FeatureVector, LabeledSpectrum, Spectrum};
pub use error::{Result, SpectrumError};
