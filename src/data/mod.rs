/// Data layer: core types and the file adapters around the pipeline.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv / .npy          spectrum.csv
///        │                                      │
///        ▼                                      ▼
///   ┌──────────┐                          ┌──────────┐
///   │  loader   │  parse → SpectralDataset │  loader   │  → Spectrum
///   └──────────┘                          └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  select rows by metadata (split, label, ...)
///   └──────────┘
///        │
///        ▼
///   Vec<LabeledSpectrum> ──► PrototypeBuilder ──► store (prototypes.json)
/// ```

pub mod filter;
pub mod loader;
pub mod model;
pub mod store;
