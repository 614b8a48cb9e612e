use thiserror::Error;

// ---------------------------------------------------------------------------
// Core error taxonomy
// ---------------------------------------------------------------------------

/// Errors raised by the numeric pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectrumError {
    /// Malformed, too short, non-finite, constant or duplicate-coordinate
    /// spectrum, or malformed feature input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unrecognized or out-of-range configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Feature and prototype dimensions disagree.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Classification requested with no prototypes available.
    #[error("no prototypes available")]
    EmptyPrototypeSet,
}

impl SpectrumError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        SpectrumError::Validation(msg.into())
    }

    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        SpectrumError::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SpectrumError>;
