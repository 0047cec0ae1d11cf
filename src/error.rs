use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a projection run. No partial forecast is ever returned
/// alongside one of these.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Schema mismatch: missing features {missing:?}, unexpected features {unexpected:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Model invocation failed at step {step}: {source}")]
    ModelInvocation {
        step: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("Projection cancelled before step {step}")]
    Cancelled { step: u32 },

    #[error("Forecast worker failed: {0}")]
    Worker(String),
}

impl ForecastError {
    pub fn configuration(message: impl Into<String>) -> Self {
        ForecastError::Configuration(message.into())
    }
}

/// Errors raised while resolving a model handle. Kept apart from
/// [`ForecastError`] since loading happens once, before any projection.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode model artifact: {0}")]
    Decode(String),
}
