use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading the source dataset. Any of these stops the
/// pipeline before the core runs.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Dataset not found at {path}")]
    DatasetMissing { path: PathBuf },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while writing exports. These are recoverable: callers report
/// them and carry on.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dossier requires a city; select one with --state and --city")]
    DossierNeedsCity,
}

pub type LoadResult<T> = Result<T, LoadError>;
pub type ExportResult<T> = Result<T, ExportError>;
