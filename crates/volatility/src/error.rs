//! Volatility error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VolatilityError {
    #[error("At least one window is required")]
    NoWindows,

    #[error("Window must be at least 1 day, got {0}")]
    InvalidWindow(usize),

    #[error("Invalid window policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid pricer parameter: {0}")]
    InvalidPricer(String),

    /// Writing an output file failed
    #[error("Failed to write {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VolatilityError {
    pub fn export(path: impl Into<PathBuf>, source: impl Into<csv::Error>) -> Self {
        Self::Export {
            path: path.into(),
            source: source.into(),
        }
    }
}
