//! Collector error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    /// Not a single asset produced records
    #[error("No results: none of {attempted} assets produced data")]
    NoResults { attempted: usize },

    #[error("Export failed: {0}")]
    Export(#[from] volatility::VolatilityError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CollectorError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
