//! Common error types for the HV screener

use thiserror::Error;

/// Common error type used across crates
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input was provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A series violated its ordering or price invariants
    #[error("Invalid series for {symbol}: {message}")]
    InvalidSeries { symbol: String, message: String },
}

/// Result type alias using the common Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an invalid series error
    pub fn invalid_series(symbol: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidSeries {
            symbol: symbol.into(),
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            Error::invalid_input("end before start").to_string(),
            "Invalid input: end before start"
        );
        assert_eq!(
            Error::invalid_series("BTC", "dates not increasing").to_string(),
            "Invalid series for BTC: dates not increasing"
        );
    }
}
