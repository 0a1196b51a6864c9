//! Market data error types

use common::ProviderKind;
use thiserror::Error;

/// Errors that can occur while fetching or assembling a series
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// Provider kept rate limiting until the attempt budget ran out
    #[error("{provider} rate limited, gave up after {attempts} attempts")]
    RateLimited { provider: ProviderKind, attempts: u32 },

    /// Timeout or transport failure
    #[error("Transient error from {provider}: {message}")]
    Transient {
        provider: ProviderKind,
        message: String,
    },

    /// Nothing usable for this asset
    #[error("No data for {symbol}: {reason}")]
    NoData { symbol: String, reason: String },

    /// Non-success status other than a rate limit
    #[error("HTTP {status} from {provider}")]
    Http { provider: ProviderKind, status: u16 },

    /// Payload lacking the expected shape
    #[error("Malformed payload from {provider}: {message}")]
    Decode {
        provider: ProviderKind,
        message: String,
    },

    /// HTTP client for a provider could not be constructed
    #[error("HTTP client for {provider}: {message}")]
    Client {
        provider: ProviderKind,
        message: String,
    },

    #[error("Operation cancelled")]
    Cancelled,

    /// Auxiliary data from a different provider than the primary series
    #[error("Cannot merge {aux} data into a {primary} series")]
    ProviderMismatch {
        primary: ProviderKind,
        aux: ProviderKind,
    },

    #[error(transparent)]
    Series(#[from] common::Error),
}

impl MarketDataError {
    pub fn no_data(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NoData {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    pub fn decode(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::Decode {
            provider,
            message: message.into(),
        }
    }

    /// Worth retrying the same request
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
