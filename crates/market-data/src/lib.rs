//! Daily market data acquisition
//!
//! This crate turns provider REST endpoints into validated daily series.
//!
//! # Core Components
//!
//! - [`transport`] - HTTP client seam with a reqwest implementation and a scripted mock
//! - [`pacing`] - Minimum request spacing and retry/backoff policy
//! - [`paginate`] - Cursor-driven pagination with rate-limit retries
//! - [`sources`] - CoinGecko, Binance futures and Kraken spot adapters
//! - [`merge`] - Date-keyed merge of auxiliary columns into a primary series
//! - [`orchestrator`] - Ordered provider fallback per asset
//!
//! # Key Invariants
//!
//! - A series comes from exactly one provider, auxiliary columns included
//! - Dates are unique and strictly ascending
//! - A rate-limited page is retried from the same cursor, never skipped
//! - Cancellation interrupts every wait and propagates as `Cancelled`

pub mod error;
pub mod merge;
pub mod orchestrator;
pub mod pacing;
pub mod paginate;
pub mod sources;
pub mod transport;

pub use error::MarketDataError;
pub use merge::{AuxSeries, MergeStats, SeriesMerger};
pub use orchestrator::{
    AttemptOutcome, FallbackOrchestrator, ProviderAttempt, ProviderSlot, ResolvedSeries,
};
pub use pacing::{cancellable_sleep, RequestLimiter, RetryPolicy};
pub use paginate::FetchContext;
pub use sources::{
    build_adapter, BinanceFuturesAdapter, CoinGeckoAdapter, KrakenSpotAdapter, SourceAdapter,
};
pub use transport::{HttpClient, HttpRequest, HttpResponse, MockHttpClient, ReqwestHttpClient};

pub type Result<T> = std::result::Result<T, MarketDataError>;
