//! Realized volatility for daily series
//!
//! # Core Components
//!
//! - [`engine`] - Rolling close-to-close, Parkinson and blended estimators
//! - [`record`] - Per-date records and the column layout they share
//! - [`black_scholes`] - Closed-form European option price and Greeks
//! - [`pricer`] - Strike ladders priced from a chosen volatility input
//! - [`summary`] - One summary row per asset
//! - [`export`] - CSV writers
//!
//! # Key Invariants
//!
//! - No look-ahead: a record depends only on data up to its own date
//! - Undefined metrics are `None` end to end, never zero

pub mod black_scholes;
pub mod engine;
pub mod error;
pub mod export;
pub mod pricer;
pub mod record;
pub mod summary;

pub use black_scholes::{OptionQuote, OptionSide};
pub use engine::{VolatilityEngine, WindowPolicy};
pub use error::VolatilityError;
pub use export::{combined_layout, write_quotes, write_records, write_summaries};
pub use pricer::{AssetQuote, LadderRow, OptionsPricer, PricerSettings, VolatilityInput};
pub use record::{MetricColumn, MetricLayout, TermSpread, VolatilityRecord, VolatilityTable};
pub use summary::{ColumnStat, SummaryBuilder, SummaryRecord};

pub type Result<T> = std::result::Result<T, VolatilityError>;
