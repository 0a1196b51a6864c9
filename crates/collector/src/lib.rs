//! Collection pipeline for the HV screener
//!
//! Ties the provider chain, the volatility engine and the pricer into one
//! batch run over the asset catalog.
//!
//! ```ignore
//! let shutdown = ShutdownController::with_ctrl_c();
//! let ctx = RunContext::from_config(&config, assets, shutdown.token(), metrics)?;
//! let report = run_batch(Arc::new(ctx)).await?;
//! report.export(&config.output, config.pricer.days_to_expiry)?;
//! ```

pub mod context;
pub mod error;
pub mod pipeline;
pub mod shutdown;

pub use context::RunContext;
pub use error::CollectorError;
pub use pipeline::{run_batch, AssetOutcome, BatchReport, ExportedFiles};
pub use shutdown::ShutdownController;

pub type Result<T> = std::result::Result<T, CollectorError>;
