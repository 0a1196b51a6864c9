//! Observability for the HV screener
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics for the collection pipeline
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("hvx", LogFormat::Pretty)?;
//!
//! // Optional Prometheus exporter
//! observability::metrics::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_named, LogFormat};
pub use metrics::{init_metrics, PageTimer, PipelineMetrics};
