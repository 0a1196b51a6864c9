//! Common types and utilities for the HV screener
//!
//! This crate provides the domain types shared by the acquisition
//! pipeline and the volatility engine.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Assets, providers, observations and normalized series

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
