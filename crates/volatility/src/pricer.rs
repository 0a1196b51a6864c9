//! Strike ladders priced from realized volatility

use chrono::NaiveDate;
use common::Symbol;
use config::{PricerConfig, VolatilityInputConfig};
use serde::Serialize;
use tracing::{debug, info};

use crate::black_scholes::{price, OptionSide};
use crate::record::{VolatilityRecord, VolatilityTable};
use crate::{Result, VolatilityError};

/// Which realized-volatility figure to price with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolatilityInput {
    #[default]
    RepresentativeRms,
    Hv(usize),
    Parkinson(usize),
}

impl VolatilityInput {
    pub fn select(&self, record: &VolatilityRecord) -> Option<f64> {
        match self {
            Self::RepresentativeRms => record.rms_vol,
            Self::Hv(w) => record.hv(*w),
            Self::Parkinson(w) => record.parkinson(*w),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::RepresentativeRms => "rms_vol".to_string(),
            Self::Hv(w) => format!("hv_{}d", w),
            Self::Parkinson(w) => format!("parkinson_vol_{}d", w),
        }
    }
}

impl From<VolatilityInputConfig> for VolatilityInput {
    fn from(config: VolatilityInputConfig) -> Self {
        match config {
            VolatilityInputConfig::RepresentativeRms => Self::RepresentativeRms,
            VolatilityInputConfig::Hv { window } => Self::Hv(window),
            VolatilityInputConfig::Parkinson { window } => Self::Parkinson(window),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricerSettings {
    pub days_to_expiry: f64,
    pub band_low: f64,
    pub band_high: f64,
    pub strike_count: usize,
    pub risk_free_rate: f64,
    pub input: VolatilityInput,
}

impl Default for PricerSettings {
    fn default() -> Self {
        Self {
            days_to_expiry: 30.0,
            band_low: 0.8,
            band_high: 1.2,
            strike_count: 5,
            risk_free_rate: 0.05,
            input: VolatilityInput::default(),
        }
    }
}

impl PricerSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.band_low > 0.0 && self.band_low < self.band_high) {
            return Err(VolatilityError::InvalidPricer(format!(
                "strike band must satisfy 0 < low < high, got {} to {}",
                self.band_low, self.band_high
            )));
        }
        if self.strike_count < 2 {
            return Err(VolatilityError::InvalidPricer(format!(
                "strike count must be at least 2, got {}",
                self.strike_count
            )));
        }
        if self.days_to_expiry < 0.0 {
            return Err(VolatilityError::InvalidPricer(format!(
                "days to expiry cannot be negative, got {}",
                self.days_to_expiry
            )));
        }
        Ok(())
    }

    pub fn time_to_expiry_years(&self) -> f64 {
        self.days_to_expiry / 365.0
    }
}

impl From<&PricerConfig> for PricerSettings {
    fn from(config: &PricerConfig) -> Self {
        Self {
            days_to_expiry: config.days_to_expiry,
            band_low: config.strike_band_low,
            band_high: config.strike_band_high,
            strike_count: config.strike_count,
            risk_free_rate: config.risk_free_rate,
            input: config.volatility_input.into(),
        }
    }
}

/// `count` evenly spaced strikes from `spot * low` to `spot * high`
pub fn strike_ladder(spot: f64, low: f64, high: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![spot * low],
        n => {
            let step = (high - low) / (n - 1) as f64;
            (0..n).map(|i| spot * (low + step * i as f64)).collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LadderRow {
    pub strike: f64,
    /// strike / spot
    pub moneyness: f64,
    pub call_price: f64,
    pub put_price: f64,
    pub call_delta: f64,
    pub put_delta: f64,
    pub gamma: f64,
    pub vega: f64,
    /// Call theta
    pub theta: f64,
}

/// Ladder for one asset at its latest date
#[derive(Debug, Clone, PartialEq)]
pub struct AssetQuote {
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub spot: f64,
    pub sigma: f64,
    pub input: VolatilityInput,
    pub rows: Vec<LadderRow>,
}

#[derive(Debug, Clone)]
pub struct OptionsPricer {
    settings: PricerSettings,
}

impl OptionsPricer {
    pub fn new(settings: PricerSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &PricerSettings {
        &self.settings
    }

    pub fn ladder(&self, spot: f64, sigma: f64) -> Vec<LadderRow> {
        let s = &self.settings;
        let t = s.time_to_expiry_years();
        strike_ladder(spot, s.band_low, s.band_high, s.strike_count)
            .into_iter()
            .map(|strike| {
                let call = price(spot, strike, t, s.risk_free_rate, sigma, OptionSide::Call);
                let put = price(spot, strike, t, s.risk_free_rate, sigma, OptionSide::Put);
                LadderRow {
                    strike,
                    moneyness: strike / spot,
                    call_price: call.price,
                    put_price: put.price,
                    call_delta: call.delta,
                    put_delta: put.delta,
                    gamma: call.gamma,
                    vega: call.vega,
                    theta: call.theta,
                }
            })
            .collect()
    }

    /// Price the latest record of `table`; `None` when the chosen input is
    /// undefined there
    pub fn price_latest(&self, table: &VolatilityTable) -> Option<AssetQuote> {
        let latest = table.latest()?;
        let input = self.settings.input;
        let Some(sigma) = input.select(latest) else {
            debug!(symbol = %table.symbol, input = %input.label(), "Volatility input undefined, skipping pricing");
            return None;
        };

        info!(symbol = %table.symbol, spot = latest.close_price, sigma, "Pricing strike ladder");
        Some(AssetQuote {
            symbol: table.symbol.clone(),
            date: latest.date,
            spot: latest.close_price,
            sigma,
            input,
            rows: self.ladder(latest.close_price, sigma),
        })
    }
}
