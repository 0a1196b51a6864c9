//! Rolling realized-volatility estimators
//!
//! Every per-date value uses only observations up to and including that
//! date. Undefined results stay `None`; nothing is defaulted to zero.
//!
//! # Estimators
//!
//! - Close-to-close: sample standard deviation (n - 1) of daily log returns
//!   over the trailing `w` dates, annualized by `sqrt(365)`
//! - Parkinson: `sqrt(mean(ln(H/L)^2) / (4 ln 2) * 365)` over the same dates
//! - RMS blend: `sqrt((hv_a^2 + hv_b^2) / 2)`
//! - Funding: per-interval rate times 3 intervals a day times 365

use common::NormalizedSeries;
use config::{TermStructureConfig, WindowPolicyConfig};
use std::collections::BTreeMap;
use tracing::debug;

use crate::record::{MetricLayout, TermSpread, VolatilityRecord, VolatilityTable, RMS_PAIRS};
use crate::{Result, VolatilityError};

/// Days per year used for annualization
pub const ANNUALIZATION_DAYS: f64 = 365.0;

/// Funding settlements per day on perpetual futures
pub const FUNDING_INTERVALS_PER_DAY: f64 = 3.0;

/// Minimum data a window needs before its estimate is defined:
/// `max(floor, ceil(window * fraction))`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPolicy {
    pub floor: usize,
    pub fraction: f64,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            floor: 2,
            fraction: 0.5,
        }
    }
}

impl WindowPolicy {
    /// Same bounds the config validator enforces
    pub fn new(floor: usize, fraction: f64) -> Result<Self> {
        let problems = WindowPolicyConfig::problems(floor, fraction);
        if !problems.is_empty() {
            return Err(VolatilityError::InvalidPolicy(problems.join("; ")));
        }
        Ok(Self { floor, fraction })
    }

    pub fn min_points(&self, window: usize) -> usize {
        let scaled = (window as f64 * self.fraction).ceil() as usize;
        self.floor.max(scaled)
    }
}

impl TryFrom<&WindowPolicyConfig> for WindowPolicy {
    type Error = VolatilityError;

    fn try_from(config: &WindowPolicyConfig) -> Result<Self> {
        Self::new(config.floor, config.fraction)
    }
}

/// Daily log returns; the first date has none
pub fn log_returns(prices: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(prices.len());
    if prices.is_empty() {
        return out;
    }
    out.push(None);
    out.extend(prices.windows(2).map(|p| {
        let r = (p[1] / p[0]).ln();
        r.is_finite().then_some(r)
    }));
    out
}

/// Sample standard deviation, `None` below two values
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(var.sqrt())
}

pub fn rms_blend(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    let (a, b) = (a?, b?);
    Some(((a * a + b * b) / 2.0).sqrt())
}

pub fn annualize_funding(rate: Option<f64>) -> Option<f64> {
    rate.map(|r| r * FUNDING_INTERVALS_PER_DAY * ANNUALIZATION_DAYS)
}

/// Parkinson estimate from (high, low) pairs; `None` if any pair is unusable
pub fn parkinson(bars: &[(Option<f64>, Option<f64>)]) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    let mut sum = 0.0;
    for &(high, low) in bars {
        let (h, l) = (high?, low?);
        if l <= 0.0 || h < l {
            return None;
        }
        sum += (h / l).ln().powi(2);
    }
    let mean = sum / bars.len() as f64;
    Some((mean / (4.0 * std::f64::consts::LN_2) * ANNUALIZATION_DAYS).sqrt())
}

/// Computes [`VolatilityRecord`]s over a fixed window set
#[derive(Debug, Clone)]
pub struct VolatilityEngine {
    windows: Vec<usize>,
    policy: WindowPolicy,
    term_spread: Option<TermSpread>,
}

impl VolatilityEngine {
    /// Windows are de-duplicated and sorted; zero is rejected
    pub fn new(windows: &[usize], policy: WindowPolicy) -> Result<Self> {
        if let Some(&bad) = windows.iter().find(|&&w| w == 0) {
            return Err(VolatilityError::InvalidWindow(bad));
        }
        let mut windows = windows.to_vec();
        windows.sort_unstable();
        windows.dedup();
        if windows.is_empty() {
            return Err(VolatilityError::NoWindows);
        }
        Ok(Self {
            windows,
            policy,
            term_spread: None,
        })
    }

    /// No spread (and no column) unless both tenors are configured windows
    pub fn with_term_spread(mut self, short: usize, long: usize) -> Self {
        if self.windows.contains(&short) && self.windows.contains(&long) {
            self.term_spread = Some(TermSpread { short, long });
        } else {
            debug!(short, long, windows = ?self.windows, "Term spread tenor not configured, omitting spread");
            self.term_spread = None;
        }
        self
    }

    pub fn with_term_structure(self, config: Option<&TermStructureConfig>) -> Self {
        match config {
            Some(t) => self.with_term_spread(t.short, t.long),
            None => self,
        }
    }

    pub fn windows(&self) -> &[usize] {
        &self.windows
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    pub fn layout(&self, series: &NormalizedSeries) -> MetricLayout {
        MetricLayout {
            columns: *series.columns(),
            windows: self.windows.clone(),
            term_spread: self.term_spread,
        }
    }

    /// One record per observation, in date order
    pub fn compute(&self, series: &NormalizedSeries) -> Vec<VolatilityRecord> {
        let obs = series.observations();
        let prices: Vec<f64> = obs.iter().map(|o| o.price).collect();
        let returns = log_returns(&prices);
        let has_high_low = series.columns().has_high_low();
        let bars: Vec<_> = obs.iter().map(|o| (o.high, o.low)).collect();

        let mut records = Vec::with_capacity(obs.len());
        for (t, o) in obs.iter().enumerate() {
            let mut hv = BTreeMap::new();
            let mut park = BTreeMap::new();

            for &w in &self.windows {
                let start = (t + 1).saturating_sub(w);
                hv.insert(w, self.hv_at(&returns[start..=t], w));
                if has_high_low {
                    park.insert(w, self.parkinson_at(&bars[start..=t], w));
                }
            }

            let blend = |(a, b): (usize, usize)| -> Option<f64> {
                let a = hv.get(&a)?;
                let b = hv.get(&b)?;
                rms_blend(*a, *b)
            };
            let rms_2_3 = blend((2, 3));
            let rms_7_14 = blend((7, 14));
            let rms_vol = RMS_PAIRS
                .iter()
                .find(|(a, b)| self.windows.contains(a) && self.windows.contains(b))
                .and_then(|&pair| blend(pair));

            let term_spread = self.term_spread.and_then(|ts| {
                let short = hv.get(&ts.short).copied().flatten()?;
                let long = hv.get(&ts.long).copied().flatten()?;
                Some(short - long)
            });

            records.push(VolatilityRecord {
                symbol: series.symbol().clone(),
                date: o.date,
                provider: series.provider(),
                close_price: o.price,
                volume: o.volume,
                quote_volume: o.quote_volume,
                trade_count: o.trade_count,
                funding_rate: o.funding_rate,
                annualized_funding_rate: annualize_funding(o.funding_rate),
                open_interest: o.open_interest,
                open_interest_value: o.open_interest_value,
                hv,
                parkinson: park,
                rms_2_3,
                rms_7_14,
                rms_vol,
                term_spread,
            });
        }

        debug!(
            symbol = %series.symbol(),
            records = records.len(),
            windows = ?self.windows,
            "Computed volatility records"
        );
        records
    }

    pub fn compute_table(&self, series: &NormalizedSeries) -> VolatilityTable {
        VolatilityTable {
            symbol: series.symbol().clone(),
            provider: series.provider(),
            layout: self.layout(series),
            records: self.compute(series),
        }
    }

    fn hv_at(&self, returns: &[Option<f64>], window: usize) -> Option<f64> {
        let defined: Vec<f64> = returns.iter().flatten().copied().collect();
        if defined.len() < self.policy.min_points(window) {
            return None;
        }
        sample_std(&defined).map(|s| s * ANNUALIZATION_DAYS.sqrt())
    }

    fn parkinson_at(&self, bars: &[(Option<f64>, Option<f64>)], window: usize) -> Option<f64> {
        if bars.len() < self.policy.min_points(window) {
            return None;
        }
        parkinson(bars)
    }
}
