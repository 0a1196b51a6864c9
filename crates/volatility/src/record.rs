//! Per-date volatility records and the column layout shared by summaries
//! and exports

use chrono::NaiveDate;
use common::{ColumnSet, ProviderKind, Symbol};
use serde::Serialize;
use std::collections::BTreeMap;

/// Blend pairs produced when both windows are configured, in preference
/// order for the representative blend
pub const RMS_PAIRS: [(usize, usize); 2] = [(7, 14), (2, 3)];

/// Short/long tenor pair for the HV term spread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TermSpread {
    pub short: usize,
    pub long: usize,
}

/// Metrics for one (asset, date), computed from the trailing window ending
/// at that date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityRecord {
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub provider: ProviderKind,
    pub close_price: f64,
    pub volume: Option<f64>,
    pub quote_volume: Option<f64>,
    pub trade_count: Option<u64>,
    pub funding_rate: Option<f64>,
    pub annualized_funding_rate: Option<f64>,
    pub open_interest: Option<f64>,
    pub open_interest_value: Option<f64>,
    /// Keyed by window length in days
    pub hv: BTreeMap<usize, Option<f64>>,
    /// Empty unless the series carried high/low
    pub parkinson: BTreeMap<usize, Option<f64>>,
    pub rms_2_3: Option<f64>,
    pub rms_7_14: Option<f64>,
    pub rms_vol: Option<f64>,
    pub term_spread: Option<f64>,
}

impl VolatilityRecord {
    pub fn hv(&self, window: usize) -> Option<f64> {
        self.hv.get(&window).copied().flatten()
    }

    pub fn parkinson(&self, window: usize) -> Option<f64> {
        self.parkinson.get(&window).copied().flatten()
    }

    pub fn rms(&self, pair: (usize, usize)) -> Option<f64> {
        match pair {
            (2, 3) => self.rms_2_3,
            (7, 14) => self.rms_7_14,
            _ => None,
        }
    }

    /// Value of a numeric column, `None` when undefined
    pub fn value(&self, column: MetricColumn) -> Option<f64> {
        match column {
            MetricColumn::Volume => self.volume,
            MetricColumn::QuoteVolume => self.quote_volume,
            MetricColumn::Trades => self.trade_count.map(|n| n as f64),
            MetricColumn::FundingRate => self.funding_rate,
            MetricColumn::AnnualizedFundingRate => self.annualized_funding_rate,
            MetricColumn::OpenInterest => self.open_interest,
            MetricColumn::OpenInterestValue => self.open_interest_value,
            MetricColumn::Hv(w) => self.hv(w),
            MetricColumn::Parkinson(w) => self.parkinson(w),
            MetricColumn::Rms(a, b) => self.rms((a, b)),
            MetricColumn::RmsVol => self.rms_vol,
            MetricColumn::TermSpread(_, _) => self.term_spread,
        }
    }
}

/// Optional numeric column of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricColumn {
    Volume,
    QuoteVolume,
    Trades,
    FundingRate,
    AnnualizedFundingRate,
    OpenInterest,
    OpenInterestValue,
    Hv(usize),
    Parkinson(usize),
    Rms(usize, usize),
    RmsVol,
    TermSpread(usize, usize),
}

impl MetricColumn {
    /// CSV header name
    pub fn name(&self) -> String {
        match self {
            Self::Volume => "volume".to_string(),
            Self::QuoteVolume => "quote_volume".to_string(),
            Self::Trades => "trades".to_string(),
            Self::FundingRate => "funding_rate".to_string(),
            Self::AnnualizedFundingRate => "annualized_funding_rate".to_string(),
            Self::OpenInterest => "open_interest".to_string(),
            Self::OpenInterestValue => "open_interest_value".to_string(),
            Self::Hv(w) => format!("hv_{}d", w),
            Self::Parkinson(w) => format!("parkinson_vol_{}d", w),
            Self::Rms(a, b) => format!("rms_{}_{}", a, b),
            Self::RmsVol => "rms_vol".to_string(),
            Self::TermSpread(s, l) => format!("term_spread_{}_{}", s, l),
        }
    }
}

/// Which columns a set of records carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricLayout {
    pub columns: ColumnSet,
    pub windows: Vec<usize>,
    pub term_spread: Option<TermSpread>,
}

impl MetricLayout {
    pub fn rms_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs: Vec<_> = RMS_PAIRS
            .into_iter()
            .filter(|(a, b)| self.windows.contains(a) && self.windows.contains(b))
            .collect();
        pairs.sort();
        pairs
    }

    /// Ordered list of the optional columns present
    pub fn metric_columns(&self) -> Vec<MetricColumn> {
        let c = &self.columns;
        let mut out = Vec::new();

        if c.volume {
            out.push(MetricColumn::Volume);
        }
        if c.quote_volume {
            out.push(MetricColumn::QuoteVolume);
        }
        if c.trade_count {
            out.push(MetricColumn::Trades);
        }
        if c.funding_rate {
            out.push(MetricColumn::FundingRate);
            out.push(MetricColumn::AnnualizedFundingRate);
        }
        if c.open_interest {
            out.push(MetricColumn::OpenInterest);
        }
        if c.open_interest_value {
            out.push(MetricColumn::OpenInterestValue);
        }

        out.extend(self.windows.iter().map(|&w| MetricColumn::Hv(w)));
        if c.has_high_low() {
            out.extend(self.windows.iter().map(|&w| MetricColumn::Parkinson(w)));
        }

        let pairs = self.rms_pairs();
        out.extend(pairs.iter().map(|&(a, b)| MetricColumn::Rms(a, b)));
        if !pairs.is_empty() {
            out.push(MetricColumn::RmsVol);
        }

        if let Some(t) = self.term_spread {
            out.push(MetricColumn::TermSpread(t.short, t.long));
        }
        out
    }

    pub fn union(&self, other: &MetricLayout) -> MetricLayout {
        let mut windows = self.windows.clone();
        windows.extend(other.windows.iter().copied());
        windows.sort_unstable();
        windows.dedup();
        MetricLayout {
            columns: self.columns.union(&other.columns),
            windows,
            term_spread: self.term_spread.or(other.term_spread),
        }
    }
}

/// All records for one asset
#[derive(Debug, Clone)]
pub struct VolatilityTable {
    pub symbol: Symbol,
    pub provider: ProviderKind,
    pub layout: MetricLayout,
    pub records: Vec<VolatilityRecord>,
}

impl VolatilityTable {
    pub fn latest(&self) -> Option<&VolatilityRecord> {
        self.records.last()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
