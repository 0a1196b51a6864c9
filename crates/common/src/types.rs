//! Common types used across the HV screener
//!
//! This module provides the fundamental domain types: assets and their
//! provider identifiers, the provider tag, per-date observations and the
//! normalized single-provider series built from them.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Asset symbol (e.g., "BTC", "ETH")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    /// Create a new Symbol
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Get the symbol as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Market-data provider a series was sourced from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// CoinGecko market chart (spot close and volume only)
    #[serde(alias = "coingecko")]
    CoinGecko,
    /// Binance USDT-M perpetual futures (OHLCV, funding, open interest)
    BinanceFutures,
    /// Kraken spot OHLC
    KrakenSpot,
}

impl ProviderKind {
    /// All providers in default priority order (most comprehensive first)
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::CoinGecko,
        ProviderKind::BinanceFutures,
        ProviderKind::KrakenSpot,
    ];

    /// Short tag written to exports
    pub fn tag(&self) -> &'static str {
        match self {
            ProviderKind::CoinGecko => "coingecko",
            ProviderKind::BinanceFutures => "binance",
            ProviderKind::KrakenSpot => "kraken",
        }
    }

    /// Parse from a config name or export tag (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "coingecko" | "coin_gecko" => Some(Self::CoinGecko),
            "binance" | "binance_futures" => Some(Self::BinanceFutures),
            "kraken" | "kraken_spot" => Some(Self::KrakenSpot),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown provider: {}", s))
    }
}

/// An asset to process and its identifier at each provider.
///
/// Blank identifiers are normalized to `None`, meaning the provider is
/// skipped for this asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub symbol: Symbol,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub coingecko_id: Option<String>,
    #[serde(default)]
    pub binance_symbol: Option<String>,
    #[serde(default)]
    pub kraken_pair: Option<String>,
}

impl AssetDescriptor {
    /// Create a descriptor with no provider identifiers
    pub fn new(symbol: impl Into<Symbol>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            coingecko_id: None,
            binance_symbol: None,
            kraken_pair: None,
        }
    }

    pub fn with_coingecko_id(mut self, id: impl Into<String>) -> Self {
        self.coingecko_id = non_blank(id.into());
        self
    }

    pub fn with_binance_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.binance_symbol = non_blank(symbol.into());
        self
    }

    pub fn with_kraken_pair(mut self, pair: impl Into<String>) -> Self {
        self.kraken_pair = non_blank(pair.into());
        self
    }

    /// Identifier for the given provider, `None` when absent or blank
    pub fn provider_id(&self, provider: ProviderKind) -> Option<&str> {
        let id = match provider {
            ProviderKind::CoinGecko => self.coingecko_id.as_deref(),
            ProviderKind::BinanceFutures => self.binance_symbol.as_deref(),
            ProviderKind::KrakenSpot => self.kraken_pair.as_deref(),
        };
        id.map(str::trim).filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("n/a"))
    }

    /// True when at least one provider can be queried
    pub fn has_any_provider(&self) -> bool {
        ProviderKind::ALL.iter().any(|p| self.provider_id(*p).is_some())
    }
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Inclusive range of UTC dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::invalid_input(format!(
                "date range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days covered (inclusive)
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Start of the range as a UTC instant (midnight of `start`)
    pub fn start_utc(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(NaiveTime::MIN))
    }

    /// Exclusive end instant (midnight after `end`)
    pub fn end_utc_exclusive(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&(self.end + Duration::days(1)).and_time(NaiveTime::MIN))
    }

    pub fn start_millis(&self) -> i64 {
        self.start_utc().timestamp_millis()
    }

    /// Last millisecond inside the range
    pub fn end_millis(&self) -> i64 {
        self.end_utc_exclusive().timestamp_millis() - 1
    }
}

/// Intraday anchor a provider's daily timestamps are normalized to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayAnchor {
    /// 00:00 UTC of the observation date
    Midnight,
    /// 08:00 UTC of the observation date
    EightUtc,
}

impl DayAnchor {
    pub fn timestamp(&self, date: NaiveDate) -> DateTime<Utc> {
        let hour = match self {
            DayAnchor::Midnight => 0,
            DayAnchor::EightUtc => 8,
        };
        let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
        Utc.from_utc_datetime(&date.and_time(time))
    }
}

/// Date of a unix millisecond timestamp, UTC
pub fn date_from_millis(ms: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// One provider's record for one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    /// Close price, always > 0
    pub price: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub quote_volume: Option<f64>,
    pub trade_count: Option<u64>,
    pub funding_rate: Option<f64>,
    pub open_interest: Option<f64>,
    pub open_interest_value: Option<f64>,
}

impl Observation {
    pub fn new(date: NaiveDate, anchor: DayAnchor, price: f64) -> Self {
        Self {
            date,
            timestamp: anchor.timestamp(date),
            price,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            quote_volume: None,
            trade_count: None,
            funding_rate: None,
            open_interest: None,
            open_interest_value: None,
        }
    }

    /// Attach an OHLC bar; `price` stays the close
    pub fn with_ohlc(mut self, open: f64, high: f64, low: f64, close: f64) -> Self {
        self.open = Some(open);
        self.high = Some(high);
        self.low = Some(low);
        self.close = Some(close);
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// Auxiliary numeric columns that can be joined onto a primary series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuxColumn {
    Volume,
    QuoteVolume,
    FundingRate,
    OpenInterest,
    OpenInterestValue,
}

impl AuxColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuxColumn::Volume => "volume",
            AuxColumn::QuoteVolume => "quote_volume",
            AuxColumn::FundingRate => "funding_rate",
            AuxColumn::OpenInterest => "open_interest",
            AuxColumn::OpenInterestValue => "open_interest_value",
        }
    }

    fn slot<'a>(&self, obs: &'a mut Observation) -> &'a mut Option<f64> {
        match self {
            AuxColumn::Volume => &mut obs.volume,
            AuxColumn::QuoteVolume => &mut obs.quote_volume,
            AuxColumn::FundingRate => &mut obs.funding_rate,
            AuxColumn::OpenInterest => &mut obs.open_interest,
            AuxColumn::OpenInterestValue => &mut obs.open_interest_value,
        }
    }
}

/// Which optional columns a series carries.
///
/// A column can be present while individual dates are still `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSet {
    pub ohlc: bool,
    pub volume: bool,
    pub quote_volume: bool,
    pub trade_count: bool,
    pub funding_rate: bool,
    pub open_interest: bool,
    pub open_interest_value: bool,
}

impl ColumnSet {
    pub fn has_high_low(&self) -> bool {
        self.ohlc
    }

    pub fn has(&self, column: AuxColumn) -> bool {
        match column {
            AuxColumn::Volume => self.volume,
            AuxColumn::QuoteVolume => self.quote_volume,
            AuxColumn::FundingRate => self.funding_rate,
            AuxColumn::OpenInterest => self.open_interest,
            AuxColumn::OpenInterestValue => self.open_interest_value,
        }
    }

    pub fn mark(&mut self, column: AuxColumn) {
        match column {
            AuxColumn::Volume => self.volume = true,
            AuxColumn::QuoteVolume => self.quote_volume = true,
            AuxColumn::FundingRate => self.funding_rate = true,
            AuxColumn::OpenInterest => self.open_interest = true,
            AuxColumn::OpenInterestValue => self.open_interest_value = true,
        }
    }

    /// Union of two column sets
    pub fn union(&self, other: &ColumnSet) -> ColumnSet {
        ColumnSet {
            ohlc: self.ohlc || other.ohlc,
            volume: self.volume || other.volume,
            quote_volume: self.quote_volume || other.quote_volume,
            trade_count: self.trade_count || other.trade_count,
            funding_rate: self.funding_rate || other.funding_rate,
            open_interest: self.open_interest || other.open_interest,
            open_interest_value: self.open_interest_value || other.open_interest_value,
        }
    }
}

/// Observations for one asset from exactly one provider.
///
/// Dates are strictly ascending with no duplicates, every price is
/// positive, and every timestamp sits at the series anchor on its date.
/// All three are checked on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    symbol: Symbol,
    provider: ProviderKind,
    anchor: DayAnchor,
    columns: ColumnSet,
    observations: Vec<Observation>,
}

impl NormalizedSeries {
    pub fn new(
        symbol: Symbol,
        provider: ProviderKind,
        anchor: DayAnchor,
        columns: ColumnSet,
        observations: Vec<Observation>,
    ) -> Result<Self> {
        for pair in observations.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(Error::invalid_series(
                    symbol.as_str(),
                    format!(
                        "dates must be strictly ascending, found {} after {}",
                        pair[1].date, pair[0].date
                    ),
                ));
            }
        }

        if let Some(bad) = observations
            .iter()
            .find(|o| o.timestamp != anchor.timestamp(o.date))
        {
            return Err(Error::invalid_series(
                symbol.as_str(),
                format!(
                    "observation on {} stamped {}, expected the {:?} anchor",
                    bad.date, bad.timestamp, anchor
                ),
            ));
        }

        if let Some(bad) = observations
            .iter()
            .find(|o| !(o.price.is_finite() && o.price > 0.0))
        {
            return Err(Error::invalid_series(
                symbol.as_str(),
                format!("non-positive price {} on {}", bad.price, bad.date),
            ));
        }

        Ok(Self {
            symbol,
            provider,
            anchor,
            columns,
            observations,
        })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn anchor(&self) -> DayAnchor {
        self.anchor
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Fill an auxiliary column from a date-keyed map and mark it present.
    ///
    /// Dates missing from `values` are set to `None`. Returns the number of
    /// matched dates.
    pub fn fill_column(&mut self, column: AuxColumn, values: &BTreeMap<NaiveDate, f64>) -> usize {
        let mut matched = 0;
        for obs in &mut self.observations {
            let value = values.get(&obs.date).copied();
            if value.is_some() {
                matched += 1;
            }
            *column.slot(obs) = value;
        }
        self.columns.mark(column);
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn test_symbol() {
        let sym = Symbol::new(" btc ");
        assert_eq!(sym.as_str(), "BTC");
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(ProviderKind::parse("CoinGecko"), Some(ProviderKind::CoinGecko));
        assert_eq!(ProviderKind::parse("binance_futures"), Some(ProviderKind::BinanceFutures));
        assert_eq!(ProviderKind::parse("kraken"), Some(ProviderKind::KrakenSpot));
        assert_eq!(ProviderKind::parse("ftx"), None);
        assert_eq!(ProviderKind::BinanceFutures.tag(), "binance");
    }

    #[test]
    fn test_blank_provider_ids_are_absent() {
        let asset = AssetDescriptor::new("BTC", "Bitcoin")
            .with_coingecko_id("  ")
            .with_binance_symbol("BTCUSDT");
        assert_eq!(asset.provider_id(ProviderKind::CoinGecko), None);
        assert_eq!(asset.provider_id(ProviderKind::BinanceFutures), Some("BTCUSDT"));
        assert!(asset.has_any_provider());

        let mut na = AssetDescriptor::new("XYZ", "");
        na.coingecko_id = Some("N/A".to_string());
        assert!(!na.has_any_provider());
    }

    #[test]
    fn test_date_range_bounds() {
        let range = DateRange::new(date(1), date(3)).unwrap();
        assert_eq!(range.num_days(), 3);
        assert!(range.contains(date(3)));
        assert!(!range.contains(date(4)));
        assert_eq!(range.end_millis() + 1, range.start_millis() + 3 * 86_400_000);
        assert!(DateRange::new(date(3), date(1)).is_err());
    }

    #[test]
    fn test_anchor_timestamp() {
        let ts = DayAnchor::EightUtc.timestamp(date(2));
        assert_eq!(ts.to_rfc3339(), "2025-01-02T08:00:00+00:00");
        assert_eq!(date_from_millis(ts.timestamp_millis()), Some(date(2)));
    }

    #[test]
    fn test_series_rejects_unsorted_dates() {
        let obs = vec![
            Observation::new(date(2), DayAnchor::Midnight, 10.0),
            Observation::new(date(1), DayAnchor::Midnight, 11.0),
        ];
        let result = NormalizedSeries::new(
            Symbol::new("BTC"),
            ProviderKind::KrakenSpot,
            DayAnchor::Midnight,
            ColumnSet::default(),
            obs,
        );
        assert!(matches!(result, Err(Error::InvalidSeries { .. })));
    }

    #[test]
    fn test_series_rejects_duplicate_dates_and_bad_prices() {
        let dup = vec![
            Observation::new(date(1), DayAnchor::Midnight, 10.0),
            Observation::new(date(1), DayAnchor::Midnight, 11.0),
        ];
        assert!(NormalizedSeries::new(
            Symbol::new("BTC"),
            ProviderKind::KrakenSpot,
            DayAnchor::Midnight,
            ColumnSet::default(),
            dup,
        )
        .is_err());

        let zero = vec![Observation::new(date(1), DayAnchor::Midnight, 0.0)];
        assert!(NormalizedSeries::new(
            Symbol::new("BTC"),
            ProviderKind::KrakenSpot,
            DayAnchor::Midnight,
            ColumnSet::default(),
            zero,
        )
        .is_err());
    }

    #[test]
    fn test_fill_column_marks_missing_as_none() {
        let obs = vec![
            Observation::new(date(1), DayAnchor::Midnight, 10.0),
            Observation::new(date(2), DayAnchor::Midnight, 11.0),
        ];
        let mut series = NormalizedSeries::new(
            Symbol::new("BTC"),
            ProviderKind::BinanceFutures,
            DayAnchor::Midnight,
            ColumnSet::default(),
            obs,
        )
        .unwrap();

        let mut values = BTreeMap::new();
        values.insert(date(2), 0.0001);
        let matched = series.fill_column(AuxColumn::FundingRate, &values);

        assert_eq!(matched, 1);
        assert!(series.columns().funding_rate);
        assert_eq!(series.observations()[0].funding_rate, None);
        assert_eq!(series.observations()[1].funding_rate, Some(0.0001));
    }

    #[test]
    fn test_series_rejects_mixed_anchors() {
        let obs = vec![
            Observation::new(date(1), DayAnchor::Midnight, 10.0),
            Observation::new(date(2), DayAnchor::EightUtc, 11.0),
        ];
        let err = NormalizedSeries::new(
            Symbol::new("BTC"),
            ProviderKind::CoinGecko,
            DayAnchor::Midnight,
            ColumnSet::default(),
            obs,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSeries { .. }));
    }
}
