//! Provider adapters
//!
//! Each adapter turns one provider's paginated endpoints into a
//! [`NormalizedSeries`] for one asset.

mod binance;
mod coingecko;
mod kraken;

pub use binance::BinanceFuturesAdapter;
pub use coingecko::CoinGeckoAdapter;
pub use kraken::KrakenSpotAdapter;

use async_trait::async_trait;
use common::{
    AssetDescriptor, ColumnSet, DateRange, DayAnchor, NormalizedSeries, Observation, ProviderKind,
};
use config::ProviderSettings;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::paginate::FetchContext;
use crate::{MarketDataError, Result};

/// Client trait for one market-data provider
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Daily series for `asset` over the inclusive `range`.
    ///
    /// Returns [`MarketDataError::NoData`] when the asset has no identifier
    /// for this provider or the provider returned nothing in range.
    async fn fetch(&self, asset: &AssetDescriptor, range: &DateRange) -> Result<NormalizedSeries>;
}

/// Build the adapter for `kind`
pub fn build_adapter(
    kind: ProviderKind,
    settings: &ProviderSettings,
    ctx: FetchContext,
) -> Arc<dyn SourceAdapter> {
    match kind {
        ProviderKind::CoinGecko => Arc::new(CoinGeckoAdapter::new(settings.clone(), ctx)),
        ProviderKind::BinanceFutures => Arc::new(BinanceFuturesAdapter::new(settings.clone(), ctx)),
        ProviderKind::KrakenSpot => Arc::new(KrakenSpotAdapter::new(settings.clone(), ctx)),
    }
}

/// The asset's identifier for `kind`, or `NoData`
fn require_id(asset: &AssetDescriptor, kind: ProviderKind) -> Result<&str> {
    asset.provider_id(kind).ok_or_else(|| {
        MarketDataError::no_data(
            asset.symbol.as_str(),
            format!("no {} identifier", kind.tag()),
        )
    })
}

/// Assemble a series: drop out-of-range dates, keep the first observation
/// per date and sort ascending
fn assemble(
    asset: &AssetDescriptor,
    provider: ProviderKind,
    anchor: DayAnchor,
    columns: ColumnSet,
    range: &DateRange,
    observations: impl IntoIterator<Item = Observation>,
) -> Result<NormalizedSeries> {
    let mut by_date = BTreeMap::new();
    let mut dropped = 0usize;
    for obs in observations {
        if !range.contains(obs.date) || !(obs.price.is_finite() && obs.price > 0.0) {
            dropped += 1;
            continue;
        }
        by_date.entry(obs.date).or_insert(obs);
    }

    if dropped > 0 {
        debug!(symbol = %asset.symbol, provider = %provider, dropped, "Dropped out-of-range or unusable rows");
    }

    if by_date.is_empty() {
        return Err(MarketDataError::no_data(
            asset.symbol.as_str(),
            format!("{} returned no rows in range", provider.tag()),
        ));
    }

    Ok(NormalizedSeries::new(
        asset.symbol.clone(),
        provider,
        anchor,
        columns,
        by_date.into_values().collect(),
    )?)
}

/// JSON number or numeric string
fn json_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_json(provider: ProviderKind, body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| MarketDataError::decode(provider, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_json_numbers() {
        assert_eq!(json_f64(&json!("1.5")), Some(1.5));
        assert_eq!(json_f64(&json!(2)), Some(2.0));
        assert_eq!(json_f64(&json!(null)), None);
        assert_eq!(json_i64(&json!(1_700_000_000_000i64)), Some(1_700_000_000_000));
        assert_eq!(json_i64(&json!("12")), Some(12));
    }

    #[test]
    fn test_assemble_filters_and_dedups() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 1, day).unwrap();
        let asset = AssetDescriptor::new("BTC", "Bitcoin");
        let range = DateRange::new(d(2), d(3)).unwrap();
        let obs = vec![
            Observation::new(d(3), DayAnchor::Midnight, 30.0),
            Observation::new(d(1), DayAnchor::Midnight, 10.0),
            Observation::new(d(2), DayAnchor::Midnight, 20.0),
            Observation::new(d(2), DayAnchor::Midnight, 21.0),
        ];

        let series = assemble(
            &asset,
            ProviderKind::KrakenSpot,
            DayAnchor::Midnight,
            ColumnSet::default(),
            &range,
            obs,
        )
        .unwrap();

        let prices: Vec<_> = series.observations().iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![20.0, 30.0]);
    }

    #[test]
    fn test_assemble_empty_is_no_data() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let asset = AssetDescriptor::new("BTC", "Bitcoin");
        let range = DateRange::new(d, d).unwrap();
        let err = assemble(
            &asset,
            ProviderKind::KrakenSpot,
            DayAnchor::Midnight,
            ColumnSet::default(),
            &range,
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, MarketDataError::NoData { .. }));
    }
}
