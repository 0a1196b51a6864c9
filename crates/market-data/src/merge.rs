//! Joining auxiliary columns onto a primary series

use chrono::NaiveDate;
use common::{AuxColumn, NormalizedSeries, ProviderKind};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{MarketDataError, Result};

/// Date-keyed values for one auxiliary column from one provider
#[derive(Debug, Clone)]
pub struct AuxSeries {
    pub provider: ProviderKind,
    pub column: AuxColumn,
    pub points: Vec<(NaiveDate, f64)>,
}

impl AuxSeries {
    pub fn new(provider: ProviderKind, column: AuxColumn, points: Vec<(NaiveDate, f64)>) -> Self {
        Self {
            provider,
            column,
            points,
        }
    }
}

/// Outcome of one merge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    /// Primary dates that received a value
    pub matched: usize,
    /// Later records for an already-seen date, dropped
    pub duplicates: usize,
}

/// Left-joins auxiliary series onto a primary series by exact date.
///
/// Unmatched dates become `None`. For duplicate dates the first record in
/// input order wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeriesMerger;

impl SeriesMerger {
    pub fn new() -> Self {
        Self
    }

    pub fn merge(&self, series: &mut NormalizedSeries, aux: &AuxSeries) -> Result<MergeStats> {
        if aux.provider != series.provider() {
            return Err(MarketDataError::ProviderMismatch {
                primary: series.provider(),
                aux: aux.provider,
            });
        }

        let mut values = BTreeMap::new();
        let mut duplicates = 0;
        for &(date, value) in &aux.points {
            if values.contains_key(&date) {
                duplicates += 1;
            } else {
                values.insert(date, value);
            }
        }

        if duplicates > 0 {
            debug!(
                symbol = %series.symbol(),
                column = aux.column.as_str(),
                duplicates,
                "Dropped duplicate auxiliary records"
            );
        }

        let matched = series.fill_column(aux.column, &values);
        debug!(
            symbol = %series.symbol(),
            column = aux.column.as_str(),
            matched,
            total = series.len(),
            "Merged auxiliary column"
        );

        Ok(MergeStats {
            matched,
            duplicates,
        })
    }
}

/// Average intraday values into one value per UTC date, ascending
pub fn daily_mean(points: impl IntoIterator<Item = (NaiveDate, f64)>) -> Vec<(NaiveDate, f64)> {
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for (date, value) in points {
        let entry = sums.entry(date).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(date, (sum, n))| (date, sum / n as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use common::{ColumnSet, DayAnchor, Observation, Symbol};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn series(provider: ProviderKind) -> NormalizedSeries {
        let obs = (1..=3)
            .map(|d| Observation::new(date(d), DayAnchor::Midnight, 100.0 + d as f64))
            .collect();
        NormalizedSeries::new(
            Symbol::new("ETH"),
            provider,
            DayAnchor::Midnight,
            ColumnSet::default(),
            obs,
        )
        .unwrap()
    }

    #[test]
    fn test_left_join_leaves_gaps_as_none() {
        let mut s = series(ProviderKind::BinanceFutures);
        let aux = AuxSeries::new(
            ProviderKind::BinanceFutures,
            AuxColumn::OpenInterest,
            vec![(date(1), 10.0), (date(3), 30.0), (date(9), 90.0)],
        );

        let stats = SeriesMerger::new().merge(&mut s, &aux).unwrap();

        assert_eq!(stats.matched, 2);
        assert!(s.columns().open_interest);
        let oi: Vec<_> = s.observations().iter().map(|o| o.open_interest).collect();
        assert_eq!(oi, vec![Some(10.0), None, Some(30.0)]);
    }

    #[test]
    fn test_first_duplicate_wins() {
        let mut s = series(ProviderKind::BinanceFutures);
        let aux = AuxSeries::new(
            ProviderKind::BinanceFutures,
            AuxColumn::FundingRate,
            vec![(date(2), 0.0001), (date(2), 0.0005)],
        );

        let stats = SeriesMerger::new().merge(&mut s, &aux).unwrap();

        assert_eq!(stats.duplicates, 1);
        assert_eq!(s.observations()[1].funding_rate, Some(0.0001));
    }

    #[test]
    fn test_cross_provider_merge_rejected() {
        let mut s = series(ProviderKind::CoinGecko);
        let aux = AuxSeries::new(ProviderKind::BinanceFutures, AuxColumn::FundingRate, vec![]);

        let err = SeriesMerger::new().merge(&mut s, &aux).unwrap_err();
        assert_matches!(err, MarketDataError::ProviderMismatch { .. });
        assert!(!s.columns().funding_rate);
    }

    #[test]
    fn test_daily_mean() {
        let out = daily_mean(vec![
            (date(1), 0.0001),
            (date(1), 0.0003),
            (date(1), 0.0002),
            (date(2), -0.0001),
        ]);
        assert_eq!(out.len(), 2);
        assert!((out[0].1 - 0.0002).abs() < 1e-12);
        assert_eq!(out[1], (date(2), -0.0001));
    }
}
