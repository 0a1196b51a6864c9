//! Per-asset summary statistics

use chrono::NaiveDate;
use common::{ProviderKind, Symbol};

use crate::record::{MetricColumn, VolatilityTable};

/// Mean over defined values and the value on the last date
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStat {
    pub column: MetricColumn,
    pub mean: Option<f64>,
    pub current: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRecord {
    pub symbol: Symbol,
    pub provider: ProviderKind,
    pub data_points: usize,
    pub date_range_start: NaiveDate,
    pub date_range_end: NaiveDate,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    /// Only columns the series carries, in layout order
    pub stats: Vec<ColumnStat>,
}

impl SummaryRecord {
    pub fn stat(&self, column: MetricColumn) -> Option<&ColumnStat> {
        self.stats.iter().find(|s| s.column == column)
    }
}

pub fn mean_defined(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryBuilder;

impl SummaryBuilder {
    pub fn new() -> Self {
        Self
    }

    /// `None` for a table without records
    pub fn build(&self, table: &VolatilityTable) -> Option<SummaryRecord> {
        let first = table.records.first()?;
        let last = table.records.last()?;

        let prices = table.records.iter().map(|r| r.close_price);
        let n = table.records.len();
        let avg_price = prices.clone().sum::<f64>() / n as f64;
        let min_price = prices.clone().fold(f64::INFINITY, f64::min);
        let max_price = prices.fold(f64::NEG_INFINITY, f64::max);

        let stats = table
            .layout
            .metric_columns()
            .into_iter()
            .map(|column| ColumnStat {
                column,
                mean: mean_defined(table.records.iter().map(|r| r.value(column))),
                current: last.value(column),
            })
            .collect();

        Some(SummaryRecord {
            symbol: table.symbol.clone(),
            provider: table.provider,
            data_points: n,
            date_range_start: first.date,
            date_range_end: last.date,
            avg_price,
            min_price,
            max_price,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{VolatilityEngine, WindowPolicy};
    use common::{ColumnSet, DayAnchor, NormalizedSeries, Observation};

    fn table(funding: &[Option<f64>]) -> VolatilityTable {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let prices = [100.0, 110.0, 90.0, 105.0];
        let obs = prices
            .iter()
            .zip(funding)
            .enumerate()
            .map(|(i, (&p, &f))| {
                let mut o = Observation::new(start + chrono::Duration::days(i as i64), DayAnchor::Midnight, p);
                o.funding_rate = f;
                o
            })
            .collect();
        let columns = ColumnSet {
            funding_rate: true,
            ..ColumnSet::default()
        };
        let series = NormalizedSeries::new(
            Symbol::new("SOL"),
            ProviderKind::BinanceFutures,
            DayAnchor::Midnight,
            columns,
            obs,
        )
        .unwrap();
        VolatilityEngine::new(&[2], WindowPolicy::default())
            .unwrap()
            .compute_table(&series)
    }

    #[test]
    fn test_price_stats_and_range() {
        let summary = SummaryBuilder::new()
            .build(&table(&[Some(0.0001); 4]))
            .unwrap();
        assert_eq!(summary.data_points, 4);
        assert_eq!(summary.date_range_start, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(summary.date_range_end, NaiveDate::from_ymd_opt(2025, 1, 4).unwrap());
        assert!((summary.avg_price - 101.25).abs() < 1e-12);
        assert_eq!(summary.min_price, 90.0);
        assert_eq!(summary.max_price, 110.0);
        assert_eq!(summary.provider, ProviderKind::BinanceFutures);
    }

    #[test]
    fn test_means_skip_undefined_and_current_is_last() {
        let summary = SummaryBuilder::new()
            .build(&table(&[Some(0.0002), None, Some(0.0004), None]))
            .unwrap();
        let funding = summary.stat(MetricColumn::FundingRate).unwrap();
        assert!((funding.mean.unwrap() - 0.0003).abs() < 1e-15);
        assert_eq!(funding.current, None);

        let hv = summary.stat(MetricColumn::Hv(2)).unwrap();
        assert!(hv.mean.is_some());
        assert!(hv.current.is_some());
    }

    #[test]
    fn test_absent_columns_omitted() {
        let summary = SummaryBuilder::new()
            .build(&table(&[None; 4]))
            .unwrap();
        assert!(summary.stat(MetricColumn::Volume).is_none());
        assert!(summary.stat(MetricColumn::OpenInterest).is_none());
        assert!(summary.stat(MetricColumn::Parkinson(2)).is_none());
        // present but never defined
        assert_eq!(summary.stat(MetricColumn::FundingRate).unwrap().mean, None);
    }

    #[test]
    fn test_mean_defined() {
        assert_eq!(mean_defined([None, None]), None);
        assert_eq!(mean_defined([Some(1.0), None, Some(3.0)]), Some(2.0));
    }
}
