//! CSV export of records, summaries and strike ladders
//!
//! Columns are the union over every exported asset; cells a given asset
//! does not carry, or values that are undefined, are written empty.

use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::pricer::AssetQuote;
use crate::record::{MetricColumn, MetricLayout, VolatilityTable};
use crate::summary::SummaryRecord;
use crate::{Result, VolatilityError};

/// Union of the layouts of `tables`
pub fn combined_layout<'a>(tables: impl IntoIterator<Item = &'a VolatilityTable>) -> Option<MetricLayout> {
    tables
        .into_iter()
        .map(|t| t.layout.clone())
        .reduce(|acc, l| acc.union(&l))
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn metric_cell(column: MetricColumn, value: Option<f64>) -> String {
    match column {
        // counts stay integral
        MetricColumn::Trades => value.map(|v| format!("{:.0}", v)).unwrap_or_default(),
        _ => cell(value),
    }
}

fn writer(path: &Path) -> Result<csv::Writer<fs::File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    csv::Writer::from_path(path).map_err(|e| VolatilityError::export(path, e))
}

/// One row per (asset, date). Returns the number of data rows.
pub fn write_records(path: &Path, tables: &[VolatilityTable]) -> Result<usize> {
    let Some(layout) = combined_layout(tables) else {
        return Ok(0);
    };
    let columns = layout.metric_columns();
    let mut wtr = writer(path)?;

    let mut header = vec!["symbol".to_string(), "date".to_string(), "close_price".to_string()];
    header.extend(columns.iter().map(MetricColumn::name));
    header.push("data_sources".to_string());
    wtr.write_record(&header)
        .map_err(|e| VolatilityError::export(path, e))?;

    let mut rows = 0;
    for table in tables {
        let present = table.layout.metric_columns();
        for rec in &table.records {
            let mut row = vec![
                rec.symbol.to_string(),
                rec.date.to_string(),
                rec.close_price.to_string(),
            ];
            row.extend(columns.iter().map(|&c| {
                if present.contains(&c) {
                    metric_cell(c, rec.value(c))
                } else {
                    String::new()
                }
            }));
            row.push(rec.provider.tag().to_string());
            wtr.write_record(&row)
                .map_err(|e| VolatilityError::export(path, e))?;
            rows += 1;
        }
    }

    wtr.flush().map_err(|e| VolatilityError::export(path, e))?;
    info!(path = %path.display(), rows, columns = header.len(), "Wrote volatility records");
    Ok(rows)
}

/// One row per asset with `avg_`/`current_` pairs for every column in `layout`
pub fn write_summaries(path: &Path, summaries: &[SummaryRecord], layout: &MetricLayout) -> Result<usize> {
    let columns = layout.metric_columns();
    let mut wtr = writer(path)?;

    let mut header: Vec<String> = [
        "symbol",
        "data_points",
        "date_range_start",
        "date_range_end",
        "avg_price",
        "min_price",
        "max_price",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for c in &columns {
        header.push(format!("avg_{}", c.name()));
        header.push(format!("current_{}", c.name()));
    }
    header.push("data_sources".to_string());
    wtr.write_record(&header)
        .map_err(|e| VolatilityError::export(path, e))?;

    for s in summaries {
        let mut row = vec![
            s.symbol.to_string(),
            s.data_points.to_string(),
            s.date_range_start.to_string(),
            s.date_range_end.to_string(),
            s.avg_price.to_string(),
            s.min_price.to_string(),
            s.max_price.to_string(),
        ];
        for &c in &columns {
            let stat = s.stat(c);
            row.push(cell(stat.and_then(|st| st.mean)));
            row.push(metric_cell(c, stat.and_then(|st| st.current)));
        }
        row.push(s.provider.tag().to_string());
        wtr.write_record(&row)
            .map_err(|e| VolatilityError::export(path, e))?;
    }

    wtr.flush().map_err(|e| VolatilityError::export(path, e))?;
    info!(path = %path.display(), rows = summaries.len(), "Wrote summary statistics");
    Ok(summaries.len())
}

#[derive(Serialize)]
struct QuoteRow<'a> {
    symbol: &'a str,
    date: String,
    spot: f64,
    sigma: f64,
    vol_input: String,
    days_to_expiry: f64,
    strike: f64,
    moneyness: f64,
    call_price: f64,
    put_price: f64,
    call_delta: f64,
    put_delta: f64,
    gamma: f64,
    vega: f64,
    theta: f64,
}

/// One row per (asset, strike)
pub fn write_quotes(path: &Path, quotes: &[AssetQuote], days_to_expiry: f64) -> Result<usize> {
    let mut wtr = writer(path)?;
    let mut rows = 0;

    for q in quotes {
        for r in &q.rows {
            wtr.serialize(QuoteRow {
                symbol: q.symbol.as_str(),
                date: q.date.to_string(),
                spot: q.spot,
                sigma: q.sigma,
                vol_input: q.input.label(),
                days_to_expiry,
                strike: r.strike,
                moneyness: r.moneyness,
                call_price: r.call_price,
                put_price: r.put_price,
                call_delta: r.call_delta,
                put_delta: r.put_delta,
                gamma: r.gamma,
                vega: r.vega,
                theta: r.theta,
            })
            .map_err(|e| VolatilityError::export(path, e))?;
            rows += 1;
        }
    }

    wtr.flush().map_err(|e| VolatilityError::export(path, e))?;
    info!(path = %path.display(), rows, "Wrote option ladders");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{VolatilityEngine, WindowPolicy};
    use crate::pricer::{OptionsPricer, PricerSettings};
    use crate::summary::SummaryBuilder;
    use chrono::NaiveDate;
    use common::{ColumnSet, DayAnchor, NormalizedSeries, Observation, ProviderKind, Symbol};

    fn table(symbol: &str, provider: ProviderKind, columns: ColumnSet, prices: &[f64]) -> VolatilityTable {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let obs = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let mut o = Observation::new(start + chrono::Duration::days(i as i64), DayAnchor::Midnight, p);
                if columns.volume {
                    o.volume = Some(1_000.0 + i as f64);
                }
                if columns.trade_count {
                    o.trade_count = Some(10 + i as u64);
                }
                o
            })
            .collect();
        let series =
            NormalizedSeries::new(Symbol::new(symbol), provider, DayAnchor::Midnight, columns, obs)
                .unwrap();
        VolatilityEngine::new(&[2, 3], WindowPolicy::default())
            .unwrap()
            .compute_table(&series)
    }

    fn tables() -> Vec<VolatilityTable> {
        let futures = ColumnSet {
            volume: true,
            trade_count: true,
            ..ColumnSet::default()
        };
        vec![
            table("BTC", ProviderKind::BinanceFutures, futures, &[100.0, 101.0, 99.0]),
            table("ETH", ProviderKind::CoinGecko, ColumnSet::default(), &[10.0, 11.0]),
        ]
    }

    #[test]
    fn test_records_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/hv_data_full.csv");

        let rows = write_records(&path, &tables()).unwrap();
        assert_eq!(rows, 5);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "symbol,date,close_price,volume,trades,hv_2d,hv_3d,rms_2_3,rms_vol,data_sources"
        );
        assert_eq!(lines[1], "BTC,2025-01-01,100,1000,10,,,,,binance");
        // ETH has no volume column: empty cells, not zero
        assert!(lines[5].starts_with("ETH,2025-01-02,11,,,"));
        assert!(lines[5].ends_with(",coingecko"));
    }

    #[test]
    fn test_summary_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hv_summary_stats.csv");
        let ts = tables();
        let layout = combined_layout(&ts).unwrap();
        let summaries: Vec<_> = ts.iter().filter_map(|t| SummaryBuilder::new().build(t)).collect();

        assert_eq!(write_summaries(&path, &summaries, &layout).unwrap(), 2);

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert!(headers.iter().any(|h| h == "avg_hv_2d"));
        assert!(headers.iter().any(|h| h == "current_rms_vol"));
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        let avg_volume = headers.iter().position(|h| h == "avg_volume").unwrap();
        assert_eq!(&rows[0][avg_volume], "1001");
        assert_eq!(&rows[1][avg_volume], "");
    }

    #[test]
    fn test_quotes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hv_option_pricer.csv");
        let pricer = OptionsPricer::new(PricerSettings::default()).unwrap();
        let quote = AssetQuote {
            symbol: Symbol::new("BTC"),
            date: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            spot: 100.0,
            sigma: 0.6,
            input: pricer.settings().input,
            rows: pricer.ladder(100.0, 0.6),
        };

        assert_eq!(write_quotes(&path, &[quote], 30.0).unwrap(), 5);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("symbol,date,spot,sigma,vol_input,days_to_expiry,strike"));
        assert_eq!(text.lines().count(), 6);
    }

    #[test]
    fn test_no_tables_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        assert_eq!(write_records(&path, &[]).unwrap(), 0);
        assert!(!path.exists());
    }
}
