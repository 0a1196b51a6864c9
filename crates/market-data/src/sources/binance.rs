//! Binance USDT-M perpetual futures adapter
//!
//! Daily klines are the primary series. Funding rates (every 8h, averaged
//! per UTC date) and daily open-interest history are fetched separately and
//! merged in; if either fails the column is simply left out.

use async_trait::async_trait;
use common::{
    date_from_millis, AssetDescriptor, AuxColumn, ColumnSet, DateRange, DayAnchor,
    NormalizedSeries, Observation, ProviderKind,
};
use config::ProviderSettings;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::{assemble, json_f64, json_i64, parse_json, require_id, SourceAdapter};
use crate::merge::{daily_mean, AuxSeries, SeriesMerger};
use crate::paginate::{FetchContext, PageBody, PagedEndpoint};
use crate::transport::HttpRequest;
use crate::{MarketDataError, Result};

const PROVIDER: ProviderKind = ProviderKind::BinanceFutures;
const DAY_MS: i64 = 86_400_000;

fn is_binance_rate_limit(status: u16) -> bool {
    // 418 means an IP ban after ignoring 429s
    status == 429 || status == 418
}

fn as_rows(provider: ProviderKind, body: &str) -> Result<Vec<Value>> {
    match parse_json(provider, body)? {
        Value::Array(rows) => Ok(rows),
        other => Err(MarketDataError::decode(
            provider,
            format!("expected a JSON array, got {}", truncate(&other.to_string())),
        )),
    }
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(120) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ==================== Klines ====================

#[derive(Debug, Clone, Copy)]
struct Kline {
    open_time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    quote_volume: f64,
    trades: u64,
}

struct KlinesEndpoint<'a> {
    base_url: &'a str,
    symbol: &'a str,
    limit: u32,
}

impl PagedEndpoint for KlinesEndpoint<'_> {
    type Row = Kline;

    fn name(&self) -> &'static str {
        "klines"
    }

    fn request(&self, cursor: i64, end: i64) -> HttpRequest {
        HttpRequest::get(format!("{}/fapi/v1/klines", self.base_url))
            .query("symbol", self.symbol)
            .query("interval", "1d")
            .query("startTime", cursor)
            .query("endTime", end)
            .query("limit", self.limit)
    }

    fn parse(&self, body: &str) -> Result<PageBody<Kline>> {
        as_rows(PROVIDER, body)?
            .iter()
            .map(|row| {
                let f = |i: usize| row.get(i).and_then(json_f64);
                let kline = Kline {
                    open_time: row.get(0).and_then(json_i64)?,
                    open: f(1)?,
                    high: f(2)?,
                    low: f(3)?,
                    close: f(4)?,
                    volume: f(5)?,
                    quote_volume: f(7)?,
                    trades: row.get(8).and_then(json_i64)?.max(0) as u64,
                };
                Some(kline)
            })
            .collect::<Option<Vec<_>>>()
            .map(PageBody::Rows)
            .ok_or_else(|| MarketDataError::decode(PROVIDER, "malformed kline row"))
    }

    fn row_time(&self, row: &Kline) -> i64 {
        row.open_time
    }

    fn page_limit(&self) -> Option<usize> {
        Some(self.limit as usize)
    }

    fn next_cursor(&self, _cursor: i64, last_row_time: i64) -> i64 {
        last_row_time + 1
    }

    fn is_rate_limit_status(&self, status: u16) -> bool {
        is_binance_rate_limit(status)
    }
}

// ==================== Funding ====================

#[derive(Debug, Clone, Copy)]
struct FundingEvent {
    time: i64,
    rate: f64,
}

struct FundingEndpoint<'a> {
    base_url: &'a str,
    symbol: &'a str,
    limit: u32,
}

impl PagedEndpoint for FundingEndpoint<'_> {
    type Row = FundingEvent;

    fn name(&self) -> &'static str {
        "fundingRate"
    }

    fn request(&self, cursor: i64, end: i64) -> HttpRequest {
        HttpRequest::get(format!("{}/fapi/v1/fundingRate", self.base_url))
            .query("symbol", self.symbol)
            .query("startTime", cursor)
            .query("endTime", end)
            .query("limit", self.limit)
    }

    fn parse(&self, body: &str) -> Result<PageBody<FundingEvent>> {
        as_rows(PROVIDER, body)?
            .iter()
            .map(|row| {
                Some(FundingEvent {
                    time: row.get("fundingTime").and_then(json_i64)?,
                    rate: row.get("fundingRate").and_then(json_f64)?,
                })
            })
            .collect::<Option<Vec<_>>>()
            .map(PageBody::Rows)
            .ok_or_else(|| MarketDataError::decode(PROVIDER, "malformed funding row"))
    }

    fn row_time(&self, row: &FundingEvent) -> i64 {
        row.time
    }

    fn page_limit(&self) -> Option<usize> {
        Some(self.limit as usize)
    }

    fn next_cursor(&self, _cursor: i64, last_row_time: i64) -> i64 {
        last_row_time + 1
    }

    fn is_rate_limit_status(&self, status: u16) -> bool {
        is_binance_rate_limit(status)
    }
}

// ==================== Open interest ====================

#[derive(Debug, Clone, Copy)]
struct OpenInterestPoint {
    timestamp: i64,
    open_interest: f64,
    open_interest_value: Option<f64>,
}

struct OpenInterestEndpoint<'a> {
    base_url: &'a str,
    symbol: &'a str,
    limit: u32,
}

impl PagedEndpoint for OpenInterestEndpoint<'_> {
    type Row = OpenInterestPoint;

    fn name(&self) -> &'static str {
        "openInterestHist"
    }

    fn request(&self, cursor: i64, end: i64) -> HttpRequest {
        HttpRequest::get(format!("{}/futures/data/openInterestHist", self.base_url))
            .query("symbol", self.symbol)
            .query("period", "1d")
            .query("startTime", cursor)
            .query("endTime", end)
            .query("limit", self.limit)
    }

    fn parse(&self, body: &str) -> Result<PageBody<OpenInterestPoint>> {
        as_rows(PROVIDER, body)?
            .iter()
            .map(|row| {
                Some(OpenInterestPoint {
                    timestamp: row.get("timestamp").and_then(json_i64)?,
                    open_interest: row.get("sumOpenInterest").and_then(json_f64)?,
                    open_interest_value: row.get("sumOpenInterestValue").and_then(json_f64),
                })
            })
            .collect::<Option<Vec<_>>>()
            .map(PageBody::Rows)
            .ok_or_else(|| MarketDataError::decode(PROVIDER, "malformed open interest row"))
    }

    fn row_time(&self, row: &OpenInterestPoint) -> i64 {
        row.timestamp
    }

    fn page_limit(&self) -> Option<usize> {
        Some(self.limit as usize)
    }

    /// History is daily, so step a whole day
    fn next_cursor(&self, _cursor: i64, last_row_time: i64) -> i64 {
        last_row_time + DAY_MS
    }

    fn is_rate_limit_status(&self, status: u16) -> bool {
        is_binance_rate_limit(status)
    }
}

// ==================== Adapter ====================

pub struct BinanceFuturesAdapter {
    settings: ProviderSettings,
    ctx: FetchContext,
    merger: SeriesMerger,
}

impl BinanceFuturesAdapter {
    pub fn new(settings: ProviderSettings, ctx: FetchContext) -> Self {
        Self {
            settings,
            ctx,
            merger: SeriesMerger::new(),
        }
    }

    async fn fetch_funding(&self, symbol: &str, range: &DateRange) -> Result<Vec<AuxSeries>> {
        let endpoint = FundingEndpoint {
            base_url: &self.settings.base_url,
            symbol,
            limit: self.settings.funding_page_limit,
        };
        let events = self
            .ctx
            .paginate(&endpoint, range.start_millis(), range.end_millis())
            .await?;

        let points = daily_mean(
            events
                .iter()
                .filter_map(|e| date_from_millis(e.time).map(|d| (d, e.rate))),
        );
        Ok(vec![AuxSeries::new(PROVIDER, AuxColumn::FundingRate, points)])
    }

    async fn fetch_open_interest(&self, symbol: &str, range: &DateRange) -> Result<Vec<AuxSeries>> {
        let endpoint = OpenInterestEndpoint {
            base_url: &self.settings.base_url,
            symbol,
            limit: self.settings.open_interest_page_limit,
        };
        let points = self
            .ctx
            .paginate(&endpoint, range.start_millis(), range.end_millis())
            .await?;

        let dated: Vec<_> = points
            .iter()
            .filter_map(|p| date_from_millis(p.timestamp).map(|d| (d, p)))
            .collect();

        let mut out = vec![AuxSeries::new(
            PROVIDER,
            AuxColumn::OpenInterest,
            dated.iter().map(|(d, p)| (*d, p.open_interest)).collect(),
        )];

        let values: Vec<_> = dated
            .iter()
            .filter_map(|(d, p)| p.open_interest_value.map(|v| (*d, v)))
            .collect();
        if !values.is_empty() {
            out.push(AuxSeries::new(PROVIDER, AuxColumn::OpenInterestValue, values));
        }
        Ok(out)
    }

    /// Merge an auxiliary fetch; failures only drop the column
    fn merge_aux(
        &self,
        series: &mut NormalizedSeries,
        what: &str,
        fetched: Result<Vec<AuxSeries>>,
    ) -> Result<()> {
        match fetched {
            Ok(all) => {
                for aux in all.iter().filter(|a| !a.points.is_empty()) {
                    self.merger.merge(series, aux)?;
                }
                Ok(())
            }
            Err(MarketDataError::Cancelled) => Err(MarketDataError::Cancelled),
            Err(e) => {
                warn!(error = %e, "{} unavailable, omitting column", what);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for BinanceFuturesAdapter {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    #[instrument(skip_all, fields(symbol = %asset.symbol, provider = "binance"))]
    async fn fetch(&self, asset: &AssetDescriptor, range: &DateRange) -> Result<NormalizedSeries> {
        let symbol = require_id(asset, PROVIDER)?;
        info!(binance_symbol = symbol, "Fetching Binance futures klines");

        let endpoint = KlinesEndpoint {
            base_url: &self.settings.base_url,
            symbol,
            limit: self.settings.page_limit,
        };
        let klines = self
            .ctx
            .paginate(&endpoint, range.start_millis(), range.end_millis())
            .await?;

        let observations = klines.iter().filter_map(|k| {
            let date = date_from_millis(k.open_time)?;
            let mut obs = Observation::new(date, DayAnchor::Midnight, k.close)
                .with_ohlc(k.open, k.high, k.low, k.close)
                .with_volume(k.volume);
            obs.quote_volume = Some(k.quote_volume);
            obs.trade_count = Some(k.trades);
            Some(obs)
        });

        let columns = ColumnSet {
            ohlc: true,
            volume: true,
            quote_volume: true,
            trade_count: true,
            ..ColumnSet::default()
        };
        let mut series = assemble(asset, PROVIDER, DayAnchor::Midnight, columns, range, observations)?;

        if self.settings.fetch_funding {
            let funding = self.fetch_funding(symbol, range).await;
            self.merge_aux(&mut series, "Funding rate", funding)?;
        }
        if self.settings.fetch_open_interest {
            let oi = self.fetch_open_interest(symbol, range).await;
            self.merge_aux(&mut series, "Open interest", oi)?;
        }

        info!(rows = series.len(), "Binance series ready");
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paginate::tests::context;
    use crate::transport::MockHttpClient;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn day_ms(day: u32) -> i64 {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    fn kline(day: u32, close: f64) -> String {
        format!(
            r#"[{t},"{o}","{h}","{l}","{c}","1000.0",{ct},"50000.0",1234,"500.0","25000.0","0"]"#,
            t = day_ms(day),
            o = close - 1.0,
            h = close + 2.0,
            l = close - 2.0,
            c = close,
            ct = day_ms(day) + 86_399_999,
        )
    }

    fn asset() -> AssetDescriptor {
        AssetDescriptor::new("BTC", "Bitcoin").with_binance_symbol("BTCUSDT")
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
        )
        .unwrap()
    }

    fn adapter(http: Arc<MockHttpClient>) -> BinanceFuturesAdapter {
        let mut settings = ProviderSettings::defaults_for(PROVIDER);
        settings.base_url = "http://bn".to_string();
        BinanceFuturesAdapter::new(settings, context(http, 3))
    }

    #[tokio::test(start_paused = true)]
    async fn test_klines_with_funding_and_open_interest() {
        let klines = format!("[{},{},{}]", kline(1, 100.0), kline(2, 101.0), kline(3, 99.0));
        let funding = format!(
            r#"[{{"symbol":"BTCUSDT","fundingTime":{a},"fundingRate":"0.0001"}},
                {{"symbol":"BTCUSDT","fundingTime":{b},"fundingRate":"0.0003"}},
                {{"symbol":"BTCUSDT","fundingTime":{c},"fundingRate":"-0.0002"}}]"#,
            a = day_ms(1),
            b = day_ms(1) + 8 * 3_600_000,
            c = day_ms(3),
        );
        let oi = format!(
            r#"[{{"symbol":"BTCUSDT","sumOpenInterest":"10.5","sumOpenInterestValue":"1000.0","timestamp":{a}}}]"#,
            a = day_ms(2),
        );
        let http = Arc::new(
            MockHttpClient::new()
                .respond("/fapi/v1/klines", 200, klines)
                .respond("/fapi/v1/fundingRate", 200, funding)
                .respond("/futures/data/openInterestHist", 200, oi),
        );

        let series = adapter(http.clone()).fetch(&asset(), &range()).await.unwrap();

        assert_eq!(series.len(), 3);
        let first = &series.observations()[0];
        assert_eq!(first.price, 100.0);
        assert_eq!(first.high, Some(102.0));
        assert_eq!(first.trade_count, Some(1234));
        assert!((first.funding_rate.unwrap() - 0.0002).abs() < 1e-12);
        assert_eq!(series.observations()[1].funding_rate, None);
        assert_eq!(series.observations()[1].open_interest, Some(10.5));
        assert_eq!(series.observations()[0].open_interest, None);
        assert!(series.columns().funding_rate);
        assert!(series.columns().open_interest_value);

        let requests = http.requests();
        assert_eq!(requests[0].query_value("interval"), Some("1d"));
        assert_eq!(requests[0].query_value("limit"), Some("1500"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_aux_failure_keeps_primary() {
        let klines = format!("[{}]", kline(1, 100.0));
        let http = Arc::new(
            MockHttpClient::new()
                .respond("/fapi/v1/klines", 200, klines)
                .respond("/fapi/v1/fundingRate", 400, r#"{"code":-1121,"msg":"Invalid symbol."}"#)
                .respond("/futures/data/openInterestHist", 200, "not json"),
        );

        let series = adapter(http).fetch(&asset(), &range()).await.unwrap();

        assert_eq!(series.len(), 1);
        assert!(!series.columns().funding_rate);
        assert!(!series.columns().open_interest);
    }

    #[tokio::test(start_paused = true)]
    async fn test_418_treated_as_rate_limit() {
        let http = Arc::new(
            MockHttpClient::new()
                .respond("/fapi/v1/klines", 418, "")
                .respond("/fapi/v1/klines", 200, format!("[{}]", kline(2, 50.0))),
        );
        let mut bn = adapter(http.clone());
        bn.settings.fetch_funding = false;
        bn.settings.fetch_open_interest = false;

        let series = bn.fetch(&asset(), &range()).await.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(http.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_klines_is_error() {
        let http = Arc::new(MockHttpClient::new().respond("/fapi/v1/klines", 200, r#"[[1,"x"]]"#));
        let err = adapter(http).fetch(&asset(), &range()).await.unwrap_err();
        assert!(matches!(err, MarketDataError::Decode { .. }));
    }
}
