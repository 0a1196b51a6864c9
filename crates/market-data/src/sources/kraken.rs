//! Kraken spot OHLC adapter
//!
//! `GET /0/public/OHLC?pair=&interval=1440&since=` returns
//! `{error: [...], result: {<pair>: [[time, o, h, l, c, vwap, volume, count]], last}}`.
//! Kraken reports rate limits inside a 200 body, and the result key is the
//! exchange's canonical pair name, which may differ from the requested one.

use async_trait::async_trait;
use common::{
    date_from_millis, AssetDescriptor, ColumnSet, DateRange, DayAnchor, NormalizedSeries,
    Observation, ProviderKind,
};
use config::ProviderSettings;
use serde_json::Value;
use tracing::{info, instrument};

use super::{assemble, json_f64, json_i64, parse_json, require_id, SourceAdapter};
use crate::paginate::{FetchContext, PageBody, PagedEndpoint};
use crate::transport::HttpRequest;
use crate::{MarketDataError, Result};

const PROVIDER: ProviderKind = ProviderKind::KrakenSpot;
const RATE_LIMIT_ERROR: &str = "EAPI:Rate limit exceeded";

#[derive(Debug, Clone, Copy)]
struct OhlcBar {
    /// unix ms
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    count: u64,
}

struct OhlcEndpoint<'a> {
    base_url: &'a str,
    pair: &'a str,
    limit: u32,
}

impl OhlcEndpoint<'_> {
    fn parse_bar(row: &Value) -> Option<OhlcBar> {
        let f = |i: usize| row.get(i).and_then(json_f64);
        Some(OhlcBar {
            time: row.get(0).and_then(json_i64)? * 1000,
            open: f(1)?,
            high: f(2)?,
            low: f(3)?,
            close: f(4)?,
            volume: f(6)?,
            count: row.get(7).and_then(json_i64).unwrap_or(0).max(0) as u64,
        })
    }
}

impl PagedEndpoint for OhlcEndpoint<'_> {
    type Row = OhlcBar;

    fn name(&self) -> &'static str {
        "OHLC"
    }

    fn request(&self, cursor: i64, _end: i64) -> HttpRequest {
        HttpRequest::get(format!("{}/0/public/OHLC", self.base_url))
            .query("pair", self.pair)
            .query("interval", 1440)
            .query("since", cursor / 1000)
    }

    fn parse(&self, body: &str) -> Result<PageBody<OhlcBar>> {
        let json = parse_json(PROVIDER, body)?;

        let errors: Vec<&str> = json
            .get("error")
            .and_then(Value::as_array)
            .map(|errs| errs.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if errors.iter().any(|e| e.contains(RATE_LIMIT_ERROR)) {
            return Ok(PageBody::RateLimited);
        }
        if !errors.is_empty() {
            return Err(MarketDataError::decode(PROVIDER, errors.join("; ")));
        }

        let result = json
            .get("result")
            .and_then(Value::as_object)
            .ok_or_else(|| MarketDataError::decode(PROVIDER, "missing 'result' object"))?;

        let bars = result
            .iter()
            .find(|(key, _)| key.as_str() != "last")
            .and_then(|(_, v)| v.as_array())
            .ok_or_else(|| MarketDataError::decode(PROVIDER, "no OHLC array in result"))?;

        bars.iter()
            .map(Self::parse_bar)
            .collect::<Option<Vec<_>>>()
            .map(PageBody::Rows)
            .ok_or_else(|| MarketDataError::decode(PROVIDER, "malformed OHLC row"))
    }

    fn row_time(&self, row: &OhlcBar) -> i64 {
        row.time
    }

    fn page_limit(&self) -> Option<usize> {
        Some(self.limit as usize)
    }

    /// One second past the last bar
    fn next_cursor(&self, _cursor: i64, last_row_time: i64) -> i64 {
        last_row_time + 1000
    }
}

pub struct KrakenSpotAdapter {
    settings: ProviderSettings,
    ctx: FetchContext,
}

impl KrakenSpotAdapter {
    pub fn new(settings: ProviderSettings, ctx: FetchContext) -> Self {
        Self { settings, ctx }
    }
}

#[async_trait]
impl SourceAdapter for KrakenSpotAdapter {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    #[instrument(skip_all, fields(symbol = %asset.symbol, provider = "kraken"))]
    async fn fetch(&self, asset: &AssetDescriptor, range: &DateRange) -> Result<NormalizedSeries> {
        let pair = require_id(asset, PROVIDER)?;
        info!(pair, "Fetching Kraken OHLC");

        let endpoint = OhlcEndpoint {
            base_url: &self.settings.base_url,
            pair,
            limit: self.settings.page_limit,
        };
        let bars = self
            .ctx
            .paginate(&endpoint, range.start_millis(), range.end_millis())
            .await?;

        let observations = bars.iter().filter_map(|bar| {
            let date = date_from_millis(bar.time)?;
            let mut obs = Observation::new(date, DayAnchor::Midnight, bar.close)
                .with_ohlc(bar.open, bar.high, bar.low, bar.close);
            if self.settings.fetch_volume {
                obs.volume = Some(bar.volume);
            }
            obs.trade_count = Some(bar.count);
            Some(obs)
        });

        let columns = ColumnSet {
            ohlc: true,
            volume: self.settings.fetch_volume,
            trade_count: true,
            ..ColumnSet::default()
        };
        let series = assemble(asset, PROVIDER, DayAnchor::Midnight, columns, range, observations)?;

        info!(rows = series.len(), "Kraken series ready");
        Ok(series)
    }
}
