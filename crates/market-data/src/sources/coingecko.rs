//! CoinGecko market chart adapter
//!
//! `GET /coins/{id}/market_chart/range` returns `prices` and `total_volumes`
//! as `[ms, value]` pairs. The range is walked in fixed-length chunks, and an
//! empty chunk (a coin listed mid-range) moves on to the next one.
//!
//! Granularity depends on the chunk length: daily points at 00:00 for long
//! spans, hourly for short ones. Each date keeps the sample closest to 08:00
//! UTC, the time its observation is labelled with, so mixed granularities
//! still give one consistent sampling point per date.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use common::{
    date_from_millis, AssetDescriptor, AuxColumn, ColumnSet, DateRange, DayAnchor,
    NormalizedSeries, Observation, ProviderKind,
};
use config::ProviderSettings;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

use super::{assemble, json_f64, json_i64, parse_json, require_id, SourceAdapter};
use crate::merge::{AuxSeries, SeriesMerger};
use crate::paginate::{FetchContext, PageBody, PagedEndpoint};
use crate::transport::HttpRequest;
use crate::Result;

const PROVIDER: ProviderKind = ProviderKind::CoinGecko;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChartField {
    Price,
    Volume,
}

#[derive(Debug, Clone, Copy)]
struct ChartSample {
    field: ChartField,
    timestamp: i64,
    value: f64,
}

struct MarketChartEndpoint<'a> {
    base_url: &'a str,
    coin_id: &'a str,
    api_key: Option<&'a str>,
    chunk_ms: i64,
}

impl MarketChartEndpoint<'_> {
    fn parse_pairs(field: ChartField, value: Option<&Value>) -> Option<Vec<ChartSample>> {
        let pairs = value?.as_array()?;
        pairs
            .iter()
            .map(|pair| {
                let pair = pair.as_array()?;
                Some(ChartSample {
                    field,
                    timestamp: json_i64(pair.first()?)?,
                    value: json_f64(pair.get(1)?)?,
                })
            })
            .collect()
    }
}

impl PagedEndpoint for MarketChartEndpoint<'_> {
    type Row = ChartSample;

    fn name(&self) -> &'static str {
        "market_chart"
    }

    fn request(&self, cursor: i64, end: i64) -> HttpRequest {
        let chunk_end = (cursor + self.chunk_ms).min(end);
        let request = HttpRequest::get(format!(
            "{}/coins/{}/market_chart/range",
            self.base_url, self.coin_id
        ))
        .query("vs_currency", "usd")
        .query("from", cursor / 1000)
        .query("to", chunk_end / 1000);

        match self.api_key {
            Some(key) => request.header("x-cg-demo-api-key", key),
            None => request,
        }
    }

    fn parse(&self, body: &str) -> Result<PageBody<ChartSample>> {
        let json = parse_json(PROVIDER, body)?;

        let mut rows = Self::parse_pairs(ChartField::Price, json.get("prices")).ok_or_else(|| {
            crate::MarketDataError::decode(PROVIDER, "missing or malformed 'prices' array")
        })?;

        match Self::parse_pairs(ChartField::Volume, json.get("total_volumes")) {
            Some(volumes) => rows.extend(volumes),
            None => debug!("market_chart page without usable total_volumes"),
        }

        Ok(PageBody::Rows(rows))
    }

    fn row_time(&self, row: &ChartSample) -> i64 {
        row.timestamp
    }

    fn page_limit(&self) -> Option<usize> {
        None
    }

    /// Chunk end plus one second, regardless of the rows returned
    fn next_cursor(&self, cursor: i64, _last_row_time: i64) -> i64 {
        cursor + self.chunk_ms + 1000
    }

    fn empty_page_cursor(&self, cursor: i64) -> Option<i64> {
        Some(self.next_cursor(cursor, cursor))
    }
}

pub struct CoinGeckoAdapter {
    settings: ProviderSettings,
    ctx: FetchContext,
    merger: SeriesMerger,
}

impl CoinGeckoAdapter {
    pub fn new(settings: ProviderSettings, ctx: FetchContext) -> Self {
        Self {
            settings,
            ctx,
            merger: SeriesMerger::new(),
        }
    }

    /// Per date, the sample of `field` closest to the 08:00 UTC anchor.
    /// Ties go to the earlier sample.
    fn nearest_to_anchor(samples: &[ChartSample], field: ChartField) -> BTreeMap<NaiveDate, f64> {
        let mut best: BTreeMap<NaiveDate, (i64, f64)> = BTreeMap::new();
        for sample in samples.iter().filter(|s| s.field == field) {
            let Some(date) = date_from_millis(sample.timestamp) else {
                continue;
            };
            let anchor = DayAnchor::EightUtc.timestamp(date).timestamp_millis();
            let distance = (sample.timestamp - anchor).abs();
            best.entry(date)
                .and_modify(|(d, v)| {
                    if distance < *d {
                        *d = distance;
                        *v = sample.value;
                    }
                })
                .or_insert((distance, sample.value));
        }
        best.into_iter().map(|(date, (_, value))| (date, value)).collect()
    }
}

#[async_trait]
impl SourceAdapter for CoinGeckoAdapter {
    fn kind(&self) -> ProviderKind {
        PROVIDER
    }

    #[instrument(skip_all, fields(symbol = %asset.symbol, provider = "coingecko"))]
    async fn fetch(&self, asset: &AssetDescriptor, range: &DateRange) -> Result<NormalizedSeries> {
        let coin_id = require_id(asset, PROVIDER)?;
        info!(coin_id, "Fetching CoinGecko market chart");

        let endpoint = MarketChartEndpoint {
            base_url: &self.settings.base_url,
            coin_id,
            api_key: self.settings.api_key.as_deref(),
            chunk_ms: ChronoDuration::days(i64::from(self.settings.page_limit.max(1)))
                .num_milliseconds(),
        };

        let samples = self
            .ctx
            .paginate(&endpoint, range.start_millis(), range.end_millis())
            .await?;

        let prices = Self::nearest_to_anchor(&samples, ChartField::Price);
        let observations = prices
            .into_iter()
            .map(|(date, price)| Observation::new(date, DayAnchor::EightUtc, price));

        let mut series = assemble(
            asset,
            PROVIDER,
            DayAnchor::EightUtc,
            ColumnSet::default(),
            range,
            observations,
        )?;

        if self.settings.fetch_volume {
            let volumes = Self::nearest_to_anchor(&samples, ChartField::Volume);
            if volumes.is_empty() {
                warn!("No volume data, omitting volume column");
            } else {
                let aux = AuxSeries::new(PROVIDER, AuxColumn::Volume, volumes.into_iter().collect());
                self.merger.merge(&mut series, &aux)?;
            }
        }

        info!(rows = series.len(), "CoinGecko series ready");
        Ok(series)
    }
}
