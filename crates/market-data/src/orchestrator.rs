//! Provider fallback
//!
//! Providers are tried in priority order per asset and the first non-empty
//! series wins. Price data is never combined across providers.

use common::{AssetDescriptor, DateRange, NormalizedSeries, ProviderKind};
use config::{ProviderSettings, ProvidersConfig};
use observability::PipelineMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::pacing::{cancellable_sleep, RequestLimiter, RetryPolicy};
use crate::paginate::FetchContext;
use crate::sources::{build_adapter, SourceAdapter};
use crate::transport::{HttpClient, ReqwestHttpClient};
use crate::{MarketDataError, Result};

/// An adapter and the pause that follows every attempt against it
#[derive(Clone)]
pub struct ProviderSlot {
    pub adapter: Arc<dyn SourceAdapter>,
    pub pacing: Duration,
}

/// Outcome of one provider attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success { rows: usize },
    Failed { reason: String },
    /// No identifier for this provider, no request sent
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAttempt {
    pub provider: ProviderKind,
    pub outcome: AttemptOutcome,
}

/// Winning series plus the trail of attempts that led to it
#[derive(Debug, Clone)]
pub struct ResolvedSeries {
    pub series: NormalizedSeries,
    pub provider: ProviderKind,
    pub attempts: Vec<ProviderAttempt>,
}

pub struct FallbackOrchestrator {
    slots: Vec<ProviderSlot>,
    cancel: CancellationToken,
    metrics: PipelineMetrics,
}

impl FallbackOrchestrator {
    pub fn new(slots: Vec<ProviderSlot>, cancel: CancellationToken, metrics: PipelineMetrics) -> Self {
        Self {
            slots,
            cancel,
            metrics,
        }
    }

    /// One reqwest-backed adapter per provider in priority order
    pub fn from_config(
        providers: &ProvidersConfig,
        cancel: CancellationToken,
        metrics: PipelineMetrics,
    ) -> Result<Self> {
        Self::build(providers, cancel, metrics, |kind, settings| {
            let client = ReqwestHttpClient::new(Duration::from_secs(settings.timeout_seconds))
                .map_err(|e| MarketDataError::Client {
                    provider: kind,
                    message: e.message,
                })?;
            Ok(Arc::new(client))
        })
    }

    /// Like [`Self::from_config`] with every adapter sharing `http`
    pub fn with_http(
        providers: &ProvidersConfig,
        http: Arc<dyn HttpClient>,
        cancel: CancellationToken,
        metrics: PipelineMetrics,
    ) -> Result<Self> {
        Self::build(providers, cancel, metrics, |_, _| Ok(http.clone()))
    }

    fn build<F>(
        providers: &ProvidersConfig,
        cancel: CancellationToken,
        metrics: PipelineMetrics,
        http_for: F,
    ) -> Result<Self>
    where
        F: Fn(ProviderKind, &ProviderSettings) -> Result<Arc<dyn HttpClient>>,
    {
        let slots = providers
            .priority()
            .into_iter()
            .map(|kind| {
                let settings = providers.settings(kind);
                let ctx = FetchContext {
                    provider: kind,
                    http: http_for(kind, &settings)?,
                    limiter: Arc::new(RequestLimiter::new(Duration::from_millis(
                        settings.min_request_interval_ms,
                    ))),
                    retry: RetryPolicy::from_settings(&settings),
                    page_delay: Duration::from_millis(settings.page_delay_ms),
                    cancel: cancel.clone(),
                    metrics: metrics.clone(),
                };
                Ok(ProviderSlot {
                    adapter: build_adapter(kind, &settings, ctx),
                    pacing: Duration::from_millis(settings.pacing_ms),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(slots, cancel, metrics))
    }

    pub fn providers(&self) -> Vec<ProviderKind> {
        self.slots.iter().map(|s| s.adapter.kind()).collect()
    }

    /// First provider with a non-empty series for `asset`.
    ///
    /// Errors with `NoData` when every provider fails, or `Cancelled`.
    #[instrument(skip_all, fields(symbol = %asset.symbol))]
    pub async fn resolve(&self, asset: &AssetDescriptor, range: &DateRange) -> Result<ResolvedSeries> {
        let mut attempts = Vec::with_capacity(self.slots.len());

        for slot in &self.slots {
            if self.cancel.is_cancelled() {
                return Err(MarketDataError::Cancelled);
            }

            let provider = slot.adapter.kind();
            if asset.provider_id(provider).is_none() {
                debug!(provider = %provider, "No identifier, skipping provider");
                attempts.push(ProviderAttempt {
                    provider,
                    outcome: AttemptOutcome::Skipped,
                });
                continue;
            }

            let result = slot.adapter.fetch(asset, range).await;
            cancellable_sleep(&self.cancel, slot.pacing).await?;

            match result {
                Ok(series) if !series.is_empty() => {
                    info!(provider = %provider, rows = series.len(), "Resolved series");
                    self.metrics.asset_resolved(provider.tag());
                    attempts.push(ProviderAttempt {
                        provider,
                        outcome: AttemptOutcome::Success { rows: series.len() },
                    });
                    return Ok(ResolvedSeries {
                        series,
                        provider,
                        attempts,
                    });
                }
                Ok(_) => {
                    self.record_failure(provider, "empty series".to_string(), &mut attempts);
                }
                Err(MarketDataError::Cancelled) => return Err(MarketDataError::Cancelled),
                Err(e) => {
                    self.record_failure(provider, e.to_string(), &mut attempts);
                }
            }
        }

        self.metrics.asset_unresolved();
        let tried: Vec<_> = attempts
            .iter()
            .filter(|a| a.outcome != AttemptOutcome::Skipped)
            .map(|a| a.provider.tag())
            .collect();
        warn!(tried = ?tried, "No provider returned data");

        Err(MarketDataError::no_data(
            asset.symbol.as_str(),
            if tried.is_empty() {
                "no provider identifiers".to_string()
            } else {
                format!("all providers failed ({})", tried.join(", "))
            },
        ))
    }

    fn record_failure(&self, provider: ProviderKind, reason: String, attempts: &mut Vec<ProviderAttempt>) {
        warn!(provider = %provider, reason = %reason, "Provider failed, falling back");
        self.metrics.provider_failed(provider.tag());
        attempts.push(ProviderAttempt {
            provider,
            outcome: AttemptOutcome::Failed { reason },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use common::{ColumnSet, DayAnchor, Observation};
    use parking_lot::Mutex;

    struct MockAdapter {
        kind: ProviderKind,
        succeed: bool,
        calls: Mutex<usize>,
    }

    impl MockAdapter {
        fn new(kind: ProviderKind, succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                succeed,
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl SourceAdapter for MockAdapter {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn fetch(&self, asset: &AssetDescriptor, range: &DateRange) -> Result<NormalizedSeries> {
            *self.calls.lock() += 1;
            if !self.succeed {
                return Err(MarketDataError::no_data(asset.symbol.as_str(), "scripted failure"));
            }
            let obs = vec![Observation::new(range.start, DayAnchor::Midnight, 42.0)];
            Ok(NormalizedSeries::new(
                asset.symbol.clone(),
                self.kind,
                DayAnchor::Midnight,
                ColumnSet::default(),
                obs,
            )?)
        }
    }

    fn full_asset() -> AssetDescriptor {
        AssetDescriptor::new("BTC", "Bitcoin")
            .with_coingecko_id("bitcoin")
            .with_binance_symbol("BTCUSDT")
            .with_kraken_pair("XBTUSD")
    }

    fn range() -> DateRange {
        let d = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        DateRange::new(d, d).unwrap()
    }

    fn orchestrator(adapters: &[Arc<MockAdapter>], pacing: Duration) -> FallbackOrchestrator {
        let slots = adapters
            .iter()
            .map(|a| ProviderSlot {
                adapter: a.clone() as Arc<dyn SourceAdapter>,
                pacing,
            })
            .collect();
        FallbackOrchestrator::new(slots, CancellationToken::new(), PipelineMetrics::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_through_to_second_provider() {
        let a = MockAdapter::new(ProviderKind::CoinGecko, false);
        let b = MockAdapter::new(ProviderKind::BinanceFutures, true);
        let c = MockAdapter::new(ProviderKind::KrakenSpot, true);
        let orch = orchestrator(&[a.clone(), b.clone(), c.clone()], Duration::from_millis(500));

        let resolved = orch.resolve(&full_asset(), &range()).await.unwrap();

        assert_eq!(resolved.provider, ProviderKind::BinanceFutures);
        assert_eq!(resolved.series.provider(), ProviderKind::BinanceFutures);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
        assert_eq!(c.calls(), 0);
        assert_matches!(resolved.attempts[0].outcome, AttemptOutcome::Failed { .. });
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_identifier_skipped_without_request_or_pacing() {
        let a = MockAdapter::new(ProviderKind::CoinGecko, true);
        let b = MockAdapter::new(ProviderKind::KrakenSpot, true);
        let orch = orchestrator(&[a.clone(), b.clone()], Duration::from_secs(1));
        let asset = AssetDescriptor::new("XBT", "").with_kraken_pair("XBTUSD");
        let start = tokio::time::Instant::now();

        let resolved = orch.resolve(&asset, &range()).await.unwrap();

        assert_eq!(resolved.provider, ProviderKind::KrakenSpot);
        assert_eq!(a.calls(), 0);
        assert_eq!(resolved.attempts[0].outcome, AttemptOutcome::Skipped);
        // only the kraken attempt paced
        assert!(start.elapsed() < Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failed_is_no_data() {
        let a = MockAdapter::new(ProviderKind::CoinGecko, false);
        let b = MockAdapter::new(ProviderKind::BinanceFutures, false);
        let orch = orchestrator(&[a, b], Duration::from_millis(100));

        let err = orch.resolve(&full_asset(), &range()).await.unwrap_err();
        assert_matches!(err, MarketDataError::NoData { ref reason, .. } if reason.contains("coingecko, binance"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_built_from_provider_order() {
        let providers = ProvidersConfig {
            order: vec!["kraken".into(), "coingecko".into(), "bogus".into()],
            ..ProvidersConfig::default()
        };
        let http = Arc::new(crate::transport::MockHttpClient::new());
        let orch = FallbackOrchestrator::with_http(
            &providers,
            http,
            CancellationToken::new(),
            PipelineMetrics::new(),
        )
        .unwrap();
        assert_eq!(
            orch.providers(),
            vec![ProviderKind::KrakenSpot, ProviderKind::CoinGecko]
        );
        assert_eq!(orch.slots[0].pacing, Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_from_config_builds_reqwest_clients() {
        let orch = FallbackOrchestrator::from_config(
            &ProvidersConfig::default(),
            CancellationToken::new(),
            PipelineMetrics::new(),
        )
        .unwrap();
        assert_eq!(orch.providers().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_between_attempts() {
        let a = MockAdapter::new(ProviderKind::CoinGecko, false);
        let b = MockAdapter::new(ProviderKind::BinanceFutures, true);
        let orch = orchestrator(&[a.clone(), b.clone()], Duration::from_secs(5));
        orch.cancel.cancel();

        let err = orch.resolve(&full_asset(), &range()).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(a.calls(), 0);
        assert_eq!(b.calls(), 0);
    }
}
