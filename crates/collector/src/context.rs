//! Everything one collection run needs, built once from the config

use common::{AssetDescriptor, DateRange};
use config::{HvConfig, OutputConfig};
use market_data::FallbackOrchestrator;
use observability::PipelineMetrics;
use tokio_util::sync::CancellationToken;
use tracing::info;
use volatility::{OptionsPricer, PricerSettings, VolatilityEngine, WindowPolicy};

use crate::{CollectorError, Result};

pub struct RunContext {
    pub assets: Vec<AssetDescriptor>,
    pub range: DateRange,
    pub concurrency: usize,
    pub orchestrator: FallbackOrchestrator,
    pub engine: VolatilityEngine,
    /// `None` when pricing is disabled
    pub pricer: Option<OptionsPricer>,
    pub output: OutputConfig,
    pub cancel: CancellationToken,
    pub metrics: PipelineMetrics,
}

impl RunContext {
    /// Build the engine, pricer and provider chain from `config`.
    ///
    /// Each provider gets its own request limiter, shared by every worker.
    pub fn from_config(
        config: &HvConfig,
        assets: Vec<AssetDescriptor>,
        cancel: CancellationToken,
        metrics: PipelineMetrics,
    ) -> Result<Self> {
        let orchestrator =
            FallbackOrchestrator::from_config(&config.providers, cancel.clone(), metrics.clone())
                .map_err(|e| CollectorError::config(e.to_string()))?;
        Self::with_orchestrator(config, assets, orchestrator, cancel, metrics)
    }

    /// Like [`Self::from_config`] with a caller-supplied provider chain
    pub fn with_orchestrator(
        config: &HvConfig,
        assets: Vec<AssetDescriptor>,
        orchestrator: FallbackOrchestrator,
        cancel: CancellationToken,
        metrics: PipelineMetrics,
    ) -> Result<Self> {
        let run = &config.run;
        let range = DateRange::new(run.start_date, run.end_date)
            .map_err(|e| CollectorError::config(e.to_string()))?;

        if run.concurrency == 0 {
            return Err(CollectorError::config("concurrency must be at least 1"));
        }

        let policy = WindowPolicy::try_from(&run.window_policy)
            .map_err(|e| CollectorError::config(e.to_string()))?;
        let engine = VolatilityEngine::new(&run.windows, policy)
            .map_err(|e| CollectorError::config(e.to_string()))?
            .with_term_structure(run.term_structure.as_ref());

        let pricer = if config.pricer.enabled {
            Some(
                OptionsPricer::new(PricerSettings::from(&config.pricer))
                    .map_err(|e| CollectorError::config(e.to_string()))?,
            )
        } else {
            None
        };

        info!(
            assets = assets.len(),
            start = %range.start,
            end = %range.end,
            windows = ?engine.windows(),
            providers = ?orchestrator.providers(),
            concurrency = run.concurrency,
            "Run context ready"
        );

        Ok(Self {
            assets,
            range,
            concurrency: run.concurrency,
            orchestrator,
            engine,
            pricer,
            output: config.output.clone(),
            cancel,
            metrics,
        })
    }
}
