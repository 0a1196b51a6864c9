//! Batch pipeline
//!
//! Assets run through fallback resolution and the volatility engine on a
//! bounded worker pool. A failing asset is logged and skipped; the batch
//! only fails when nothing at all was produced. Outputs are sorted by
//! symbol once every asset has finished.

use common::{AssetDescriptor, Symbol};
use config::OutputConfig;
use futures::stream::{self, StreamExt};
use market_data::MarketDataError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};
use volatility::{
    combined_layout, write_quotes, write_records, write_summaries, AssetQuote, SummaryBuilder,
    SummaryRecord, VolatilityTable,
};

use crate::{CollectorError, Result, RunContext};

/// What happened to one asset
#[derive(Debug)]
pub enum AssetOutcome {
    Completed(VolatilityTable),
    /// Every provider failed or had no identifier
    Unresolved { symbol: Symbol, reason: String },
    /// Unexpected failure while processing
    Failed { symbol: Symbol, error: String },
    /// Not processed because the run was cancelled
    Skipped { symbol: Symbol },
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// Sorted by symbol, each in date order
    pub tables: Vec<VolatilityTable>,
    pub summaries: Vec<SummaryRecord>,
    pub quotes: Vec<AssetQuote>,
    pub unresolved: Vec<(Symbol, String)>,
    pub failed: Vec<(Symbol, String)>,
    pub skipped: Vec<Symbol>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn record_count(&self) -> usize {
        self.tables.iter().map(|t| t.records.len()).sum()
    }

    /// Write the records, summary and (when anything was priced) pricer CSVs
    pub fn export(&self, output: &OutputConfig, days_to_expiry: f64) -> Result<ExportedFiles> {
        let records = output.records_path();
        let summary = output.summary_path();

        let rows = write_records(&records, &self.tables)?;
        if let Some(layout) = combined_layout(&self.tables) {
            write_summaries(&summary, &self.summaries, &layout)?;
        }

        let pricer = if self.quotes.is_empty() {
            None
        } else {
            let path = output.pricer_path();
            write_quotes(&path, &self.quotes, days_to_expiry)?;
            Some(path)
        };

        Ok(ExportedFiles {
            records,
            summary,
            pricer,
            rows,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub records: PathBuf,
    pub summary: PathBuf,
    pub pricer: Option<PathBuf>,
    pub rows: usize,
}

/// Process every asset in `ctx` and gather the results.
///
/// Returns `NoResults` when no asset produced records and the run was not
/// cancelled. A cancelled run returns whatever finished.
#[instrument(skip_all, fields(assets = ctx.assets.len(), concurrency = ctx.concurrency))]
pub async fn run_batch(ctx: Arc<RunContext>) -> Result<BatchReport> {
    let started = Instant::now();
    ctx.metrics.run_started();
    info!("Starting batch");

    let outcomes: Vec<AssetOutcome> = stream::iter(ctx.assets.clone())
        .map(|asset| {
            let ctx = ctx.clone();
            let symbol = asset.symbol.clone();
            async move {
                match tokio::spawn(async move { process_asset(&ctx, asset).await }).await {
                    Ok(outcome) => outcome,
                    Err(e) => AssetOutcome::Failed {
                        symbol,
                        error: format!("task aborted: {}", e),
                    },
                }
            }
        })
        .buffer_unordered(ctx.concurrency.max(1))
        .collect()
        .await;

    let mut report = BatchReport::default();
    for outcome in outcomes {
        match outcome {
            AssetOutcome::Completed(table) => report.tables.push(table),
            AssetOutcome::Unresolved { symbol, reason } => report.unresolved.push((symbol, reason)),
            AssetOutcome::Failed { symbol, error } => {
                ctx.metrics.asset_failed();
                report.failed.push((symbol, error));
            }
            AssetOutcome::Skipped { symbol } => report.skipped.push(symbol),
        }
    }

    report.tables.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    report.unresolved.sort();
    report.failed.sort();
    report.skipped.sort();
    report.cancelled = ctx.cancel.is_cancelled();

    let builder = SummaryBuilder::new();
    report.summaries = report.tables.iter().filter_map(|t| builder.build(t)).collect();
    if let Some(pricer) = &ctx.pricer {
        report.quotes = report
            .tables
            .iter()
            .filter_map(|t| pricer.price_latest(t))
            .collect();
    }

    report.elapsed = started.elapsed();
    ctx.metrics.run_finished();

    info!(
        completed = report.tables.len(),
        unresolved = report.unresolved.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        records = report.record_count(),
        cancelled = report.cancelled,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Batch finished"
    );

    if report.tables.is_empty() && !report.cancelled {
        return Err(CollectorError::NoResults {
            attempted: ctx.assets.len(),
        });
    }
    Ok(report)
}

#[instrument(skip_all, fields(symbol = %asset.symbol))]
async fn process_asset(ctx: &RunContext, asset: AssetDescriptor) -> AssetOutcome {
    if ctx.cancel.is_cancelled() {
        return AssetOutcome::Skipped {
            symbol: asset.symbol,
        };
    }

    match ctx.orchestrator.resolve(&asset, &ctx.range).await {
        Ok(resolved) => {
            let table = ctx.engine.compute_table(&resolved.series);
            if table.is_empty() {
                error!("Resolved series produced no records");
                return AssetOutcome::Failed {
                    symbol: asset.symbol,
                    error: "no records computed".to_string(),
                };
            }
            ctx.metrics.records_produced(table.records.len());
            info!(
                provider = %resolved.provider,
                records = table.records.len(),
                "Asset complete"
            );
            AssetOutcome::Completed(table)
        }
        Err(MarketDataError::Cancelled) => AssetOutcome::Skipped {
            symbol: asset.symbol,
        },
        Err(MarketDataError::NoData { reason, .. }) => {
            warn!(%reason, "Asset unresolved");
            AssetOutcome::Unresolved {
                symbol: asset.symbol,
                reason,
            }
        }
        Err(e) => {
            error!(error = %e, "Asset failed");
            AssetOutcome::Failed {
                symbol: asset.symbol,
                error: e.to_string(),
            }
        }
    }
}
