//! HV Screener CLI Binary
//!
//! Entry point for collecting realized-volatility data, validating and
//! generating configuration, and pricing standalone strike ladders.

use anyhow::{Context, Result};
use cli::{parse_windows, Cli, Commands};
use collector::{run_batch, RunContext, ShutdownController};
use config::{
    generate_default_config, load_config, resolve_assets, save_config, validate_config, HvConfig,
    ValidationReport,
};
use observability::{init_logging_named, init_metrics, PipelineMetrics};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use volatility::{OptionsPricer, PricerSettings};

/// Conventional exit status after Ctrl+C
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse_args();
    let log_override = cli.log_format.map(|f| f.as_str());

    match cli.command {
        Commands::Run {
            config,
            start,
            end,
            windows,
            output,
            concurrency,
        } => {
            let mut cfg = load_config(&config)?;
            init_logging_named("hvx", log_override.unwrap_or(cfg.logging.format.as_str()))?;
            debug!(path = ?config, "Configuration loaded");

            if let Some(start) = start {
                cfg.run.start_date = start;
            }
            if let Some(end) = end {
                cfg.run.end_date = end;
            }
            if let Some(windows) = windows {
                cfg.run.windows = parse_windows(&windows);
            }
            if let Some(output) = output {
                cfg.output.directory = output;
            }
            if let Some(concurrency) = concurrency {
                cfg.run.concurrency = concurrency;
            }

            info!("Executing 'run' command");
            run_command(cfg, &config).await
        }
        Commands::Validate { config } => {
            init_logging_named("hvx", log_override.unwrap_or("pretty"))?;
            info!("Executing 'validate' command");
            validate_command(config).map(|_| ExitCode::SUCCESS)
        }
        Commands::Init { output } => {
            init_logging_named("hvx", log_override.unwrap_or("pretty"))?;
            info!("Executing 'init' command");
            init_command(output).map(|_| ExitCode::SUCCESS)
        }
        Commands::Price {
            spot,
            days,
            vol,
            rate,
            band_low,
            band_high,
            strikes,
        } => {
            init_logging_named("hvx", log_override.unwrap_or("pretty"))?;
            let settings = PricerSettings {
                days_to_expiry: days,
                band_low,
                band_high,
                strike_count: strikes,
                risk_free_rate: rate,
                ..PricerSettings::default()
            };
            price_command(spot, vol, settings).map(|_| ExitCode::SUCCESS)
        }
    }
}

fn log_report(report: &ValidationReport) {
    for default in &report.defaults_applied {
        debug!(field = %default.field, value = %default.value, "Default applied");
    }
    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }
    for err in &report.errors {
        error!("{}", err);
    }
}

async fn run_command(config: HvConfig, config_path: &Path) -> Result<ExitCode> {
    let report = validate_config(&config);
    log_report(&report);
    if !report.is_valid() {
        anyhow::bail!(
            "Cannot run: {} configuration error(s)",
            report.errors.len()
        );
    }

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let assets = resolve_assets(&config, base_dir).context("Failed to load asset catalog")?;
    if assets.is_empty() {
        anyhow::bail!("No assets to process");
    }

    if let Some(port) = config.metrics.prometheus_port {
        init_metrics(port).context("Failed to start metrics exporter")?;
    }

    let shutdown = ShutdownController::with_ctrl_c();
    let ctx = RunContext::from_config(&config, assets, shutdown.token(), PipelineMetrics::new())?;
    let batch = run_batch(Arc::new(ctx)).await?;

    let files = batch
        .export(&config.output, config.pricer.days_to_expiry)
        .context("Failed to export results")?;

    println!();
    println!("=== Collection Summary ===");
    println!();
    println!("Assets completed:  {}", batch.tables.len());
    println!("Assets unresolved: {}", batch.unresolved.len());
    for (symbol, reason) in &batch.unresolved {
        println!("  [warn] {}: {}", symbol, reason);
    }
    if !batch.failed.is_empty() {
        println!("Assets failed:     {}", batch.failed.len());
        for (symbol, err) in &batch.failed {
            println!("  [error] {}: {}", symbol, err);
        }
    }
    println!("Records:           {}", files.rows);
    println!();
    println!("Records: {}", files.records.display());
    println!("Summary: {}", files.summary.display());
    if let Some(pricer) = &files.pricer {
        println!("Pricer:  {}", pricer.display());
    }

    if batch.cancelled {
        warn!(skipped = batch.skipped.len(), "Run cancelled, partial results written");
        println!();
        println!("[warn] Run cancelled; {} asset(s) not processed", batch.skipped.len());
        return Ok(ExitCode::from(EXIT_CANCELLED));
    }

    Ok(ExitCode::SUCCESS)
}

fn validate_command(config_path: PathBuf) -> Result<()> {
    info!(path = ?config_path, "Validating configuration");

    let config = match load_config(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Failed to load configuration");
            anyhow::bail!(e);
        }
    };

    let report = validate_config(&config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let assets = resolve_assets(&config, base_dir).context("Failed to load asset catalog")?;
    let providers: Vec<_> = config.providers.priority().iter().map(|p| p.tag()).collect();

    println!("[ok] Configuration is valid!");
    println!();
    println!(
        "Date range: {} to {}",
        config.run.start_date, config.run.end_date
    );
    println!("Windows: {:?}", config.run.windows);
    println!("Providers: {}", providers.join(" -> "));
    println!("Assets: {}", assets.len());
    println!("Output: {}", config.output.directory.display());

    Ok(())
}

fn init_command(output_path: PathBuf) -> Result<()> {
    info!(?output_path, "Initializing new configuration file");

    let config = generate_default_config();
    save_config(&config, &output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("This configuration includes:");
    println!(
        "  - Date range {} to {}",
        config.run.start_date, config.run.end_date
    );
    println!("  - {} assets (BTC, ETH)", config.assets.len());
    println!("  - Provider order: coingecko -> binance -> kraken");
    println!();
    println!("Next steps:");
    println!("  1. Edit the configuration file or point asset_catalog_path at a CSV");
    println!("  2. Optionally set COINGECKO_API_KEY");
    println!("  3. Run 'hvx validate --config {:?}' to check configuration", output_path);
    println!("  4. Run 'hvx run --config {:?}' to collect data", output_path);

    Ok(())
}

fn price_command(spot: f64, vol: f64, settings: PricerSettings) -> Result<()> {
    let pricer = OptionsPricer::new(settings).context("Invalid pricer parameters")?;
    let rows = pricer.ladder(spot, vol);
    let s = pricer.settings();

    println!();
    println!(
        "Spot {:.2} | vol {:.2}% | {} days | rate {:.2}%",
        spot,
        vol * 100.0,
        s.days_to_expiry,
        s.risk_free_rate * 100.0
    );
    println!();
    println!(
        "{:>12} {:>8} {:>12} {:>12} {:>8} {:>8} {:>10} {:>10} {:>10}",
        "strike", "K/S", "call", "put", "c.delta", "p.delta", "gamma", "vega", "theta"
    );
    for r in rows {
        println!(
            "{:>12.2} {:>8.3} {:>12.4} {:>12.4} {:>8.4} {:>8.4} {:>10.6} {:>10.4} {:>10.4}",
            r.strike,
            r.moneyness,
            r.call_price,
            r.put_price,
            r.call_delta,
            r.put_delta,
            r.gamma,
            r.vega,
            r.theta
        );
    }
    Ok(())
}
