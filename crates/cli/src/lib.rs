use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hvx")]
#[command(about = "HV screener - realized-volatility collector and options pricer for crypto assets")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// Log output format (overrides the config file)
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect price history, compute volatility metrics and export CSVs
    Run {
        /// Path to the configuration file
        #[arg(short, long, default_value = "master_config/hv_config.yaml")]
        config: PathBuf,

        /// Override the first date of the range (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Override the last date of the range (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Override the volatility windows, e.g. "2,3,7,14,30"
        #[arg(short, long)]
        windows: Option<String>,

        /// Override the output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the number of assets processed concurrently
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Validate configuration without fetching any data
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "master_config/hv_config.yaml")]
        config: PathBuf,
    },

    /// Initialize a new configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "hv_config.yaml")]
        output: PathBuf,
    },

    /// Print a Black-Scholes strike ladder for a given spot and volatility
    Price {
        /// Spot price of the underlying
        #[arg(long)]
        spot: f64,

        /// Days to expiry
        #[arg(long, default_value_t = 30.0)]
        days: f64,

        /// Annualized volatility as a decimal (0.6 = 60%)
        #[arg(long, default_value_t = 0.6)]
        vol: f64,

        /// Risk-free rate as a decimal
        #[arg(long, default_value_t = 0.05)]
        rate: f64,

        /// Lowest strike as a fraction of spot
        #[arg(long, default_value_t = 0.8)]
        band_low: f64,

        /// Highest strike as a fraction of spot
        #[arg(long, default_value_t = 1.2)]
        band_high: f64,

        /// Number of strikes in the ladder
        #[arg(long, default_value_t = 5)]
        strikes: usize,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable, colored
    Pretty,
    /// One JSON object per line
    Json,
    /// Single-line
    Compact,
}

impl LogFormatArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormatArg::Pretty => "pretty",
            LogFormatArg::Json => "json",
            LogFormatArg::Compact => "compact",
        }
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Parse a comma-separated window list.
///
/// Entries are trimmed; non-numeric and non-positive entries are dropped and
/// the result is sorted and de-duplicated.
pub fn parse_windows(input: &str) -> Vec<usize> {
    let mut windows: Vec<usize> = input
        .split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .filter(|w| *w > 0)
        .filter_map(|w| usize::try_from(w).ok())
        .collect();
    windows.sort_unstable();
    windows.dedup();
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_windows() {
        assert_eq!(parse_windows("14, 7,7,30"), vec![7, 14, 30]);
        assert_eq!(parse_windows("0,-3,abc, 2"), vec![2]);
        assert!(parse_windows("").is_empty());
    }

    #[test]
    fn test_run_command_overrides() {
        let cli = Cli::try_parse_from([
            "hvx",
            "run",
            "--config",
            "cfg.yaml",
            "--start",
            "2025-02-01",
            "--windows",
            "2,3",
            "--concurrency",
            "4",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                config,
                start,
                windows,
                concurrency,
                end,
                ..
            } => {
                assert_eq!(config, PathBuf::from("cfg.yaml"));
                assert_eq!(start, NaiveDate::from_ymd_opt(2025, 2, 1));
                assert_eq!(end, None);
                assert_eq!(windows.as_deref(), Some("2,3"));
                assert_eq!(concurrency, Some(4));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_price_defaults() {
        let cli = Cli::try_parse_from(["hvx", "--log-format", "json", "price", "--spot", "100"]).unwrap();
        assert_eq!(cli.log_format, Some(LogFormatArg::Json));
        match cli.command {
            Commands::Price { spot, days, strikes, .. } => {
                assert_eq!(spot, 100.0);
                assert_eq!(days, 30.0);
                assert_eq!(strikes, 5);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_bad_date_rejected() {
        assert!(Cli::try_parse_from(["hvx", "run", "--start", "2025-13-01"]).is_err());
    }
}
