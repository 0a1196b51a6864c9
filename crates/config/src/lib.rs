use chrono::NaiveDate;
use common::{AssetDescriptor, ProviderKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod catalog;
pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use catalog::*;
pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Top-level run configuration loaded from YAML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HvConfig {
    #[serde(default)]
    pub run: RunConfig,
    /// Inline asset catalog
    #[serde(default)]
    pub assets: Vec<AssetDescriptor>,
    /// CSV asset catalog, read after the inline entries
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub pricer: PricerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
    #[serde(default = "default_end_date")]
    pub end_date: NaiveDate,
    /// Rolling window lengths in days
    #[serde(default = "default_windows")]
    pub windows: Vec<usize>,
    /// Number of assets processed concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub window_policy: WindowPolicyConfig,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_structure: Option<TermStructureConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            end_date: default_end_date(),
            windows: default_windows(),
            concurrency: default_concurrency(),
            window_policy: WindowPolicyConfig::default(),
            term_structure: Some(default_term_structure()),
        }
    }
}

/// Minimum number of defined data points a window needs:
/// `max(floor, ceil(window * fraction))`
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct WindowPolicyConfig {
    #[serde(default = "default_window_floor")]
    pub floor: usize,
    #[serde(default = "default_window_fraction")]
    pub fraction: f64,
}

impl WindowPolicyConfig {
    /// A sample deviation needs at least two returns
    pub const MIN_FLOOR: usize = 2;

    /// Why `floor` and `fraction` cannot be used together; empty when they can
    pub fn problems(floor: usize, fraction: f64) -> Vec<String> {
        let mut out = Vec::new();
        if floor < Self::MIN_FLOOR {
            out.push(format!(
                "floor must be at least {} (a sample deviation needs two returns), got {}",
                Self::MIN_FLOOR,
                floor
            ));
        }
        if !(fraction.is_finite() && fraction > 0.0 && fraction <= 1.0) {
            out.push(format!("fraction must be in (0, 1], got {}", fraction));
        }
        out
    }
}

impl Default for WindowPolicyConfig {
    fn default() -> Self {
        Self {
            floor: default_window_floor(),
            fraction: default_window_fraction(),
        }
    }
}

/// Tenor pair for the HV term-structure spread (`hv_short - hv_long`)
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TermStructureConfig {
    pub short: usize,
    pub long: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    /// Sleep `rate_limit_backoff_seconds` before every retry
    Fixed,
    /// Double the sleep each retry, capped at `max_backoff_seconds`
    Exponential,
}

/// Per-provider overrides as written in YAML.
///
/// Every field is optional; anything left out falls back to the
/// provider's own default (see [`ProviderSettings::defaults_for`]).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProviderOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_request_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_backoff_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_backoff_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff: Option<BackoffKind>,
    /// Rows per page (CoinGecko: days per chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_page_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_interest_page_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_funding: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_open_interest: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_volume: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Fully resolved settings for one provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSettings {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub page_delay_ms: u64,
    pub pacing_ms: u64,
    pub min_request_interval_ms: u64,
    pub rate_limit_backoff_seconds: u64,
    pub max_backoff_seconds: u64,
    pub max_retries: u32,
    pub backoff: BackoffKind,
    pub page_limit: u32,
    pub funding_page_limit: u32,
    pub open_interest_page_limit: u32,
    pub fetch_funding: bool,
    pub fetch_open_interest: bool,
    pub fetch_volume: bool,
    pub api_key: Option<String>,
}

impl ProviderSettings {
    pub fn defaults_for(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::CoinGecko => Self {
                base_url: "https://api.coingecko.com/api/v3".to_string(),
                timeout_seconds: default_timeout_seconds(),
                page_delay_ms: default_page_delay_ms(),
                pacing_ms: 1200,
                min_request_interval_ms: 1200,
                rate_limit_backoff_seconds: 60,
                max_backoff_seconds: 300,
                max_retries: default_max_retries(),
                backoff: BackoffKind::Fixed,
                page_limit: 365,
                funding_page_limit: 0,
                open_interest_page_limit: 0,
                fetch_funding: false,
                fetch_open_interest: false,
                fetch_volume: true,
                api_key: None,
            },
            ProviderKind::BinanceFutures => Self {
                base_url: "https://fapi.binance.com".to_string(),
                timeout_seconds: default_timeout_seconds(),
                page_delay_ms: default_page_delay_ms(),
                pacing_ms: 500,
                min_request_interval_ms: 250,
                rate_limit_backoff_seconds: 10,
                max_backoff_seconds: 120,
                max_retries: default_max_retries(),
                backoff: BackoffKind::Fixed,
                page_limit: 1500,
                funding_page_limit: 1000,
                open_interest_page_limit: 500,
                fetch_funding: true,
                fetch_open_interest: true,
                fetch_volume: true,
                api_key: None,
            },
            ProviderKind::KrakenSpot => Self {
                base_url: "https://api.kraken.com".to_string(),
                timeout_seconds: default_timeout_seconds(),
                page_delay_ms: default_page_delay_ms(),
                pacing_ms: 1000,
                min_request_interval_ms: 1000,
                rate_limit_backoff_seconds: 5,
                max_backoff_seconds: 60,
                max_retries: default_max_retries(),
                backoff: BackoffKind::Fixed,
                page_limit: 720,
                funding_page_limit: 0,
                open_interest_page_limit: 0,
                fetch_funding: false,
                fetch_open_interest: false,
                fetch_volume: true,
                api_key: None,
            },
        }
    }

    /// Apply YAML overrides on top of these settings
    pub fn apply(mut self, o: &ProviderOverrides) -> Self {
        if let Some(v) = &o.base_url {
            self.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = o.timeout_seconds {
            self.timeout_seconds = v;
        }
        if let Some(v) = o.page_delay_ms {
            self.page_delay_ms = v;
        }
        if let Some(v) = o.pacing_ms {
            self.pacing_ms = v;
        }
        if let Some(v) = o.min_request_interval_ms {
            self.min_request_interval_ms = v;
        }
        if let Some(v) = o.rate_limit_backoff_seconds {
            self.rate_limit_backoff_seconds = v;
        }
        if let Some(v) = o.max_backoff_seconds {
            self.max_backoff_seconds = v;
        }
        if let Some(v) = o.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = o.backoff {
            self.backoff = v;
        }
        if let Some(v) = o.page_limit {
            self.page_limit = v;
        }
        if let Some(v) = o.funding_page_limit {
            self.funding_page_limit = v;
        }
        if let Some(v) = o.open_interest_page_limit {
            self.open_interest_page_limit = v;
        }
        if let Some(v) = o.fetch_funding {
            self.fetch_funding = v;
        }
        if let Some(v) = o.fetch_open_interest {
            self.fetch_open_interest = v;
        }
        if let Some(v) = o.fetch_volume {
            self.fetch_volume = v;
        }
        if let Some(v) = &o.api_key {
            let trimmed = v.trim();
            self.api_key = if trimmed.is_empty() || has_unresolved_env_vars(trimmed) {
                None
            } else {
                Some(trimmed.to_string())
            };
        }
        self
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvidersConfig {
    /// Priority order, first successful provider wins
    #[serde(default = "default_provider_order")]
    pub order: Vec<String>,
    #[serde(default)]
    pub coingecko: ProviderOverrides,
    #[serde(default)]
    pub binance_futures: ProviderOverrides,
    #[serde(default)]
    pub kraken_spot: ProviderOverrides,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            order: default_provider_order(),
            coingecko: ProviderOverrides::default(),
            binance_futures: ProviderOverrides::default(),
            kraken_spot: ProviderOverrides::default(),
        }
    }
}

impl ProvidersConfig {
    pub fn overrides(&self, kind: ProviderKind) -> &ProviderOverrides {
        match kind {
            ProviderKind::CoinGecko => &self.coingecko,
            ProviderKind::BinanceFutures => &self.binance_futures,
            ProviderKind::KrakenSpot => &self.kraken_spot,
        }
    }

    pub fn settings(&self, kind: ProviderKind) -> ProviderSettings {
        ProviderSettings::defaults_for(kind).apply(self.overrides(kind))
    }

    /// Parsed priority order; unknown names and repeats are dropped
    pub fn priority(&self) -> Vec<ProviderKind> {
        let mut out = Vec::new();
        for name in &self.order {
            if let Some(kind) = ProviderKind::parse(name) {
                if !out.contains(&kind) {
                    out.push(kind);
                }
            }
        }
        out
    }
}

/// Which realized-volatility figure feeds the pricer
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VolatilityInputConfig {
    RepresentativeRms,
    Hv { window: usize },
    Parkinson { window: usize },
}

impl Default for VolatilityInputConfig {
    fn default() -> Self {
        Self::RepresentativeRms
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_days_to_expiry")]
    pub days_to_expiry: f64,
    #[serde(default = "default_strike_band_low")]
    pub strike_band_low: f64,
    #[serde(default = "default_strike_band_high")]
    pub strike_band_high: f64,
    #[serde(default = "default_strike_count")]
    pub strike_count: usize,
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    #[serde(default)]
    pub volatility_input: VolatilityInputConfig,
}

impl Default for PricerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            days_to_expiry: default_days_to_expiry(),
            strike_band_low: default_strike_band_low(),
            strike_band_high: default_strike_band_high(),
            strike_count: default_strike_count(),
            risk_free_rate: default_risk_free_rate(),
            volatility_input: VolatilityInputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_records_file")]
    pub records_file: String,
    #[serde(default = "default_summary_file")]
    pub summary_file: String,
    #[serde(default = "default_pricer_file")]
    pub pricer_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            records_file: default_records_file(),
            summary_file: default_summary_file(),
            pricer_file: default_pricer_file(),
        }
    }
}

impl OutputConfig {
    pub fn records_path(&self) -> PathBuf {
        self.directory.join(&self.records_file)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.directory.join(&self.summary_file)
    }

    pub fn pricer_path(&self) -> PathBuf {
        self.directory.join(&self.pricer_file)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// pretty | json | compact
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Prometheus exporter port; exporter disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus_port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_config() {
        let yaml = include_str!("../../../master_config/hv_config.yaml");
        let cfg: HvConfig = serde_yaml::from_str(yaml).expect("sample config should parse");

        assert_eq!(cfg.run.windows, vec![2, 3, 7, 14, 30]);
        assert_eq!(cfg.assets.len(), 3);
        assert_eq!(cfg.assets[0].symbol.as_str(), "BTC");
        assert_eq!(
            cfg.providers.priority(),
            vec![
                ProviderKind::CoinGecko,
                ProviderKind::BinanceFutures,
                ProviderKind::KrakenSpot
            ]
        );
        assert_eq!(cfg.pricer.strike_count, 5);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let yaml = r#"
run:
  start_date: 2025-01-01
  end_date: 2025-03-01
assets:
  - symbol: ETH
    name: Ethereum
    binance_symbol: ETHUSDT
"#;
        let cfg: HvConfig = serde_yaml::from_str(yaml).expect("Failed to parse YAML");

        assert_eq!(cfg.run.concurrency, 1);
        assert_eq!(cfg.run.window_policy.floor, 2);
        assert!(cfg.run.term_structure.is_none());
        assert_eq!(cfg.pricer.volatility_input, VolatilityInputConfig::RepresentativeRms);

        let binance = cfg.providers.settings(ProviderKind::BinanceFutures);
        assert_eq!(binance.page_limit, 1500);
        assert_eq!(binance.rate_limit_backoff_seconds, 10);
        assert_eq!(binance.pacing_ms, 500);
    }

    #[test]
    fn test_provider_overrides_apply() {
        let yaml = r#"
providers:
  order: [kraken, coingecko, kraken, bogus]
  kraken_spot:
    base_url: "http://localhost:9000/"
    max_retries: 7
    backoff: exponential
  coingecko:
    api_key: "  "
"#;
        let cfg: HvConfig = serde_yaml::from_str(yaml).expect("Failed to parse YAML");

        assert_eq!(
            cfg.providers.priority(),
            vec![ProviderKind::KrakenSpot, ProviderKind::CoinGecko]
        );
        let kraken = cfg.providers.settings(ProviderKind::KrakenSpot);
        assert_eq!(kraken.base_url, "http://localhost:9000");
        assert_eq!(kraken.max_retries, 7);
        assert_eq!(kraken.backoff, BackoffKind::Exponential);
        assert_eq!(kraken.page_limit, 720);
        assert_eq!(cfg.providers.settings(ProviderKind::CoinGecko).api_key, None);
    }

    #[test]
    fn test_volatility_input_tagged() {
        let yaml = r#"
pricer:
  volatility_input:
    kind: parkinson
    window: 14
"#;
        let cfg: HvConfig = serde_yaml::from_str(yaml).expect("Failed to parse YAML");
        assert_eq!(
            cfg.pricer.volatility_input,
            VolatilityInputConfig::Parkinson { window: 14 }
        );
    }

    #[test]
    fn test_generate_default_config() {
        let config = parser::generate_default_config();

        assert!(!config.assets.is_empty());
        assert_eq!(config.run.windows, default_windows());
        assert!(config.metrics.prometheus_port.is_none());
        assert!(validate_config(&config).is_valid());
    }
}
