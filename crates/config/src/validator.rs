use crate::*;
use common::ProviderKind;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Date range is inverted: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("At least one volatility window must be configured")]
    NoWindows,

    #[error("Window lengths must be positive, got: {0}")]
    InvalidWindow(usize),

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("Window policy: {message}")]
    InvalidWindowPolicy { message: String },

    #[error("No assets configured (inline assets or asset_catalog_path required)")]
    NoAssets,

    #[error("Duplicate asset symbol: {0}")]
    DuplicateAsset(String),

    #[error("Provider order is empty")]
    EmptyProviderOrder,

    #[error("Unknown provider '{0}' in providers.order. Must be one of: coingecko, binance_futures, kraken_spot")]
    UnknownProvider(String),

    #[error("Provider '{0}' listed more than once in providers.order")]
    DuplicateProvider(String),

    #[error("Provider '{name}': {message}")]
    InvalidProvider { name: String, message: String },

    #[error("Strike band must satisfy 0 < low < high, got low={low} high={high}")]
    InvalidStrikeBand { low: f64, high: f64 },

    #[error("strike_count must be at least 2, got: {0}")]
    InvalidStrikeCount(usize),

    #[error("days_to_expiry must not be negative, got: {0}")]
    InvalidDaysToExpiry(f64),

    #[error("Pricer: {message}")]
    InvalidPricer { message: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &HvConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_run(&config.run, &mut report);
    validate_assets(config, &mut report);
    validate_providers(&config.providers, &mut report);
    validate_pricer(&config.pricer, &config.run, &mut report);

    report
}

fn validate_run(run: &RunConfig, report: &mut ValidationReport) {
    if run.start_date > run.end_date {
        report.add_error(ValidationError::InvalidDateRange {
            start: run.start_date,
            end: run.end_date,
        });
    }

    if run.windows.is_empty() {
        report.add_error(ValidationError::NoWindows);
    }
    for &w in &run.windows {
        if w == 0 {
            report.add_error(ValidationError::InvalidWindow(w));
        }
    }

    let unique: HashSet<_> = run.windows.iter().collect();
    if unique.len() != run.windows.len() {
        report.add_warning("run.windows", "Duplicate windows are computed once");
    }

    if run.concurrency == 0 {
        report.add_error(ValidationError::InvalidConcurrency);
    }

    let policy = &run.window_policy;
    for message in WindowPolicyConfig::problems(policy.floor, policy.fraction) {
        report.add_error(ValidationError::InvalidWindowPolicy { message });
    }

    if let Some(ts) = &run.term_structure {
        if ts.short >= ts.long {
            report.add_warning(
                "run.term_structure",
                &format!("short tenor {} is not shorter than long tenor {}", ts.short, ts.long),
            );
        }
        for tenor in [ts.short, ts.long] {
            if !run.windows.contains(&tenor) {
                report.add_warning(
                    "run.term_structure",
                    &format!("tenor {} is not a configured window, term_spread column will be omitted", tenor),
                );
            }
        }
    }
}

fn validate_assets(config: &HvConfig, report: &mut ValidationReport) {
    if config.assets.is_empty() && config.asset_catalog_path.is_none() {
        report.add_error(ValidationError::NoAssets);
    }

    let mut seen = HashSet::new();
    for asset in &config.assets {
        if !seen.insert(asset.symbol.as_str()) {
            report.add_error(ValidationError::DuplicateAsset(asset.symbol.to_string()));
        }
        if !asset.has_any_provider() {
            report.add_warning(
                &format!("assets.{}", asset.symbol),
                "No provider identifier configured, asset will be unresolved",
            );
        }
    }
}

fn validate_providers(providers: &ProvidersConfig, report: &mut ValidationReport) {
    if providers.order.is_empty() {
        report.add_error(ValidationError::EmptyProviderOrder);
    }

    let mut seen = HashSet::new();
    for name in &providers.order {
        match ProviderKind::parse(name) {
            Some(kind) => {
                if !seen.insert(kind) {
                    report.add_error(ValidationError::DuplicateProvider(name.clone()));
                }
            }
            None => report.add_error(ValidationError::UnknownProvider(name.clone())),
        }
    }

    for kind in ProviderKind::ALL {
        validate_provider(kind, providers, report);
    }
}

fn validate_provider(kind: ProviderKind, providers: &ProvidersConfig, report: &mut ValidationReport) {
    let overrides = providers.overrides(kind);
    let settings = providers.settings(kind);
    let name = kind.tag();
    let invalid = |message: &str| ValidationError::InvalidProvider {
        name: name.to_string(),
        message: message.to_string(),
    };

    if settings.page_limit == 0 {
        report.add_error(invalid("page_limit must be a positive integer"));
    }
    if kind == ProviderKind::BinanceFutures {
        if settings.fetch_funding && settings.funding_page_limit == 0 {
            report.add_error(invalid("funding_page_limit must be a positive integer"));
        }
        if settings.fetch_open_interest && settings.open_interest_page_limit == 0 {
            report.add_error(invalid("open_interest_page_limit must be a positive integer"));
        }
    }
    if settings.max_retries == 0 {
        report.add_error(invalid("max_retries must be a positive integer"));
    }
    if settings.timeout_seconds == 0 {
        report.add_error(invalid("timeout_seconds must be a positive integer"));
    }
    if url::Url::parse(&settings.base_url).is_err() {
        if has_unresolved_env_vars(&settings.base_url) {
            report.add_warning(
                &format!("providers.{}.base_url", name),
                "Contains unresolved environment variables",
            );
        } else {
            report.add_error(invalid(&format!("base_url is not a valid URL: {}", settings.base_url)));
        }
    }

    if let Some(key) = &overrides.api_key {
        for var in unresolved_env_vars(key) {
            report.add_warning(
                &format!("providers.{}.api_key", name),
                &format!("Environment variable '{}' is not set", var),
            );
        }
    }

    if overrides.rate_limit_backoff_seconds.is_none() {
        report.add_default(
            &format!("providers.{}.rate_limit_backoff_seconds", name),
            &settings.rate_limit_backoff_seconds.to_string(),
        );
    }
    if overrides.pacing_ms.is_none() {
        report.add_default(
            &format!("providers.{}.pacing_ms", name),
            &settings.pacing_ms.to_string(),
        );
    }
}

fn validate_pricer(pricer: &PricerConfig, run: &RunConfig, report: &mut ValidationReport) {
    if !pricer.enabled {
        return;
    }

    let (low, high) = (pricer.strike_band_low, pricer.strike_band_high);
    if !(low > 0.0 && low < high) {
        report.add_error(ValidationError::InvalidStrikeBand { low, high });
    }
    if pricer.strike_count < 2 {
        report.add_error(ValidationError::InvalidStrikeCount(pricer.strike_count));
    }
    if pricer.days_to_expiry < 0.0 {
        report.add_error(ValidationError::InvalidDaysToExpiry(pricer.days_to_expiry));
    }
    if !pricer.risk_free_rate.is_finite() {
        report.add_error(ValidationError::InvalidPricer {
            message: "risk_free_rate must be a finite number".to_string(),
        });
    }

    match pricer.volatility_input {
        VolatilityInputConfig::RepresentativeRms => {
            let has_pair = |a, b| run.windows.contains(&a) && run.windows.contains(&b);
            if !has_pair(7, 14) && !has_pair(2, 3) {
                report.add_warning(
                    "pricer.volatility_input",
                    "representative RMS needs windows 7 and 14 or 2 and 3, pricing will be skipped",
                );
            }
        }
        VolatilityInputConfig::Hv { window } | VolatilityInputConfig::Parkinson { window } => {
            if !run.windows.contains(&window) {
                report.add_error(ValidationError::InvalidPricer {
                    message: format!("volatility_input window {} is not a configured window", window),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use common::AssetDescriptor;

    fn valid_config() -> HvConfig {
        generate_default_config()
    }

    #[test]
    fn test_default_config_is_valid() {
        let report = validate_config(&valid_config());
        assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
        assert!(!report.defaults_applied.is_empty());
    }

    #[test]
    fn test_inverted_date_range() {
        let mut cfg = valid_config();
        cfg.run.start_date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        cfg.run.end_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        let report = validate_config(&cfg);
        assert_matches!(report.errors[0], ValidationError::InvalidDateRange { .. });
    }

    #[test]
    fn test_windows_rules() {
        let mut cfg = valid_config();
        cfg.run.windows = vec![];
        assert!(validate_config(&cfg).errors.contains(&ValidationError::NoWindows));

        cfg.run.windows = vec![0, 7, 14];
        assert!(validate_config(&cfg)
            .errors
            .contains(&ValidationError::InvalidWindow(0)));
    }

    #[test]
    fn test_window_policy_bounds() {
        let mut cfg = valid_config();
        cfg.run.window_policy = WindowPolicyConfig {
            floor: 1,
            fraction: 0.0,
        };
        let report = validate_config(&cfg);
        let policy_errors = report
            .errors
            .iter()
            .filter(|e| matches!(e, ValidationError::InvalidWindowPolicy { .. }))
            .count();
        assert_eq!(policy_errors, 2);

        cfg.run.window_policy = WindowPolicyConfig {
            floor: 2,
            fraction: 1.0,
        };
        assert!(validate_config(&cfg).is_valid());
    }

    #[test]
    fn test_term_structure_tenor_not_a_window() {
        let mut cfg = valid_config();
        cfg.run.windows = vec![2, 7];
        cfg.run.term_structure = Some(TermStructureConfig { short: 7, long: 30 });

        let report = validate_config(&cfg);
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.field == "run.term_structure" && w.message.contains("tenor 30")));
    }

    #[test]
    fn test_duplicate_assets_and_missing_ids() {
        let mut cfg = valid_config();
        cfg.assets.push(AssetDescriptor::new("BTC", "Bitcoin again"));
        cfg.assets.push(AssetDescriptor::new("NOID", "No identifiers"));

        let report = validate_config(&cfg);
        assert!(report
            .errors
            .contains(&ValidationError::DuplicateAsset("BTC".to_string())));
        assert!(report.warnings.iter().any(|w| w.field == "assets.NOID"));
    }

    #[test]
    fn test_provider_order_rules() {
        let mut cfg = valid_config();
        cfg.providers.order = vec!["coingecko".into(), "ftx".into(), "coingecko".into()];

        let report = validate_config(&cfg);
        assert!(report
            .errors
            .contains(&ValidationError::UnknownProvider("ftx".to_string())));
        assert!(report
            .errors
            .contains(&ValidationError::DuplicateProvider("coingecko".to_string())));
    }

    #[test]
    fn test_zero_page_limit_and_retries() {
        let mut cfg = valid_config();
        cfg.providers.kraken_spot.page_limit = Some(0);
        cfg.providers.kraken_spot.max_retries = Some(0);

        let report = validate_config(&cfg);
        let kraken_errors = report
            .errors
            .iter()
            .filter(|e| matches!(e, ValidationError::InvalidProvider { name, .. } if name == "kraken"))
            .count();
        assert_eq!(kraken_errors, 2);
    }

    #[test]
    fn test_pricer_rules() {
        let mut cfg = valid_config();
        cfg.pricer.strike_band_low = 1.2;
        cfg.pricer.strike_band_high = 0.8;
        cfg.pricer.strike_count = 1;
        cfg.pricer.days_to_expiry = -1.0;
        cfg.pricer.volatility_input = VolatilityInputConfig::Hv { window: 60 };

        let report = validate_config(&cfg);
        assert_eq!(report.errors.len(), 4);
        assert_matches!(report.errors[0], ValidationError::InvalidStrikeBand { .. });
    }

    #[test]
    fn test_unresolved_api_key_is_warning() {
        let mut cfg = valid_config();
        cfg.providers.coingecko.api_key = Some("${HVX_VALIDATOR_UNSET_KEY}".to_string());

        let report = validate_config(&cfg);
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.field == "providers.coingecko.api_key"));
    }
}
