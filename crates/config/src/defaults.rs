use chrono::NaiveDate;
use std::path::PathBuf;

pub fn default_enabled() -> bool {
    true
}

// Run defaults
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or(NaiveDate::MIN)
}

pub fn default_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 17).unwrap_or(NaiveDate::MIN)
}

pub fn default_windows() -> Vec<usize> {
    vec![2, 3, 7, 14, 30]
}

pub fn default_concurrency() -> usize {
    1
}

pub fn default_window_floor() -> usize {
    2
}

pub fn default_window_fraction() -> f64 {
    0.5
}

pub fn default_term_structure() -> super::TermStructureConfig {
    super::TermStructureConfig { short: 7, long: 30 }
}

// Provider defaults
pub fn default_provider_order() -> Vec<String> {
    vec![
        "coingecko".to_string(),
        "binance_futures".to_string(),
        "kraken_spot".to_string(),
    ]
}

pub fn default_timeout_seconds() -> u64 {
    30
}

pub fn default_page_delay_ms() -> u64 {
    500
}

pub fn default_max_retries() -> u32 {
    5
}

// Pricer defaults
pub fn default_days_to_expiry() -> f64 {
    30.0
}

pub fn default_strike_band_low() -> f64 {
    0.8
}

pub fn default_strike_band_high() -> f64 {
    1.2
}

pub fn default_strike_count() -> usize {
    5
}

pub fn default_risk_free_rate() -> f64 {
    0.05
}

// Output defaults
pub fn default_output_directory() -> PathBuf {
    PathBuf::from("output")
}

pub fn default_records_file() -> String {
    "hv_data_full.csv".to_string()
}

pub fn default_summary_file() -> String {
    "hv_summary_stats.csv".to_string()
}

pub fn default_pricer_file() -> String {
    "hv_option_pricer.csv".to_string()
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}
