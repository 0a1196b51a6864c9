use crate::*;
use anyhow::{Context, Result};
use common::AssetDescriptor;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<HvConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    let config = parse_config(&content)?;

    info!(
        assets = config.assets.len(),
        windows = ?config.run.windows,
        "Configuration loaded successfully"
    );
    Ok(config)
}

/// Parse YAML text after environment substitution
pub fn parse_config(content: &str) -> Result<HvConfig> {
    let substituted = substitution::substitute_env_vars(content)?;
    debug!("Environment variable substitution completed");

    let mut config: HvConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    config.assets = config.assets.into_iter().map(normalize_asset).collect();
    Ok(config)
}

/// Uppercase the symbol and turn blank identifiers into `None`
pub fn normalize_asset(asset: AssetDescriptor) -> AssetDescriptor {
    let mut out = AssetDescriptor::new(asset.symbol.as_str(), asset.name.trim());
    if let Some(id) = asset.coingecko_id {
        out = out.with_coingecko_id(id);
    }
    if let Some(sym) = asset.binance_symbol {
        out = out.with_binance_symbol(sym);
    }
    if let Some(pair) = asset.kraken_pair {
        out = out.with_kraken_pair(pair);
    }
    out
}

#[instrument]
pub fn generate_default_config() -> HvConfig {
    HvConfig {
        run: RunConfig::default(),
        assets: vec![
            AssetDescriptor::new("BTC", "Bitcoin")
                .with_coingecko_id("bitcoin")
                .with_binance_symbol("BTCUSDT")
                .with_kraken_pair("XBTUSD"),
            AssetDescriptor::new("ETH", "Ethereum")
                .with_coingecko_id("ethereum")
                .with_binance_symbol("ETHUSDT")
                .with_kraken_pair("ETHUSD"),
        ],
        asset_catalog_path: None,
        providers: ProvidersConfig::default(),
        pricer: PricerConfig::default(),
        output: OutputConfig::default(),
        logging: LoggingConfig::default(),
        metrics: MetricsConfig::default(),
    }
}

#[instrument]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &HvConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProviderKind;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = generate_default_config();
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.assets, config.assets);
        assert_eq!(loaded.run.windows, config.run.windows);
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let err = load_config("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_parse_normalizes_assets() {
        let yaml = r#"
assets:
  - symbol: sol
    name: " Solana "
    coingecko_id: solana
    binance_symbol: ""
"#;
        let cfg = parse_config(yaml).unwrap();
        let sol = &cfg.assets[0];
        assert_eq!(sol.symbol.as_str(), "SOL");
        assert_eq!(sol.name, "Solana");
        assert_eq!(sol.provider_id(ProviderKind::BinanceFutures), None);
        assert_eq!(sol.provider_id(ProviderKind::CoinGecko), Some("solana"));
    }

    #[test]
    fn test_env_substitution_in_api_key() {
        std::env::set_var("HVX_TEST_CG_KEY", "demo-key");
        let yaml = r#"
providers:
  coingecko:
    api_key: "${HVX_TEST_CG_KEY}"
"#;
        let cfg = parse_config(yaml).unwrap();
        assert_eq!(
            cfg.providers.settings(ProviderKind::CoinGecko).api_key.as_deref(),
            Some("demo-key")
        );
    }
}
