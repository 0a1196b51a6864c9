//! Asset catalog loading.
//!
//! The catalog is the inline `assets` list of the run config followed by the
//! rows of an optional CSV file with the columns
//! `Coin symbol, Common Name, CG API ID, Binance Symbol, Kraken Pair`
//! (the last two may be missing entirely).

use crate::{parser::normalize_asset, HvConfig};
use anyhow::{Context, Result};
use common::AssetDescriptor;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct CatalogRow {
    #[serde(rename = "Coin symbol")]
    symbol: String,
    #[serde(rename = "Common Name", default)]
    name: Option<String>,
    #[serde(rename = "CG API ID", default)]
    coingecko_id: Option<String>,
    #[serde(rename = "Binance Symbol", default)]
    binance_symbol: Option<String>,
    #[serde(rename = "Kraken Pair", default)]
    kraken_pair: Option<String>,
}

impl CatalogRow {
    fn into_descriptor(self) -> AssetDescriptor {
        normalize_asset(AssetDescriptor {
            symbol: self.symbol.into(),
            name: self.name.unwrap_or_default(),
            coingecko_id: self.coingecko_id,
            binance_symbol: self.binance_symbol,
            kraken_pair: self.kraken_pair,
        })
    }
}

/// Read a CSV asset catalog
pub fn load_asset_catalog<P: AsRef<Path>>(path: P) -> Result<Vec<AssetDescriptor>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open asset catalog: {:?}", path))?;

    let mut assets = Vec::new();
    for (line, row) in reader.deserialize::<CatalogRow>().enumerate() {
        let row = row.with_context(|| format!("Invalid catalog row {} in {:?}", line + 2, path))?;
        if row.symbol.trim().is_empty() {
            warn!(row = line + 2, "Skipping catalog row without a symbol");
            continue;
        }
        assets.push(row.into_descriptor());
    }

    info!(count = assets.len(), "Loaded asset catalog from {:?}", path);
    Ok(assets)
}

/// Inline assets followed by the CSV catalog (if configured), first
/// occurrence of a symbol wins.
///
/// A relative `asset_catalog_path` is resolved against `base_dir`.
pub fn resolve_assets(config: &HvConfig, base_dir: &Path) -> Result<Vec<AssetDescriptor>> {
    let mut assets = config.assets.clone();

    if let Some(catalog) = &config.asset_catalog_path {
        let path = if catalog.is_relative() {
            base_dir.join(catalog)
        } else {
            catalog.clone()
        };
        assets.extend(load_asset_catalog(&path)?);
    }

    let mut seen = HashSet::new();
    assets.retain(|a| {
        let fresh = seen.insert(a.symbol.clone());
        if !fresh {
            warn!(symbol = %a.symbol, "Duplicate asset symbol, keeping first entry");
        }
        fresh
    });

    Ok(assets)
}
