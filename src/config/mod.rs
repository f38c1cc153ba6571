pub mod persist;
mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Printify supports at most this many variants per product
pub const MAX_SELECTED_VARIANTS: usize = 100;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    apply_env_overrides(&mut config.listing);

    Ok(config)
}

/// Find the config file to use: the explicit path, or the first default
/// location that exists
pub fn resolve_config_path(custom_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = custom_path {
        return Some(path.to_path_buf());
    }

    let default_paths = [
        "./printwatch.toml",
        "./config.toml",
        "~/.config/printwatch/config.toml",
        "/etc/printwatch/config.toml",
    ];

    default_paths
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .find(|p| p.exists())
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = resolve_config_path(custom_path) {
        return load_config(&path);
    }

    let mut config = Config::default();
    apply_env_overrides(&mut config.listing);
    Ok(config)
}

/// Fill empty Printify credentials from the environment
pub fn apply_env_overrides(listing: &mut ListingSettings) {
    if listing.printify_api_key.is_empty() {
        if let Ok(key) = std::env::var("PRINTIFY_API_KEY") {
            listing.printify_api_key = key;
        }
    }
    if listing.printify_shop_id.is_empty() {
        if let Ok(shop) = std::env::var("PRINTIFY_SHOP_ID") {
            listing.printify_shop_id = shop;
        }
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.monitor.poll_interval_ms == 0 {
        anyhow::bail!("Monitor poll interval cannot be 0");
    }

    validate_listing(&config.listing)?;

    if !config.listing.watch_folder.is_empty() {
        let folder = Path::new(&config.listing.watch_folder);
        if !folder.exists() {
            tracing::warn!("Watch folder does not exist yet: {:?}", folder);
        }
    }

    Ok(())
}

/// Validate the runtime-editable listing settings
pub fn validate_listing(listing: &ListingSettings) -> Result<()> {
    if listing.selected_variants.len() > MAX_SELECTED_VARIANTS {
        anyhow::bail!("Selected variants exceed {}", MAX_SELECTED_VARIANTS);
    }

    if listing.profit_percent < 0.0 {
        anyhow::bail!("Profit percent cannot be negative");
    }

    if let Some(price) = listing.base_price {
        if price <= 0.0 {
            anyhow::bail!("Base price must be positive");
        }
    }

    Ok(())
}
