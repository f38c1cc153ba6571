//! Configuration persistence using toml_edit to preserve formatting and comments.

use super::ListingSettings;
use anyhow::{Context, Result};
use std::path::Path;
use toml_edit::DocumentMut;

/// Update just the listing section of the config file.
///
/// The file is created if it does not exist yet; every other table is kept
/// as written.
pub fn update_listing(path: &Path, listing: &ListingSettings) -> Result<()> {
    let content = if path.exists() {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?
    } else {
        String::new()
    };

    let mut doc: DocumentMut = content
        .parse()
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    let listing_toml = toml::to_string(&ListingWrapper {
        listing: listing.clone(),
    })
    .with_context(|| "Failed to serialize listing settings")?;
    let listing_doc: DocumentMut = listing_toml
        .parse()
        .with_context(|| "Failed to parse serialized listing settings")?;

    match listing_doc.get("listing") {
        Some(item) => doc["listing"] = item.clone(),
        None => {
            doc.remove("listing");
        }
    }

    std::fs::write(path, doc.to_string())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}

#[derive(serde::Serialize)]
struct ListingWrapper {
    listing: ListingSettings,
}
