//! Printify marketplace integration.
//!
//! [`PrintifyClient`] wraps the REST API; [`pricing`] turns listing settings
//! into the per-variant prices sent with a draft product.

mod client;
pub mod pricing;

pub use client::{DraftRequest, PrintifyClient, DEFAULT_BASE_URL};
pub use pricing::{calculate_price, ensure_variant_selection};

use crate::ai::Listing;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrintifyError {
    #[error("Printify request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Printify API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected Printify response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("No variants selected.")]
    NoVariants,

    #[error("Variant selection exceeds Printify limit of {0}")]
    TooManyVariants(usize),
}

/// An image stored in the Printify media library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A variant of a blueprint offered by a print provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogVariant {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<u32>,
    /// Provider cost in cents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintArea {
    #[serde(default)]
    pub placeholders: Vec<Placeholder>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placeholder {
    #[serde(default = "default_position")]
    pub position: String,
}

fn default_position() -> String {
    "front".to_string()
}

/// A print position the artwork can be placed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockupCandidate {
    pub mockup_id: String,
    pub display_name: String,
    pub image_url: Option<String>,
}

impl MockupCandidate {
    fn from_position(position: &str) -> Self {
        let display_name = position
            .split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ");

        Self {
            mockup_id: position.to_string(),
            display_name,
            image_url: None,
        }
    }
}

/// A product created in a Printify shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedProduct {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Product description: the bullets as one paragraph, then the description.
pub fn draft_description(listing: &Listing) -> String {
    format!("{}\n\n{}", listing.bullets.join(" "), listing.description)
}
