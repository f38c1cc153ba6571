//! The per-image processing step invoked by the monitor worker.
//!
//! [`Processor`] is the seam between the ingestion pipeline and the outside
//! world. The production implementation is [`DraftProcessor`], which analyses
//! the artwork, writes a listing and creates a hidden Printify draft.

use crate::ai::{Analysis, Listing, OllamaClient};
use crate::config::{ListingSettings, SharedSettings};
use crate::printify::{self, PrintifyClient};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tokio::runtime::Handle;

/// What a successful processing step produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessOutput {
    /// JSON-encoded analysis of the image.
    pub analysis_payload: Option<String>,
    /// JSON-encoded listing copy.
    pub listing_payload: Option<String>,
    pub external_upload_id: Option<String>,
    pub external_product_id: Option<String>,
}

/// Turns one image into an external artefact.
///
/// Called from the worker thread, one image at a time. Any error (or panic)
/// marks the image and its run as failed; the worker carries on.
pub trait Processor: Send + Sync {
    fn process(&self, path: &Path) -> Result<ProcessOutput>;
}

impl<F> Processor for F
where
    F: Fn(&Path) -> Result<ProcessOutput> + Send + Sync,
{
    fn process(&self, path: &Path) -> Result<ProcessOutput> {
        self(path)
    }
}

/// Production processor: analysis, listing, upload, draft product.
pub struct DraftProcessor {
    ai: OllamaClient,
    settings: SharedSettings,
    runtime: Handle,
    printify_base_url: Option<String>,
}

impl DraftProcessor {
    pub fn new(ai: OllamaClient, settings: SharedSettings, runtime: Handle) -> Self {
        Self {
            ai,
            settings,
            runtime,
            printify_base_url: None,
        }
    }

    /// Point the Printify client at a different API root.
    pub fn with_printify_base_url(mut self, url: impl Into<String>) -> Self {
        self.printify_base_url = Some(url.into());
        self
    }

    /// A Printify client using the credentials in `settings`.
    pub fn printify_client(&self, settings: &ListingSettings) -> PrintifyClient {
        let client = PrintifyClient::new(&settings.printify_api_key);
        match &self.printify_base_url {
            Some(url) => client.with_base_url(url),
            None => client,
        }
    }

    /// Run the full pipeline for one image.
    pub async fn create_draft(&self, path: &Path) -> Result<ProcessOutput> {
        let settings = self.settings.read().clone();
        check_ready(&settings)?;

        let analysis = self.ai.analyze_image(path).await;
        let listing = self.ai.generate_listing(&analysis).await;

        let draft = self
            .publish(path, &settings, &analysis, &listing)
            .await?;

        Ok(ProcessOutput {
            analysis_payload: Some(serde_json::to_string(&analysis)?),
            listing_payload: Some(serde_json::to_string(&listing)?),
            external_upload_id: Some(draft.upload_id),
            external_product_id: Some(draft.product_id),
        })
    }

    /// Upload the image and create a draft from an existing analysis and listing.
    pub async fn publish(
        &self,
        path: &Path,
        settings: &ListingSettings,
        analysis: &Analysis,
        listing: &Listing,
    ) -> Result<PublishedDraft> {
        check_ready(settings)?;
        let client = self.printify_client(settings);

        let upload = client
            .upload_image(path)
            .await
            .context("Image upload failed")?;

        let variants = printify::ensure_variant_selection(&client, settings)
            .await
            .context("Variant selection failed")?;

        let description = printify::draft_description(listing);
        let request = printify::DraftRequest {
            shop_id: &settings.printify_shop_id,
            blueprint_id: settings.blueprint_id,
            print_provider_id: settings.print_provider_id,
            title: &listing.title,
            description: &description,
            tags: &listing.tags,
            image_id: &upload.id,
            variants: &variants,
            selected_mockups: &settings.selected_mockups,
        };
        let product = client
            .create_draft_product(&request)
            .await
            .context("Draft product creation failed")?;

        tracing::debug!(
            "Draft {} created for theme {:?}",
            product.id,
            analysis.theme
        );

        Ok(PublishedDraft {
            upload_id: upload.id,
            product_id: product.id,
        })
    }

    pub fn ai(&self) -> &OllamaClient {
        &self.ai
    }
}

/// Printify identifiers of a created draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedDraft {
    pub upload_id: String,
    pub product_id: String,
}

impl Processor for DraftProcessor {
    fn process(&self, path: &Path) -> Result<ProcessOutput> {
        self.runtime.block_on(self.create_draft(path))
    }
}

/// Ensure the settings are complete enough to create a draft.
pub fn check_ready(settings: &ListingSettings) -> Result<()> {
    if settings.printify_api_key.is_empty() || settings.printify_shop_id.is_empty() {
        anyhow::bail!("Printify API key and shop ID must be configured");
    }
    if settings.blueprint_id == 0 || settings.print_provider_id == 0 {
        anyhow::bail!("Blueprint and print provider must be selected");
    }
    Ok(())
}
