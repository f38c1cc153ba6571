use super::{
    CatalogVariant, CreatedProduct, MockupCandidate, PrintArea, PrintifyError, UploadedImage,
};
use crate::config::VariantSelection;
use base64::Engine;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.printify.com/v1";

/// Uploads and catalog calls can be slow for large artwork
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

const USER_AGENT: &str = concat!("printwatch/", env!("CARGO_PKG_VERSION"));

/// Everything needed to create a hidden draft product
#[derive(Debug, Clone)]
pub struct DraftRequest<'a> {
    pub shop_id: &'a str,
    pub blueprint_id: u64,
    pub print_provider_id: u64,
    pub title: &'a str,
    pub description: &'a str,
    pub tags: &'a [String],
    pub image_id: &'a str,
    pub variants: &'a [VariantSelection],
    /// Print positions to place the image on; empty means every position
    pub selected_mockups: &'a [String],
}

#[derive(Deserialize)]
struct VariantsResponse {
    #[serde(default)]
    variants: Vec<CatalogVariant>,
}

#[derive(Deserialize)]
struct PrintAreasResponse {
    #[serde(default)]
    print_areas: Vec<PrintArea>,
}

/// Printify REST API client
#[derive(Clone)]
pub struct PrintifyClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PrintifyClient {
    pub fn new(api_key: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, PrintifyError> {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.as_u16() >= 400 {
            return Err(PrintifyError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        Ok(serde_json::from_str(text)?)
    }

    /// Upload an image file to the media library
    pub async fn upload_image(&self, path: &Path) -> Result<UploadedImage, PrintifyError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.png".to_string());

        let payload = json!({
            "file_name": file_name,
            "contents": base64::engine::general_purpose::STANDARD.encode(bytes),
        });

        let image: UploadedImage = self
            .request(Method::POST, "/uploads/images.json", Some(&payload))
            .await?;
        tracing::info!("Uploaded {} to Printify as {}", file_name, image.id);
        Ok(image)
    }

    pub async fn get_variants(
        &self,
        blueprint_id: u64,
        print_provider_id: u64,
    ) -> Result<Vec<CatalogVariant>, PrintifyError> {
        let path = format!(
            "/catalog/blueprints/{}/print_providers/{}/variants.json",
            blueprint_id, print_provider_id
        );
        let response: VariantsResponse = self.request(Method::GET, &path, None).await?;
        Ok(response.variants)
    }

    pub async fn get_print_areas(
        &self,
        blueprint_id: u64,
        print_provider_id: u64,
    ) -> Result<Vec<PrintArea>, PrintifyError> {
        let path = format!(
            "/catalog/blueprints/{}/print_providers/{}/print_areas.json",
            blueprint_id, print_provider_id
        );
        let response: PrintAreasResponse = self.request(Method::GET, &path, None).await?;
        Ok(response.print_areas)
    }

    /// Print positions offered for a blueprint, one entry per position
    pub async fn get_mockup_candidates(
        &self,
        blueprint_id: u64,
        print_provider_id: u64,
    ) -> Result<Vec<MockupCandidate>, PrintifyError> {
        let areas = self.get_print_areas(blueprint_id, print_provider_id).await?;

        let mut candidates: Vec<MockupCandidate> = Vec::new();
        for placeholder in areas.iter().flat_map(|a| &a.placeholders) {
            if !candidates.iter().any(|c| c.mockup_id == placeholder.position) {
                candidates.push(MockupCandidate::from_position(&placeholder.position));
            }
        }
        Ok(candidates)
    }

    /// Create a hidden draft product in a shop
    pub async fn create_draft_product(
        &self,
        draft: &DraftRequest<'_>,
    ) -> Result<CreatedProduct, PrintifyError> {
        let enabled: Vec<&VariantSelection> = draft.variants.iter().filter(|v| v.enabled).collect();
        if enabled.is_empty() {
            return Err(PrintifyError::NoVariants);
        }

        let image = json!({
            "id": draft.image_id,
            "x": 0.5,
            "y": 0.5,
            "scale": 1,
            "angle": 0,
        });

        let areas = self
            .get_print_areas(draft.blueprint_id, draft.print_provider_id)
            .await?;
        let mut placeholders: Vec<Value> = areas
            .iter()
            .flat_map(|a| &a.placeholders)
            .filter(|p| {
                draft.selected_mockups.is_empty() || draft.selected_mockups.contains(&p.position)
            })
            .map(|p| json!({ "position": p.position, "images": [image.clone()] }))
            .collect();
        if placeholders.is_empty() {
            placeholders.push(json!({ "position": "front", "images": [image] }));
        }

        let payload = json!({
            "title": draft.title,
            "description": draft.description,
            "blueprint_id": draft.blueprint_id,
            "print_provider_id": draft.print_provider_id,
            "tags": draft.tags,
            "variants": enabled
                .iter()
                .map(|v| json!({ "id": v.variant_id, "price": v.price, "is_enabled": true }))
                .collect::<Vec<_>>(),
            "print_areas": [{
                "variant_ids": enabled.iter().map(|v| v.variant_id).collect::<Vec<_>>(),
                "placeholders": placeholders,
            }],
            "visible": false,
        });

        let path = format!("/shops/{}/products.json", draft.shop_id);
        let product: CreatedProduct = self.request(Method::POST, &path, Some(&payload)).await?;
        tracing::info!("Created Printify draft product {}", product.id);
        Ok(product)
    }
}
