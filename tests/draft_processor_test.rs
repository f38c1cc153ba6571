//! Draft pipeline tests against mocked Ollama and Printify servers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{file_pool, write_image};
use printwatch::ai::OllamaClient;
use printwatch::config::{AiConfig, ListingSettings, SharedSettings, VariantSelection};
use printwatch::monitor::{FileSettler, ItemOutcome, ProcessingWorker, WorkQueue};
use printwatch::processor::DraftProcessor;
use printwatch_db::models::{ImageStatus, RunStatus};
use printwatch_db::queries::{images, runs};

const LLM_JSON: &str = r#"{"theme":"space","objects":["rocket","stars"],"style":"retro","mood":"bold","target_audience":"astronomy fans","title":"Retro Rocket Tee","bullets":["Soft cotton"],"description":"A rocket among the stars.","tags":["rocket","space"]}"#;

async fn mock_ollama() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": LLM_JSON })))
        .mount(&server)
        .await;
    server
}

async fn mock_printify(expected_price: u32) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/uploads/images.json"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "img-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/catalog/blueprints/6/print_providers/99/print_areas.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "print_areas": [{"placeholders": [{"position": "front"}]}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/shops/42/products.json"))
        .and(body_partial_json(json!({
            "title": "Retro Rocket Tee",
            "tags": ["rocket", "space"],
            "visible": false,
            "variants": [{"id": 17887, "price": expected_price, "is_enabled": true}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "prod-1"})))
        .expect(1)
        .mount(&server)
        .await;
    server
}

fn ready_settings() -> SharedSettings {
    Arc::new(RwLock::new(ListingSettings {
        printify_api_key: "secret".into(),
        printify_shop_id: "42".into(),
        blueprint_id: 6,
        print_provider_id: 99,
        base_price: Some(24.5),
        selected_variants: vec![VariantSelection {
            variant_id: 17887,
            enabled: true,
            price: 0,
        }],
        ..ListingSettings::default()
    }))
}

fn ollama_config(server: &MockServer) -> AiConfig {
    AiConfig {
        ollama_url: server.uri(),
        timeout_secs: 5,
        ..AiConfig::default()
    }
}

#[tokio::test]
async fn create_draft_runs_the_whole_pipeline() {
    let ollama = mock_ollama().await;
    let printify = mock_printify(2450).await;

    let drafts = DraftProcessor::new(
        OllamaClient::new(&ollama_config(&ollama)),
        ready_settings(),
        tokio::runtime::Handle::current(),
    )
    .with_printify_base_url(printify.uri());

    let dir = TempDir::new().unwrap();
    let image = write_image(dir.path(), "rocket.png", b"rocket artwork");

    let output = drafts.create_draft(&image).await.unwrap();
    assert_eq!(output.external_upload_id.as_deref(), Some("img-1"));
    assert_eq!(output.external_product_id.as_deref(), Some("prod-1"));

    let analysis: Value = serde_json::from_str(output.analysis_payload.as_deref().unwrap()).unwrap();
    assert_eq!(analysis["theme"], "space");
    let listing: Value = serde_json::from_str(output.listing_payload.as_deref().unwrap()).unwrap();
    assert_eq!(listing["bullets"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn unconfigured_settings_fail_before_any_request() {
    let ollama = MockServer::start().await;
    let drafts = DraftProcessor::new(
        OllamaClient::new(&ollama_config(&ollama)),
        Arc::new(RwLock::new(ListingSettings::default())),
        tokio::runtime::Handle::current(),
    );

    let dir = TempDir::new().unwrap();
    let image = write_image(dir.path(), "rocket.png", b"rocket artwork");

    let err = drafts.create_draft(&image).await.unwrap_err();
    assert_eq!(err.to_string(), "Printify API key and shop ID must be configured");
    assert!(ollama.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn catalog_variants_are_used_when_none_selected() {
    let ollama = mock_ollama().await;
    let printify = mock_printify(1950).await;
    Mock::given(method("GET"))
        .and(path("/catalog/blueprints/6/print_providers/99/variants.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "variants": [{"id": 17887, "cost": 1500}]
        })))
        .expect(1)
        .mount(&printify)
        .await;

    let settings = ready_settings();
    {
        let mut s = settings.write();
        s.selected_variants.clear();
        s.base_price = None;
    }
    let drafts = DraftProcessor::new(
        OllamaClient::new(&ollama_config(&ollama)),
        settings,
        tokio::runtime::Handle::current(),
    )
    .with_printify_base_url(printify.uri());

    let dir = TempDir::new().unwrap();
    let image = write_image(dir.path(), "rocket.png", b"rocket artwork");

    let output = drafts.create_draft(&image).await.unwrap();
    assert_eq!(output.external_product_id.as_deref(), Some("prod-1"));
}

/// The worker drives the draft processor from its own thread.
#[test]
fn worker_records_a_created_draft() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (ollama, printify) = runtime.block_on(async { (mock_ollama().await, mock_printify(2450).await) });

    let drafts = DraftProcessor::new(
        OllamaClient::new(&ollama_config(&ollama)),
        ready_settings(),
        runtime.handle().clone(),
    )
    .with_printify_base_url(printify.uri());

    let dir = TempDir::new().unwrap();
    let db = file_pool(dir.path());
    let worker = ProcessingWorker::new(
        db.clone(),
        WorkQueue::new(),
        Arc::new(drafts),
        FileSettler::new(Duration::from_millis(10), 3),
        Duration::from_millis(50),
        Arc::new(Mutex::new(None)),
    );

    let image = write_image(dir.path(), "rocket.png", b"rocket artwork");
    let outcome = worker.process_item(&image).unwrap();
    let ItemOutcome::Processed { run_id, success } = outcome.clone() else {
        panic!("expected a run, got {:?}", outcome);
    };
    assert!(success);

    let conn = db.get().unwrap();
    let run = runs::get_run(&conn, run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Done);
    assert_eq!(run.external_upload_id.as_deref(), Some("img-1"));
    assert_eq!(run.external_product_id.as_deref(), Some("prod-1"));

    let record = images::get_by_path(&conn, &image.to_string_lossy())
        .unwrap()
        .unwrap();
    assert_eq!(record.status, ImageStatus::Done);
    assert_eq!(record.message.as_deref(), Some("Draft product created: prod-1"));

    // Same content again is a duplicate, not a second product
    let copy = write_image(dir.path(), "rocket-copy.png", b"rocket artwork");
    assert!(matches!(
        worker.process_item(&copy).unwrap(),
        ItemOutcome::Duplicate { .. }
    ));
    assert_eq!(runs::count_runs(&conn).unwrap(), 1);
}

#[test]
fn worker_records_a_printify_failure() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (ollama, printify) = runtime.block_on(async {
        let printify = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/uploads/images.json"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&printify)
            .await;
        (mock_ollama().await, printify)
    });

    let drafts = DraftProcessor::new(
        OllamaClient::new(&ollama_config(&ollama)),
        ready_settings(),
        runtime.handle().clone(),
    )
    .with_printify_base_url(printify.uri());

    let dir = TempDir::new().unwrap();
    let db = file_pool(dir.path());
    let worker = ProcessingWorker::new(
        db.clone(),
        WorkQueue::new(),
        Arc::new(drafts),
        FileSettler::new(Duration::from_millis(10), 3),
        Duration::from_millis(50),
        Arc::new(Mutex::new(None)),
    );

    let image = write_image(dir.path(), "rocket.png", b"rocket artwork");
    let outcome = worker.process_item(&image).unwrap();
    assert!(matches!(outcome, ItemOutcome::Processed { success: false, .. }));

    let conn = db.get().unwrap();
    let record = images::get_by_path(&conn, &image.to_string_lossy())
        .unwrap()
        .unwrap();
    assert_eq!(record.status, ImageStatus::Error);
    assert_eq!(
        record.message.as_deref(),
        Some("Image upload failed: Printify API error 500: upstream down")
    );
}
