use crate::ai::{Analysis, Listing};
use crate::config::{self, persist, ListingSettings};
use crate::monitor::MonitorError;
use crate::processor::check_ready;
use crate::server::AppContext;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use printwatch_db::models::{LogLevel, ProcessingLog, ProcessingRun, RunStatus};
use printwatch_db::pool::get_conn;
use printwatch_db::queries::{logs, runs};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

const RECENT_RUNS: i64 = 100;
const RECENT_LOGS: i64 = 200;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

pub fn api_routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/settings", get(get_settings).post(save_settings))
        .route("/settings/reset", post(reset_settings))
        .route("/monitor/start", post(start_monitor))
        .route("/monitor/stop", post(stop_monitor))
        .route("/monitor/status", get(monitor_status))
        .route("/queue", post(queue_image))
        .route("/analyze", post(analyze_image))
        .route("/draft", post(create_draft))
        .route("/printify/variants", get(printify_variants))
        .route("/printify/mockups", get(printify_mockups))
        .route("/runs", get(list_runs))
        .route("/logs", get(list_logs))
        .route("/dashboard", get(dashboard))
}

async fn health() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": "printwatch",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// settings
// ---------------------------------------------------------------------------

async fn get_settings(State(ctx): State<AppContext>) -> Json<ListingSettings> {
    Json(ctx.settings.read().clone())
}

fn store_settings(ctx: &AppContext, settings: ListingSettings) -> Result<(), (StatusCode, String)> {
    if let Some(ref path) = ctx.config_path {
        persist::update_listing(path, &settings).map_err(|e| {
            tracing::error!("Failed to persist listing settings: {:#}", e);
            internal_error(format!("{:#}", e))
        })?;
    }
    *ctx.settings.write() = settings;
    Ok(())
}

async fn save_settings(
    State(ctx): State<AppContext>,
    Json(settings): Json<ListingSettings>,
) -> ApiResult<Value> {
    config::validate_listing(&settings).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    store_settings(&ctx, settings)?;
    Ok(Json(json!({ "ok": true })))
}

async fn reset_settings(State(ctx): State<AppContext>) -> ApiResult<Value> {
    store_settings(&ctx, ListingSettings::default())?;
    Ok(Json(json!({ "ok": true })))
}

// ---------------------------------------------------------------------------
// monitor
// ---------------------------------------------------------------------------

async fn start_monitor(State(ctx): State<AppContext>) -> ApiResult<Value> {
    let folder = ctx.settings.read().watch_folder.clone();
    if folder.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "watch_folder is required".to_string()));
    }

    let monitor = ctx.monitor.clone();
    tokio::task::spawn_blocking(move || monitor.start(Path::new(&folder)))
        .await
        .map_err(internal_error)?
        .map_err(|e| match e {
            MonitorError::Folder { .. } | MonitorError::Watch(_) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            other => internal_error(other),
        })?;

    Ok(Json(json!({ "ok": true })))
}

async fn stop_monitor(State(ctx): State<AppContext>) -> ApiResult<Value> {
    let monitor = ctx.monitor.clone();
    tokio::task::spawn_blocking(move || monitor.stop())
        .await
        .map_err(internal_error)?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub monitoring: bool,
    pub watch_folder: String,
    pub queue_size: usize,
    pub current_file: Option<String>,
}

async fn monitor_status(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    let status = ctx.monitor.status();
    let watch_folder = status
        .watch_folder
        .unwrap_or_else(|| ctx.settings.read().watch_folder.clone());

    Json(StatusResponse {
        monitoring: status.running,
        watch_folder,
        queue_size: status.queue_size,
        current_file: status.current_file,
    })
}

#[derive(Deserialize)]
struct ImageRequest {
    image_path: PathBuf,
}

async fn queue_image(
    State(ctx): State<AppContext>,
    Json(req): Json<ImageRequest>,
) -> ApiResult<Value> {
    if !ctx.monitor.enqueue_path(&req.image_path) {
        return Err((
            StatusCode::BAD_REQUEST,
            "Invalid image path or unsupported extension".to_string(),
        ));
    }
    Ok(Json(json!({
        "ok": true,
        "queued_path": req.image_path.display().to_string(),
    })))
}

// ---------------------------------------------------------------------------
// manual analysis and drafts
// ---------------------------------------------------------------------------

fn require_file(path: &Path) -> Result<(), (StatusCode, String)> {
    if path.is_file() {
        Ok(())
    } else {
        Err((StatusCode::NOT_FOUND, "Image path not found".to_string()))
    }
}

async fn analyze_image(
    State(ctx): State<AppContext>,
    Json(req): Json<ImageRequest>,
) -> ApiResult<Value> {
    require_file(&req.image_path)?;

    let analysis = ctx.drafts.ai().analyze_image(&req.image_path).await;
    let listing = ctx.drafts.ai().generate_listing(&analysis).await;

    Ok(Json(json!({ "analysis": analysis, "listing": listing })))
}

#[derive(Deserialize)]
struct DraftBody {
    image_path: PathBuf,
    #[serde(default)]
    analysis: Option<Analysis>,
    #[serde(default)]
    listing: Option<Listing>,
}

async fn create_draft(
    State(ctx): State<AppContext>,
    Json(req): Json<DraftBody>,
) -> ApiResult<Value> {
    let settings = ctx.settings.read().clone();
    check_ready(&settings).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    require_file(&req.image_path)?;

    let ai = ctx.drafts.ai();
    let analysis = match req.analysis {
        Some(a) => a,
        None => ai.analyze_image(&req.image_path).await,
    };
    let listing = match req.listing {
        Some(l) => l,
        None => ai.generate_listing(&analysis).await,
    };

    let draft = ctx
        .drafts
        .publish(&req.image_path, &settings, &analysis, &listing)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("{:#}", e)))?;

    Ok(Json(json!({
        "ok": true,
        "upload_id": draft.upload_id,
        "product_id": draft.product_id,
    })))
}

// ---------------------------------------------------------------------------
// printify catalog
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CatalogQuery {
    blueprint_id: u64,
    print_provider_id: u64,
}

fn catalog_client(ctx: &AppContext) -> Result<crate::printify::PrintifyClient, (StatusCode, String)> {
    let settings = ctx.settings.read().clone();
    if settings.printify_api_key.is_empty() || settings.printify_shop_id.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Printify API key and shop ID are required".to_string(),
        ));
    }
    Ok(ctx.drafts.printify_client(&settings))
}

async fn printify_variants(
    State(ctx): State<AppContext>,
    Query(q): Query<CatalogQuery>,
) -> ApiResult<Value> {
    let client = catalog_client(&ctx)?;
    let variants = client
        .get_variants(q.blueprint_id, q.print_provider_id)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(Json(json!({ "variants": variants })))
}

async fn printify_mockups(
    State(ctx): State<AppContext>,
    Query(q): Query<CatalogQuery>,
) -> ApiResult<Value> {
    let client = catalog_client(&ctx)?;
    let mockups = client
        .get_mockup_candidates(q.blueprint_id, q.print_provider_id)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(Json(json!({ "mockups": mockups })))
}

// ---------------------------------------------------------------------------
// history
// ---------------------------------------------------------------------------

/// A run with its JSON payloads decoded.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunView {
    pub id: String,
    pub image_path: String,
    pub content_hash: String,
    pub status: RunStatus,
    pub success: bool,
    pub upload_id: Option<String>,
    pub product_id: Option<String>,
    pub analysis: Option<Value>,
    pub listing: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ProcessingRun> for RunView {
    fn from(run: ProcessingRun) -> Self {
        let decode = |payload: Option<String>| {
            payload.and_then(|s| serde_json::from_str::<Value>(&s).ok())
        };
        Self {
            id: run.id.to_string(),
            image_path: run.image_path,
            content_hash: run.content_hash,
            status: run.status,
            success: run.success,
            upload_id: run.external_upload_id,
            product_id: run.external_product_id,
            analysis: decode(run.analysis_payload),
            listing: decode(run.listing_payload),
            error_message: run.error_message,
            created_at: run.created_at,
        }
    }
}

async fn list_runs(State(ctx): State<AppContext>) -> ApiResult<Vec<RunView>> {
    let conn = get_conn(&ctx.db_pool).map_err(internal_error)?;
    let recent = runs::list_recent_runs(&conn, RECENT_RUNS).map_err(internal_error)?;
    Ok(Json(recent.into_iter().map(RunView::from).collect()))
}

async fn list_logs(State(ctx): State<AppContext>) -> ApiResult<Vec<ProcessingLog>> {
    let conn = get_conn(&ctx.db_pool).map_err(internal_error)?;
    let recent = logs::list_recent_logs(&conn, RECENT_LOGS).map_err(internal_error)?;
    Ok(Json(recent))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_products: i64,
    pub draft_products: i64,
    pub total_logs: i64,
    pub error_logs: i64,
}

async fn dashboard(State(ctx): State<AppContext>) -> ApiResult<DashboardStats> {
    let conn = get_conn(&ctx.db_pool).map_err(internal_error)?;
    Ok(Json(DashboardStats {
        total_products: runs::count_runs(&conn).map_err(internal_error)?,
        draft_products: runs::count_successful_runs(&conn).map_err(internal_error)?,
        total_logs: logs::count_logs(&conn).map_err(internal_error)?,
        error_logs: logs::count_by_level(&conn, LogLevel::Error).map_err(internal_error)?,
    }))
}
