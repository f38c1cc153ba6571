//! Shared test harness for integration tests.
//!
//! [`MonitorFixture`] gives a temp directory, a file-backed database and a
//! watch folder for driving a [`MonitorController`] directly. [`TestHarness`]
//! builds a full [`AppContext`] and can serve it on a random port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tempfile::TempDir;

use printwatch::ai::OllamaClient;
use printwatch::config::{AiConfig, Config, ListingSettings};
use printwatch::monitor::{MonitorController, MonitorOptions};
use printwatch::processor::{DraftProcessor, ProcessOutput, Processor};
use printwatch::server::{create_router, AppContext};
use printwatch_db::pool::{init_pool, DbPool};

/// Worker timing short enough for tests.
pub fn fast_options() -> MonitorOptions {
    MonitorOptions {
        poll_interval: Duration::from_millis(50),
        settle_delay: Duration::from_millis(20),
        settle_max_attempts: 5,
        stop_timeout: Duration::from_secs(2),
    }
}

/// A database file inside `dir`.
///
/// Tests that run a live worker use a file database; shared-cache memory
/// databases report `SQLITE_LOCKED` under concurrent writers.
pub fn file_pool(dir: &Path) -> DbPool {
    let path = dir.join("printwatch.db");
    init_pool(&path.to_string_lossy()).expect("failed to create database")
}

pub fn write_image(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("failed to write image");
    path
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    cond()
}

/// A processor that succeeds and remembers the file names it saw.
pub fn recording_processor() -> (Arc<dyn Processor>, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let processor: Arc<dyn Processor> = Arc::new(move |path: &Path| -> anyhow::Result<ProcessOutput> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        log.lock().push(name.clone());
        Ok(ProcessOutput {
            analysis_payload: Some(r#"{"theme":"test"}"#.into()),
            listing_payload: Some(r#"{"title":"Test Shirt"}"#.into()),
            external_upload_id: Some(format!("upload-{name}")),
            external_product_id: Some(format!("product-{name}")),
        })
    });
    (processor, seen)
}

pub struct MonitorFixture {
    pub dir: TempDir,
    pub db: DbPool,
    pub watch_dir: PathBuf,
}

impl MonitorFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let db = file_pool(dir.path());
        let watch_dir = dir.path().join("inbox");
        std::fs::create_dir_all(&watch_dir).expect("failed to create watch dir");
        // Events report canonical paths
        let watch_dir = watch_dir.canonicalize().expect("failed to canonicalize");
        Self { dir, db, watch_dir }
    }

    pub fn controller(&self, processor: Arc<dyn Processor>) -> MonitorController {
        MonitorController::new(self.db.clone(), processor, fast_options())
    }

    /// Files outside the watch folder, for manual queueing.
    pub fn outside_dir(&self) -> PathBuf {
        let outside = self.dir.path().join("outside");
        std::fs::create_dir_all(&outside).expect("failed to create dir");
        outside
    }
}

/// Test harness wrapping a fully-constructed [`AppContext`].
pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub dir: TempDir,
    pub watch_dir: PathBuf,
    pub config_path: PathBuf,
    pub seen: Arc<Mutex<Vec<String>>>,
}

impl TestHarness {
    /// Create a harness whose AI calls go to `ollama_url` and Printify calls
    /// to `printify_url`. Must be called inside a tokio runtime.
    pub fn with_endpoints(ollama_url: &str, printify_url: Option<&str>) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let db = file_pool(dir.path());
        let watch_dir = dir.path().join("inbox");
        let config_path = dir.path().join("printwatch.toml");

        let config = Config {
            ai: AiConfig {
                ollama_url: ollama_url.to_string(),
                timeout_secs: 5,
                ..AiConfig::default()
            },
            ..Config::default()
        };

        let settings = Arc::new(RwLock::new(ListingSettings::default()));
        let mut drafts = DraftProcessor::new(
            OllamaClient::new(&config.ai),
            Arc::clone(&settings),
            tokio::runtime::Handle::current(),
        );
        if let Some(url) = printify_url {
            drafts = drafts.with_printify_base_url(url);
        }

        let (processor, seen) = recording_processor();
        let monitor = Arc::new(MonitorController::new(db.clone(), processor, fast_options()));

        let ctx = AppContext {
            config: Arc::new(config),
            config_path: Some(config_path.clone()),
            settings,
            db_pool: db.clone(),
            monitor,
            drafts: Arc::new(drafts),
        };

        Self {
            ctx,
            db,
            dir,
            watch_dir,
            config_path,
            seen,
        }
    }

    /// Nothing listens on port 9; AI calls fail fast and fall back.
    pub fn new() -> Self {
        Self::with_endpoints("http://127.0.0.1:9", None)
    }

    /// Serve the API on a random port.
    pub async fn serve(self) -> (Self, SocketAddr) {
        let app = create_router(self.ctx.clone(), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }

    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }

    /// Configure Printify credentials and a product on the shared settings.
    pub fn configure_printify(&self) {
        let mut settings = self.ctx.settings.write();
        settings.printify_api_key = "secret".into();
        settings.printify_shop_id = "42".into();
        settings.blueprint_id = 6;
        settings.print_provider_id = 99;
    }
}
