mod cli;

use printwatch::{
    ai::OllamaClient,
    config::{self, Config},
    monitor::{FileSettler, ItemOutcome, MonitorController, MonitorOptions, ProcessingWorker, WorkQueue},
    processor::DraftProcessor,
    server::{self, AppContext},
};
use printwatch_db::pool::{init_pool, DbPool};
use printwatch_db::queries::recovery;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Open the database and fail work interrupted by a previous crash.
fn open_database(config: &Config) -> Result<DbPool> {
    let db_path = config.database.path.to_string_lossy();
    tracing::info!("Initializing database at {}", db_path);
    let db_pool = init_pool(&db_path)?;

    let conn = db_pool.get().context("Failed to get database connection")?;
    match recovery::fail_orphaned(&conn) {
        Ok(count) if count > 0 => {
            tracing::info!("Marked {} interrupted records from previous session as failed", count);
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!("Failed to recover interrupted records: {}", e);
        }
    }

    Ok(db_pool)
}

fn start_server(host: String, port: u16, watch: bool, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting Printwatch server");

    let db_pool = open_database(&config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let settings = Arc::new(RwLock::new(config.listing.clone()));
    let drafts = Arc::new(DraftProcessor::new(
        OllamaClient::new(&config.ai),
        Arc::clone(&settings),
        runtime.handle().clone(),
    ));

    let monitor = Arc::new(MonitorController::new(
        db_pool.clone(),
        drafts.clone(),
        MonitorOptions::from(&config.monitor),
    ));

    if watch {
        let folder = settings.read().watch_folder.clone();
        if folder.is_empty() {
            tracing::warn!("--watch given but no watch_folder is configured");
        } else {
            monitor.start(Path::new(&folder))?;
        }
    }

    let shutdown_timeout = Duration::from_secs(config.monitor.stop_timeout_secs);
    let ctx = AppContext {
        config: Arc::new(config),
        config_path: config::resolve_config_path(config_path),
        settings,
        db_pool,
        monitor: Arc::clone(&monitor),
        drafts,
    };

    let result = runtime.block_on(server::start_server(ctx));

    // Let an in-flight draft finish before the runtime goes away
    if !monitor.wait_idle(shutdown_timeout) {
        tracing::warn!("Worker still busy after {:?}; exiting anyway", shutdown_timeout);
    }

    result
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "printwatch=trace,printwatch_db=debug,printwatch_common=debug,tower_http=debug".to_string()
        } else {
            "printwatch=debug,printwatch_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port, watch } => {
            start_server(host, port, watch, cli.config.as_deref())
        }
        Commands::Run { image, dry_run } => run_file(&image, cli.config.as_deref(), dry_run),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("printwatch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_file(image: &Path, config_path: Option<&Path>, dry_run: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !image.is_file() {
        anyhow::bail!("Image does not exist: {:?}", image);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let ai = OllamaClient::new(&config.ai);

    if dry_run {
        let (analysis, listing) = runtime.block_on(async {
            let analysis = ai.analyze_image(image).await;
            let listing = ai.generate_listing(&analysis).await;
            (analysis, listing)
        });
        let output = serde_json::json!({ "analysis": analysis, "listing": listing });
        println!("{}", serde_json::to_string_pretty(&output)?);
        println!("\n[DRY RUN] No draft was created");
        return Ok(());
    }

    let db_pool = open_database(&config)?;
    let settings = Arc::new(RwLock::new(config.listing.clone()));
    let drafts = DraftProcessor::new(ai, settings, runtime.handle().clone());
    let options = MonitorOptions::from(&config.monitor);

    // Same dedup and bookkeeping as the monitor, without a queue consumer
    let worker = ProcessingWorker::new(
        db_pool,
        WorkQueue::new(),
        Arc::new(drafts),
        FileSettler::new(options.settle_delay, options.settle_max_attempts),
        options.poll_interval,
        Arc::new(Mutex::new(None)),
    );

    let image = image.canonicalize()?;
    match worker.process_item(&image)? {
        ItemOutcome::Processed { run_id, success: true } => {
            println!("Draft created (run {})", run_id);
        }
        ItemOutcome::Processed { run_id, success: false } => {
            anyhow::bail!("Processing failed (run {})", run_id);
        }
        ItemOutcome::Duplicate { existing_path } => {
            println!("Already processed as {}", existing_path);
        }
        ItemOutcome::PathConflict { .. } => {
            println!("{} is already recorded with different content; skipped", image.display());
        }
        ItemOutcome::Vanished => {
            anyhow::bail!("Image disappeared before it could be read: {:?}", image);
        }
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Database: {}", config.database.path.display());
            println!("  Ollama: {} ({})", config.ai.ollama_url, config.ai.model);
            let watch = if config.listing.watch_folder.is_empty() {
                "(not set)"
            } else {
                config.listing.watch_folder.as_str()
            };
            println!("  Watch folder: {}", watch);
            println!(
                "  Printify configured: {}",
                printwatch::processor::check_ready(&config.listing).is_ok()
            );
            println!("  Selected variants: {}", config.listing.selected_variants.len());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
