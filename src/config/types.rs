use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub listing: ListingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory with the dashboard frontend, served at `/`
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/printwatch.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Timing of the ingestion worker
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// How long the worker waits on an empty queue before re-checking its stop flag
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Delay between file size checks before hashing
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_settle_attempts")]
    pub settle_max_attempts: u32,

    /// Bounded wait for the platform watcher to shut down
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    1000
}
fn default_settle_delay() -> u64 {
    500
}
fn default_settle_attempts() -> u32 {
    10
}
fn default_stop_timeout() -> u64 {
    5
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            settle_delay_ms: default_settle_delay(),
            settle_max_attempts: default_settle_attempts(),
            stop_timeout_secs: default_stop_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiConfig {
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Text model used for analysis and listing copy
    #[serde(default = "default_model")]
    pub model: String,

    /// Vision model used to caption images (e.g. "llava"). Captions fall back
    /// to the file name when unset.
    #[serde(default)]
    pub caption_model: Option<String>,

    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3.1:8b".to_string()
}
fn default_ai_timeout() -> u64 {
    120
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            model: default_model(),
            caption_model: None,
            timeout_secs: default_ai_timeout(),
        }
    }
}

/// Runtime-editable listing settings, exposed through `/api/settings`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ListingSettings {
    #[serde(default)]
    pub watch_folder: String,

    #[serde(default)]
    pub printify_api_key: String,

    #[serde(default)]
    pub printify_shop_id: String,

    #[serde(default)]
    pub blueprint_id: u64,

    #[serde(default)]
    pub print_provider_id: u64,

    /// Fixed retail price in currency units; overrides the profit margin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_price: Option<f64>,

    #[serde(default = "default_profit_percent")]
    pub profit_percent: f64,

    #[serde(default)]
    pub selected_variants: Vec<VariantSelection>,

    /// Print-area positions to place the artwork on; empty means all
    #[serde(default)]
    pub selected_mockups: Vec<String>,

    #[serde(default = "default_true")]
    pub copy_previous: bool,
}

fn default_profit_percent() -> f64 {
    30.0
}
fn default_true() -> bool {
    true
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            watch_folder: String::new(),
            printify_api_key: String::new(),
            printify_shop_id: String::new(),
            blueprint_id: 0,
            print_provider_id: 0,
            base_price: None,
            profit_percent: default_profit_percent(),
            selected_variants: Vec::new(),
            selected_mockups: Vec::new(),
            copy_previous: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct VariantSelection {
    pub variant_id: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Retail price in cents; 0 means derive it from the pricing settings
    #[serde(default = "default_variant_price")]
    pub price: u32,
}

fn default_variant_price() -> u32 {
    1999
}

/// Listing settings shared between the HTTP API and the processor.
pub type SharedSettings = Arc<RwLock<ListingSettings>>;
