use std::time::Duration;

use crate::error::{AppError, Result};

pub const API_URL: &str = "http://localhost:3000";
pub const WEBDRIVER_URL: &str = "http://localhost:4444";

/// Listing-creation pages live under this prefix; the assistant refuses other tabs.
pub const HOST_PAGE_PREFIX: &str = "https://auctions.yahoo.co.jp/";

pub const PRODUCTS_TABLE: &str = "products";
pub const STORAGE_BUCKET: &str = "product-images";

/// Upper bound on images per product, on the dashboard and in the fill pass.
pub const MAX_IMAGES_PER_PRODUCT: usize = 10;

/// Offset used for the auction closing time when the product does not carry one.
pub const DEFAULT_CLOSING_OFFSET_HOURS: i64 = 48;

/// Delay between re-injecting the page helper and resending the message.
/// Not a readiness handshake; raise it if the helper is slow to install.
pub const REINJECT_DELAY_MS: u64 = 150;

/// Pause after scrolling or committing a value so the host page scripts can react.
pub const SETTLE_DELAY_MS: u64 = 300;

/// Timeout for backend and image HTTP requests (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Request body limit for image uploads.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Which product store the dashboard talks to.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendConfig {
    /// Hosted PostgREST + object storage (Supabase-compatible).
    Rest {
        url: String,
        anon_key: String,
        bucket: String,
    },
    /// Local SQLite file; images kept in the same database.
    Sqlite { db_path: String },
    /// Process-local store, lost on restart.
    Memory,
    /// Nothing configured. Read endpoints answer 503.
    None,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    pub backend: BackendConfig,
    /// Base for image URLs served by the local backends (PUBLIC_BASE_URL).
    pub public_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?;

        let supabase_url = non_empty_var("SUPABASE_URL");
        let supabase_key = non_empty_var("SUPABASE_ANON_KEY");
        let bucket = non_empty_var("SUPABASE_BUCKET").unwrap_or_else(|| STORAGE_BUCKET.to_string());

        let backend = match non_empty_var("BACKEND").as_deref() {
            Some("rest") => match (supabase_url, supabase_key) {
                (Some(url), Some(anon_key)) => BackendConfig::Rest { url, anon_key, bucket },
                _ => {
                    return Err(AppError::Config(
                        "BACKEND=rest needs SUPABASE_URL and SUPABASE_ANON_KEY".to_string(),
                    ))
                }
            },
            Some("sqlite") => BackendConfig::Sqlite {
                db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "listings.db".to_string()),
            },
            Some("memory") => BackendConfig::Memory,
            Some("none") => BackendConfig::None,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "BACKEND must be one of rest, sqlite, memory, none (got {other})"
                )))
            }
            None => match (supabase_url, supabase_key) {
                (Some(url), Some(anon_key)) => BackendConfig::Rest { url, anon_key, bucket },
                _ => BackendConfig::None,
            },
        };

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port,
            backend,
            public_base_url: non_empty_var("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{api_port}"))
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Settings for the terminal assistant.
#[derive(Debug, Clone)]
pub struct AssistConfig {
    /// Dashboard base URL, no trailing slash (API_URL).
    pub api_url: String,
    pub webdriver_url: String,
    pub host_page_prefix: String,
    pub reinject_delay: Duration,
    pub settle_delay: Duration,
    /// When set, tracing output goes to this file (ASSIST_LOG_FILE).
    pub log_file: Option<String>,
}

impl AssistConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_url: std::env::var("API_URL")
                .unwrap_or_else(|_| API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            webdriver_url: std::env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| WEBDRIVER_URL.to_string()),
            host_page_prefix: std::env::var("HOST_PAGE_PREFIX")
                .unwrap_or_else(|_| HOST_PAGE_PREFIX.to_string()),
            reinject_delay: Duration::from_millis(millis_var("REINJECT_DELAY_MS", REINJECT_DELAY_MS)?),
            settle_delay: Duration::from_millis(millis_var("SETTLE_DELAY_MS", SETTLE_DELAY_MS)?),
            log_file: non_empty_var("ASSIST_LOG_FILE"),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn millis_var(key: &str, default: u64) -> Result<u64> {
    match non_empty_var(key) {
        Some(v) => v
            .parse::<u64>()
            .map_err(|_| AppError::Config(format!("{key} must be a number of milliseconds"))),
        None => Ok(default),
    }
}
