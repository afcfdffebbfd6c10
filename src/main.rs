use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use listing_assist::api::{router, ApiState};
use listing_assist::backend::Backend;
use listing_assist::config::{BackendConfig, Config};
use listing_assist::error::Result;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let backend = Backend::from_config(&cfg.backend, &cfg.public_base_url).await?;
    match &cfg.backend {
        BackendConfig::Rest { url, bucket, .. } => info!("Backend: hosted REST at {url} (bucket {bucket})"),
        BackendConfig::Sqlite { db_path } => info!("Backend: SQLite at {db_path}"),
        BackendConfig::Memory => info!("Backend: in-memory (data is lost on restart)"),
        BackendConfig::None => {
            warn!("No backend configured; product endpoints will answer 503")
        }
    }

    let state = ApiState { backend: backend.map(Arc::new) };
    let addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Dashboard API listening on http://{addr}");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
