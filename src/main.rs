use std::sync::Arc;

use reelfetch::{
    AppState, Config, YtDlp, error::ApiError, maintenance::spawn_maintenance,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "reelfetch=info,tower_http=info".to_string()),
        )
        .init();

    if let Err(error) = run().await {
        eprintln!("Server error: {}", error.message);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ApiError> {
    let config = Config::from_env().map_err(ApiError::internal)?;

    tokio::fs::create_dir_all(&config.download_dir)
        .await
        .map_err(|error| {
            ApiError::internal(format!(
                "Could not create downloads directory {:?}: {error}",
                config.download_dir
            ))
        })?;

    if config.allowed_origins.is_empty() {
        warn!("ALLOWED_ORIGINS is not set; CORS allows any origin.");
    }
    if config.serve_by_filename {
        info!("Serving stored files by name under /downloaded/{{filename}}.");
    }
    info!(
        "Storing downloads in {:?} with {:?} naming, at most {} at a time.",
        config.download_dir, config.collision_policy, config.max_concurrent_downloads
    );

    let extractor = Arc::new(YtDlp::new(
        config.ytdlp_bin.clone(),
        config.ytdlp_format.clone(),
    ));
    let addr = config.bind_addr.clone();
    let state = AppState::new(config, extractor);

    let _maintenance = spawn_maintenance(state.clone());
    let app = reelfetch::app(state);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|error| ApiError::internal(format!("Could not bind {addr}: {error}")))?;

    info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .map_err(|error| ApiError::internal(format!("HTTP server error: {error}")))
}
