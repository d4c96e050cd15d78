pub mod config;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod handlers;
pub mod maintenance;
pub mod platform;
pub mod registry;
pub mod sanitize;
pub mod shortcode;
pub mod state;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header::CONTENT_DISPOSITION},
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::{CollisionPolicy, Config};
pub use extractor::{MediaExtractor, MediaInfo, YtDlp};
pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.allowed_origins);

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/download", get(handlers::download))
        .route("/d/{code}", get(handlers::serve_short_link));

    if state.config.serve_by_filename {
        router = router.route(
            "/downloaded/{filename}",
            get(handlers::serve_downloaded_file),
        );
    }

    router
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Allows any origin when `allowed_origins` is empty, otherwise exactly the
/// listed (already normalized) origins.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET])
        .allow_headers(Any)
        .expose_headers([
            CONTENT_DISPOSITION,
            HeaderName::from_static("x-download-filename"),
        ])
}
