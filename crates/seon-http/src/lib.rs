//! Seon HTTP: REST transport adapter for Seon Server.
//!
//! Provides:
//! - the AI search endpoint (`POST /api/ai-search`)
//! - health, Prometheus metrics and OpenAPI endpoints
//! - request-ID, tracing, compression, panic and CORS layers

pub mod error;
pub mod identity;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

use axum::Router;
use axum::http::Method;
use axum::http::header::{CONTENT_TYPE, RETRY_AFTER};
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use error::ErrorBody;
use middleware::request_id::X_REQUEST_ID;
use state::CorsOrigins;

pub use state::AppState;

// ---------------------------------------------------------------------------
// OpenAPI
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Seon Server API",
        description = "AI-assisted search over the documentation site's Markdown files.\n\nQueries are validated, rate limited per client, screened for near-duplicates and cached before the AI service is consulted.",
        license(name = "Apache-2.0"),
    ),
    paths(
        routes::search::ai_search,
        routes::system::health,
    ),
    components(
        schemas(
            seon_service::types::SearchRequest,
            seon_service::types::SearchOutcome,
            ErrorBody,
            types::HealthResponse,
        )
    ),
    tags(
        (name = "Search", description = "AI file selection"),
        (name = "System", description = "System and health endpoints"),
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Builds the HTTP API router.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(state.cors());

    Router::new()
        .route("/api/ai-search", post(routes::search::ai_search))
        .route("/api/openapi.json", get(routes::system::openapi_json))
        .route("/health", get(routes::system::health))
        .route("/metrics", get(routes::system::metrics_endpoint))
        .layer(CompressionLayer::new())
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            middleware::request_id::request_id_middleware,
        ))
        .layer(cors)
        .with_state(state)
}

/// Serve the HTTP router on the given listener with graceful shutdown.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, X_REQUEST_ID.clone()])
        .expose_headers([
            X_REQUEST_ID.clone(),
            RETRY_AFTER,
            axum::http::HeaderName::from_static("x-ratelimit-remaining"),
            axum::http::HeaderName::from_static("x-ratelimit-reset"),
        ]);

    match origins {
        // no origins configured: no CORS headers
        CorsOrigins::Disabled => CorsLayer::new(),
        CorsOrigins::Any => {
            tracing::warn!("CORS configured with wildcard origin, all cross-origin requests allowed");
            base.allow_origin(tower_http::cors::Any)
        }
        CorsOrigins::List(list) => base.allow_origin(list.clone()),
    }
}
