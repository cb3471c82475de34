//! HTTP API gateway for Outreach.
//!
//! Exposes the schema, ingestion and context contracts as JSON under `/v1`,
//! plus a health check.
//!
//! Built on Axum for high performance async HTTP.

pub mod api_v1;
pub mod error;

use axum::extract::DefaultBodyLimit;
use axum::{Router, http::HeaderValue, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use outreach_config::AppConfig;
use outreach_service::OutreachService;

pub use error::{ApiError, ErrorBody};

/// How often expired hand-offs are swept.
const HANDOFF_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Build the full router: `/health` plus the v1 API.
///
/// Layers applied:
/// - Request body size limit (`gateway.max_body_bytes`)
/// - CORS restricted to the gateway's own origin
/// - HTTP trace logging
pub fn build_router(config: &AppConfig, api_state: api_v1::SharedApiState) -> Router {
    let origin = format!("http://{}:{}", config.gateway.host, config.gateway.port);
    let allow_origin = match HeaderValue::from_str(&origin) {
        Ok(value) => AllowOrigin::exact(value),
        Err(_) => {
            warn!(origin = %origin, "Gateway origin is not a valid header value; CORS disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(api_state))
        .layer(DefaultBodyLimit::max(config.gateway.max_body_bytes))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server over `service`.
///
/// Also runs a background sweep that drops expired hand-offs.
pub async fn start(config: AppConfig, service: Arc<OutreachService>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let sweeper = Arc::clone(&service);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HANDOFF_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sweeper.cleanup_expired_handoffs().await;
            if removed > 0 {
                info!(removed, "Expired hand-offs removed");
            }
        }
    });

    let api_state = Arc::new(api_v1::ApiV1State::new(service));
    let app = build_router(&config, api_state);

    info!(addr = %addr, "Gateway starting with v1 API");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app(config: &AppConfig) -> Router {
        let service = Arc::new(OutreachService::new(config.clone()));
        build_router(config, Arc::new(api_v1::ApiV1State::new(service)))
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = app(&AppConfig::default());

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn v1_is_nested() {
        let app = app(&AppConfig::default());
        let req = Request::builder()
            .uri("/v1/fields/types")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_body_rejected() {
        let mut config = AppConfig::default();
        config.gateway.max_body_bytes = 64;
        let app = app(&config);

        let csv = format!("Phone,Name\n{}", "1,a\n".repeat(100));
        let body = serde_json::json!({ "csv": csv }).to_string();
        let req = Request::builder()
            .method("POST")
            .uri("/v1/ingest/propose")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
