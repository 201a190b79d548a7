//! HTTP server implementation

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers::AppState;
use crate::api::routes;
use crate::Result;

/// Access log middleware to log all HTTP requests
async fn access_log_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    tracing::info!("→ {} {}", method, uri);

    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!("← {} {}ms", response.status(), duration.as_millis());

    response
}

/// Router with logging, tracing and optional CORS layers applied
pub fn build_app(state: AppState, enable_cors: bool) -> Router {
    let mut app = routes::api_routes(state)
        .layer(axum::middleware::from_fn(access_log_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::debug_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        );

    if enable_cors {
        info!("CORS enabled");
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }
    app
}

/// Serve the API until `shutdown` is cancelled
pub async fn serve_api(
    state: AppState,
    host: &str,
    port: u16,
    enable_cors: bool,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = build_app(state, enable_cors);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("API server listening on http://{}", addr);
    info!("Available endpoints:");
    info!("  GET  /health          - Health check");
    info!("  GET  /stats           - Sync statistics");
    info!("  GET  /metrics         - Prometheus metrics");
    info!("  GET  /resolve/:did    - Resolve DID to agent key");
    info!("  POST /register        - Register DID mapping");
    info!("  PUT  /update/:did     - Rotate agent key");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("API server stopped");
    Ok(())
}
