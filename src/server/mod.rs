//! HTTP surface -- axum routes mapping requests onto the pipeline.

mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::pipeline::PipelineContext;

/// Upper bound for uploaded photos.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Build the application router.
pub fn router(ctx: Arc<PipelineContext>) -> Router {
    let static_dir = ServeDir::new(&ctx.settings().output_dir);
    routes::routes()
        .nest_service("/static", static_dir)
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, ctx: Arc<PipelineContext>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

async fn fallback() -> (axum::http::StatusCode, &'static str) {
    (axum::http::StatusCode::NOT_FOUND, "not found")
}
