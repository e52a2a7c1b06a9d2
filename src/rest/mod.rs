// rest/mod.rs — the HTTP surface of the task host.
//
// One axum server carries both the document-store API the clients use and
// the function endpoints.
//
// Endpoints:
//   GET    /api/v1/health
//   GET    /api/v1/tasks
//   POST   /api/v1/tasks
//   PATCH  /api/v1/tasks/{id}
//   DELETE /api/v1/tasks/{id}
//   GET    /api/v1/tasks/events   (SSE)
//   POST   /functions/helloWorld
//   GET    /functions/getAllTasks

pub mod routes;
pub mod sse;

use anyhow::Result;
use axum::{
    routing::{get, patch},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::{functions, AppContext};

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("HTTP API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health))
        .route(
            "/api/v1/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/api/v1/tasks/{id}",
            patch(routes::tasks::update_task).delete(routes::tasks::delete_task),
        )
        .route("/api/v1/tasks/events", get(sse::task_events_sse))
        .nest("/functions", functions::router())
        // The surface is reached by app clients on other origins.
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
