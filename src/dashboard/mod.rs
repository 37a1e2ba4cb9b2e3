//! Dashboard HTTP surface: `spec.md` §6.2. A thin CRUD layer over the job
//! store and the three config documents, generalized from the teacher's
//! `gateway::{daemon,routes,auth}`.

pub mod auth;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::configstore::ConfigStore;
use crate::store::JobStore;

#[derive(Clone)]
pub struct DashboardState {
    pub store: JobStore,
    pub config: Arc<ConfigStore>,
    pub authorized_chat: i64,
    pub dashboard_password: Arc<str>,
}

/// Build the dashboard's router: a public health route plus a protected
/// router gated by the `X-Dashboard-Password` header.
pub fn build_router(state: DashboardState) -> Router {
    let protected = Router::new()
        .route("/api/auth/verify", post(routes::verify_auth))
        .route("/api/jobs", get(routes::list_jobs))
        .route("/api/jobs/{id}", get(routes::get_job))
        .route("/api/jobs/{id}/cancel", post(routes::cancel_job))
        .route("/api/soul", get(routes::get_soul).put(routes::put_soul))
        .route("/api/memory", get(routes::get_memory).put(routes::put_memory))
        .route("/api/blocklist", get(routes::get_blocklist).put(routes::put_blocklist))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth::auth_middleware));

    Router::new()
        .route("/api/health", get(routes::health))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to `127.0.0.1:{port}` and serve until the process is asked to stop.
pub async fn serve(state: DashboardState, port: u16) -> std::io::Result<()> {
    let router = build_router(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "dashboard listening");
    axum::serve(listener, router).await
}
