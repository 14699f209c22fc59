//! Admin Surface
//!
//! Minimal operational endpoints: liveness, Prometheus metrics, and cache
//! statistics.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tracing::info;

use crate::cache::CacheManager;

#[derive(Clone)]
pub struct AdminState {
    pub metrics: PrometheusHandle,
    pub caches: Arc<CacheManager>,
}

#[derive(Serialize)]
struct CacheStatsResponse {
    cache: &'static str,
    size: usize,
    hits: u64,
    misses: u64,
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .route("/caches", get(cache_stats))
        .with_state(state)
}

pub async fn serve(state: AdminState, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "admin server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn render_metrics(State(state): State<AdminState>) -> String {
    state.metrics.render()
}

async fn cache_stats(State(state): State<AdminState>) -> Json<Vec<CacheStatsResponse>> {
    let stats = state
        .caches
        .stats()
        .into_iter()
        .map(|(cache, s)| CacheStatsResponse {
            cache,
            size: s.size,
            hits: s.hits,
            misses: s.misses,
        })
        .collect();
    Json(stats)
}
