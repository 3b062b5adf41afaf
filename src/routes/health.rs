//! Liveness probe
//!
//! `GET /health` returns 200 while the process is serving, with the store
//! backend in use and the uptime.

use hyper::StatusCode;
use serde::Serialize;

use crate::routes::{json_response, ApiResponse};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// "mongo" or "memory"
    pub store: &'static str,
    pub dev_mode: bool,
    /// Seconds since startup
    pub uptime: u64,
    pub timestamp: String,
}

pub async fn health_check(state: &AppState) -> ApiResponse {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        store: state.store.backend(),
        dev_mode: state.args.dev_mode,
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    json_response(StatusCode::OK, &response)
}
