//! Health check endpoint for the orchestrator gateway

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::server::OrchestratorServer;

/// Health check handler
///
/// Reports the gateway status and engine reachability.
pub async fn health_check(State(server): State<Arc<OrchestratorServer>>) -> impl IntoResponse {
    let engine_status = match server.check_engine_health().await {
        Ok(true) => "UP",
        _ => "DOWN",
    };

    let response = json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION"),
        "dependencies": {
            "engine": { "status": engine_status },
        },
    });

    let overall_status = if engine_status == "DOWN" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (overall_status, Json(response))
}
