//! API module for the orchestrator gateway
//!
//! This module contains the versioned routes and handlers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{delete, get, post},
    Router,
};
use std::convert::Infallible;
use std::sync::Arc;

pub mod errors;
pub mod health;
pub mod v2;

use crate::permissions::Credentials;
use crate::server::OrchestratorServer;

/// Build the router for the gateway API
pub fn build_router(server: Arc<OrchestratorServer>) -> Router {
    Router::new()
        // Workflow metadata
        .route("/v2/workflows/overview", get(v2::get_workflows_overview))
        .route(
            "/v2/workflows/instances/statuses",
            get(v2::get_workflow_statuses),
        )
        // Instances
        .route("/v2/workflows/instances", post(v2::get_instances))
        .route(
            "/v2/workflows/instances/:instance_id",
            get(v2::get_instance_by_id),
        )
        .route(
            "/v2/workflows/instances/:instance_id/retrigger",
            post(v2::retrigger_instance),
        )
        .route(
            "/v2/workflows/instances/:instance_id/abort",
            delete(v2::abort_instance),
        )
        // Single workflows
        .route(
            "/v2/workflows/:workflow_id/overview",
            get(v2::get_workflow_overview_by_id),
        )
        .route(
            "/v2/workflows/:workflow_id/inputSchema",
            get(v2::get_workflow_input_schema),
        )
        .route(
            "/v2/workflows/:workflow_id/execute",
            post(v2::execute_workflow),
        )
        .route("/v2/workflows/:workflow_id", get(v2::get_workflow_by_id))
        // Health check
        .route("/health", get(health::health_check))
        // Request tracing
        .layer(tower_http::trace::TraceLayer::new_for_http())
        // Shared state
        .with_state(server)
}

/// Extract caller credentials from the Authorization header
///
/// The bearer token is the opaque subject resolved by the portal's auth layer
/// in front of this gateway; requests without one are anonymous and fall
/// through to the permission gate like any other subject.
#[async_trait]
impl<S> FromRequestParts<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let subject = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .filter(|token| !token.is_empty());

        Ok(match subject {
            Some(subject) => Credentials::new(subject),
            None => Credentials::anonymous(),
        })
    }
}
