//! Versioned API handlers
//!
//! Handlers are thin glue: extract credentials and request values, call the
//! server's audited operation, map errors onto the standardized response.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use orchestrator_engine_client::{InstanceFilter, Pagination, WorkflowId};

use crate::api::errors::api_error_response;
use crate::permissions::Credentials;
use crate::server::OrchestratorServer;

/// Body of the instance listing request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancesRequest {
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub filter: Option<InstanceFilter>,
}

/// Query parameters for input schema lookups
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSchemaQuery {
    pub instance_id: Option<String>,
}

/// Query parameters for single-instance reads
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceQuery {
    #[serde(default)]
    pub include_assessment: bool,
}

/// Query parameters for workflow execution
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteQuery {
    pub business_key: Option<String>,
}

/// Handler for listing workflow overviews
pub async fn get_workflows_overview(
    State(server): State<Arc<OrchestratorServer>>,
    credentials: Credentials,
    Query(pagination): Query<Pagination>,
) -> impl IntoResponse {
    info!(subject = %credentials.subject, "Listing workflow overviews");

    match server.get_workflows_overview(&credentials, &pagination).await {
        Ok(page) => (
            StatusCode::OK,
            Json(json!({
                "overviews": page.overviews,
                "paginationInfo": {
                    "offset": pagination.offset,
                    "pageSize": pagination.page_size,
                    "totalCount": page.total_count,
                }
            })),
        )
            .into_response(),
        Err(err) => {
            error!(?err, "Failed to list workflow overviews");
            api_error_response(&err)
        }
    }
}

/// Handler for getting one workflow overview
pub async fn get_workflow_overview_by_id(
    State(server): State<Arc<OrchestratorServer>>,
    credentials: Credentials,
    Path(workflow_id): Path<String>,
) -> impl IntoResponse {
    info!(%workflow_id, "Getting workflow overview");

    let id = WorkflowId::new(workflow_id);
    match server.get_workflow_overview_by_id(&credentials, &id).await {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(err) => {
            error!(?err, workflow_id = %id, "Failed to get workflow overview");
            api_error_response(&err)
        }
    }
}

/// Handler for getting one workflow definition
pub async fn get_workflow_by_id(
    State(server): State<Arc<OrchestratorServer>>,
    credentials: Credentials,
    Path(workflow_id): Path<String>,
) -> impl IntoResponse {
    info!(%workflow_id, "Getting workflow");

    let id = WorkflowId::new(workflow_id);
    match server.get_workflow_by_id(&credentials, &id).await {
        Ok(definition) => (StatusCode::OK, Json(definition)).into_response(),
        Err(err) => {
            error!(?err, workflow_id = %id, "Failed to get workflow");
            api_error_response(&err)
        }
    }
}

/// Handler for the instance status vocabulary
pub async fn get_workflow_statuses(
    State(server): State<Arc<OrchestratorServer>>,
    credentials: Credentials,
) -> impl IntoResponse {
    info!(subject = %credentials.subject, "Listing workflow statuses");

    match server.get_workflow_statuses(&credentials).await {
        Ok(statuses) => (StatusCode::OK, Json(statuses)).into_response(),
        Err(err) => {
            error!(?err, "Failed to list workflow statuses");
            api_error_response(&err)
        }
    }
}

/// Handler for workflow input schemas
pub async fn get_workflow_input_schema(
    State(server): State<Arc<OrchestratorServer>>,
    credentials: Credentials,
    Path(workflow_id): Path<String>,
    Query(query): Query<InputSchemaQuery>,
) -> impl IntoResponse {
    info!(%workflow_id, "Getting workflow input schema");

    let id = WorkflowId::new(workflow_id);
    match server
        .get_workflow_input_schema(&credentials, &id, query.instance_id.as_deref())
        .await
    {
        Ok(schema) => (StatusCode::OK, Json(schema)).into_response(),
        Err(err) => {
            error!(?err, workflow_id = %id, "Failed to get workflow input schema");
            api_error_response(&err)
        }
    }
}

/// Handler for listing instances
pub async fn get_instances(
    State(server): State<Arc<OrchestratorServer>>,
    credentials: Credentials,
    body: Option<Json<InstancesRequest>>,
) -> impl IntoResponse {
    info!(subject = %credentials.subject, "Listing instances");

    let request = body.map(|Json(request)| request).unwrap_or_default();
    let pagination = request.pagination.unwrap_or_default();

    match server
        .get_instances(&credentials, &pagination, request.filter)
        .await
    {
        Ok(instances) => (StatusCode::OK, Json(instances)).into_response(),
        Err(err) => {
            error!(?err, "Failed to list instances");
            api_error_response(&err)
        }
    }
}

/// Handler for getting one instance
pub async fn get_instance_by_id(
    State(server): State<Arc<OrchestratorServer>>,
    credentials: Credentials,
    Path(instance_id): Path<String>,
    Query(query): Query<InstanceQuery>,
) -> impl IntoResponse {
    info!(%instance_id, "Getting instance");

    match server
        .get_instance_by_id(&credentials, &instance_id, query.include_assessment)
        .await
    {
        Ok(instance) => (StatusCode::OK, Json(instance)).into_response(),
        Err(err) => {
            error!(?err, %instance_id, "Failed to get instance");
            api_error_response(&err)
        }
    }
}

/// Handler for executing a workflow
pub async fn execute_workflow(
    State(server): State<Arc<OrchestratorServer>>,
    credentials: Credentials,
    Path(workflow_id): Path<String>,
    Query(query): Query<ExecuteQuery>,
    Json(input): Json<Value>,
) -> impl IntoResponse {
    info!(%workflow_id, "Executing workflow");

    let id = WorkflowId::new(workflow_id);
    match server
        .execute_workflow(&credentials, &id, input, query.business_key.as_deref())
        .await
    {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => {
            error!(?err, workflow_id = %id, "Failed to execute workflow");
            api_error_response(&err)
        }
    }
}

/// Handler for retriggering an instance
pub async fn retrigger_instance(
    State(server): State<Arc<OrchestratorServer>>,
    credentials: Credentials,
    Path(instance_id): Path<String>,
) -> impl IntoResponse {
    info!(%instance_id, "Retriggering instance");

    match server.retrigger_instance(&credentials, &instance_id).await {
        Ok(()) => (StatusCode::OK, Json(json!(null))).into_response(),
        Err(err) => {
            error!(?err, %instance_id, "Failed to retrigger instance");
            api_error_response(&err)
        }
    }
}

/// Handler for aborting an instance
pub async fn abort_instance(
    State(server): State<Arc<OrchestratorServer>>,
    credentials: Credentials,
    Path(instance_id): Path<String>,
) -> impl IntoResponse {
    info!(%instance_id, "Aborting instance");

    match server.abort_instance(&credentials, &instance_id).await {
        Ok(()) => (StatusCode::NO_CONTENT, Json(json!(null))).into_response(),
        Err(err) => {
            error!(?err, %instance_id, "Failed to abort instance");
            api_error_response(&err)
        }
    }
}
