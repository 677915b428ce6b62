//! HTTP implementation of the WorkflowEngineApi
//!
//! Talks to the engine's REST API for reads and instance management, and to
//! the per-workflow service URL for execution and input schemas.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::{
    EngineError, EngineResult, ExecuteResponse, InstanceFilter, Pagination, WorkflowDefinition,
    WorkflowEngineApi, WorkflowId, WorkflowInstance, WorkflowOverview,
};

/// Default timeout applied to every engine call
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the workflow engine REST API
#[derive(Debug, Clone)]
pub struct HttpWorkflowEngine {
    /// Base URL of the engine API
    base_url: String,

    /// HTTP client
    client: Client,
}

/// Wire form of the instance search request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InstanceSearchRequest<'a> {
    pagination: &'a Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a InstanceFilter>,
    workflow_ids: &'a [WorkflowId],
}

impl HttpWorkflowEngine {
    /// Create a new engine client for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn workflows_url(&self) -> String {
        format!("{}/api/workflows", self.base_url)
    }

    fn workflow_url(&self, id: &WorkflowId) -> String {
        format!("{}/{}", self.workflows_url(), id)
    }

    fn instances_url(&self) -> String {
        format!("{}/api/instances", self.base_url)
    }

    fn instance_url(&self, instance_id: &str) -> String {
        format!("{}/{}", self.instances_url(), instance_id)
    }

    fn instance_management_url(&self, workflow_id: &WorkflowId, instance_id: &str) -> String {
        format!("{}/instances/{}", self.workflow_url(workflow_id), instance_id)
    }

    /// Read the response body for an error message, falling back to the status line
    async fn error_body(response: reqwest::Response) -> String {
        let status = response.status();
        match response.text().await {
            Ok(body) if !body.is_empty() => body,
            _ => format!("status {}", status),
        }
    }
}

#[async_trait]
impl WorkflowEngineApi for HttpWorkflowEngine {
    async fn get_workflow_overviews(&self) -> EngineResult<Vec<WorkflowOverview>> {
        debug!("Fetching workflow overviews");

        let response = self.client.get(self.workflows_url()).send().await?;

        if !response.status().is_success() {
            return Err(EngineError::Remote(Self::error_body(response).await));
        }

        let overviews = response
            .json::<Vec<WorkflowOverview>>()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        debug!(count = overviews.len(), "Fetched workflow overviews");
        Ok(overviews)
    }

    async fn get_workflow_definition(&self, id: &WorkflowId) -> EngineResult<WorkflowDefinition> {
        debug!(workflow_id = %id, "Fetching workflow definition");

        let response = self.client.get(self.workflow_url(id)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(EngineError::WorkflowNotFound(id.clone())),
            status if status.is_success() => response
                .json::<WorkflowDefinition>()
                .await
                .map_err(|e| EngineError::InvalidResponse(e.to_string())),
            _ => Err(EngineError::Remote(Self::error_body(response).await)),
        }
    }

    async fn get_instances(
        &self,
        pagination: &Pagination,
        filter: Option<InstanceFilter>,
        workflow_ids: &[WorkflowId],
    ) -> EngineResult<Vec<WorkflowInstance>> {
        debug!(workflows = workflow_ids.len(), "Searching instances");

        let request = InstanceSearchRequest {
            pagination,
            filter: filter.as_ref(),
            workflow_ids,
        };

        let response = self
            .client
            .post(format!("{}/search", self.instances_url()))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EngineError::Remote(Self::error_body(response).await));
        }

        response
            .json::<Vec<WorkflowInstance>>()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }

    async fn get_instance_by_id(
        &self,
        instance_id: &str,
        include_assessment: bool,
    ) -> EngineResult<WorkflowInstance> {
        debug!(%instance_id, include_assessment, "Fetching instance");

        let response = self
            .client
            .get(self.instance_url(instance_id))
            .query(&[("includeAssessment", include_assessment)])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(EngineError::InstanceNotFound(instance_id.to_string())),
            status if status.is_success() => response
                .json::<WorkflowInstance>()
                .await
                .map_err(|e| EngineError::InvalidResponse(e.to_string())),
            _ => Err(EngineError::Remote(Self::error_body(response).await)),
        }
    }

    async fn get_instance_variables(&self, instance_id: &str) -> EngineResult<Value> {
        debug!(%instance_id, "Fetching instance variables");

        let response = self
            .client
            .get(format!("{}/variables", self.instance_url(instance_id)))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(EngineError::InstanceNotFound(instance_id.to_string())),
            status if status.is_success() => response
                .json::<Value>()
                .await
                .map_err(|e| EngineError::InvalidResponse(e.to_string())),
            _ => Err(EngineError::Remote(Self::error_body(response).await)),
        }
    }

    async fn get_input_schema(
        &self,
        id: &WorkflowId,
        service_url: &str,
    ) -> EngineResult<Option<Value>> {
        debug!(workflow_id = %id, %service_url, "Fetching input schema");

        let url = format!("{}/{}/schema", service_url.trim_end_matches('/'), id);
        let response = self.client.get(url).send().await?;

        match response.status() {
            // The service publishes no schema for this workflow
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<Value>()
                .await
                .map(Some)
                .map_err(|e| EngineError::InvalidResponse(e.to_string())),
            _ => Err(EngineError::Remote(Self::error_body(response).await)),
        }
    }

    async fn execute(
        &self,
        id: &WorkflowId,
        input: Value,
        business_key: Option<String>,
    ) -> EngineResult<ExecuteResponse> {
        info!(workflow_id = %id, "Executing workflow");

        let definition = self.get_workflow_definition(id).await?;
        let url = format!("{}/{}", definition.service_url.trim_end_matches('/'), id);

        let mut request = self.client.post(url).json(&input);
        if let Some(key) = business_key.as_deref() {
            request = request.query(&[("businessKey", key)]);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(EngineError::Remote(Self::error_body(response).await));
        }

        response
            .json::<ExecuteResponse>()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }

    async fn retrigger(&self, workflow_id: &WorkflowId, instance_id: &str) -> EngineResult<()> {
        info!(%workflow_id, %instance_id, "Retriggering instance");

        let response = self
            .client
            .post(format!(
                "{}/retrigger",
                self.instance_management_url(workflow_id, instance_id)
            ))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(EngineError::InstanceNotFound(instance_id.to_string())),
            status if status.is_success() => Ok(()),
            _ => Err(EngineError::Remote(Self::error_body(response).await)),
        }
    }

    async fn abort(&self, workflow_id: &WorkflowId, instance_id: &str) -> EngineResult<()> {
        info!(%workflow_id, %instance_id, "Aborting instance");

        let response = self
            .client
            .delete(self.instance_management_url(workflow_id, instance_id))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(EngineError::InstanceNotFound(instance_id.to_string())),
            status if status.is_success() => Ok(()),
            _ => Err(EngineError::Remote(Self::error_body(response).await)),
        }
    }
}
