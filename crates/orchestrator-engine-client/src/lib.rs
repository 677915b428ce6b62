//! Workflow engine client
//!
//! Provides the data model and client abstractions for the external workflow
//! engine. The WorkflowEngineApi trait defines the contract the gateway needs:
//! reading workflow overviews, definitions and instances, and driving
//! executions (start / retrigger / abort).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Debug, Display};
use thiserror::Error;

/// Stable identifier of a workflow definition, assigned by the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(String);

impl WorkflowId {
    /// Create a workflow id from its string form
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string representation of the id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkflowId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for WorkflowId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle status of a workflow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Active,
    Completed,
    Aborted,
    Error,
    Suspended,
    Pending,
}

impl InstanceStatus {
    /// All statuses the engine can report, in display order
    pub fn all() -> &'static [InstanceStatus] {
        &[
            InstanceStatus::Active,
            InstanceStatus::Completed,
            InstanceStatus::Aborted,
            InstanceStatus::Error,
            InstanceStatus::Suspended,
            InstanceStatus::Pending,
        ]
    }
}

/// Summary projection of a workflow used for listing
///
/// Produced by the engine and cached by the gateway; a refresh supersedes the
/// previous set wholesale, there is no partial merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOverview {
    pub workflow_id: WorkflowId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Instance id of the most recent run, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_status: Option<InstanceStatus>,
    /// Timestamp of the most recent trigger
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_triggered: Option<DateTime<Utc>>,
}

/// Deployed workflow definition
///
/// A definition without `data_input_schema` is valid; input-schema lookups
/// short-circuit on it without contacting the workflow service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub workflow_id: WorkflowId,
    pub name: String,
    /// Base URL of the service hosting this workflow's endpoints
    pub service_url: String,
    /// JSON Schema describing the execution input, when the workflow declares one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_input_schema: Option<Value>,
}

/// One running or completed execution of a workflow
///
/// Instance data is never cached by the gateway; instances mutate continuously
/// and are always fetched live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInstance {
    pub id: String,
    /// Id of the owning workflow definition
    pub process_id: WorkflowId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    pub status: InstanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Assessment payload, present only when requested with the instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessed_by: Option<Value>,
}

/// Response returned by the engine when an execution is started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    /// Id of the newly created instance
    pub id: String,
}

/// Sort direction for instance listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Request-scoped pagination values, pure data with no identity beyond the request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(default = "default_sort_order")]
    pub sort_order: SortOrder,
}

fn default_page_size() -> usize {
    10
}

fn default_sort_order() -> SortOrder {
    SortOrder::Desc
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            page_size: default_page_size(),
            order_by: None,
            sort_order: default_sort_order(),
        }
    }
}

/// Comparison operator in a field filter
///
/// `Between` and `Contains` are part of the filter vocabulary but the gateway
/// does not translate them yet; callers reject them before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldOperator {
    Eq,
    Like,
    In,
    IsNull,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    Contains,
}

impl FieldOperator {
    /// Whether the gateway can translate this operator for the engine
    pub fn is_supported(&self) -> bool {
        !matches!(self, FieldOperator::Between | FieldOperator::Contains)
    }
}

/// Combinator for nested filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

/// Request-scoped instance filter tree parsed from the inbound call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceFilter {
    Logical {
        operator: LogicalOperator,
        filters: Vec<InstanceFilter>,
    },
    Field {
        field: String,
        operator: FieldOperator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
}

impl InstanceFilter {
    /// First recognized-but-unsupported operator in the tree, if any
    pub fn unsupported_operator(&self) -> Option<FieldOperator> {
        match self {
            InstanceFilter::Field { operator, .. } => {
                if operator.is_supported() {
                    None
                } else {
                    Some(*operator)
                }
            }
            InstanceFilter::Logical { filters, .. } => {
                filters.iter().find_map(|f| f.unsupported_operator())
            }
        }
    }
}

/// Errors surfaced by workflow engine clients
#[derive(Error, Debug)]
pub enum EngineError {
    /// Unknown workflow id
    #[error("workflow {0} not found")]
    WorkflowNotFound(WorkflowId),

    /// Unknown instance id
    #[error("workflow instance {0} not found")]
    InstanceNotFound(String),

    /// The engine or workflow service rejected or failed the call
    #[error("engine request failed: {0}")]
    Remote(String),

    /// The engine answered with a payload the client could not interpret
    #[error("invalid engine response: {0}")]
    InvalidResponse(String),
}

/// Result type for engine client operations
pub type EngineResult<T> = Result<T, EngineError>;

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Remote(err.to_string())
    }
}

/// Interface to the external workflow engine
///
/// All methods are potentially failing remote calls. Retries, if any, belong
/// to implementations of this trait, not to its callers.
#[async_trait]
pub trait WorkflowEngineApi: Send + Sync + Debug {
    /// Fetch the full list of workflow overviews
    async fn get_workflow_overviews(&self) -> EngineResult<Vec<WorkflowOverview>>;

    /// Fetch one workflow definition
    async fn get_workflow_definition(&self, id: &WorkflowId) -> EngineResult<WorkflowDefinition>;

    /// List instances restricted to the given workflow ids
    async fn get_instances(
        &self,
        pagination: &Pagination,
        filter: Option<InstanceFilter>,
        workflow_ids: &[WorkflowId],
    ) -> EngineResult<Vec<WorkflowInstance>>;

    /// Fetch one instance, optionally with its assessment payload
    async fn get_instance_by_id(
        &self,
        instance_id: &str,
        include_assessment: bool,
    ) -> EngineResult<WorkflowInstance>;

    /// Fetch the current variables of an instance
    async fn get_instance_variables(&self, instance_id: &str) -> EngineResult<Value>;

    /// Fetch the input schema published by the workflow service, if any
    async fn get_input_schema(
        &self,
        id: &WorkflowId,
        service_url: &str,
    ) -> EngineResult<Option<Value>>;

    /// Start a new instance of a workflow
    async fn execute(
        &self,
        id: &WorkflowId,
        input: Value,
        business_key: Option<String>,
    ) -> EngineResult<ExecuteResponse>;

    /// Retrigger a failed instance from its last error node
    async fn retrigger(&self, workflow_id: &WorkflowId, instance_id: &str) -> EngineResult<()>;

    /// Abort a running instance
    async fn abort(&self, workflow_id: &WorkflowId, instance_id: &str) -> EngineResult<()>;
}

pub mod http;
pub mod memory;

pub use http::HttpWorkflowEngine;
pub use memory::InMemoryWorkflowEngine;
