//! Main orchestrator gateway implementation
//!
//! `OrchestratorServer` composes the engine client, the workflow cache, the
//! permission gate and the audit trail. The public operation methods follow a
//! fixed sequence: open the audit bracket, resolve the resource id where the
//! operation is instance-scoped, evaluate the permission gate, perform the
//! cache or engine call, close the bracket with the outcome.

use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};

use orchestrator_engine_client::{
    ExecuteResponse, InstanceFilter, InstanceStatus, Pagination, WorkflowDefinition,
    WorkflowEngineApi, WorkflowId, WorkflowInstance, WorkflowOverview,
};

use crate::audit::{AuditService, AuditSpan};
use crate::cache::{CachePolicy, WorkflowCache};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::operations::Operation;
use crate::permissions::{Credentials, Decision, PermissionGate, WorkflowPermission};

/// Overview listing with the total before pagination
#[derive(Debug, Clone)]
pub struct OverviewPage {
    pub overviews: Vec<WorkflowOverview>,
    pub total_count: usize,
}

/// Main gateway implementation
#[derive(Clone)]
pub struct OrchestratorServer {
    /// Configuration
    pub config: ServerConfig,

    /// Workflow engine client
    engine: Arc<dyn WorkflowEngineApi>,

    /// Refreshed workflow metadata snapshot
    cache: Arc<WorkflowCache>,

    /// Permission gate over the portal's permission service
    gate: PermissionGate,

    /// Audit trail
    audit: Arc<dyn AuditService>,
}

impl std::fmt::Debug for OrchestratorServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorServer")
            .field("config", &self.config)
            .finish()
    }
}

impl OrchestratorServer {
    /// Create a new OrchestratorServer
    pub fn new(
        config: ServerConfig,
        engine: Arc<dyn WorkflowEngineApi>,
        cache: Arc<WorkflowCache>,
        gate: PermissionGate,
        audit: Arc<dyn AuditService>,
    ) -> Self {
        Self {
            config,
            engine,
            cache,
            gate,
            audit,
        }
    }

    /// Run the server
    pub async fn run(self) -> ServerResult<()> {
        info!("Starting orchestrator gateway");

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let app = crate::api::build_router(Arc::new(self));

        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        info!("Listening on {}", addr);

        axum::serve(listener, app).await?;

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Orchestration facade: pure data composition, no authorization here.
    // Callers of `instances` must pass an already-authorization-filtered
    // workflow id list.
    // ---------------------------------------------------------------------

    /// Fetch one workflow overview, honoring the cache-miss policy
    pub async fn fetch_workflow_overview(
        &self,
        id: &WorkflowId,
        policy: CachePolicy,
    ) -> ServerResult<WorkflowOverview> {
        if let Some(overview) = self.cache.overview(id) {
            return Ok(overview);
        }

        match policy {
            CachePolicy::Strict => Err(ServerError::NotFound(format!("Workflow {}", id))),
            CachePolicy::Fallback => {
                debug!(workflow_id = %id, "Overview cache miss, fetching live");
                self.engine
                    .get_workflow_overviews()
                    .await?
                    .into_iter()
                    .find(|o| &o.workflow_id == id)
                    .ok_or_else(|| ServerError::NotFound(format!("Workflow {}", id)))
            }
        }
    }

    /// Fetch one workflow definition, honoring the cache-miss policy
    pub async fn fetch_workflow_definition(
        &self,
        id: &WorkflowId,
        policy: CachePolicy,
    ) -> ServerResult<WorkflowDefinition> {
        if let Some(definition) = self.cache.definition(id) {
            return Ok(definition);
        }

        match policy {
            CachePolicy::Strict => Err(ServerError::NotFound(format!("Workflow {}", id))),
            CachePolicy::Fallback => {
                debug!(workflow_id = %id, "Definition cache miss, fetching live");
                Ok(self.engine.get_workflow_definition(id).await?)
            }
        }
    }

    /// Fetch an instance's current variables; instance data is never cached
    pub async fn fetch_instance_variables(&self, instance_id: &str) -> ServerResult<Value> {
        Ok(self.engine.get_instance_variables(instance_id).await?)
    }

    /// Workflow ids known to the cache snapshot
    pub fn workflow_ids(&self) -> Vec<WorkflowId> {
        self.cache.workflow_ids()
    }

    /// List instances scoped to the given, already-filtered workflow ids
    pub async fn instances(
        &self,
        pagination: &Pagination,
        filter: Option<InstanceFilter>,
        allowed_workflow_ids: &[WorkflowId],
    ) -> ServerResult<Vec<WorkflowInstance>> {
        Ok(self
            .engine
            .get_instances(pagination, filter, allowed_workflow_ids)
            .await?)
    }

    /// Input schema of a workflow, optionally pre-filled from an instance
    ///
    /// A definition without an input schema yields an empty object without
    /// contacting the engine for instance variables.
    pub async fn input_schema(
        &self,
        id: &WorkflowId,
        instance_id: Option<&str>,
    ) -> ServerResult<Value> {
        let definition = self
            .fetch_workflow_definition(id, CachePolicy::Fallback)
            .await?;

        let schema = match definition.data_input_schema {
            Some(schema) => schema,
            None => return Ok(Value::Object(Map::new())),
        };

        let mut response = json!({ "inputSchema": schema });
        if let Some(instance_id) = instance_id {
            let variables = self.fetch_instance_variables(instance_id).await?;
            response["data"] = variables;
        }

        Ok(response)
    }

    // ---------------------------------------------------------------------
    // Authorized operations. Each one opens an audit bracket, resolves the
    // resource where needed, evaluates the gate, then touches data.
    // ---------------------------------------------------------------------

    /// List workflow overviews visible to the caller
    pub async fn get_workflows_overview(
        &self,
        credentials: &Credentials,
        pagination: &Pagination,
    ) -> ServerResult<OverviewPage> {
        let span = self.audit_span(
            Operation::GetWorkflowsOverview,
            credentials,
            json!({ "offset": pagination.offset, "pageSize": pagination.page_size }),
        );
        let result = self.get_workflows_overview_inner(credentials, pagination).await;
        span.finish(&result);
        result
    }

    async fn get_workflows_overview_inner(
        &self,
        credentials: &Credentials,
        pagination: &Pagination,
    ) -> ServerResult<OverviewPage> {
        let overviews = self.cache.overviews();
        let ids: Vec<WorkflowId> = overviews.iter().map(|o| o.workflow_id.clone()).collect();

        let allowed = self
            .gate
            .filter_authorized(
                WorkflowPermission::ReadAny,
                |id| WorkflowPermission::Read(id.clone()),
                ids,
                credentials,
            )
            .await?;

        let visible: Vec<WorkflowOverview> = overviews
            .into_iter()
            .filter(|o| allowed.contains(&o.workflow_id))
            .collect();
        let total_count = visible.len();

        let page = visible
            .into_iter()
            .skip(pagination.offset)
            .take(pagination.page_size)
            .collect();

        Ok(OverviewPage {
            overviews: page,
            total_count,
        })
    }

    /// One workflow overview; the cache is authoritative for overviews
    pub async fn get_workflow_overview_by_id(
        &self,
        credentials: &Credentials,
        id: &WorkflowId,
    ) -> ServerResult<WorkflowOverview> {
        let span = self.audit_span(
            Operation::GetWorkflowOverviewById,
            credentials,
            json!({ "workflowId": id }),
        );
        let result = async {
            self.require_any(Operation::GetWorkflowOverviewById, Some(id), credentials)
                .await?;
            self.fetch_workflow_overview(id, CachePolicy::Strict).await
        }
        .await;
        span.finish(&result);
        result
    }

    /// One workflow definition; a cache miss falls through to a live fetch
    pub async fn get_workflow_by_id(
        &self,
        credentials: &Credentials,
        id: &WorkflowId,
    ) -> ServerResult<WorkflowDefinition> {
        let span = self.audit_span(
            Operation::GetWorkflowById,
            credentials,
            json!({ "workflowId": id }),
        );
        let result = async {
            self.require_any(Operation::GetWorkflowById, Some(id), credentials)
                .await?;
            self.fetch_workflow_definition(id, CachePolicy::Fallback).await
        }
        .await;
        span.finish(&result);
        result
    }

    /// Status vocabulary the engine can report
    pub async fn get_workflow_statuses(
        &self,
        credentials: &Credentials,
    ) -> ServerResult<Vec<InstanceStatus>> {
        let span = self.audit_span(Operation::GetWorkflowStatuses, credentials, json!({}));
        let result = async {
            self.require_any(Operation::GetWorkflowStatuses, None, credentials)
                .await?;
            Ok(InstanceStatus::all().to_vec())
        }
        .await;
        span.finish(&result);
        result
    }

    /// Input schema for a workflow, optionally pre-filled from an instance
    pub async fn get_workflow_input_schema(
        &self,
        credentials: &Credentials,
        id: &WorkflowId,
        instance_id: Option<&str>,
    ) -> ServerResult<Value> {
        let span = self.audit_span(
            Operation::GetWorkflowInputSchemaById,
            credentials,
            json!({ "workflowId": id, "instanceId": instance_id }),
        );
        let result = async {
            self.require_any(Operation::GetWorkflowInputSchemaById, Some(id), credentials)
                .await?;
            self.input_schema(id, instance_id).await
        }
        .await;
        span.finish(&result);
        result
    }

    /// List instances of the workflows the caller may see
    pub async fn get_instances(
        &self,
        credentials: &Credentials,
        pagination: &Pagination,
        filter: Option<InstanceFilter>,
    ) -> ServerResult<Vec<WorkflowInstance>> {
        let span = self.audit_span(
            Operation::GetInstances,
            credentials,
            json!({ "offset": pagination.offset, "pageSize": pagination.page_size, "filter": &filter }),
        );
        let result = self
            .get_instances_inner(credentials, pagination, filter)
            .await;
        span.finish(&result);
        result
    }

    async fn get_instances_inner(
        &self,
        credentials: &Credentials,
        pagination: &Pagination,
        filter: Option<InstanceFilter>,
    ) -> ServerResult<Vec<WorkflowInstance>> {
        if let Some(op) = filter.as_ref().and_then(|f| f.unsupported_operator()) {
            return Err(ServerError::NotImplemented(format!(
                "Filter operator {:?} is not supported",
                op
            )));
        }

        let allowed = self
            .gate
            .filter_authorized(
                WorkflowPermission::ReadAny,
                |id| WorkflowPermission::Read(id.clone()),
                self.workflow_ids(),
                credentials,
            )
            .await?;

        if allowed.is_empty() {
            return Ok(Vec::new());
        }

        self.instances(pagination, filter, &allowed).await
    }

    /// One instance, authorized against its owning workflow
    ///
    /// The owning workflow id must be resolved before workflow-scoped
    /// permission can be evaluated; the preliminary read is internal and its
    /// result is withheld until the gate allows.
    pub async fn get_instance_by_id(
        &self,
        credentials: &Credentials,
        instance_id: &str,
        include_assessment: bool,
    ) -> ServerResult<WorkflowInstance> {
        let span = self.audit_span(
            Operation::GetInstanceById,
            credentials,
            json!({ "instanceId": instance_id, "includeAssessment": include_assessment }),
        );
        let result = async {
            let instance = self
                .engine
                .get_instance_by_id(instance_id, include_assessment)
                .await?;
            self.require_any(
                Operation::GetInstanceById,
                Some(&instance.process_id),
                credentials,
            )
            .await?;
            Ok(instance)
        }
        .await;
        span.finish(&result);
        result
    }

    /// Start a new instance of a workflow
    pub async fn execute_workflow(
        &self,
        credentials: &Credentials,
        id: &WorkflowId,
        input: Value,
        business_key: Option<&str>,
    ) -> ServerResult<ExecuteResponse> {
        let span = self.audit_span(
            Operation::ExecuteWorkflow,
            credentials,
            json!({ "workflowId": id, "businessKey": business_key, "input": &input }),
        );
        let result = async {
            if !input.is_object() {
                return Err(ServerError::ValidationError(
                    "Execution input must be a JSON object".to_string(),
                ));
            }
            self.require_any(Operation::ExecuteWorkflow, Some(id), credentials)
                .await?;
            Ok(self
                .engine
                .execute(id, input, business_key.map(String::from))
                .await?)
        }
        .await;
        span.finish(&result);
        result
    }

    /// Retrigger a failed instance, authorized against its owning workflow
    pub async fn retrigger_instance(
        &self,
        credentials: &Credentials,
        instance_id: &str,
    ) -> ServerResult<()> {
        let span = self.audit_span(
            Operation::RetriggerInstance,
            credentials,
            json!({ "instanceId": instance_id }),
        );
        let result = async {
            let instance = self.engine.get_instance_by_id(instance_id, false).await?;
            self.require_any(
                Operation::RetriggerInstance,
                Some(&instance.process_id),
                credentials,
            )
            .await?;
            Ok(self
                .engine
                .retrigger(&instance.process_id, instance_id)
                .await?)
        }
        .await;
        span.finish(&result);
        result
    }

    /// Abort a running instance, authorized against its owning workflow
    pub async fn abort_instance(
        &self,
        credentials: &Credentials,
        instance_id: &str,
    ) -> ServerResult<()> {
        let span = self.audit_span(
            Operation::AbortInstance,
            credentials,
            json!({ "instanceId": instance_id }),
        );
        let result = async {
            let instance = self.engine.get_instance_by_id(instance_id, false).await?;
            self.require_any(
                Operation::AbortInstance,
                Some(&instance.process_id),
                credentials,
            )
            .await?;
            Ok(self.engine.abort(&instance.process_id, instance_id).await?)
        }
        .await;
        span.finish(&result);
        result
    }

    /// Force a cache refresh outside the schedule
    pub async fn invalidate_cache(&self) {
        self.cache.invalidate().await;
    }

    /// Check engine reachability
    pub async fn check_engine_health(&self) -> ServerResult<bool> {
        match self.engine.get_workflow_overviews().await {
            Ok(_) => Ok(true),
            Err(err) => {
                debug!(?err, "Engine health check failed");
                Ok(false)
            }
        }
    }

    // Internal helper methods

    fn audit_span(&self, op: Operation, credentials: &Credentials, meta: Value) -> AuditSpan {
        AuditSpan::begin(
            self.audit.clone(),
            op.name(),
            op.severity(),
            credentials.subject.clone(),
            meta,
        )
    }

    /// Evaluate the operation's candidate permissions, denying by default
    async fn require_any(
        &self,
        op: Operation,
        workflow_id: Option<&WorkflowId>,
        credentials: &Credentials,
    ) -> ServerResult<()> {
        let candidates = op.candidate_permissions(workflow_id);
        match self.gate.any_of(&candidates, credentials).await? {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(ServerError::Unauthorized(format!(
                "{} is not allowed to {}",
                credentials.subject,
                op.name()
            ))),
        }
    }
}
