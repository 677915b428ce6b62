//! In-memory implementation of WorkflowEngineApi
//!
//! This implementation is primarily intended for testing and development
//! purposes. All data is lost when the instance is dropped.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    EngineError, EngineResult, ExecuteResponse, InstanceFilter, InstanceStatus, Pagination,
    WorkflowDefinition, WorkflowEngineApi, WorkflowId, WorkflowInstance, WorkflowOverview,
};

/// In-memory workflow engine
///
/// Workflows and instances are seeded through the `insert_*` methods; execute
/// allocates fresh instance ids. The filter tree is not interpreted — callers
/// that need filter behavior should test against a real engine.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkflowEngine {
    overviews: Arc<RwLock<HashMap<WorkflowId, WorkflowOverview>>>,
    definitions: Arc<RwLock<HashMap<WorkflowId, WorkflowDefinition>>>,
    instances: Arc<RwLock<HashMap<String, WorkflowInstance>>>,
    variables: Arc<RwLock<HashMap<String, Value>>>,
    schemas: Arc<RwLock<HashMap<WorkflowId, Value>>>,
}

impl InMemoryWorkflowEngine {
    /// Create an empty in-memory engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a workflow with its overview and definition
    pub async fn insert_workflow(&self, overview: WorkflowOverview, definition: WorkflowDefinition) {
        self.overviews
            .write()
            .await
            .insert(overview.workflow_id.clone(), overview);
        self.definitions
            .write()
            .await
            .insert(definition.workflow_id.clone(), definition);
    }

    /// Seed an instance
    pub async fn insert_instance(&self, instance: WorkflowInstance) {
        self.instances
            .write()
            .await
            .insert(instance.id.clone(), instance);
    }

    /// Seed the variables returned for an instance
    pub async fn insert_variables(&self, instance_id: &str, variables: Value) {
        self.variables
            .write()
            .await
            .insert(instance_id.to_string(), variables);
    }

    /// Seed the input schema served for a workflow
    pub async fn insert_schema(&self, workflow_id: WorkflowId, schema: Value) {
        self.schemas.write().await.insert(workflow_id, schema);
    }

    /// Remove a workflow, leaving its instances in place
    pub async fn remove_workflow(&self, workflow_id: &WorkflowId) {
        self.overviews.write().await.remove(workflow_id);
        self.definitions.write().await.remove(workflow_id);
    }
}

#[async_trait]
impl WorkflowEngineApi for InMemoryWorkflowEngine {
    async fn get_workflow_overviews(&self) -> EngineResult<Vec<WorkflowOverview>> {
        let overviews = self.overviews.read().await;
        let mut all: Vec<WorkflowOverview> = overviews.values().cloned().collect();
        all.sort_by(|a, b| a.workflow_id.as_str().cmp(b.workflow_id.as_str()));
        Ok(all)
    }

    async fn get_workflow_definition(&self, id: &WorkflowId) -> EngineResult<WorkflowDefinition> {
        self.definitions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::WorkflowNotFound(id.clone()))
    }

    async fn get_instances(
        &self,
        pagination: &Pagination,
        _filter: Option<InstanceFilter>,
        workflow_ids: &[WorkflowId],
    ) -> EngineResult<Vec<WorkflowInstance>> {
        let instances = self.instances.read().await;
        let mut matching: Vec<WorkflowInstance> = instances
            .values()
            .filter(|i| workflow_ids.contains(&i.process_id))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(matching
            .into_iter()
            .skip(pagination.offset)
            .take(pagination.page_size)
            .collect())
    }

    async fn get_instance_by_id(
        &self,
        instance_id: &str,
        include_assessment: bool,
    ) -> EngineResult<WorkflowInstance> {
        let mut instance = self
            .instances
            .read()
            .await
            .get(instance_id)
            .cloned()
            .ok_or_else(|| EngineError::InstanceNotFound(instance_id.to_string()))?;

        if !include_assessment {
            instance.assessed_by = None;
        }
        Ok(instance)
    }

    async fn get_instance_variables(&self, instance_id: &str) -> EngineResult<Value> {
        if !self.instances.read().await.contains_key(instance_id) {
            return Err(EngineError::InstanceNotFound(instance_id.to_string()));
        }
        Ok(self
            .variables
            .read()
            .await
            .get(instance_id)
            .cloned()
            .unwrap_or_else(|| json!({})))
    }

    async fn get_input_schema(
        &self,
        id: &WorkflowId,
        _service_url: &str,
    ) -> EngineResult<Option<Value>> {
        Ok(self.schemas.read().await.get(id).cloned())
    }

    async fn execute(
        &self,
        id: &WorkflowId,
        _input: Value,
        business_key: Option<String>,
    ) -> EngineResult<ExecuteResponse> {
        let definition = self.get_workflow_definition(id).await?;

        let instance = WorkflowInstance {
            id: Uuid::new_v4().to_string(),
            process_id: definition.workflow_id.clone(),
            process_name: Some(definition.name.clone()),
            status: InstanceStatus::Active,
            business_key,
            start: Some(chrono::Utc::now()),
            end: None,
            error_message: None,
            assessed_by: None,
        };
        let id = instance.id.clone();
        self.insert_instance(instance).await;

        Ok(ExecuteResponse { id })
    }

    async fn retrigger(&self, workflow_id: &WorkflowId, instance_id: &str) -> EngineResult<()> {
        let mut instances = self.instances.write().await;
        let instance = instances
            .get_mut(instance_id)
            .filter(|i| &i.process_id == workflow_id)
            .ok_or_else(|| EngineError::InstanceNotFound(instance_id.to_string()))?;

        instance.status = InstanceStatus::Active;
        instance.error_message = None;
        instance.end = None;
        Ok(())
    }

    async fn abort(&self, workflow_id: &WorkflowId, instance_id: &str) -> EngineResult<()> {
        let mut instances = self.instances.write().await;
        let instance = instances
            .get_mut(instance_id)
            .filter(|i| &i.process_id == workflow_id)
            .ok_or_else(|| EngineError::InstanceNotFound(instance_id.to_string()))?;

        instance.status = InstanceStatus::Aborted;
        instance.end = Some(chrono::Utc::now());
        Ok(())
    }
}
