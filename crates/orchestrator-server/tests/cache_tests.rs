use async_trait::async_trait;
use mockall::mock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use orchestrator_engine_client::{
    EngineError, ExecuteResponse, InstanceFilter, Pagination, WorkflowDefinition,
    WorkflowEngineApi, WorkflowId, WorkflowInstance, WorkflowOverview,
};
use orchestrator_server::WorkflowCache;

mock! {
    #[derive(Debug)]
    pub Engine {}

    #[async_trait]
    impl WorkflowEngineApi for Engine {
        async fn get_workflow_overviews(&self) -> Result<Vec<WorkflowOverview>, EngineError>;
        async fn get_workflow_definition(&self, id: &WorkflowId) -> Result<WorkflowDefinition, EngineError>;
        async fn get_instances(
            &self,
            pagination: &Pagination,
            filter: Option<InstanceFilter>,
            workflow_ids: &[WorkflowId],
        ) -> Result<Vec<WorkflowInstance>, EngineError>;
        async fn get_instance_by_id(
            &self,
            instance_id: &str,
            include_assessment: bool,
        ) -> Result<WorkflowInstance, EngineError>;
        async fn get_instance_variables(&self, instance_id: &str) -> Result<Value, EngineError>;
        async fn get_input_schema(
            &self,
            id: &WorkflowId,
            service_url: &str,
        ) -> Result<Option<Value>, EngineError>;
        async fn execute(
            &self,
            id: &WorkflowId,
            input: Value,
            business_key: Option<String>,
        ) -> Result<ExecuteResponse, EngineError>;
        async fn retrigger(&self, workflow_id: &WorkflowId, instance_id: &str) -> Result<(), EngineError>;
        async fn abort(&self, workflow_id: &WorkflowId, instance_id: &str) -> Result<(), EngineError>;
    }
}

fn overview(id: &str) -> WorkflowOverview {
    WorkflowOverview {
        workflow_id: WorkflowId::new(id),
        name: id.to_string(),
        description: None,
        category: None,
        last_run_id: None,
        last_run_status: None,
        last_triggered: None,
    }
}

fn definition(id: &str) -> WorkflowDefinition {
    WorkflowDefinition {
        workflow_id: WorkflowId::new(id),
        name: id.to_string(),
        service_url: format!("http://services.example.com/{}", id),
        data_input_schema: None,
    }
}

#[tokio::test]
async fn refresh_populates_the_snapshot() {
    let mut engine = MockEngine::new();
    engine
        .expect_get_workflow_overviews()
        .returning(|| Ok(vec![overview("wf-a"), overview("wf-b")]));
    engine
        .expect_get_workflow_definition()
        .returning(|id| Ok(definition(id.as_str())));

    let cache = WorkflowCache::new(Arc::new(engine));
    assert!(cache.overviews().is_empty());

    cache.refresh().await.unwrap();

    let overviews = cache.overviews();
    assert_eq!(overviews.len(), 2);
    assert_eq!(
        cache.workflow_ids(),
        vec![WorkflowId::new("wf-a"), WorkflowId::new("wf-b")]
    );
    assert!(cache.definition(&WorkflowId::new("wf-a")).is_some());
    assert!(cache.overview(&WorkflowId::new("wf-b")).is_some());
}

#[tokio::test]
async fn failed_refresh_keeps_the_previous_snapshot() {
    let mut engine = MockEngine::new();
    engine
        .expect_get_workflow_overviews()
        .times(1)
        .returning(|| Ok(vec![overview("wf-a")]));
    engine
        .expect_get_workflow_overviews()
        .returning(|| Err(EngineError::Remote("engine unavailable".into())));
    engine
        .expect_get_workflow_definition()
        .returning(|id| Ok(definition(id.as_str())));

    let cache = WorkflowCache::new(Arc::new(engine));
    cache.refresh().await.unwrap();
    assert_eq!(cache.overviews().len(), 1);

    // Stale-but-available over empty.
    assert!(cache.refresh().await.is_err());
    assert_eq!(cache.overviews().len(), 1);
    assert!(cache.definition(&WorkflowId::new("wf-a")).is_some());
}

#[tokio::test]
async fn definition_fetch_failure_skips_only_that_workflow() {
    let mut engine = MockEngine::new();
    engine
        .expect_get_workflow_overviews()
        .returning(|| Ok(vec![overview("wf-a"), overview("wf-b")]));
    engine
        .expect_get_workflow_definition()
        .returning(|id| {
            if id.as_str() == "wf-b" {
                Err(EngineError::Remote("service unavailable".into()))
            } else {
                Ok(definition(id.as_str()))
            }
        });

    let cache = WorkflowCache::new(Arc::new(engine));
    cache.refresh().await.unwrap();

    assert_eq!(cache.overviews().len(), 2);
    assert!(cache.definition(&WorkflowId::new("wf-a")).is_some());
    assert!(cache.definition(&WorkflowId::new("wf-b")).is_none());
}

#[tokio::test]
async fn snapshot_replacement_is_wholesale() {
    let mut engine = MockEngine::new();
    engine
        .expect_get_workflow_overviews()
        .times(1)
        .returning(|| Ok(vec![overview("wf-a"), overview("wf-b")]));
    engine
        .expect_get_workflow_overviews()
        .returning(|| Ok(vec![overview("wf-c")]));
    engine
        .expect_get_workflow_definition()
        .returning(|id| Ok(definition(id.as_str())));

    let cache = WorkflowCache::new(Arc::new(engine));
    cache.refresh().await.unwrap();
    cache.refresh().await.unwrap();

    // No partial merge: the earlier workflows are gone.
    assert_eq!(cache.workflow_ids(), vec![WorkflowId::new("wf-c")]);
    assert!(cache.definition(&WorkflowId::new("wf-a")).is_none());
}

#[tokio::test]
async fn invalidate_forces_an_out_of_cycle_refresh() {
    let mut engine = MockEngine::new();
    engine
        .expect_get_workflow_overviews()
        .times(1)
        .returning(|| Ok(vec![overview("wf-a")]));
    engine
        .expect_get_workflow_definition()
        .returning(|id| Ok(definition(id.as_str())));

    let cache = WorkflowCache::new(Arc::new(engine));
    assert!(cache.overviews().is_empty());

    cache.invalidate().await;
    assert_eq!(cache.overviews().len(), 1);
}

#[tokio::test]
async fn scheduled_refresh_runs_in_the_background() {
    let mut engine = MockEngine::new();
    engine
        .expect_get_workflow_overviews()
        .returning(|| Ok(vec![overview("wf-a")]));
    engine
        .expect_get_workflow_definition()
        .returning(|id| Ok(definition(id.as_str())));

    let cache = Arc::new(WorkflowCache::new(Arc::new(engine)));
    let handle = cache.clone().schedule(Duration::from_millis(20));

    // The first tick fires immediately; give the task time to run it.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(cache.overviews().len(), 1);

    handle.abort();
}
