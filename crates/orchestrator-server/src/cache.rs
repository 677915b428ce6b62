//! Workflow metadata cache
//!
//! Holds a snapshot of workflow overviews and definitions so the hot path
//! never touches the engine. The snapshot is immutable and replaced wholesale
//! on every refresh; readers clone an `Arc` and never observe a partial
//! update. Refresh failures keep the previous snapshot.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use orchestrator_engine_client::{
    WorkflowDefinition, WorkflowEngineApi, WorkflowId, WorkflowOverview,
};

use crate::error::ServerResult;

/// Per-call policy for cache misses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// A miss is a NotFound; the cache is authoritative
    Strict,
    /// A miss falls through to one live fetch from the engine
    Fallback,
}

/// Immutable view of the cached workflow metadata
#[derive(Debug, Clone, Default)]
pub struct WorkflowSnapshot {
    pub overviews: Vec<WorkflowOverview>,
    pub definitions: HashMap<WorkflowId, WorkflowDefinition>,
}

/// Refreshing cache over the engine's workflow metadata
#[derive(Debug)]
pub struct WorkflowCache {
    engine: Arc<dyn WorkflowEngineApi>,

    /// Current snapshot; replaced wholesale, never mutated in place
    snapshot: RwLock<Arc<WorkflowSnapshot>>,
}

impl WorkflowCache {
    /// Create an empty cache over the given engine
    pub fn new(engine: Arc<dyn WorkflowEngineApi>) -> Self {
        Self {
            engine,
            snapshot: RwLock::new(Arc::new(WorkflowSnapshot::default())),
        }
    }

    /// Begin the recurring background refresh
    ///
    /// The first tick fires immediately, so the cache warms up at startup.
    /// Refresh failures are logged and retried on the next tick; they never
    /// clear the existing snapshot.
    pub fn schedule(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = self;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let Err(err) = cache.refresh().await {
                    warn!(?err, "Workflow cache refresh failed, keeping previous snapshot");
                }
            }
        })
    }

    /// Fetch the full overview and definition set and swap the snapshot
    pub async fn refresh(&self) -> ServerResult<()> {
        let overviews = self.engine.get_workflow_overviews().await?;

        let mut definitions = HashMap::with_capacity(overviews.len());
        for overview in &overviews {
            match self
                .engine
                .get_workflow_definition(&overview.workflow_id)
                .await
            {
                Ok(definition) => {
                    definitions.insert(overview.workflow_id.clone(), definition);
                }
                Err(err) => {
                    warn!(workflow_id = %overview.workflow_id, ?err,
                        "Failed to fetch definition during refresh, skipping workflow");
                }
            }
        }

        let next = Arc::new(WorkflowSnapshot {
            overviews,
            definitions,
        });

        let mut slot = self.snapshot.write().unwrap();
        *slot = next;
        drop(slot);

        debug!("Workflow cache refreshed");
        Ok(())
    }

    /// Force an out-of-cycle refresh, e.g. after a known mutation
    pub async fn invalidate(&self) {
        if let Err(err) = self.refresh().await {
            warn!(?err, "Forced workflow cache refresh failed, keeping previous snapshot");
        }
    }

    fn current(&self) -> Arc<WorkflowSnapshot> {
        self.snapshot.read().unwrap().clone()
    }

    /// Current overviews; empty before the first successful refresh
    pub fn overviews(&self) -> Vec<WorkflowOverview> {
        self.current().overviews.clone()
    }

    /// One overview from the snapshot
    pub fn overview(&self, id: &WorkflowId) -> Option<WorkflowOverview> {
        self.current()
            .overviews
            .iter()
            .find(|o| &o.workflow_id == id)
            .cloned()
    }

    /// One definition from the snapshot
    pub fn definition(&self, id: &WorkflowId) -> Option<WorkflowDefinition> {
        self.current().definitions.get(id).cloned()
    }

    /// Workflow ids present in the snapshot, overview order
    pub fn workflow_ids(&self) -> Vec<WorkflowId> {
        self.current()
            .overviews
            .iter()
            .map(|o| o.workflow_id.clone())
            .collect()
    }
}
