//!
//! Orchestrator gateway - versioned API in front of the external workflow engine
//!
//! This module exports all the components of the gateway.

use std::sync::Arc;
use std::time::Duration;

/// API module
pub mod api;

/// Audit trail module
pub mod audit;

/// Workflow metadata cache module
pub mod cache;

/// Configuration module
pub mod config;

/// Error module
pub mod error;

/// Dispatched operation table
pub mod operations;

/// Permission model and gate module
pub mod permissions;

/// Server module
pub mod server;

// Re-export key types
pub use audit::{AuditService, TracingAuditService};
pub use cache::{CachePolicy, WorkflowCache};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use permissions::{Credentials, PermissionGate, PermissionService};
pub use server::OrchestratorServer;

use orchestrator_engine_client::{HttpWorkflowEngine, InMemoryWorkflowEngine, WorkflowEngineApi};
use permissions::{AllowAllPermissionService, StaticPermissionService};

/// Run function
pub async fn run(config: ServerConfig) -> ServerResult<()> {
    // Initialize logging
    init_logging(&config);

    // Create dependencies
    let engine = create_engine_client(&config)?;
    let permission_service = create_permission_service(&config)?;
    let audit: Arc<dyn AuditService> = Arc::new(TracingAuditService);

    // Create and schedule the workflow cache
    let cache = Arc::new(WorkflowCache::new(engine.clone()));
    cache
        .clone()
        .schedule(Duration::from_secs(config.cache_refresh_interval_seconds));

    // Create server
    let server = OrchestratorServer::new(
        config,
        engine,
        cache,
        PermissionGate::new(permission_service),
        audit,
    );

    // Run server
    server.run().await
}

/// Initialize logging
fn init_logging(config: &ServerConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    // Create filter based on config
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // Initialize subscriber
    fmt().with_env_filter(filter).with_target(true).init();
}

/// Create the workflow engine client
pub fn create_engine_client(config: &ServerConfig) -> ServerResult<Arc<dyn WorkflowEngineApi>> {
    if config.engine_api_url.starts_with("memory://") {
        // Use the in-memory engine for development and testing
        tracing::info!("Using in-memory workflow engine");
        return Ok(Arc::new(InMemoryWorkflowEngine::new()));
    }

    if config.engine_api_url.starts_with("http://") || config.engine_api_url.starts_with("https://")
    {
        tracing::info!("Using workflow engine at {}", config.engine_api_url);
        return Ok(Arc::new(HttpWorkflowEngine::new(&config.engine_api_url)));
    }

    Err(ServerError::ConfigurationError(format!(
        "Unsupported engine API URL: {}",
        config.engine_api_url
    )))
}

/// Create the permission service
pub fn create_permission_service(
    config: &ServerConfig,
) -> ServerResult<Arc<dyn PermissionService>> {
    match &config.permissions_file {
        Some(path) => {
            tracing::info!("Loading permission grants from {}", path);
            Ok(Arc::new(StaticPermissionService::from_file(path)?))
        }
        None => {
            tracing::warn!("No permission grants file configured, allowing all requests");
            Ok(Arc::new(AllowAllPermissionService))
        }
    }
}
