//! Error types for the orchestrator gateway
//!
//! This module contains the error taxonomy used throughout the server.

use orchestrator_engine_client::EngineError;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Authorization denied
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Requested behavior the gateway does not support
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Workflow engine or workflow service call failed
    #[error("Engine error: {0}")]
    EngineError(String),

    /// Permission service failure (distinct from a DENY decision)
    #[error("Permission evaluation failed: {0}")]
    PermissionServiceError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    /// Stable error kind reported in audit events and error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::NotFound(_) => "NotFoundError",
            ServerError::Unauthorized(_) => "UnauthorizedError",
            ServerError::ValidationError(_) => "ValidationError",
            ServerError::NotImplemented(_) => "NotImplementedError",
            ServerError::EngineError(_) => "EngineError",
            ServerError::PermissionServiceError(_) => "PermissionServiceError",
            ServerError::ConfigurationError(_) => "ConfigurationError",
            ServerError::InternalError(_) => "InternalError",
        }
    }

    /// Check if the error is an authorization denial
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ServerError::Unauthorized(_))
    }
}

// Implement conversions from other error types
impl From<EngineError> for ServerError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::WorkflowNotFound(id) => ServerError::NotFound(format!("Workflow {}", id)),
            EngineError::InstanceNotFound(id) => {
                ServerError::NotFound(format!("Workflow instance {}", id))
            }
            _ => ServerError::EngineError(format!("{}", err)),
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::ValidationError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for ServerError {
    fn from(err: serde_yaml::Error) -> Self {
        ServerError::ConfigurationError(format!("YAML error: {}", err))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::InternalError(format!("IO error: {}", err))
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::InternalError(format!("Error: {}", err))
    }
}
