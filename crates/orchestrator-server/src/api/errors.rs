//! Error handling for the gateway API
//!
//! Maps the server error taxonomy onto HTTP statuses and the standardized
//! JSON error body. Every failure yields a structured body; there are no
//! partial 200 responses on failure paths.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::error::ServerError;

/// Build the standardized error response for a server error
pub fn api_error_response(err: &ServerError) -> axum::response::Response {
    let (status_code, error_code) = match err {
        ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "ERR_NOT_FOUND"),
        ServerError::Unauthorized(_) => (StatusCode::FORBIDDEN, "ERR_UNAUTHORIZED"),
        ServerError::ValidationError(_) => (StatusCode::BAD_REQUEST, "ERR_VALIDATION_ERROR"),
        ServerError::NotImplemented(_) => (StatusCode::NOT_IMPLEMENTED, "ERR_NOT_IMPLEMENTED"),
        ServerError::EngineError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ERR_ENGINE_ERROR"),
        ServerError::PermissionServiceError(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "ERR_PERMISSION_SERVICE")
        }
        ServerError::ConfigurationError(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "ERR_CONFIGURATION_ERROR")
        }
        ServerError::InternalError(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "ERR_INTERNAL_SERVER_ERROR")
        }
    };

    let message = err.to_string();
    let body = Json(json!({
        "error": &message,
        "message": &message,
        "errorDetails": {
            "errorCode": error_code,
            "errorMessage": &message,
        }
    }));

    (status_code, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_documented_statuses() {
        let cases = [
            (ServerError::ValidationError("bad".into()), StatusCode::BAD_REQUEST),
            (ServerError::Unauthorized("no".into()), StatusCode::FORBIDDEN),
            (ServerError::NotFound("Workflow wf-a".into()), StatusCode::NOT_FOUND),
            (ServerError::NotImplemented("later".into()), StatusCode::NOT_IMPLEMENTED),
            (ServerError::EngineError("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ServerError::InternalError("bug".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let response = api_error_response(&err);
            assert_eq!(response.status(), expected, "{:?}", err);
        }
    }
}
