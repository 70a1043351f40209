// HTTP-facing error for the portal routes
use axum::{response::IntoResponse, http::StatusCode, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError { 
        message: String, 
        field_errors: Option<HashMap<String, String>> 
    },

    // 401 Unauthorized  
    Unauthorized(String),
    
    // 404 Not Found
    NotFound(String),
    
    // 422 Unprocessable Entity (validation but semantically valid JSON)
    UnprocessableEntity { 
        message: String, 
        field_errors: HashMap<String, String> 
    },
    
    // 500 Internal Server Error
    InternalServerError(String),
    
    // 502 Bad Gateway (external service issues)
    BadGateway(String),
    
    // 503 Service Unavailable  
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::NotFound(_) => 404,
            ApiError::UnprocessableEntity { .. } => 422,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }
    
    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::UnprocessableEntity { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }
    
    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError { message, field_errors } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_ERROR"
                });
                
                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }
                
                response
            }
            ApiError::UnprocessableEntity { message, field_errors } => {
                json!({
                    "error": true,
                    "message": message,
                    "code": "UNPROCESSABLE_ENTITY",
                    "field_errors": field_errors
                })
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }
    
    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED", 
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::UnprocessableEntity { .. } => "UNPROCESSABLE_ENTITY",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

// Constructors
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }
    
    pub fn validation_error(
        message: impl Into<String>, 
        field_errors: Option<HashMap<String, String>>
    ) -> Self {
        ApiError::ValidationError { 
            message: message.into(), 
            field_errors 
        }
    }
    
    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }
    
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
    
    pub fn unprocessable_entity(
        message: impl Into<String>, 
        field_errors: HashMap<String, String>
    ) -> Self {
        ApiError::UnprocessableEntity { 
            message: message.into(), 
            field_errors 
        }
    }
    
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
    
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }
    
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert layer errors to ApiError
impl From<crate::services::BackendError> for ApiError {
    fn from(err: crate::services::BackendError) -> Self {
        use crate::services::BackendError;
        match err {
            BackendError::NotFound(msg) => ApiError::not_found(msg),
            BackendError::Timeout(method) => {
                tracing::error!("Backend timeout: {}", method);
                ApiError::service_unavailable("Backend service timed out, please try again")
            }
            BackendError::Transport(msg) => {
                tracing::error!("Backend transport error: {}", msg);
                ApiError::service_unavailable("Backend service temporarily unavailable")
            }
            BackendError::Status { method, status, message } => {
                // Don't expose backend internals to clients
                tracing::error!("Backend {} returned {}: {}", method, status, message);
                ApiError::bad_gateway(format!("Backend {} failed", method))
            }
            BackendError::Decode { method, message } => {
                tracing::error!("Backend {} sent an unreadable response: {}", method, message);
                ApiError::bad_gateway(format!("Backend {} failed", method))
            }
            BackendError::Config(msg) => {
                tracing::error!("Backend configuration error: {}", msg);
                ApiError::internal_server_error("Service is misconfigured")
            }
        }
    }
}

impl From<crate::commission::ValidationErrors> for ApiError {
    fn from(err: crate::commission::ValidationErrors) -> Self {
        let field_errors: HashMap<String, String> = err.field_errors().into_iter().collect();
        ApiError::validation_error(err.to_string(), Some(field_errors))
    }
}

impl From<crate::commission::FormError> for ApiError {
    fn from(err: crate::commission::FormError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<crate::commission::MatrixError> for ApiError {
    fn from(err: crate::commission::MatrixError) -> Self {
        use crate::commission::MatrixError;
        match err {
            MatrixError::InvalidPrefix(_) => ApiError::bad_request(err.to_string()),
            // Empty partner directory is an upstream condition, not a client mistake
            _ => ApiError::unprocessable_entity(err.to_string(), HashMap::new()),
        }
    }
}

impl From<crate::services::ReconcileError> for ApiError {
    fn from(err: crate::services::ReconcileError) -> Self {
        use crate::services::ReconcileError;
        match err {
            ReconcileError::Backend(e) => e.into(),
            ReconcileError::Matrix(e) => e.into(),
            ReconcileError::Form(e) => e.into(),
            ReconcileError::Validation(e) => e.into(),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
