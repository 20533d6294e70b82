use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::error::Error as StdError;

#[derive(Debug)]
pub enum AppError {
    EmptyPrompt,
    BadRequest(String),
    Configuration(String),
    External(String),
    Timeout(String),
    ServiceUnavailable(String),
    Persistence(String),
    Serialization(String),
    Internal(String),
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    error_type: String,
    code: u16,
}

impl AppError {
    fn error_type(&self) -> &'static str {
        match self {
            AppError::EmptyPrompt => "empty_prompt",
            AppError::BadRequest(_) => "bad_request",
            AppError::Configuration(_) => "configuration_error",
            AppError::External(_) => "external_service_error",
            AppError::Timeout(_) => "timeout",
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::Persistence(_) => "persistence_error",
            AppError::Serialization(_) => "serialization_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Message safe to hand back to the caller. Internal failure detail stays in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Configuration(_)
            | AppError::Persistence(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::EmptyPrompt => write!(f, "Prompt cannot be empty"),
            AppError::BadRequest(e) => write!(f, "Bad request: {}", e),
            AppError::Configuration(e) => write!(f, "Configuration error: {}", e),
            AppError::External(e) => write!(f, "External service error: {}", e),
            AppError::Timeout(e) => write!(f, "Timed out: {}", e),
            AppError::ServiceUnavailable(e) => write!(f, "Service unavailable: {}", e),
            AppError::Persistence(e) => write!(f, "Persistence error: {}", e),
            AppError::Serialization(e) => write!(f, "Serialization error: {}", e),
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl StdError for AppError {}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            log::error!("Request failed: {}", self);
        }

        let error_response = ErrorResponse {
            error: self.public_message(),
            error_type: self.error_type().to_string(),
            code: status_code.as_u16(),
        };

        HttpResponse::build(status_code).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::EmptyPrompt => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::External(_) => StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Serialization(format!("JSON deserialization/serialization error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            AppError::Timeout(format!("Upstream request timed out: {}", error))
        } else {
            AppError::External(error.to_string())
        }
    }
}

// Define AppResult type alias for Result<T, AppError>
pub type AppResult<T> = Result<T, AppError>;
