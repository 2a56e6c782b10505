use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorBody;
use crate::normalizer::ValidationError;

pub const INVALID_INPUT: &str = "Invalid or empty input data";
pub const PREDICTION_FAILED: &str = "Prediction failed";
pub const PARSE_FAILED: &str = "Failed to parse prediction result";
pub const SERVER_ERROR: &str = "Server error during prediction";
pub const TIMED_OUT: &str = "Prediction timed out";
pub const BODY_TOO_LARGE: &str = "Request body too large";

/// Failures of a single engine invocation.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to start engine `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for engine: {0}")]
    Io(#[source] std::io::Error),

    #[error("failed to encode engine argument: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("engine failed (exit code {exit_code:?}): {diagnostics}")]
    Failure {
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("engine result is malformed: {reason}")]
    Malformed { reason: String, output: String },

    #[error("engine did not finish within {0:?}")]
    Timeout(Duration),
}

impl EngineError {
    /// True when the engine never ran: an environment or configuration fault.
    pub fn is_dispatch_failure(&self) -> bool {
        matches!(
            self,
            EngineError::Spawn { .. } | EngineError::Io(_) | EngineError::Encode(_)
        )
    }
}

/// Everything `/predict` can answer with besides a prediction.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The body could not be read, e.g. it exceeded the configured limit.
    #[error("unreadable request body: {reason}")]
    Body { status: StatusCode, reason: String },
}

impl From<actix_web::Error> for ApiError {
    fn from(e: actix_web::Error) -> Self {
        ApiError::Body {
            status: e.as_response_error().status_code(),
            reason: e.to_string(),
        }
    }
}

impl ApiError {
    pub fn body(&self) -> ErrorBody {
        match self {
            ApiError::Validation(ValidationError::EmptyPayload) => ErrorBody::new(INVALID_INPUT),
            ApiError::Validation(e) => ErrorBody::with_details(INVALID_INPUT, e.to_string()),
            ApiError::Engine(EngineError::Failure { diagnostics, .. }) => {
                ErrorBody::with_details(PREDICTION_FAILED, diagnostics.as_str())
            }
            ApiError::Engine(EngineError::Malformed { .. }) => ErrorBody::new(PARSE_FAILED),
            ApiError::Engine(EngineError::Timeout(_)) => ErrorBody::new(TIMED_OUT),
            ApiError::Engine(_) => ErrorBody::new(SERVER_ERROR),
            ApiError::Body { status, .. } if *status == StatusCode::PAYLOAD_TOO_LARGE => {
                ErrorBody::new(BODY_TOO_LARGE)
            }
            ApiError::Body { .. } => ErrorBody::new(INVALID_INPUT),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(EngineError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Body { status, .. } => *status,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self.body())
    }
}
