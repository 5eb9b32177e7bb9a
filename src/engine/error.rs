use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use strum::Display;

use crate::engine::lifecycle::Transition;
use crate::model::request::RequestStatus;

/// Which authorization axis turned a caller away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AuthzAxis {
    Role,
    Permission,
}

/// Everything a transition can fail with. The first four variants are
/// resolved locally, before any store call; the rest originate from the
/// remote store and are surfaced verbatim. No variant triggers a retry here;
/// retry policy belongs to the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("transition {transition} is not allowed from status {from}")]
    InvalidTransition {
        transition: Transition,
        from: RequestStatus,
    },

    #[error("{axis} check failed for transition {transition}")]
    Unauthorized {
        axis: AuthzAxis,
        transition: Transition,
    },

    #[error("reject requires a non-empty comment")]
    MissingComment,

    #[error("request {0} changed underneath the caller")]
    Conflict(u64),

    #[error("conversion of home-visit request {0} failed; the original request was not altered")]
    ConversionFailed(u64),

    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("request {0} not found")]
    NotFound(u64),
}

impl ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Validation(_)
            | EngineError::MissingComment
            | EngineError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            EngineError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Transient(_) => StatusCode::BAD_GATEWAY,
            EngineError::ConversionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string()
        }))
    }
}
