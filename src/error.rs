use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::StageKind;

/// Failure reported by an external capability adapter.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("malformed response: {0}")] MalformedResponse(String),
    #[error("timed out after {0:?}")] Timeout(Duration),
    #[error("Other: {0}")] Other(String),
}

impl CapabilityError {
    /// Classify a failed request. The URL is dropped because it carries the API key.
    pub fn transport(e: reqwest::Error, limit: Duration) -> Self {
        if e.is_timeout() {
            CapabilityError::Timeout(limit)
        } else {
            CapabilityError::Http(e.without_url().to_string())
        }
    }
}

impl From<reqwest::Error> for CapabilityError {
    fn from(e: reqwest::Error) -> Self {
        CapabilityError::Http(e.without_url().to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")] Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")] Serialization(#[from] serde_json::Error),
}

/// Terminal errors of a pipeline run. Anything not listed here degrades the
/// record instead of failing it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{stage} stage unavailable: {source}")]
    UpstreamUnavailable {
        stage: &'static str,
        #[source]
        source: CapabilityError,
    },

    #[error("failed to persist generation record: {0}")]
    Persistence(#[from] StoreError),
}

impl PipelineError {
    pub fn upstream(stage: StageKind, source: CapabilityError) -> Self {
        PipelineError::UpstreamUnavailable { stage: stage.name(), source }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation_error",
            PipelineError::UpstreamUnavailable { .. } => "upstream_unavailable",
            PipelineError::Persistence(_) => "persistence_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let summary = match &self {
            PipelineError::Validation(_) => "Invalid request",
            PipelineError::UpstreamUnavailable { .. } => "Failed to generate content",
            PipelineError::Persistence(_) => "Failed to store generated content",
        };
        let body = json!({
            "error": summary,
            "kind": self.kind(),
            "details": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

/// Error body for the companion endpoints, same `{error, details}` shape.
pub fn error_response(status: StatusCode, error: &str, details: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": error, "details": details.to_string() }))).into_response()
}
