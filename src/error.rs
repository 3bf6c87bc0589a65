//! Unified scheduler error taxonomy.
//!
//! Every handler returns `Result<T, SchedulerError>`, which implements
//! [`axum::response::IntoResponse`] so each error kind is automatically
//! converted to its specified HTTP status code and a JSON body. 5xx
//! responses expose only a generic message plus the correlation id; the
//! full error (with internal details) is always logged first.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::registry::UnknownModelError;

/// All errors the admission layer and scheduler worker can produce.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulerError {
    /// The upload's MIME type (and extension fallback) is not in the audio
    /// allow-list.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// The upload exceeds the configured size limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// The requested `model` string does not resolve to a known spec.
    #[error(transparent)]
    UnknownModel(#[from] UnknownModelError),

    /// The request is infeasible given the effective capabilities (e.g. SRT
    /// output without timestamp support).
    #[error("infeasible request: {0}")]
    InfeasibleCapability(String),

    /// A request field was present but malformed (bad `output_format` /
    /// `response_format` combination, etc).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The bounded FIFO was full at enqueue time.
    #[error("queue is full (capacity {capacity})")]
    ServiceBusy { capacity: usize },

    /// Releasing the outgoing backend during a swap failed; the old backend
    /// is retained and the next Job proceeds on it.
    #[error("swap aborted: failed to release previous backend: {0}")]
    SwapAborted(String),

    /// Loading the incoming backend during a swap failed but the previous
    /// backend was successfully restored.
    #[error("failed to load backend: {0}")]
    LoadFailed(String),

    /// Both the swap and its recovery failed; the scheduler is now degraded
    /// and will fail fast until restart.
    #[error("engine unrecoverable: load failed ({load_err}); restore also failed ({restore_err})")]
    EngineUnrecoverable {
        load_err: String,
        restore_err: String,
    },

    /// The scheduler is sticky-degraded from a prior [`SchedulerError::EngineUnrecoverable`].
    #[error("service is degraded; restart required")]
    DegradedService,

    /// An unclassified backend failure during `transcribe`.
    #[error("backend error: {0}")]
    BackendInternal(String),

    /// The worker's result channel was dropped before publishing (should not
    /// happen in practice; surfaced as 500 if it ever does).
    #[error("internal scheduling error: {0}")]
    Internal(String),
}

impl SchedulerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnknownModel(_) | Self::InfeasibleCapability(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::ServiceBusy { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::SwapAborted(_)
            | Self::LoadFailed(_)
            | Self::EngineUnrecoverable { .. }
            | Self::DegradedService
            | Self::BackendInternal(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A short machine-readable code, independent of the HTTP status.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedMediaType(_) => "unsupported_media_type",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::UnknownModel(_) => "unknown_model",
            Self::InfeasibleCapability(_) => "infeasible_capability",
            Self::BadRequest(_) => "bad_request",
            Self::ServiceBusy { .. } => "service_busy",
            Self::SwapAborted(_) => "swap_aborted",
            Self::LoadFailed(_) => "load_failed",
            Self::EngineUnrecoverable { .. } => "engine_unrecoverable",
            Self::DegradedService => "degraded_service",
            Self::BackendInternal(_) => "backend_internal",
            Self::Internal(_) => "internal_error",
        }
    }

    fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }
}

/// A [`SchedulerError`] paired with the correlation id of the request that
/// produced it, so the JSON error body can echo `request_id` alongside the
/// `x-request-id` response header.
#[derive(Debug)]
pub struct ApiError {
    pub request_id: uuid::Uuid,
    pub source: SchedulerError,
}

impl ApiError {
    pub fn new(request_id: uuid::Uuid, source: impl Into<SchedulerError>) -> Self {
        Self {
            request_id,
            source: source.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.source.status();
        let code = self.source.code();

        // 4xx responses may carry precise, client-controllable details.
        // Among 5xx, ServiceBusy names no internal path or exception text --
        // its message ("queue is full...") is the whole point of the
        // response -- so it is exposed too; every other 5xx is logged in
        // full but only ever shows a generic message.
        let is_service_busy = matches!(self.source, SchedulerError::ServiceBusy { .. });
        let message = if self.source.is_client_error() || is_service_busy {
            if !self.source.is_client_error() {
                tracing::warn!(request_id = %self.request_id, "queue full, rejecting admission");
            }
            self.source.to_string()
        } else {
            tracing::error!(
                error = %self.source,
                code,
                request_id = %self.request_id,
                "scheduler error"
            );
            "an internal error occurred".to_string()
        };

        (
            status,
            Json(json!({
                "error": {
                    "message": message,
                    "code": code,
                    "request_id": self.request_id.to_string(),
                }
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn error_body(source: SchedulerError) -> serde_json::Value {
        let api_err = ApiError::new(uuid::Uuid::new_v4(), source);
        let response = api_err.into_response();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn service_busy_exposes_its_message() {
        let body = error_body(SchedulerError::ServiceBusy { capacity: 50 }).await;
        let message = body["error"]["message"].as_str().unwrap();
        assert!(message.contains("queue"), "message was: {message}");
        assert_eq!(body["error"]["code"], "service_busy");
    }

    #[tokio::test]
    async fn other_5xx_errors_hide_internal_detail() {
        let body = error_body(SchedulerError::BackendInternal("stack trace with /secret/path".into())).await;
        let message = body["error"]["message"].as_str().unwrap();
        assert_eq!(message, "an internal error occurred");
        assert!(!message.contains("secret"));
    }

    #[tokio::test]
    async fn client_errors_expose_precise_detail() {
        let body = error_body(SchedulerError::PayloadTooLarge("upload is 999 bytes; limit is 10 bytes".into())).await;
        assert_eq!(
            body["error"]["message"],
            "payload too large: upload is 999 bytes; limit is 10 bytes"
        );
    }
}
