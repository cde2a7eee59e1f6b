use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use inforest_coordinator::{CoordinatorError, ErrorKind};
use inforest_types::wire::ErrorResponse;
use inforest_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TypeError> for ServerError {
    fn from(err: TypeError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

/// HTTP status for a coordinator error category.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Invalid => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidIdentity => StatusCode::UNAUTHORIZED,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Internal | ErrorKind::Quarantine => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Coordinator(err) => status_for(err.kind()),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The JSON body sent to the client.
    pub fn body(&self) -> ErrorResponse {
        match self {
            Self::Coordinator(err) => ErrorResponse {
                code: err.kind().code().to_string(),
                message: err.to_string(),
                partial: err.is_partial(),
                quarantine: err.is_quarantine(),
            },
            Self::BadRequest(msg) => ErrorResponse {
                code: ErrorKind::Invalid.code().to_string(),
                message: msg.clone(),
                ..ErrorResponse::default()
            },
            other => ErrorResponse {
                code: ErrorKind::Internal.code().to_string(),
                message: other.to_string(),
                ..ErrorResponse::default()
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Coordinator(err) = &self {
            if let Some(report) = err.quarantine_report() {
                tracing::error!(
                    operation = %report.operation,
                    subject = %report.subject,
                    failures = report.failures.len(),
                    "request left stores diverged: {report}"
                );
            } else if status.is_server_error() {
                tracing::warn!(error = %err, "request failed");
            }
        }
        (status, Json(self.body())).into_response()
    }
}
