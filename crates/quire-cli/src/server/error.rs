use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use quire_core::error::{Error as CoreError, ErrorCode};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinError;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("malformed request: {0}")]
    MalformedPayload(String),

    #[error("request worker failed: {0}")]
    Worker(#[from] JoinError),
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    error: Body<'a>,
}

#[derive(Debug, Serialize)]
struct Body<'a> {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<Field<'a>>,
}

#[derive(Debug, Serialize)]
struct Field<'a> {
    field: &'static str,
    reason: &'a str,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedPayload(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::MalformedPayload(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::MalformedPayload(rejection.body_text())
    }
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Core(err) => match err {
                CoreError::Validation(_) | CoreError::InvalidReference(_) => {
                    StatusCode::BAD_REQUEST
                }
                CoreError::Unauthorized => StatusCode::UNAUTHORIZED,
                CoreError::Forbidden(_) | CoreError::CommentsClosed(_) => StatusCode::FORBIDDEN,
                CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                CoreError::InvalidTransition(_) => StatusCode::CONFLICT,
                CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Core(err) => err.code(),
            Self::MalformedPayload(_) => ErrorCode::ValidationFailed,
            Self::Worker(_) => ErrorCode::InternalUnexpected,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        // Internal detail stays in the log.
        let message = if status.is_server_error() {
            error!(error = %self, code = code.code(), "request failed");
            code.message().to_string()
        } else {
            self.to_string()
        };

        let fields = match &self {
            Self::Core(err) => err
                .fields()
                .iter()
                .map(|f| Field {
                    field: f.field,
                    reason: &f.reason,
                })
                .collect(),
            _ => Vec::new(),
        };

        let body = Envelope {
            error: Body {
                code: code.code(),
                message,
                fields,
            },
        };
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
