use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docchat_core::{ChainError, SessionError};
use docchat_memory::document::DocumentError;
use serde::Serialize;
use thiserror::Error;

/// Text the chat page shows when Process is pressed without a key.
pub const MISSING_KEY_MESSAGE: &str = "Please add your OpenAI API key to continue.";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// Failure of a single API request, rendered as `{error, message}`.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub(crate) fn unknown_session(id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "unknown_session",
            format!("no session with id {id}"),
        )
    }

    pub(crate) fn internal(e: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string())
    }

    #[cfg(test)]
    pub(crate) fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, "{}", self.message);
        } else {
            tracing::debug!(code = self.code, "{}", self.message);
        }
        let body = ErrorBody {
            error: self.code,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::new(e.status(), "bad_upload", e.body_text())
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::MissingCredential => Self::new(
                StatusCode::BAD_REQUEST,
                "missing_credential",
                MISSING_KEY_MESSAGE,
            ),
            SessionError::InvalidCredential(_) => {
                Self::new(StatusCode::UNAUTHORIZED, "invalid_credential", e.to_string())
            }
            SessionError::NotReady => Self::new(StatusCode::CONFLICT, "not_ready", e.to_string()),
            SessionError::EmptyQuestion => {
                Self::new(StatusCode::BAD_REQUEST, "empty_question", e.to_string())
            }
            SessionError::NothingToIndex { .. } => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "nothing_to_index",
                e.to_string(),
            ),
            SessionError::Chain(ChainError::Llm(_))
            | SessionError::Document(DocumentError::Embedding(_)) => {
                Self::new(StatusCode::BAD_GATEWAY, "upstream", e.to_string())
            }
            other => Self::internal(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use docchat_llm::LlmError;

    use super::*;

    #[test]
    fn session_errors_map_to_statuses() {
        let cases = [
            (SessionError::MissingCredential, StatusCode::BAD_REQUEST),
            (
                SessionError::InvalidCredential(LlmError::Unauthorized {
                    provider: "openai".into(),
                }),
                StatusCode::UNAUTHORIZED,
            ),
            (SessionError::NotReady, StatusCode::CONFLICT),
            (
                SessionError::NothingToIndex {
                    skipped: Vec::new(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                SessionError::Chain(ChainError::Llm(LlmError::Other("boom".into()))),
                StatusCode::BAD_GATEWAY,
            ),
            (
                SessionError::Document(DocumentError::Embedding(LlmError::RateLimited)),
                StatusCode::BAD_GATEWAY,
            ),
            (
                SessionError::Document(DocumentError::Tokenizer("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn missing_key_message_is_user_facing() {
        let err = ApiError::from(SessionError::MissingCredential);
        assert_eq!(err.message, MISSING_KEY_MESSAGE);
        assert_eq!(err.code, "missing_credential");
    }
}
