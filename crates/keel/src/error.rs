//! Error types for the runtime.
//!
//! Two families:
//!
//! - [`Error`]: startup and configuration failures. These abort
//!   [`App::start`](crate::App::start).
//! - [`ApiError`]: what a handler returns when a request fails. An
//!   [`ApiError::Http`] carries a ready-made envelope that is relayed as is,
//!   anything else becomes a sanitized 500.

use std::path::PathBuf;

use keel_compiler::HttpMethod;

use crate::db::StoreError;
use crate::jobs::JobError;
use crate::response::ApiResponse;

/// Result type for runtime setup.
pub type Result<T> = std::result::Result<T, Error>;

/// Startup and configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("plugin id `{0}` is registered more than once")]
    DuplicatePlugin(String),

    #[error("duplicate route {method} {path}")]
    DuplicateRoute { method: HttpMethod, path: String },

    #[error("routing is closed, cannot add handler `{handler}`")]
    RoutingClosed { handler: String },

    #[error("handler `{handler}` has no HTTP method")]
    MissingMethod { handler: String },

    #[error("handler `{handler}` has no path")]
    MissingPath { handler: String },

    #[error("route {method} {path} requires permissions but no auth plugin is configured")]
    MissingAuthPlugin { method: HttpMethod, path: String },

    #[error("handler `{handler}` references unknown schema `{name}`")]
    UnknownSchema { name: String, handler: String },

    #[error("schema `{name}` does not compile: {message}")]
    InvalidSchema { name: String, message: String },

    #[error("plugin `{id}` failed to initialize: {source}")]
    PluginInit {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot {action} while the app is {state}")]
    InvalidState { action: &'static str, state: String },

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("http server: {0}")]
    Server(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Io {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// A failed request, as returned by a handler.
#[derive(Debug)]
pub enum ApiError {
    /// A complete error envelope. Relayed verbatim when its status is 4xx or
    /// 5xx, otherwise treated like [`ApiError::Internal`].
    Http(ApiResponse),
    /// Anything else. Logged server side, the client gets a generic 500.
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn http(status: u16, title: &str, detail: impl Into<String>, code: &str) -> Self {
        ApiError::Http(ApiResponse::error(status, title, detail).with_code(code))
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::http(400, "Bad Request", detail, "badRequest")
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::http(401, "Unauthorized", detail, "unauthorized")
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::http(403, "Forbidden", detail, "forbidden")
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::http(404, "Not Found", detail, "notFound")
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::http(409, "Conflict", detail, "conflict")
    }

    pub fn internal_server_error(detail: impl Into<String>) -> Self {
        Self::http(500, "Internal Server Error", detail, "internalServerError")
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        ApiError::Internal(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_build_error_envelopes() {
        let ApiError::Http(response) = ApiError::not_found("no car") else {
            panic!("expected http error");
        };
        assert_eq!(response.status, Some(404));
        let error = response.error.unwrap();
        assert_eq!(error.title, "Not Found");
        assert_eq!(error.detail, "no car");
        assert_eq!(error.code.as_deref(), Some("notFound"));
        assert!(!error.id.is_empty());
    }

    #[test]
    fn test_question_mark_wraps_foreign_errors() {
        fn parse(input: &str) -> std::result::Result<u32, ApiError> {
            Ok(input.parse::<u32>()?)
        }
        assert!(matches!(parse("x"), Err(ApiError::Internal(_))));
    }
}
