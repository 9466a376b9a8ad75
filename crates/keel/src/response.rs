//! The JSON envelope every route responds with.
//!
//! ```json
//! { "status": 200, "data": { ... } }
//! { "status": 404, "error": { "id": "...", "title": "Not Found", "detail": "...", "code": "notFound" } }
//! ```

use std::collections::BTreeMap;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;

/// Response envelope.
///
/// Handlers may leave `status` unset, dispatch resolves it to 200.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

/// The `error` member of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Correlation id, also written to the server log.
    pub id: String,
    pub title: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiResponse {
    /// A successful response carrying `data`.
    ///
    /// A value that does not serialize to JSON is logged and sent as `null`;
    /// use [`ApiResponse::try_data`] to handle the failure instead.
    pub fn data(data: impl Serialize) -> Self {
        let data = serde_json::to_value(data).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "response data did not serialize, sending null");
            Value::Null
        });
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Like [`ApiResponse::data`], but a serialization failure becomes an
    /// internal error the handler can return with `?`.
    pub fn try_data(data: impl Serialize) -> Result<Self, ApiError> {
        Ok(Self {
            data: Some(serde_json::to_value(data)?),
            ..Self::default()
        })
    }

    pub fn error(status: u16, title: &str, detail: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            error: Some(ErrorBody {
                id: Uuid::new_v4().to_string(),
                title: title.to_string(),
                detail: detail.into(),
                code: None,
            }),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: &str) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.code = Some(code.to_string());
        }
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Status with the 200 default applied.
    pub fn resolved_status(&self) -> u16 {
        self.status.unwrap_or(200)
    }

    /// True for a 4xx/5xx envelope that carries an error object.
    pub fn is_error(&self) -> bool {
        self.error.is_some() && (400..600).contains(&self.resolved_status())
    }

    /// Correlation id of the error, if any.
    pub fn error_id(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.id.as_str())
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(mut self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.resolved_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.status = Some(status.as_u16());

        let mut response = (status, Json(&self)).into_response();
        if let Some(headers) = &self.headers {
            for (name, value) in headers {
                match (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
                    (Ok(name), Ok(value)) => {
                        response.headers_mut().insert(name, value);
                    }
                    _ => tracing::warn!(header = %name, "dropping invalid response header"),
                }
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_omits_empty_members() {
        let response = ApiResponse::data(json!({ "model": "Volvo" })).with_status(200);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "status": 200, "data": { "model": "Volvo" } })
        );
    }

    #[test]
    fn test_unserializable_data() {
        let mut bad = BTreeMap::new();
        bad.insert(vec![1u8], 1);

        assert_eq!(ApiResponse::data(&bad).data, Some(Value::Null));
        assert!(matches!(ApiResponse::try_data(&bad), Err(ApiError::Internal(_))));
        assert_eq!(
            ApiResponse::try_data(json!({ "model": "Volvo" })).unwrap().data,
            Some(json!({ "model": "Volvo" }))
        );
    }

    #[test]
    fn test_is_error_requires_error_status() {
        assert!(ApiResponse::error(404, "Not Found", "x").is_error());
        assert!(!ApiResponse::error(200, "Odd", "x").is_error());
        assert!(!ApiResponse::data(1).is_error());
    }

    #[test]
    fn test_into_response_applies_status_and_headers() {
        let response = ApiResponse::data("ok").with_status(201).with_header("x-car", "volvo").into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-car"], "volvo");
    }
}
