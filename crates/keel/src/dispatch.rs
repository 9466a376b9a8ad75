//! Per-request dispatch.
//!
//! Every request to a registered route goes through [`dispatch`], which runs
//! these steps strictly in order:
//!
//! 1. Permission check through the auth plugin (401 on failure)
//! 2. Body parsing (400 on malformed JSON) and validation (400 with the
//!    violation list)
//! 3. Mock short-circuit, when the route asks for it and it is allowed
//! 4. The handler itself, with panics caught
//! 5. Error mapping: HTTP errors relayed, everything else a sanitized 500
//! 6. Response payload validation (500, the handler broke its contract)
//! 7. Status resolution, 200 unless the handler chose another

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use keel_compiler::HttpMethod;
use serde_json::json;

use crate::auth::AuthPlugin;
use crate::context::AppContext;
use crate::error::ApiError;
use crate::handler::{HandlerArgs, HandlerFn, HandlerRequest};
use crate::mock;
use crate::response::ApiResponse;
use crate::schema::{SchemaStore, SchemaViolation};

pub const CODE_REQUEST_SCHEMA: &str = "badRequest";
pub const CODE_INVALID_JSON: &str = "invalidJson";
pub const CODE_RESPONSE_SCHEMA: &str = "responseSchemaViolation";
pub const CODE_INTERNAL: &str = "internalServerError";

/// A live route. Built once at startup, immutable afterwards.
pub struct Route {
    pub name: String,
    pub method: HttpMethod,
    pub path: String,
    pub permissions: Vec<String>,
    pub req_schema: Option<String>,
    pub res_schema: Option<String>,
    pub mock_api: bool,
    pub origin: Option<String>,
    pub handler: HandlerFn,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("permissions", &self.permissions)
            .field("req_schema", &self.req_schema)
            .field("res_schema", &self.res_schema)
            .field("mock_api", &self.mock_api)
            .finish()
    }
}

/// State shared by every route.
pub struct Runtime {
    pub ctx: Arc<AppContext>,
    pub schemas: Arc<SchemaStore>,
    pub auth: Option<Arc<dyn AuthPlugin>>,
    pub mock_api_allowed: bool,
}

/// Runs `req` through the route. `body` is the raw request body; it is only
/// parsed once the caller has passed the permission check.
pub async fn dispatch(route: &Route, runtime: &Runtime, mut req: HandlerRequest, body: &[u8]) -> ApiResponse {
    // 1
    if !route.permissions.is_empty() {
        let authenticated = match &runtime.auth {
            Some(auth) => auth.authenticate(&mut req, &route.permissions).await,
            None => false,
        };
        if !authenticated {
            return ApiResponse::error(401, "Unauthorized", "Missing or insufficient credentials")
                .with_code("unauthorized");
        }
    }

    // 2
    if !body.is_empty() {
        match serde_json::from_slice(body) {
            Ok(parsed) => req.body = parsed,
            Err(err) => {
                return ApiResponse::error(400, "Bad Request", format!("Invalid JSON body: {}", err))
                    .with_code(CODE_INVALID_JSON)
            }
        }
    }
    if let Some(schema) = &route.req_schema {
        match runtime.schemas.validate(schema, &req.body) {
            Ok(violations) if violations.is_empty() => {}
            Ok(violations) => {
                let response = ApiResponse::error(
                    400,
                    "Bad Request",
                    format!("Schema did not validate {}", violations_json(&violations)),
                )
                .with_code(CODE_REQUEST_SCHEMA);
                tracing::debug!(
                    route = %route.name,
                    id = response.error_id().unwrap_or_default(),
                    "request body rejected"
                );
                return response;
            }
            Err(err) => return internal_error(route, &err.to_string()),
        }
    }

    // 3
    if route.mock_api {
        if let Some(schema) = &route.res_schema {
            if runtime.mock_api_allowed {
                let data = mock::generate(&json!({ "$ref": format!("#/definitions/{}", schema) }), runtime.schemas.definitions());
                return ApiResponse::data(data).with_status(200);
            }
            tracing::warn!(route = %route.name, "mock responses are disabled in production");
        }
    }

    // 4
    let args = HandlerArgs {
        req,
        ctx: Arc::clone(&runtime.ctx),
        origin: route.origin.clone(),
    };
    let outcome = AssertUnwindSafe((route.handler)(args)).catch_unwind().await;

    // 5
    let mut response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(ApiError::Http(response))) if response.is_error() => return response,
        Ok(Err(ApiError::Http(response))) => {
            return internal_error(route, &format!("handler returned a non-error envelope as error: {:?}", response));
        }
        Ok(Err(ApiError::Internal(err))) => return internal_error(route, &format!("{:#}", err)),
        Err(panic) => return internal_error(route, &panic_message(panic.as_ref())),
    };

    // 6
    if let Some(schema) = &route.res_schema {
        if !response.is_error() {
            let payload = response.data.clone().unwrap_or(serde_json::Value::Null);
            match runtime.schemas.validate(schema, &payload) {
                Ok(violations) if violations.is_empty() => {}
                Ok(violations) => {
                    let response = ApiResponse::error(
                        500,
                        "Internal Server Error",
                        "Response did not match its declared schema",
                    )
                    .with_code(CODE_RESPONSE_SCHEMA);
                    tracing::error!(
                        route = %route.name,
                        id = response.error_id().unwrap_or_default(),
                        violations = %violations_json(&violations),
                        "handler response violates its schema"
                    );
                    return response;
                }
                Err(err) => return internal_error(route, &err.to_string()),
            }
        }
    }

    // 7
    response.status = Some(response.resolved_status());
    response
}

fn internal_error(route: &Route, message: &str) -> ApiResponse {
    let response = ApiResponse::error(500, "Internal Server Error", "Something went wrong").with_code(CODE_INTERNAL);
    tracing::error!(
        route = %route.name,
        id = response.error_id().unwrap_or_default(),
        error = message,
        "handler failed"
    );
    response
}

fn violations_json(violations: &[SchemaViolation]) -> String {
    serde_json::to_string(violations).unwrap_or_default()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic".to_string()
    }
}
