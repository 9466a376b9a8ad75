//! Handler functions and their registrations.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::HeaderMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use keel_compiler::{HandlerDescriptor, HttpMethod, RouteProps};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::AppContext;
use crate::error::ApiError;
use crate::response::ApiResponse;

/// An incoming request as a handler sees it.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub method: HttpMethod,
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    /// Parsed JSON body, `Null` when the request had none.
    pub body: Value,
    /// Token payload attached by the auth plugin.
    pub user: Option<Value>,
}

impl HandlerRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: HashMap::new(),
            query: HashMap::new(),
            headers: HeaderMap::new(),
            body: Value::Null,
            user: None,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Deserializes the body, answering 400 when it does not fit `T`.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(self.body.clone()).map_err(|e| ApiError::bad_request(e.to_string()))
    }
}

/// Everything a handler is called with.
#[derive(Debug, Clone)]
pub struct HandlerArgs {
    pub req: HandlerRequest,
    pub ctx: Arc<AppContext>,
    /// Id of the plugin that added the route, if any.
    pub origin: Option<String>,
}

pub type HandlerResult = Result<ApiResponse, ApiError>;

pub type HandlerFn = Arc<dyn Fn(HandlerArgs) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Wraps an async function as a [`HandlerFn`].
///
/// ```rust,ignore
/// let get_car = handler(|args: HandlerArgs| async move {
///     Ok(ApiResponse::data(json!({ "model": "Volvo" })))
/// });
/// ```
pub fn handler<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HandlerArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |args| f(args).boxed())
}

/// A handler together with its route metadata.
#[derive(Clone)]
pub struct HandlerRegistration {
    /// Handler name, the base name of its module (`GetCar`).
    pub name: String,
    pub route: RouteProps,
    /// Method implied by the name prefix, used when `route.method` is unset.
    pub assumed_http_method: Option<HttpMethod>,
    pub req_schema: Option<String>,
    pub res_schema: Option<String>,
    pub origin: Option<String>,
    pub handler: HandlerFn,
}

impl fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("name", &self.name)
            .field("route", &self.route)
            .field("assumed_http_method", &self.assumed_http_method)
            .field("req_schema", &self.req_schema)
            .field("res_schema", &self.res_schema)
            .field("origin", &self.origin)
            .finish()
    }
}

impl HandlerRegistration {
    pub fn new(name: impl Into<String>, handler: HandlerFn) -> Self {
        let name = name.into();
        Self {
            assumed_http_method: HttpMethod::from_file_prefix(&name),
            name,
            route: RouteProps::default(),
            req_schema: None,
            res_schema: None,
            origin: None,
            handler,
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.route.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.route.path = Some(path.into());
        self
    }

    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.route.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn req_schema(mut self, name: impl Into<String>) -> Self {
        self.req_schema = Some(name.into());
        self
    }

    pub fn res_schema(mut self, name: impl Into<String>) -> Self {
        self.res_schema = Some(name.into());
        self
    }

    pub fn mock_api(mut self, enabled: bool) -> Self {
        self.route.mock_api = enabled;
        self
    }

    pub fn origin(mut self, plugin_id: impl Into<String>) -> Self {
        self.origin = Some(plugin_id.into());
        self
    }

    pub fn resolved_method(&self) -> Option<HttpMethod> {
        self.route.method.or(self.assumed_http_method)
    }

    /// Takes route metadata and schema names from a build manifest entry.
    pub fn apply_descriptor(&mut self, descriptor: &HandlerDescriptor) {
        if let Some(route) = &descriptor.route {
            self.route = route.clone();
        }
        self.assumed_http_method = descriptor.assumed_http_method.or(self.assumed_http_method);
        self.req_schema = descriptor.req_schema.clone();
        self.res_schema = descriptor.res_schema.clone();
    }
}
