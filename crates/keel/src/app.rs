//! # Application
//!
//! [`App`] drives startup through a fixed sequence of states:
//!
//! ```text
//! Constructed ─► DbInitialized ─► ContextBuilt ─► RoutingOpen ─► Serving
//! ```
//!
//! - **DbInitialized**: the configured database is connected. Failure is fatal.
//! - **ContextBuilt**: plugin contexts and repositories are composed into one
//!   [`AppContext`].
//! - **RoutingOpen**: plugin `init` hooks run, then every registered handler
//!   becomes a route and every job is scheduled.
//! - **Serving**: routing is frozen behind a catch-all 404 and the HTTP
//!   listener is up (unless disabled).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, Uri};
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;
use keel_compiler::HttpMethod;
use serde_json::Value;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AuthPlugin;
use crate::config::AppOptions;
use crate::context::{AppContext, SharedAny};
use crate::db::Database;
use crate::dispatch::{dispatch, Route, Runtime};
use crate::error::{Error, Result};
use crate::handler::{HandlerRegistration, HandlerRequest};
use crate::jobs::{JobError, JobScheduler};
use crate::plugin::{Plugin, PluginDb};
use crate::registry::{load_manifest, RepoRegistration, Registry};
use crate::response::ApiResponse;
use crate::schema::SchemaStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AppState {
    Constructed,
    DbInitialized,
    ContextBuilt,
    RoutingOpen,
    Serving,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppState::Constructed => "constructed",
            AppState::DbInitialized => "db-initialized",
            AppState::ContextBuilt => "context-built",
            AppState::RoutingOpen => "routing-open",
            AppState::Serving => "serving",
        };
        f.write_str(name)
    }
}

pub struct App {
    options: AppOptions,
    registry: Registry,
    plugins: Vec<Arc<dyn Plugin>>,
    auth: Option<Arc<dyn AuthPlugin>>,
    schemas: Arc<SchemaStore>,
    state: AppState,
    db: Option<Database>,
    ctx: Option<Arc<AppContext>>,
    routes: Vec<Arc<Route>>,
    route_keys: HashSet<(HttpMethod, String)>,
    scheduler: Option<JobScheduler>,
    router: Option<Router>,
    local_addr: Option<SocketAddr>,
    server: Option<JoinHandle<()>>,
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.options.name)
            .field("state", &self.state)
            .field("routes", &self.routes.len())
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

impl App {
    pub fn new(options: AppOptions, registry: Registry) -> Self {
        Self {
            options,
            registry,
            plugins: Vec::new(),
            auth: None,
            schemas: Arc::new(SchemaStore::empty()),
            state: AppState::Constructed,
            db: None,
            ctx: None,
            routes: Vec::new(),
            route_keys: HashSet::new(),
            scheduler: None,
            router: None,
            local_addr: None,
            server: None,
        }
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn auth(mut self, auth: Arc<dyn AuthPlugin>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Uses `schemas` instead of loading `options.schema_path`.
    pub fn schemas(mut self, schemas: SchemaStore) -> Self {
        self.schemas = Arc::new(schemas);
        self
    }

    pub fn options(&self) -> &AppOptions {
        &self.options
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    /// The shared context, once built.
    pub fn ctx(&self) -> Option<Arc<AppContext>> {
        self.ctx.clone()
    }

    pub fn db(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    /// The frozen router, once serving. Useful to drive the app in process.
    pub fn router(&self) -> Option<Router> {
        self.router.clone()
    }

    /// Address of the HTTP listener, once serving.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn scheduler(&self) -> Option<&JobScheduler> {
        self.scheduler.as_ref()
    }

    /// `(method, path)` of every registered route, in registration order.
    pub fn routes(&self) -> Vec<(HttpMethod, String)> {
        self.routes.iter().map(|r| (r.method, r.path.clone())).collect()
    }

    /// Runs the startup sequence and starts serving.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != AppState::Constructed {
            return Err(Error::InvalidState {
                action: "start",
                state: self.state.to_string(),
            });
        }

        self.load_artifacts()?;
        self.init_db().await?;
        self.build_context()?;
        self.open_routing().await?;
        self.close_routing();
        self.serve().await?;

        tracing::info!(app = %self.options.name, routes = self.routes.len(), "app started");
        Ok(())
    }

    /// Like [`App::start`], but logs a startup failure and exits the
    /// process with status 1.
    pub async fn start_or_exit(&mut self) {
        if let Err(err) = self.start().await {
            tracing::error!(error = %err, "app failed to start");
            std::process::exit(1);
        }
    }

    /// Starts, then runs until the HTTP server stops (or until ctrl-c when
    /// the listener is disabled).
    pub async fn run(mut self) -> Result<()> {
        self.start().await?;
        match self.server.take() {
            Some(server) => server.await.map_err(|e| Error::Server(e.to_string())),
            None => tokio::signal::ctrl_c().await.map_err(|e| Error::Server(e.to_string())),
        }
    }

    /// Adds a handler.
    ///
    /// Before startup the handler joins the registry; while routing is open
    /// (plugin `init` hooks) it becomes a route immediately; afterwards this
    /// fails with [`Error::RoutingClosed`].
    pub fn add_handler(&mut self, registration: HandlerRegistration) -> Result<()> {
        match self.state {
            AppState::RoutingOpen => self.register_route(registration),
            AppState::Serving => Err(Error::RoutingClosed {
                handler: registration.name,
            }),
            _ => {
                self.registry.handlers.push(registration);
                Ok(())
            }
        }
    }

    /// Adds a repository, bound to the live context when it already exists.
    pub fn add_repo(&mut self, registration: RepoRegistration) -> Result<()> {
        match (&self.ctx, self.state) {
            (_, AppState::Serving) => Err(Error::InvalidState {
                action: "add a repository",
                state: self.state.to_string(),
            }),
            (Some(ctx), _) => {
                ctx.insert_repo(&registration, self.db.clone());
                tracing::info!(repo = %registration.repo_instance_name, "repository added");
                self.registry.repos.push(registration);
                Ok(())
            }
            (None, _) => {
                self.registry.repos.push(registration);
                Ok(())
            }
        }
    }

    fn load_artifacts(&mut self) -> Result<()> {
        if let Some(path) = self.options.manifest_path.clone() {
            let manifest = load_manifest(&path)?;
            self.registry.bind_manifest(&manifest);
            tracing::info!(path = %path.display(), handlers = manifest.handlers.len(), "manifest bound");
        }
        if let Some(path) = self.options.schema_path.clone() {
            self.schemas = Arc::new(SchemaStore::load(&path)?);
        }
        Ok(())
    }

    async fn init_db(&mut self) -> Result<()> {
        if let Some(uri) = &self.options.db_uri {
            self.db = Some(Database::connect(uri).await?);
        }
        self.state = AppState::DbInitialized;
        Ok(())
    }

    fn build_context(&mut self) -> Result<()> {
        if self.db.is_none() && !self.registry.repos.is_empty() {
            tracing::warn!(
                repos = self.registry.repos.len(),
                "repositories registered without a database; they fail on first access"
            );
        }

        let mut plugin_contexts: HashMap<String, SharedAny> = HashMap::new();
        let mut ids = HashSet::new();
        for plugin in &self.plugins {
            let id = plugin.id().to_string();
            if !ids.insert(id.clone()) {
                return Err(Error::DuplicatePlugin(id));
            }
            if let Some(ctx) = plugin.ctx() {
                plugin_contexts.insert(id, ctx);
            }
        }

        let ctx = AppContext::build(self.options.environment, &self.registry.repos, plugin_contexts, self.db.clone());
        tracing::info!(repos = ?ctx.repo_names(), plugins = self.plugins.len(), "context built");
        self.ctx = Some(ctx);
        self.state = AppState::ContextBuilt;
        Ok(())
    }

    async fn open_routing(&mut self) -> Result<()> {
        self.state = AppState::RoutingOpen;

        let plugins = self.plugins.clone();
        for plugin in plugins {
            let db = match plugin.db() {
                PluginDb::None => None,
                PluginDb::Host => {
                    if self.db.is_none() {
                        tracing::warn!(plugin = plugin.id(), "plugin wants the host database but none is configured");
                    }
                    self.db.clone()
                }
                PluginDb::Uri(uri) => Some(Database::connect(&uri).await?),
            };
            plugin.init(self, db).await.map_err(|source| Error::PluginInit {
                id: plugin.id().to_string(),
                source,
            })?;
            tracing::info!(plugin = plugin.id(), "plugin initialized");
        }

        let handlers = std::mem::take(&mut self.registry.handlers);
        for registration in &handlers {
            if registration.route.skip_auto_register {
                tracing::info!(handler = %registration.name, "skipping auto registration");
                continue;
            }
            self.register_route(registration.clone())?;
        }
        self.registry.handlers = handlers;

        self.schedule_jobs()
    }

    fn register_route(&mut self, registration: HandlerRegistration) -> Result<()> {
        let method = registration.resolved_method().ok_or_else(|| Error::MissingMethod {
            handler: registration.name.clone(),
        })?;
        let path = match registration.route.path.as_deref() {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => {
                return Err(Error::MissingPath {
                    handler: registration.name,
                })
            }
        };

        if !registration.route.permissions.is_empty() && self.auth.is_none() {
            return Err(Error::MissingAuthPlugin { method, path });
        }
        for schema in registration.req_schema.iter().chain(registration.res_schema.iter()) {
            if !self.schemas.contains(schema) {
                return Err(Error::UnknownSchema {
                    name: schema.clone(),
                    handler: registration.name.clone(),
                });
            }
            self.schemas.validator(schema)?;
        }

        if !self.route_keys.insert((method, path.clone())) {
            return Err(Error::DuplicateRoute { method, path });
        }

        tracing::info!(method = %method, path = %path, handler = %registration.name, "route registered");
        self.routes.push(Arc::new(Route {
            name: registration.name,
            method,
            path,
            permissions: registration.route.permissions,
            req_schema: registration.req_schema,
            res_schema: registration.res_schema,
            mock_api: registration.route.mock_api,
            origin: registration.origin,
            handler: registration.handler,
        }));
        Ok(())
    }

    fn schedule_jobs(&mut self) -> Result<()> {
        if self.options.disable_scheduling {
            tracing::info!(jobs = self.registry.jobs.len(), "scheduling disabled");
            return Ok(());
        }
        let Some(ctx) = self.ctx.clone() else {
            return Err(Error::InvalidState {
                action: "schedule jobs",
                state: self.state.to_string(),
            });
        };

        let scheduler = JobScheduler::new(ctx);
        for registration in self.registry.jobs.clone() {
            match scheduler.schedule(registration) {
                Ok(()) => {}
                Err(JobError::DuplicateId(id)) => {
                    tracing::warn!(job = %id, "duplicate job id, not scheduled");
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.scheduler = Some(scheduler);
        Ok(())
    }

    /// Freezes routing: builds the router with the catch-all last. A known
    /// path hit with an unregistered method answers like an unknown path.
    fn close_routing(&mut self) {
        let Some(ctx) = self.ctx.clone() else {
            return;
        };
        let runtime = Arc::new(Runtime {
            ctx,
            schemas: Arc::clone(&self.schemas),
            auth: self.auth.clone(),
            mock_api_allowed: self.options.mock_api_allowed(),
        });

        let mut by_path: BTreeMap<String, MethodRouter> = BTreeMap::new();
        for route in &self.routes {
            let existing = by_path.remove(&route.path);
            by_path.insert(route.path.clone(), method_route(existing, Arc::clone(route), Arc::clone(&runtime)));
        }

        let mut router = Router::new();
        for (path, method_router) in by_path {
            router = router.route(&path, method_router.fallback(not_found));
        }
        let router = router
            .fallback(not_found)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive());

        self.router = Some(router);
        self.state = AppState::Serving;
    }

    async fn serve(&mut self) -> Result<()> {
        if self.options.disable_http_server {
            tracing::info!("http server disabled");
            return Ok(());
        }
        let Some(router) = self.router.clone() else {
            return Ok(());
        };

        let listener = tokio::net::TcpListener::bind(("0.0.0.0", self.options.port))
            .await
            .map_err(|e| Error::Server(format!("failed to bind port {}: {}", self.options.port, e)))?;
        let addr = listener.local_addr().map_err(|e| Error::Server(e.to_string()))?;
        self.local_addr = Some(addr);

        self.server = Some(tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                tracing::error!(error = %err, "http server stopped");
            }
        }));
        tracing::info!(%addr, "listening");
        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.shutdown();
        }
    }
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Delete => MethodFilter::DELETE,
    }
}

fn method_route(existing: Option<MethodRouter>, route: Arc<Route>, runtime: Arc<Runtime>) -> MethodRouter {
    let filter = method_filter(route.method);
    let endpoint = move |uri: Uri,
                         params: Option<Path<HashMap<String, String>>>,
                         Query(query): Query<HashMap<String, String>>,
                         headers: HeaderMap,
                         body: Bytes| {
        let route = Arc::clone(&route);
        let runtime = Arc::clone(&runtime);
        async move {
            let req = HandlerRequest {
                method: route.method,
                path: uri.path().to_string(),
                params: params.map(|Path(params)| params).unwrap_or_default(),
                query,
                headers,
                body: Value::Null,
                user: None,
            };
            dispatch(&route, &runtime, req, &body).await
        }
    };

    match existing {
        Some(method_router) => method_router.on(filter, endpoint),
        None => on(filter, endpoint),
    }
}

async fn not_found(uri: Uri) -> ApiResponse {
    ApiResponse::error(404, "Not Found", format!("No route matches {}", uri.path())).with_code("notFound")
}
