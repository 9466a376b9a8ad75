//! # keel
//!
//! The keel application runtime. An [`App`] is built from an explicit
//! [`Registry`] of handlers, repositories and jobs, optionally bound to the
//! `manifest.json` and `schemas/schemas.json` that `keel build` writes.
//!
//! ```rust,ignore
//! use keel::{handler, ApiResponse, App, AppOptions, HandlerRegistration, Registry};
//!
//! #[tokio::main]
//! async fn main() -> keel::Result<()> {
//!     keel::telemetry::init_tracing();
//!
//!     let registry = Registry::new().handler(
//!         HandlerRegistration::new("GetCar", handler(|_| async {
//!             Ok(ApiResponse::data(serde_json::json!({ "model": "Volvo" })))
//!         }))
//!         .path("/car/:id"),
//!     );
//!
//!     App::new(AppOptions::from_env(), registry).run().await
//! }
//! ```
//!
//! ## Request pipeline
//!
//! ```text
//! request ─► auth (401) ─► request schema (400) ─► mock? ─► handler
//!         ─► error mapping (4xx relay / 500) ─► response schema (500) ─► JSON envelope
//! ```

pub mod app;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod jobs;
pub mod mock;
pub mod plugin;
pub mod registry;
pub mod repo;
pub mod response;
pub mod schema;
pub mod telemetry;

pub use app::{App, AppState};
pub use auth::{AuthError, AuthPlugin, JwtAuthPlugin};
pub use config::{AppOptions, Environment};
pub use context::AppContext;
pub use db::{Database, StoreError};
pub use error::{ApiError, Error, Result};
pub use handler::{handler, HandlerArgs, HandlerFn, HandlerRegistration, HandlerRequest, HandlerResult};
pub use jobs::{job, JobError, JobFn, JobRegistration, JobScheduler};
pub use plugin::{Plugin, PluginDb};
pub use registry::{load_manifest, RepoRegistration, Registry};
pub use repo::{Document, DocumentId, RepoBinding, RepoError, Repository};
pub use response::{ApiResponse, ErrorBody};
pub use schema::SchemaStore;

pub use keel_compiler::{HttpMethod, JobProps, Manifest, RouteProps};
