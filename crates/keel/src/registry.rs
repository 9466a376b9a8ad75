//! The explicit registry an application is built from.
//!
//! A [`Registry`] lists every handler, repository and job. It is an ordinary
//! value passed to [`App::new`](crate::App::new); nothing registers itself
//! through globals. Route metadata and schema names can come from the
//! `manifest.json` the build writes, matched by handler name.

use std::any::Any;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use keel_compiler::codegen::naming::{collection_name, instance_name};
use keel_compiler::Manifest;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::SharedAny;
use crate::error::{Error, Result};
use crate::handler::{HandlerFn, HandlerRegistration};
use crate::jobs::{JobFn, JobRegistration};
use crate::repo::{RepoBinding, Repository};

pub type RepoFactory = Arc<dyn Fn(RepoBinding) -> SharedAny + Send + Sync>;

/// A repository to construct when the context is built.
#[derive(Clone)]
pub struct RepoRegistration {
    /// Class name, e.g. `CarRepo`.
    pub name: String,
    pub collection_name: String,
    pub repo_instance_name: String,
    pub(crate) factory: RepoFactory,
}

impl fmt::Debug for RepoRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoRegistration")
            .field("name", &self.name)
            .field("collection_name", &self.collection_name)
            .field("repo_instance_name", &self.repo_instance_name)
            .finish()
    }
}

impl RepoRegistration {
    /// A plain [`Repository<T>`] named after `name`: `CarRepo` is stored in
    /// collection `car` and reachable as `carRepo`.
    pub fn new<T>(name: &str) -> Self
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        Self::custom(name, |binding| Repository::<T>::new(binding))
    }

    /// A repository built by `factory`, typically a struct wrapping a
    /// [`Repository<T>`] with extra queries.
    pub fn custom<R, F>(name: &str, factory: F) -> Self
    where
        R: Any + Send + Sync,
        F: Fn(RepoBinding) -> R + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            collection_name: collection_name(name),
            repo_instance_name: instance_name(name),
            factory: Arc::new(move |binding| Arc::new(factory(binding)) as SharedAny),
        }
    }

    pub fn collection(mut self, collection_name: impl Into<String>) -> Self {
        self.collection_name = collection_name.into();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub handlers: Vec<HandlerRegistration>,
    pub repos: Vec<RepoRegistration>,
    pub jobs: Vec<JobRegistration>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(mut self, registration: HandlerRegistration) -> Self {
        self.handlers.push(registration);
        self
    }

    /// Shorthand for a handler whose metadata comes from the manifest.
    pub fn handler_fn(self, name: &str, handler: HandlerFn) -> Self {
        self.handler(HandlerRegistration::new(name, handler))
    }

    pub fn repo(mut self, registration: RepoRegistration) -> Self {
        self.repos.push(registration);
        self
    }

    pub fn job(mut self, registration: JobRegistration) -> Self {
        self.jobs.push(registration);
        self
    }

    /// Shorthand for a job whose schedule comes from the manifest.
    pub fn job_fn(self, name: &str, job: JobFn) -> Self {
        self.job(JobRegistration::new(name, Default::default(), job))
    }

    /// Applies manifest entries to registrations of the same name.
    ///
    /// Manifest entries without a registration are logged and ignored; the
    /// manifest describes modules, the registry supplies the code.
    pub fn bind_manifest(&mut self, manifest: &Manifest) {
        for descriptor in &manifest.handlers {
            match self.handlers.iter_mut().find(|h| h.name == descriptor.name) {
                Some(registration) => registration.apply_descriptor(descriptor),
                None => tracing::warn!(handler = %descriptor.name, "manifest handler has no registration"),
            }
        }
        for descriptor in &manifest.repos {
            match self.repos.iter_mut().find(|r| r.name == descriptor.name) {
                Some(registration) => {
                    registration.collection_name = descriptor.collection_name.clone();
                    registration.repo_instance_name = descriptor.repo_instance_name.clone();
                }
                None => tracing::warn!(repo = %descriptor.name, "manifest repo has no registration"),
            }
        }
        for descriptor in &manifest.jobs {
            match self.jobs.iter_mut().find(|j| j.name == descriptor.name) {
                Some(registration) => registration.apply_descriptor(descriptor),
                None => tracing::warn!(job = %descriptor.name, "manifest job has no registration"),
            }
        }
    }
}

/// Reads a `manifest.json` written by the build.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler;
    use crate::jobs::job;
    use crate::response::ApiResponse;
    use keel_compiler::{HandlerDescriptor, HttpMethod, JobDescriptor, JobProps, RepoDescriptor, RouteProps};
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct Car {
        model: String,
    }

    fn manifest() -> Manifest {
        Manifest {
            handlers: vec![
                HandlerDescriptor {
                    name: "PostCar".to_string(),
                    file: "src/handlers/PostCar.ts".to_string(),
                    route: Some(RouteProps {
                        path: Some("/car".to_string()),
                        ..RouteProps::default()
                    }),
                    assumed_http_method: Some(HttpMethod::Post),
                    req_schema: Some("PostCar_ReqSchema".to_string()),
                    res_schema: None,
                },
                HandlerDescriptor {
                    name: "Orphan".to_string(),
                    file: "src/handlers/Orphan.ts".to_string(),
                    route: None,
                    assumed_http_method: None,
                    req_schema: None,
                    res_schema: None,
                },
            ],
            repos: vec![RepoDescriptor {
                name: "CarRepo".to_string(),
                file: "src/repos/CarRepo.ts".to_string(),
                collection_name: "cars".to_string(),
                repo_instance_name: "carRepo".to_string(),
            }],
            jobs: vec![JobDescriptor {
                name: "Cleanup".to_string(),
                file: "src/jobs/Cleanup.ts".to_string(),
                job: JobProps {
                    id: "cleanup".to_string(),
                    after_delay_ms: Some(5_000),
                    ..JobProps::default()
                },
            }],
        }
    }

    #[test]
    fn test_repo_names_derive_from_class_name() {
        let repo = RepoRegistration::new::<Car>("CarRepo");
        assert_eq!(repo.collection_name, "car");
        assert_eq!(repo.repo_instance_name, "carRepo");
    }

    #[test]
    fn test_bind_manifest() {
        let mut registry = Registry::new()
            .handler_fn("PostCar", handler(|_| async { Ok(ApiResponse::default()) }))
            .repo(RepoRegistration::new::<Car>("CarRepo"))
            .job_fn("Cleanup", job(|_| async { Ok(()) }));

        registry.bind_manifest(&manifest());

        let post_car = &registry.handlers[0];
        assert_eq!(post_car.resolved_method(), Some(HttpMethod::Post));
        assert_eq!(post_car.route.path.as_deref(), Some("/car"));
        assert_eq!(post_car.req_schema.as_deref(), Some("PostCar_ReqSchema"));
        assert_eq!(registry.repos[0].collection_name, "cars");
        assert_eq!(registry.jobs[0].id(), "cleanup");
        assert_eq!(registry.jobs[0].props.after_delay_ms, Some(5_000));
    }

    #[test]
    fn test_load_manifest() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("manifest.json");
        std::fs::write(&path, serde_json::to_string(&manifest()).unwrap()).unwrap();

        assert_eq!(load_manifest(&path).unwrap(), manifest());
        assert!(matches!(
            load_manifest(&temp.path().join("missing.json")),
            Err(Error::Io { .. })
        ));
    }
}
