//! Project scanning.
//!
//! Walks the handlers, repositories and jobs directories and produces the
//! descriptors the code generators and the manifest are built from. Files are
//! visited in path order so generated output is stable between builds.

pub mod route;

use std::path::PathBuf;

use crate::codegen::naming::{base_name, collection_name, instance_name, relative_path};
use crate::config::{CompilerConfig, Excludes};
use crate::diagnostic::{CompilerError, CompilerWarning};
use crate::frontend::{discover_sources, SourceSet};
use crate::ir::{HandlerDescriptor, HttpMethod, JobDescriptor, RepoDescriptor};

/// A handler module and its descriptor.
#[derive(Debug, Clone)]
pub struct ScannedHandler {
    pub path: PathBuf,
    pub descriptor: HandlerDescriptor,
}

#[derive(Debug, Clone)]
pub struct ScannedRepo {
    pub path: PathBuf,
    pub descriptor: RepoDescriptor,
}

#[derive(Debug, Clone)]
pub struct ScannedJob {
    pub path: PathBuf,
    pub descriptor: JobDescriptor,
}

/// Everything found in a project, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct ScannedProject {
    pub handlers: Vec<ScannedHandler>,
    pub repos: Vec<ScannedRepo>,
    pub jobs: Vec<ScannedJob>,
}

/// Scans handlers, repositories and jobs of the project.
pub fn scan_project(
    config: &CompilerConfig,
    excludes: &Excludes,
    sources: &mut SourceSet,
    warnings: &mut Vec<CompilerWarning>,
) -> Result<ScannedProject, CompilerError> {
    Ok(ScannedProject {
        handlers: scan_handlers(config, excludes, sources, warnings)?,
        repos: scan_repos(config, excludes),
        jobs: scan_jobs(config, excludes, sources, warnings)?,
    })
}

/// Discovers handler modules and reads their route metadata.
///
/// A handler whose method is neither declared nor implied by its file name
/// is kept, with a warning: the runtime rejects it when registering routes.
/// Handler names must be unique across subdirectories.
pub fn scan_handlers(
    config: &CompilerConfig,
    excludes: &Excludes,
    sources: &mut SourceSet,
    warnings: &mut Vec<CompilerWarning>,
) -> Result<Vec<ScannedHandler>, CompilerError> {
    let mut handlers: Vec<ScannedHandler> = Vec::new();

    for path in discover_sources(&config.handlers_path(), excludes) {
        let file = sources.load(&path)?;
        let name = base_name(&path);
        if let Some(first) = handlers.iter().find(|h| h.descriptor.name == name) {
            return Err(CompilerError::DuplicateHandlerName {
                name,
                first: first.path.clone(),
                second: path,
            });
        }
        let route = route::route_props(&file, warnings);
        let assumed_http_method = HttpMethod::from_file_prefix(&name);

        let descriptor = HandlerDescriptor {
            name,
            file: relative_path(&config.project_root, &path),
            route,
            assumed_http_method,
            req_schema: None,
            res_schema: None,
        };

        if descriptor.method().is_none() {
            warnings.push(CompilerWarning::new(
                Some(path.clone()),
                "no HTTP method: declare `method` in Route or prefix the file name with get, post, put or delete",
            ));
        }
        tracing::debug!(handler = %descriptor.name, method = ?descriptor.method(), "discovered handler");

        handlers.push(ScannedHandler { path, descriptor });
    }

    Ok(handlers)
}

/// Discovers repository classes. Names derive from file names alone.
pub fn scan_repos(config: &CompilerConfig, excludes: &Excludes) -> Vec<ScannedRepo> {
    discover_sources(&config.repos_path(), excludes)
        .into_iter()
        .map(|path| {
            let name = base_name(&path);
            let descriptor = RepoDescriptor {
                collection_name: collection_name(&name),
                repo_instance_name: instance_name(&name),
                file: relative_path(&config.project_root, &path),
                name,
            };
            ScannedRepo { path, descriptor }
        })
        .collect()
}

/// Discovers job modules and reads their schedule metadata.
pub fn scan_jobs(
    config: &CompilerConfig,
    excludes: &Excludes,
    sources: &mut SourceSet,
    warnings: &mut Vec<CompilerWarning>,
) -> Result<Vec<ScannedJob>, CompilerError> {
    let mut jobs = Vec::new();

    for path in discover_sources(&config.jobs_path(), excludes) {
        let file = sources.load(&path)?;
        let name = base_name(&path);

        let Some(mut job) = route::job_props(&file, warnings) else {
            warnings.push(CompilerWarning::new(
                Some(path.clone()),
                "job module has no `export const Job: JobProps`, skipped",
            ));
            continue;
        };
        if job.id.is_empty() {
            job.id = name.clone();
        }

        jobs.push(ScannedJob {
            descriptor: JobDescriptor {
                file: relative_path(&config.project_root, &path),
                name,
                job,
            },
            path,
        });
    }

    Ok(jobs)
}
