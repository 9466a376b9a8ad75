//! Output generation.
//!
//! The build writes everything under the output directory (`.keel`):
//!
//! ```text
//! .keel/
//! ├── generatedHandlers.ts
//! ├── generatedRepos.ts
//! ├── generatedJobs.ts
//! ├── start.ts
//! ├── manifest.json
//! └── schemas/
//!     ├── schemas.json
//!     └── GetCar_ResSchema.ts   (one per synthesized schema)
//! ```

pub mod naming;
mod registration;

use std::path::Path;

pub use registration::{
    generate_handlers_module, generate_jobs_module, generate_repos_module, generate_start_module,
};

use crate::config::CompilerConfig;
use crate::diagnostic::CompilerError;
use crate::ir::Manifest;
use crate::scan::ScannedProject;
use crate::schema::{SchemaDocument, SynthesizedSchema};

pub const SCHEMAS_DIR: &str = "schemas";
pub const SCHEMAS_FILE: &str = "schemas/schemas.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Generated files, relative to the output directory.
pub struct GeneratedCode {
    /// Map of filename to content.
    pub files: Vec<(String, String)>,
}

/// Renders every output file in memory.
pub fn generate(
    config: &CompilerConfig,
    project: &ScannedProject,
    synthesized: &[SynthesizedSchema],
    document: &SchemaDocument,
) -> Result<GeneratedCode, CompilerError> {
    let out_dir = config.out_path();
    let mut files = Vec::new();

    files.push((
        "generatedHandlers.ts".to_string(),
        generate_handlers_module(&project.handlers, &out_dir),
    ));
    files.push((
        "generatedRepos.ts".to_string(),
        generate_repos_module(&project.repos, &out_dir),
    ));
    files.push((
        "generatedJobs.ts".to_string(),
        generate_jobs_module(&project.jobs, &out_dir),
    ));
    files.push((
        "start.ts".to_string(),
        generate_start_module(&config.app_entry_path(), &out_dir),
    ));

    for schema in synthesized {
        files.push((schema_file_name(&schema.path), schema.source.clone()));
    }
    files.push((SCHEMAS_FILE.to_string(), document.to_json_pretty()?));

    let manifest = manifest(project);
    let manifest_json = serde_json::to_string_pretty(&manifest).map_err(|e| CompilerError::CodegenFailed {
        message: format!("failed to serialize manifest: {}", e),
    })?;
    files.push((MANIFEST_FILE.to_string(), manifest_json));

    Ok(GeneratedCode { files })
}

/// The registry data of a scanned project.
pub fn manifest(project: &ScannedProject) -> Manifest {
    Manifest {
        handlers: project.handlers.iter().map(|h| h.descriptor.clone()).collect(),
        repos: project.repos.iter().map(|r| r.descriptor.clone()).collect(),
        jobs: project.jobs.iter().map(|j| j.descriptor.clone()).collect(),
    }
}

fn schema_file_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}/{}", SCHEMAS_DIR, file_name)
}
