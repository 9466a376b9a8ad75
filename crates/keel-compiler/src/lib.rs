//! # keel compiler
//!
//! Static analysis and code generation for keel TypeScript projects.
//!
//! The compiler reads handler, repository and job modules following the
//! project's directory conventions, infers request/response JSON Schemas from
//! handler type signatures and generates the registration modules the
//! application imports at start.
//!
//! ## Architecture
//!
//! ```text
//! src/handlers, src/repos, src/jobs
//!        │
//!        ▼
//! ┌──────────────┐
//! │   Frontend   │  tree-sitter → declaration AST, import resolution
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │     Scan     │  routes, repos, jobs → descriptors
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │    Schema    │  signature → extract | synthesize → JSON Schema
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │   Codegen    │  registration modules, schemas.json, manifest.json
//! └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keel_compiler::{Compiler, CompilerConfig};
//!
//! let compiler = Compiler::new(CompilerConfig::for_project("."));
//! let result = compiler.build()?;
//! println!("{} handlers", result.handlers.len());
//! ```

pub mod codegen;
pub mod config;
pub mod diagnostic;
pub mod frontend;
pub mod ir;
pub mod scan;
pub mod schema;

use std::path::{Path, PathBuf};

pub use config::{CompilerConfig, Excludes};
pub use diagnostic::{CompilerError, CompilerWarning};
pub use ir::{HandlerDescriptor, HttpMethod, JobDescriptor, JobProps, Manifest, RepoDescriptor, RouteProps};
pub use schema::SchemaDocument;

use frontend::typescript::normalize;
use frontend::{discover_sources, SourceSet};
use scan::ScannedProject;
use schema::{SchemaGenerator, Side, SynthesizedSchema, Synthesizer};

/// The main compiler struct that orchestrates the build pipeline.
pub struct Compiler {
    config: CompilerConfig,
}

/// Result of a build.
#[derive(Debug)]
pub struct BuildResult {
    pub handlers: Vec<HandlerDescriptor>,
    pub repos: Vec<RepoDescriptor>,
    pub jobs: Vec<JobDescriptor>,
    /// Number of definitions in the schema document.
    pub schemas: usize,
    pub warnings: Vec<CompilerWarning>,
}

impl Compiler {
    /// Creates a new compiler with the given configuration.
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Builds the project.
    ///
    /// This runs the full pipeline:
    /// 1. Scan handlers, repos and jobs
    /// 2. Resolve handler schemas (strict extraction or synthesis)
    /// 3. Generate the JSON Schema document
    /// 4. Render every output file
    /// 5. Remove the previous output and write the new one
    ///
    /// Nothing is written unless steps 1-4 succeed.
    pub fn build(&self) -> Result<BuildResult, CompilerError> {
        let (project, synthesized, document, warnings) = self.analyze()?;
        let generated = codegen::generate(&self.config, &project, &synthesized, &document)?;

        self.clean()?;
        self.write_output(&generated)?;

        tracing::info!(
            handlers = project.handlers.len(),
            repos = project.repos.len(),
            jobs = project.jobs.len(),
            schemas = document.definitions.len(),
            "build finished"
        );

        let manifest = codegen::manifest(&project);
        Ok(BuildResult {
            handlers: manifest.handlers,
            repos: manifest.repos,
            jobs: manifest.jobs,
            schemas: document.definitions.len(),
            warnings,
        })
    }

    /// Runs the analysis without writing anything.
    pub fn check(&self) -> Result<Vec<CompilerWarning>, CompilerError> {
        let (_, _, _, warnings) = self.analyze()?;
        Ok(warnings)
    }

    /// Removes all generated output.
    pub fn clean(&self) -> Result<(), CompilerError> {
        let out = self.config.out_path();
        if normalize(&out) == normalize(&self.config.project_root) {
            return Err(CompilerError::CodegenFailed {
                message: "output directory must not be the project root".to_string(),
            });
        }
        if out.exists() {
            std::fs::remove_dir_all(&out).map_err(|e| CompilerError::io(&out, e.to_string()))?;
            tracing::debug!(path = %out.display(), "removed previous output");
        }
        Ok(())
    }

    /// Generates one schema document from every exported, non-generic
    /// interface, type alias and enum under `types_dir`, and writes it to
    /// `out_file`.
    pub fn generate_schemas(&self, types_dir: &Path, out_file: &Path) -> Result<SchemaDocument, CompilerError> {
        let excludes = self.config.excludes()?;
        let mut sources = SourceSet::new()?;
        let mut roots = Vec::new();

        for path in discover_sources(types_dir, &excludes) {
            let file = sources.load(&path)?;
            let names = file
                .interfaces
                .iter()
                .filter(|i| i.exported && i.type_parameters.is_empty())
                .map(|i| i.name.clone())
                .chain(
                    file.type_aliases
                        .iter()
                        .filter(|a| a.exported && a.type_parameters.is_empty())
                        .map(|a| a.name.clone()),
                )
                .chain(file.enums.iter().filter(|e| e.exported).map(|e| e.name.clone()));
            for name in names {
                roots.push((path.clone(), name));
            }
        }

        let mut generator = SchemaGenerator::new(&mut sources);
        for (path, name) in &roots {
            generator.add_root(path, name)?;
        }
        let document = generator.finish();

        if let Some(parent) = out_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CompilerError::io(parent, e.to_string()))?;
        }
        std::fs::write(out_file, document.to_json_pretty()?)
            .map_err(|e| CompilerError::io(out_file, e.to_string()))?;

        tracing::info!(
            definitions = document.definitions.len(),
            out = %out_file.display(),
            "schemas generated"
        );
        Ok(document)
    }

    fn analyze(
        &self,
    ) -> Result<(ScannedProject, Vec<SynthesizedSchema>, SchemaDocument, Vec<CompilerWarning>), CompilerError> {
        let excludes = self.config.excludes()?;
        let mut sources = SourceSet::new()?;
        let mut warnings = Vec::new();

        let mut project = scan::scan_project(&self.config, &excludes, &mut sources, &mut warnings)?;
        let (synthesized, roots) = self.resolve_handler_schemas(&mut project, &mut sources, &mut warnings)?;

        let mut generator = SchemaGenerator::new(&mut sources);
        for (path, name) in &roots {
            generator.add_root(path, name)?;
        }
        let document = generator.finish();

        Ok((project, synthesized, document, warnings))
    }

    /// Fills in each handler's schema names and returns the synthesized
    /// modules plus the schema roots to generate.
    fn resolve_handler_schemas(
        &self,
        project: &mut ScannedProject,
        sources: &mut SourceSet,
        warnings: &mut Vec<CompilerWarning>,
    ) -> Result<(Vec<SynthesizedSchema>, Vec<(PathBuf, String)>), CompilerError> {
        let schemas_out = self.config.out_path().join(codegen::SCHEMAS_DIR);
        let mut synthesized = Vec::new();
        let mut roots = Vec::new();

        for handler in &mut project.handlers {
            let file = sources.load(&handler.path)?;
            let signature = schema::handler_signature(&file)?;

            if self.config.strict_schemas {
                let names = schema::extract(sources, &signature)?;
                for name in names.req.iter().chain(names.res.iter()) {
                    roots.push((handler.path.clone(), name.clone()));
                }
                handler.descriptor.req_schema = names.req;
                handler.descriptor.res_schema = names.res;
                continue;
            }

            let mut synthesizer = Synthesizer::new(sources, &schemas_out);
            let req = synthesizer.synthesize(&signature, &handler.descriptor.name, Side::Req)?;
            let res = synthesizer.synthesize(&signature, &handler.descriptor.name, Side::Res)?;
            warnings.extend(synthesizer.into_warnings());

            handler.descriptor.req_schema = req.as_ref().map(|s| s.name.clone());
            handler.descriptor.res_schema = res.as_ref().map(|s| s.name.clone());

            for schema in [req, res].into_iter().flatten() {
                sources.insert(&schema.path, &schema.source)?;
                roots.push((schema.path.clone(), schema.name.clone()));
                synthesized.push(schema);
            }
        }

        Ok((synthesized, roots))
    }

    /// Writes generated code to the output directory.
    fn write_output(&self, generated: &codegen::GeneratedCode) -> Result<(), CompilerError> {
        let out = self.config.out_path();
        std::fs::create_dir_all(&out).map_err(|e| CompilerError::io(&out, e.to_string()))?;

        for (filename, content) in &generated.files {
            let path = out.join(filename);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| CompilerError::IoError {
                    path: parent.to_path_buf(),
                    message: e.to_string(),
                })?;
            }
            std::fs::write(&path, content).map_err(|e| CompilerError::IoError {
                path,
                message: e.to_string(),
            })?;
        }

        Ok(())
    }
}
