//! Registration modules.
//!
//! Each module statically imports every discovered file and appends one
//! record per file to the runtime's registration list. The start module
//! imports the three registration modules before the application entry, so
//! the lists are populated before the application constructs itself.

use std::path::Path;

use crate::ir::HttpMethod;
use crate::scan::{ScannedHandler, ScannedJob, ScannedRepo};

use super::naming::{module_specifier, IdentAllocator};

const RUNTIME_MODULE: &str = "@keel/runtime";
const HEADER: &str = "// Generated by keel. Do not edit.\n";

/// Generates `generatedHandlers.ts`.
pub fn generate_handlers_module(handlers: &[ScannedHandler], out_dir: &Path) -> String {
    let mut idents = IdentAllocator::new();
    let mut imports = String::new();
    let mut records = String::new();

    for handler in handlers {
        let ident = idents.allocate("Handler", &handler.descriptor.name);
        imports.push_str(&format!(
            "import * as {} from \"{}\";\n",
            ident,
            module_specifier(out_dir, &handler.path)
        ));

        let descriptor = &handler.descriptor;
        let route_props = if descriptor.route.is_some() {
            format!("{}.Route", ident)
        } else {
            "undefined".to_string()
        };

        records.push_str("  {\n");
        records.push_str(&format!("    routeProps: {},\n", route_props));
        records.push_str(&format!("    handlerFn: {}.default,\n", ident));
        records.push_str(&format!(
            "    assumedHttpMethod: {},\n",
            method_literal(descriptor.assumed_http_method)
        ));
        records.push_str(&format!("    reqSchema: {},\n", string_literal(descriptor.req_schema.as_deref())));
        records.push_str(&format!("    resSchema: {},\n", string_literal(descriptor.res_schema.as_deref())));
        records.push_str("  },\n");
    }

    let mut out = String::from(HEADER);
    out.push_str(&format!(
        "import {{ autoRegisteredHandlers, HttpMethod }} from \"{}\";\n",
        RUNTIME_MODULE
    ));
    out.push_str(&imports);
    out.push_str("\nexport const handlers = [\n");
    out.push_str(&records);
    out.push_str("];\n\nautoRegisteredHandlers.push(...handlers);\n");
    out
}

/// Generates `generatedRepos.ts`.
pub fn generate_repos_module(repos: &[ScannedRepo], out_dir: &Path) -> String {
    let mut idents = IdentAllocator::new();
    let mut imports = String::new();
    let mut records = String::new();

    for repo in repos {
        let ident = idents.allocate("Repo", &repo.descriptor.name);
        imports.push_str(&format!(
            "import {} from \"{}\";\n",
            ident,
            module_specifier(out_dir, &repo.path)
        ));
        records.push_str(&format!(
            "  {{ collectionName: {}, repoInstanceName: {}, Repo: {} }},\n",
            string_literal(Some(&repo.descriptor.collection_name)),
            string_literal(Some(&repo.descriptor.repo_instance_name)),
            ident
        ));
    }

    let mut out = String::from(HEADER);
    out.push_str(&format!("import {{ autoRegisteredRepos }} from \"{}\";\n", RUNTIME_MODULE));
    out.push_str(&imports);
    out.push_str("\nexport const repos = [\n");
    out.push_str(&records);
    out.push_str("];\n\nautoRegisteredRepos.push(...repos);\n");
    out
}

/// Generates `generatedJobs.ts`.
pub fn generate_jobs_module(jobs: &[ScannedJob], out_dir: &Path) -> String {
    let mut idents = IdentAllocator::new();
    let mut imports = String::new();
    let mut records = String::new();

    for job in jobs {
        let ident = idents.allocate("Job", &job.descriptor.name);
        imports.push_str(&format!(
            "import * as {} from \"{}\";\n",
            ident,
            module_specifier(out_dir, &job.path)
        ));
        records.push_str(&format!("  {{ jobProps: {0}.Job, jobFn: {0}.default }},\n", ident));
    }

    let mut out = String::from(HEADER);
    out.push_str(&format!("import {{ autoRegisteredJobs }} from \"{}\";\n", RUNTIME_MODULE));
    out.push_str(&imports);
    out.push_str("\nexport const jobs = [\n");
    out.push_str(&records);
    out.push_str("];\n\nautoRegisteredJobs.push(...jobs);\n");
    out
}

/// Generates `start.ts`. Import order is the only thing guaranteeing that
/// registrations exist before the application reads them.
pub fn generate_start_module(app_entry: &Path, out_dir: &Path) -> String {
    let mut out = String::from(HEADER);
    out.push_str("import \"./generatedHandlers\";\n");
    out.push_str("import \"./generatedRepos\";\n");
    out.push_str("import \"./generatedJobs\";\n");
    out.push_str(&format!("import \"{}\";\n", module_specifier(out_dir, app_entry)));
    out
}

fn method_literal(method: Option<HttpMethod>) -> String {
    match method {
        Some(method) => format!("HttpMethod.{}", method.as_str()),
        None => "undefined".to_string(),
    }
}

fn string_literal(value: Option<&str>) -> String {
    match value {
        // serde_json escapes exactly like a TypeScript double-quoted string
        Some(value) => serde_json::Value::String(value.to_string()).to_string(),
        None => "undefined".to_string(),
    }
}
