//! Naming conventions shared by the scanner and the code generators.

use std::collections::HashSet;
use std::path::{Component, Path};

/// File name without its `.ts` / `.tsx` extension.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Lower-cases the first character: `CarRepo` becomes `carRepo`.
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Collection backing a repository: `CarRepo` becomes `car`.
pub fn collection_name(repo_name: &str) -> String {
    let stem = match repo_name.strip_suffix("Repo") {
        Some(stem) if !stem.is_empty() => stem,
        _ => repo_name,
    };
    lower_first(stem)
}

/// Context property of a repository instance: `CarRepo` becomes `carRepo`.
pub fn instance_name(repo_name: &str) -> String {
    lower_first(repo_name)
}

/// `path` relative to `root`, always `/`-separated.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    join_components(&relative)
}

/// Module specifier importing `target` from a module in `from_dir`, e.g.
/// `../src/handlers/GetCar`.
pub fn module_specifier(from_dir: &Path, target: &Path) -> String {
    let relative = pathdiff::diff_paths(target, from_dir).unwrap_or_else(|| target.to_path_buf());
    let mut spec = join_components(&relative);

    for ext in [".tsx", ".ts"] {
        if let Some(stripped) = spec.strip_suffix(ext) {
            spec = stripped.to_string();
            break;
        }
    }

    if spec.starts_with("../") || spec.starts_with('/') {
        spec
    } else {
        format!("./{}", spec)
    }
}

fn join_components(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            Component::ParentDir => Some("..".to_string()),
            Component::RootDir => Some(String::new()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Hands out unique TypeScript identifiers for generated imports.
#[derive(Debug, Default)]
pub struct IdentAllocator {
    used: HashSet<String>,
}

impl IdentAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `{prefix}_{name}`, made identifier-safe and unique.
    pub fn allocate(&mut self, prefix: &str, name: &str) -> String {
        let mut sanitized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
            .collect();
        if sanitized.is_empty() {
            sanitized.push('_');
        }

        let base = format!("{}_{}", prefix, sanitized);
        let mut candidate = base.clone();
        let mut n = 2;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{}{}", base, n);
            n += 1;
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_repo_names() {
        assert_eq!(collection_name("CarRepo"), "car");
        assert_eq!(instance_name("CarRepo"), "carRepo");
        assert_eq!(collection_name("Repo"), "repo");
        assert_eq!(collection_name("UserProfileRepo"), "userProfile");
    }

    #[test]
    fn test_module_specifier() {
        let out = PathBuf::from("/app/.keel");
        assert_eq!(
            module_specifier(&out, Path::new("/app/src/handlers/GetCar.ts")),
            "../src/handlers/GetCar"
        );
        assert_eq!(
            module_specifier(&out, Path::new("/app/.keel/schemas/GetCar_ResSchema.ts")),
            "./schemas/GetCar_ResSchema"
        );
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/app"), Path::new("/app/src/repos/CarRepo.ts")),
            "src/repos/CarRepo.ts"
        );
    }

    #[test]
    fn test_ident_allocator_dedupes() {
        let mut idents = IdentAllocator::new();
        assert_eq!(idents.allocate("Handler", "GetCar"), "Handler_GetCar");
        assert_eq!(idents.allocate("Handler", "GetCar"), "Handler_GetCar2");
        assert_eq!(idents.allocate("Job", "clean-up"), "Job_clean_up");
    }
}
