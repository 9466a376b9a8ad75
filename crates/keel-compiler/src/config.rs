//! Compiler configuration.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::diagnostic::CompilerError;

/// Configuration for the keel compiler.
///
/// Every directory except `project_root` is relative to the project root.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Root of the TypeScript project.
    pub project_root: PathBuf,

    /// Directory containing handler modules.
    pub handlers_dir: PathBuf,

    /// Directory containing repository classes.
    pub repos_dir: PathBuf,

    /// Directory containing job modules.
    pub jobs_dir: PathBuf,

    /// Directory containing author-written schema interfaces.
    pub schemas_dir: PathBuf,

    /// Directory to write generated code to (`.keel` by default).
    pub out_dir: PathBuf,

    /// Application entry point imported last by the generated start module.
    pub app_entry: PathBuf,

    /// Glob patterns of files to leave out of discovery.
    pub exclude: Vec<String>,

    /// Only accept named interfaces (or `any`) as handler schemas.
    pub strict_schemas: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            handlers_dir: PathBuf::from("src/handlers"),
            repos_dir: PathBuf::from("src/repos"),
            jobs_dir: PathBuf::from("src/jobs"),
            schemas_dir: PathBuf::from("src/schemas"),
            out_dir: PathBuf::from(".keel"),
            app_entry: PathBuf::from("src/index.ts"),
            exclude: Vec::new(),
            strict_schemas: false,
        }
    }
}

impl CompilerConfig {
    /// Creates a configuration for the project at `root` with default layout.
    pub fn for_project(root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: root.into(),
            ..Self::default()
        }
    }

    pub fn handlers_path(&self) -> PathBuf {
        self.project_root.join(&self.handlers_dir)
    }

    pub fn repos_path(&self) -> PathBuf {
        self.project_root.join(&self.repos_dir)
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.project_root.join(&self.jobs_dir)
    }

    pub fn schemas_path(&self) -> PathBuf {
        self.project_root.join(&self.schemas_dir)
    }

    pub fn out_path(&self) -> PathBuf {
        self.project_root.join(&self.out_dir)
    }

    pub fn app_entry_path(&self) -> PathBuf {
        self.project_root.join(&self.app_entry)
    }

    /// Compiles the exclude globs.
    pub fn excludes(&self) -> Result<Excludes, CompilerError> {
        Excludes::new(&self.project_root, &self.exclude)
    }
}

/// Compiled exclude patterns.
///
/// A path is excluded when a pattern matches either its path relative to the
/// project root or its file name.
#[derive(Debug, Clone)]
pub struct Excludes {
    root: PathBuf,
    set: GlobSet,
}

impl Excludes {
    pub fn new(root: &Path, patterns: &[String]) -> Result<Self, CompilerError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| CompilerError::InvalidExcludePattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| CompilerError::InvalidExcludePattern {
                pattern: patterns.join(", "),
                message: e.to_string(),
            })?;

        Ok(Self {
            root: root.to_path_buf(),
            set,
        })
    }

    /// Matches nothing.
    pub fn none() -> Self {
        Self {
            root: PathBuf::new(),
            set: GlobSet::empty(),
        }
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.set.is_empty() {
            return false;
        }
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        if self.set.is_match(relative) {
            return true;
        }
        path.file_name()
            .map(|name| self.set.is_match(Path::new(name)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let config = CompilerConfig::for_project("/app");
        assert_eq!(config.handlers_path(), PathBuf::from("/app/src/handlers"));
        assert_eq!(config.out_path(), PathBuf::from("/app/.keel"));
        assert!(!config.strict_schemas);
    }

    #[test]
    fn test_excludes_match_relative_path_and_file_name() {
        let excludes = Excludes::new(
            Path::new("/app"),
            &["src/handlers/legacy/**".to_string(), "*.spec.ts".to_string()],
        )
        .unwrap();

        assert!(excludes.is_excluded(Path::new("/app/src/handlers/legacy/GetOld.ts")));
        assert!(excludes.is_excluded(Path::new("/app/src/handlers/GetCar.spec.ts")));
        assert!(!excludes.is_excluded(Path::new("/app/src/handlers/GetCar.ts")));
        assert!(!Excludes::none().is_excluded(Path::new("/app/src/handlers/GetCar.ts")));
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let result = Excludes::new(Path::new("/app"), &["a[".to_string()]);
        assert!(matches!(result, Err(CompilerError::InvalidExcludePattern { .. })));
    }
}
