//! TypeScript frontend for the keel compiler.

pub mod ast;
pub mod parser;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::config::Excludes;
use crate::diagnostic::CompilerError;
use ast::{Declaration, DefaultExport, ParsedFile};
use parser::TypeScriptParser;

const EXTENSIONS: &[&str] = &["ts", "tsx"];

/// Re-export chains longer than this are treated as unresolvable.
const MAX_RESOLVE_DEPTH: usize = 16;

/// Lists every TypeScript source under `dir`, sorted by path.
///
/// Declaration files (`.d.ts`) and excluded paths are skipped. A missing
/// directory yields an empty list.
pub fn discover_sources(dir: &Path, excludes: &Excludes) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .map(|ext| EXTENSIONS.contains(&ext.to_string_lossy().as_ref()))
                .unwrap_or(false)
        })
        .filter(|path| !path.to_string_lossy().ends_with(".d.ts"))
        .filter(|path| !excludes.is_excluded(path))
        .collect()
}

/// A type declaration together with the file that declares it.
#[derive(Debug, Clone)]
pub struct ResolvedType {
    pub file: Arc<ParsedFile>,
    pub declaration: Declaration,
}

/// Parsed TypeScript files keyed by path.
///
/// Files are parsed at most once. In-memory sources (synthesized schemas)
/// can be added with [`SourceSet::insert`] and then take part in import
/// resolution like files on disk.
pub struct SourceSet {
    parser: TypeScriptParser,
    files: HashMap<PathBuf, Arc<ParsedFile>>,
}

impl SourceSet {
    pub fn new() -> Result<Self, CompilerError> {
        Ok(Self {
            parser: TypeScriptParser::new()?,
            files: HashMap::new(),
        })
    }

    /// Loads and parses a file from disk, or returns the cached parse.
    pub fn load(&mut self, path: &Path) -> Result<Arc<ParsedFile>, CompilerError> {
        let key = normalize(path);
        if let Some(file) = self.files.get(&key) {
            return Ok(file.clone());
        }

        let source = std::fs::read_to_string(&key).map_err(|e| CompilerError::IoError {
            path: key.clone(),
            message: e.to_string(),
        })?;
        self.insert(&key, &source)
    }

    /// Parses `source` as if it were the file at `path`.
    pub fn insert(&mut self, path: &Path, source: &str) -> Result<Arc<ParsedFile>, CompilerError> {
        let key = normalize(path);
        let parsed = Arc::new(self.parser.parse(source, &key)?);
        self.files.insert(key, parsed.clone());
        Ok(parsed)
    }

    /// Resolves the type named `name` as seen from inside `file`.
    ///
    /// Local declarations win over imports. Returns `Ok(None)` when the name
    /// is neither declared locally nor imported from a relative module, e.g.
    /// a global like `Date` or a type imported from a package.
    pub fn resolve_type(&mut self, file: &Path, name: &str) -> Result<Option<ResolvedType>, CompilerError> {
        let parsed = self.load(file)?;

        if let Some(declaration) = parsed.declaration(name) {
            return Ok(Some(ResolvedType { file: parsed, declaration }));
        }

        let Some((import, specifier)) = parsed.import_of(name) else {
            return Ok(None);
        };
        let Some(target) = self.resolve_module(&parsed.path, &import.source) else {
            return Ok(None);
        };
        let imported_name = specifier.name.clone();
        self.resolve_export(&target, &imported_name, 0)
    }

    /// Resolves `name` as exported by the module at `path`, following
    /// default exports and re-exports.
    fn resolve_export(&mut self, path: &Path, name: &str, depth: usize) -> Result<Option<ResolvedType>, CompilerError> {
        if depth > MAX_RESOLVE_DEPTH {
            return Ok(None);
        }
        let parsed = self.load(path)?;

        let local_name = if name == "default" {
            match &parsed.default_export {
                Some(DefaultExport::Identifier(ident)) => ident.clone(),
                _ => return Ok(None),
            }
        } else {
            name.to_string()
        };

        if let Some(declaration) = parsed.declaration(&local_name) {
            if declaration.exported() || name == "default" {
                return Ok(Some(ResolvedType { file: parsed, declaration }));
            }
        }

        // export { Person as Owner } from "./Person"
        for re_export in &parsed.re_exports {
            let Some(target) = self.resolve_module(&parsed.path, &re_export.source) else {
                continue;
            };
            if re_export.specifiers.is_empty() {
                if let Some(found) = self.resolve_export(&target, name, depth + 1)? {
                    return Ok(Some(found));
                }
                continue;
            }
            if let Some(spec) = re_export.specifiers.iter().find(|s| s.local_name() == name) {
                let source_name = spec.name.clone();
                return self.resolve_export(&target, &source_name, depth + 1);
            }
        }

        Ok(None)
    }

    /// Resolves a relative module specifier (`./Car`, `../schemas`) against
    /// the importing file. Package imports resolve to `None`.
    pub fn resolve_module(&self, from: &Path, source: &str) -> Option<PathBuf> {
        if !source.starts_with("./") && !source.starts_with("../") {
            return None;
        }
        let dir = from.parent().unwrap_or_else(|| Path::new(""));
        let base = normalize(&dir.join(source));

        let mut candidates = vec![base.clone()];
        for ext in EXTENSIONS {
            let mut with_ext = base.clone().into_os_string();
            with_ext.push(".");
            with_ext.push(ext);
            candidates.push(PathBuf::from(with_ext));
        }
        for ext in EXTENSIONS {
            candidates.push(base.join(format!("index.{}", ext)));
        }

        candidates
            .into_iter()
            .find(|c| self.files.contains_key(c) || c.is_file())
    }
}

/// Lexically normalizes `.` and `..` components without touching the disk.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_discover_sources_skips_declarations_and_excludes() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/handlers/GetCar.ts", "");
        write(temp.path(), "src/handlers/types.d.ts", "");
        write(temp.path(), "src/handlers/README.md", "");
        write(temp.path(), "src/handlers/old/GetOld.ts", "");

        let excludes = Excludes::new(temp.path(), &["src/handlers/old/**".to_string()]).unwrap();
        let found = discover_sources(&temp.path().join("src/handlers"), &excludes);

        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("GetCar.ts"));
        assert!(discover_sources(&temp.path().join("missing"), &excludes).is_empty());
    }

    #[test]
    fn test_resolves_local_and_imported_types() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "src/schemas/Car.ts",
            "export interface Car { model: string }\ninterface Hidden { x: number }",
        );
        let handler = write(
            temp.path(),
            "src/handlers/GetCar.ts",
            "import { Car } from \"../schemas/Car\";\ninterface Local { y: string }",
        );

        let mut sources = SourceSet::new().unwrap();

        let local = sources.resolve_type(&handler, "Local").unwrap().unwrap();
        assert_eq!(local.declaration.name(), "Local");

        let car = sources.resolve_type(&handler, "Car").unwrap().unwrap();
        assert!(car.file.path.ends_with("src/schemas/Car.ts"));

        assert!(sources.resolve_type(&handler, "Date").unwrap().is_none());
    }

    #[test]
    fn test_resolves_through_reexports_and_default_exports() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/schemas/Person.ts", "export interface Person { name: string }");
        write(temp.path(), "src/schemas/Car.ts", "interface Car { model: string }\nexport default Car;");
        write(temp.path(), "src/schemas/Owner.ts", "export interface Owner { id: string }");
        write(
            temp.path(),
            "src/schemas/index.ts",
            "export * from \"./Person\";\nexport { Owner as Keeper } from \"./Owner\";",
        );
        let handler = write(
            temp.path(),
            "src/handlers/GetCar.ts",
            "import { Person, Keeper } from \"../schemas\";\nimport Car from \"../schemas/Car\";",
        );

        let mut sources = SourceSet::new().unwrap();
        let person = sources.resolve_type(&handler, "Person").unwrap().unwrap();
        assert_eq!(person.declaration.name(), "Person");
        let keeper = sources.resolve_type(&handler, "Keeper").unwrap().unwrap();
        assert_eq!(keeper.declaration.name(), "Owner");
        let car = sources.resolve_type(&handler, "Car").unwrap().unwrap();
        assert_eq!(car.declaration.name(), "Car");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d.ts")), PathBuf::from("/a/c/d.ts"));
    }
}
