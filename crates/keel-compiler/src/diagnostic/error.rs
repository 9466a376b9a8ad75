//! Compiler error types.
#![allow(unused_assignments)]

use std::fmt;
use std::path::PathBuf;
use miette::Diagnostic;
use thiserror::Error;

use super::Span;

/// Errors that can occur during compilation.
///
/// Every variant is fatal to the build step that produced it. The build
/// computes all output in memory first, so an error never leaves partially
/// generated files behind.
#[allow(unused_assignments)]
#[derive(Error, Diagnostic, Debug)]
pub enum CompilerError {
    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("Failed to read file '{path}': {message}")]
    #[diagnostic(code(keel::io::read_error))]
    IoError {
        path: PathBuf,
        message: String,
    },

    #[error("Invalid exclude pattern '{pattern}': {message}")]
    #[diagnostic(code(keel::io::invalid_exclude))]
    InvalidExcludePattern {
        pattern: String,
        message: String,
    },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("Failed to initialize parser")]
    #[diagnostic(code(keel::parse::init_failed))]
    ParserInitFailed,

    #[error("Failed to parse file: {}", path.display())]
    #[diagnostic(code(keel::parse::parse_failed))]
    ParseFailed {
        path: PathBuf,
    },

    #[error("Syntax error: {message}")]
    #[diagnostic(code(keel::parse::syntax_error))]
    SyntaxError {
        message: String,
        file: PathBuf,
        line: usize,
        column: usize,
    },

    // =========================================================================
    // Handler Errors
    // =========================================================================
    #[error("Handler '{}' has no default export", file.display())]
    #[diagnostic(
        code(keel::handler::missing_default_export),
        help("Export the handler function as default: `export default getCar;`")
    )]
    MissingDefaultExport {
        file: PathBuf,
    },

    #[error("Default export of handler '{}' is not typed as a handler: {found}", file.display())]
    #[diagnostic(
        code(keel::handler::untyped_handler),
        help("Declare the handler as `const handler: Handler<Ctx, Req, Res> = ...` or `GetHandler<Ctx, Res>`")
    )]
    UntypedHandler {
        file: PathBuf,
        found: String,
    },

    #[error("Two handlers are named '{name}' ({} and {})", first.display(), second.display())]
    #[diagnostic(
        code(keel::handler::duplicate_name),
        help("Handler names key generated schemas and the manifest; rename one of the files")
    )]
    DuplicateHandlerName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Invalid schema type `{type_text}` in handler '{}'", file.display())]
    #[diagnostic(
        code(keel::schema::invalid_schema_type),
        help("Schemas must be interfaces (or `any`) residing in the schemas directory (src/schemas)")
    )]
    InvalidSchemaType {
        file: PathBuf,
        type_text: String,
    },

    // =========================================================================
    // Type Errors
    // =========================================================================
    #[error("Unknown type reference '{name}' in '{}'", file.display())]
    #[diagnostic(
        code(keel::types::unknown_reference),
        help("Declare the type in the same file or import it with a relative import")
    )]
    UnresolvedType {
        name: String,
        file: PathBuf,
    },

    #[error("Failed to generate JSON schema for '{name}': {message}")]
    #[diagnostic(code(keel::schema::generation_failed))]
    SchemaGenerationFailed {
        name: String,
        message: String,
    },

    #[error("Conflicting definitions named '{name}' ({} and {})", first.display(), second.display())]
    #[diagnostic(
        code(keel::schema::duplicate_definition),
        help("Schema names share one namespace; rename one of the declarations")
    )]
    DuplicateDefinition {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    // =========================================================================
    // Code Generation Errors
    // =========================================================================
    #[error("Failed to generate code: {message}")]
    #[diagnostic(code(keel::codegen::generation_failed))]
    CodegenFailed {
        message: String,
    },
}

impl CompilerError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::IoError {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A soft build problem. The build continues and the affected route simply
/// has no schema enforced for that side.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerWarning {
    pub file: Option<PathBuf>,
    pub line: Option<usize>,
    pub message: String,
}

impl CompilerWarning {
    pub fn new(file: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::emit(Self {
            file,
            line: None,
            message: message.into(),
        })
    }

    /// A warning pointing at a declaration.
    pub fn at(span: &Span, message: impl Into<String>) -> Self {
        Self::emit(Self {
            file: Some(span.file.clone()),
            line: Some(span.line),
            message: message.into(),
        })
    }

    fn emit(warning: Self) -> Self {
        tracing::warn!("{}", warning);
        warning
    }
}

impl fmt::Display for CompilerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: {}", file.display(), line, self.message),
            (Some(file), None) => write!(f, "{}: {}", file.display(), self.message),
            _ => f.write_str(&self.message),
        }
    }
}
