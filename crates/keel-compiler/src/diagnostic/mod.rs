//! Diagnostic types for error reporting.

mod error;
mod span;

pub use error::{CompilerError, CompilerWarning};
pub use span::Span;
