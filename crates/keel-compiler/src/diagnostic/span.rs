//! Source locations.

use std::fmt;
use std::path::PathBuf;

/// Where a declaration starts. `line` and `column` are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl Span {
    /// From a zero-based tree-sitter row/column pair.
    pub fn from_point(file: PathBuf, row: usize, column: usize) -> Self {
        Self {
            file,
            line: row + 1,
            column: column + 1,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}
