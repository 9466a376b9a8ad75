//! Language frontends.
//!
//! Only TypeScript is supported. The frontend parses handler, repository,
//! job and schema sources into a declaration-level AST and resolves type
//! names across relative imports.

pub mod typescript;

pub use typescript::{discover_sources, ResolvedType, SourceSet};
