//! Handler schema analysis and JSON Schema generation.
//!
//! - [`signature`] reads the handler type of a handler module.
//! - [`extractor`] resolves schema arguments strictly to interface names.
//! - [`synthesizer`] generates named interfaces for inline and array types.
//! - [`json_schema`] turns declarations into one draft-07 document.

pub mod extractor;
pub mod json_schema;
pub mod signature;
pub mod synthesizer;

pub use extractor::{extract, SchemaNames};
pub use json_schema::{SchemaDocument, SchemaGenerator, DRAFT_07};
pub use signature::{handler_signature, HandlerKind, HandlerSignature, SchemaArg};
pub use synthesizer::{Side, SynthesizedSchema, Synthesizer};
