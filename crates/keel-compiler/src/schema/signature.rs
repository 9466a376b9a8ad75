//! Handler signature inspection.
//!
//! A handler module default-exports a variable typed with one of two generic
//! aliases:
//!
//! ```text
//! Handler<Ctx, Req, Res, Params?, Query?>
//! GetHandler<Ctx, Res, Params?, Query?>
//! ```
//!
//! The two are told apart by the alias name, never by argument count, since
//! `Handler<Ctx, Req, Res>` and `GetHandler<Ctx, Res, Params>` both take three.

use std::path::PathBuf;

use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::{DefaultExport, ParsedFile, TypeNode, TypeReference};

/// The shape of a handler's generic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// `GetHandler<Ctx, Res, ...>`: no request body.
    Get,
    /// `Handler<Ctx, Req, Res, ...>`
    Full,
}

/// A schema-bearing type argument.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaArg {
    pub node: TypeNode,
    /// Source text as written, e.g. `{ model: string }[]`.
    pub text: String,
}

impl SchemaArg {
    pub fn is_any(&self) -> bool {
        self.node.is_any()
    }
}

/// The handler type of a handler module's default export.
#[derive(Debug, Clone)]
pub struct HandlerSignature {
    pub file: PathBuf,
    pub kind: HandlerKind,
    /// Name of the handler alias as written, e.g. `GetHandler`.
    pub type_name: String,
    pub req: Option<SchemaArg>,
    pub res: Option<SchemaArg>,
}

/// Reads the handler signature from a parsed handler module.
pub fn handler_signature(file: &ParsedFile) -> Result<HandlerSignature, CompilerError> {
    let untyped = |found: &str| CompilerError::UntypedHandler {
        file: file.path.clone(),
        found: found.to_string(),
    };

    let name = match &file.default_export {
        None => {
            return Err(CompilerError::MissingDefaultExport {
                file: file.path.clone(),
            })
        }
        Some(DefaultExport::Identifier(name)) => name,
        Some(DefaultExport::Function { name }) => {
            return Err(untyped(&format!(
                "function {}",
                name.as_deref().unwrap_or("<anonymous>")
            )))
        }
        Some(DefaultExport::Expression(text)) => return Err(untyped(text)),
    };

    let variable = file
        .variable(name)
        .ok_or_else(|| untyped(name))?;

    let reference = match &variable.type_annotation {
        Some(TypeNode::Reference(reference)) => reference,
        Some(_) | None => return Err(untyped(name)),
    };

    let kind = classify(&reference.name).ok_or_else(|| untyped(&reference.name))?;

    let (req, res) = match kind {
        HandlerKind::Get => (None, schema_arg(reference, 1)),
        HandlerKind::Full => (schema_arg(reference, 1), schema_arg(reference, 2)),
    };

    Ok(HandlerSignature {
        file: file.path.clone(),
        kind,
        type_name: reference.name.clone(),
        req,
        res,
    })
}

/// `GetHandler` (and namespaced forms like `keel.GetHandler`) is checked
/// first since it also ends with `Handler`.
fn classify(type_name: &str) -> Option<HandlerKind> {
    if type_name.contains("GetHandler") {
        Some(HandlerKind::Get)
    } else if type_name.ends_with("Handler") {
        Some(HandlerKind::Full)
    } else {
        None
    }
}

fn schema_arg(reference: &TypeReference, index: usize) -> Option<SchemaArg> {
    let node = reference.args.get(index)?.clone();
    let text = reference.arg_texts.get(index).cloned().unwrap_or_default();
    Some(SchemaArg { node, text })
}
