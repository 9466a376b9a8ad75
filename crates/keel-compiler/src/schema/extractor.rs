//! Strict schema extraction.
//!
//! Each schema-bearing type argument must be `any` (no schema) or the name of
//! an interface. Anything else is rejected with the offending type text.

use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::{Declaration, TypeNode};
use crate::frontend::SourceSet;

use super::signature::{HandlerSignature, SchemaArg};

/// Request and response schema names of one handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaNames {
    pub req: Option<String>,
    pub res: Option<String>,
}

/// Extracts the request and response schema names of a handler.
pub fn extract(sources: &mut SourceSet, signature: &HandlerSignature) -> Result<SchemaNames, CompilerError> {
    Ok(SchemaNames {
        req: extract_one(sources, signature, signature.req.as_ref())?,
        res: extract_one(sources, signature, signature.res.as_ref())?,
    })
}

fn extract_one(
    sources: &mut SourceSet,
    signature: &HandlerSignature,
    arg: Option<&SchemaArg>,
) -> Result<Option<String>, CompilerError> {
    let Some(arg) = arg else {
        return Ok(None);
    };
    if arg.is_any() {
        return Ok(None);
    }

    let invalid = || CompilerError::InvalidSchemaType {
        file: signature.file.clone(),
        type_text: arg.text.clone(),
    };

    let reference = match &arg.node {
        TypeNode::Reference(reference) if reference.args.is_empty() => reference,
        _ => return Err(invalid()),
    };

    match sources.resolve_type(&signature.file, &reference.name)? {
        Some(resolved) => match resolved.declaration {
            Declaration::Interface(iface) => Ok(Some(iface.name)),
            _ => Err(invalid()),
        },
        None => Err(CompilerError::UnresolvedType {
            name: reference.name.clone(),
            file: signature.file.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::signature::handler_signature;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn project(handler_source: &str) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let schemas = temp.path().join("src/schemas");
        let handlers = temp.path().join("src/handlers");
        fs::create_dir_all(&schemas).unwrap();
        fs::create_dir_all(&handlers).unwrap();
        fs::write(schemas.join("Car.ts"), "export interface Car { model: string }").unwrap();
        fs::write(schemas.join("CarInput.ts"), "export interface CarInput { model: string }").unwrap();
        let handler = handlers.join("GetCar.ts");
        fs::write(&handler, handler_source).unwrap();
        (temp, handler)
    }

    fn run(path: &Path) -> Result<SchemaNames, CompilerError> {
        let mut sources = SourceSet::new().unwrap();
        let file = sources.load(path).unwrap();
        let signature = handler_signature(&file)?;
        extract(&mut sources, &signature)
    }

    #[test]
    fn test_get_handler_yields_response_schema_only() {
        let (_temp, handler) = project(
            r#"
            import { Car } from "../schemas/Car";
            const getCar: GetHandler<Ctx, Car> = async () => ({ data: { model: "Volvo" } });
            export default getCar;
            "#,
        );

        let names = run(&handler).unwrap();
        assert_eq!(names.req, None);
        assert_eq!(names.res.as_deref(), Some("Car"));
    }

    #[test]
    fn test_full_handler_yields_both_schemas() {
        let (_temp, handler) = project(
            r#"
            import { Car } from "../schemas/Car";
            import { CarInput } from "../schemas/CarInput";
            const postCar: Handler<Ctx, CarInput, Car> = async () => ({ data: { model: "Volvo" } });
            export default postCar;
            "#,
        );

        let names = run(&handler).unwrap();
        assert_eq!(names.req.as_deref(), Some("CarInput"));
        assert_eq!(names.res.as_deref(), Some("Car"));
    }

    #[test]
    fn test_any_means_no_schema() {
        let (_temp, handler) = project(
            "const postCar: Handler<Ctx, any, any> = async () => ({});\nexport default postCar;",
        );

        assert_eq!(run(&handler).unwrap(), SchemaNames::default());
    }

    #[test]
    fn test_non_interface_type_names_file_and_text() {
        let (_temp, handler) = project(
            r#"
            import { Car } from "../schemas/Car";
            const getCar: GetHandler<Ctx, Car | string> = async () => ({ data: "x" });
            export default getCar;
            "#,
        );

        let err = run(&handler).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Car | string"), "{}", message);
        assert!(message.contains("GetCar.ts"), "{}", message);
    }

    #[test]
    fn test_inline_literal_is_rejected() {
        let (_temp, handler) = project(
            "const getCar: GetHandler<Ctx, { model: string }> = async () => ({});\nexport default getCar;",
        );

        assert!(matches!(run(&handler), Err(CompilerError::InvalidSchemaType { .. })));
    }
}
