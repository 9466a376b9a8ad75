//! Schema synthesis for handlers whose schema argument is not a bare
//! interface name.
//!
//! Every synthesized schema is a standalone module under `.keel/schemas`
//! declaring `{Handler}_{ReqSchema|ResSchema}`:
//!
//! | Type argument                    | Synthesized declaration                                  |
//! |----------------------------------|----------------------------------------------------------|
//! | interface from another file      | `extends Car {}` plus an import of `Car`                 |
//! | interface from the handler file  | redeclared with the same members                         |
//! | `Car[]` / `Array<Car>`           | `extends Array<Car> {}`                                  |
//! | `{ ... }[]`                      | local `_Item` interface, then `extends Array<..._Item>`  |
//! | `{ ... }`                        | interface whose body is the literal                      |
//!
//! Any other shape is skipped with a warning. Types the synthesized body
//! refers to are imported from their modules, or copied in when they are
//! declared in the handler file itself.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codegen::naming::module_specifier;
use crate::diagnostic::{CompilerError, CompilerWarning};
use crate::frontend::typescript::ast::{Declaration, ObjectTypeNode, ParsedFile, TypeNode};
use crate::frontend::SourceSet;

use super::signature::{HandlerSignature, SchemaArg};

/// Names resolved by the TypeScript standard library.
const BUILTIN_TYPES: &[&str] = &["Array", "ReadonlyArray", "Record", "Partial", "Promise", "Date"];

/// Which side of a handler a schema describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Req,
    Res,
}

impl Side {
    fn suffix(&self) -> &'static str {
        match self {
            Side::Req => "ReqSchema",
            Side::Res => "ResSchema",
        }
    }
}

/// A generated schema module.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedSchema {
    pub name: String,
    /// Where the module is written, inside the schemas output directory.
    pub path: PathBuf,
    pub source: String,
}

/// Synthesizes schema modules into `out_dir`.
pub struct Synthesizer<'a> {
    sources: &'a mut SourceSet,
    out_dir: PathBuf,
    warnings: Vec<CompilerWarning>,
}

impl<'a> Synthesizer<'a> {
    pub fn new(sources: &'a mut SourceSet, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            sources,
            out_dir: out_dir.into(),
            warnings: Vec::new(),
        }
    }

    pub fn into_warnings(self) -> Vec<CompilerWarning> {
        self.warnings
    }

    /// Synthesizes the schema for one side of a handler.
    ///
    /// Returns `Ok(None)` when the side has no schema (`any`, absent, or an
    /// unsupported shape that was skipped with a warning).
    pub fn synthesize(
        &mut self,
        signature: &HandlerSignature,
        base_name: &str,
        side: Side,
    ) -> Result<Option<SynthesizedSchema>, CompilerError> {
        let arg = match side {
            Side::Req => signature.req.as_ref(),
            Side::Res => signature.res.as_ref(),
        };
        let Some(arg) = arg else {
            return Ok(None);
        };
        if arg.is_any() {
            return Ok(None);
        }

        let handler = self.sources.load(&signature.file)?;
        let name = format!("{}_{}", base_name, side.suffix());
        let mut module = Module::new(&name);

        let declaration = match &arg.node {
            TypeNode::Reference(reference) if reference.args.is_empty() && !is_builtin(&reference.name) => {
                match self.named(&handler, &reference.name, &name, &mut module)? {
                    Some(declaration) => declaration,
                    None => return Ok(None),
                }
            }
            TypeNode::Object(_) => {
                self.require(&handler, &arg.node, &mut module)?;
                format!("export interface {} {}", name, arg.text.trim())
            }
            node => match array_element(node) {
                Some(element) => match self.array(&handler, arg, element, &name, &mut module)? {
                    Some(declaration) => declaration,
                    None => return Ok(None),
                },
                None => {
                    self.skip(signature, arg);
                    return Ok(None);
                }
            },
        };

        let source = module.render(&declaration, &handler.path);
        Ok(Some(SynthesizedSchema {
            path: self.out_dir.join(format!("{}.ts", name)),
            name,
            source,
        }))
    }

    /// `Handler<Ctx, Car, ...>` where `Car` is declared somewhere.
    fn named(
        &mut self,
        handler: &Arc<ParsedFile>,
        type_name: &str,
        name: &str,
        module: &mut Module,
    ) -> Result<Option<String>, CompilerError> {
        if let Some(declaration) = handler.declaration(type_name) {
            return match &declaration {
                Declaration::Interface(iface) => {
                    // Same file: copy the members rather than extending, so the
                    // synthesized name never collides with the original.
                    let header = interface_header(&iface.text, &iface.name, &iface.body_text);
                    for parent in &iface.extends {
                        self.require(handler, parent, module)?;
                    }
                    self.require_object(handler, &iface.body, module)?;
                    Ok(Some(format!("export interface {}{} {}", name, header, iface.body_text)))
                }
                Declaration::Alias(_) => {
                    self.copy_local(handler, &declaration, module)?;
                    Ok(Some(format!("export interface {} extends {} {{}}", name, type_name)))
                }
                Declaration::Enum(_) => {
                    self.skip_named(handler, type_name);
                    Ok(None)
                }
            };
        }

        match self.sources.resolve_type(&handler.path, type_name)? {
            Some(resolved) if matches!(resolved.declaration, Declaration::Enum(_)) => {
                self.skip_named(handler, type_name);
                Ok(None)
            }
            Some(_) => {
                self.import(handler, type_name, module)?;
                Ok(Some(format!("export interface {} extends {} {{}}", name, type_name)))
            }
            None => Err(CompilerError::UnresolvedType {
                name: type_name.to_string(),
                file: handler.path.clone(),
            }),
        }
    }

    /// `Car[]`, `Array<Car>` or `{ ... }[]`.
    fn array(
        &mut self,
        handler: &Arc<ParsedFile>,
        arg: &SchemaArg,
        element: &TypeNode,
        name: &str,
        module: &mut Module,
    ) -> Result<Option<String>, CompilerError> {
        let item = match element {
            TypeNode::Reference(reference) if reference.args.is_empty() => {
                self.require(handler, element, module)?;
                reference.name.clone()
            }
            TypeNode::Object(_) => {
                let item = format!("{}_Item", name);
                self.require(handler, element, module)?;
                module.locals.push(format!("interface {} {}", item, element_text(&arg.text)));
                item
            }
            _ => {
                self.warnings.push(CompilerWarning::new(
                    Some(handler.path.clone()),
                    format!("unsupported array element type `{}`, no schema generated", arg.text),
                ));
                return Ok(None);
            }
        };
        Ok(Some(format!("export interface {} extends Array<{}> {{}}", name, item)))
    }

    /// Imports or copies every type `node` refers to.
    fn require(&mut self, from: &Arc<ParsedFile>, node: &TypeNode, module: &mut Module) -> Result<(), CompilerError> {
        let mut names = Vec::new();
        collect_references(node, &mut names);
        for type_name in names {
            if module.known.contains(&type_name) {
                continue;
            }
            if let Some(declaration) = from.declaration(&type_name) {
                self.copy_local(from, &declaration, module)?;
            } else if from.import_of(&type_name).is_some() {
                self.import(from, &type_name, module)?;
            } else {
                return Err(CompilerError::UnresolvedType {
                    name: type_name,
                    file: from.path.clone(),
                });
            }
        }
        Ok(())
    }

    fn require_object(
        &mut self,
        from: &Arc<ParsedFile>,
        body: &ObjectTypeNode,
        module: &mut Module,
    ) -> Result<(), CompilerError> {
        self.require(from, &TypeNode::Object(body.clone()), module)
    }

    /// Copies a declaration from the handler file into the synthesized module,
    /// together with whatever it depends on.
    fn copy_local(&mut self, from: &Arc<ParsedFile>, declaration: &Declaration, module: &mut Module) -> Result<(), CompilerError> {
        if !module.known.insert(declaration.name().to_string()) {
            return Ok(());
        }
        module.locals.push(declaration.text().to_string());

        match declaration {
            Declaration::Interface(iface) => {
                for parent in &iface.extends {
                    self.require(from, parent, module)?;
                }
                self.require_object(from, &iface.body, module)
            }
            Declaration::Alias(alias) => self.require(from, &alias.type_node, module),
            Declaration::Enum(_) => Ok(()),
        }
    }

    /// Re-imports a type the handler file imports, relative to `out_dir`.
    fn import(&mut self, from: &Arc<ParsedFile>, type_name: &str, module: &mut Module) -> Result<(), CompilerError> {
        let Some((import, specifier)) = from.import_of(type_name) else {
            return Err(CompilerError::UnresolvedType {
                name: type_name.to_string(),
                file: from.path.clone(),
            });
        };

        let source = match self.sources.resolve_module(&from.path, &import.source) {
            Some(target) => module_specifier(&self.out_dir, &target),
            None => import.source.clone(),
        };

        module.known.insert(type_name.to_string());
        let entry = module.imports.entry(source).or_default();
        if specifier.name == "default" {
            entry.default = Some(type_name.to_string());
        } else if specifier.name == type_name {
            entry.named.insert(type_name.to_string());
        } else {
            entry.named.insert(format!("{} as {}", specifier.name, type_name));
        }
        Ok(())
    }

    fn skip(&mut self, signature: &HandlerSignature, arg: &SchemaArg) {
        self.warnings.push(CompilerWarning::new(
            Some(signature.file.clone()),
            format!("unsupported schema type `{}`, no schema generated", arg.text),
        ));
    }

    fn skip_named(&mut self, handler: &ParsedFile, type_name: &str) {
        self.warnings.push(CompilerWarning::new(
            Some(handler.path.clone()),
            format!("`{}` is an enum and cannot be used as a schema, no schema generated", type_name),
        ));
    }
}

/// Imports and local declarations of one synthesized module.
struct Module {
    imports: BTreeMap<String, ImportLine>,
    locals: Vec<String>,
    known: HashSet<String>,
}

#[derive(Default)]
struct ImportLine {
    default: Option<String>,
    named: BTreeSet<String>,
}

impl Module {
    fn new(name: &str) -> Self {
        let mut known = HashSet::new();
        known.insert(name.to_string());
        Self {
            imports: BTreeMap::new(),
            locals: Vec::new(),
            known,
        }
    }

    fn render(&self, declaration: &str, handler: &Path) -> String {
        let mut out = String::new();
        let handler_name = handler
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        out.push_str(&format!("// Generated by keel from {}. Do not edit.\n", handler_name));

        if !self.imports.is_empty() {
            out.push('\n');
        }
        for (source, line) in &self.imports {
            let mut parts = Vec::new();
            if let Some(default) = &line.default {
                parts.push(default.clone());
            }
            if !line.named.is_empty() {
                let named: Vec<&str> = line.named.iter().map(String::as_str).collect();
                parts.push(format!("{{ {} }}", named.join(", ")));
            }
            out.push_str(&format!("import {} from \"{}\";\n", parts.join(", "), source));
        }

        for local in &self.locals {
            out.push('\n');
            out.push_str(local);
            out.push('\n');
        }

        out.push('\n');
        out.push_str(declaration);
        out.push('\n');
        out
    }
}

fn is_builtin(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

fn array_element(node: &TypeNode) -> Option<&TypeNode> {
    match node {
        TypeNode::Array(element) => Some(element),
        TypeNode::Reference(reference)
            if matches!(reference.name.as_str(), "Array" | "ReadonlyArray") && reference.args.len() == 1 =>
        {
            reference.args.first()
        }
        _ => None,
    }
}

/// Source text of an inline array element: `{ a: string }[]` or
/// `Array<{ a: string }>` yields `{ a: string }`.
fn element_text(text: &str) -> String {
    let text = text.trim();
    let inner = if let Some(stripped) = text.strip_suffix("[]") {
        stripped.trim()
    } else if let Some(rest) = text.strip_prefix("ReadonlyArray<").or_else(|| text.strip_prefix("Array<")) {
        rest.strip_suffix('>').unwrap_or(rest).trim()
    } else {
        text
    };
    let inner = inner
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(inner);
    inner.trim().to_string()
}

/// The part of an interface declaration between its name and its body,
/// i.e. type parameters and the `extends` clause.
fn interface_header(text: &str, name: &str, body_text: &str) -> String {
    let Some(body_start) = text.rfind(body_text) else {
        return String::new();
    };
    let head = &text[..body_start];
    match head.find(name) {
        Some(idx) => head[idx + name.len()..].trim_end().to_string(),
        None => String::new(),
    }
}

/// Collects the names of non-builtin types referenced anywhere in `node`.
fn collect_references(node: &TypeNode, out: &mut Vec<String>) {
    match node {
        TypeNode::Reference(reference) => {
            // `ns.Type` comes from a namespace import and is left alone.
            if !is_builtin(&reference.name) && !reference.name.contains('.') && !out.contains(&reference.name) {
                out.push(reference.name.clone());
            }
            for arg in &reference.args {
                collect_references(arg, out);
            }
        }
        TypeNode::Array(inner) | TypeNode::Optional(inner) => collect_references(inner, out),
        TypeNode::Tuple(items) | TypeNode::Union(items) | TypeNode::Intersection(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        TypeNode::Object(object) => {
            for prop in &object.properties {
                collect_references(&prop.type_node, out);
            }
            if let Some(index) = &object.index {
                collect_references(index, out);
            }
        }
        TypeNode::Primitive(_) | TypeNode::Literal(_) | TypeNode::Unsupported(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::signature::handler_signature;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            fs::create_dir_all(temp.path().join("src/schemas")).unwrap();
            fs::create_dir_all(temp.path().join("src/handlers")).unwrap();
            fs::write(
                temp.path().join("src/schemas/Car.ts"),
                "export interface Car { model: string }",
            )
            .unwrap();
            Self { temp }
        }

        fn synthesize(&self, handler_source: &str, side: Side) -> (Option<SynthesizedSchema>, Vec<CompilerWarning>) {
            let path = self.temp.path().join("src/handlers/GetCar.ts");
            fs::write(&path, handler_source).unwrap();

            let mut sources = SourceSet::new().unwrap();
            let file = sources.load(&path).unwrap();
            let signature = handler_signature(&file).unwrap();
            let mut synthesizer = Synthesizer::new(&mut sources, self.temp.path().join(".keel/schemas"));
            let schema = synthesizer.synthesize(&signature, "GetCar", side).unwrap();
            (schema, synthesizer.into_warnings())
        }
    }

    #[test]
    fn test_imported_interface_is_extended() {
        let fixture = Fixture::new();
        let (schema, _) = fixture.synthesize(
            "import { Car } from \"../schemas/Car\";\nconst h: GetHandler<Ctx, Car> = async () => ({});\nexport default h;",
            Side::Res,
        );

        let schema = schema.unwrap();
        assert_eq!(schema.name, "GetCar_ResSchema");
        assert!(schema.path.ends_with(".keel/schemas/GetCar_ResSchema.ts"));
        assert!(schema.source.contains("import { Car } from \"../../src/schemas/Car\";"));
        assert!(schema.source.contains("export interface GetCar_ResSchema extends Car {}"));
    }

    #[test]
    fn test_same_file_interface_is_redeclared() {
        let fixture = Fixture::new();
        let (schema, _) = fixture.synthesize(
            r#"
import { Car } from "../schemas/Car";
interface Garage { cars: Car[]; owner: Owner }
interface Owner { name: string }
const h: GetHandler<Ctx, Garage> = async () => ({});
export default h;
"#,
            Side::Res,
        );

        let source = schema.unwrap().source;
        assert!(source.contains("export interface GetCar_ResSchema { cars: Car[]; owner: Owner }"));
        assert!(source.contains("interface Owner { name: string }"));
        assert!(source.contains("import { Car } from"));
        assert!(!source.contains("interface Garage"));
    }

    #[test]
    fn test_arrays_extend_array() {
        let fixture = Fixture::new();
        let (schema, _) = fixture.synthesize(
            "import { Car } from \"../schemas/Car\";\nconst h: GetHandler<Ctx, Car[]> = async () => ({});\nexport default h;",
            Side::Res,
        );
        assert!(schema
            .unwrap()
            .source
            .contains("export interface GetCar_ResSchema extends Array<Car> {}"));

        let (schema, _) = fixture.synthesize(
            "const h: GetHandler<Ctx, { model: string }[]> = async () => ({});\nexport default h;",
            Side::Res,
        );
        let source = schema.unwrap().source;
        assert!(source.contains("interface GetCar_ResSchema_Item { model: string }"));
        assert!(source.contains("export interface GetCar_ResSchema extends Array<GetCar_ResSchema_Item> {}"));
    }

    #[test]
    fn test_inline_literal_becomes_interface_body() {
        let fixture = Fixture::new();
        let (schema, _) = fixture.synthesize(
            "import { Car } from \"../schemas/Car\";\nconst h: Handler<Ctx, { car: Car; note?: string }, any> = async () => ({});\nexport default h;",
            Side::Req,
        );

        let source = schema.unwrap().source;
        assert!(source.contains("export interface GetCar_ReqSchema { car: Car; note?: string }"));
        assert!(source.contains("import { Car } from"));
    }

    #[test]
    fn test_unsupported_shape_warns_and_skips() {
        let fixture = Fixture::new();
        let (schema, warnings) = fixture.synthesize(
            "const h: GetHandler<Ctx, string | number> = async () => ({});\nexport default h;",
            Side::Res,
        );

        assert!(schema.is_none());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("string | number"));
    }

    #[test]
    fn test_any_and_missing_sides_have_no_schema() {
        let fixture = Fixture::new();
        let (schema, warnings) = fixture.synthesize(
            "const h: GetHandler<Ctx, any> = async () => ({});\nexport default h;",
            Side::Res,
        );
        assert!(schema.is_none());
        assert!(warnings.is_empty());

        let (schema, _) = fixture.synthesize(
            "const h: GetHandler<Ctx, any> = async () => ({});\nexport default h;",
            Side::Req,
        );
        assert!(schema.is_none());
    }

    #[test]
    fn test_unknown_reference_is_fatal() {
        let fixture = Fixture::new();
        let path = fixture.temp.path().join("src/handlers/GetCar.ts");
        fs::write(
            &path,
            "const h: GetHandler<Ctx, { car: Missing }> = async () => ({});\nexport default h;",
        )
        .unwrap();

        let mut sources = SourceSet::new().unwrap();
        let file = sources.load(&path).unwrap();
        let signature = handler_signature(&file).unwrap();
        let mut synthesizer = Synthesizer::new(&mut sources, fixture.temp.path().join(".keel/schemas"));
        let result = synthesizer.synthesize(&signature, "GetCar", Side::Res);
        assert!(matches!(result, Err(CompilerError::UnresolvedType { ref name, .. }) if name == "Missing"));
    }

    #[test]
    fn test_element_text() {
        assert_eq!(element_text("{ a: string }[]"), "{ a: string }");
        assert_eq!(element_text("Array<{ a: string }>"), "{ a: string }");
        assert_eq!(element_text("({ a: string })[]"), "{ a: string }");
    }
}
