//! TypeScript-specific AST types.
//!
//! Only the declaration surface the compiler needs is modelled: imports and
//! re-exports, interfaces, type aliases, enums, top-level variables and the
//! default export. Function bodies are never inspected.

use std::path::PathBuf;
use crate::diagnostic::Span;

/// A parsed TypeScript file.
#[derive(Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub imports: Vec<ImportDecl>,
    pub re_exports: Vec<ReExportDecl>,
    pub interfaces: Vec<InterfaceDecl>,
    pub type_aliases: Vec<TypeAlias>,
    pub enums: Vec<EnumDecl>,
    pub variables: Vec<VariableDecl>,
    pub default_export: Option<DefaultExport>,
}

impl ParsedFile {
    /// Finds a type-level declaration (interface, alias or enum) by name.
    pub fn declaration(&self, name: &str) -> Option<Declaration> {
        if let Some(iface) = self.interfaces.iter().find(|i| i.name == name) {
            return Some(Declaration::Interface(iface.clone()));
        }
        if let Some(alias) = self.type_aliases.iter().find(|a| a.name == name) {
            return Some(Declaration::Alias(alias.clone()));
        }
        self.enums
            .iter()
            .find(|e| e.name == name)
            .map(|e| Declaration::Enum(e.clone()))
    }

    /// Finds the import that binds `local_name` in this file.
    pub fn import_of(&self, local_name: &str) -> Option<(&ImportDecl, &ImportSpecifier)> {
        self.imports.iter().find_map(|import| {
            import
                .specifiers
                .iter()
                .find(|s| s.local_name() == local_name)
                .map(|s| (import, s))
        })
    }

    /// Finds a top-level variable by name.
    pub fn variable(&self, name: &str) -> Option<&VariableDecl> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// An import declaration.
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub specifiers: Vec<ImportSpecifier>,
    pub source: String,
    pub span: Span,
}

/// An import specifier. `name` is the name exported by the source module,
/// `alias` the local binding when renamed with `as`.
#[derive(Debug, Clone)]
pub struct ImportSpecifier {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportSpecifier {
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// `export { A, B as C } from "./x"` or `export * from "./x"`.
#[derive(Debug, Clone)]
pub struct ReExportDecl {
    /// Empty for a star re-export.
    pub specifiers: Vec<ImportSpecifier>,
    pub source: String,
}

/// A named type-level declaration.
#[derive(Debug, Clone)]
pub enum Declaration {
    Interface(InterfaceDecl),
    Alias(TypeAlias),
    Enum(EnumDecl),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Interface(i) => &i.name,
            Declaration::Alias(a) => &a.name,
            Declaration::Enum(e) => &e.name,
        }
    }

    pub fn exported(&self) -> bool {
        match self {
            Declaration::Interface(i) => i.exported,
            Declaration::Alias(a) => a.exported,
            Declaration::Enum(e) => e.exported,
        }
    }

    /// Source text of the declaration without a leading `export`.
    pub fn text(&self) -> &str {
        match self {
            Declaration::Interface(i) => &i.text,
            Declaration::Alias(a) => &a.text,
            Declaration::Enum(e) => &e.text,
        }
    }
}

/// An interface declaration.
#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub type_parameters: Vec<String>,
    pub extends: Vec<TypeNode>,
    pub body: ObjectTypeNode,
    /// Raw text of the body including the braces.
    pub body_text: String,
    pub text: String,
    pub exported: bool,
    pub span: Span,
}

/// A type alias declaration.
#[derive(Debug, Clone)]
pub struct TypeAlias {
    pub name: String,
    pub type_parameters: Vec<String>,
    pub type_node: TypeNode,
    pub text: String,
    pub exported: bool,
    pub span: Span,
}

/// An enum declaration.
#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
    pub text: String,
    pub exported: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: String,
    pub value: Option<LiteralType>,
}

/// A top-level `const`/`let`/`var` declarator.
#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: String,
    pub type_annotation: Option<TypeNode>,
    pub initializer: Option<Expr>,
    pub exported: bool,
    pub span: Span,
}

/// What follows `export default`.
#[derive(Debug, Clone)]
pub enum DefaultExport {
    /// `export default getCar;` or `export { getCar as default }`
    Identifier(String),
    /// `export default async function name() {}` or an inline arrow function.
    Function { name: Option<String> },
    /// Anything else, kept as source text.
    Expression(String),
}

/// Type AST nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    /// string, number, boolean, any, unknown, null, undefined, ...
    Primitive(String),

    /// "Created", 42, true
    Literal(LiteralType),

    /// T[]
    Array(Box<TypeNode>),

    /// [A, B]
    Tuple(Vec<TypeNode>),

    /// T | U
    Union(Vec<TypeNode>),

    /// T & U
    Intersection(Vec<TypeNode>),

    /// { field: T; other?: U; [key: string]: V }
    Object(ObjectTypeNode),

    /// Reference to another type, possibly generic: Car, Array<Car>, Handler<Ctx, Req, Res>
    Reference(TypeReference),

    /// T | undefined
    Optional(Box<TypeNode>),

    /// Function types, mapped/conditional types and the like.
    Unsupported(String),
}

impl TypeNode {
    pub fn is_any(&self) -> bool {
        matches!(self, TypeNode::Primitive(p) if p == "any")
    }
}

/// A (possibly generic) type reference.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeReference {
    pub name: String,
    pub args: Vec<TypeNode>,
    /// Source text of each type argument, used in diagnostics.
    pub arg_texts: Vec<String>,
}

/// An object type literal or interface body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectTypeNode {
    pub properties: Vec<ObjectProperty>,
    /// Value type of a `[key: string]: T` index signature.
    pub index: Option<Box<TypeNode>>,
}

/// A property in an object literal type.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperty {
    pub name: String,
    pub type_node: TypeNode,
    pub optional: bool,
}

/// Literal types.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralType {
    String(String),
    Number(f64),
    Boolean(bool),
}

/// A constant expression, as found in route and job metadata objects.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    Array(Vec<Expr>),
    Object(Vec<ObjectEntry>),
    /// `HttpMethod.get`
    Member { object: String, property: String },
    Identifier(String),
    Function,
    Other(String),
}

/// A key in an object literal expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectEntry {
    Pair { key: String, value: Expr },
    /// `{ path }`
    Shorthand(String),
}
