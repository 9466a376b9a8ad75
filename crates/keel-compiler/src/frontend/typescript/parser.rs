//! TypeScript parser using tree-sitter.

use std::path::Path;
use tree_sitter::{Node, Parser};

use crate::diagnostic::{CompilerError, Span};
use super::ast::*;

/// TypeScript parser.
pub struct TypeScriptParser {
    parser: Parser,
}

impl TypeScriptParser {
    /// Creates a new TypeScript parser.
    pub fn new() -> Result<Self, CompilerError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .map_err(|_| CompilerError::ParserInitFailed)?;
        Ok(Self { parser })
    }

    /// Parses a TypeScript source file.
    pub fn parse(&mut self, source: &str, path: &Path) -> Result<ParsedFile, CompilerError> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| CompilerError::ParseFailed { path: path.to_path_buf() })?;

        let root = tree.root_node();
        let mut visitor = Visitor::new(source, path);
        visitor.visit_program(root)?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            imports: visitor.imports,
            re_exports: visitor.re_exports,
            interfaces: visitor.interfaces,
            type_aliases: visitor.type_aliases,
            enums: visitor.enums,
            variables: visitor.variables,
            default_export: visitor.default_export,
        })
    }
}

/// AST visitor that extracts declarations from tree-sitter nodes.
struct Visitor<'a> {
    source: &'a str,
    path: &'a Path,
    imports: Vec<ImportDecl>,
    re_exports: Vec<ReExportDecl>,
    interfaces: Vec<InterfaceDecl>,
    type_aliases: Vec<TypeAlias>,
    enums: Vec<EnumDecl>,
    variables: Vec<VariableDecl>,
    default_export: Option<DefaultExport>,
}

impl<'a> Visitor<'a> {
    fn new(source: &'a str, path: &'a Path) -> Self {
        Self {
            source,
            path,
            imports: Vec::new(),
            re_exports: Vec::new(),
            interfaces: Vec::new(),
            type_aliases: Vec::new(),
            enums: Vec::new(),
            variables: Vec::new(),
            default_export: None,
        }
    }

    fn span(&self, node: Node) -> Span {
        let start = node.start_position();
        Span::from_point(self.path.to_path_buf(), start.row, start.column)
    }

    fn node_text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn visit_program(&mut self, node: Node) -> Result<(), CompilerError> {
        if node.has_error() {
            if let Some(bad) = first_error(node) {
                return Err(CompilerError::SyntaxError {
                    message: format!("unexpected `{}`", truncate(self.node_text(bad), 40)),
                    file: self.path.to_path_buf(),
                    line: bad.start_position().row + 1,
                    column: bad.start_position().column + 1,
                });
            }
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_statement" => self.visit_import(child),
                "export_statement" => self.visit_export(child)?,
                other => self.visit_declaration(child, other, false)?,
            }
        }
        Ok(())
    }

    fn visit_declaration(&mut self, node: Node, kind: &str, exported: bool) -> Result<(), CompilerError> {
        match kind {
            "interface_declaration" => {
                if let Some(iface) = self.visit_interface(node, exported)? {
                    self.interfaces.push(iface);
                }
            }
            "type_alias_declaration" => {
                if let Some(alias) = self.visit_type_alias(node, exported)? {
                    self.type_aliases.push(alias);
                }
            }
            "enum_declaration" => {
                if let Some(decl) = self.visit_enum(node, exported) {
                    self.enums.push(decl);
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                self.visit_variable_declaration(node, exported)?;
            }
            _ => {}
        }
        Ok(())
    }

    // =========================================================================
    // Imports & exports
    // =========================================================================

    fn visit_import(&mut self, node: Node) {
        let mut source = String::new();
        let mut specifiers = Vec::new();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_clause" => specifiers = self.visit_import_clause(child),
                "string" => source = unquote(self.node_text(child)),
                _ => {}
            }
        }

        self.imports.push(ImportDecl {
            specifiers,
            source,
            span: self.span(node),
        });
    }

    fn visit_import_clause(&self, node: Node) -> Vec<ImportSpecifier> {
        let mut specifiers = Vec::new();
        let mut cursor = node.walk();

        for child in node.children(&mut cursor) {
            match child.kind() {
                // import Foo from "./foo"
                "identifier" => specifiers.push(ImportSpecifier {
                    name: "default".to_string(),
                    alias: Some(self.node_text(child).to_string()),
                }),
                "named_imports" => {
                    let mut inner_cursor = child.walk();
                    for spec in child.named_children(&mut inner_cursor) {
                        if spec.kind() == "import_specifier" {
                            specifiers.push(self.visit_specifier(spec));
                        }
                    }
                }
                _ => {}
            }
        }

        specifiers
    }

    /// Reads `name` / `name as alias` from an import or export specifier.
    fn visit_specifier(&self, node: Node) -> ImportSpecifier {
        let name = node
            .child_by_field_name("name")
            .map(|n| unquote(self.node_text(n)))
            .unwrap_or_default();
        let alias = node
            .child_by_field_name("alias")
            .map(|n| unquote(self.node_text(n)));
        ImportSpecifier { name, alias }
    }

    fn visit_export(&mut self, node: Node) -> Result<(), CompilerError> {
        let source = node
            .child_by_field_name("source")
            .map(|s| unquote(self.node_text(s)));

        let mut is_default = false;
        let mut is_star = false;
        let mut clause = None;

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "default" => is_default = true,
                "*" => is_star = true,
                "export_clause" => clause = Some(child),
                _ => {}
            }
        }

        if is_default {
            // export default interface Car {}
            if let Some(decl) = node.child_by_field_name("declaration") {
                let kind = decl.kind();
                if matches!(kind, "interface_declaration" | "type_alias_declaration" | "enum_declaration") {
                    self.visit_declaration(decl, kind, true)?;
                    if let Some(name) = decl.child_by_field_name("name") {
                        self.default_export =
                            Some(DefaultExport::Identifier(self.node_text(name).to_string()));
                    }
                    return Ok(());
                }
            }
            self.default_export = Some(self.visit_default_export(node));
            return Ok(());
        }

        if let Some(source) = source {
            let specifiers = clause.map(|c| self.visit_export_clause(c)).unwrap_or_default();
            if is_star || !specifiers.is_empty() {
                self.re_exports.push(ReExportDecl { specifiers, source });
            }
            return Ok(());
        }

        if let Some(clause) = clause {
            // export { getCar as default }
            for spec in self.visit_export_clause(clause) {
                if spec.alias.as_deref() == Some("default") {
                    self.default_export = Some(DefaultExport::Identifier(spec.name));
                }
            }
            return Ok(());
        }

        if let Some(decl) = node.child_by_field_name("declaration") {
            let kind = decl.kind();
            self.visit_declaration(decl, kind, true)?;
        }
        Ok(())
    }

    fn visit_export_clause(&self, node: Node) -> Vec<ImportSpecifier> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|c| c.kind() == "export_specifier")
            .map(|c| self.visit_specifier(c))
            .collect()
    }

    fn visit_default_export(&self, node: Node) -> DefaultExport {
        if let Some(decl) = node.child_by_field_name("declaration") {
            if matches!(decl.kind(), "function_declaration" | "generator_function_declaration") {
                let name = decl
                    .child_by_field_name("name")
                    .map(|n| self.node_text(n).to_string());
                return DefaultExport::Function { name };
            }
            return DefaultExport::Expression(self.node_text(decl).to_string());
        }

        match node.child_by_field_name("value") {
            Some(value) => match value.kind() {
                "identifier" => DefaultExport::Identifier(self.node_text(value).to_string()),
                "arrow_function" | "function_expression" | "function" => {
                    DefaultExport::Function { name: None }
                }
                _ => DefaultExport::Expression(self.node_text(value).to_string()),
            },
            None => DefaultExport::Expression(self.node_text(node).to_string()),
        }
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn visit_interface(&self, node: Node, exported: bool) -> Result<Option<InterfaceDecl>, CompilerError> {
        let name = match node.child_by_field_name("name") {
            Some(n) => self.node_text(n).to_string(),
            None => return Ok(None),
        };

        let type_parameters = self.visit_type_parameters(node);
        let mut extends = Vec::new();
        let mut body = ObjectTypeNode::default();
        let mut body_text = String::from("{}");

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "extends_type_clause" => {
                    let mut inner = child.walk();
                    for ty in child.named_children(&mut inner) {
                        extends.push(self.visit_type_node(ty)?);
                    }
                }
                "interface_body" | "object_type" => {
                    body = self.visit_object_type(child)?;
                    body_text = self.node_text(child).to_string();
                }
                _ => {}
            }
        }

        Ok(Some(InterfaceDecl {
            name,
            type_parameters,
            extends,
            body,
            body_text,
            text: self.node_text(node).to_string(),
            exported,
            span: self.span(node),
        }))
    }

    fn visit_type_alias(&self, node: Node, exported: bool) -> Result<Option<TypeAlias>, CompilerError> {
        let name = match node.child_by_field_name("name") {
            Some(n) => self.node_text(n).to_string(),
            None => return Ok(None),
        };

        let type_node = match node.child_by_field_name("value") {
            Some(value) => self.visit_type_node(value)?,
            None => TypeNode::Primitive("unknown".to_string()),
        };

        Ok(Some(TypeAlias {
            name,
            type_parameters: self.visit_type_parameters(node),
            type_node,
            text: self.node_text(node).to_string(),
            exported,
            span: self.span(node),
        }))
    }

    fn visit_type_parameters(&self, node: Node) -> Vec<String> {
        let Some(params) = node.child_by_field_name("type_parameters") else {
            return Vec::new();
        };
        let mut cursor = params.walk();
        params
            .named_children(&mut cursor)
            .filter(|p| p.kind() == "type_parameter")
            .filter_map(|p| p.child_by_field_name("name"))
            .map(|n| self.node_text(n).to_string())
            .collect()
    }

    fn visit_enum(&self, node: Node, exported: bool) -> Option<EnumDecl> {
        let name = self.node_text(node.child_by_field_name("name")?).to_string();
        let mut members = Vec::new();

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.named_children(&mut cursor) {
                match member.kind() {
                    "property_identifier" | "string" => members.push(EnumMember {
                        name: unquote(self.node_text(member)),
                        value: None,
                    }),
                    "enum_assignment" => {
                        let member_name = member
                            .named_child(0)
                            .map(|n| unquote(self.node_text(n)))
                            .unwrap_or_default();
                        let value = member
                            .named_child(1)
                            .and_then(|v| match self.visit_expr(v) {
                                Expr::String(s) => Some(LiteralType::String(s)),
                                Expr::Number(n) => Some(LiteralType::Number(n)),
                                Expr::Bool(b) => Some(LiteralType::Boolean(b)),
                                _ => None,
                            });
                        members.push(EnumMember { name: member_name, value });
                    }
                    _ => {}
                }
            }
        }

        Some(EnumDecl {
            name,
            members,
            text: self.node_text(node).to_string(),
            exported,
            span: self.span(node),
        })
    }

    fn visit_variable_declaration(&mut self, node: Node, exported: bool) -> Result<(), CompilerError> {
        let mut cursor = node.walk();
        for declarator in node.named_children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };

            let type_annotation = match declarator.child_by_field_name("type") {
                Some(annotation) => self.visit_type_annotation(annotation)?,
                None => None,
            };
            let initializer = declarator
                .child_by_field_name("value")
                .map(|v| self.visit_expr(v));

            self.variables.push(VariableDecl {
                name: self.node_text(name_node).to_string(),
                type_annotation,
                initializer,
                exported,
                span: self.span(declarator),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Unwraps `: T` into the type node for `T`.
    fn visit_type_annotation(&self, node: Node) -> Result<Option<TypeNode>, CompilerError> {
        match node.named_child(0) {
            Some(inner) => Ok(Some(self.visit_type_node(inner)?)),
            None => Ok(None),
        }
    }

    fn visit_type_node(&self, node: Node) -> Result<TypeNode, CompilerError> {
        match node.kind() {
            "predefined_type" => Ok(TypeNode::Primitive(self.node_text(node).to_string())),
            "type_identifier" | "nested_type_identifier" | "identifier" => {
                Ok(TypeNode::Reference(TypeReference {
                    name: self.node_text(node).to_string(),
                    args: Vec::new(),
                    arg_texts: Vec::new(),
                }))
            }
            "generic_type" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.node_text(n).to_string())
                    .unwrap_or_default();
                let mut args = Vec::new();
                let mut arg_texts = Vec::new();
                if let Some(type_args) = node.child_by_field_name("type_arguments") {
                    let mut cursor = type_args.walk();
                    for arg in type_args.named_children(&mut cursor) {
                        args.push(self.visit_type_node(arg)?);
                        arg_texts.push(self.node_text(arg).to_string());
                    }
                }
                Ok(TypeNode::Reference(TypeReference { name, args, arg_texts }))
            }
            "array_type" => {
                let inner = match node.named_child(0) {
                    Some(element) => self.visit_type_node(element)?,
                    None => TypeNode::Primitive("unknown".to_string()),
                };
                Ok(TypeNode::Array(Box::new(inner)))
            }
            "readonly_type" | "parenthesized_type" => match node.named_child(0) {
                Some(inner) => self.visit_type_node(inner),
                None => Ok(TypeNode::Primitive("unknown".to_string())),
            },
            "tuple_type" => {
                let mut elements = Vec::new();
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    elements.push(self.visit_type_node(child)?);
                }
                Ok(TypeNode::Tuple(elements))
            }
            "union_type" => {
                let mut variants = Vec::new();
                self.flatten(node, "union_type", &mut variants)?;

                let before = variants.len();
                variants.retain(|v| !matches!(v, TypeNode::Primitive(p) if p == "undefined"));
                let has_undefined = variants.len() != before;

                let inner = if variants.len() == 1 {
                    variants.remove(0)
                } else {
                    TypeNode::Union(variants)
                };

                if has_undefined {
                    Ok(TypeNode::Optional(Box::new(inner)))
                } else {
                    Ok(inner)
                }
            }
            "intersection_type" => {
                let mut parts = Vec::new();
                self.flatten(node, "intersection_type", &mut parts)?;
                Ok(TypeNode::Intersection(parts))
            }
            "object_type" | "interface_body" => Ok(TypeNode::Object(self.visit_object_type(node)?)),
            "literal_type" => Ok(self.visit_literal_type(node)),
            _ => Ok(TypeNode::Unsupported(self.node_text(node).to_string())),
        }
    }

    /// Collects the operands of a left-nested binary type (`A | B | C`).
    fn flatten(&self, node: Node, kind: &str, out: &mut Vec<TypeNode>) -> Result<(), CompilerError> {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == kind {
                self.flatten(child, kind, out)?;
            } else {
                out.push(self.visit_type_node(child)?);
            }
        }
        Ok(())
    }

    fn visit_literal_type(&self, node: Node) -> TypeNode {
        let Some(inner) = node.named_child(0) else {
            return TypeNode::Unsupported(self.node_text(node).to_string());
        };
        let text = self.node_text(inner);
        match inner.kind() {
            "string" => TypeNode::Literal(LiteralType::String(unquote(text))),
            "number" | "unary_expression" => match text.parse::<f64>() {
                Ok(n) => TypeNode::Literal(LiteralType::Number(n)),
                Err(_) => TypeNode::Unsupported(text.to_string()),
            },
            "true" => TypeNode::Literal(LiteralType::Boolean(true)),
            "false" => TypeNode::Literal(LiteralType::Boolean(false)),
            "null" => TypeNode::Primitive("null".to_string()),
            "undefined" => TypeNode::Primitive("undefined".to_string()),
            _ => TypeNode::Unsupported(text.to_string()),
        }
    }

    fn visit_object_type(&self, node: Node) -> Result<ObjectTypeNode, CompilerError> {
        let mut object = ObjectTypeNode::default();
        let mut cursor = node.walk();

        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "property_signature" => {
                    if let Some(prop) = self.visit_property_signature(child)? {
                        object.properties.push(prop);
                    }
                }
                "index_signature" => {
                    let mut inner = child.walk();
                    let annotation = child
                        .named_children(&mut inner)
                        .find(|c| c.kind().ends_with("type_annotation"));
                    if let Some(annotation) = annotation {
                        if let Some(value) = self.visit_type_annotation(annotation)? {
                            object.index = Some(Box::new(value));
                        }
                    }
                }
                // methods and call signatures carry no data
                _ => {}
            }
        }

        Ok(object)
    }

    fn visit_property_signature(&self, node: Node) -> Result<Option<ObjectProperty>, CompilerError> {
        let name = match node.child_by_field_name("name") {
            Some(n) => unquote(self.node_text(n)),
            None => return Ok(None),
        };

        let mut optional = false;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "?" {
                optional = true;
            }
        }

        let mut type_node = match node.child_by_field_name("type") {
            Some(annotation) => self
                .visit_type_annotation(annotation)?
                .unwrap_or_else(|| TypeNode::Primitive("any".to_string())),
            None => TypeNode::Primitive("any".to_string()),
        };

        // `field: T | undefined` behaves like `field?: T`
        if let TypeNode::Optional(inner) = type_node {
            optional = true;
            type_node = *inner;
        }

        Ok(Some(ObjectProperty {
            name,
            type_node,
            optional,
        }))
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn visit_expr(&self, node: Node) -> Expr {
        let text = self.node_text(node);
        match node.kind() {
            "string" => Expr::String(unquote(text)),
            "template_string" => {
                let mut cursor = node.walk();
                let has_substitution = node
                    .named_children(&mut cursor)
                    .any(|c| c.kind() == "template_substitution");
                if has_substitution {
                    Expr::Other(text.to_string())
                } else {
                    Expr::String(text.trim_matches('`').to_string())
                }
            }
            "number" | "unary_expression" => text
                .parse::<f64>()
                .map(Expr::Number)
                .unwrap_or_else(|_| Expr::Other(text.to_string())),
            "true" => Expr::Bool(true),
            "false" => Expr::Bool(false),
            "null" | "undefined" => Expr::Null,
            "identifier" => Expr::Identifier(text.to_string()),
            "array" => {
                let mut cursor = node.walk();
                Expr::Array(node.named_children(&mut cursor).map(|c| self.visit_expr(c)).collect())
            }
            "object" => {
                let mut entries = Vec::new();
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    match child.kind() {
                        "pair" => {
                            let key = child.child_by_field_name("key");
                            let value = child.child_by_field_name("value");
                            if let (Some(key), Some(value)) = (key, value) {
                                entries.push(ObjectEntry::Pair {
                                    key: unquote(self.node_text(key)),
                                    value: self.visit_expr(value),
                                });
                            }
                        }
                        "shorthand_property_identifier" => {
                            entries.push(ObjectEntry::Shorthand(self.node_text(child).to_string()));
                        }
                        _ => {}
                    }
                }
                Expr::Object(entries)
            }
            "member_expression" => {
                let object = node.child_by_field_name("object").map(|n| self.node_text(n));
                let property = node.child_by_field_name("property").map(|n| self.node_text(n));
                match (object, property) {
                    (Some(object), Some(property)) => Expr::Member {
                        object: object.to_string(),
                        property: property.to_string(),
                    },
                    _ => Expr::Other(text.to_string()),
                }
            }
            "arrow_function" | "function_expression" | "function" => Expr::Function,
            "as_expression" | "satisfies_expression" | "parenthesized_expression"
            | "non_null_expression" => match node.named_child(0) {
                Some(inner) => self.visit_expr(inner),
                None => Expr::Other(text.to_string()),
            },
            _ => Expr::Other(text.to_string()),
        }
    }
}

/// Strips matching quotes from a string literal.
fn unquote(text: &str) -> String {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && matches!(first, b'"' | b'\'' | b'`') {
            return text[1..text.len() - 1].to_string();
        }
    }
    text.to_string()
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(source: &str) -> ParsedFile {
        let mut parser = TypeScriptParser::new().unwrap();
        parser.parse(source, &PathBuf::from("test.ts")).unwrap()
    }

    #[test]
    fn test_parses_interface_members() {
        let file = parse(
            r#"
            export interface Car {
                model: string;
                year?: number;
                owner: Person | undefined;
                tags: string[];
            }
            "#,
        );

        let car = &file.interfaces[0];
        assert_eq!(car.name, "Car");
        assert!(car.exported);
        assert_eq!(car.body.properties.len(), 4);
        assert!(!car.body.properties[0].optional);
        assert!(car.body.properties[1].optional);
        assert!(car.body.properties[2].optional);
        assert_eq!(
            car.body.properties[3].type_node,
            TypeNode::Array(Box::new(TypeNode::Primitive("string".to_string())))
        );
        assert!(car.body_text.starts_with('{'));
    }

    #[test]
    fn test_parses_handler_variable_and_default_export() {
        let file = parse(
            r#"
            import { Ctx } from "../Ctx";
            import Car from "../schemas/Car";

            const getCar: GetHandler<Ctx, Car> = async ({ ctx, req }) => {
                return { data: { model: "Volvo" } };
            };

            export default getCar;
            "#,
        );

        assert_eq!(file.imports.len(), 2);
        assert_eq!(file.imports[0].specifiers[0].name, "Ctx");
        assert_eq!(file.imports[1].specifiers[0].name, "default");
        assert_eq!(file.imports[1].specifiers[0].local_name(), "Car");

        match &file.default_export {
            Some(DefaultExport::Identifier(name)) => assert_eq!(name, "getCar"),
            other => panic!("unexpected default export: {:?}", other),
        }

        let handler = file.variable("getCar").unwrap();
        match &handler.type_annotation {
            Some(TypeNode::Reference(r)) => {
                assert_eq!(r.name, "GetHandler");
                assert_eq!(r.arg_texts, vec!["Ctx", "Car"]);
            }
            other => panic!("unexpected annotation: {:?}", other),
        }
        assert_eq!(handler.initializer, Some(Expr::Function));
    }

    #[test]
    fn test_parses_route_metadata_object() {
        let file = parse(
            r#"
            export const Route: RouteProps = {
                method: HttpMethod.post,
                path: "/car/:id",
                permissions: ["car:update"],
                mockApi: true,
            };
            "#,
        );

        let route = file.variable("Route").unwrap();
        assert!(route.exported);
        let Some(Expr::Object(entries)) = &route.initializer else {
            panic!("expected object initializer");
        };
        assert_eq!(
            entries[0],
            ObjectEntry::Pair {
                key: "method".to_string(),
                value: Expr::Member {
                    object: "HttpMethod".to_string(),
                    property: "post".to_string()
                }
            }
        );
        assert_eq!(
            entries[3],
            ObjectEntry::Pair { key: "mockApi".to_string(), value: Expr::Bool(true) }
        );
    }

    #[test]
    fn test_parses_unions_literals_and_enums() {
        let file = parse(
            r#"
            type Fuel = "petrol" | "diesel" | "electric";
            export enum Color { Red = "red", Blue = "blue" }
            "#,
        );

        assert_eq!(
            file.type_aliases[0].type_node,
            TypeNode::Union(vec![
                TypeNode::Literal(LiteralType::String("petrol".to_string())),
                TypeNode::Literal(LiteralType::String("diesel".to_string())),
                TypeNode::Literal(LiteralType::String("electric".to_string())),
            ])
        );
        assert!(!file.type_aliases[0].exported);

        let color = &file.enums[0];
        assert_eq!(color.members.len(), 2);
        assert_eq!(color.members[1].value, Some(LiteralType::String("blue".to_string())));
    }

    #[test]
    fn test_parses_reexports() {
        let file = parse(
            r#"
            export * from "./Car";
            export { Person as Owner } from "./Person";
            "#,
        );

        assert_eq!(file.re_exports.len(), 2);
        assert!(file.re_exports[0].specifiers.is_empty());
        assert_eq!(file.re_exports[1].specifiers[0].name, "Person");
        assert_eq!(file.re_exports[1].specifiers[0].alias.as_deref(), Some("Owner"));
    }

    #[test]
    fn test_reports_syntax_errors() {
        let mut parser = TypeScriptParser::new().unwrap();
        let result = parser.parse("export interface {", &PathBuf::from("broken.ts"));
        assert!(matches!(result, Err(CompilerError::SyntaxError { .. })));
    }
}
