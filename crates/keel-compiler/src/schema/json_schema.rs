//! JSON Schema (draft-07) generation from TypeScript declarations.
//!
//! Every named declaration reached from a root becomes one entry in the
//! document's `definitions` and is referenced through `$ref`. Inline object
//! literals are inlined. Objects are closed (`additionalProperties: false`)
//! unless an index signature or `Record` opens them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::diagnostic::CompilerError;
use crate::frontend::typescript::ast::{
    Declaration, EnumDecl, InterfaceDecl, LiteralType, ObjectTypeNode, TypeNode, TypeReference,
};
use crate::frontend::{ResolvedType, SourceSet};

pub const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// The merged schema document consumed by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(rename = "$schema")]
    pub schema: String,
    /// Points at the first root definition.
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    pub definitions: BTreeMap<String, Value>,
}

impl SchemaDocument {
    pub fn to_json_pretty(&self) -> Result<String, CompilerError> {
        serde_json::to_string_pretty(self).map_err(|e| CompilerError::CodegenFailed {
            message: format!("failed to serialize schema document: {}", e),
        })
    }
}

/// Object members collected while flattening `extends` and intersections.
#[derive(Debug, Default)]
struct ObjectParts {
    properties: Map<String, Value>,
    required: Vec<String>,
    additional: Option<Value>,
}

impl ObjectParts {
    fn merge(&mut self, other: ObjectParts) {
        for (name, schema) in other.properties {
            self.required.retain(|r| r != &name);
            self.properties.insert(name, schema);
        }
        for name in other.required {
            if !self.required.contains(&name) {
                self.required.push(name);
            }
        }
        if other.additional.is_some() {
            self.additional = other.additional;
        }
    }

    fn into_schema(self) -> Value {
        if self.properties.is_empty() && self.additional.is_none() {
            return json!({ "type": "object" });
        }

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        if !self.properties.is_empty() {
            schema.insert("properties".into(), Value::Object(self.properties));
        }
        if !self.required.is_empty() {
            schema.insert("required".into(), json!(self.required));
        }
        schema.insert(
            "additionalProperties".into(),
            self.additional.unwrap_or(Value::Bool(false)),
        );
        Value::Object(schema)
    }
}

/// Builds one schema document from any number of root types.
pub struct SchemaGenerator<'a> {
    sources: &'a mut SourceSet,
    definitions: BTreeMap<String, Value>,
    origins: HashMap<String, PathBuf>,
    in_progress: HashSet<String>,
    stack: Vec<String>,
    roots: Vec<String>,
}

impl<'a> SchemaGenerator<'a> {
    pub fn new(sources: &'a mut SourceSet) -> Self {
        Self {
            sources,
            definitions: BTreeMap::new(),
            origins: HashMap::new(),
            in_progress: HashSet::new(),
            stack: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Adds the type `name`, as seen from `file`, and everything it references.
    pub fn add_root(&mut self, file: &Path, name: &str) -> Result<(), CompilerError> {
        let resolved = self
            .sources
            .resolve_type(file, name)?
            .ok_or_else(|| CompilerError::UnresolvedType {
                name: name.to_string(),
                file: file.to_path_buf(),
            })?;

        let defined = self.define(&resolved)?;
        if !self.roots.contains(&defined) {
            self.roots.push(defined);
        }
        Ok(())
    }

    pub fn finish(self) -> SchemaDocument {
        SchemaDocument {
            schema: DRAFT_07.to_string(),
            root: self.roots.first().map(|r| format!("#/definitions/{}", r)),
            definitions: self.definitions,
        }
    }

    /// Generates the definition for a declaration and returns its name.
    fn define(&mut self, resolved: &ResolvedType) -> Result<String, CompilerError> {
        let name = resolved.declaration.name().to_string();
        let path = resolved.file.path.clone();

        if let Some(origin) = self.origins.get(&name).cloned() {
            if origin == path {
                return Ok(name);
            }
            if self.in_progress.contains(&name) {
                return Err(CompilerError::DuplicateDefinition { name, first: origin, second: path });
            }
            // Same name from another module: fine if both describe the same shape.
            let schema = self.declaration_schema(resolved)?;
            if self.definitions.get(&name) == Some(&schema) {
                return Ok(name);
            }
            return Err(CompilerError::DuplicateDefinition { name, first: origin, second: path });
        }

        self.origins.insert(name.clone(), path);
        self.in_progress.insert(name.clone());
        let schema = self.declaration_schema(resolved)?;
        self.in_progress.remove(&name);
        self.definitions.insert(name.clone(), schema);
        Ok(name)
    }

    fn declaration_schema(&mut self, resolved: &ResolvedType) -> Result<Value, CompilerError> {
        let file = resolved.file.path.clone();
        self.stack.push(resolved.declaration.name().to_string());

        let schema = match &resolved.declaration {
            Declaration::Interface(iface) => self.interface_schema(&file, iface),
            Declaration::Alias(alias) => {
                if alias.type_parameters.is_empty() {
                    self.convert(&file, &alias.type_node)
                } else {
                    Err(self.fail("generic type aliases are not supported"))
                }
            }
            Declaration::Enum(decl) => Ok(enum_schema(decl)),
        };

        self.stack.pop();
        schema
    }

    fn interface_schema(&mut self, file: &Path, iface: &InterfaceDecl) -> Result<Value, CompilerError> {
        if !iface.type_parameters.is_empty() {
            return Err(self.fail("generic interfaces are not supported"));
        }

        // interface Cars extends Array<Car> {}
        for parent in &iface.extends {
            if let Some(item) = array_item(parent) {
                let items = self.convert(file, item)?;
                return Ok(json!({ "type": "array", "items": items }));
            }
        }

        Ok(self.interface_parts(file, iface)?.into_schema())
    }

    fn interface_parts(&mut self, file: &Path, iface: &InterfaceDecl) -> Result<ObjectParts, CompilerError> {
        if !iface.type_parameters.is_empty() {
            return Err(self.fail(&format!("generic interface `{}` is not supported", iface.name)));
        }
        let mut parts = ObjectParts::default();
        for parent in &iface.extends {
            let inherited = self.flatten(file, parent)?;
            parts.merge(inherited);
        }
        let own = self.object_parts(file, &iface.body)?;
        parts.merge(own);
        Ok(parts)
    }

    fn object_parts(&mut self, file: &Path, object: &ObjectTypeNode) -> Result<ObjectParts, CompilerError> {
        let mut parts = ObjectParts::default();
        for prop in &object.properties {
            let schema = self.convert(file, &prop.type_node)?;
            parts.properties.insert(prop.name.clone(), schema);
            if !prop.optional {
                parts.required.push(prop.name.clone());
            }
        }
        if let Some(index) = &object.index {
            parts.additional = Some(self.convert(file, index)?);
        }
        Ok(parts)
    }

    /// Collects the members of an object-like type, following references.
    fn flatten(&mut self, file: &Path, node: &TypeNode) -> Result<ObjectParts, CompilerError> {
        match node {
            TypeNode::Object(object) => self.object_parts(file, object),
            TypeNode::Optional(inner) => self.flatten(file, inner),
            TypeNode::Intersection(items) => {
                let mut parts = ObjectParts::default();
                for item in items {
                    let next = self.flatten(file, item)?;
                    parts.merge(next);
                }
                Ok(parts)
            }
            TypeNode::Reference(reference) => match (reference.name.as_str(), reference.args.as_slice()) {
                ("Partial", [inner]) => {
                    let mut parts = self.flatten(file, inner)?;
                    parts.required.clear();
                    Ok(parts)
                }
                ("Record", [_, value]) => Ok(ObjectParts {
                    additional: Some(self.convert(file, value)?),
                    ..ObjectParts::default()
                }),
                (_, []) => {
                    let resolved = self.resolve(file, &reference.name)?;
                    let decl_file = resolved.file.path.clone();
                    match &resolved.declaration {
                        Declaration::Interface(iface) => self.interface_parts(&decl_file, iface),
                        Declaration::Alias(alias) => self.flatten(&decl_file, &alias.type_node),
                        Declaration::Enum(_) => Err(self.fail(&format!(
                            "enum `{}` cannot be used as an object type",
                            reference.name
                        ))),
                    }
                }
                _ => Err(self.fail(&format!("generic type `{}` is not supported", reference.name))),
            },
            other => Err(self.fail(&format!("`{}` is not an object type", describe(other)))),
        }
    }

    fn convert(&mut self, file: &Path, node: &TypeNode) -> Result<Value, CompilerError> {
        match node {
            TypeNode::Primitive(name) => match name.as_str() {
                "string" => Ok(json!({ "type": "string" })),
                "number" => Ok(json!({ "type": "number" })),
                "boolean" => Ok(json!({ "type": "boolean" })),
                "bigint" => Ok(json!({ "type": "integer" })),
                "null" => Ok(json!({ "type": "null" })),
                "object" => Ok(json!({ "type": "object" })),
                "any" | "unknown" => Ok(json!({})),
                other => Err(self.fail(&format!("unsupported type `{}`", other))),
            },
            TypeNode::Literal(literal) => Ok(literal_schema(literal)),
            TypeNode::Array(inner) => {
                let items = self.convert(file, inner)?;
                Ok(json!({ "type": "array", "items": items }))
            }
            TypeNode::Tuple(items) => {
                let mut schemas = Vec::with_capacity(items.len());
                for item in items {
                    schemas.push(self.convert(file, item)?);
                }
                Ok(json!({
                    "type": "array",
                    "items": schemas,
                    "minItems": items.len(),
                    "maxItems": items.len(),
                }))
            }
            TypeNode::Union(items) => self.union_schema(file, items),
            TypeNode::Intersection(_) => Ok(self.flatten(file, node)?.into_schema()),
            TypeNode::Object(object) => Ok(self.object_parts(file, object)?.into_schema()),
            TypeNode::Optional(inner) => self.convert(file, inner),
            TypeNode::Reference(reference) => self.reference_schema(file, node, reference),
            TypeNode::Unsupported(text) => Err(self.fail(&format!("unsupported type `{}`", text))),
        }
    }

    fn union_schema(&mut self, file: &Path, items: &[TypeNode]) -> Result<Value, CompilerError> {
        let literals: Vec<&LiteralType> = items
            .iter()
            .filter_map(|item| match item {
                TypeNode::Literal(literal) => Some(literal),
                _ => None,
            })
            .collect();

        if literals.len() == items.len() {
            // true | false
            if literals.len() == 2 && literals.iter().all(|l| matches!(l, LiteralType::Boolean(_))) {
                return Ok(json!({ "type": "boolean" }));
            }
            let values: Vec<Value> = literals.iter().map(|l| literal_value(l)).collect();
            return Ok(enum_values(values));
        }

        let mut variants = Vec::with_capacity(items.len());
        for item in items {
            variants.push(self.convert(file, item)?);
        }
        Ok(json!({ "anyOf": variants }))
    }

    fn reference_schema(&mut self, file: &Path, node: &TypeNode, reference: &TypeReference) -> Result<Value, CompilerError> {
        match (reference.name.as_str(), reference.args.as_slice()) {
            ("Date", []) => Ok(json!({ "type": "string", "format": "date-time" })),
            ("Array" | "ReadonlyArray", [item]) => {
                let items = self.convert(file, item)?;
                Ok(json!({ "type": "array", "items": items }))
            }
            ("Record", [_, value]) => {
                let additional = self.convert(file, value)?;
                Ok(json!({ "type": "object", "additionalProperties": additional }))
            }
            ("Partial", [_]) => Ok(self.flatten(file, node)?.into_schema()),
            ("Promise", [inner]) => self.convert(file, inner),
            (name, []) => {
                let resolved = self.resolve(file, name)?;
                let defined = self.define(&resolved)?;
                Ok(json!({ "$ref": format!("#/definitions/{}", defined) }))
            }
            (name, _) => Err(self.fail(&format!(
                "generic type `{}<{}>` is not supported",
                name,
                reference.arg_texts.join(", ")
            ))),
        }
    }

    fn resolve(&mut self, file: &Path, name: &str) -> Result<ResolvedType, CompilerError> {
        self.sources
            .resolve_type(file, name)?
            .ok_or_else(|| CompilerError::UnresolvedType {
                name: name.to_string(),
                file: file.to_path_buf(),
            })
    }

    fn fail(&self, message: &str) -> CompilerError {
        CompilerError::SchemaGenerationFailed {
            name: self.stack.last().cloned().unwrap_or_default(),
            message: message.to_string(),
        }
    }
}

fn array_item(node: &TypeNode) -> Option<&TypeNode> {
    match node {
        TypeNode::Reference(reference)
            if matches!(reference.name.as_str(), "Array" | "ReadonlyArray") && reference.args.len() == 1 =>
        {
            reference.args.first()
        }
        _ => None,
    }
}

fn enum_schema(decl: &EnumDecl) -> Value {
    let mut next = 0f64;
    let values = decl
        .members
        .iter()
        .map(|member| match &member.value {
            Some(LiteralType::Number(n)) => {
                next = n + 1.0;
                number_value(*n)
            }
            Some(literal) => literal_value(literal),
            None => {
                let value = number_value(next);
                next += 1.0;
                value
            }
        })
        .collect();
    enum_values(values)
}

/// `{ enum: [...] }`, with a `type` when every value shares one.
fn enum_values(values: Vec<Value>) -> Value {
    let types: HashSet<&'static str> = values.iter().map(json_type).collect();
    if types.len() == 1 {
        if let Some(ty) = types.into_iter().next() {
            return json!({ "type": ty, "enum": values });
        }
    }
    json!({ "enum": values })
}

fn literal_schema(literal: &LiteralType) -> Value {
    let value = literal_value(literal);
    json!({ "type": json_type(&value), "const": value })
}

fn literal_value(literal: &LiteralType) -> Value {
    match literal {
        LiteralType::String(s) => Value::String(s.clone()),
        LiteralType::Number(n) => number_value(*n),
        LiteralType::Boolean(b) => Value::Bool(*b),
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::Null => "null",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn describe(node: &TypeNode) -> String {
    match node {
        TypeNode::Primitive(p) => p.clone(),
        TypeNode::Reference(r) => r.name.clone(),
        TypeNode::Unsupported(text) => text.clone(),
        TypeNode::Array(_) | TypeNode::Tuple(_) => "array".to_string(),
        TypeNode::Union(_) => "union".to_string(),
        TypeNode::Literal(l) => literal_value(l).to_string(),
        TypeNode::Intersection(_) | TypeNode::Object(_) | TypeNode::Optional(_) => "object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn document(files: &[(&str, &str)], roots: &[(&str, &str)]) -> Result<SchemaDocument, CompilerError> {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        let mut sources = SourceSet::new().unwrap();
        let mut generator = SchemaGenerator::new(&mut sources);
        for (file, name) in roots {
            generator.add_root(&temp.path().join(file), name)?;
        }
        Ok(generator.finish())
    }

    #[test]
    fn test_nested_types_become_definitions() {
        let doc = document(
            &[
                (
                    "Garage.ts",
                    r#"
                    import { Car } from "./Car";
                    export interface Address { street: string; zip?: string }
                    export interface Garage {
                        name: string;
                        address: Address;
                        cars: Car[];
                        note?: string;
                    }
                    "#,
                ),
                ("Car.ts", "export interface Car { model: string; year: number }"),
            ],
            &[("Garage.ts", "Garage")],
        )
        .unwrap();

        assert_eq!(doc.schema, DRAFT_07);
        assert_eq!(doc.root.as_deref(), Some("#/definitions/Garage"));
        assert_eq!(doc.definitions.len(), 3);

        let garage = &doc.definitions["Garage"];
        assert_eq!(garage["properties"]["address"]["$ref"], "#/definitions/Address");
        assert_eq!(garage["properties"]["cars"]["items"]["$ref"], "#/definitions/Car");
        assert_eq!(garage["required"], json!(["name", "address", "cars"]));
        assert_eq!(garage["additionalProperties"], json!(false));
        assert_eq!(doc.definitions["Address"]["required"], json!(["street"]));
    }

    #[test]
    fn test_empty_interface_is_plain_object() {
        let doc = document(&[("Empty.ts", "export interface Empty {}")], &[("Empty.ts", "Empty")]).unwrap();
        assert_eq!(doc.definitions["Empty"], json!({ "type": "object" }));
    }

    #[test]
    fn test_literals_unions_and_builtins() {
        let doc = document(
            &[(
                "Car.ts",
                r#"
                type Fuel = "petrol" | "diesel";
                export interface Car {
                    fuel: Fuel;
                    kind: "car";
                    owner: string | null;
                    registered: Date;
                    extras: Record<string, number>;
                    position: [number, number];
                    flag: true | false;
                }
                "#,
            )],
            &[("Car.ts", "Car")],
        )
        .unwrap();

        assert_eq!(doc.definitions["Fuel"], json!({ "type": "string", "enum": ["petrol", "diesel"] }));
        let props = &doc.definitions["Car"]["properties"];
        assert_eq!(props["kind"], json!({ "type": "string", "const": "car" }));
        assert_eq!(props["owner"], json!({ "anyOf": [{ "type": "string" }, { "type": "null" }] }));
        assert_eq!(props["registered"], json!({ "type": "string", "format": "date-time" }));
        assert_eq!(props["extras"]["additionalProperties"], json!({ "type": "number" }));
        assert_eq!(props["position"]["minItems"], json!(2));
        assert_eq!(props["flag"], json!({ "type": "boolean" }));
    }

    #[test]
    fn test_extends_is_flattened_and_array_extension() {
        let doc = document(
            &[(
                "Car.ts",
                r#"
                interface Base { id: string }
                export interface Car extends Base { model: string }
                export interface Cars extends Array<Car> {}
                export interface Patch extends Partial<Car> {}
                "#,
            )],
            &[("Car.ts", "Cars"), ("Car.ts", "Patch")],
        )
        .unwrap();

        assert_eq!(doc.definitions["Car"]["required"], json!(["id", "model"]));
        assert_eq!(
            doc.definitions["Cars"],
            json!({ "type": "array", "items": { "$ref": "#/definitions/Car" } })
        );
        assert!(doc.definitions["Patch"].get("required").is_none());
        assert_eq!(doc.root.as_deref(), Some("#/definitions/Cars"));
    }

    #[test]
    fn test_enums() {
        let doc = document(
            &[("Color.ts", "export enum Color { Red, Green, Blue = 10, Violet }\nexport enum Mode { On = \"on\", Off = \"off\" }")],
            &[("Color.ts", "Color"), ("Color.ts", "Mode")],
        )
        .unwrap();

        assert_eq!(doc.definitions["Color"]["enum"], json!([0, 1, 10, 11]));
        assert_eq!(doc.definitions["Mode"], json!({ "type": "string", "enum": ["on", "off"] }));
    }

    #[test]
    fn test_recursive_types() {
        let doc = document(
            &[("Node.ts", "export interface TreeNode { children: TreeNode[] }")],
            &[("Node.ts", "TreeNode")],
        )
        .unwrap();
        assert_eq!(
            doc.definitions["TreeNode"]["properties"]["children"]["items"]["$ref"],
            "#/definitions/TreeNode"
        );
    }

    #[test]
    fn test_unresolved_reference_fails_loudly() {
        let result = document(
            &[("Car.ts", "export interface Car { engine: Engine }")],
            &[("Car.ts", "Car")],
        );
        assert!(matches!(result, Err(CompilerError::UnresolvedType { ref name, .. }) if name == "Engine"));
    }

    #[test]
    fn test_unsupported_type_fails() {
        let result = document(
            &[("Car.ts", "export interface Car { start: () => void }")],
            &[("Car.ts", "Car")],
        );
        assert!(matches!(result, Err(CompilerError::SchemaGenerationFailed { ref name, .. }) if name == "Car"));
    }

    #[test]
    fn test_conflicting_definitions() {
        let result = document(
            &[
                ("a/Car.ts", "export interface Car { model: string }"),
                ("b/Car.ts", "export interface Car { wheels: number }"),
            ],
            &[("a/Car.ts", "Car"), ("b/Car.ts", "Car")],
        );
        assert!(matches!(result, Err(CompilerError::DuplicateDefinition { .. })));

        let identical = document(
            &[
                ("a/Car.ts", "export interface Car { model: string }"),
                ("b/Car.ts", "export interface Car { model: string }"),
            ],
            &[("a/Car.ts", "Car"), ("b/Car.ts", "Car")],
        );
        assert!(identical.is_ok());
    }

    #[test]
    fn test_empty_document_has_no_ref() {
        let doc = document(&[], &[]).unwrap();
        assert!(doc.root.is_none());
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("$ref").is_none());
        assert_eq!(json["$schema"], DRAFT_07);
    }
}
