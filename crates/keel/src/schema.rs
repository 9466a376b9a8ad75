//! # Schema Store
//!
//! Holds the JSON Schema document written by the build and a cache of
//! compiled validators, one per definition name. Validators are compiled once
//! while routes register and shared read-only across requests afterwards.
//!
//! A definition is validated through a wrapper that points at it and carries
//! the whole `definitions` map, so internal `$ref`s resolve:
//!
//! ```json
//! { "$schema": "...draft-07...", "$ref": "#/definitions/Car", "definitions": { ... } }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use jsonschema::Validator;
use keel_compiler::schema::DRAFT_07;
use keel_compiler::SchemaDocument;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// One validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaViolation {
    /// JSON pointer into the validated instance.
    pub path: String,
    pub message: String,
}

pub struct SchemaStore {
    definitions: Map<String, Value>,
    validators: RwLock<HashMap<String, Arc<Validator>>>,
}

impl std::fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaStore")
            .field("definitions", &self.definitions.len())
            .finish()
    }
}

impl Default for SchemaStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl SchemaStore {
    pub fn empty() -> Self {
        Self {
            definitions: Map::new(),
            validators: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_document(document: SchemaDocument) -> Self {
        Self {
            definitions: document.definitions.into_iter().collect(),
            validators: RwLock::new(HashMap::new()),
        }
    }

    /// Reads a `schemas.json` written by the build.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let document: SchemaDocument = serde_json::from_str(&content).map_err(|e| Error::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        tracing::info!(path = %path.display(), definitions = document.definitions.len(), "schemas loaded");
        Ok(Self::from_document(document))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn definition(&self, name: &str) -> Option<&Value> {
        self.definitions.get(name)
    }

    pub fn definitions(&self) -> &Map<String, Value> {
        &self.definitions
    }

    /// The compiled validator for `name`, compiling it on first use.
    pub fn validator(&self, name: &str) -> Result<Arc<Validator>> {
        {
            let cache = self.validators.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(validator) = cache.get(name) {
                return Ok(Arc::clone(validator));
            }
        }

        if !self.contains(name) {
            return Err(Error::UnknownSchema {
                name: name.to_string(),
                handler: String::new(),
            });
        }

        let wrapper = json!({
            "$schema": DRAFT_07,
            "$ref": format!("#/definitions/{}", name),
            "definitions": self.definitions,
        });
        let validator = jsonschema::validator_for(&wrapper).map_err(|e| Error::InvalidSchema {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        let validator = Arc::new(validator);

        let mut cache = self.validators.write().unwrap_or_else(PoisonError::into_inner);
        let validator = Arc::clone(cache.entry(name.to_string()).or_insert(validator));
        tracing::debug!(schema = name, cached = cache.len(), "schema validator compiled");
        Ok(validator)
    }

    /// Validates `instance` against the definition `name`.
    pub fn validate(&self, name: &str, instance: &Value) -> Result<Vec<SchemaViolation>> {
        let validator = self.validator(name)?;
        Ok(validator
            .iter_errors(instance)
            .map(|error| SchemaViolation {
                path: error.instance_path.to_string(),
                message: error.to_string(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn store() -> SchemaStore {
        let mut definitions = BTreeMap::new();
        definitions.insert(
            "Car".to_string(),
            json!({
                "type": "object",
                "properties": {
                    "model": { "type": "string" },
                    "engine": { "$ref": "#/definitions/Engine" }
                },
                "required": ["model"],
                "additionalProperties": false
            }),
        );
        definitions.insert(
            "Engine".to_string(),
            json!({ "type": "object", "properties": { "hp": { "type": "number" } }, "required": ["hp"] }),
        );
        SchemaStore::from_document(SchemaDocument {
            schema: DRAFT_07.to_string(),
            root: Some("#/definitions/Car".to_string()),
            definitions,
        })
    }

    #[test]
    fn test_valid_instance_has_no_violations() {
        let store = store();
        let violations = store
            .validate("Car", &json!({ "model": "Volvo", "engine": { "hp": 150 } }))
            .unwrap();
        assert!(violations.is_empty());
    }

    #[test]
    fn test_violations_follow_refs() {
        let store = store();
        let violations = store.validate("Car", &json!({ "engine": {}, "color": "red" })).unwrap();

        assert!(violations.iter().any(|v| v.message.contains("model")));
        assert!(violations.iter().any(|v| v.path == "/engine"));
        assert!(violations.iter().any(|v| v.message.contains("color")));
    }

    #[test]
    fn test_validators_are_cached() {
        let store = store();
        let first = store.validator("Car").unwrap();
        let second = store.validator("Car").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_each_definition_gets_its_own_validator() {
        let store = store();
        let car = store.validator("Car").unwrap();
        let engine = store.validator("Engine").unwrap();
        assert!(!Arc::ptr_eq(&car, &engine));
        assert_eq!(store.validators.read().unwrap().len(), 2);
        assert!(store.validate("Engine", &json!({ "hp": 90 })).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_schema() {
        assert!(matches!(
            store().validator("Boat"),
            Err(Error::UnknownSchema { .. })
        ));
    }
}
