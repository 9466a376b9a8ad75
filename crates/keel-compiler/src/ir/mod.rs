//! Build-time descriptors of a keel project.
//!
//! These are produced by the project scanner, rendered into the generated
//! registration modules and serialized as `manifest.json` so the runtime can
//! consume the same registry data without re-scanning the project.

use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP methods a handler may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 4] = [HttpMethod::Get, HttpMethod::Post, HttpMethod::Put, HttpMethod::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
        }
    }

    /// Parses a method name case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
    }

    /// Derives the method from a handler file name prefix, e.g. `GetCar` or
    /// `postCar`. The comparison ignores case.
    pub fn from_file_prefix(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| lower.starts_with(m.as_str()))
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Documentation for a single query or path parameter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
}

/// Route metadata declared with `export const Route: RouteProps = { ... }`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub skip_auto_register: bool,
    #[serde(default)]
    pub mock_api: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_metadata: Vec<ParamMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params_metadata: Vec<ParamMetadata>,
}

/// One discovered request handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerDescriptor {
    /// File name without extension, e.g. `GetCar`.
    pub name: String,
    /// Source path relative to the project root, `/`-separated.
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteProps>,
    /// Method derived from the file name prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assumed_http_method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub res_schema: Option<String>,
}

impl HandlerDescriptor {
    /// The explicit route method, else the one implied by the file name.
    pub fn method(&self) -> Option<HttpMethod> {
        self.route
            .as_ref()
            .and_then(|r| r.method)
            .or(self.assumed_http_method)
    }

    pub fn path(&self) -> Option<&str> {
        self.route.as_ref().and_then(|r| r.path.as_deref())
    }
}

/// One discovered repository class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoDescriptor {
    /// Class (file) name, e.g. `CarRepo`.
    pub name: String,
    pub file: String,
    /// Backing collection, e.g. `car`.
    pub collection_name: String,
    /// Property name on the context, e.g. `carRepo`.
    pub repo_instance_name: String,
}

/// Schedule metadata declared with `export const Job: JobProps = { ... }`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProps {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_delay_ms: Option<u64>,
    #[serde(default)]
    pub singleton: bool,
}

/// One discovered job module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    pub name: String,
    pub file: String,
    pub job: JobProps,
}

/// Everything the build discovered, in discovery order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub handlers: Vec<HandlerDescriptor>,
    pub repos: Vec<RepoDescriptor>,
    pub jobs: Vec<JobDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_from_file_prefix() {
        assert_eq!(HttpMethod::from_file_prefix("GetCar"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::from_file_prefix("postCar"), Some(HttpMethod::Post));
        assert_eq!(HttpMethod::from_file_prefix("PUTCar"), Some(HttpMethod::Put));
        assert_eq!(HttpMethod::from_file_prefix("DeleteCar"), Some(HttpMethod::Delete));
        assert_eq!(HttpMethod::from_file_prefix("CarHandler"), None);
    }

    #[test]
    fn test_explicit_method_wins() {
        let handler = HandlerDescriptor {
            name: "GetCar".to_string(),
            file: "src/handlers/GetCar.ts".to_string(),
            route: Some(RouteProps {
                method: Some(HttpMethod::Post),
                path: Some("/car".to_string()),
                ..RouteProps::default()
            }),
            assumed_http_method: Some(HttpMethod::Get),
            req_schema: None,
            res_schema: Some("Car".to_string()),
        };
        assert_eq!(handler.method(), Some(HttpMethod::Post));
        assert_eq!(handler.path(), Some("/car"));
    }

    #[test]
    fn test_manifest_serializes_camel_case() {
        let manifest = Manifest {
            handlers: Vec::new(),
            repos: vec![RepoDescriptor {
                name: "CarRepo".to_string(),
                file: "src/repos/CarRepo.ts".to_string(),
                collection_name: "car".to_string(),
                repo_instance_name: "carRepo".to_string(),
            }],
            jobs: Vec::new(),
        };
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["repos"][0]["collectionName"], "car");
        assert_eq!(json["repos"][0]["repoInstanceName"], "carRepo");
    }
}
