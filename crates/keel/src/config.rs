//! Application options.
//!
//! Options are plain data with defaults; [`AppOptions::from_env`] layers
//! environment variables (and a `.env` file when present) on top.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    /// Parses a `KEEL_ENV` value. Unrecognized values resolve to production
    /// so a typo never enables mock responses.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            "development" | "dev" => Environment::Development,
            _ => {
                tracing::warn!(value, "unrecognized environment, using production");
                Environment::Production
            }
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppOptions {
    pub name: String,
    pub environment: Environment,
    pub port: u16,
    /// `sqlite::memory:` or `sqlite://<path>`. No database when unset.
    pub db_uri: Option<String>,
    /// Run everything except the TCP listener.
    pub disable_http_server: bool,
    pub disable_scheduling: bool,
    /// Serve mock responses even in production.
    pub allow_mock_api: bool,
    /// JSON Schema document written by the build.
    pub schema_path: Option<PathBuf>,
    /// Handler manifest written by the build.
    pub manifest_path: Option<PathBuf>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            name: "keel".to_string(),
            environment: Environment::Development,
            port: 3333,
            db_uri: None,
            disable_http_server: false,
            disable_scheduling: false,
            allow_mock_api: false,
            schema_path: None,
            manifest_path: None,
        }
    }
}

impl AppOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `KEEL_*` environment variables.
    pub fn from_env() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                tracing::warn!(error = %err, "failed to load .env");
            }
        }
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(name) = env::var("KEEL_APP_NAME") {
            self.name = name;
        }
        if let Ok(environment) = env::var("KEEL_ENV") {
            self.environment = Environment::parse(&environment);
        }
        if let Ok(port) = env::var("KEEL_PORT").or_else(|_| env::var("PORT")) {
            self.port = port.parse().unwrap_or(self.port);
        }
        if let Ok(uri) = env::var("KEEL_DB_URI") {
            self.db_uri = Some(uri);
        }
        if let Ok(value) = env::var("KEEL_DISABLE_HTTP_SERVER") {
            self.disable_http_server = parse_flag(&value).unwrap_or(self.disable_http_server);
        }
        if let Ok(value) = env::var("KEEL_DISABLE_SCHEDULING") {
            self.disable_scheduling = parse_flag(&value).unwrap_or(self.disable_scheduling);
        }
        if let Ok(value) = env::var("KEEL_ALLOW_MOCK_API") {
            self.allow_mock_api = parse_flag(&value).unwrap_or(self.allow_mock_api);
        }
        if let Ok(path) = env::var("KEEL_SCHEMA_PATH") {
            self.schema_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = env::var("KEEL_MANIFEST_PATH") {
            self.manifest_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Whether a route flagged `mockApi` may short-circuit to mock data.
    pub fn mock_api_allowed(&self) -> bool {
        !self.environment.is_production() || self.allow_mock_api
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("PROD"), Environment::Production);
        assert_eq!(Environment::parse("test"), Environment::Test);
        assert_eq!(Environment::parse("Development"), Environment::Development);
        assert_eq!(Environment::parse("dev"), Environment::Development);
    }

    #[test]
    fn test_unrecognized_environment_is_production() {
        assert_eq!(Environment::parse("prodution"), Environment::Production);

        let options = AppOptions {
            environment: Environment::parse("staging"),
            ..AppOptions::default()
        };
        assert!(!options.mock_api_allowed());
    }

    #[test]
    fn test_mock_api_guard() {
        let mut options = AppOptions::default();
        assert!(options.mock_api_allowed());

        options.environment = Environment::Production;
        assert!(!options.mock_api_allowed());

        options.allow_mock_api = true;
        assert!(options.mock_api_allowed());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
