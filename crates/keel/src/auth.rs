//! Authentication.
//!
//! Routes that declare permissions are checked by the app's [`AuthPlugin`]
//! before anything else runs. [`JwtAuthPlugin`] is the bundled
//! implementation: HS256 bearer tokens whose `roles` claim is mapped to
//! permissions through a role table.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::handler::HandlerRequest;

/// Route permission that only requires a valid token.
pub const ANY_AUTHENTICATED: &str = "*";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("token payload must be a JSON object")]
    InvalidPayload,
}

#[async_trait]
pub trait AuthPlugin: Send + Sync {
    /// Checks the request against `permissions`. On success the decoded
    /// user is attached to `req.user`.
    async fn authenticate(&self, req: &mut HandlerRequest, permissions: &[String]) -> bool;

    /// Issues a token for `payload` carrying `roles`.
    fn create_token(&self, payload: Value, roles: &[String]) -> Result<String, AuthError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

pub struct JwtAuthPlugin {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    role_permissions: HashMap<String, HashSet<String>>,
    token_ttl: Duration,
}

impl std::fmt::Debug for JwtAuthPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthPlugin")
            .field("roles", &self.role_permissions.keys().collect::<Vec<_>>())
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

impl JwtAuthPlugin {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            role_permissions: HashMap::new(),
            token_ttl: Duration::hours(24),
        }
    }

    /// Grants `permissions` to `role`. A `"*"` permission grants everything.
    pub fn role<I, S>(mut self, role: &str, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_permissions
            .entry(role.to_string())
            .or_default()
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }

    fn has_permission(&self, roles: &[String], permission: &str) -> bool {
        if permission == ANY_AUTHENTICATED {
            return true;
        }
        roles.iter().any(|role| {
            self.role_permissions
                .get(role)
                .is_some_and(|granted| granted.contains(permission) || granted.contains(ANY_AUTHENTICATED))
        })
    }
}

#[async_trait]
impl AuthPlugin for JwtAuthPlugin {
    async fn authenticate(&self, req: &mut HandlerRequest, permissions: &[String]) -> bool {
        let Some(token) = extract_bearer(req) else {
            tracing::debug!(path = %req.path, "no bearer token");
            return false;
        };
        let claims = match self.decode_token(token) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::debug!(path = %req.path, error = %err, "rejected token");
                return false;
            }
        };

        if let Some(missing) = permissions.iter().find(|p| !self.has_permission(&claims.roles, p)) {
            tracing::debug!(path = %req.path, permission = %missing, "permission denied");
            return false;
        }

        req.user = serde_json::to_value(&claims).ok();
        true
    }

    fn create_token(&self, payload: Value, roles: &[String]) -> Result<String, AuthError> {
        let mut payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(AuthError::InvalidPayload),
        };
        // Reserved claims come from the arguments, never from the payload.
        for reserved in ["roles", "exp", "iat"] {
            payload.remove(reserved);
        }
        let now = Utc::now();
        let claims = Claims {
            roles: roles.to_vec(),
            exp: (now + self.token_ttl).timestamp(),
            iat: now.timestamp(),
            payload,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }
}

fn extract_bearer(req: &HandlerRequest) -> Option<&str> {
    req.header("authorization")?.strip_prefix("Bearer ").map(str::trim)
}
