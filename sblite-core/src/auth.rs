//! Per-request authentication context.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Database role of the caller. `ServiceRole` bypasses row-level security
/// unconditionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Anon,
    Authenticated,
    ServiceRole,
    #[serde(untagged)]
    Custom(String),
}

impl Role {
    pub fn parse(name: &str) -> Role {
        match name {
            "anon" => Role::Anon,
            "authenticated" => Role::Authenticated,
            "service_role" => Role::ServiceRole,
            other => Role::Custom(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Role::Anon => "anon",
            Role::Authenticated => "authenticated",
            Role::ServiceRole => "service_role",
            Role::Custom(name) => name,
        }
    }
}

/// Immutable per-request authentication state: role, subject and raw JWT
/// claims. Built by the HTTP/wire layers, consumed by the RLS enforcer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthContext {
    pub role: Role,
    pub user_id: Option<String>,
    #[serde(default)]
    pub claims: Map<String, Value>,
}

impl AuthContext {
    pub fn anonymous() -> AuthContext {
        AuthContext {
            role: Role::Anon,
            user_id: None,
            claims: Map::new(),
        }
    }

    pub fn service_role() -> AuthContext {
        AuthContext {
            role: Role::ServiceRole,
            user_id: None,
            claims: Map::new(),
        }
    }

    pub fn authenticated(user_id: impl Into<String>) -> AuthContext {
        let user_id = user_id.into();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), Value::String(user_id.clone()));
        AuthContext {
            role: Role::Authenticated,
            user_id: Some(user_id),
            claims,
        }
    }

    pub fn with_claims(mut self, claims: Map<String, Value>) -> AuthContext {
        self.claims = claims;
        self
    }

    pub fn is_service_role(&self) -> bool {
        self.role == Role::ServiceRole
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing() {
        assert_eq!(Role::parse("anon"), Role::Anon);
        assert_eq!(Role::parse("service_role"), Role::ServiceRole);
        assert_eq!(Role::parse("reporting"), Role::Custom("reporting".to_string()));
        assert_eq!(Role::parse("reporting").name(), "reporting");
    }

    #[test]
    fn authenticated_context_carries_sub_claim() {
        let auth = AuthContext::authenticated("u1");
        assert_eq!(auth.user_id.as_deref(), Some("u1"));
        assert_eq!(auth.claim("sub"), Some(&Value::String("u1".to_string())));
        assert!(!auth.is_service_role());
        assert!(AuthContext::service_role().is_service_role());
    }
}
