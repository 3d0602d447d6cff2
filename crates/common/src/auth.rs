//! Token introspection contract.
//!
//! Token issuance and verification live outside this system; the services
//! only need to turn an opaque token into the claims embedded in it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::types::{Role, UserId};

/// Claims extracted from an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// The authenticated user.
    pub user_id: UserId,
    /// Role granted to the user.
    pub role: Role,
    /// Company the user belongs to, for sellers.
    pub company_name: Option<String>,
}

/// Errors returned by token introspection.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token is unknown or expired.
    #[error("invalid token")]
    InvalidToken,
}

/// Resolves an opaque token into its claims.
pub trait TokenIntrospector: Send + Sync {
    /// Resolves a bearer token, stripping an optional `Bearer ` prefix.
    fn resolve(&self, token: &str) -> Result<Claims, AuthError>;
}

/// In-memory token table for wiring and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenIntrospector {
    tokens: Arc<RwLock<HashMap<String, Claims>>>,
}

impl StaticTokenIntrospector {
    /// Creates an empty token table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token with its claims.
    pub fn register(&self, token: impl Into<String>, claims: Claims) {
        self.tokens.write().unwrap().insert(token.into(), claims);
    }
}

impl TokenIntrospector for StaticTokenIntrospector {
    fn resolve(&self, token: &str) -> Result<Claims, AuthError> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token);
        self.tokens
            .read()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims {
            user_id: UserId::new(42),
            role: Role::Seller,
            company_name: Some("Casa Lupita".to_string()),
        }
    }

    #[test]
    fn resolve_known_token() {
        let introspector = StaticTokenIntrospector::new();
        introspector.register("tok-1", claims());

        let resolved = introspector.resolve("tok-1").unwrap();
        assert_eq!(resolved, claims());
    }

    #[test]
    fn resolve_strips_bearer_prefix() {
        let introspector = StaticTokenIntrospector::new();
        introspector.register("tok-1", claims());

        let resolved = introspector.resolve("Bearer tok-1").unwrap();
        assert_eq!(resolved.user_id, UserId::new(42));
    }

    #[test]
    fn resolve_unknown_token_fails() {
        let introspector = StaticTokenIntrospector::new();
        assert!(matches!(
            introspector.resolve("nope"),
            Err(AuthError::InvalidToken)
        ));
    }
}
