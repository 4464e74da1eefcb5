//! Per-request authentication context.

use std::collections::BTreeSet;
use std::time::SystemTime;

use serde::Serialize;

/// Which strategy produced a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Basic,
    Bearer,
    Oidc,
}

/// Identity established for one request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    pub authenticated: bool,
    pub principal: String,
    pub roles: BTreeSet<String>,
    pub method: AuthMethod,
    #[serde(skip)]
    pub issued_at: SystemTime,
    /// `jti` of the presented token, when there was one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(skip)]
    pub expires_at: Option<SystemTime>,
}

impl AuthContext {
    pub fn new(principal: impl Into<String>, method: AuthMethod) -> Self {
        Self {
            authenticated: true,
            principal: principal.into(),
            roles: BTreeSet::new(),
            method,
            issued_at: SystemTime::now(),
            token_id: None,
            expires_at: None,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
