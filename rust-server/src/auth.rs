//! Caller identity and the authentication capability boundary.
//!
//! The session system is external; this module only defines what a
//! resolved caller looks like and the trait the web layer uses to
//! resolve bearer tokens. The administrator check is a positive,
//! explicitly-assigned role, never inferred from a missing
//! organization record.

use std::collections::HashMap;

use async_trait::async_trait;

/// Role resolved once from the caller's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Administrators bypass organization ownership checks.
    Admin,
    /// An organization owner, scoped to that organization's
    /// campaigns, templates and send accounts.
    OrgMember { org_id: String },
}

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::Admin,
        }
    }

    pub fn org_member(user_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: Role::OrgMember {
                org_id: org_id.into(),
            },
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the caller may act on a resource owned by `org_id`.
    pub fn may_access_org(&self, org_id: &str) -> bool {
        match &self.role {
            Role::Admin => true,
            Role::OrgMember { org_id: own } => own == org_id,
        }
    }
}

/// Capability that resolves a bearer token to a caller identity.
///
/// `None` means the token is unknown or expired; the web layer turns
/// that into a 401.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn caller_for_token(&self, token: &str) -> Option<Caller>;
}

/// Token-map authenticator bundled for development and tests.
#[derive(Default)]
pub struct StaticAuthenticator {
    tokens: HashMap<String, Caller>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, caller: Caller) -> Self {
        self.tokens.insert(token.into(), caller);
        self
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn caller_for_token(&self, token: &str) -> Option<Caller> {
        self.tokens.get(token).cloned()
    }
}
