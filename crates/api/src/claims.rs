//! Bearer-token claims as produced by the identity provider.
//!
//! Both verification strategies yield the same [`TokenClaims`] value: the
//! remote introspection endpoint returns `active_org_*` fields, while the
//! session JWT carries the shorter `org_*` names. Serde aliases cover both.

use serde::{Deserialize, Serialize};

use crate::{OrgRole, ServiceError};

/// Claims extracted from a verified bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Provider user id.
    pub sub: String,

    /// Active organization id. `None` = personal session, no restaurant
    /// context.
    #[serde(default, alias = "active_org_id")]
    pub org_id: Option<String>,

    /// Active organization slug.
    #[serde(default, alias = "active_org_slug")]
    pub org_slug: Option<String>,

    /// Active organization role, e.g. `org:admin`.
    #[serde(default, alias = "active_org_role")]
    pub org_role: Option<String>,
}

impl TokenClaims {
    /// Whether the caller is an organization admin.
    pub fn is_admin(&self) -> bool {
        self.org_role
            .as_deref()
            .map(|r| OrgRole::from_provider(r) == OrgRole::Admin)
            .unwrap_or(false)
    }

    /// The active organization id, or 401 when the session has none.
    pub fn require_org(&self) -> Result<&str, ServiceError> {
        self.org_id.as_deref().ok_or_else(|| {
            ServiceError::Unauthorized("no active organization in token".into())
        })
    }
}

/// Introspection response envelope: `{"active": bool, ...claims}`.
#[derive(Debug, Deserialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(flatten)]
    pub claims: TokenClaims,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_accept_introspection_field_names() {
        let json = r#"{
            "active": true,
            "sub": "user_2x",
            "active_org_id": "org_9k",
            "active_org_slug": "chez-marcel",
            "active_org_role": "org:admin"
        }"#;
        let resp: IntrospectionResponse = serde_json::from_str(json).unwrap();
        assert!(resp.active);
        assert_eq!(resp.claims.sub, "user_2x");
        assert_eq!(resp.claims.org_id.as_deref(), Some("org_9k"));
        assert!(resp.claims.is_admin());
    }

    #[test]
    fn claims_accept_jwt_field_names() {
        let json = r#"{"sub": "user_2x", "org_id": "org_9k", "org_role": "org:member"}"#;
        let claims: TokenClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.org_id.as_deref(), Some("org_9k"));
        assert!(!claims.is_admin());
    }

    #[test]
    fn require_org_rejects_personal_sessions() {
        let claims: TokenClaims = serde_json::from_str(r#"{"sub": "user_2x"}"#).unwrap();
        let err = claims.require_org().unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
