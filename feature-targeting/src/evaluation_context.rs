use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tenant applied when a request carries no tenant attribute.
pub const PUBLIC_TENANT: &str = "Public";
pub const STAFF_TENANT: &str = "Staff";

/// Email-domain suffix that marks vault staff accounts. Used by the
/// internal_staff segment and by preview-context synthesis.
pub const STAFF_EMAIL_DOMAIN: &str = "@familyvault.app";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserAttributes {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionAttributes {
    #[serde(default)]
    pub id: Option<String>,
}

/// The attributes an evaluation decision is computed against.
///
/// The schema is deliberately bounded: the well-known user/session fields
/// are typed, and anything else lives in `properties` keyed by its full
/// dotted path. Resolving an absent path yields an empty string, never an
/// error, so sparse contexts degrade to "rule not matched".
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EvaluationContext {
    #[serde(default)]
    pub user: UserAttributes,
    #[serde(default)]
    pub session: SessionAttributes,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

pub fn to_string_representation(value: &Value) -> String {
    if value.is_string() {
        return value
            .as_str()
            .expect("string slice should always exist for string value")
            .to_string();
    }
    value.to_string()
}

impl EvaluationContext {
    /// Resolves a dotted attribute path like `user.email` to its string
    /// value, defaulting to `""` when the path is absent.
    pub fn resolve(&self, path: &str) -> String {
        match path {
            "user.id" => self.user.id.clone().unwrap_or_default(),
            "user.email" => self.user.email.clone().unwrap_or_default(),
            "user.tenant" => self.user.tenant.clone().unwrap_or_default(),
            "user.role" => self.user.role.clone().unwrap_or_default(),
            "session.id" => self.session.id.clone().unwrap_or_default(),
            _ => self
                .properties
                .get(path)
                .map(to_string_representation)
                .unwrap_or_default(),
        }
    }

    /// The tenant this context belongs to, defaulting to the public tenant.
    pub fn tenant(&self) -> &str {
        self.user.tenant.as_deref().unwrap_or(PUBLIC_TENANT)
    }

    /// The identifiers checked against flag-level allow/block lists: the
    /// user id and email, skipping whichever is absent.
    pub fn identifiers(&self) -> Vec<&str> {
        [self.user.id.as_deref(), self.user.email.as_deref()]
            .into_iter()
            .flatten()
            .filter(|value| !value.is_empty())
            .collect()
    }

    /// Synthesizes the minimal context used by admin preview evaluation:
    /// id and email both set to the given identifier, tenant and role
    /// derived from the staff email-domain convention.
    pub fn for_preview(identifier: &str) -> Self {
        let is_staff = identifier.to_lowercase().ends_with(STAFF_EMAIL_DOMAIN);
        EvaluationContext {
            user: UserAttributes {
                id: Some(identifier.to_string()),
                email: Some(identifier.to_string()),
                tenant: Some(if is_staff { STAFF_TENANT } else { PUBLIC_TENANT }.to_string()),
                role: Some(if is_staff { "staff" } else { "member" }.to_string()),
            },
            session: SessionAttributes::default(),
            properties: HashMap::new(),
        }
    }
}
