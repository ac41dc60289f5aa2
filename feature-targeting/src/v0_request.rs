use std::collections::{HashMap, HashSet};

use axum::http::HeaderMap;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::instrument;

use crate::api::FlagError;
use crate::evaluation_context::{EvaluationContext, SessionAttributes, UserAttributes};
use crate::flag_definitions::{FlagStatus, Rule, Schedule, DEFAULT_ROLLOUT_KEY};

/// Header the admin UI sets to evaluate `/flags/mine` as somebody else.
pub const PREVIEW_USER_HEADER: &str = "x-preview-user";

/// Takes a request payload and tries to unmarshall it. Bodies are small
/// admin payloads, so no compression handling here.
#[instrument(skip_all)]
pub fn decode_body<T: DeserializeOwned>(bytes: Bytes) -> Result<T, FlagError> {
    tracing::debug!(len = bytes.len(), "decoding new request");
    let payload = String::from_utf8(bytes.into()).map_err(|e| {
        tracing::error!("failed to decode body: {}", e);
        FlagError::RequestDecodingError(String::from("invalid body encoding"))
    })?;

    Ok(serde_json::from_str::<T>(&payload)?)
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateFlagRequest {
    pub key: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<FlagStatus>,
    #[serde(default, alias = "forceOn")]
    pub force_on: bool,
    #[serde(default, alias = "forceOff")]
    pub force_off: bool,
    #[serde(default)]
    pub targeting: Option<TargetingSeed>,
}

/// The legacy flat targeting shape accepted on create: flag-level lists
/// plus a plain prod percentage.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingSeed {
    #[serde(default)]
    pub percentage: i64,
    #[serde(default)]
    pub allow_domains: HashSet<String>,
    #[serde(default)]
    pub allow_user_ids: HashSet<String>,
    #[serde(default)]
    pub block_user_ids: HashSet<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateFlagRequest {
    // Present only to reject attempts to rename a key.
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<FlagStatus>,
    #[serde(default, alias = "forceOn")]
    pub force_on: Option<bool>,
    #[serde(default, alias = "forceOff")]
    pub force_off: Option<bool>,
    #[serde(default, alias = "allowUserIds")]
    pub allow_user_ids: Option<HashSet<String>>,
    #[serde(default, alias = "blockUserIds")]
    pub block_user_ids: Option<HashSet<String>>,
    #[serde(default, alias = "allowDomains")]
    pub allow_domains: Option<HashSet<String>>,
    #[serde(default)]
    pub version: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingUpdateRequest {
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub tenants: HashSet<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub rollout: i64,
    #[serde(default = "default_rollout_key")]
    pub rollout_key: String,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub version: Option<i32>,
}

impl Default for TargetingUpdateRequest {
    fn default() -> Self {
        TargetingUpdateRequest {
            active: true,
            tenants: HashSet::new(),
            rules: Vec::new(),
            rollout: 0,
            rollout_key: default_rollout_key(),
            schedule: None,
            version: None,
        }
    }
}

fn default_active() -> bool {
    true
}

fn default_rollout_key() -> String {
    DEFAULT_ROLLOUT_KEY.to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct EvaluationQueryParams {
    #[serde(default)]
    pub environment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviewQueryParams {
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

/// Builds the evaluation context for `/flags/mine` from the identity
/// headers the (out-of-scope) auth layer forwards, or from the preview
/// header when present. Preview takes precedence.
pub fn context_from_headers(headers: &HeaderMap) -> Result<EvaluationContext, FlagError> {
    if let Some(preview_user) = header_value(headers, PREVIEW_USER_HEADER) {
        return Ok(EvaluationContext::for_preview(&preview_user));
    }

    let id = header_value(headers, "x-user-id");
    let email = header_value(headers, "x-user-email");
    if id.is_none() && email.is_none() {
        return Err(FlagError::MissingIdentity);
    }

    Ok(EvaluationContext {
        user: UserAttributes {
            id,
            email,
            tenant: header_value(headers, "x-user-tenant"),
            role: header_value(headers, "x-user-role"),
        },
        session: SessionAttributes {
            id: header_value(headers, "x-session-id"),
        },
        properties: HashMap::new(),
    })
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
