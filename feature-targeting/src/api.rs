use std::collections::HashMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flag_definitions::Flag;

/// Response shape for the end-user evaluation endpoint. The surrounding
/// product consumes camelCase JSON, so wire types rename accordingly.
#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagsResponse {
    pub error_while_computing_flags: bool,
    pub feature_flags: HashMap<String, bool>,
}

/// Flat targeting summary nested under each flag in the admin list view.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingSummary {
    pub percentage: u8,
    pub allow_domains: Vec<String>,
    pub allow_user_ids: Vec<String>,
    pub block_user_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FlagListEntry {
    #[serde(flatten)]
    pub flag: Flag,
    pub targeting: TargetingSummary,
}

#[derive(Error, Debug)]
pub enum FlagError {
    #[error("failed to decode request: {0}")]
    RequestDecodingError(String),
    #[error("failed to parse request: {0}")]
    RequestParsingError(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("field cannot be changed after creation: {0}")]
    ImmutableField(&'static str),
    #[error("rollout percentage must be between 0 and 100, got {0}")]
    InvalidRollout(i64),
    #[error("targeting config must keep at least one tenant")]
    EmptyTenants,
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),
    #[error("force_on and force_off are mutually exclusive")]
    ForceConflict,
    #[error("no user identity on request")]
    MissingIdentity,

    #[error("unknown flag key")]
    UnknownFlag,
    #[error("no targeting config for this environment")]
    TargetingNotFound,

    #[error("a flag with this key already exists: {0}")]
    DuplicateKey(String),
    #[error("stale version, the flag was updated concurrently")]
    StaleVersion,
}

impl IntoResponse for FlagError {
    fn into_response(self) -> Response {
        match self {
            FlagError::RequestDecodingError(_)
            | FlagError::RequestParsingError(_)
            | FlagError::MissingField(_)
            | FlagError::ImmutableField(_)
            | FlagError::InvalidRollout(_)
            | FlagError::EmptyTenants
            | FlagError::UnknownEnvironment(_)
            | FlagError::ForceConflict
            | FlagError::MissingIdentity => (StatusCode::BAD_REQUEST, self.to_string()),

            FlagError::UnknownFlag | FlagError::TargetingNotFound => {
                (StatusCode::NOT_FOUND, self.to_string())
            }

            FlagError::DuplicateKey(_) | FlagError::StaleVersion => {
                (StatusCode::CONFLICT, self.to_string())
            }
        }
        .into_response()
    }
}
