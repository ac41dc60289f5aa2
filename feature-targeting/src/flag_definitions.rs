use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::EnumString;
use uuid::Uuid;

use crate::api::FlagError;

/// Default bucketing key when a targeting config does not name one.
pub const DEFAULT_ROLLOUT_KEY: &str = "user.id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    Prod,
    Staging,
    Dev,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Environment::Prod => "prod",
                Environment::Staging => "staging",
                Environment::Dev => "dev",
            }
        )
    }
}

impl Environment {
    /// Parses a path/query parameter into an environment, mapping unknown
    /// values to an InvalidArgument-class error instead of a panic.
    pub fn parse(raw: &str) -> Result<Self, FlagError> {
        raw.parse()
            .map_err(|_| FlagError::UnknownEnvironment(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagStatus {
    Active,
    Archived,
}

/// Comparison operators for attribute rules. The wire names follow the
/// product's JSON convention. Operators this build does not know about
/// deserialize to `Unknown` and never match, so a config written by a
/// newer admin surface degrades to "rule not matched" instead of erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", from = "String")]
pub enum OperatorType {
    Equals,
    NotEquals,
    Contains,
    StartsWith,
    EndsWith,
    In,
    Unknown,
}

impl From<String> for OperatorType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "equals" => OperatorType::Equals,
            "notEquals" => OperatorType::NotEquals,
            "contains" => OperatorType::Contains,
            "startsWith" => OperatorType::StartsWith,
            "endsWith" => OperatorType::EndsWith,
            "in" => OperatorType::In,
            _ => OperatorType::Unknown,
        }
    }
}

/// One targeting rule. A config's rule list is conjunctive: every rule
/// must match for the rule gate to pass.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Rule {
    Attribute {
        attr: String,
        operator: OperatorType,
        value: String,
    },
    Segment {
        #[serde(rename = "segmentId")]
        segment_id: String,
    },
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Schedule {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// Per-environment targeting for one flag.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingConfig {
    pub active: bool,
    pub tenants: HashSet<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    pub rollout: u8,
    pub rollout_key: String,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

impl TargetingConfig {
    pub fn validate(&self) -> Result<(), FlagError> {
        if self.rollout > 100 {
            return Err(FlagError::InvalidRollout(i64::from(self.rollout)));
        }
        if self.tenants.is_empty() {
            return Err(FlagError::EmptyTenants);
        }
        Ok(())
    }
}

/// Global, environment-independent flag record. The key is unique across
/// the product and immutable after creation; archiving is the deletion
/// mechanism, so records referenced by targeting configs never disappear.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    pub id: Uuid,
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: FlagStatus,
    #[serde(default)]
    pub force_on: bool,
    #[serde(default)]
    pub force_off: bool,
    #[serde(default)]
    pub allow_user_ids: HashSet<String>,
    #[serde(default)]
    pub block_user_ids: HashSet<String>,
    #[serde(default)]
    pub allow_domains: HashSet<String>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

impl Flag {
    pub fn is_archived(&self) -> bool {
        self.status == FlagStatus::Archived
    }

    /// Whether the email falls under one of the flag's allow-domain
    /// suffixes. Domains compare case-insensitively.
    pub fn matches_allow_domain(&self, email: &str) -> bool {
        if email.is_empty() {
            return false;
        }
        let email = email.to_lowercase();
        self.allow_domains
            .iter()
            .any(|domain| email.ends_with(&domain.to_lowercase()))
    }
}
