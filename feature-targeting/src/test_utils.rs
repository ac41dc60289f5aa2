use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use crate::evaluation_context::{
    EvaluationContext, SessionAttributes, UserAttributes, PUBLIC_TENANT,
};
use crate::flag_definitions::{Flag, FlagStatus, TargetingConfig, DEFAULT_ROLLOUT_KEY};

pub fn random_string(prefix: &str, length: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

/// A plain active flag with no overrides set.
pub fn test_flag(key: &str) -> Flag {
    Flag {
        id: Uuid::now_v7(),
        key: key.to_string(),
        name: key.to_string(),
        description: None,
        status: FlagStatus::Active,
        force_on: false,
        force_off: false,
        allow_user_ids: HashSet::new(),
        block_user_ids: HashSet::new(),
        allow_domains: HashSet::new(),
        updated_at: Utc::now(),
        version: 1,
    }
}

/// An open targeting config: active, public tenant, no rules, full
/// rollout bucketed on the user id.
pub fn test_config() -> TargetingConfig {
    TargetingConfig {
        active: true,
        tenants: [PUBLIC_TENANT.to_string()].into(),
        rules: Vec::new(),
        rollout: 100,
        rollout_key: DEFAULT_ROLLOUT_KEY.to_string(),
        schedule: None,
        updated_at: Utc::now(),
        version: 1,
    }
}

/// A context with just the identity attributes set; tenant and role stay
/// unset so tenant resolution falls back to the public default.
pub fn test_context(id: &str, email: &str) -> EvaluationContext {
    EvaluationContext {
        user: UserAttributes {
            id: Some(id.to_string()),
            email: Some(email.to_string()),
            tenant: None,
            role: None,
        },
        session: SessionAttributes::default(),
        properties: HashMap::new(),
    }
}
