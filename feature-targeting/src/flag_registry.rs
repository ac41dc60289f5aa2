use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use crate::api::FlagError;
use crate::evaluation_context::PUBLIC_TENANT;
use crate::flag_definitions::{
    Environment, Flag, FlagStatus, TargetingConfig, DEFAULT_ROLLOUT_KEY,
};
use crate::v0_request::{CreateFlagRequest, TargetingUpdateRequest, UpdateFlagRequest};

/// One flag plus its per-environment targeting configs.
#[derive(Debug, Clone)]
pub struct FlagBundle {
    pub flag: Flag,
    pub targeting: HashMap<Environment, TargetingConfig>,
}

/// An immutable view of every flag and targeting config, keyed by flag
/// key. A single evaluation reads exactly one snapshot, so it can never
/// observe a half-applied write.
#[derive(Debug, Clone, Default)]
pub struct FlagSnapshot {
    pub flags: HashMap<String, FlagBundle>,
}

/// Read contract the evaluation engine depends on. The store behind it is
/// swappable; evaluation only ever needs a consistent snapshot.
#[async_trait]
pub trait FlagRegistry: Send + Sync {
    async fn snapshot(&self) -> Result<Arc<FlagSnapshot>, FlagError>;
}

/// In-memory registry. Readers clone the current `Arc` and go; writers
/// clone the map, mutate, and publish a fresh `Arc` under a dedicated
/// write lock, so writes serialize without ever blocking readers.
#[derive(Debug, Default)]
pub struct MemoryFlagRegistry {
    current: RwLock<Arc<FlagSnapshot>>,
    writer: Mutex<()>,
}

#[async_trait]
impl FlagRegistry for MemoryFlagRegistry {
    async fn snapshot(&self) -> Result<Arc<FlagSnapshot>, FlagError> {
        Ok(self.read_current())
    }
}

impl MemoryFlagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_current(&self) -> Arc<FlagSnapshot> {
        self.current.read().expect("snapshot lock poisoned").clone()
    }

    fn publish(&self, next: FlagSnapshot) {
        *self.current.write().expect("snapshot lock poisoned") = Arc::new(next);
    }

    #[instrument(skip_all, fields(key))]
    pub async fn create_flag(&self, request: CreateFlagRequest) -> Result<Flag, FlagError> {
        let _guard = self.writer.lock().await;

        let key = request
            .key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(FlagError::MissingField("key"))?
            .to_string();
        tracing::Span::current().record("key", key.as_str());

        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(FlagError::MissingField("name"))?
            .to_string();

        if request.force_on && request.force_off {
            return Err(FlagError::ForceConflict);
        }

        let mut next = (*self.read_current()).clone();
        if next.flags.contains_key(&key) {
            return Err(FlagError::DuplicateKey(key));
        }

        let now = Utc::now();
        let mut flag = Flag {
            id: Uuid::now_v7(),
            key: key.clone(),
            name,
            description: request.description,
            status: request.status.unwrap_or(FlagStatus::Active),
            force_on: request.force_on,
            force_off: request.force_off,
            allow_user_ids: Default::default(),
            block_user_ids: Default::default(),
            allow_domains: Default::default(),
            updated_at: now,
            version: 1,
        };

        // The legacy flat targeting shape seeds the flag-level lists and
        // an initial prod config, so older admin surfaces keep working.
        let mut targeting = HashMap::new();
        if let Some(seed) = request.targeting {
            let rollout = u8::try_from(seed.percentage)
                .ok()
                .filter(|pct| *pct <= 100)
                .ok_or(FlagError::InvalidRollout(seed.percentage))?;

            flag.allow_user_ids = seed.allow_user_ids;
            flag.block_user_ids = seed.block_user_ids;
            flag.allow_domains = seed.allow_domains;

            targeting.insert(
                Environment::Prod,
                TargetingConfig {
                    active: true,
                    tenants: [PUBLIC_TENANT.to_string()].into(),
                    rules: Vec::new(),
                    rollout,
                    rollout_key: DEFAULT_ROLLOUT_KEY.to_string(),
                    schedule: None,
                    updated_at: now,
                    version: 1,
                },
            );
        }

        next.flags.insert(
            key,
            FlagBundle {
                flag: flag.clone(),
                targeting,
            },
        );
        self.publish(next);

        Ok(flag)
    }

    #[instrument(skip_all, fields(id = %id))]
    pub async fn update_flag(&self, id: Uuid, request: UpdateFlagRequest) -> Result<Flag, FlagError> {
        let _guard = self.writer.lock().await;

        // The key is immutable after creation.
        if request.key.is_some() {
            return Err(FlagError::ImmutableField("key"));
        }
        if request.force_on == Some(true) && request.force_off == Some(true) {
            return Err(FlagError::ForceConflict);
        }

        let mut next = (*self.read_current()).clone();
        let bundle = next
            .flags
            .values_mut()
            .find(|bundle| bundle.flag.id == id)
            .ok_or(FlagError::UnknownFlag)?;

        if let Some(expected) = request.version {
            if expected != bundle.flag.version {
                return Err(FlagError::StaleVersion);
            }
        }

        let flag = &mut bundle.flag;
        if let Some(name) = request.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(FlagError::MissingField("name"));
            }
            flag.name = name.to_string();
        }
        if let Some(description) = request.description {
            flag.description = Some(description);
        }
        if let Some(status) = request.status {
            flag.status = status;
        }
        // Setting one force switch clears the other.
        if let Some(force_on) = request.force_on {
            flag.force_on = force_on;
            if force_on {
                flag.force_off = false;
            }
        }
        if let Some(force_off) = request.force_off {
            flag.force_off = force_off;
            if force_off {
                flag.force_on = false;
            }
        }
        if let Some(allow_user_ids) = request.allow_user_ids {
            flag.allow_user_ids = allow_user_ids;
        }
        if let Some(block_user_ids) = request.block_user_ids {
            flag.block_user_ids = block_user_ids;
        }
        if let Some(allow_domains) = request.allow_domains {
            flag.allow_domains = allow_domains;
        }

        flag.updated_at = Utc::now();
        flag.version += 1;
        let updated = flag.clone();

        self.publish(next);
        Ok(updated)
    }

    #[instrument(skip_all, fields(key = flag_key, environment = %environment))]
    pub async fn upsert_targeting(
        &self,
        flag_key: &str,
        environment: Environment,
        request: TargetingUpdateRequest,
    ) -> Result<TargetingConfig, FlagError> {
        let _guard = self.writer.lock().await;

        let rollout = u8::try_from(request.rollout)
            .ok()
            .filter(|pct| *pct <= 100)
            .ok_or(FlagError::InvalidRollout(request.rollout))?;
        if request.tenants.is_empty() {
            return Err(FlagError::EmptyTenants);
        }

        let mut next = (*self.read_current()).clone();
        let bundle = next
            .flags
            .get_mut(flag_key)
            .ok_or(FlagError::UnknownFlag)?;

        let version = match bundle.targeting.get(&environment) {
            Some(existing) => {
                if let Some(expected) = request.version {
                    if expected != existing.version {
                        return Err(FlagError::StaleVersion);
                    }
                }
                existing.version + 1
            }
            None => 1,
        };

        let rollout_key = if request.rollout_key.trim().is_empty() {
            DEFAULT_ROLLOUT_KEY.to_string()
        } else {
            request.rollout_key
        };

        let config = TargetingConfig {
            active: request.active,
            tenants: request.tenants,
            rules: request.rules,
            rollout,
            rollout_key,
            schedule: request.schedule,
            updated_at: Utc::now(),
            version,
        };
        config.validate()?;

        bundle.targeting.insert(environment, config.clone());
        self.publish(next);

        Ok(config)
    }

    pub async fn get_targeting(
        &self,
        flag_key: &str,
        environment: Environment,
    ) -> Result<TargetingConfig, FlagError> {
        let snapshot = self.read_current();
        let bundle = snapshot.flags.get(flag_key).ok_or(FlagError::UnknownFlag)?;
        bundle
            .targeting
            .get(&environment)
            .cloned()
            .ok_or(FlagError::TargetingNotFound)
    }
}
