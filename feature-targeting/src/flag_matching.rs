use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::FlagError;
use crate::evaluation_context::EvaluationContext;
use crate::flag_definitions::{Environment, Flag, TargetingConfig};
use crate::flag_match_reason::FlagMatchReason;
use crate::flag_registry::FlagRegistry;
use crate::property_matching::match_rule;
use crate::rollout;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagMatch {
    pub enabled: bool,
    pub reason: FlagMatchReason,
}

impl FlagMatch {
    fn enabled(reason: FlagMatchReason) -> Self {
        FlagMatch {
            enabled: true,
            reason,
        }
    }

    fn disabled(reason: FlagMatchReason) -> Self {
        FlagMatch {
            enabled: false,
            reason,
        }
    }
}

/// Evaluates flags against one context at one instant.
///
/// Matching is a pure function of the flag snapshot, the context and the
/// matcher's clock. It performs no I/O and mutates nothing, so any number
/// of requests can evaluate concurrently over a shared snapshot.
#[derive(Debug)]
pub struct FlagMatcher<'a> {
    pub context: &'a EvaluationContext,
    now: DateTime<Utc>,
}

impl<'a> FlagMatcher<'a> {
    pub fn new(context: &'a EvaluationContext) -> Self {
        Self::at(context, Utc::now())
    }

    /// Matcher pinned to a specific instant, for schedule-sensitive tests.
    pub fn at(context: &'a EvaluationContext, now: DateTime<Utc>) -> Self {
        FlagMatcher { context, now }
    }

    /// Applies the flag-level precedence order, then hands off to the
    /// environment's targeting config. First matching gate wins:
    /// archived, block list, allow list, allow domains, force_off,
    /// force_on, and finally environment targeting.
    pub fn get_match(&self, flag: &Flag, config: Option<&TargetingConfig>) -> FlagMatch {
        if flag.is_archived() {
            return FlagMatch::disabled(FlagMatchReason::Archived);
        }

        let identifiers = self.context.identifiers();

        // Block beats allow and beats force_on: kill-switch semantics.
        if identifiers
            .iter()
            .any(|id| flag.block_user_ids.contains(*id))
        {
            return FlagMatch::disabled(FlagMatchReason::Blocked);
        }

        if identifiers
            .iter()
            .any(|id| flag.allow_user_ids.contains(*id))
        {
            return FlagMatch::enabled(FlagMatchReason::Allowed);
        }

        if flag.matches_allow_domain(&self.context.resolve("user.email")) {
            return FlagMatch::enabled(FlagMatchReason::Allowed);
        }

        if flag.force_off {
            return FlagMatch::disabled(FlagMatchReason::ForcedOff);
        }

        if flag.force_on {
            return FlagMatch::enabled(FlagMatchReason::ForcedOn);
        }

        match config {
            None => FlagMatch::disabled(FlagMatchReason::InactiveEnvironment),
            Some(config) => self.evaluate_config(config),
        }
    }

    /// Evaluates one environment's targeting config: active switch,
    /// tenant gate, schedule window, rule gate, then the rollout gate.
    pub fn evaluate_config(&self, config: &TargetingConfig) -> FlagMatch {
        if !config.active {
            return FlagMatch::disabled(FlagMatchReason::InactiveEnvironment);
        }

        if !config.tenants.contains(self.context.tenant()) {
            return FlagMatch::disabled(FlagMatchReason::TenantNotPermitted);
        }

        if let Some(schedule) = &config.schedule {
            // Strict comparisons keep both boundaries inside the window.
            if schedule.start.map_or(false, |start| self.now < start) {
                return FlagMatch::disabled(FlagMatchReason::OutsideSchedule);
            }
            if schedule.end.map_or(false, |end| self.now > end) {
                return FlagMatch::disabled(FlagMatchReason::OutsideSchedule);
            }
        }

        let has_rules = !config.rules.is_empty();
        if has_rules && !config.rules.iter().all(|rule| match_rule(rule, self.context)) {
            return FlagMatch::disabled(FlagMatchReason::RulesNotMatched);
        }

        let key = self.context.resolve(&config.rollout_key);
        if key.is_empty() {
            // Matching a rule is sufficient even without a resolvable
            // bucketing key; with no rules there is nothing to gate on.
            return if has_rules {
                FlagMatch::enabled(FlagMatchReason::RulesMatchedNoRolloutGate)
            } else {
                FlagMatch::disabled(FlagMatchReason::RolloutExcluded)
            };
        }

        if rollout::bucket(&key) < u32::from(config.rollout) {
            FlagMatch::enabled(FlagMatchReason::RolloutIncluded)
        } else {
            FlagMatch::disabled(FlagMatchReason::RolloutExcluded)
        }
    }
}

/// Evaluates one flag for one environment. Unknown keys are the only
/// error; everything downstream of "flag exists" resolves to a
/// deterministic enabled/disabled outcome.
pub async fn evaluate_flag(
    registry: &dyn FlagRegistry,
    flag_key: &str,
    environment: Environment,
    context: &EvaluationContext,
) -> Result<FlagMatch, FlagError> {
    let snapshot = registry.snapshot().await?;
    let bundle = snapshot.flags.get(flag_key).ok_or(FlagError::UnknownFlag)?;
    let matcher = FlagMatcher::new(context);
    Ok(matcher.get_match(&bundle.flag, bundle.targeting.get(&environment)))
}

/// Evaluates every flag in the snapshot for one context, as consumed by
/// the end-user endpoint.
pub async fn evaluate_all(
    registry: &dyn FlagRegistry,
    environment: Environment,
    context: &EvaluationContext,
) -> Result<HashMap<String, bool>, FlagError> {
    let snapshot = registry.snapshot().await?;
    let matcher = FlagMatcher::new(context);

    Ok(snapshot
        .flags
        .iter()
        .map(|(key, bundle)| {
            let result = matcher.get_match(&bundle.flag, bundle.targeting.get(&environment));
            (key.clone(), result.enabled)
        })
        .collect())
}

/// Admin preview: synthesizes a context for the given identifier and runs
/// the production evaluation path, so preview results are trustworthy.
pub async fn evaluate_preview(
    registry: &dyn FlagRegistry,
    flag_key: &str,
    environment: Environment,
    identifier: &str,
) -> Result<FlagMatch, FlagError> {
    let context = EvaluationContext::for_preview(identifier);
    evaluate_flag(registry, flag_key, environment, &context).await
}
