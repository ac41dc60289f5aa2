use serde::Serialize;
use strum::EnumString;

/// Which gate decided the outcome of an evaluation. Exactly one reason is
/// attached to every result, so admins can see why a user did or did not
/// receive a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, EnumString)]
#[serde(rename_all = "snake_case")]
pub enum FlagMatchReason {
    #[strum(serialize = "forced_on")]
    ForcedOn,
    #[strum(serialize = "forced_off")]
    ForcedOff,
    #[strum(serialize = "archived")]
    Archived,
    #[strum(serialize = "blocked")]
    Blocked,
    #[strum(serialize = "allowed")]
    Allowed,
    #[strum(serialize = "inactive_environment")]
    InactiveEnvironment,
    #[strum(serialize = "outside_schedule")]
    OutsideSchedule,
    #[strum(serialize = "tenant_not_permitted")]
    TenantNotPermitted,
    #[strum(serialize = "rules_not_matched")]
    RulesNotMatched,
    #[strum(serialize = "rollout_excluded")]
    RolloutExcluded,
    #[strum(serialize = "rollout_included")]
    RolloutIncluded,
    #[strum(serialize = "rules_matched_no_rollout_gate")]
    RulesMatchedNoRolloutGate,
}

impl std::fmt::Display for FlagMatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                FlagMatchReason::ForcedOn => "forced_on",
                FlagMatchReason::ForcedOff => "forced_off",
                FlagMatchReason::Archived => "archived",
                FlagMatchReason::Blocked => "blocked",
                FlagMatchReason::Allowed => "allowed",
                FlagMatchReason::InactiveEnvironment => "inactive_environment",
                FlagMatchReason::OutsideSchedule => "outside_schedule",
                FlagMatchReason::TenantNotPermitted => "tenant_not_permitted",
                FlagMatchReason::RulesNotMatched => "rules_not_matched",
                FlagMatchReason::RolloutExcluded => "rollout_excluded",
                FlagMatchReason::RolloutIncluded => "rollout_included",
                FlagMatchReason::RulesMatchedNoRolloutGate => "rules_matched_no_rollout_gate",
            }
        )
    }
}
