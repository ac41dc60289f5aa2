use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::evaluation_context::{EvaluationContext, STAFF_EMAIL_DOMAIN};

pub type SegmentPredicate = fn(&EvaluationContext) -> bool;

/// Segment membership predicates, keyed by segment id.
///
/// Segments are code-defined on purpose: adding one is a deployment-time
/// change, which keeps the predicates auditable and stops the rule system
/// from growing arbitrary admin-authored logic.
static SEGMENTS: Lazy<HashMap<&'static str, SegmentPredicate>> = Lazy::new(|| {
    let entries: [(&'static str, SegmentPredicate); 3] = [
        ("internal_staff", is_internal_staff),
        ("beta_testers", is_beta_tester),
        ("household_owners", is_household_owner),
    ];
    HashMap::from(entries)
});

/// Evaluates segment membership. Unknown segment ids are not a match and
/// never an error.
pub fn in_segment(segment_id: &str, context: &EvaluationContext) -> bool {
    SEGMENTS
        .get(segment_id)
        .map_or(false, |predicate| predicate(context))
}

pub fn known_segments() -> Vec<&'static str> {
    let mut ids: Vec<&'static str> = SEGMENTS.keys().copied().collect();
    ids.sort_unstable();
    ids
}

fn is_internal_staff(context: &EvaluationContext) -> bool {
    context
        .resolve("user.email")
        .to_lowercase()
        .ends_with(STAFF_EMAIL_DOMAIN)
        || context.resolve("user.role") == "staff"
}

fn is_beta_tester(context: &EvaluationContext) -> bool {
    context.resolve("user.role") == "beta" || context.resolve("user.beta_opt_in") == "true"
}

fn is_household_owner(context: &EvaluationContext) -> bool {
    context.resolve("user.role") == "owner"
}
