use crate::evaluation_context::EvaluationContext;
use crate::flag_definitions::{OperatorType, Rule};
use crate::segment_matching;

/// Evaluates a single targeting rule against a context.
///
/// Matching fails closed: missing attributes resolve to an empty string,
/// unknown segments and unknown operators are simply not a match. Nothing
/// in here can panic on malformed context data.
pub fn match_rule(rule: &Rule, context: &EvaluationContext) -> bool {
    match rule {
        Rule::Segment { segment_id } => segment_matching::in_segment(segment_id, context),
        Rule::Attribute {
            attr,
            operator,
            value,
        } => match_attribute(attr, *operator, value, context),
    }
}

fn match_attribute(
    attr: &str,
    operator: OperatorType,
    value: &str,
    context: &EvaluationContext,
) -> bool {
    // Values are compared as strings, preserving the product's loose
    // equality semantics for numeric and boolean attributes.
    let resolved = context.resolve(attr);

    match operator {
        OperatorType::Equals => resolved == value,
        OperatorType::NotEquals => resolved != value,
        OperatorType::Contains => resolved.contains(value),
        OperatorType::StartsWith => resolved.starts_with(value),
        OperatorType::EndsWith => resolved.ends_with(value),
        OperatorType::In => value
            .split(',')
            .map(str::trim)
            .any(|candidate| candidate == resolved),
        OperatorType::Unknown => false,
    }
}
