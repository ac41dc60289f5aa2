use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use bytes::Bytes;
use tracing::instrument;
use uuid::Uuid;

use crate::api::{FlagError, FlagListEntry, FlagsResponse, TargetingSummary};
use crate::flag_definitions::{Environment, Flag, TargetingConfig};
use crate::flag_matching::{self, FlagMatch};
use crate::flag_registry::FlagRegistry;
use crate::router;
use crate::v0_request::{
    context_from_headers, decode_body, CreateFlagRequest, EvaluationQueryParams,
    PreviewQueryParams, TargetingUpdateRequest, UpdateFlagRequest,
};

fn parse_environment(raw: Option<&str>) -> Result<Environment, FlagError> {
    match raw {
        Some(raw) => Environment::parse(raw),
        None => Ok(Environment::Prod),
    }
}

fn sorted(set: &HashSet<String>) -> Vec<String> {
    let mut values: Vec<String> = set.iter().cloned().collect();
    values.sort();
    values
}

/// Admin list view: every flag with its flat targeting summary.
#[instrument(skip_all)]
pub async fn list_flags(
    State(state): State<router::State>,
) -> Result<Json<Vec<FlagListEntry>>, FlagError> {
    let snapshot = state.registry.snapshot().await?;

    let mut entries: Vec<FlagListEntry> = snapshot
        .flags
        .values()
        .map(|bundle| {
            let percentage = bundle
                .targeting
                .get(&Environment::Prod)
                .map_or(0, |config| config.rollout);
            FlagListEntry {
                flag: bundle.flag.clone(),
                targeting: TargetingSummary {
                    percentage,
                    allow_domains: sorted(&bundle.flag.allow_domains),
                    allow_user_ids: sorted(&bundle.flag.allow_user_ids),
                    block_user_ids: sorted(&bundle.flag.block_user_ids),
                },
            }
        })
        .collect();
    entries.sort_by(|a, b| a.flag.key.cmp(&b.flag.key));

    Ok(Json(entries))
}

#[instrument(skip_all)]
pub async fn create_flag(
    State(state): State<router::State>,
    body: Bytes,
) -> Result<(StatusCode, Json<Flag>), FlagError> {
    let request: CreateFlagRequest = decode_body(body)?;
    let flag = state.registry.create_flag(request).await?;
    Ok((StatusCode::CREATED, Json(flag)))
}

#[instrument(skip_all, fields(id = %id))]
pub async fn update_flag(
    State(state): State<router::State>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<Flag>, FlagError> {
    let request: UpdateFlagRequest = decode_body(body)?;
    let flag = state.registry.update_flag(id, request).await?;
    Ok(Json(flag))
}

/// End-user evaluation endpoint: one boolean per flag, computed against
/// the identity headers (or the preview identity, when given).
#[instrument(skip_all, fields(environment))]
pub async fn my_flags(
    State(state): State<router::State>,
    Query(params): Query<EvaluationQueryParams>,
    headers: HeaderMap,
) -> Result<Json<FlagsResponse>, FlagError> {
    let environment = parse_environment(params.environment.as_deref())?;
    tracing::Span::current().record("environment", environment.to_string());

    let context = context_from_headers(&headers)?;
    let feature_flags =
        flag_matching::evaluate_all(state.registry.as_ref(), environment, &context).await?;

    Ok(Json(FlagsResponse {
        error_while_computing_flags: false,
        feature_flags,
    }))
}

#[instrument(skip_all, fields(key, environment))]
pub async fn get_targeting(
    State(state): State<router::State>,
    Path((key, environment)): Path<(String, String)>,
) -> Result<Json<TargetingConfig>, FlagError> {
    let environment = Environment::parse(&environment)?;
    let config = state.registry.get_targeting(&key, environment).await?;
    Ok(Json(config))
}

#[instrument(skip_all, fields(key, environment))]
pub async fn put_targeting(
    State(state): State<router::State>,
    Path((key, environment)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<TargetingConfig>, FlagError> {
    let environment = Environment::parse(&environment)?;
    let request: TargetingUpdateRequest = decode_body(body)?;
    let config = state
        .registry
        .upsert_targeting(&key, environment, request)
        .await?;
    Ok(Json(config))
}

/// Admin preview: evaluates one flag for a synthesized identity through
/// the exact code path production evaluation uses.
#[instrument(skip_all, fields(key))]
pub async fn preview_flag(
    State(state): State<router::State>,
    Path(key): Path<String>,
    Query(params): Query<PreviewQueryParams>,
) -> Result<Json<FlagMatch>, FlagError> {
    let environment = parse_environment(params.environment.as_deref())?;
    let identifier = params
        .user
        .as_deref()
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .ok_or(FlagError::MissingField("user"))?;

    let result =
        flag_matching::evaluate_preview(state.registry.as_ref(), &key, environment, identifier)
            .await?;
    Ok(Json(result))
}
