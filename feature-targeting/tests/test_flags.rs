use anyhow::Result;
use assert_json_diff::assert_json_include;

use reqwest::StatusCode;
use serde_json::{json, Value};

use feature_targeting::test_utils::random_string;

use crate::common::*;
mod common;

#[tokio::test]
async fn it_creates_and_lists_flags() -> Result<()> {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;
    let key = random_string("flag-", 8);

    let res = server
        .post(
            "/flags",
            json!({
                "key": key,
                "name": "Shared album uploads",
                "description": "New upload pipeline for shared albums",
                "targeting": {"percentage": 25, "allowDomains": ["@co.com"]}
            })
            .to_string(),
        )
        .await;
    assert_eq!(StatusCode::CREATED, res.status());

    let created = res.json::<Value>().await?;
    assert_json_include!(
        actual: created.clone(),
        expected: json!({
            "key": key,
            "name": "Shared album uploads",
            "status": "active",
            "version": 1
        })
    );

    let res = server.get("/flags").await;
    assert_eq!(StatusCode::OK, res.status());

    // We assert on the raw json to pin the wire shape, not our own structs.
    let listed = res.json::<Value>().await?;
    assert_json_include!(
        actual: listed,
        expected: json!([{
            "key": key,
            "targeting": {
                "percentage": 25,
                "allowDomains": ["@co.com"],
                "allowUserIds": [],
                "blockUserIds": []
            }
        }])
    );

    Ok(())
}

#[tokio::test]
async fn it_rejects_creation_without_required_fields() -> Result<()> {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    let res = server
        .post("/flags", json!({"name": "No key"}).to_string())
        .await;
    assert_eq!(StatusCode::BAD_REQUEST, res.status());

    let res = server
        .post("/flags", json!({"key": "orphan"}).to_string())
        .await;
    assert_eq!(StatusCode::BAD_REQUEST, res.status());

    Ok(())
}

#[tokio::test]
async fn it_conflicts_on_duplicate_keys() -> Result<()> {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;
    let body = json!({"key": "calendar-v2", "name": "Calendar v2"}).to_string();

    let res = server.post("/flags", body.clone()).await;
    assert_eq!(StatusCode::CREATED, res.status());

    let res = server.post("/flags", body).await;
    assert_eq!(StatusCode::CONFLICT, res.status());

    Ok(())
}

#[tokio::test]
async fn it_evaluates_flags_for_the_authenticated_user() -> Result<()> {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    server
        .post(
            "/flags",
            json!({
                "key": "rollout-flag",
                "name": "Rollout flag",
                "targeting": {"percentage": 100}
            })
            .to_string(),
        )
        .await;
    server
        .post(
            "/flags",
            json!({"key": "killed-flag", "name": "Killed flag", "force_off": true}).to_string(),
        )
        .await;

    let res = server
        .get_with_headers(
            "/flags/mine",
            &[("X-User-Id", "u1"), ("X-User-Email", "alice@co.com")],
        )
        .await;
    assert_eq!(StatusCode::OK, res.status());

    let json_data = res.json::<Value>().await?;
    assert_json_include!(
        actual: json_data,
        expected: json!({
            "errorWhileComputingFlags": false,
            "featureFlags": {
                "rollout-flag": true,
                "killed-flag": false,
            }
        })
    );

    Ok(())
}

#[tokio::test]
async fn it_requires_an_identity_for_evaluation() -> Result<()> {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    let res = server.get("/flags/mine").await;
    assert_eq!(StatusCode::BAD_REQUEST, res.status());

    Ok(())
}

#[tokio::test]
async fn it_lets_block_beat_allow_and_force_on() -> Result<()> {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    let res = server
        .post(
            "/flags",
            json!({
                "key": "new-billing-ui",
                "name": "New billing UI",
                "force_on": true,
                "targeting": {
                    "allowUserIds": ["alice@co.com"],
                    "blockUserIds": ["alice@co.com"],
                    "percentage": 100
                }
            })
            .to_string(),
        )
        .await;
    assert_eq!(StatusCode::CREATED, res.status());

    let res = server
        .get_with_headers("/flags/mine", &[("X-User-Email", "alice@co.com")])
        .await;
    let json_data = res.json::<Value>().await?;
    assert_json_include!(
        actual: json_data,
        expected: json!({"featureFlags": {"new-billing-ui": false}})
    );

    let res = server
        .get("/flags/new-billing-ui/preview?environment=prod&user=alice@co.com")
        .await;
    assert_eq!(StatusCode::OK, res.status());
    let preview = res.json::<Value>().await?;
    assert_json_include!(
        actual: preview,
        expected: json!({"enabled": false, "reason": "blocked"})
    );

    Ok(())
}

#[tokio::test]
async fn it_applies_environment_targeting_rules() -> Result<()> {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    server
        .post(
            "/flags",
            json!({"key": "vault-search", "name": "Vault search"}).to_string(),
        )
        .await;

    let res = server
        .put(
            "/flags/vault-search/targeting/staging",
            json!({
                "active": true,
                "tenants": ["Public"],
                "rules": [{"attr": "user.email", "operator": "endsWith", "value": "@co.com"}],
                "rollout": 100,
                "rolloutKey": "user.id"
            })
            .to_string(),
        )
        .await;
    assert_eq!(StatusCode::OK, res.status());

    let res = server
        .get_with_headers(
            "/flags/mine?environment=staging",
            &[("X-User-Id", "u1"), ("X-User-Email", "alice@co.com")],
        )
        .await;
    let json_data = res.json::<Value>().await?;
    assert_json_include!(
        actual: json_data,
        expected: json!({"featureFlags": {"vault-search": true}})
    );

    // Same environment, email outside the rule: not matched.
    let res = server
        .get_with_headers(
            "/flags/mine?environment=staging",
            &[("X-User-Id", "u2"), ("X-User-Email", "eve@other.org")],
        )
        .await;
    let json_data = res.json::<Value>().await?;
    assert_json_include!(
        actual: json_data,
        expected: json!({"featureFlags": {"vault-search": false}})
    );

    // No targeting config exists for prod, so prod stays off.
    let res = server
        .get_with_headers(
            "/flags/mine",
            &[("X-User-Id", "u1"), ("X-User-Email", "alice@co.com")],
        )
        .await;
    let json_data = res.json::<Value>().await?;
    assert_json_include!(
        actual: json_data,
        expected: json!({"featureFlags": {"vault-search": false}})
    );

    Ok(())
}

#[tokio::test]
async fn it_buckets_previews_deterministically() -> Result<()> {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    server
        .post(
            "/flags",
            json!({"key": "timeline-beta", "name": "Timeline beta"}).to_string(),
        )
        .await;

    // "u1" hashes to bucket 76: outside a 25% rollout.
    server
        .put(
            "/flags/timeline-beta/targeting/prod",
            json!({"tenants": ["Public"], "rollout": 25}).to_string(),
        )
        .await;
    let res = server
        .get("/flags/timeline-beta/preview?environment=prod&user=u1")
        .await;
    let preview = res.json::<Value>().await?;
    assert_json_include!(
        actual: preview,
        expected: json!({"enabled": false, "reason": "rollout_excluded"})
    );

    // Raising the percentage past the bucket flips the same user on.
    server
        .put(
            "/flags/timeline-beta/targeting/prod",
            json!({"tenants": ["Public"], "rollout": 80}).to_string(),
        )
        .await;
    let res = server
        .get("/flags/timeline-beta/preview?environment=prod&user=u1")
        .await;
    let preview = res.json::<Value>().await?;
    assert_json_include!(
        actual: preview,
        expected: json!({"enabled": true, "reason": "rollout_included"})
    );

    Ok(())
}

#[tokio::test]
async fn it_rejects_key_changes_on_update() -> Result<()> {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    let res = server
        .post(
            "/flags",
            json!({"key": "docs-beta", "name": "Docs beta"}).to_string(),
        )
        .await;
    let created = res.json::<Value>().await?;
    let id = created["id"].as_str().unwrap().to_string();

    let res = server
        .patch(
            &format!("/flags/{}", id),
            json!({"key": "renamed"}).to_string(),
        )
        .await;
    assert_eq!(StatusCode::BAD_REQUEST, res.status());

    Ok(())
}

#[tokio::test]
async fn it_detects_stale_versions() -> Result<()> {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    let res = server
        .post(
            "/flags",
            json!({"key": "docs-beta", "name": "Docs beta"}).to_string(),
        )
        .await;
    let created = res.json::<Value>().await?;
    let id = created["id"].as_str().unwrap().to_string();

    let res = server
        .patch(
            &format!("/flags/{}", id),
            json!({"name": "Docs beta v2", "version": 1}).to_string(),
        )
        .await;
    assert_eq!(StatusCode::OK, res.status());

    let res = server
        .patch(
            &format!("/flags/{}", id),
            json!({"name": "Docs beta v3", "version": 1}).to_string(),
        )
        .await;
    assert_eq!(StatusCode::CONFLICT, res.status());

    Ok(())
}

#[tokio::test]
async fn it_guards_targeting_validation() -> Result<()> {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    server
        .post(
            "/flags",
            json!({"key": "docs-beta", "name": "Docs beta"}).to_string(),
        )
        .await;

    let res = server
        .put(
            "/flags/docs-beta/targeting/prod",
            json!({"tenants": ["Public"], "rollout": 120}).to_string(),
        )
        .await;
    assert_eq!(StatusCode::BAD_REQUEST, res.status());

    let res = server
        .put(
            "/flags/docs-beta/targeting/prod",
            json!({"tenants": [], "rollout": 50}).to_string(),
        )
        .await;
    assert_eq!(StatusCode::BAD_REQUEST, res.status());

    let res = server
        .put(
            "/flags/docs-beta/targeting/qa",
            json!({"tenants": ["Public"], "rollout": 50}).to_string(),
        )
        .await;
    assert_eq!(StatusCode::BAD_REQUEST, res.status());

    Ok(())
}

#[tokio::test]
async fn it_returns_not_found_for_unknown_flags() -> Result<()> {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    let res = server.get("/flags/ghost/preview?user=u1").await;
    assert_eq!(StatusCode::NOT_FOUND, res.status());

    server
        .post(
            "/flags",
            json!({"key": "docs-beta", "name": "Docs beta"}).to_string(),
        )
        .await;
    let res = server.get("/flags/docs-beta/targeting/dev").await;
    assert_eq!(StatusCode::NOT_FOUND, res.status());

    Ok(())
}

#[tokio::test]
async fn it_archives_flags_via_patch() -> Result<()> {
    let server = ServerHandle::for_config(DEFAULT_CONFIG.clone()).await;

    let res = server
        .post(
            "/flags",
            json!({
                "key": "legacy-exports",
                "name": "Legacy exports",
                "force_on": true
            })
            .to_string(),
        )
        .await;
    let created = res.json::<Value>().await?;
    let id = created["id"].as_str().unwrap().to_string();

    let res = server
        .patch(
            &format!("/flags/{}", id),
            json!({"status": "archived"}).to_string(),
        )
        .await;
    assert_eq!(StatusCode::OK, res.status());

    // Archived beats force_on.
    let res = server
        .get("/flags/legacy-exports/preview?user=someone@co.com")
        .await;
    let preview = res.json::<Value>().await?;
    assert_json_include!(
        actual: preview,
        expected: json!({"enabled": false, "reason": "archived"})
    );

    Ok(())
}
