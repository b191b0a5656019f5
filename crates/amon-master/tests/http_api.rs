mod common;

use amon_storage::Directory;
use axum::http::StatusCode;
use common::{build_test_context, request_json, request_raw};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn ping_answers_pong() {
    let ctx = build_test_context();
    let (status, body) = request_json(&ctx.app, "GET", "/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ping"], "pong");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn unknown_user_is_404() {
    let ctx = build_test_context();

    let (status, body) =
        request_json(&ctx.app, "GET", &format!("/pub/{}/probes", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ResourceNotFound");

    // Invalid login syntax short-circuits to the same 404.
    let (status, body) = request_json(&ctx.app, "GET", "/pub/1notalogin/probes", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ResourceNotFound");
}

#[tokio::test]
async fn user_profile_by_uuid_and_login() {
    let ctx = build_test_context();
    let uuid = ctx.seed_user("alice").await;

    let (status, body) = request_json(&ctx.app, "GET", &format!("/pub/{uuid}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["login"], "alice");
    assert_eq!(body["email"], "alice@example.com");

    let (status, body) = request_json(&ctx.app, "GET", "/pub/alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uuid"], uuid.to_string());
}

#[tokio::test]
async fn create_probe_missing_type_writes_nothing() {
    let ctx = build_test_context();
    let user = ctx.seed_user("alice").await;

    let (status, body) = request_json(
        &ctx.app,
        "POST",
        &format!("/pub/{user}/probes"),
        Some(json!({"user": user, "agent": Uuid::new_v4()})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "MissingParameter");

    // No probe entry reached the directory.
    let probes = ctx
        .dir
        .search(
            "o=smartdc",
            amon_storage::SearchScope::Sub,
            "(objectclass=amonprobe)",
        )
        .await
        .unwrap();
    assert!(probes.is_empty());
}

#[tokio::test]
async fn probe_crud_roundtrip() {
    let ctx = build_test_context();
    let user = ctx.seed_user("alice").await;
    let vm = ctx.seed_vm(user);

    let input = json!({
        "name": "app errors",
        "type": "log-scan",
        "machine": vm.uuid,
        "contacts": ["email"],
        "config": {"path": "/var/log/app.log", "regex": "ERROR"},
    });

    let (status, created) = request_json(
        &ctx.app,
        "POST",
        &format!("/pub/{user}/probes"),
        Some(input.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uuid = created["uuid"].as_str().unwrap().to_string();
    assert_eq!(created["agent"], vm.uuid.to_string());
    assert_eq!(created["machine"], vm.uuid.to_string());
    // Public serialization has no private fields.
    assert!(created.get("runInVmHost").is_none());

    // Create-then-fetch yields the identical public shape.
    let (status, fetched) = request_json(
        &ctx.app,
        "GET",
        &format!("/pub/{user}/probes/{uuid}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created, fetched);

    // A successful write is visible in the very next list.
    let (status, listed) =
        request_json(&ctx.app, "GET", &format!("/pub/{user}/probes"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0], fetched);

    // PUT with the same body is idempotent.
    let (status, put1) = request_json(
        &ctx.app,
        "PUT",
        &format!("/pub/{user}/probes/{uuid}"),
        Some(input.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, put2) = request_json(
        &ctx.app,
        "PUT",
        &format!("/pub/{user}/probes/{uuid}"),
        Some(input),
    )
    .await;
    assert_eq!(put1, put2);

    // DELETE, then the probe is gone; a second DELETE is 404.
    let (status, _) = request_json(
        &ctx.app,
        "DELETE",
        &format!("/pub/{user}/probes/{uuid}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = request_json(
        &ctx.app,
        "GET",
        &format!("/pub/{user}/probes/{uuid}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ResourceNotFound");

    let (status, _) = request_json(
        &ctx.app,
        "DELETE",
        &format!("/pub/{user}/probes/{uuid}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn probe_name_length_boundary() {
    let ctx = build_test_context();
    let user = ctx.seed_user("alice").await;
    let vm = ctx.seed_vm(user);

    let probe = |name: String| {
        json!({
            "name": name,
            "type": "log-scan",
            "machine": vm.uuid,
            "config": {"path": "/var/log/app.log", "regex": "ERROR"},
        })
    };

    let (status, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/pub/{user}/probes"),
        Some(probe("x".repeat(512))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = request_json(
        &ctx.app,
        "POST",
        &format!("/pub/{user}/probes"),
        Some(probe("x".repeat(513))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "InvalidArgument");
}

#[tokio::test]
async fn probe_group_crud() {
    let ctx = build_test_context();
    let user = ctx.seed_user("alice").await;

    let (status, created) = request_json(
        &ctx.app,
        "POST",
        &format!("/pub/{user}/probegroups"),
        Some(json!({"name": "web tier", "contacts": ["email"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uuid = created["uuid"].as_str().unwrap().to_string();

    let (status, listed) =
        request_json(&ctx.app, "GET", &format!("/pub/{user}/probegroups"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Missing name on create is a 409.
    let (status, body) = request_json(
        &ctx.app,
        "POST",
        &format!("/pub/{user}/probegroups"),
        Some(json!({"contacts": []})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "MissingParameter");

    let (status, _) = request_json(
        &ctx.app,
        "DELETE",
        &format!("/pub/{user}/probegroups/{uuid}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = request_json(
        &ctx.app,
        "GET",
        &format!("/pub/{user}/probegroups/{uuid}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn agent_probes_digest_stability() {
    let ctx = build_test_context();
    let user = ctx.seed_user("alice").await;
    let vm = ctx.seed_vm(user);

    // Missing agent parameter.
    let (status, body) = request_json(&ctx.app, "GET", "/agentprobes", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "MissingParameter");

    let uri = format!("/agentprobes?agent={}", vm.uuid);

    // Two consecutive HEADs with no writes: identical digests.
    let (status, headers1, _) = request_raw(&ctx.app, "HEAD", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let etag1 = headers1.get("etag").unwrap().to_str().unwrap().to_string();

    let (_, headers2, _) = request_raw(&ctx.app, "HEAD", &uri, None).await;
    let etag2 = headers2.get("etag").unwrap().to_str().unwrap().to_string();
    assert_eq!(etag1, etag2);

    // A probe write touching the agent changes the digest.
    let (status, _) = request_json(
        &ctx.app,
        "POST",
        &format!("/pub/{user}/probes"),
        Some(json!({
            "type": "log-scan",
            "machine": vm.uuid,
            "config": {"path": "/var/log/app.log", "regex": "ERROR"},
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, headers3, body3) = request_raw(&ctx.app, "GET", &uri, None).await;
    let etag3 = headers3.get("etag").unwrap().to_str().unwrap().to_string();
    assert_ne!(etag1, etag3);

    // GET serves the internal serialization.
    let manifest: serde_json::Value = serde_json::from_slice(&body3).unwrap();
    let probes = manifest.as_array().unwrap();
    assert_eq!(probes.len(), 1);
    assert_eq!(probes[0]["agent"], vm.uuid.to_string());
    assert!(probes[0].get("runInVmHost").is_some());
}

#[tokio::test]
async fn api_version_header_is_enforced() {
    let ctx = build_test_context();

    let req = axum::http::Request::builder()
        .method("GET")
        .uri("/ping")
        .header("x-api-version", "1.2.3")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = tower::util::ServiceExt::oneshot(ctx.app.clone(), req)
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = axum::http::Request::builder()
        .method("GET")
        .uri("/ping")
        .header("x-api-version", "9.0.0")
        .body(axum::body::Body::empty())
        .unwrap();
    let resp = tower::util::ServiceExt::oneshot(ctx.app.clone(), req)
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}
