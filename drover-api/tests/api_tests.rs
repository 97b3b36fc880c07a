//! Router-level tests: request/response wiring, status codes, auth gating.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use drover_api::{create_api_router, ApiConfig, AppState, AuthConfig};
use drover_core::{DeviceStatusSource, PushTransport};
use drover_engine::{EngineConfig, EngineMetrics, ExecutionSupervisor, RolloutController};
use drover_storage::{
    BuildStore, DeviceRegistry, ExecutionStore, InMemoryBuildStore, InMemoryDeviceRegistry,
};
use drover_test_utils::{fixtures, DeviceResultStatus, MockPushTransport, MockStatusSource};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tower::util::ServiceExt;

fn test_router(fleet_size: usize, auth: AuthConfig) -> Router {
    let registry: Arc<dyn DeviceRegistry> =
        Arc::new(InMemoryDeviceRegistry::seeded(fixtures::fleet(fleet_size)));
    let builds: Arc<dyn BuildStore> = Arc::new(InMemoryBuildStore::new());
    let executions = Arc::new(ExecutionStore::new());
    let metrics = Arc::new(EngineMetrics::new());
    let transport: Arc<dyn PushTransport> = Arc::new(MockPushTransport::new());
    let status_source: Arc<dyn DeviceStatusSource> = Arc::new(MockStatusSource::new());

    let state = AppState {
        supervisor: Arc::new(ExecutionSupervisor::new(
            Arc::clone(&registry),
            transport,
            status_source,
            Arc::clone(&executions),
            EngineConfig::development(),
            Arc::clone(&metrics),
        )),
        rollout: Arc::new(RolloutController::new(
            Arc::clone(&builds),
            "https://artifacts.example.com",
        )),
        registry,
        builds,
        executions,
        metrics,
        auth: Arc::new(auth),
        start_time: std::time::Instant::now(),
    };

    create_api_router(state, &ApiConfig::default()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn build_body(version_code: i64) -> Value {
    json!({
        "package_name": "com.example.app",
        "version_code": version_code,
        "version_name": format!("1.0.{version_code}"),
        "checksum": "ab".repeat(32),
        "signer_fingerprint": "cd".repeat(32),
        "file_size": 4096
    })
}

#[tokio::test]
async fn test_health_is_open() {
    let router = test_router(0, AuthConfig::open());
    let (status, body) = send(&router, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["engine"]["executions_started"].is_number());
}

#[tokio::test]
async fn test_build_lifecycle_over_http() {
    let router = test_router(0, AuthConfig::open());

    // Register two builds.
    let (status, v1) = send(&router, post_json("/api/v1/builds", build_body(1))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v1["state"], "draft");
    let (_, v2) = send(&router, post_json("/api/v1/builds", build_body(2))).await;

    // Promote v1 fully, then v2 at 10 percent.
    let (status, _) = send(
        &router,
        post_json(
            &format!("/api/v1/builds/{}/promote", v1["build_id"].as_str().unwrap()),
            json!({ "rollout_percent": 100 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, outcome) = send(
        &router,
        post_json(
            &format!("/api/v1/builds/{}/promote", v2["build_id"].as_str().unwrap()),
            json!({ "rollout_percent": 10, "wifi_only": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["prior_build_id"], v1["build_id"]);

    // Adjust the rollout percent.
    let (status, adjusted) = send(
        &router,
        post_json(
            &format!("/api/v1/builds/{}/rollout", v2["build_id"].as_str().unwrap()),
            json!({ "rollout_percent": 100 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(adjusted["old_percent"], 10);
    assert_eq!(adjusted["new_percent"], 100);

    // Roll back to v1.
    let (status, rollback) = send(
        &router,
        post_json(
            "/api/v1/packages/com.example.app/rollback",
            json!({ "force_downgrade": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rollback["restored_build_id"], v1["build_id"]);
    assert_eq!(rollback["downgrade"], true);

    // Listing shows both rows.
    let (status, builds) = send(&router, get("/api/v1/builds?package=com.example.app")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(builds.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_promote_errors() {
    let router = test_router(0, AuthConfig::open());

    // Unknown build: 404.
    let (status, body) = send(
        &router,
        post_json(
            &format!("/api/v1/builds/{}/promote", uuid::Uuid::now_v7()),
            json!({ "rollout_percent": 50 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "BUILD_NOT_FOUND");

    // Bad percent: 400.
    let (_, build) = send(&router, post_json("/api/v1/builds", build_body(1))).await;
    let (status, body) = send(
        &router,
        post_json(
            &format!("/api/v1/builds/{}/promote", build["build_id"].as_str().unwrap()),
            json!({ "rollout_percent": 150 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_RANGE");
}

#[tokio::test]
async fn test_rollback_without_target_is_404() {
    let router = test_router(0, AuthConfig::open());
    let (status, body) = send(
        &router,
        post_json("/api/v1/packages/com.example.app/rollback", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NO_PRIOR_BUILD");
}

#[tokio::test]
async fn test_manifest_flow() {
    let router = test_router(0, AuthConfig::open());
    let (_, build) = send(&router, post_json("/api/v1/builds", build_body(5))).await;
    send(
        &router,
        post_json(
            &format!("/api/v1/builds/{}/promote", build["build_id"].as_str().unwrap()),
            json!({ "rollout_percent": 100 }),
        ),
    )
    .await;

    // Behind the current build: manifest offered.
    let (status, manifest) = send(
        &router,
        get("/api/v1/manifest?device_id=kiosk-7&package=com.example.app&version_code=4"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(manifest["version_code"], 5);
    assert!(manifest["download_url"].as_str().unwrap().contains("com.example.app"));

    // Up to date: 304 with empty body.
    let (status, body) = send(
        &router,
        get("/api/v1/manifest?device_id=kiosk-7&package=com.example.app&version_code=5"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert_eq!(body, Value::Null);

    // Unknown package: 304 as well.
    let (status, _) = send(
        &router,
        get("/api/v1/manifest?device_id=kiosk-7&package=com.other&version_code=0"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn test_execution_flow_with_callback() {
    let router = test_router(3, AuthConfig::open());

    // Preview first: no side effects.
    let (status, preview) = send(
        &router,
        post_json(
            "/api/v1/executions/preview",
            json!({
                "mode": "restricted_shell",
                "target": { "type": "all" },
                "payload": "reboot"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["count"], 3);

    // Start the run.
    let (status, started) = send(
        &router,
        post_json(
            "/api/v1/executions",
            json!({
                "mode": "restricted_shell",
                "target": { "type": "all" },
                "payload": "reboot",
                "created_by": "ops@example.com"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["total_targets"], 3);
    assert_eq!(started["sent_count"], 3);
    let exec_id = started["exec_id"].as_str().unwrap().to_string();

    // One device reports success through the callback.
    let (status, callback) = send(
        &router,
        post_json(
            &format!("/api/v1/executions/{exec_id}/devices/d-000/status"),
            json!({ "status": "completed", "detail": "exit 0" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(callback["outcome"], "applied");

    // Redelivery is absorbed.
    let (_, callback) = send(
        &router,
        post_json(
            &format!("/api/v1/executions/{exec_id}/devices/d-000/status"),
            json!({ "status": "completed" }),
        ),
    )
    .await;
    assert_eq!(callback["outcome"], "duplicate");

    // Unknown device: 404.
    let (status, _) = send(
        &router,
        post_json(
            &format!("/api/v1/executions/{exec_id}/devices/ghost/status"),
            json!({ "status": "completed" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The report reflects exactly one ack.
    let (status, report) = send(&router, get(&format!("/api/v1/executions/{exec_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["counters"]["acked_count"], 1);
    assert_eq!(report["counters"]["total_targets"], 3);

    // Cancel the rest.
    let (status, cancelled) = send(
        &router,
        post_json(&format!("/api/v1/executions/{exec_id}/cancel"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // Counters froze at cancellation.
    assert_eq!(cancelled["counters"]["acked_count"], 1);
}

#[tokio::test]
async fn test_dry_run_behaves_as_preview() {
    let router = test_router(2, AuthConfig::open());
    let (status, body) = send(
        &router,
        post_json(
            "/api/v1/executions",
            json!({
                "mode": "push_payload",
                "target": { "type": "all" },
                "payload": "update",
                "dry_run": true
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    // No execution row was created.
    let (_, executions) = send(&router, get("/api/v1/executions")).await;
    assert_eq!(executions.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_validation_errors_reject_before_dispatch() {
    let router = test_router(2, AuthConfig::open());

    // Disallowed command.
    let (status, body) = send(
        &router,
        post_json(
            "/api/v1/executions",
            json!({
                "mode": "restricted_shell",
                "target": { "type": "all" },
                "payload": "rm -rf /"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    // Empty target set.
    let (status, _) = send(
        &router,
        post_json(
            "/api/v1/executions",
            json!({
                "mode": "push_payload",
                "target": { "type": "devices", "entries": [] },
                "payload": "update"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_auth_gates_admin_routes() {
    let auth = AuthConfig {
        admin_keys: HashSet::from(["admin-secret".to_string()]),
        device_keys: HashSet::from(["device-secret".to_string()]),
    };
    let router = test_router(1, auth);

    // No key: 401.
    let (status, _) = send(&router, get("/api/v1/devices")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Device key on an admin route: 403.
    let request = Request::builder()
        .uri("/api/v1/devices")
        .header("x-api-key", "device-secret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Admin key: 200.
    let request = Request::builder()
        .uri("/api/v1/devices")
        .header("x-api-key", "admin-secret")
        .body(Body::empty())
        .unwrap();
    let (status, devices) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(devices.as_array().unwrap().len(), 1);

    // Device key may check manifests.
    let request = Request::builder()
        .uri("/api/v1/manifest?device_id=d-000&package=com.example.app&version_code=0")
        .header("x-api-key", "device-secret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);

    // Health stays open.
    let (status, _) = send(&router, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_execution_is_404() {
    let router = test_router(1, AuthConfig::open());
    let (status, body) = send(
        &router,
        get(&format!("/api/v1/executions/{}", uuid::Uuid::now_v7())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "EXECUTION_NOT_FOUND");
}

#[tokio::test]
async fn test_status_callback_statuses_parse() {
    // The wire strings for device statuses are stable.
    for status in ["downloading", "installing", "completed", "failed"] {
        let parsed: DeviceResultStatus = status.parse().unwrap();
        assert_eq!(parsed.as_str(), status);
    }
}
