//! Router tests through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use wakegate_access::AllowList;
use wakegate_api::build_router;
use wakegate_compute::{InstanceStatus, MockInstanceApi};
use wakegate_config::{AccessConfig, ControllerConfig};
use wakegate_gate::ConnectionGate;
use wakegate_lifecycle::LifecycleController;
use wakegate_probe::{ProbeFuture, Prober};

const OP: &str = "069a79f4-44e9-4726-a5be-fca90e38aaf5";
const ALEX: &str = "853c80ef-3c37-49fd-aa49-938b674adae6";
const STRANGER: &str = "8667ba71-b85a-4004-af54-457a9734eed7";

struct SwitchProber(AtomicBool);

impl Prober for SwitchProber {
    fn is_reachable<'a>(&'a self, _address: &'a str) -> ProbeFuture<'a> {
        let reachable = self.0.load(Ordering::SeqCst);
        Box::pin(async move { reachable })
    }
}

struct TestApp {
    router: Router,
    api: Arc<MockInstanceApi>,
    prober: Arc<SwitchProber>,
    _dir: tempfile::TempDir,
}

fn app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let allow_list = Arc::new(
        AllowList::load(&AccessConfig {
            file: dir.path().join("whitelist.json"),
            operators: vec![OP.to_string()],
            ..AccessConfig::default()
        })
        .unwrap(),
    );
    allow_list.add(OP, ALEX, "Alex").unwrap();

    let api = Arc::new(MockInstanceApi::stopped());
    let prober = Arc::new(SwitchProber(AtomicBool::new(false)));
    let lifecycle = LifecycleController::new(
        ControllerConfig::new("survival", "10.0.0.5:25565"),
        api.clone(),
        prober.clone(),
    );
    let gate = ConnectionGate::new(lifecycle).with_guard(allow_list.clone());

    TestApp {
        router: build_router(gate, allow_list),
        api,
        prober,
        _dir: dir,
    }
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test(start_paused = true)]
async fn connect_to_stopped_server_is_denied_and_starts_instance() {
    let app = app();

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/v1/events/connect",
        Some(json!({"player": "Alex", "uuid": ALEX, "server": "survival"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["allowed"], false);
    assert!(body["data"]["message"].as_str().unwrap().contains("starting"));

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(app.api.start_calls(), 1);

    let (_, body) = send(&app.router, "GET", "/api/v1/lifecycle", None).await;
    assert_eq!(body["data"]["phase"], "awaiting_join");
    assert_eq!(body["data"]["safety_timer_armed"], true);
}

#[tokio::test]
async fn connect_when_reachable_is_allowed() {
    let app = app();
    app.prober.0.store(true, Ordering::SeqCst);

    let (_, body) = send(
        &app.router,
        "POST",
        "/api/v1/events/connect",
        Some(json!({"player": "Alex", "uuid": ALEX, "server": "survival"})),
    )
    .await;
    assert_eq!(body["data"]["allowed"], true);
    assert!(body["data"].get("message").is_none());
}

#[tokio::test]
async fn unlisted_player_is_kicked_before_any_start() {
    let app = app();

    let (_, body) = send(
        &app.router,
        "POST",
        "/api/v1/events/connect",
        Some(json!({"player": "Griefer", "uuid": STRANGER, "server": "survival"})),
    )
    .await;
    assert_eq!(body["data"]["allowed"], false);
    assert_eq!(
        body["data"]["message"],
        "You are not whitelisted on this server!"
    );
    assert_eq!(app.api.status_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn join_and_disconnect_update_lifecycle() {
    let app = app();
    app.api.set_status(InstanceStatus::Running);

    let event = json!({"player": "Alex", "server": "survival"});
    let (status, _) = send(&app.router, "POST", "/api/v1/events/join", Some(event.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app.router, "GET", "/api/v1/lifecycle", None).await;
    assert_eq!(body["data"]["player_count"], 1);
    assert_eq!(body["data"]["phase"], "active");

    send(&app.router, "POST", "/api/v1/events/disconnect", Some(event)).await;
    let (_, body) = send(&app.router, "GET", "/api/v1/lifecycle", None).await;
    assert_eq!(body["data"]["player_count"], 0);
    assert_eq!(body["data"]["phase"], "draining");
}

#[tokio::test]
async fn whitelist_admin_round() {
    let app = app();

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/v1/whitelist",
        Some(json!({"operator": OP, "uuid": STRANGER.replace('-', ""), "name": "Steve"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["uuid"], STRANGER);

    let (_, body) = send(&app.router, "GET", "/api/v1/whitelist", None).await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Alex", "Steve"]);

    let uri = format!("/api/v1/whitelist/steve?operator={OP}");
    let (status, _) = send(&app.router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app.router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn whitelist_admin_requires_operator() {
    let app = app();

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/v1/whitelist",
        Some(json!({"operator": ALEX, "uuid": STRANGER, "name": "Steve"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("not an operator"));

    let uri = format!("/api/v1/whitelist/Alex?operator={ALEX}");
    let (status, _) = send(&app.router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn whitelist_rejects_malformed_uuid() {
    let app = app();

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/v1/whitelist",
        Some(json!({"operator": OP, "uuid": "steve", "name": "Steve"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
