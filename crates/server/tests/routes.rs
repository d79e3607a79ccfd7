use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use blockrun_engine::RunOrchestrator;
use blockrun_engine::testing::{BackendCall, ScriptedBackend, ScriptedFailure};
use blockrun_server::{AppState, SessionResolver, router};
use blockrun_store::{AppStore, SeedFixture, SqliteStore};
use blockrun_types::{AppScope, RunList, RunType};

const FIXTURE: &str = r#"{
    "users": [
        {"username": "alice", "providerId": "gh-1"},
        {"username": "bob", "providerId": "gh-2"}
    ],
    "sessions": [
        {"token": "tok-alice", "providerId": "gh-1"},
        {"token": "tok-bob", "providerId": "gh-2"}
    ],
    "apps": [
        {"sId": "a1", "name": "demo", "owner": "alice", "visibility": "public", "backendProjectId": "12", "savedRun": "run-0"},
        {"sId": "p1", "name": "secret", "owner": "alice", "visibility": "private", "backendProjectId": "13"}
    ],
    "providers": [
        {"owner": "alice", "providerId": "openai", "config": {"api_key": "sk-alice"}}
    ]
}"#;

struct TestApp {
    router: Router,
    backend: Arc<ScriptedBackend>,
    store: Arc<SqliteStore>,
}

async fn test_app(backend: ScriptedBackend) -> TestApp {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    store.seed(SeedFixture::from_json(FIXTURE).unwrap()).await.unwrap();

    let backend = Arc::new(backend);
    let app_store: Arc<dyn AppStore> = store.clone();
    let orchestrator = Arc::new(RunOrchestrator::new(backend.clone(), app_store.clone()));
    let state = AppState::new(orchestrator, Arc::new(SessionResolver::new(app_store)));

    TestApp {
        router: router(state),
        backend,
        store,
    }
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => Body::from(serde_json::to_vec(&value).unwrap()),
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn design_request() -> Value {
    json!({
        "mode": "design",
        "config": r#"{"IN": {"type": "input", "dataset": "ds1"}}"#,
        "specification": r#"[{"type": "input", "name": "IN", "spec": {}}, {"type": "data", "name": "EXAMPLES", "spec": {"dataset_id": "ds1"}}]"#
    })
}

#[tokio::test]
async fn design_run_returns_summary_and_saves_state() {
    let backend = ScriptedBackend::new().with_catalog(ScriptedBackend::catalog_of(&[("ds1", &["h2", "h1"])]));
    let app = test_app(backend).await;

    let response = send(
        &app,
        request(Method::POST, "/api/apps/alice/a1/runs", Some("tok-alice"), Some(design_request())),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["run"]["run_id"], "run-1");
    assert_eq!(body["run"]["status"]["run"], "succeeded");

    let sent = app.backend.create_run_calls();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["dataset_id"], "ds1");
    assert_eq!(sent[0]["credentials"]["OPENAI_API_KEY"], "sk-alice");
    assert!(sent[0]["specification"].as_str().unwrap().contains("hash: h2"));

    let owner = app.store.find_user_by_username("alice").await.unwrap().unwrap();
    let stored = app.store.find_app(owner.id, "a1", AppScope::Owner).await.unwrap().unwrap();
    assert_eq!(stored.saved_run.as_deref(), Some("run-1"));
}

#[tokio::test]
async fn execute_run_streams_backend_bytes() {
    let chunks = ["data: {\"type\":\"block_status\"}\n\n", "data: {\"type\":\"final\"}\n\n"];
    let app = test_app(ScriptedBackend::new().with_stream_chunks(&chunks)).await;

    let response = send(
        &app,
        request(
            Method::POST,
            "/api/apps/alice/a1/runs",
            Some("tok-alice"),
            Some(json!({"mode": "execute", "config": "{}", "specificationHash": "abc", "inputs": [{"q": 1}]})),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(body_bytes(response).await, chunks.concat().as_bytes());
}

#[tokio::test]
async fn anonymous_and_non_owner_callers_cannot_create_runs() {
    let app = test_app(ScriptedBackend::new()).await;

    for token in [None, Some("tok-bob"), Some("tok-unknown")] {
        let response = send(
            &app,
            request(Method::POST, "/api/apps/alice/a1/runs", token, Some(design_request())),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_bytes(response).await.is_empty());
    }
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn session_cookie_identifies_the_caller() {
    let app = test_app(ScriptedBackend::new().with_catalog(ScriptedBackend::catalog_of(&[("ds1", &["h1"])]))).await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/apps/alice/a1/runs")
        .header(header::COOKIE, "theme=dark; blockrun_session=tok-alice")
        .body(Body::from(serde_json::to_vec(&design_request()).unwrap()))
        .unwrap();

    assert_eq!(send(&app, request).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_user_and_hidden_app_are_not_found() {
    let app = test_app(ScriptedBackend::new()).await;

    let missing_user = send(&app, request(Method::GET, "/api/apps/carol/a1/runs", None, None)).await;
    assert_eq!(missing_user.status(), StatusCode::NOT_FOUND);

    let private_app = send(&app, request(Method::GET, "/api/apps/alice/p1/runs", Some("tok-bob"), None)).await;
    assert_eq!(private_app.status(), StatusCode::NOT_FOUND);
    assert!(body_bytes(private_app).await.is_empty());
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let app = test_app(ScriptedBackend::new()).await;

    let response = send(
        &app,
        request(
            Method::POST,
            "/api/apps/alice/a1/runs",
            Some("tok-alice"),
            Some(json!({"mode": "deploy", "config": "{}"})),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn backend_rejection_is_relayed() {
    let backend = ScriptedBackend::new()
        .with_catalog(ScriptedBackend::catalog_of(&[("ds1", &["h1"])]))
        .failing_create(ScriptedFailure::Rejected {
            status: 422,
            error: json!({"code": "invalid_spec", "message": "no blocks"}),
        });
    let app = test_app(backend).await;

    let response = send(
        &app,
        request(Method::POST, "/api/apps/alice/a1/runs", Some("tok-alice"), Some(design_request())),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await,
        json!({"error": {"code": "invalid_spec", "message": "no blocks"}})
    );
}

#[tokio::test]
async fn run_history_is_readable_by_visitors() {
    let runs = RunList {
        runs: vec![json!({"run_id": "run-9"})],
        total: 31,
    };
    let app = test_app(ScriptedBackend::new().with_runs(runs)).await;

    let response = send(
        &app,
        request(Method::GET, "/api/apps/alice/a1/runs?limit=5&offset=10&runType=local", None, None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"runs": [{"run_id": "run-9"}], "total": 31}));

    let Some(BackendCall::ListRuns { project_id, query }) = app.backend.calls().pop() else {
        panic!("expected a run listing");
    };
    assert_eq!(project_id, "12");
    assert_eq!((query.limit, query.offset, query.run_type), (5, 10, RunType::Local));
}

#[tokio::test]
async fn bad_paging_is_a_bad_request() {
    let app = test_app(ScriptedBackend::new()).await;

    let response = send(&app, request(Method::GET, "/api/apps/alice/a1/runs?limit=many", None, None)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn saved_block_read_uses_the_saved_run() {
    let app = test_app(ScriptedBackend::new().with_block_run(json!({"status": "succeeded"}))).await;

    let response = send(
        &app,
        request(Method::GET, "/api/apps/alice/a1/runs/saved/blocks/llm/MODEL", None, None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"run": {"status": "succeeded"}}));
    assert_eq!(
        app.backend.calls(),
        vec![BackendCall::GetRunBlock {
            project_id: "12".into(),
            run_id: "run-0".into(),
            block_type: "llm".into(),
            block_name: "MODEL".into(),
        }]
    );
}

#[tokio::test]
async fn saved_block_read_without_saved_run_is_null() {
    let app = test_app(ScriptedBackend::new()).await;

    let response = send(
        &app,
        request(Method::GET, "/api/apps/alice/p1/runs/saved/blocks/llm/MODEL", Some("tok-alice"), None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"run": null}));
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn providers_are_listed_for_the_caller_only() {
    let app = test_app(ScriptedBackend::new()).await;

    let response = send(&app, request(Method::GET, "/api/providers", Some("tok-alice"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"providers": [{"providerId": "openai", "config": "{\"api_key\":\"sk-alice\"}"}]})
    );

    let bob = send(&app, request(Method::GET, "/api/providers", Some("tok-bob"), None)).await;
    assert_eq!(body_json(bob).await, json!({"providers": []}));

    let anonymous = send(&app, request(Method::GET, "/api/providers", None, None)).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unsupported_methods_are_rejected() {
    let app = test_app(ScriptedBackend::new()).await;

    for (method, uri) in [
        (Method::DELETE, "/api/apps/alice/a1/runs"),
        (Method::PUT, "/api/apps/alice/a1/runs/run-1/blocks/llm/MODEL"),
        (Method::POST, "/api/providers"),
    ] {
        let response = send(&app, request(method, uri, Some("tok-alice"), None)).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
