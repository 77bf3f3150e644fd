#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Session lifecycle through the public HTTP surface with a stub answerer

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use paddleprompt::Result;
use paddleprompt::answer::Answerer;
use paddleprompt::config::{ServerConfig, SessionConfig};
use paddleprompt::server::{AppState, QueryLimits, build_router};
use paddleprompt::session::{InMemorySessionStore, SessionStore, Turn};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

struct ShoutingAnswerer;

impl Answerer for ShoutingAnswerer {
    fn answer(&self, question: &str, history: &[Turn]) -> Result<String> {
        Ok(format!("{} ({} prior)", question.to_uppercase(), history.len()))
    }
}

fn app(limits: QueryLimits) -> (Router, Arc<InMemorySessionStore>) {
    let sessions = Arc::new(InMemorySessionStore::new());
    let state = AppState::new(Arc::new(ShoutingAnswerer), sessions.clone(), limits);
    (build_router(state, &ServerConfig::default()), sessions)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .body(Body::empty())
        .expect("request should build")
}

#[tokio::test]
async fn conversation_lifecycle() {
    let (app, _) = app(QueryLimits::default());

    let (status, body) = call(&app, post("/query", &json!({"question": "what is concrete?", "session_id": "crew"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "WHAT IS CONCRETE? (0 prior)");

    let (_, info) = call(&app, get("/sessions-info")).await;
    assert_eq!(info["active_sessions"], 1);
    assert_eq!(info["session_ids"], json!(["crew"]));

    let (status, body) = call(&app, post("/clear-session", &json!({"session_id": "crew"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Session crew cleared successfully");

    let (status, body) = call(&app, post("/clear-session", &json!({"session_id": "crew"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Session not found");

    let (_, info) = call(&app, get("/sessions-info")).await;
    assert_eq!(info["active_sessions"], 0);
}

#[tokio::test]
async fn stored_history_stays_bounded() {
    let (app, sessions) = app(QueryLimits::default());
    let mut history: Vec<Value> = Vec::new();

    for round in 0..8 {
        let question = format!("question {}", round);
        let (status, body) = call(
            &app,
            post(
                "/query",
                &json!({"question": question, "session_id": "long", "conversation_history": history}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        history.push(json!({"role": "user", "content": question}));
        history.push(json!({"role": "assistant", "content": body["answer"]}));

        assert!(sessions.get_or_create("long").len() <= 12);
    }

    let (_, body) = call(
        &app,
        post(
            "/query",
            &json!({"question": "last", "session_id": "long", "conversation_history": history}),
        ),
    )
    .await;
    assert_eq!(body["answer"], "LAST (10 prior)");
    assert_eq!(sessions.get_or_create("long").len(), 12);
}

#[tokio::test]
async fn eviction_uses_configured_limits() {
    let limits = QueryLimits::from_config(
        &ServerConfig::default(),
        &SessionConfig {
            max_history_turns: 10,
            max_sessions: 3,
            keep: 2,
        },
    );
    let (app, sessions) = app(limits);

    for id in ["a", "b", "c", "d"] {
        let (status, _) = call(&app, post("/query", &json!({"question": "hi", "session_id": id}))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = call(&app, post("/clear-session", &json!({}))).await;
    assert_eq!(body["message"], "Cleaned up 2 old sessions");
    assert_eq!(sessions.session_ids(10), vec!["c".to_string(), "d".to_string()]);

    let (_, body) = call(&app, post("/clear-session", &json!({}))).await;
    assert_eq!(body["message"], "No cleanup needed");
}

#[tokio::test]
async fn concurrent_sessions_do_not_interfere() {
    let (app, sessions) = app(QueryLimits::default());

    let mut handles = Vec::new();
    for i in 0..20 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let request = post(
                "/query",
                &json!({"question": format!("q{}", i), "session_id": format!("s{}", i)}),
            );
            call(&app, request).await.0
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.expect("task should finish"), StatusCode::OK);
    }

    assert_eq!(sessions.len(), 20);
    for i in 0..20 {
        let stored = sessions.get_or_create(&format!("s{}", i));
        assert_eq!(stored[0], Turn::user(format!("q{}", i)));
    }
}

#[tokio::test]
async fn word_limit_follows_config() {
    let limits = QueryLimits::from_config(
        &ServerConfig {
            max_question_words: 3,
            ..ServerConfig::default()
        },
        &SessionConfig::default(),
    );
    let (app, sessions) = app(limits);

    let (status, body) = call(&app, post("/query", &json!({"question": "one two three four"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Question too long. Maximum length is 3 words. Current word count: 4"
    );
    assert!(sessions.is_empty());
}
