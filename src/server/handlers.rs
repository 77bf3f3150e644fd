use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::AppState;
use super::errors::ApiError;
use crate::PaddleError;
use crate::session::{DEFAULT_SESSION_ID, Role, Turn, truncate_history};

type HandlerResult = Result<Json<Value>, ApiError>;

const SESSION_ID_PREVIEW: usize = 10;

/// A validated `POST /query` body
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueryRequest {
    pub question: String,
    pub session_id: String,
    pub history: Vec<Turn>,
}

pub(crate) async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "API is running"
    }))
}

pub(crate) async fn query_usage() -> Json<Value> {
    Json(json!({
        "message": "This endpoint requires a POST request with JSON data",
        "example": {
            "question": "What are the hull thickness requirements?",
            "session_id": "optional-session-id",
            "conversation_history": [
                {"role": "user", "content": "Previous question"},
                {"role": "assistant", "content": "Previous answer"}
            ]
        },
        "endpoint": "/query",
        "method": "POST"
    }))
}

pub(crate) async fn query_preflight() -> StatusCode {
    StatusCode::OK
}

pub(crate) async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResult {
    let request = parse_query_request(&headers, &body, state.limits.max_question_words)
        .map_err(|e| ApiError::from_error(&e, state.expose_error_details))?;

    let QueryRequest {
        question,
        session_id,
        history,
    } = request;

    state.sessions.get_or_create(&session_id);
    let history = truncate_history(&history, state.limits.max_history_turns);
    state.sessions.replace(&session_id, history.clone());

    debug!(
        "Answering question for session {} with {} prior turns",
        session_id,
        history.len()
    );

    let answerer = state.answerer.clone();
    let asked = question.clone();
    let answer = tokio::task::spawn_blocking(move || answerer.answer(&asked, &history))
        .await
        .map_err(|e| {
            ApiError::from_error(
                &PaddleError::Other(anyhow::anyhow!("Answer task failed: {}", e)),
                state.expose_error_details,
            )
        })?
        .map_err(|e| ApiError::from_error(&e, state.expose_error_details))?;

    state
        .sessions
        .append_turn(&session_id, Role::User, &question);
    state
        .sessions
        .append_turn(&session_id, Role::Assistant, &answer);

    Ok(Json(json!({
        "answer": answer,
        "status": "success"
    })))
}

pub(crate) async fn clear_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let message = match parse_clear_request(&headers, &body) {
        ClearRequest::Session(session_id) => {
            if state.sessions.clear(&session_id) {
                info!("Cleared session {}", session_id);
                format!("Session {} cleared successfully", session_id)
            } else {
                "Session not found".to_string()
            }
        }
        ClearRequest::UnknownId => "Session not found".to_string(),
        ClearRequest::Evict => {
            let removed = state
                .sessions
                .evict_if_over_capacity(state.limits.max_sessions, state.limits.keep_sessions);
            if removed > 0 {
                format!("Cleaned up {} old sessions", removed)
            } else {
                "No cleanup needed".to_string()
            }
        }
    };

    Json(json!({
        "message": message,
        "status": "success"
    }))
}

pub(crate) async fn sessions_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "active_sessions": state.sessions.len(),
        "session_ids": state.sessions.session_ids(SESSION_ID_PREVIEW),
        "status": "success"
    }))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| {
            let mime = mime.trim();
            mime.eq_ignore_ascii_case("application/json")
                || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
}

fn json_object(body: &[u8]) -> Result<Map<String, Value>, PaddleError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(PaddleError::Validation("Request must be JSON".to_string())),
    }
}

/// Validate a query body in order: JSON, question present, question a
/// non-empty string within the word limit, then the optional fields.
pub(crate) fn parse_query_request(
    headers: &HeaderMap,
    body: &[u8],
    max_words: usize,
) -> Result<QueryRequest, PaddleError> {
    if !is_json(headers) {
        return Err(PaddleError::Validation("Request must be JSON".to_string()));
    }
    let mut data = json_object(body)?;

    let question = match data.remove("question") {
        None => {
            return Err(PaddleError::Validation(
                "Missing 'question' field in request".to_string(),
            ));
        }
        Some(Value::String(question)) => question.trim().to_string(),
        Some(_) => {
            return Err(PaddleError::Validation(
                "'question' must be a string".to_string(),
            ));
        }
    };

    if question.is_empty() {
        return Err(PaddleError::Validation(
            "Question cannot be empty".to_string(),
        ));
    }

    let word_count = question.split_whitespace().count();
    if word_count > max_words {
        return Err(PaddleError::Validation(format!(
            "Question too long. Maximum length is {} words. Current word count: {}",
            max_words, word_count
        )));
    }

    let session_id = match data.remove("session_id") {
        None | Some(Value::Null) => DEFAULT_SESSION_ID.to_string(),
        Some(Value::String(id)) => id,
        Some(_) => {
            return Err(PaddleError::Validation(
                "'session_id' must be a string".to_string(),
            ));
        }
    };

    let history = match data.remove("conversation_history") {
        None | Some(Value::Null) => Vec::new(),
        Some(raw) => serde_json::from_value::<Vec<Turn>>(raw).map_err(|e| {
            PaddleError::Validation(format!("Invalid 'conversation_history': {}", e))
        })?,
    };

    Ok(QueryRequest {
        question,
        session_id,
        history,
    })
}

/// What a `POST /clear-session` body asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ClearRequest {
    /// Clear one session
    Session(String),
    /// A non-string id, which can never name a stored session
    UnknownId,
    /// No usable id, so run capacity eviction
    Evict,
}

/// Never fails: bodies that are not JSON objects, and empty or null ids,
/// all fall through to eviction.
pub(crate) fn parse_clear_request(headers: &HeaderMap, body: &[u8]) -> ClearRequest {
    if !is_json(headers) {
        return ClearRequest::Evict;
    }
    let Ok(mut data) = json_object(body) else {
        return ClearRequest::Evict;
    };

    match data.remove("session_id") {
        Some(Value::String(id)) if !id.is_empty() => ClearRequest::Session(id),
        Some(value) if is_truthy(&value) => ClearRequest::UnknownId,
        _ => ClearRequest::Evict,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n.abs() > 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}
