use super::*;
use crate::answer::ChatRole;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn test_client(server: &MockServer) -> OpenAiClient {
    let config = OpenAiConfig {
        base_url: format!("{}/v1", server.uri()),
        ..OpenAiConfig::default()
    };
    OpenAiClient::new(&config, "sk-test".to_string()).expect("client should build")
}

#[tokio::test]
async fn embedding_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "text-embedding-ada-002",
            "input": "concrete mix"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"object": "embedding", "index": 0, "embedding": [0.25, -0.5, 1.0]}],
            "model": "text-embedding-ada-002"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedding = test_client(&server)
        .embed("concrete mix")
        .expect("embedding should succeed");

    assert_eq!(embedding, vec![0.25, -0.5, 1.0]);
}

#[tokio::test]
async fn embedding_without_data_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let error = test_client(&server)
        .embed("anything")
        .expect_err("empty data should fail");

    assert!(matches!(error, PaddleError::Upstream(ref m) if m.contains("no data")));
}

#[tokio::test]
async fn chat_completion_sends_model_and_temperature() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "temperature": 0.0,
            "messages": [
                {"role": "system", "content": "Context: hulls"},
                {"role": "user", "content": "How thick?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "About 12 mm."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let messages = [
        ChatMessage::new(ChatRole::System, "Context: hulls"),
        ChatMessage::new(ChatRole::User, "How thick?"),
    ];
    let answer = test_client(&server)
        .complete(&messages)
        .expect("completion should succeed");

    assert_eq!(answer, "About 12 mm.");
}

#[tokio::test]
async fn null_content_is_empty_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        })))
        .mount(&server)
        .await;

    let answer = test_client(&server)
        .complete(&[ChatMessage::new(ChatRole::User, "hi")])
        .expect("completion should succeed");

    assert_eq!(answer, "");
}

#[tokio::test]
async fn no_choices_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let error = test_client(&server)
        .complete(&[ChatMessage::new(ChatRole::User, "hi")])
        .expect_err("missing choices should fail");

    assert!(matches!(error, PaddleError::Upstream(ref m) if m.contains("no choices")));
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server).with_http_client(
        JsonClient::new(Duration::from_secs(5), 3).with_backoff_unit(Duration::from_millis(1)),
    );
    let error = client
        .complete(&[ChatMessage::new(ChatRole::User, "hi")])
        .expect_err("401 should fail");

    assert!(matches!(error, PaddleError::Upstream(ref m) if m.contains("HTTP 401")));
}

#[test]
fn invalid_base_url_is_rejected() {
    let config = OpenAiConfig {
        base_url: "not a url".to_string(),
        ..OpenAiConfig::default()
    };
    assert!(OpenAiClient::new(&config, "sk".to_string()).is_err());
}

#[test]
fn model_accessors() {
    let client = OpenAiClient::new(&OpenAiConfig::default(), "sk".to_string())
        .expect("client should build");
    assert_eq!(client.chat_model(), "gpt-3.5-turbo");
    assert_eq!(client.embedding_model(), "text-embedding-ada-002");
}
