//! LlmClient tests against an in-process stand-in for the model endpoint

use askdb_ai::{AiError, ChatModel, LlmClient, LlmProvider, PromptPayload};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Echoes the request back as the completion text.
async fn openai_echo(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if auth != "Bearer test-key" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "bad credentials"})),
        );
    }
    let messages = body["messages"].as_array().cloned().unwrap_or_default();
    let roles: Vec<&str> = messages.iter().filter_map(|m| m["role"].as_str()).collect();
    let content = format!(
        "model={} roles={} user={}",
        body["model"].as_str().unwrap_or(""),
        roles.join(","),
        messages.last().and_then(|m| m["content"].as_str()).unwrap_or("")
    );
    (
        StatusCode::OK,
        Json(json!({"choices": [{"message": {"role": "assistant", "content": content}}]})),
    )
}

async fn anthropic_echo(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let text = format!(
        "key={} system={} user={}",
        key,
        body["system"].as_str().unwrap_or(""),
        body["messages"][0]["content"].as_str().unwrap_or("")
    );
    Json(json!({"content": [{"type": "text", "text": text}]}))
}

fn openai(base_url: &str, api_key: &str) -> LlmClient {
    LlmClient::new(LlmProvider::OpenAI {
        api_key: api_key.to_string(),
        model: "openai/gpt-4.1".to_string(),
        base_url: base_url.to_string(),
    })
}

fn payload() -> PromptPayload {
    PromptPayload {
        system: "be terse".to_string(),
        user: "How many rows?".to_string(),
    }
}

#[tokio::test]
async fn test_openai_round_trip() {
    let base = spawn_stub(Router::new().route("/inference/chat/completions", post(openai_echo))).await;
    let client = openai(&format!("{}/inference/", base), "test-key");

    let reply = client.complete(&payload()).await.unwrap();
    assert_eq!(reply, "model=openai/gpt-4.1 roles=system,user user=How many rows?");
}

#[tokio::test]
async fn test_openai_omits_empty_system_turn() {
    let base = spawn_stub(Router::new().route("/chat/completions", post(openai_echo))).await;
    let client = openai(&base, "test-key");

    let reply = client.generate("", "hi").await.unwrap();
    assert!(reply.contains("roles=user "));
}

#[tokio::test]
async fn test_openai_rejected_credentials() {
    let base = spawn_stub(Router::new().route("/chat/completions", post(openai_echo))).await;
    let client = openai(&base, "wrong-key");

    match client.complete(&payload()).await {
        Err(AiError::Api { status, body, .. }) => {
            assert_eq!(status, 401);
            assert!(body.contains("bad credentials"));
        }
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_openai_empty_choices() {
    let router = Router::new().route(
        "/chat/completions",
        post(|| async { Json(json!({"choices": []})) }),
    );
    let base = spawn_stub(router).await;
    let client = openai(&base, "test-key");

    let result = client.complete(&payload()).await;
    assert!(matches!(result, Err(AiError::EmptyResponse("OpenAI"))));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = openai(&format!("http://{}", addr), "test-key");

    let result = client.complete(&payload()).await;
    assert!(matches!(result, Err(AiError::Transport(_))));
}

#[tokio::test]
async fn test_anthropic_round_trip() {
    let base = spawn_stub(Router::new().route("/v1/messages", post(anthropic_echo))).await;
    let client = LlmClient::new(LlmProvider::Anthropic {
        api_key: "a-key".to_string(),
        model: "claude-test".to_string(),
        base_url: base,
    });

    let reply = client.complete(&payload()).await.unwrap();
    assert_eq!(reply, "key=a-key system=be terse user=How many rows?");
}
