//! End-to-end tests for the chat endpoint, driven in-process with a mock
//! backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use pka_agent::{DEGRADED_REPLY, KnowledgeAgent};
use pka_model::MockLlm;
use pka_rag::{ContextRetriever, EmbeddingProvider, IndexEntry, VectorIndex};
use pka_server::{AppState, router};

fn app_with(llm: MockLlm) -> Router {
    let agent = KnowledgeAgent::builder().llm(Arc::new(llm)).build().unwrap();
    router(AppState::new(Arc::new(agent), "test-model"))
}

fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app_with(MockLlm::new("unused"));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn models_lists_the_configured_model() {
    let app = app_with(MockLlm::new("unused"));
    let response = app
        .oneshot(Request::builder().uri("/v1/models").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["object"], "list");
    assert_eq!(body["data"][0]["id"], "test-model");
}

#[tokio::test]
async fn plain_chat_returns_backend_text() {
    let app = app_with(MockLlm::new("backend says hi"));
    let response = app
        .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hi"}],"stream":false}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["choices"][0]["message"]["content"], "backend says hi");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert!(body["usage"].is_null());
    assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));
}

#[tokio::test]
async fn empty_message_list_is_rejected_with_400() {
    let app = app_with(MockLlm::new("unused"));
    let response = app.oneshot(chat_request(r#"{"messages":[]}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert!(body["error"]["message"].as_str().unwrap().contains("at least one message"));
}

#[tokio::test]
async fn backend_failure_is_a_degraded_200() {
    let app = app_with(MockLlm::failing());
    let response = app
        .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hi"}]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["choices"][0]["message"]["content"], DEGRADED_REPLY);
    assert!(body["usage"].is_null());
}

#[tokio::test]
async fn request_model_overrides_the_configured_one() {
    let app = app_with(MockLlm::new("ok"));
    let response = app
        .oneshot(chat_request(
            r#"{"model":"custom-model","messages":[{"role":"user","content":"hi"}]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["model"], "custom-model");
}

#[tokio::test]
async fn streaming_emits_sse_chunks_and_a_done_marker() {
    let app = app_with(MockLlm::with_fragments(vec!["one ", "two ", "three"]));
    let response = app
        .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hi"}],"stream":true}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(bytes.to_vec()).unwrap();

    let data_lines: Vec<&str> =
        body.lines().filter_map(|line| line.strip_prefix("data: ")).collect();
    // 3 content chunks, 1 stop chunk, then the DONE marker.
    assert_eq!(data_lines.len(), 5);
    assert_eq!(*data_lines.last().unwrap(), "[DONE]");

    let chunks: Vec<serde_json::Value> =
        data_lines[..4].iter().map(|d| serde_json::from_str(d).unwrap()).collect();
    for chunk in &chunks {
        assert_eq!(chunk["object"], "chat.completion.chunk");
        assert_eq!(chunk["model"], "test-model");
    }

    let assembled: String =
        chunks[..3].iter().map(|c| c["choices"][0]["delta"]["content"].as_str().unwrap()).collect();
    assert_eq!(assembled, "one two three");

    assert_eq!(chunks[3]["choices"][0]["finish_reason"], "stop");
    assert!(chunks[3]["choices"][0]["delta"].get("content").is_none());
}

#[tokio::test]
async fn include_context_injects_retrieved_passages() {
    /// Steers "fox" queries toward the fox passage.
    struct FixtureEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixtureEmbedder {
        async fn embed(&self, text: &str) -> pka_rag::Result<Vec<f32>> {
            Ok(if text.contains("fox") { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    /// Echoes the fused conversation back as the reply.
    struct EchoLlm;

    #[async_trait]
    impl pka_core::Llm for EchoLlm {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            request: pka_core::LlmRequest,
        ) -> pka_core::Result<String> {
            Ok(request
                .messages
                .iter()
                .map(|m| format!("{}:{}", m.role, m.content))
                .collect::<Vec<_>>()
                .join("|"))
        }

        async fn complete_stream(
            &self,
            request: pka_core::LlmRequest,
        ) -> pka_core::Result<pka_core::TokenStream> {
            let text = self.complete(request).await?;
            Ok(Box::pin(futures::stream::iter(vec![Ok(text)])))
        }
    }

    let entry = |text: &str, embedding: Vec<f32>| IndexEntry {
        text: text.to_string(),
        embedding,
        metadata: HashMap::new(),
    };
    let index = VectorIndex::build(vec![
        entry("foxes are canids", vec![1.0, 0.0]),
        entry("planets orbit stars", vec![0.0, 1.0]),
    ])
    .unwrap();
    let retriever = ContextRetriever::new(Arc::new(FixtureEmbedder), index, 1500);

    let agent = KnowledgeAgent::builder()
        .llm(Arc::new(EchoLlm))
        .retriever(Arc::new(retriever))
        .context_top_k(1)
        .build()
        .unwrap();
    let app = router(AppState::new(Arc::new(agent), "test-model"));

    let response = app
        .oneshot(chat_request(
            r#"{"messages":[{"role":"user","content":"what is a fox?"}],"include_context":true}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(
        body["choices"][0]["message"]["content"],
        "system:[CONTEXT] foxes are canids|user:what is a fox?"
    );
}
