//! OpenAI-compatible chat-completion client.
//!
//! Speaks the `/v1/chat/completions` protocol over `reqwest`, in both
//! non-streaming (single JSON body) and streaming (server-sent events)
//! modes. Works against api.openai.com and against any server exposing the
//! same surface (vLLM, Ollama, llama.cpp, ...) via a base-url override.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use pka_core::{AgentError, Llm, LlmRequest, Message, Result, TokenStream};

/// The default API base for OpenAI.
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Time allowed to establish a connection, for both call modes.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration for [`OpenAIClient`].
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Bearer token sent with every request.
    pub api_key: String,
    /// Base URL, without the trailing `/chat/completions` segment.
    pub base_url: String,
    /// Total request timeout in seconds, applied to non-streaming calls
    /// only. Streaming replies have no total deadline: a healthy stream may
    /// legitimately run longer than any fixed bound.
    pub timeout_secs: u64,
}

impl OpenAIConfig {
    /// Create a config pointing at the official OpenAI endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), base_url: OPENAI_API_BASE.to_string(), timeout_secs: 60 }
    }

    /// Create a config for an OpenAI-compatible server at `base_url`.
    pub fn compatible(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), base_url: base_url.into(), timeout_secs: 60 }
    }

    /// Override the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// An [`Llm`] backed by an OpenAI-compatible chat-completions API.
pub struct OpenAIClient {
    client: reqwest::Client,
    config: OpenAIConfig,
    name: String,
}

impl OpenAIClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if the API key is empty while the
    /// base URL is the official OpenAI endpoint (compatible local servers
    /// may run without auth).
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.is_empty() && config.base_url == OPENAI_API_BASE {
            return Err(AgentError::Config("OpenAI API key must not be empty".into()));
        }
        // No client-wide timeout: that is a total deadline covering body
        // read, which would abort long streaming replies mid-flight. The
        // non-streaming deadline is applied per request instead.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;
        let name = config.base_url.clone();
        Ok(Self { client, config, name })
    }

    /// Create a client from the `OPENAI_API_KEY` environment variable,
    /// honoring `OPENAI_API_BASE` when set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AgentError::Config("OPENAI_API_KEY environment variable not set".into()))?;
        let config = match std::env::var("OPENAI_API_BASE") {
            Ok(base) => OpenAIConfig::compatible(api_key, base),
            Err(_) => OpenAIConfig::new(api_key),
        };
        Self::new(config)
    }

    fn endpoint_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn post_request(
        &self,
        body: &ChatRequestBody<'_>,
        timeout: Option<std::time::Duration>,
    ) -> Result<reqwest::Response> {
        let mut builder = self.client.post(self.endpoint_url()).json(body);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder.send().await.map_err(|e| {
            error!(error = %e, "chat completion request failed");
            AgentError::Model(format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(%status, "chat completion API error");
            return Err(AgentError::Model(format!("API returned {status}: {detail}")));
        }

        Ok(response)
    }
}

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Extract the content delta from one SSE `data:` payload.
///
/// Returns `None` for deltas without content (role announcements, the
/// finish chunk) and for payloads that fail to parse.
fn parse_stream_data(data: &str) -> Option<String> {
    match serde_json::from_str::<StreamResponse>(data) {
        Ok(parsed) => parsed.choices.into_iter().next().and_then(|c| c.delta.content),
        Err(e) => {
            warn!(error = %e, "skipping unparseable stream payload");
            None
        }
    }
}

#[async_trait]
impl Llm for OpenAIClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: LlmRequest) -> Result<String> {
        debug!(model = %request.model, messages = request.messages.len(), "chat completion");

        let body = ChatRequestBody {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        };
        let timeout = std::time::Duration::from_secs(self.config.timeout_secs);
        let response = self.post_request(&body, Some(timeout)).await?;

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Model(format!("failed to parse response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Model("API returned no choices".into()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    async fn complete_stream(&self, request: LlmRequest) -> Result<TokenStream> {
        debug!(model = %request.model, messages = request.messages.len(), "streaming chat completion");

        let body = ChatRequestBody {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: true,
        };
        let response = self.post_request(&body, None).await?;
        let mut bytes = response.bytes_stream();

        let stream = try_stream! {
            // Accumulates partial SSE lines across network chunks.
            let mut buffer = String::new();
            let mut done = false;

            while !done {
                let Some(chunk) = bytes.next().await else { break };
                let chunk =
                    chunk.map_err(|e| AgentError::Model(format!("stream error: {e}")))?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer.drain(..=line_end);

                    if line.is_empty() {
                        continue;
                    }
                    if line == "data: [DONE]" {
                        done = true;
                        break;
                    }
                    if let Some(data) = line.strip_prefix("data: ") {
                        if let Some(content) = parse_stream_data(data) {
                            yield content;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"},"index":0,"finish_reason":null}]}"#;
        assert_eq!(parse_stream_data(data), Some("Hel".to_string()));
    }

    #[test]
    fn ignores_finish_chunk_and_garbage() {
        let finish = r#"{"choices":[{"delta":{},"index":0,"finish_reason":"stop"}]}"#;
        assert_eq!(parse_stream_data(finish), None);
        assert_eq!(parse_stream_data("not json"), None);
    }

    #[test]
    fn endpoint_url_tolerates_trailing_slash() {
        let client =
            OpenAIClient::new(OpenAIConfig::compatible("key", "http://localhost:8000/v1/"))
                .unwrap();
        assert_eq!(client.endpoint_url(), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn empty_key_rejected_for_official_endpoint() {
        assert!(OpenAIClient::new(OpenAIConfig::new("")).is_err());
        assert!(OpenAIClient::new(OpenAIConfig::compatible("", "http://localhost:1234/v1")).is_ok());
    }

    /// A stream that takes longer than `timeout_secs` must still deliver
    /// every fragment: the configured timeout bounds non-streaming calls,
    /// not healthy long-running streams.
    #[tokio::test]
    async fn slow_stream_outlives_the_request_timeout() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Emits 5 SSE fragments at 600ms intervals — 3s total, past the
        // 2s timeout configured below.
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\n\
                      content-type: text/event-stream\r\n\
                      connection: close\r\n\r\n",
                )
                .await
                .unwrap();
            for i in 0..5 {
                let event = format!(
                    "data: {{\"choices\":[{{\"delta\":{{\"content\":\"tok{i}\"}},\
                     \"index\":0,\"finish_reason\":null}}]}}\n\n"
                );
                socket.write_all(event.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(600)).await;
            }
            socket.write_all(b"data: [DONE]\n\n").await.unwrap();
            socket.flush().await.unwrap();
        });

        let client = OpenAIClient::new(
            OpenAIConfig::compatible("key", format!("http://{addr}/v1")).with_timeout_secs(2),
        )
        .unwrap();

        let request = LlmRequest::new("m", vec![Message::user("hi")]);
        let mut stream = client.complete_stream(request).await.unwrap();

        let mut fragments = Vec::new();
        while let Some(item) = stream.next().await {
            fragments.push(item.unwrap());
        }
        assert_eq!(fragments, vec!["tok0", "tok1", "tok2", "tok3", "tok4"]);

        server.await.unwrap();
    }
}
