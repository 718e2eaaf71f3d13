//! HTTP routes: health, model listing, and the chat-completion endpoint.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use pka_agent::{AgentReply, TurnOptions};
use pka_core::error::AgentError;
use pka_core::message::Message;

use crate::api::{ApiError, ChatCompletionRequest, ChatCompletionResponse, ModelList};
use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    Json(ModelList::single(state.model.clone()))
}

/// `POST /v1/chat/completions` — OpenAI-compatible, JSON or SSE.
///
/// Empty message lists are rejected with 400. Generation failures are
/// embedded in a 200 payload as a degraded assistant message; only
/// precondition failures surface as error statuses.
async fn chat_completions(
    State(state): State<AppState>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    let model = request.model.unwrap_or_else(|| state.model.clone());
    let messages: Vec<Message> = request.messages.into_iter().map(Into::into).collect();

    let mut options = TurnOptions::new(model.clone());
    options.max_tokens = request.max_tokens;
    options.temperature = request.temperature;
    options.stream = request.stream;
    options.include_context = request.include_context;

    let request_id = uuid::Uuid::new_v4().simple().to_string();
    info!(
        request_id = &request_id[..8],
        %model,
        messages = messages.len(),
        stream = request.stream,
        include_context = request.include_context,
        "chat completion request"
    );

    let reply = state.agent.respond(messages, options).await.map_err(|e| match e {
        AgentError::EmptyConversation => ApiError::bad_request(e.to_string()),
        other => ApiError {
            status: axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            message: other.to_string(),
        },
    })?;

    match reply {
        AgentReply::Complete(text) => {
            Ok(Json(ChatCompletionResponse::assistant(model, text)).into_response())
        }
        AgentReply::Stream(chunks) => {
            let events = chunks
                .map(|chunk| match serde_json::to_string(&chunk) {
                    Ok(json) => Event::default().data(json),
                    Err(e) => Event::default().data(format!("{{\"error\":\"{e}\"}}")),
                })
                .chain(futures::stream::once(async { Event::default().data("[DONE]") }))
                .map(Ok::<Event, Infallible>);
            Ok(Sse::new(events).into_response())
        }
    }
}
