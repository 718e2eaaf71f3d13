//! # pka-server
//!
//! The HTTP face of the personal knowledge agent: an OpenAI-compatible
//! `/v1/chat/completions` endpoint (JSON and SSE streaming), a `/v1/models`
//! listing, and a health probe, served over axum.
//!
//! The library surface exists so integration tests can drive the router
//! in-process with a mock backend; the binary in `main.rs` wires real
//! OpenAI backends and an optional corpus index behind the same router.

pub mod api;
pub mod routes;
pub mod settings;
pub mod state;

pub use routes::router;
pub use settings::Settings;
pub use state::AppState;
