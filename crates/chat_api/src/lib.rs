//! Transport-only client for OpenAI-compatible chat-completions endpoints.
//!
//! This crate owns request building, retry and SSE chunk parsing for the
//! streaming `POST /chat/completions` contract. It knows nothing about the
//! conversation model used by the agent; the `agent_provider_chat_api`
//! adapter maps between the two.
//!
//! Streamed tool calls are surfaced as raw per-index deltas
//! ([`ChatStreamEvent::ToolCallDelta`]); argument text is never parsed here.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod url;

pub use client::ChatApiClient;
pub use client::CancellationSignal;
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use events::ChatStreamEvent;
pub use retry::RetryPolicy;
pub use payload::{ChatFunction, ChatFunctionCall, ChatMessage, ChatRequest, ChatTool, ChatToolCall};
pub use sse::SseStreamParser;
pub use url::normalize_chat_url;

pub use reqwest::StatusCode;
