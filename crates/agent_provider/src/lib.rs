//! Minimal provider-agnostic contract for streaming one model call.
//!
//! This crate defines the conversation data model shared by the turn engine,
//! the session store and every transport, plus the incremental response
//! channel a transport feeds while the engine consumes it. It excludes
//! transport details, protocol payloads and turn orchestration.

use std::fmt;
use std::ops::{Add, AddAssign};
use std::sync::{atomic::AtomicBool, Arc};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

mod assembler;
mod stream;

pub use assembler::{AssembledResponse, ResponseAssembler};
pub use stream::{fragment_channel, FragmentSender, FragmentStream, StreamPoll};

/// Identifier for one model call.
pub type RunId = u64;

/// Shared cancellation flag for a run.
pub type CancelSignal = Arc<AtomicBool>;

/// Author of one conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome class of one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Ok,
    Rejected,
    Error,
}

impl ToolStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Rejected => "rejected",
            Self::Error => "error",
        }
    }
}

/// Tool-result linkage carried by tool-role messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolResultMeta {
    pub call_id: String,
    pub tool_name: String,
    pub status: ToolStatus,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub omitted_lines: usize,
    #[serde(default)]
    pub elapsed_ms: u64,
}

/// Provider-neutral conversation history item.
///
/// Assistant messages may carry tool calls with empty `content`; tool messages
/// always carry `tool_result` naming the originating call id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResultMeta>,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_result: None,
        }
    }

    #[must_use]
    pub fn tool(meta: ToolResultMeta, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_result: Some(meta),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_result: None,
        }
    }

    /// Returns the originating call id for tool-role messages.
    #[must_use]
    pub fn tool_call_id(&self) -> Option<&str> {
        self.tool_result.as_ref().map(|meta| meta.call_id.as_str())
    }
}

/// Token accounting reported by one or more model calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    /// Builds usage from possibly-partial provider counts, deriving the total when absent.
    #[must_use]
    pub fn from_counts(prompt: Option<u64>, completion: Option<u64>, total: Option<u64>) -> Self {
        let prompt_tokens = prompt.unwrap_or(0);
        let completion_tokens = completion.unwrap_or(0);
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: total.unwrap_or(prompt_tokens + completion_tokens),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prompt={} completion={} total={}",
            self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}

/// Host tool definition exposed to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// One incremental piece of a streamed model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFragment {
    TextDelta {
        text: String,
    },
    /// Partial tool call keyed by its position in the response; `arguments`
    /// is a raw JSON text fragment appended to earlier fragments of the same index.
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    Usage(Usage),
    Done,
}

/// Failure reported by a model transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("model endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("model request timed out after {0:?}")]
    Timeout(Duration),
    #[error("model request failed with HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("model stream failed: {0}")]
    Stream(String),
    #[error("model request was cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Short user-facing description of the failure.
    #[must_use]
    pub fn friendly_message(&self) -> String {
        match self {
            Self::Status { status: 401 | 403, .. } => {
                "Authentication error: your API key is invalid or missing.".to_string()
            }
            Self::Status { status: 429, .. } => {
                "Rate limit error: provider is throttling you. Try again later or switch models."
                    .to_string()
            }
            Self::Status { status: 404, .. } => {
                "Model not found: check the configured model identifier.".to_string()
            }
            Self::Timeout(_) => {
                "Request timed out: increase the request timeout or try again.".to_string()
            }
            other => format!("Model request failed: {other}"),
        }
    }
}

/// Input required to start one model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub run_id: RunId,
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub timeout: Duration,
}

/// Immutable metadata describing a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Error returned while constructing a transport before any run starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Model transport collaborator.
///
/// `stream` starts exactly one request and returns the reading end of its
/// fragment channel. The transport owns the writing end and stops producing
/// once the reader is dropped or `cancel` is raised.
pub trait ModelTransport: Send + Sync + 'static {
    fn profile(&self) -> ProviderProfile;

    fn stream(
        &self,
        request: ModelRequest,
        cancel: CancelSignal,
    ) -> Result<FragmentStream, TransportError>;
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn usage_adds_fieldwise_and_derives_missing_total() {
        let first = Usage::from_counts(Some(10), Some(5), None);
        assert_eq!(first.total_tokens, 15);

        let mut total = first;
        total += Usage::from_counts(Some(3), Some(2), Some(6));
        assert_eq!(
            total,
            Usage {
                prompt_tokens: 13,
                completion_tokens: 7,
                total_tokens: 21,
            }
        );
    }

    #[test]
    fn tool_message_exposes_originating_call_id() {
        let message = Message::tool(
            ToolResultMeta {
                call_id: "call-7".to_string(),
                tool_name: "list_dir".to_string(),
                status: ToolStatus::Ok,
                truncated: false,
                omitted_lines: 0,
                elapsed_ms: 3,
            },
            "- src/",
        );

        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_call_id(), Some("call-7"));
        assert_eq!(Message::user("hi").tool_call_id(), None);
    }

    #[test]
    fn message_serialization_omits_empty_linkage() {
        let user = serde_json::to_value(Message::user("hello")).expect("serialize user");
        assert_eq!(user, json!({"role": "user", "content": "hello"}));

        let assistant = serde_json::to_value(Message::assistant(
            "",
            vec![ToolCall::new("c1", "read_file", json!({"path": "a.txt"}))],
        ))
        .expect("serialize assistant");
        assert_eq!(
            assistant,
            json!({
                "role": "assistant",
                "content": "",
                "tool_calls": [{"id": "c1", "name": "read_file", "arguments": {"path": "a.txt"}}],
            })
        );
    }

    #[test]
    fn message_deserialization_rejects_unknown_fields() {
        let result = serde_json::from_value::<Message>(json!({
            "role": "user",
            "content": "x",
            "extra": true,
        }));
        assert!(result.is_err());
    }

    #[test]
    fn friendly_messages_cover_common_failures() {
        let auth = TransportError::Status {
            status: 401,
            message: "bad key".to_string(),
        };
        assert!(auth.friendly_message().starts_with("Authentication error"));

        let timeout = TransportError::Timeout(Duration::from_secs(5));
        assert!(timeout.friendly_message().starts_with("Request timed out"));

        let other = TransportError::Unreachable("dns".to_string());
        assert_eq!(
            other.friendly_message(),
            "Model request failed: model endpoint unreachable: dns"
        );
    }
}
