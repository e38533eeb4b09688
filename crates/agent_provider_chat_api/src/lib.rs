//! Chat-completions implementation of the shared `agent_provider` contract.
//!
//! This adapter converts provider-neutral history into `chat_api` requests
//! and feeds parsed stream events into the fragment channel consumed by
//! `coding_agent`. Each call runs on its own thread with a current-thread
//! tokio runtime so callers stay synchronous.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use agent_provider::{
    fragment_channel, CancelSignal, FragmentSender, FragmentStream, Message, ModelRequest,
    ModelTransport, ProviderInitError, ProviderProfile, ResponseFragment, Role, ToolDefinition,
    TransportError, Usage,
};
use chat_api::{
    ChatApiClient, ChatApiConfig, ChatApiError, ChatMessage, ChatRequest, ChatStreamEvent,
    ChatTool, ChatToolCall,
};
use serde_json::Value;
use tracing::debug;

/// Stable provider identifier used by `coding_agent` startup selection.
pub const CHAT_API_PROVIDER_ID: &str = "chat-api";

/// Runtime configuration for the chat-completions transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatApiProviderConfig {
    pub api_key: String,
    pub model_id: String,
    pub base_url: Option<String>,
    pub connect_timeout: Option<Duration>,
}

impl ChatApiProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model_id: model_id.into(),
            base_url: None,
            connect_timeout: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn into_chat_api_config(self) -> Result<ChatApiConfig, ProviderInitError> {
        let mut config = ChatApiConfig::new(self.api_key);

        if let Some(base_url) = self.base_url.filter(|value| !value.trim().is_empty()) {
            let parsed = url::Url::parse(base_url.trim()).map_err(|error| {
                ProviderInitError::new(format!("Invalid base URL '{base_url}': {error}"))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ProviderInitError::new(format!(
                    "Invalid base URL '{base_url}': scheme must be http or https"
                )));
            }
            config = config.with_base_url(base_url);
        }

        if let Some(timeout) = self.connect_timeout {
            config = config.with_connect_timeout(timeout);
        }

        Ok(config)
    }
}

trait StreamClient: Send + Sync {
    /// Streams one request, returning whether the `[DONE]` sentinel arrived.
    fn stream(
        &self,
        request: &ChatRequest,
        cancel: &CancelSignal,
        on_event: &mut dyn FnMut(ChatStreamEvent) -> bool,
    ) -> Result<bool, ChatApiError>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: ChatApiClient,
}

impl StreamClient for DefaultStreamClient {
    fn stream(
        &self,
        request: &ChatRequest,
        cancel: &CancelSignal,
        on_event: &mut dyn FnMut(ChatStreamEvent) -> bool,
    ) -> Result<bool, ChatApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                ChatApiError::Unknown(format!("failed to initialize tokio runtime: {error}"))
            })?;

        runtime.block_on(
            self.client
                .stream_with_handler(request, Some(cancel), |event| on_event(event)),
        )
    }
}

/// `ModelTransport` backed by `chat_api` transport primitives.
pub struct ChatApiTransport {
    model_id: String,
    stream_client: Arc<dyn StreamClient>,
}

impl ChatApiTransport {
    pub fn new(config: ChatApiProviderConfig) -> Result<Self, ProviderInitError> {
        let model_id = config.model_id.trim().to_string();
        let client = ChatApiClient::new(config.into_chat_api_config()?).map_err(map_init_error)?;

        Ok(Self {
            model_id,
            stream_client: Arc::new(DefaultStreamClient { client }),
        })
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(model_id: &str, stream_client: Arc<dyn StreamClient>) -> Self {
        Self {
            model_id: model_id.to_string(),
            stream_client,
        }
    }
}

impl ModelTransport for ChatApiTransport {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: CHAT_API_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn stream(
        &self,
        request: ModelRequest,
        cancel: CancelSignal,
    ) -> Result<FragmentStream, TransportError> {
        if cancel.load(Ordering::Acquire) {
            return Err(TransportError::Cancelled);
        }

        let run_id = request.run_id;
        let timeout = request.timeout;
        let chat_request = ChatRequest::new(request.model, build_chat_messages(&request.messages))
            .with_tools(request.tools.iter().map(chat_tool).collect());
        debug!(run_id, messages = chat_request.messages.len(), "starting chat request");

        let (sender, stream) = fragment_channel();
        let stream_client = Arc::clone(&self.stream_client);
        thread::Builder::new()
            .name(format!("chat-api-run-{run_id}"))
            .spawn(move || {
                run_stream(stream_client.as_ref(), &chat_request, &cancel, &sender, timeout);
            })
            .map_err(|error| TransportError::Other(format!("failed to spawn stream thread: {error}")))?;

        Ok(stream)
    }
}

fn run_stream(
    stream_client: &dyn StreamClient,
    request: &ChatRequest,
    cancel: &CancelSignal,
    sender: &FragmentSender,
    timeout: Duration,
) {
    let mut finished = false;
    let result = stream_client.stream(request, cancel, &mut |event| match event {
        ChatStreamEvent::ContentDelta { delta } => {
            sender.send(ResponseFragment::TextDelta { text: delta })
        }
        ChatStreamEvent::ToolCallDelta {
            index,
            id,
            name,
            arguments,
        } => sender.send(ResponseFragment::ToolCallDelta {
            index,
            id,
            name,
            arguments,
        }),
        ChatStreamEvent::Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        } => sender.send(ResponseFragment::Usage(Usage::from_counts(
            prompt_tokens,
            completion_tokens,
            total_tokens,
        ))),
        ChatStreamEvent::FinishReason { .. } => {
            finished = true;
            true
        }
        ChatStreamEvent::Done => sender.send(ResponseFragment::Done),
        ChatStreamEvent::Error { .. } => true,
    });

    match result {
        Ok(true) => {}
        // Some servers close the body after the finish chunk without `[DONE]`.
        Ok(false) if finished => {
            sender.send(ResponseFragment::Done);
        }
        Ok(false) => {
            sender.fail(TransportError::Stream(
                "stream ended before the response completed".to_string(),
            ));
        }
        Err(error) => {
            sender.fail(map_stream_error(error, timeout));
        }
    }
}

/// Converts provider-neutral history into chat-completions messages.
///
/// Assistant tool calls are only echoed when a matching tool result follows,
/// and tool results only when their call was echoed, so history left behind
/// by a cancelled turn still forms a valid request.
fn build_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    let answered: HashSet<&str> = messages
        .iter()
        .filter_map(Message::tool_call_id)
        .collect();
    let mut declared: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            Role::System | Role::User => {
                out.push(ChatMessage::text(message.role.as_str(), message.content.as_str()));
            }
            Role::Assistant => {
                let tool_calls: Vec<ChatToolCall> = message
                    .tool_calls
                    .iter()
                    .filter(|call| answered.contains(call.id.as_str()))
                    .map(|call| {
                        declared.insert(call.id.as_str());
                        ChatToolCall::function(
                            call.id.as_str(),
                            call.name.as_str(),
                            argument_text(&call.arguments),
                        )
                    })
                    .collect();
                if tool_calls.is_empty() && message.content.trim().is_empty() {
                    continue;
                }
                out.push(ChatMessage::assistant_tool_calls(
                    message.content.as_str(),
                    tool_calls,
                ));
            }
            Role::Tool => {
                if let Some(call_id) = message
                    .tool_call_id()
                    .filter(|call_id| declared.contains(call_id))
                {
                    out.push(ChatMessage::tool_result(call_id, message.content.as_str()));
                }
            }
        }
    }

    out
}

/// Malformed argument text is preserved as a JSON string by the assembler and
/// echoed back verbatim.
fn argument_text(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

fn chat_tool(definition: &ToolDefinition) -> ChatTool {
    ChatTool::function(
        definition.name.as_str(),
        definition.description.as_str(),
        definition.input_schema.clone(),
    )
}

fn map_stream_error(error: ChatApiError, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout(timeout);
    }
    if error.is_connect() {
        return TransportError::Unreachable(error.to_string());
    }

    match error {
        ChatApiError::Status(status, message) => TransportError::Status {
            status: status.as_u16(),
            message,
        },
        ChatApiError::RetryExhausted {
            status: Some(status),
            last_error,
        } => TransportError::Status {
            status: status.as_u16(),
            message: last_error.unwrap_or_default(),
        },
        ChatApiError::RetryExhausted {
            status: None,
            last_error,
        } => TransportError::Unreachable(
            last_error.unwrap_or_else(|| "no response from endpoint".to_string()),
        ),
        ChatApiError::StreamFailed { .. } | ChatApiError::Serde(_) => {
            TransportError::Stream(error.to_string())
        }
        ChatApiError::Cancelled => TransportError::Cancelled,
        other => TransportError::Other(other.to_string()),
    }
}

fn map_init_error(error: ChatApiError) -> ProviderInitError {
    ProviderInitError::new(format!("Failed to initialize chat-api provider: {error}"))
}
