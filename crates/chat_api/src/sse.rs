use serde_json::Value;

use crate::events::ChatStreamEvent;

/// Incremental parser for chat-completions SSE text streams.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: String,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ChatStreamEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
        let mut events = Vec::new();

        while let Some(split) = self.buffer.find("\n\n") {
            let frame = self.buffer[..split].to_string();
            self.buffer.drain(0..split + 2);

            let Some(payload) = extract_data_payload(&frame) else {
                continue;
            };
            if payload == "[DONE]" {
                events.push(ChatStreamEvent::Done);
                continue;
            }

            if let Ok(value) = serde_json::from_str::<Value>(&payload) {
                events.extend(map_chunk(&value));
            }
        }

        events
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<ChatStreamEvent> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

/// Maps one `chat.completion.chunk` object to zero or more events.
fn map_chunk(value: &Value) -> Vec<ChatStreamEvent> {
    let mut events = Vec::new();

    if let Some(error) = value.get("error") {
        let code = error
            .get("code")
            .and_then(|code| match code {
                Value::String(code) => Some(code.clone()),
                Value::Number(code) => Some(code.to_string()),
                _ => None,
            })
            .or_else(|| {
                error
                    .get("type")
                    .and_then(Value::as_str)
                    .map(ToString::to_string)
            });
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        events.push(ChatStreamEvent::Error { code, message });
        return events;
    }

    let choices = value
        .get("choices")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for choice in choices {
        if let Some(delta) = choice.get("delta") {
            if let Some(content) = delta.get("content").and_then(Value::as_str) {
                if !content.is_empty() {
                    events.push(ChatStreamEvent::ContentDelta {
                        delta: content.to_owned(),
                    });
                }
            }

            let tool_calls = delta
                .get("tool_calls")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for (position, call) in tool_calls.iter().enumerate() {
                events.push(map_tool_call_delta(call, position));
            }
        }

        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            events.push(ChatStreamEvent::FinishReason {
                reason: reason.to_owned(),
            });
        }
    }

    if let Some(usage) = value.get("usage").filter(|usage| usage.is_object()) {
        let count = |field: &str| usage.get(field).and_then(Value::as_u64);
        events.push(ChatStreamEvent::Usage {
            prompt_tokens: count("prompt_tokens"),
            completion_tokens: count("completion_tokens"),
            total_tokens: count("total_tokens"),
        });
    }

    events
}

fn map_tool_call_delta(call: &Value, position: usize) -> ChatStreamEvent {
    let index = call
        .get("index")
        .and_then(Value::as_u64)
        .and_then(|index| usize::try_from(index).ok())
        .unwrap_or(position);
    let id = call
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string);
    let function = call.get("function");
    let name = function
        .and_then(|function| function.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string);
    let arguments = function
        .and_then(|function| function.get("arguments"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    ChatStreamEvent::ToolCallDelta {
        index,
        id,
        name,
        arguments,
    }
}
