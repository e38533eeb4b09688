use chat_api::payload::StreamOptions;
use chat_api::{ChatMessage, ChatRequest, ChatTool, ChatToolCall};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn request_serializes_streaming_chat_shape() {
    let request = ChatRequest::new(
        "gpt-4o-mini",
        vec![
            ChatMessage::text("system", "rules"),
            ChatMessage::text("user", "list src"),
            ChatMessage::assistant_tool_calls(
                "",
                vec![ChatToolCall::function("call_1", "list_dir", "{\"path\":\"src\"}")],
            ),
            ChatMessage::tool_result("call_1", "- lib.rs"),
        ],
    )
    .with_tools(vec![ChatTool::function(
        "list_dir",
        "List a directory",
        json!({"type": "object", "properties": {"path": {"type": "string"}}}),
    )]);

    assert_eq!(
        serde_json::to_value(&request).expect("serialize request"),
        json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "rules"},
                {"role": "user", "content": "list src"},
                {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "list_dir", "arguments": "{\"path\":\"src\"}"},
                    }],
                },
                {"role": "tool", "content": "- lib.rs", "tool_call_id": "call_1"},
            ],
            "stream": true,
            "stream_options": {"include_usage": true},
            "tools": [{
                "type": "function",
                "function": {
                    "name": "list_dir",
                    "description": "List a directory",
                    "parameters": {"type": "object", "properties": {"path": {"type": "string"}}},
                },
            }],
            "tool_choice": "auto",
        })
    );
}

#[test]
fn request_without_tools_omits_tool_choice() {
    let request = ChatRequest::new("m", vec![ChatMessage::text("user", "hi")]).with_tools(Vec::new());
    let value = serde_json::to_value(&request).expect("serialize request");

    assert!(value.get("tools").is_none());
    assert!(value.get("tool_choice").is_none());
    assert_eq!(
        request.stream_options,
        Some(StreamOptions {
            include_usage: true
        })
    );
}
