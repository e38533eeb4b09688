use chat_api::{ChatStreamEvent, SseStreamParser};
use pretty_assertions::assert_eq;

#[test]
fn sse_framing_parses_text_deltas_and_done() {
    let payload = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"hel\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    assert_eq!(
        SseStreamParser::parse_frames(payload),
        vec![
            ChatStreamEvent::ContentDelta {
                delta: "hel".to_string()
            },
            ChatStreamEvent::ContentDelta {
                delta: "lo".to_string()
            },
            ChatStreamEvent::FinishReason {
                reason: "stop".to_string()
            },
            ChatStreamEvent::Done,
        ]
    );
}

#[test]
fn sse_parser_maps_tool_call_deltas_by_index() {
    let payload = concat!(
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",\"type\":\"function\",\"function\":{\"name\":\"list_dir\",\"arguments\":\"\"}}]}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"path\\\":\"}}]}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":1,\"id\":\"call_b\",\"function\":{\"name\":\"read_file\",\"arguments\":\"{}\"}}]}}]}\n\n",
    );

    assert_eq!(
        SseStreamParser::parse_frames(payload),
        vec![
            ChatStreamEvent::ToolCallDelta {
                index: 0,
                id: Some("call_a".to_string()),
                name: Some("list_dir".to_string()),
                arguments: String::new(),
            },
            ChatStreamEvent::ToolCallDelta {
                index: 0,
                id: None,
                name: None,
                arguments: "{\"path\":".to_string(),
            },
            ChatStreamEvent::ToolCallDelta {
                index: 1,
                id: Some("call_b".to_string()),
                name: Some("read_file".to_string()),
                arguments: "{}".to_string(),
            },
        ]
    );
}

#[test]
fn sse_parser_reads_usage_from_final_chunk() {
    let payload =
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":3}}\n\n";

    assert_eq!(
        SseStreamParser::parse_frames(payload),
        vec![ChatStreamEvent::Usage {
            prompt_tokens: Some(12),
            completion_tokens: Some(3),
            total_tokens: None,
        }]
    );
}

#[test]
fn sse_parser_ignores_null_usage() {
    let payload = "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}],\"usage\":null}\n\n";
    assert_eq!(SseStreamParser::parse_frames(payload).len(), 1);
}

#[test]
fn sse_parser_surfaces_error_objects() {
    let payload = "data: {\"error\":{\"message\":\"overloaded\",\"type\":\"server_error\"}}\n\n";
    assert_eq!(
        SseStreamParser::parse_frames(payload),
        vec![ChatStreamEvent::Error {
            code: Some("server_error".to_string()),
            message: Some("overloaded".to_string()),
        }]
    );
}

#[test]
fn sse_parser_ignores_comments_and_malformed_frames() {
    let payload = concat!(
        ": keep-alive\n\n",
        "data: {broken-json\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n",
    );

    let events = SseStreamParser::parse_frames(payload);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ChatStreamEvent::ContentDelta { .. }));
}

#[test]
fn sse_parser_handles_split_frames_incrementally() {
    let mut parser = SseStreamParser::default();
    assert!(parser
        .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"abc\"}}]")
        .is_empty());
    assert!(!parser.is_empty_buffer());

    let mut events = parser.feed(b"}\n\n");
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events.pop(),
        Some(ChatStreamEvent::ContentDelta { .. })
    ));
    assert!(parser.is_empty_buffer());
}
