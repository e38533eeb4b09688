use serde::{Deserialize, Serialize};

/// Stream event emitted by the parser after normalization of one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    ContentDelta {
        delta: String,
    },
    /// Partial function call; `arguments` is appended to earlier deltas with
    /// the same `index`.
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    FinishReason {
        reason: String,
    },
    Usage {
        prompt_tokens: Option<u64>,
        completion_tokens: Option<u64>,
        total_tokens: Option<u64>,
    },
    Error {
        code: Option<String>,
        message: Option<String>,
    },
    /// The `[DONE]` sentinel.
    Done,
}
