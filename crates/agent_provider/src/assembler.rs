use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{ResponseFragment, ToolCall, Usage};

#[derive(Debug, Default, Clone)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Accumulates streamed fragments into one assistant response.
#[derive(Debug, Default, Clone)]
pub struct ResponseAssembler {
    text: String,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    usage: Option<Usage>,
    done: bool,
}

/// Fully assembled assistant response for one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

impl AssembledResponse {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.tool_calls.is_empty()
    }
}

impl ResponseAssembler {
    pub fn push(&mut self, fragment: ResponseFragment) {
        match fragment {
            ResponseFragment::TextDelta { text } => self.text.push_str(&text),
            ResponseFragment::ToolCallDelta {
                index,
                id,
                name,
                arguments,
            } => {
                let entry = self.tool_calls.entry(index).or_default();
                if let Some(id) = id.filter(|id| !id.is_empty()) {
                    entry.id = id;
                }
                if let Some(name) = name.filter(|name| !name.is_empty()) {
                    entry.name = name;
                }
                entry.arguments.push_str(&arguments);
            }
            ResponseFragment::Usage(usage) => self.usage = Some(usage),
            ResponseFragment::Done => self.done = true,
        }
    }

    /// Returns true once the terminal `Done` fragment was observed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Finalizes the response.
    ///
    /// Tool calls are ordered by stream index. Calls without a name are
    /// dropped; calls without an id get `call_<index>`. Argument text that
    /// is not valid JSON is kept as a JSON string so argument validation can
    /// report it back to the model.
    #[must_use]
    pub fn finish(self) -> AssembledResponse {
        let tool_calls = self
            .tool_calls
            .into_iter()
            .filter(|(_, partial)| !partial.name.is_empty())
            .map(|(index, partial)| {
                let id = if partial.id.is_empty() {
                    format!("call_{index}")
                } else {
                    partial.id
                };
                ToolCall {
                    id,
                    name: partial.name,
                    arguments: parse_arguments(&partial.arguments),
                }
            })
            .collect();

        AssembledResponse {
            text: self.text.trim().to_string(),
            tool_calls,
            usage: self.usage,
        }
    }
}

fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }

    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
