//! Deterministic model transports for the shared `agent_provider` contract.
//!
//! `ScriptedTransport` replays a queue of canned responses and records every
//! request it receives; it backs engine tests. `MockTransport` streams a
//! fixed echo reply and backs local runs without network access. Neither
//! contains protocol logic.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use agent_provider::{
    fragment_channel, CancelSignal, FragmentStream, Message, ModelRequest, ModelTransport,
    ProviderProfile, ResponseFragment, Role, ToolCall, TransportError, Usage,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

const HANG_POLL: Duration = Duration::from_millis(5);

type ScriptItem = Result<ResponseFragment, TransportError>;

/// One canned reply consumed by a single model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Stream these items, then close.
    Fragments(Vec<ScriptItem>),
    /// Fail the call before any stream is returned.
    Reject(TransportError),
    /// Keep the stream open without producing anything for the given duration,
    /// reporting `Cancelled` if the cancel signal is raised first.
    Hang(Duration),
}

impl ScriptedReply {
    /// Final text reply split into word-sized deltas.
    #[must_use]
    pub fn text(text: &str) -> Self {
        let mut items: Vec<ScriptItem> = split_tokens(text)
            .into_iter()
            .map(|text| Ok(ResponseFragment::TextDelta { text }))
            .collect();
        items.push(Ok(ResponseFragment::Done));
        Self::Fragments(items)
    }

    /// Reply requesting the given tool calls, each argument payload split in two
    /// fragments to exercise incremental assembly.
    #[must_use]
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        let mut items = Vec::new();
        for (index, call) in calls.into_iter().enumerate() {
            let arguments = call.arguments.to_string();
            let split = arguments
                .char_indices()
                .nth(arguments.chars().count() / 2)
                .map_or(arguments.len(), |(offset, _)| offset);
            let (head, tail) = arguments.split_at(split);
            items.push(Ok(ResponseFragment::ToolCallDelta {
                index,
                id: Some(call.id),
                name: Some(call.name),
                arguments: head.to_string(),
            }));
            items.push(Ok(ResponseFragment::ToolCallDelta {
                index,
                id: None,
                name: None,
                arguments: tail.to_string(),
            }));
        }
        items.push(Ok(ResponseFragment::Done));
        Self::Fragments(items)
    }

    /// Appends a usage report ahead of the terminal `Done` fragment.
    #[must_use]
    pub fn with_usage(self, usage: Usage) -> Self {
        match self {
            Self::Fragments(mut items) => {
                let position = items
                    .iter()
                    .position(|item| matches!(item, Ok(ResponseFragment::Done)))
                    .unwrap_or(items.len());
                items.insert(position, Ok(ResponseFragment::Usage(usage)));
                Self::Fragments(items)
            }
            other => other,
        }
    }
}

/// Transport that replays scripted replies in order and records requests.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: ScriptedReply) {
        lock_unpoisoned(&self.replies).push_back(reply);
    }

    /// Snapshot of every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ModelRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        lock_unpoisoned(&self.requests).len()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        lock_unpoisoned(&self.replies).len()
    }
}

impl ModelTransport for ScriptedTransport {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: "scripted".to_string(),
        }
    }

    fn stream(
        &self,
        request: ModelRequest,
        cancel: CancelSignal,
    ) -> Result<FragmentStream, TransportError> {
        lock_unpoisoned(&self.requests).push(request);
        let reply = lock_unpoisoned(&self.replies).pop_front();

        match reply {
            Some(ScriptedReply::Fragments(items)) => Ok(FragmentStream::from_fragments(items)),
            Some(ScriptedReply::Reject(error)) => Err(error),
            Some(ScriptedReply::Hang(duration)) => {
                let (sender, stream) = fragment_channel();
                thread::spawn(move || {
                    let started = Instant::now();
                    while started.elapsed() < duration {
                        if cancel.load(Ordering::SeqCst) {
                            sender.fail(TransportError::Cancelled);
                            return;
                        }
                        thread::sleep(HANG_POLL);
                    }
                });
                Ok(stream)
            }
            None => Err(TransportError::Other(
                "scripted transport has no reply left".to_string(),
            )),
        }
    }
}

/// Offline transport that streams a short echo of the latest user message.
#[derive(Debug, Clone)]
pub struct MockTransport {
    model_id: String,
}

impl MockTransport {
    const TOKEN_DELAY_MS: u64 = 20;

    #[must_use]
    pub fn new(model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        let model_id = if model_id.trim().is_empty() {
            "mock".to_string()
        } else {
            model_id.trim().to_string()
        };
        Self { model_id }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new("mock")
    }
}

impl ModelTransport for MockTransport {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn stream(
        &self,
        request: ModelRequest,
        cancel: CancelSignal,
    ) -> Result<FragmentStream, TransportError> {
        let reply = echo_reply(&request.messages);
        let (sender, stream) = fragment_channel();

        thread::spawn(move || {
            let tokens = split_tokens(&reply);
            let completion_tokens = tokens.len() as u64;
            for text in tokens {
                if cancel.load(Ordering::SeqCst) {
                    sender.fail(TransportError::Cancelled);
                    return;
                }
                if !sender.send(ResponseFragment::TextDelta { text }) {
                    return;
                }
                thread::sleep(Duration::from_millis(Self::TOKEN_DELAY_MS));
            }

            let prompt_tokens = request
                .messages
                .iter()
                .map(|message| split_tokens(&message.content).len() as u64)
                .sum();
            sender.send(ResponseFragment::Usage(Usage::from_counts(
                Some(prompt_tokens),
                Some(completion_tokens),
                None,
            )));
            sender.send(ResponseFragment::Done);
        });

        Ok(stream)
    }
}

fn echo_reply(messages: &[Message]) -> String {
    let last_user = messages
        .iter()
        .rev()
        .find(|message| message.role == Role::User)
        .map(|message| message.content.trim())
        .unwrap_or_default();

    if last_user.is_empty() {
        "Mock transport is ready.".to_string()
    } else {
        format!("Mock reply to: {last_user}")
    }
}

/// Splits text after each space or newline, keeping the separator with its token.
fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut pending = String::new();
    for ch in text.chars() {
        pending.push(ch);
        if matches!(ch, ' ' | '\n') {
            tokens.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        tokens.push(pending);
    }
    tokens
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
