#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use agent_provider::{ToolCall, Usage};
use coding_agent::engine::{TurnEvent, TurnState};
use coding_agent::tools::{
    ApprovalDecision, ApprovalRequest, Approver, ToolArgs, ToolExecutor, ToolOutput,
    WorkspaceConfig,
};
use serde_json::Value;
use session_store::{Session, SessionSettings};

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall::new(id, name, arguments)
}

pub fn usage(prompt: u64, completion: u64) -> Usage {
    Usage::from_counts(Some(prompt), Some(completion), None)
}

pub fn workspace(dir: &tempfile::TempDir) -> WorkspaceConfig {
    WorkspaceConfig::new(dir.path()).expect("workspace root should be valid")
}

pub fn session_with(settings: SessionSettings) -> Session {
    let mut session = Session::new("test-session", "2024-01-01T00:00:00Z", settings);
    session.set_system_message("system");
    session
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Executor returning a canned output and counting invocations.
#[derive(Clone, Default)]
pub struct SpyExecutor {
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl SpyExecutor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> Vec<String> {
        lock_unpoisoned(&self.seen).clone()
    }
}

impl ToolExecutor for SpyExecutor {
    fn execute(&mut self, args: &ToolArgs, _workspace: &WorkspaceConfig) -> ToolOutput {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock_unpoisoned(&self.seen).push(args.action());
        ToolOutput::ok(format!("ran {}", args.action()))
    }
}

/// Approver replaying fixed answers and recording what it was asked.
pub struct ScriptedApprover {
    answers: Vec<ApprovalDecision>,
    pub asked: Vec<String>,
    pub previews: Vec<Option<String>>,
}

impl ScriptedApprover {
    pub fn new(answers: Vec<ApprovalDecision>) -> Self {
        Self {
            answers,
            asked: Vec::new(),
            previews: Vec::new(),
        }
    }

    pub fn reject_all() -> Self {
        Self::new(Vec::new())
    }
}

impl Approver for ScriptedApprover {
    fn decide(&mut self, request: &ApprovalRequest<'_>) -> ApprovalDecision {
        self.asked.push(request.action.clone());
        self.previews.push(request.preview.clone());
        if self.answers.is_empty() {
            ApprovalDecision::Rejected
        } else {
            self.answers.remove(0)
        }
    }
}

/// Owned copy of the turn events worth asserting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    State(TurnState, TurnState),
    Text(String),
    ToolStarted(String),
    ToolFinished(String),
}

#[derive(Default)]
pub struct EventLog {
    pub events: Vec<Recorded>,
}

impl EventLog {
    pub fn record(&mut self, event: TurnEvent<'_>) {
        let recorded = match event {
            TurnEvent::StateChanged { from, to } => Recorded::State(from, to),
            TurnEvent::TextDelta(text) => Recorded::Text(text.to_string()),
            TurnEvent::ToolStarted { label, .. } => Recorded::ToolStarted(label),
            TurnEvent::ToolFinished(result) => Recorded::ToolFinished(result.tool_name.clone()),
        };
        self.events.push(recorded);
    }

    pub fn states(&self) -> Vec<TurnState> {
        let mut states = Vec::new();
        for event in &self.events {
            if let Recorded::State(from, to) = event {
                if states.is_empty() {
                    states.push(*from);
                }
                states.push(*to);
            }
        }
        states
    }

    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                Recorded::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// `Write` sink whose contents stay readable after being handed off.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&lock_unpoisoned(&self.bytes)).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock_unpoisoned(&self.bytes).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
