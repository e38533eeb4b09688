//! Turn engine.
//!
//! `run_turn` drives one user exchange: it appends the user message, streams
//! model responses, executes requested tool calls one at a time in request
//! order, and loops until the model answers without tool calls or the
//! iteration cap is reached. The session is the only state it mutates, and
//! only by appending fully assembled messages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use agent_provider::{
    AssembledResponse, CancelSignal, FragmentStream, Message, ModelRequest, ModelTransport,
    ResponseAssembler, ResponseFragment, StreamPoll, ToolCall, ToolDefinition, TransportError,
    Usage,
};
use session_store::{Session, SessionStore, SessionStoreError};
use tracing::{debug, info, warn};

use crate::tools::{
    action_label, ApprovalDecision, ApprovalPolicy, ApprovalRequest, Approver, DisplayOptions,
    ToolResult, ToolRuntime, WorkspaceConfig,
};

pub const DEFAULT_MAX_ITERATIONS: usize = 12;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const CAPPED_NOTICE: &str = "Stopped after too many tool-call loops. If you need more progress, re-run with a more specific instruction.";
pub const EMPTY_RESPONSE_NOTICE: &str = "The model returned an empty response. Please try again; if the issue persists, check the model configuration.";

const STREAM_POLL_INTERVAL: Duration = Duration::from_millis(25);

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Per-turn model settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub model: String,
    /// Longest allowed silence from the transport while a response streams.
    pub timeout: Duration,
    pub max_iterations: usize,
}

impl RunConfig {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Streaming,
    ToolPending,
    Approving,
    Executing,
    Completed,
    Capped,
    Failed,
}

impl TurnState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Capped | Self::Failed)
    }
}

/// Progress notification delivered while a turn runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent<'a> {
    StateChanged { from: TurnState, to: TurnState },
    TextDelta(&'a str),
    ToolStarted { call: &'a ToolCall, label: String },
    ToolFinished(&'a ToolResult),
}

/// Collaborators and run-scoped values for one turn.
pub struct TurnContext<'a> {
    pub transport: &'a dyn ModelTransport,
    pub tools: &'a mut ToolRuntime,
    pub workspace: &'a WorkspaceConfig,
    pub policy: ApprovalPolicy,
    pub approver: &'a mut dyn Approver,
    pub cancel: CancelSignal,
    /// Target of the end-of-turn autosave.
    pub store: Option<&'a SessionStore>,
    pub on_event: &'a mut dyn FnMut(TurnEvent<'_>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnOutcome {
    pub final_text: String,
    pub capped: bool,
    pub notice: Option<String>,
    /// Usage summed over every model call of the turn.
    pub usage: Usage,
    pub iterations: usize,
    pub model_calls: usize,
    pub autosaved: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Transport(TransportError),
    #[error("turn cancelled")]
    Cancelled,
    /// The turn finished but the autosave failed; the outcome is still valid.
    #[error("failed to autosave session: {source}")]
    Persist {
        outcome: Box<TurnOutcome>,
        #[source]
        source: SessionStoreError,
    },
}

impl From<TransportError> for TurnError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Cancelled => Self::Cancelled,
            other => Self::Transport(other),
        }
    }
}

/// Runs one user turn against `session`.
///
/// On `Transport` and `Cancelled` errors the session keeps every message
/// fully appended before the failure and nothing else; no autosave happens.
pub fn run_turn(
    session: &mut Session,
    input: &str,
    config: &RunConfig,
    ctx: &mut TurnContext<'_>,
) -> Result<TurnOutcome, TurnError> {
    let mut tracker = TurnTracker {
        state: TurnState::Idle,
        on_event: &mut *ctx.on_event,
    };
    info!(session = %session.name(), model = %config.model, "turn started");

    ctx.tools.set_display(DisplayOptions {
        truncate_lines: session.settings.truncate_lines,
        verbose: session.settings.verbose,
    });
    let definitions = ctx.tools.registry().definitions();
    session.messages.push(Message::user(input));

    let mut outcome = TurnOutcome::default();
    let max_iterations = config.max_iterations.max(1);

    let finished = loop {
        if outcome.iterations >= max_iterations {
            warn!(iterations = outcome.iterations, "iteration cap reached");
            outcome.capped = true;
            outcome.notice = Some(CAPPED_NOTICE.to_string());
            break TurnState::Capped;
        }
        outcome.iterations += 1;

        if let Err(error) = check_cancel(&ctx.cancel) {
            return Err(tracker.fail(error));
        }

        tracker.transition(TurnState::Streaming);
        outcome.model_calls += 1;
        let response = match request_response(session, config, ctx.transport, &ctx.cancel, &definitions, &mut tracker) {
            Ok(response) => response,
            Err(error) => return Err(tracker.fail(error)),
        };
        if let Some(usage) = response.usage {
            outcome.usage += usage;
        }

        if response.is_empty() {
            warn!(iteration = outcome.iterations, "model returned an empty response");
            outcome.notice = Some(EMPTY_RESPONSE_NOTICE.to_string());
            break TurnState::Completed;
        }

        let AssembledResponse {
            text, tool_calls, ..
        } = response;
        session
            .messages
            .push(Message::assistant(text.clone(), tool_calls.clone()));

        if tool_calls.is_empty() {
            outcome.final_text = text;
            break TurnState::Completed;
        }

        for call in &tool_calls {
            tracker.transition(TurnState::ToolPending);
            tracker.emit(TurnEvent::ToolStarted {
                call,
                label: action_label(&call.name, &call.arguments),
            });

            let needs_approval = !ctx.policy.auto_approve
                && ctx
                    .tools
                    .registry()
                    .lookup(&call.name)
                    .is_some_and(|spec| spec.mutating);
            if !needs_approval {
                tracker.transition(TurnState::Executing);
            }

            let mut approver = TrackedApprover {
                inner: &mut *ctx.approver,
                tracker: &mut tracker,
            };
            let result = ctx
                .tools
                .execute(call, ctx.workspace, &ctx.policy, &mut approver);

            // A result finished after an interrupt is discarded with the turn.
            if let Err(error) = check_cancel(&ctx.cancel) {
                return Err(tracker.fail(error));
            }

            tracker.emit(TurnEvent::ToolFinished(&result));
            session.messages.push(result.to_message());
        }
    };

    tracker.transition(finished);
    info!(
        iterations = outcome.iterations,
        model_calls = outcome.model_calls,
        capped = outcome.capped,
        total_tokens = outcome.usage.total_tokens,
        "turn finished"
    );

    if session.settings.autosave {
        if let Some(store) = ctx.store {
            if let Err(source) = store.save(session, None) {
                warn!(session = %session.name(), error = %source, "autosave failed");
                return Err(TurnError::Persist {
                    outcome: Box::new(outcome),
                    source,
                });
            }
            outcome.autosaved = true;
        }
    }

    Ok(outcome)
}

fn check_cancel(cancel: &CancelSignal) -> Result<(), TurnError> {
    if cancel.load(Ordering::Acquire) {
        Err(TurnError::Cancelled)
    } else {
        Ok(())
    }
}

fn request_response(
    session: &Session,
    config: &RunConfig,
    transport: &dyn ModelTransport,
    cancel: &CancelSignal,
    definitions: &[ToolDefinition],
    tracker: &mut TurnTracker<'_, '_>,
) -> Result<AssembledResponse, TurnError> {
    let run_id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
    let request = ModelRequest {
        run_id,
        model: config.model.clone(),
        messages: session.messages.clone(),
        tools: definitions.to_vec(),
        timeout: config.timeout,
    };
    debug!(run_id, messages = request.messages.len(), "requesting model response");

    let stream = transport.stream(request, CancelSignal::clone(cancel))?;
    consume_stream(&stream, config.timeout, cancel, tracker)
}

/// Reads `stream` until `Done`. Returning early drops the stream, which
/// closes the channel and stops the producer.
fn consume_stream(
    stream: &FragmentStream,
    idle_timeout: Duration,
    cancel: &CancelSignal,
    tracker: &mut TurnTracker<'_, '_>,
) -> Result<AssembledResponse, TurnError> {
    let mut assembler = ResponseAssembler::default();
    let mut last_activity = Instant::now();

    loop {
        check_cancel(cancel)?;

        match stream.poll(STREAM_POLL_INTERVAL) {
            StreamPoll::Fragment(fragment) => {
                last_activity = Instant::now();
                if let ResponseFragment::TextDelta { text } = &fragment {
                    tracker.emit(TurnEvent::TextDelta(text));
                }
                assembler.push(fragment);
                if assembler.is_done() {
                    return Ok(assembler.finish());
                }
            }
            StreamPoll::Failed(error) => return Err(error.into()),
            StreamPoll::Pending => {
                if last_activity.elapsed() >= idle_timeout {
                    return Err(TurnError::Transport(TransportError::Timeout(idle_timeout)));
                }
            }
            StreamPoll::Closed => {
                return Err(TurnError::Transport(TransportError::Stream(
                    "response stream closed before completion".to_string(),
                )));
            }
        }
    }
}

struct TurnTracker<'t, 'a> {
    state: TurnState,
    on_event: &'t mut (dyn FnMut(TurnEvent<'_>) + 'a),
}

impl TurnTracker<'_, '_> {
    fn transition(&mut self, to: TurnState) {
        let from = self.state;
        if from == to {
            return;
        }
        debug!(?from, ?to, "turn state changed");
        self.state = to;
        (self.on_event)(TurnEvent::StateChanged { from, to });
    }

    fn emit(&mut self, event: TurnEvent<'_>) {
        (self.on_event)(event);
    }

    fn fail(&mut self, error: TurnError) -> TurnError {
        match &error {
            TurnError::Cancelled => info!("turn cancelled"),
            other => warn!(error = %other, "turn failed"),
        }
        self.transition(TurnState::Failed);
        error
    }
}

/// Reports the approval gate as turn states around the real approver.
struct TrackedApprover<'r, 't, 'a> {
    inner: &'r mut dyn Approver,
    tracker: &'r mut TurnTracker<'t, 'a>,
}

impl Approver for TrackedApprover<'_, '_, '_> {
    fn decide(&mut self, request: &ApprovalRequest<'_>) -> ApprovalDecision {
        self.tracker.transition(TurnState::Approving);
        let decision = self.inner.decide(request);
        if decision.allows() {
            self.tracker.transition(TurnState::Executing);
        }
        decision
    }
}
