//! Line-oriented front end.
//!
//! Reads prompts and commands from an input stream, renders streamed
//! assistant text and tool activity to a [`Console`], and maps every
//! session command onto the [`SessionStore`].

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use agent_provider::{CancelSignal, ModelTransport, ToolStatus, Usage};
use session_store::{Session, SessionStore, SessionStoreError};
use tracing::{debug, warn};

use crate::commands::{is_paste_terminator, parse_bool, parse_command, SlashCommand};
use crate::config::{resolve_workspace, AgentConfig};
use crate::engine::{run_turn, TurnContext, TurnError, TurnEvent, TurnOutcome};
use crate::prompts::system_message;
use crate::tools::{
    ApprovalDecision, ApprovalPolicy, ApprovalRequest, Approver, BuiltinToolExecutor, ToolKind,
    ToolRegistry, ToolRuntime, WorkspaceConfig,
};

const PROMPT: &str = "[user]: ";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const ANSWER_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Shared, line-buffered output sink.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(out))),
        }
    }

    pub fn write(&self, text: &str) {
        let mut out = lock_unpoisoned(&self.out);
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    pub fn line(&self, text: &str) {
        self.write(&format!("{text}\n"));
    }

    pub fn error(&self, text: impl std::fmt::Display) {
        self.line(&format!("[error] {text}"));
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReplError {
    #[error("invalid workspace: {0}")]
    Workspace(String),
    #[error(transparent)]
    Store(#[from] SessionStoreError),
    #[error("failed to read input: {0}")]
    Input(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Repl {
    config: AgentConfig,
    store: SessionStore,
    session: Session,
    transport: Box<dyn ModelTransport>,
    tools: ToolRuntime,
    workspace: WorkspaceConfig,
    cancel: CancelSignal,
    turn_active: Arc<AtomicBool>,
    input: LineInput,
    interrupts: InterruptNotifier,
    console: Console,
}

impl Repl {
    /// Opens the startup session and prepares the tool runtime.
    pub fn new(
        config: AgentConfig,
        store: SessionStore,
        transport: Box<dyn ModelTransport>,
        input: Box<dyn BufRead + Send>,
        console: Console,
    ) -> Result<Self, ReplError> {
        let workspace = WorkspaceConfig::new(&config.workspace).map_err(ReplError::Workspace)?;
        let cancel = CancelSignal::default();
        let tools = ToolRuntime::new(
            ToolRegistry::builtin(),
            BuiltinToolExecutor::new().with_cancel(CancelSignal::clone(&cancel)),
        );

        let mut session =
            store.autoload_on_startup(config.session.as_deref(), config.session_settings())?;
        session.settings = config.session_settings();

        attach_workspace(&workspace, &mut session);
        let (input, interrupts) = LineInput::spawn(input);

        Ok(Self {
            config,
            store,
            session,
            transport,
            tools,
            workspace,
            cancel,
            turn_active: Arc::new(AtomicBool::new(false)),
            input,
            interrupts,
            console,
        })
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn workspace(&self) -> &WorkspaceConfig {
        &self.workspace
    }

    #[must_use]
    pub fn auto_approve(&self) -> bool {
        self.config.auto_approve
    }

    /// Cancel flag raised by the interrupt handler during a turn.
    #[must_use]
    pub fn cancel_signal(&self) -> CancelSignal {
        CancelSignal::clone(&self.cancel)
    }

    /// True while a turn is running.
    #[must_use]
    pub fn turn_active(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.turn_active)
    }

    /// Ends a pending prompt read, as Ctrl-C at the prompt does.
    #[must_use]
    pub fn interrupt_notifier(&self) -> InterruptNotifier {
        self.interrupts.clone()
    }

    pub fn print_banner(&self) {
        self.print_config("coding-agent");
        self.console
            .line("Type your message and press Enter. /help lists commands.");
        self.console.line("");
    }

    /// Runs until `/quit`, end of input or an interrupt at the prompt.
    pub fn run(&mut self) -> Result<(), ReplError> {
        loop {
            self.console.write(PROMPT);
            match self.input.next()? {
                Input::Line(line) => {
                    if self.handle_line(&line) == Flow::Quit {
                        return Ok(());
                    }
                }
                Input::Interrupted | Input::Closed => {
                    self.console.line("");
                    return Ok(());
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) -> Flow {
        if line.trim().is_empty() {
            return Flow::Continue;
        }

        match parse_command(line) {
            None => {
                self.submit(line.trim_end());
                Flow::Continue
            }
            Some(Ok(command)) => self.execute(command),
            Some(Err(error)) => {
                self.console.error(error);
                Flow::Continue
            }
        }
    }

    fn execute(&mut self, command: SlashCommand) -> Flow {
        debug!(?command, "repl command");
        match command {
            SlashCommand::Quit => return Flow::Quit,
            SlashCommand::Help => self.print_help(),
            SlashCommand::Tools => self.print_tools(),
            SlashCommand::Config => self.print_config("Current Config"),
            SlashCommand::Clear => {
                self.console.write(CLEAR_SCREEN);
                self.print_banner();
            }
            SlashCommand::Paste => self.paste(),
            SlashCommand::Reset => self.reset(),
            SlashCommand::Cwd(path) => self.change_workspace(&path),
            SlashCommand::Model(model) => {
                self.console.line(&format!("Model set: {model}"));
                self.session.settings.model = model;
            }
            SlashCommand::Approve(enabled) => {
                self.config.auto_approve = enabled;
                self.console
                    .line(&format!("Auto-approve: {}", on_off(enabled)));
            }
            SlashCommand::Truncate(None) => self.console.line(&format!(
                "truncate_lines = {} (0 = no truncation)",
                self.session.settings.truncate_lines
            )),
            SlashCommand::Truncate(Some(lines)) => {
                self.session.settings.truncate_lines = lines;
                self.config.truncate_lines = lines;
                if lines == 0 {
                    self.console.line("Tool output truncation: OFF");
                } else {
                    self.console
                        .line(&format!("Tool output truncation: {lines} lines"));
                }
            }
            SlashCommand::Verbose(None) => self.console.line(&format!(
                "verbose = {} (usage: /verbose on|off)",
                self.session.settings.verbose
            )),
            SlashCommand::Verbose(Some(enabled)) => {
                self.session.settings.verbose = enabled;
                self.config.verbose = enabled;
                self.console.line(if enabled {
                    "Verbose mode: ON (show full tool output)"
                } else {
                    "Verbose mode: OFF (show compact tool output)"
                });
            }
            SlashCommand::Session => self.show_session(),
            SlashCommand::Sessions => self.list_sessions(),
            SlashCommand::NewSession(name) => self.new_session(name.as_deref()),
            SlashCommand::Load(name) => self.load(&name),
            SlashCommand::Save(name) => self.save(name.as_deref()),
            SlashCommand::Rename { old, new } => self.rename(&old, &new),
            SlashCommand::Delete(name) => self.delete(&name),
            SlashCommand::Autosave(None) => self.console.line(&format!(
                "autosave = {} (usage: /autosave on|off)",
                self.session.settings.autosave
            )),
            SlashCommand::Autosave(Some(enabled)) => {
                self.session.settings.autosave = enabled;
                self.config.autosave = enabled;
                self.console.line(&format!("Autosave: {}", on_off(enabled)));
                if enabled {
                    self.persist();
                }
            }
        }
        self.console.line("");
        Flow::Continue
    }

    /// Runs one model turn for `input`.
    pub fn submit(&mut self, input: &str) -> Option<TurnOutcome> {
        self.cancel.store(false, Ordering::Release);
        self.turn_active.store(true, Ordering::Release);
        self.console.line("");

        let console = self.console.clone();
        let mut streaming = false;
        let mut on_event = |event: TurnEvent<'_>| render_event(&console, &mut streaming, event);
        let mut approver = PromptApprover {
            input: &mut self.input,
            console: self.console.clone(),
            cancel: CancelSignal::clone(&self.cancel),
        };
        let run_config = self.config.run_config(&self.session.settings.model);
        let mut ctx = TurnContext {
            transport: self.transport.as_ref(),
            tools: &mut self.tools,
            workspace: &self.workspace,
            policy: ApprovalPolicy {
                auto_approve: self.config.auto_approve,
            },
            approver: &mut approver,
            cancel: CancelSignal::clone(&self.cancel),
            store: Some(&self.store),
            on_event: &mut on_event,
        };

        let result = run_turn(&mut self.session, input, &run_config, &mut ctx);
        self.turn_active.store(false, Ordering::Release);
        self.cancel.store(false, Ordering::Release);

        match result {
            Ok(outcome) => {
                self.finish_turn(&outcome);
                Some(outcome)
            }
            Err(TurnError::Persist { outcome, source }) => {
                self.finish_turn(&outcome);
                self.console.error(format!("autosave failed: {source}"));
                Some(*outcome)
            }
            Err(TurnError::Cancelled) => {
                self.console.line("\n[interrupted]");
                self.console.line("");
                None
            }
            Err(TurnError::Transport(error)) => {
                self.console.line("");
                self.console.error(error.friendly_message());
                self.console.line("");
                None
            }
        }
    }

    fn finish_turn(&self, outcome: &TurnOutcome) {
        self.console.line("");
        if let Some(notice) = &outcome.notice {
            self.console.line(notice);
        }
        let usage = format_usage(&outcome.usage);
        if usage.is_empty() {
            self.console.line(&format!("--- {} ---", self.session.name()));
        } else {
            self.console
                .line(&format!("--- {} ({usage}) ---", self.session.name()));
        }
        self.console.line("");
    }

    fn paste(&mut self) {
        self.console
            .line("Paste mode: enter multi-line input. End with /end");
        let mut lines = Vec::new();
        loop {
            match self.input.next() {
                Ok(Input::Line(line)) if is_paste_terminator(&line) => break,
                Ok(Input::Line(line)) => lines.push(line),
                Ok(Input::Closed) => break,
                Ok(Input::Interrupted) => {
                    self.console.line("");
                    return;
                }
                Err(error) => {
                    self.console.error(error);
                    return;
                }
            }
        }

        let pasted = lines.join("\n");
        let pasted = pasted.trim();
        if !pasted.is_empty() {
            self.submit(pasted);
        }
    }

    fn reset(&mut self) {
        self.session.reset();
        self.session
            .set_system_message(system_message(self.workspace.root()));
        self.console.line("Session reset. Starting fresh.");
        self.autosave();
    }

    fn change_workspace(&mut self, raw: &str) {
        let resolved = match resolve_workspace(self.workspace.root(), Path::new(raw)) {
            Ok(path) => path,
            Err(error) => {
                self.console.error(error);
                return;
            }
        };
        let workspace = match WorkspaceConfig::new(&resolved) {
            Ok(workspace) => workspace,
            Err(error) => {
                self.console.error(error);
                return;
            }
        };

        self.console
            .line(&format!("Workspace changed: {}", workspace.root().display()));
        self.config.workspace = workspace.root().to_path_buf();
        self.workspace = workspace;
        attach_workspace(&self.workspace, &mut self.session);
    }

    fn show_session(&self) {
        let file = self
            .store
            .root()
            .join(session_store::session_file_name(self.session.name()));
        self.console.line("Current Session");
        for (key, value) in [
            ("session", self.session.name().to_string()),
            ("autosave", self.session.settings.autosave.to_string()),
            ("sessions_dir", self.store.root().display().to_string()),
            ("file", file.display().to_string()),
            ("messages", self.session.messages.len().to_string()),
        ] {
            self.console.line(&format!("  {key:<13}: {value}"));
        }
    }

    fn list_sessions(&self) {
        let sessions = match self.store.list_all() {
            Ok(sessions) => sessions,
            Err(error) => {
                self.console.error(error);
                return;
            }
        };
        if sessions.is_empty() {
            self.console.line("(no sessions yet)");
            return;
        }

        self.console.line("Sessions");
        for summary in sessions {
            let marker = if summary.name == self.session.name() {
                '*'
            } else {
                '-'
            };
            self.console.line(&format!(
                "{marker} {}  (updated {}, {} messages)",
                summary.name, summary.updated_at, summary.message_count
            ));
        }
    }

    fn new_session(&mut self, name: Option<&str>) {
        match self.store.create(name, self.session.settings.clone()) {
            Ok(mut session) => {
                attach_workspace(&self.workspace, &mut session);
                self.console
                    .line(&format!("New session: {}", session.name()));
                self.session = session;
                self.autosave();
            }
            Err(error) => self.console.error(error),
        }
    }

    fn load(&mut self, name: &str) {
        match self.store.load(name) {
            Ok(mut session) => {
                session.settings = self.session.settings.clone();
                attach_workspace(&self.workspace, &mut session);
                self.console
                    .line(&format!("Loaded session: {}", session.name()));
                self.session = session;
            }
            Err(error) => self.console.error(error),
        }
    }

    fn save(&mut self, name: Option<&str>) {
        match self.store.save(&mut self.session, name) {
            Ok(()) => self
                .console
                .line(&format!("Saved session: {}", self.session.name())),
            Err(SessionStoreError::AlreadyExists { name }) => self.console.error(format!(
                "Session already exists: {name} (choose a new name)"
            )),
            Err(error) => self.console.error(error),
        }
    }

    fn rename(&mut self, old: &str, new: &str) {
        match self.store.rename(old, new, &mut self.session) {
            Ok(renamed) => self
                .console
                .line(&format!("Renamed session: {old} -> {renamed}")),
            Err(error) => self.console.error(error),
        }
    }

    fn delete(&mut self, name: &str) {
        match self.store.delete(name, &mut self.session) {
            Ok(replaced) => {
                self.console.line(&format!("Deleted session: {name}"));
                if replaced {
                    attach_workspace(&self.workspace, &mut self.session);
                    self.console.line(&format!(
                        "Switched to new session: {}",
                        self.session.name()
                    ));
                    self.autosave();
                }
            }
            Err(error) => self.console.error(error),
        }
    }

    fn print_help(&self) {
        let sections: [(&str, &[(&str, &str)]); 3] = [
            (
                "Core",
                &[
                    ("/help", "show help"),
                    ("/tools", "list available tools"),
                    ("/config", "show current config"),
                    ("/clear", "clear screen"),
                    ("/paste", "multi-line prompt (end with /end)"),
                    ("/reset", "reset conversation context (same session)"),
                    ("/exit or /quit", "quit"),
                ],
            ),
            (
                "Workspace & Behavior",
                &[
                    ("/cwd <path>", "change workspace"),
                    ("/model <name>", "change model"),
                    ("/approve on|off", "toggle approvals"),
                    ("/truncate <n>", "tool output line limit (0 = no truncation)"),
                    ("/verbose on|off", "toggle verbose tool output"),
                ],
            ),
            (
                "Sessions",
                &[
                    ("/session", "show current session info"),
                    ("/sessions", "list sessions"),
                    ("/new-session [name]", "create & switch to a new session"),
                    ("/load <name>", "load a session"),
                    ("/save [name]", "save current session (optionally as new name)"),
                    ("/rename <old> <new>", "rename a session"),
                    ("/delete <name>", "delete a session"),
                    ("/autosave on|off", "toggle autosave to disk"),
                ],
            ),
        ];

        for (title, commands) in sections {
            self.console.line(&format!("-- {title} --"));
            for (command, description) in commands {
                self.console.line(&format!("  {command:<22} {description}"));
            }
        }
        self.console
            .line("Core commands also work without the leading slash.");
    }

    fn print_tools(&self) {
        self.console.line("Available Tools");
        for spec in self.tools.registry().specs() {
            let marker = if spec.mutating { " (needs approval)" } else { "" };
            self.console.line(&format!(
                "  {:<12} {}{marker}",
                spec.kind.name(),
                spec.kind.description()
            ));
        }
    }

    fn print_config(&self, title: &str) {
        let settings = &self.session.settings;
        let rows = [
            ("cwd", self.workspace.root().display().to_string()),
            ("model", settings.model.clone()),
            ("provider", self.config.provider.as_str().to_string()),
            ("auto_approve", self.config.auto_approve.to_string()),
            (
                "base_url",
                self.config.base_url.clone().unwrap_or_else(|| "(none)".to_string()),
            ),
            ("timeout", format!("{}s", self.config.request_timeout.as_secs())),
            (
                "api_key",
                if self.config.api_key.is_some() { "(set)" } else { "(missing)" }.to_string(),
            ),
            ("session", self.session.name().to_string()),
            ("autosave", settings.autosave.to_string()),
            ("sessions_dir", self.store.root().display().to_string()),
            (
                "truncate_lines",
                format!("{} (0 = no truncation)", settings.truncate_lines),
            ),
            ("verbose", settings.verbose.to_string()),
            ("max_iterations", self.config.max_iterations.to_string()),
        ];

        self.console.line(title);
        for (key, value) in rows {
            self.console.line(&format!("  {key:<16}: {value}"));
        }
    }

    fn autosave(&mut self) {
        if self.session.settings.autosave {
            self.persist();
        }
    }

    fn persist(&mut self) {
        if let Err(error) = self.store.save(&mut self.session, None) {
            warn!(session = %self.session.name(), %error, "session save failed");
            self.console.error(format!("failed to save session: {error}"));
        }
    }
}

/// Asks the user on the console for each mutating call.
struct PromptApprover<'a> {
    input: &'a mut LineInput,
    console: Console,
    cancel: CancelSignal,
}

impl Approver for PromptApprover<'_> {
    fn decide(&mut self, request: &ApprovalRequest<'_>) -> ApprovalDecision {
        if let Some(preview) = &request.preview {
            self.console.line(preview);
        }
        let question = match request.tool {
            ToolKind::Shell => format!("Run `{}`?", request.action),
            _ => format!("Approve {}?", request.action),
        };
        self.console.write(&format!("{question} [y/N]: "));

        match self.input.next_unless_cancelled(&self.cancel) {
            Ok(Input::Line(answer)) if parse_bool(&answer) == Some(true) => {
                ApprovalDecision::Approved
            }
            Ok(_) => ApprovalDecision::Rejected,
            Err(error) => {
                warn!(%error, "failed to read approval answer");
                ApprovalDecision::Rejected
            }
        }
    }
}

#[derive(Debug)]
enum InputEvent {
    Line(String),
    Interrupt,
    Failed(io::Error),
    Closed,
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Line(String),
    Interrupted,
    Closed,
}

/// Wakes the REPL out of a blocked prompt read.
#[derive(Debug, Clone)]
pub struct InterruptNotifier {
    events: Sender<InputEvent>,
}

impl InterruptNotifier {
    pub fn notify(&self) {
        let _ = self.events.send(InputEvent::Interrupt);
    }
}

/// Lines read on a background thread, merged with prompt interrupts.
struct LineInput {
    events: Receiver<InputEvent>,
    closed: bool,
}

impl LineInput {
    fn spawn(mut source: Box<dyn BufRead + Send>) -> (Self, InterruptNotifier) {
        let (sender, events) = mpsc::channel();
        let reader = sender.clone();
        thread::spawn(move || loop {
            let event = match read_line(&mut *source) {
                Ok(Some(line)) => InputEvent::Line(line),
                Ok(None) => InputEvent::Closed,
                Err(error) => InputEvent::Failed(error),
            };
            let last = !matches!(event, InputEvent::Line(_));
            if reader.send(event).is_err() || last {
                return;
            }
        });

        (
            Self {
                events,
                closed: false,
            },
            InterruptNotifier { events: sender },
        )
    }

    fn next(&mut self) -> io::Result<Input> {
        if self.closed {
            return Ok(Input::Closed);
        }
        match self.events.recv() {
            Ok(event) => self.accept(event),
            Err(_) => self.accept(InputEvent::Closed),
        }
    }

    /// Like [`LineInput::next`], but gives up once `cancel` is raised.
    fn next_unless_cancelled(&mut self, cancel: &CancelSignal) -> io::Result<Input> {
        if self.closed {
            return Ok(Input::Closed);
        }
        loop {
            if cancel.load(Ordering::Acquire) {
                return Ok(Input::Interrupted);
            }
            match self.events.recv_timeout(ANSWER_POLL_INTERVAL) {
                Ok(event) => return self.accept(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return self.accept(InputEvent::Closed),
            }
        }
    }

    fn accept(&mut self, event: InputEvent) -> io::Result<Input> {
        match event {
            InputEvent::Line(line) => Ok(Input::Line(line)),
            InputEvent::Interrupt => Ok(Input::Interrupted),
            InputEvent::Failed(error) => {
                self.closed = true;
                Err(error)
            }
            InputEvent::Closed => {
                self.closed = true;
                Ok(Input::Closed)
            }
        }
    }
}

/// Points `session` at `workspace` and refreshes its system message.
fn attach_workspace(workspace: &WorkspaceConfig, session: &mut Session) {
    session.workspace = Some(workspace.root().display().to_string());
    session.set_system_message(system_message(workspace.root()));
}

fn render_event(console: &Console, streaming: &mut bool, event: TurnEvent<'_>) {
    match event {
        TurnEvent::TextDelta(text) => {
            *streaming = true;
            console.write(text);
        }
        TurnEvent::ToolStarted { label, .. } => {
            if std::mem::take(streaming) {
                console.line("");
            }
            console.line(&format!("[tool] {label}"));
        }
        TurnEvent::ToolFinished(result) => {
            let status = match result.status {
                ToolStatus::Ok => "ok",
                ToolStatus::Rejected => "rejected",
                ToolStatus::Error => "error",
            };
            console.line(&format!(
                "[tool] {} {status} ({} ms)",
                result.tool_name,
                result.elapsed.as_millis()
            ));
            let rendered = result.display.render();
            for line in rendered.lines() {
                console.line(&format!("  {line}"));
            }
            console.line("");
        }
        TurnEvent::StateChanged { .. } => {}
    }
}

fn format_usage(usage: &Usage) -> String {
    if usage.total_tokens == 0 {
        return String::new();
    }
    format!(
        "prompt {} | completion {} | total {}",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    )
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}

fn read_line(input: &mut dyn BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    while line.ends_with(['\n', '\r']) {
        line.pop();
    }
    Ok(Some(line))
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Keeps the Ctrl-C handler thread alive.
///
/// During a turn an interrupt raises the cancel flag; at the prompt it ends
/// the REPL loop.
pub struct InterruptGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<JoinHandle<()>>,
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

pub fn install_interrupt_handler(
    cancel: CancelSignal,
    turn_active: Arc<AtomicBool>,
    prompt: InterruptNotifier,
) -> io::Result<InterruptGuard> {
    let mut signals = signal_hook::iterator::Signals::new([signal_hook::consts::SIGINT])?;
    let handle = signals.handle();
    let thread = thread::spawn(move || {
        for _ in signals.forever() {
            if turn_active.load(Ordering::Acquire) {
                cancel.store(true, Ordering::Release);
            } else {
                prompt.notify();
            }
        }
    });

    Ok(InterruptGuard {
        handle,
        thread: Some(thread),
    })
}
