//! Tool execution contract.
//!
//! `ToolRuntime::execute` turns one model-issued `ToolCall` into exactly one
//! `ToolResult`: name lookup, argument validation, approval gating for
//! mutating tools, handler invocation and output shaping. Every failure on
//! that path becomes a result with `ToolStatus::Error` or
//! `ToolStatus::Rejected`; nothing propagates past this boundary.

mod builtin;
mod patch;
mod preview;
mod registry;
mod web;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use agent_provider::{Message, ToolCall, ToolResultMeta, ToolStatus};
use tracing::{debug, info, warn};

pub use builtin::BuiltinToolExecutor;
pub use patch::{apply_unified_patch, parse_hunks, Hunk, PatchError};
pub use preview::{diff_preview, PREVIEW_MAX_LINES};
pub use registry::{
    action_label, ApplyPatchArgs, DeleteFileArgs, ListDirArgs, ReadFileArgs, RegistryError,
    SearchTextArgs, ShellArgs, ToolArgs, ToolKind, ToolRegistry, ToolSpec, ValidationError,
    WalkDirArgs, WebFetchArgs, WriteFileArgs, MAX_FETCH_TIMEOUT_SEC, MAX_SHELL_TIMEOUT_SEC,
    MIN_FETCH_CHARS,
};

/// Upper bound on model-facing tool output.
pub const MAX_OUTPUT_BYTES: usize = 16 * 1024;

pub const REJECTED_OUTPUT: &str = "Operation rejected";

/// Workspace boundary handed to every handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    root: PathBuf,
}

impl WorkspaceConfig {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, String> {
        let root = root.into();
        let canonical_root = root
            .canonicalize()
            .map_err(|err| format!("Failed to resolve workspace root {}: {err}", root.display()))?;

        if !canonical_root.is_dir() {
            return Err(format!(
                "Workspace root must be a directory: {}",
                canonical_root.display()
            ));
        }

        Ok(Self {
            root: canonical_root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `path` relative to the workspace root when it lies inside it.
    pub fn relative_display(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
            Ok(relative) => relative.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalPolicy {
    pub auto_approve: bool,
}

/// Pending mutating call awaiting a decision from the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest<'a> {
    pub call_id: &'a str,
    pub tool: ToolKind,
    /// One-line summary, e.g. `delete_file notes.txt`.
    pub action: String,
    /// Unified diff for file writes and patches.
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    AutoApproved,
    Rejected,
}

impl ApprovalDecision {
    #[must_use]
    pub fn allows(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

/// Source of approval decisions, typically an interactive prompt.
pub trait Approver {
    fn decide(&mut self, request: &ApprovalRequest<'_>) -> ApprovalDecision;
}

impl<F> Approver for F
where
    F: FnMut(&ApprovalRequest<'_>) -> ApprovalDecision,
{
    fn decide(&mut self, request: &ApprovalRequest<'_>) -> ApprovalDecision {
        self(request)
    }
}

/// Raw handler outcome before shaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub ok: bool,
    pub content: String,
    /// Compact display text used when verbose display is off.
    pub summary: Option<String>,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            ok: true,
            content: content.into(),
            summary: None,
        }
    }

    pub fn fail(content: impl Into<String>) -> Self {
        Self {
            ok: false,
            content: content.into(),
            summary: None,
        }
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// Handler seam behind the runtime.
pub trait ToolExecutor {
    fn execute(&mut self, args: &ToolArgs, workspace: &WorkspaceConfig) -> ToolOutput;

    /// Approval preview for `args`. An error rejects the call before approval
    /// is requested.
    fn preview(&self, _args: &ToolArgs, _workspace: &WorkspaceConfig) -> Result<Option<String>, String> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayOptions {
    pub truncate_lines: usize,
    pub verbose: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            truncate_lines: session_store::DEFAULT_TRUNCATE_LINES,
            verbose: false,
        }
    }
}

/// Line-limited display text.
///
/// `text` holds at most `truncate_lines` lines and reshaping it with the same
/// limit returns it unchanged. The indicator added by [`ShapedOutput::render`]
/// is not part of `text`, so rendered output is never fed back into shaping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapedOutput {
    pub text: String,
    pub truncated: bool,
    pub omitted_lines: usize,
}

impl ShapedOutput {
    /// Display text with the truncation indicator appended: the kept lines,
    /// a blank line and one indicator line.
    #[must_use]
    pub fn render(&self) -> String {
        if self.truncated {
            format!(
                "{}\n\n--- output truncated: {} more lines ---",
                self.text, self.omitted_lines
            )
        } else {
            self.text.clone()
        }
    }
}

/// Keeps the first `truncate_lines` lines of `text`; `0` disables shaping.
#[must_use]
pub fn shape_output(text: &str, truncate_lines: usize) -> ShapedOutput {
    let total = text.lines().count();
    if truncate_lines == 0 || total <= truncate_lines {
        return ShapedOutput {
            text: text.to_string(),
            truncated: false,
            omitted_lines: 0,
        };
    }

    ShapedOutput {
        text: text.lines().take(truncate_lines).collect::<Vec<_>>().join("\n"),
        truncated: true,
        omitted_lines: total - truncate_lines,
    }
}

/// Outcome of one tool call, appended to history as a tool message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub status: ToolStatus,
    /// Model-facing output, capped at `MAX_OUTPUT_BYTES`.
    pub output: String,
    pub display: ShapedOutput,
    pub elapsed: Duration,
}

impl ToolResult {
    #[must_use]
    pub fn to_message(&self) -> Message {
        Message::tool(
            ToolResultMeta {
                call_id: self.call_id.clone(),
                tool_name: self.tool_name.clone(),
                status: self.status,
                truncated: self.display.truncated,
                omitted_lines: self.display.omitted_lines,
                elapsed_ms: u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX),
            },
            self.output.clone(),
        )
    }
}

pub struct ToolRuntime {
    registry: ToolRegistry,
    executor: Box<dyn ToolExecutor>,
    display: DisplayOptions,
}

impl ToolRuntime {
    pub fn new(registry: ToolRegistry, executor: impl ToolExecutor + 'static) -> Self {
        Self {
            registry,
            executor: Box::new(executor),
            display: DisplayOptions::default(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn display(&self) -> DisplayOptions {
        self.display
    }

    pub fn set_display(&mut self, display: DisplayOptions) {
        self.display = display;
    }

    pub fn execute(
        &mut self,
        call: &ToolCall,
        workspace: &WorkspaceConfig,
        policy: &ApprovalPolicy,
        approver: &mut dyn Approver,
    ) -> ToolResult {
        let started = Instant::now();

        let Some(spec) = self.registry.lookup(&call.name) else {
            warn!(tool = %call.name, "unknown tool requested");
            return self.finish(call, started, ToolStatus::Error, ToolOutput::fail(format!("unknown tool: {}", call.name)));
        };

        let args = match spec.kind.parse_args(&call.arguments) {
            Ok(args) => args,
            Err(error) => {
                debug!(tool = %call.name, %error, "rejected tool arguments");
                return self.finish(call, started, ToolStatus::Error, ToolOutput::fail(error.to_string()));
            }
        };

        if spec.mutating {
            let preview = match self.executor.preview(&args, workspace) {
                Ok(preview) => preview,
                Err(error) => {
                    return self.finish(call, started, ToolStatus::Error, ToolOutput::fail(error));
                }
            };

            let decision = if policy.auto_approve {
                ApprovalDecision::AutoApproved
            } else {
                approver.decide(&ApprovalRequest {
                    call_id: &call.id,
                    tool: spec.kind,
                    action: args.action(),
                    preview,
                })
            };
            debug!(tool = %call.name, ?decision, "approval decided");

            if !decision.allows() {
                info!(tool = %call.name, call_id = %call.id, "tool call rejected");
                return self.finish(call, started, ToolStatus::Rejected, ToolOutput::fail(REJECTED_OUTPUT));
            }
        }

        let executor = &mut self.executor;
        let output = match catch_unwind(AssertUnwindSafe(|| executor.execute(&args, workspace))) {
            Ok(output) => output,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|message| (*message).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(tool = %call.name, %message, "tool handler panicked");
                ToolOutput::fail(format!("tool handler failed: {message}"))
            }
        };

        let status = if output.ok {
            ToolStatus::Ok
        } else {
            ToolStatus::Error
        };
        self.finish(call, started, status, output)
    }

    fn finish(
        &self,
        call: &ToolCall,
        started: Instant,
        status: ToolStatus,
        output: ToolOutput,
    ) -> ToolResult {
        let display_source = match (&output.summary, self.display.verbose) {
            (Some(summary), false) => summary.as_str(),
            _ => output.content.as_str(),
        };
        let display = shape_output(display_source, self.display.truncate_lines);
        let elapsed = started.elapsed();
        debug!(tool = %call.name, status = status.as_str(), ?elapsed, "tool call finished");

        ToolResult {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            status,
            output: truncate_to_byte_limit(output.content, MAX_OUTPUT_BYTES),
            display,
            elapsed,
        }
    }
}

fn truncate_to_byte_limit(content: String, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content;
    }

    let mut cutoff = max_bytes.min(content.len());
    while cutoff > 0 && !content.is_char_boundary(cutoff) {
        cutoff -= 1;
    }

    let mut truncated = content[..cutoff].to_string();
    truncated.push_str("\n[truncated]");
    truncated
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn shaping_keeps_min_of_limit_and_line_count() {
        let text = "1\n2\n3\n4\n5";
        let shaped = shape_output(text, 3);
        assert_eq!(shaped.text, "1\n2\n3");
        assert_eq!(shaped.text.lines().count(), 3);
        assert!(shaped.truncated);
        assert_eq!(shaped.omitted_lines, 2);

        let short = shape_output(text, 10);
        assert_eq!(short.text, text);
        assert!(!short.truncated);
    }

    #[test]
    fn zero_limit_passes_output_through() {
        let text: String = (0..50).map(|index| format!("{index}\n")).collect();
        let shaped = shape_output(&text, 0);
        assert_eq!(shaped.text, text);
        assert_eq!(shaped.omitted_lines, 0);
    }

    #[test]
    fn reshaping_kept_text_is_idempotent() {
        let text: String = (0..30).map(|index| format!("line {index}\n")).collect();
        for limit in [1, 5, 29, 30, 31] {
            let once = shape_output(&text, limit);
            let twice = shape_output(&once.text, limit);
            let expected = ShapedOutput {
                text: once.text.clone(),
                truncated: false,
                omitted_lines: 0,
            };
            assert_eq!(twice, expected, "limit {limit}");
        }
    }

    #[test]
    fn rendered_output_is_kept_lines_plus_indicator() {
        let text: String = (0..30).map(|index| format!("line {index}\n")).collect();
        for limit in [1, 5, 29, 30, 31] {
            let shaped = shape_output(&text, limit);
            let rendered = shaped.render();
            let kept = limit.min(30);
            let content: Vec<&str> = rendered.lines().take_while(|line| !line.is_empty()).collect();
            assert_eq!(content.len(), kept, "limit {limit}");
            assert!(rendered.starts_with(&shaped.text), "limit {limit}");
            if shaped.truncated {
                assert_eq!(rendered.lines().count(), kept + 2, "limit {limit}");
                assert_eq!(
                    rendered.lines().last(),
                    Some(format!("--- output truncated: {} more lines ---", 30 - kept).as_str())
                );
            } else {
                assert_eq!(rendered, text, "limit {limit}");
            }
        }
    }

    #[test]
    fn render_appends_indicator_only_when_truncated() {
        let shaped = shape_output("a\nb\nc", 1);
        assert_eq!(shaped.render(), "a\n\n--- output truncated: 2 more lines ---");
        assert_eq!(shape_output("a", 1).render(), "a");
    }

    #[test]
    fn byte_limit_respects_char_boundaries() {
        let text = "é".repeat(10);
        let truncated = truncate_to_byte_limit(text, 5);
        assert_eq!(truncated, "éé\n[truncated]");
    }

    #[test]
    fn tool_message_carries_result_linkage() {
        let result = ToolResult {
            call_id: "call_1".to_string(),
            tool_name: "read_file".to_string(),
            status: ToolStatus::Ok,
            output: "hello".to_string(),
            display: shape_output("hello", 10),
            elapsed: Duration::from_millis(12),
        };
        let message = result.to_message();
        assert_eq!(message.tool_call_id(), Some("call_1"));
        assert_eq!(message.content, "hello");
        assert_eq!(message.tool_result.map(|meta| meta.elapsed_ms), Some(12));
    }
}
