use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use agent_provider::CancelSignal;
use regex::RegexBuilder;
use wait_timeout::ChildExt;

use super::patch::apply_unified_patch;
use super::preview::diff_preview;
use super::registry::{
    ApplyPatchArgs, DeleteFileArgs, ListDirArgs, ReadFileArgs, SearchTextArgs, ShellArgs, ToolArgs,
    WalkDirArgs, WebFetchArgs, WriteFileArgs,
};
use super::web::fetch_page;
use super::{ToolExecutor, ToolOutput, WorkspaceConfig};

const DEFAULT_SHELL_TIMEOUT_SEC: u64 = 30;
const SHELL_POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_READ_MAX_BYTES: usize = 200 * 1024;
const SEARCH_MAX_FILE_BYTES: u64 = 400_000;
const SNIPPET_MAX_CHARS: usize = 300;

const LIST_SUMMARY_ITEMS: usize = 50;
const WALK_SUMMARY_ITEMS: usize = 60;
const SEARCH_SUMMARY_ITEMS: usize = 25;
const STDOUT_SUMMARY_LINES: usize = 30;
const STDERR_SUMMARY_LINES: usize = 20;
const FETCH_SUMMARY_LINES: usize = 12;

/// Handlers for the built-in tool set. Every path argument is resolved
/// against the workspace root and rejected when it escapes it.
#[derive(Debug, Clone)]
pub struct BuiltinToolExecutor {
    default_shell_timeout_sec: u64,
    read_max_bytes: usize,
    cancel: Option<CancelSignal>,
}

impl Default for BuiltinToolExecutor {
    fn default() -> Self {
        Self {
            default_shell_timeout_sec: DEFAULT_SHELL_TIMEOUT_SEC,
            read_max_bytes: DEFAULT_READ_MAX_BYTES,
            cancel: None,
        }
    }
}

impl BuiltinToolExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shell commands are killed once `cancel` is raised.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn with_default_shell_timeout(mut self, seconds: u64) -> Self {
        self.default_shell_timeout_sec = seconds.max(1);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|cancel| cancel.load(Ordering::Acquire))
    }

    fn execute_list_dir(&self, workspace: &WorkspaceConfig, args: &ListDirArgs) -> ToolOutput {
        let dir = match resolve_existing_path(workspace, &args.path) {
            Ok(path) => path,
            Err(error) => return ToolOutput::fail(error),
        };
        if !dir.is_dir() {
            return ToolOutput::fail(format!("Not a directory: {}", args.path));
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) => {
                return ToolOutput::fail(format!(
                    "Failed to list directory {}: {error}",
                    dir.display()
                ));
            }
        };

        let mut items: Vec<(String, bool, Option<u64>)> = entries
            .filter_map(Result::ok)
            .map(|entry| {
                let is_dir = entry.file_type().is_ok_and(|kind| kind.is_dir());
                let size = entry.metadata().ok().map(|metadata| metadata.len());
                (entry.file_name().to_string_lossy().to_string(), is_dir, size)
            })
            .collect();
        items.sort_by(|left, right| {
            right
                .1
                .cmp(&left.1)
                .then_with(|| left.0.to_lowercase().cmp(&right.0.to_lowercase()))
        });

        let label = workspace.relative_display(&dir);
        if items.is_empty() {
            return ToolOutput::ok(format!("{label}: (empty directory)")).with_summary("(empty)");
        }

        let mut lines = vec![format!("{label}: {} entries", items.len())];
        let mut names = Vec::with_capacity(items.len());
        for (name, is_dir, size) in &items {
            if *is_dir {
                lines.push(format!("dir  {name}/"));
                names.push(format!("{name}/"));
            } else {
                let size = size.map_or_else(|| "?".to_string(), |size| size.to_string());
                lines.push(format!("file {name} ({size} bytes)"));
                names.push(name.clone());
            }
        }

        ToolOutput::ok(lines.join("\n")).with_summary(bullet_list(&names, LIST_SUMMARY_ITEMS))
    }

    fn execute_walk_dir(&self, workspace: &WorkspaceConfig, args: &WalkDirArgs) -> ToolOutput {
        let root = match resolve_existing_path(workspace, &args.path) {
            Ok(path) => path,
            Err(error) => return ToolOutput::fail(error),
        };
        if !root.is_dir() {
            return ToolOutput::fail(format!("Not a directory: {}", args.path));
        }

        let mut entries = Vec::new();
        let truncated = walk(
            workspace,
            &root,
            0,
            args.max_depth,
            args.max_files,
            &mut entries,
        );

        let mut summary = bullet_list(&entries, WALK_SUMMARY_ITEMS);
        let mut content = entries.join("\n");
        if truncated {
            content.push_str(&format!("\n[truncated at max_files={}]", args.max_files));
            summary.push_str("\n(note: walk_dir results truncated by tool limits)");
        }

        ToolOutput::ok(content).with_summary(summary)
    }

    fn execute_read_file(&self, workspace: &WorkspaceConfig, args: &ReadFileArgs) -> ToolOutput {
        let resolved = match resolve_existing_path(workspace, &args.path) {
            Ok(path) => path,
            Err(error) => return ToolOutput::fail(error),
        };
        if resolved.is_dir() {
            return ToolOutput::fail(format!("Is a directory: {}", args.path));
        }

        let bytes = match fs::read(&resolved) {
            Ok(bytes) => bytes,
            Err(error) => {
                return ToolOutput::fail(format!(
                    "Failed to read file {}: {error}",
                    resolved.display()
                ));
            }
        };

        if bytes.len() > self.read_max_bytes {
            return ToolOutput::fail(format!(
                "File exceeds max read size ({} bytes > {} bytes)",
                bytes.len(),
                self.read_max_bytes
            ));
        }

        let byte_count = bytes.len();
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => return ToolOutput::fail("File is not valid UTF-8 text".to_string()),
        };

        let summary = format!(
            "Read {} ({} lines, {byte_count} bytes)",
            workspace.relative_display(&resolved),
            content.lines().count()
        );
        ToolOutput::ok(content).with_summary(summary)
    }

    fn execute_search_text(&self, workspace: &WorkspaceConfig, args: &SearchTextArgs) -> ToolOutput {
        let root = match resolve_existing_path(workspace, &args.path) {
            Ok(path) => path,
            Err(error) => return ToolOutput::fail(error),
        };
        if !root.is_dir() {
            return ToolOutput::fail(format!("Not a directory: {}", args.path));
        }

        let pattern = match RegexBuilder::new(&regex::escape(args.query.trim()))
            .case_insensitive(!args.case_sensitive)
            .build()
        {
            Ok(pattern) => pattern,
            Err(error) => return ToolOutput::fail(format!("Invalid search query: {error}")),
        };

        let mut files = Vec::new();
        collect_files(&root, &mut files);

        let mut matches = Vec::new();
        let mut files_scanned = 0;
        let mut truncated = false;
        'files: for file in files {
            let Some(text) = read_searchable(&file) else {
                continue;
            };
            files_scanned += 1;

            for (index, line) in text.lines().enumerate() {
                if !pattern.is_match(line) {
                    continue;
                }
                if matches.len() >= args.max_results {
                    truncated = true;
                    break 'files;
                }
                matches.push(format!(
                    "{}:{}: {}",
                    workspace.relative_display(&file),
                    index + 1,
                    snippet(line)
                ));
            }
        }

        if matches.is_empty() {
            return ToolOutput::ok(format!(
                "No matches for '{}' under {} ({files_scanned} files scanned)",
                args.query, args.path
            ))
            .with_summary("(no matches)");
        }

        let mut content = format!(
            "{} matches for '{}' under {} ({files_scanned} files scanned)\n{}",
            matches.len(),
            args.query,
            args.path,
            matches.join("\n")
        );
        if truncated {
            content.push_str(&format!(
                "\n[results truncated at max_results={}]",
                args.max_results
            ));
        }

        ToolOutput::ok(content).with_summary(bullet_list(&matches, SEARCH_SUMMARY_ITEMS))
    }

    fn execute_write_file(&self, workspace: &WorkspaceConfig, args: &WriteFileArgs) -> ToolOutput {
        let resolved = match prepare_write(workspace, args) {
            Ok(path) => path,
            Err(error) => return ToolOutput::fail(error),
        };

        if let Some(parent) = resolved.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                return ToolOutput::fail(format!(
                    "Failed to create parent directories {}: {error}",
                    parent.display()
                ));
            }

            let canonical_parent = match parent.canonicalize() {
                Ok(path) => path,
                Err(error) => {
                    return ToolOutput::fail(format!(
                        "Failed to resolve write parent {}: {error}",
                        parent.display()
                    ));
                }
            };

            if let Err(error) = ensure_inside_workspace(workspace, &canonical_parent) {
                return ToolOutput::fail(error);
            }
        }

        if let Err(error) = fs::write(&resolved, &args.content) {
            return ToolOutput::fail(format!(
                "Failed to write file {}: {error}",
                resolved.display()
            ));
        }

        ToolOutput::ok(format!(
            "Wrote {} ({} bytes)",
            workspace.relative_display(&resolved),
            args.content.len()
        ))
    }

    fn execute_delete_file(&self, workspace: &WorkspaceConfig, args: &DeleteFileArgs) -> ToolOutput {
        let target = match resolve_delete_target(workspace, &args.path) {
            Ok(target) => target,
            Err(error) => return ToolOutput::fail(error),
        };
        let label = workspace.relative_display(&target.path);

        let (result, kind) = if target.is_dir {
            (fs::remove_dir_all(&target.path), "directory")
        } else {
            (fs::remove_file(&target.path), "file")
        };

        match result {
            Ok(()) => ToolOutput::ok(format!("Deleted {kind} {label}")),
            Err(error) => ToolOutput::fail(format!("Failed to delete {label}: {error}")),
        }
    }

    fn execute_apply_patch(&self, workspace: &WorkspaceConfig, args: &ApplyPatchArgs) -> ToolOutput {
        let (resolved, _, updated) = match prepare_patch(workspace, args) {
            Ok(prepared) => prepared,
            Err(error) => return ToolOutput::fail(error),
        };

        if let Err(error) = fs::write(&resolved, &updated) {
            return ToolOutput::fail(format!(
                "apply_patch io failure while writing {}: {error}",
                resolved.display()
            ));
        }

        ToolOutput::ok(format!(
            "Patched {} ({} lines)",
            workspace.relative_display(&resolved),
            updated.lines().count()
        ))
    }

    fn execute_web_fetch(&self, args: &WebFetchArgs) -> ToolOutput {
        let page = match fetch_page(args) {
            Ok(page) => page,
            Err(error) => return ToolOutput::fail(error),
        };

        let header = format!("url: {}\ncontent_type: {}", page.url, page.content_type);
        let summary = if page.text.is_empty() {
            header.clone()
        } else {
            format!("{header}\n\npreview:\n{}", preview_lines(&page.text, FETCH_SUMMARY_LINES))
        };
        ToolOutput::ok(format!("{header}\n\n{}", page.text)).with_summary(summary)
    }

    fn execute_shell(&self, workspace: &WorkspaceConfig, args: &ShellArgs) -> ToolOutput {
        let timeout = args
            .timeout_seconds
            .unwrap_or(self.default_shell_timeout_sec);
        let Some(deadline) = Instant::now().checked_add(Duration::from_secs(timeout)) else {
            return ToolOutput::fail(format!("Shell timeout out of range: {timeout}s"));
        };
        let mut child = match Command::new("bash")
            .arg("-lc")
            .arg(&args.command)
            .current_dir(workspace.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(error) => {
                return ToolOutput::fail(format!("Failed to launch shell command: {error}"));
            }
        };

        let stdout_reader = spawn_pipe_reader(child.stdout.take());
        let stderr_reader = spawn_pipe_reader(child.stderr.take());

        let end = loop {
            if self.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                break ShellEnd::Cancelled;
            }

            let now = Instant::now();
            if now >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                break ShellEnd::TimedOut;
            }

            match child.wait_timeout(SHELL_POLL_INTERVAL.min(deadline - now)) {
                Ok(Some(status)) => break ShellEnd::Exited(status),
                Ok(None) => {}
                Err(error) => {
                    let _ = child.kill();
                    return ToolOutput::fail(format!("Failed waiting for shell command: {error}"));
                }
            }
        };

        let stdout = join_pipe_reader(stdout_reader);
        let stderr = join_pipe_reader(stderr_reader);
        let stdout = String::from_utf8_lossy(&stdout);
        let stderr = String::from_utf8_lossy(&stderr);

        let (ok, status_label) = match end {
            ShellEnd::Exited(status) => (status.success(), format_exit_status(status)),
            ShellEnd::TimedOut => (false, format!("timeout after {timeout}s")),
            ShellEnd::Cancelled => (false, "cancelled".to_string()),
        };

        let content = format!("status: {status_label}\nstdout:\n{stdout}\nstderr:\n{stderr}");
        let summary = shell_summary(&status_label, &stdout, &stderr);
        ToolOutput {
            ok,
            content,
            summary: Some(summary),
        }
    }
}

impl ToolExecutor for BuiltinToolExecutor {
    fn execute(&mut self, args: &ToolArgs, workspace: &WorkspaceConfig) -> ToolOutput {
        match args {
            ToolArgs::ListDir(args) => self.execute_list_dir(workspace, args),
            ToolArgs::WalkDir(args) => self.execute_walk_dir(workspace, args),
            ToolArgs::ReadFile(args) => self.execute_read_file(workspace, args),
            ToolArgs::SearchText(args) => self.execute_search_text(workspace, args),
            ToolArgs::WebFetch(args) => self.execute_web_fetch(args),
            ToolArgs::WriteFile(args) => self.execute_write_file(workspace, args),
            ToolArgs::DeleteFile(args) => self.execute_delete_file(workspace, args),
            ToolArgs::ApplyPatch(args) => self.execute_apply_patch(workspace, args),
            ToolArgs::Shell(args) => self.execute_shell(workspace, args),
        }
    }

    fn preview(&self, args: &ToolArgs, workspace: &WorkspaceConfig) -> Result<Option<String>, String> {
        match args {
            ToolArgs::WriteFile(args) => {
                let resolved = prepare_write(workspace, args)?;
                let old = fs::read(&resolved)
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    .unwrap_or_default();
                let label = workspace.relative_display(&resolved);
                Ok(Some(diff_preview(&old, &args.content, &label)))
            }
            ToolArgs::ApplyPatch(args) => {
                let (resolved, original, updated) = prepare_patch(workspace, args)?;
                let label = workspace.relative_display(&resolved);
                Ok(Some(diff_preview(&original, &updated, &label)))
            }
            ToolArgs::DeleteFile(args) => resolve_delete_target(workspace, &args.path).map(|_| None),
            _ => Ok(None),
        }
    }
}

enum ShellEnd {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

struct DeleteTarget {
    path: PathBuf,
    is_dir: bool,
}

fn prepare_write(workspace: &WorkspaceConfig, args: &WriteFileArgs) -> Result<PathBuf, String> {
    let resolved = resolve_write_path(workspace, &args.path)?;
    if resolved.is_dir() {
        return Err(format!("Is a directory: {}", args.path));
    }
    if resolved.exists() && !args.overwrite {
        return Err(format!("File exists and overwrite=false: {}", args.path));
    }
    Ok(resolved)
}

fn prepare_patch(
    workspace: &WorkspaceConfig,
    args: &ApplyPatchArgs,
) -> Result<(PathBuf, String, String), String> {
    let resolved = resolve_existing_path(workspace, &args.path)?;
    if !resolved.is_file() {
        return Err(format!("Not a file: {}", args.path));
    }
    let original = fs::read_to_string(&resolved)
        .map_err(|error| format!("Failed to read file {}: {error}", resolved.display()))?;
    let updated = apply_unified_patch(&original, &args.patch).map_err(|error| error.to_string())?;
    Ok((resolved, original, updated))
}

fn resolve_delete_target(workspace: &WorkspaceConfig, path: &str) -> Result<DeleteTarget, String> {
    if path.trim().is_empty() {
        return Err("Path must not be empty".to_string());
    }

    let candidate = absolute_candidate(workspace, path);
    ensure_inside_workspace(workspace, &candidate)?;
    let metadata = fs::symlink_metadata(&candidate).map_err(|_| format!("Not found: {path}"))?;

    // A symlink is removed itself, never its target.
    if metadata.file_type().is_symlink() {
        return Ok(DeleteTarget {
            path: candidate,
            is_dir: false,
        });
    }

    let canonical = resolve_existing_path(workspace, path)?;
    if canonical == workspace.root() {
        return Err("Refusing to delete the workspace root".to_string());
    }
    Ok(DeleteTarget {
        is_dir: canonical.is_dir(),
        path: canonical,
    })
}

fn resolve_existing_path(workspace: &WorkspaceConfig, path: &str) -> Result<PathBuf, String> {
    if path.trim().is_empty() {
        return Err("Path must not be empty".to_string());
    }

    let candidate = absolute_candidate(workspace, path);
    ensure_inside_workspace(workspace, &candidate)?;
    if !candidate.exists() {
        return Err(format!("Not found: {path}"));
    }

    let canonical = candidate
        .canonicalize()
        .map_err(|error| format!("Failed to resolve path {}: {error}", candidate.display()))?;

    ensure_inside_workspace(workspace, &canonical)?;
    Ok(canonical)
}

fn resolve_write_path(workspace: &WorkspaceConfig, path: &str) -> Result<PathBuf, String> {
    if path.trim().is_empty() {
        return Err("Path must not be empty".to_string());
    }

    let candidate = absolute_candidate(workspace, path);
    ensure_inside_workspace(workspace, &candidate)?;
    let parent = candidate.parent().ok_or_else(|| {
        format!(
            "Path {} has no parent directory and cannot be written safely",
            candidate.display()
        )
    })?;

    let anchor = canonicalize_existing_ancestor(parent)?;
    ensure_inside_workspace(workspace, &anchor)?;

    if candidate.exists() {
        let canonical = candidate
            .canonicalize()
            .map_err(|error| format!("Failed to resolve path {}: {error}", candidate.display()))?;
        ensure_inside_workspace(workspace, &canonical)?;
    }

    Ok(candidate)
}

/// Joins `path` onto the workspace root and folds `.`/`..` lexically.
fn absolute_candidate(workspace: &WorkspaceConfig, path: &str) -> PathBuf {
    let path = Path::new(path.trim());
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.root().join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn ensure_inside_workspace(workspace: &WorkspaceConfig, path: &Path) -> Result<(), String> {
    if path.starts_with(workspace.root()) {
        Ok(())
    } else {
        Err(format!("Path escapes workspace root: {}", path.display()))
    }
}

fn canonicalize_existing_ancestor(path: &Path) -> Result<PathBuf, String> {
    for ancestor in path.ancestors() {
        if ancestor.exists() {
            return ancestor.canonicalize().map_err(|error| {
                format!("Failed to resolve path {}: {error}", ancestor.display())
            });
        }
    }

    Err(format!(
        "No existing ancestor found for path {}",
        path.display()
    ))
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Visible entries of `dir`, sorted by name. Unreadable directories yield nothing.
fn sorted_entries(dir: &Path) -> Vec<(String, PathBuf, bool)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut entries: Vec<_> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_hidden(&name) {
                return None;
            }
            // Symlinked directories are listed as files and never followed.
            let is_dir = entry.file_type().is_ok_and(|kind| kind.is_dir());
            Some((name, entry.path(), is_dir))
        })
        .collect();
    entries.sort_by(|left, right| left.0.cmp(&right.0));
    entries
}

/// Appends `dir` and its contents to `out`; returns true once `max_files` is hit.
fn walk(
    workspace: &WorkspaceConfig,
    dir: &Path,
    depth: usize,
    max_depth: usize,
    max_files: usize,
    out: &mut Vec<String>,
) -> bool {
    if depth > max_depth {
        return false;
    }

    out.push(format!("{}/", workspace.relative_display(dir)));
    if out.len() >= max_files {
        return true;
    }

    let entries = sorted_entries(dir);
    for (_, path, _) in entries.iter().filter(|(_, _, is_dir)| !is_dir) {
        out.push(workspace.relative_display(path));
        if out.len() >= max_files {
            return true;
        }
    }

    for (_, path, _) in entries.iter().filter(|(_, _, is_dir)| *is_dir) {
        if walk(workspace, path, depth + 1, max_depth, max_files, out) {
            return true;
        }
    }

    false
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    for (_, path, is_dir) in sorted_entries(dir) {
        if is_dir {
            collect_files(&path, out);
        } else {
            out.push(path);
        }
    }
}

fn read_searchable(path: &Path) -> Option<String> {
    let metadata = fs::metadata(path).ok()?;
    if !metadata.is_file() || metadata.len() > SEARCH_MAX_FILE_BYTES {
        return None;
    }
    fs::read_to_string(path).ok()
}

fn snippet(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.chars().count() <= SNIPPET_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(SNIPPET_MAX_CHARS).collect();
    cut.push('…');
    cut
}

fn bullet_list(items: &[String], limit: usize) -> String {
    let mut lines: Vec<String> = items
        .iter()
        .take(limit)
        .map(|item| format!("- {item}"))
        .collect();
    if items.len() > limit {
        lines.push(format!("...and {} more", items.len() - limit));
    }
    lines.join("\n")
}

fn preview_lines(text: &str, limit: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut preview = lines[..lines.len().min(limit)].join("\n");
    if lines.len() > limit {
        preview.push_str(&format!("\n...and {} more lines", lines.len() - limit));
    }
    preview
}

fn shell_summary(status_label: &str, stdout: &str, stderr: &str) -> String {
    let mut sections = vec![status_label.to_string()];
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        sections.push(format!("stdout:\n{}", preview_lines(stdout, STDOUT_SUMMARY_LINES)));
    }
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        sections.push(format!("stderr:\n{}", preview_lines(stderr, STDERR_SUMMARY_LINES)));
    }
    sections.join("\n")
}

fn spawn_pipe_reader(pipe: Option<impl Read + Send + 'static>) -> Option<JoinHandle<Vec<u8>>> {
    let mut pipe = pipe?;
    thread::Builder::new()
        .name("shell-pipe-reader".to_string())
        .spawn(move || {
            let mut bytes = Vec::new();
            let _ = pipe.read_to_end(&mut bytes);
            bytes
        })
        .ok()
}

fn join_pipe_reader(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|reader| reader.join().ok())
        .unwrap_or_default()
}

fn format_exit_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit_code={code}"),
        None => "exit_code=terminated_by_signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_fold_parent_components() {
        let dir = tempfile::tempdir().expect("temp dir");
        let workspace = WorkspaceConfig::new(dir.path()).expect("workspace");
        let candidate = absolute_candidate(&workspace, "a/../b/./c.txt");
        assert_eq!(candidate, workspace.root().join("b").join("c.txt"));
        assert!(ensure_inside_workspace(&workspace, &absolute_candidate(&workspace, "../x")).is_err());
    }

    #[test]
    fn snippets_are_trimmed_and_capped() {
        assert_eq!(snippet("   hello  "), "hello");
        let long = "x".repeat(400);
        assert_eq!(snippet(&long).chars().count(), SNIPPET_MAX_CHARS + 1);
    }

    #[test]
    fn bullet_lists_note_hidden_remainder() {
        let items: Vec<String> = (0..4).map(|index| index.to_string()).collect();
        assert_eq!(bullet_list(&items, 2), "- 0\n- 1\n...and 2 more");
    }
}
