//! Closed registry of built-in tools.
//!
//! Every tool is a `ToolKind` variant carrying its argument type, JSON
//! schema and mutating flag. Names are resolved against the registry once
//! per call; arguments are decoded into the typed `ToolArgs` before any
//! handler runs.

use agent_provider::ToolDefinition;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

/// Upper bound accepted for `shell.timeout_seconds`.
pub const MAX_SHELL_TIMEOUT_SEC: u64 = 3600;
/// Smallest `web_fetch.max_chars` accepted.
pub const MIN_FETCH_CHARS: usize = 200;
pub const MAX_FETCH_TIMEOUT_SEC: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ListDir,
    WalkDir,
    ReadFile,
    SearchText,
    WebFetch,
    WriteFile,
    DeleteFile,
    ApplyPatch,
    Shell,
}

impl ToolKind {
    pub const ALL: [ToolKind; 9] = [
        ToolKind::ListDir,
        ToolKind::WalkDir,
        ToolKind::ReadFile,
        ToolKind::SearchText,
        ToolKind::WebFetch,
        ToolKind::WriteFile,
        ToolKind::DeleteFile,
        ToolKind::ApplyPatch,
        ToolKind::Shell,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ListDir => "list_dir",
            Self::WalkDir => "walk_dir",
            Self::ReadFile => "read_file",
            Self::SearchText => "search_text",
            Self::WebFetch => "web_fetch",
            Self::WriteFile => "write_file",
            Self::DeleteFile => "delete_file",
            Self::ApplyPatch => "apply_patch",
            Self::Shell => "shell",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::ListDir => "List files and folders in a directory under the workspace root.",
            Self::WalkDir => {
                "Recursively list files under a directory (bounded by max_depth/max_files)."
            }
            Self::ReadFile => "Read a text file under the workspace root. Returns file content.",
            Self::SearchText => {
                "Search for a text query in files under the workspace (grep-like). Returns matching file paths and line snippets."
            }
            Self::WebFetch => {
                "Fetch a web page by URL and return extracted readable text (HTML cleaned)."
            }
            Self::WriteFile => {
                "Write a text file under the workspace root (creates parent directories). Requires approval."
            }
            Self::DeleteFile => "Delete a file or directory under the workspace root. Requires approval.",
            Self::ApplyPatch => {
                "Apply a unified diff patch to a file under the workspace root. Requires approval."
            }
            Self::Shell => {
                "Run a shell command in the workspace directory and return stdout/stderr/exit code. Requires approval."
            }
        }
    }

    /// Whether the tool changes the workspace or runs arbitrary commands.
    #[must_use]
    pub fn default_mutating(self) -> bool {
        matches!(
            self,
            Self::WriteFile | Self::DeleteFile | Self::ApplyPatch | Self::Shell
        )
    }

    #[must_use]
    pub fn input_schema(self) -> Value {
        match self {
            Self::ListDir => object_schema(
                json!({ "path": str_schema("Directory path relative to workspace root.", Some(".")) }),
                &[],
            ),
            Self::WalkDir => object_schema(
                json!({
                    "path": str_schema("Directory path relative to workspace root.", Some(".")),
                    "max_depth": int_schema("Maximum depth to recurse.", 6, 0),
                    "max_files": int_schema("Maximum number of entries to return.", 200, 1),
                }),
                &[],
            ),
            Self::ReadFile => object_schema(
                json!({ "path": str_schema("File path relative to workspace root.", None) }),
                &["path"],
            ),
            Self::SearchText => object_schema(
                json!({
                    "query": str_schema("Text to search for.", None),
                    "path": str_schema("Directory to search under (relative to workspace).", Some(".")),
                    "case_sensitive": bool_schema("Case sensitive search.", false),
                    "max_results": int_schema("Max matches to return.", 50, 1),
                }),
                &["query"],
            ),
            Self::WebFetch => object_schema(
                json!({
                    "url": str_schema("http/https URL to fetch.", None),
                    "max_chars": int_schema(
                        "Max characters of text to return.",
                        8000,
                        MIN_FETCH_CHARS as u64
                    ),
                    "timeout_seconds": {
                        "type": "integer",
                        "description": "Request timeout in seconds.",
                        "default": 20,
                        "minimum": 1,
                        "maximum": MAX_FETCH_TIMEOUT_SEC
                    },
                }),
                &["url"],
            ),
            Self::WriteFile => object_schema(
                json!({
                    "path": str_schema("File path relative to workspace root.", None),
                    "content": str_schema("Full file content to write.", None),
                    "overwrite": bool_schema("Overwrite if file exists.", true),
                }),
                &["path", "content"],
            ),
            Self::DeleteFile => object_schema(
                json!({ "path": str_schema("Path relative to workspace root.", None) }),
                &["path"],
            ),
            Self::ApplyPatch => object_schema(
                json!({
                    "path": str_schema("File path relative to workspace root.", None),
                    "patch": str_schema("Unified diff patch text.", None),
                }),
                &["path", "patch"],
            ),
            Self::Shell => object_schema(
                json!({
                    "command": str_schema("Shell command to run.", None),
                    "timeout_seconds": {
                        "type": "integer",
                        "description": "Optional timeout in seconds.",
                        "minimum": 1,
                        "maximum": MAX_SHELL_TIMEOUT_SEC
                    },
                }),
                &["command"],
            ),
        }
    }

    /// Decodes a raw argument payload into this tool's typed arguments.
    pub fn parse_args(self, arguments: &Value) -> Result<ToolArgs, ValidationError> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            Value::Object(_) => arguments.clone(),
            Value::String(_) => {
                return Err(ValidationError::new(self, "arguments are not valid JSON"));
            }
            _ => return Err(ValidationError::new(self, "arguments must be a JSON object")),
        };

        let args = match self {
            Self::ListDir => ToolArgs::ListDir(decode(self, arguments)?),
            Self::WalkDir => ToolArgs::WalkDir(decode(self, arguments)?),
            Self::ReadFile => ToolArgs::ReadFile(decode(self, arguments)?),
            Self::SearchText => ToolArgs::SearchText(decode(self, arguments)?),
            Self::WebFetch => ToolArgs::WebFetch(decode(self, arguments)?),
            Self::WriteFile => ToolArgs::WriteFile(decode(self, arguments)?),
            Self::DeleteFile => ToolArgs::DeleteFile(decode(self, arguments)?),
            Self::ApplyPatch => ToolArgs::ApplyPatch(decode(self, arguments)?),
            Self::Shell => ToolArgs::Shell(decode(self, arguments)?),
        };
        args.check(self)?;
        Ok(args)
    }
}

fn decode<T: DeserializeOwned>(kind: ToolKind, arguments: Value) -> Result<T, ValidationError> {
    serde_json::from_value(arguments).map_err(|error| ValidationError::new(kind, error.to_string()))
}

/// Argument payload rejected before the handler ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid arguments for {tool}: {message}")]
pub struct ValidationError {
    pub tool: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(kind: ToolKind, message: impl Into<String>) -> Self {
        Self {
            tool: kind.name(),
            message: message.into(),
        }
    }
}

fn default_dot() -> String {
    ".".to_string()
}

fn default_max_depth() -> usize {
    6
}

fn default_max_files() -> usize {
    200
}

fn default_max_results() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_max_chars() -> usize {
    8000
}

fn default_fetch_timeout() -> u64 {
    20
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListDirArgs {
    #[serde(default = "default_dot")]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WalkDirArgs {
    #[serde(default = "default_dot")]
    pub path: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadFileArgs {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchTextArgs {
    pub query: String,
    #[serde(default = "default_dot")]
    pub path: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebFetchArgs {
    pub url: String,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteFileArgs {
    pub path: String,
    pub content: String,
    #[serde(default = "default_true")]
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteFileArgs {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplyPatchArgs {
    pub path: String,
    pub patch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellArgs {
    pub command: String,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// Validated arguments of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolArgs {
    ListDir(ListDirArgs),
    WalkDir(WalkDirArgs),
    ReadFile(ReadFileArgs),
    SearchText(SearchTextArgs),
    WebFetch(WebFetchArgs),
    WriteFile(WriteFileArgs),
    DeleteFile(DeleteFileArgs),
    ApplyPatch(ApplyPatchArgs),
    Shell(ShellArgs),
}

impl ToolArgs {
    #[must_use]
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::ListDir(_) => ToolKind::ListDir,
            Self::WalkDir(_) => ToolKind::WalkDir,
            Self::ReadFile(_) => ToolKind::ReadFile,
            Self::SearchText(_) => ToolKind::SearchText,
            Self::WebFetch(_) => ToolKind::WebFetch,
            Self::WriteFile(_) => ToolKind::WriteFile,
            Self::DeleteFile(_) => ToolKind::DeleteFile,
            Self::ApplyPatch(_) => ToolKind::ApplyPatch,
            Self::Shell(_) => ToolKind::Shell,
        }
    }

    /// One-line description used in approval prompts, e.g. `delete_file notes.txt`.
    #[must_use]
    pub fn action(&self) -> String {
        let target = match self {
            Self::ListDir(args) => args.path.as_str(),
            Self::WalkDir(args) => args.path.as_str(),
            Self::ReadFile(args) => args.path.as_str(),
            Self::SearchText(args) => args.query.as_str(),
            Self::WebFetch(args) => args.url.as_str(),
            Self::WriteFile(args) => args.path.as_str(),
            Self::DeleteFile(args) => args.path.as_str(),
            Self::ApplyPatch(args) => args.path.as_str(),
            Self::Shell(args) => args.command.as_str(),
        };
        format!("{} {}", self.kind().name(), collapse_whitespace(target))
    }

    fn check(&self, kind: ToolKind) -> Result<(), ValidationError> {
        let blank = |field: &str| Err(ValidationError::new(kind, format!("`{field}` must not be empty")));
        match self {
            Self::ReadFile(args) if args.path.trim().is_empty() => blank("path"),
            Self::WriteFile(args) if args.path.trim().is_empty() => blank("path"),
            Self::DeleteFile(args) if args.path.trim().is_empty() => blank("path"),
            Self::ApplyPatch(args) if args.path.trim().is_empty() => blank("path"),
            Self::ApplyPatch(args) if args.patch.trim().is_empty() => blank("patch"),
            Self::SearchText(args) if args.query.trim().is_empty() => blank("query"),
            Self::Shell(args) if args.command.trim().is_empty() => blank("command"),
            Self::Shell(ShellArgs {
                timeout_seconds: Some(0),
                ..
            }) => Err(ValidationError::new(kind, "`timeout_seconds` must be at least 1")),
            Self::Shell(ShellArgs {
                timeout_seconds: Some(seconds),
                ..
            }) if *seconds > MAX_SHELL_TIMEOUT_SEC => Err(ValidationError::new(
                kind,
                format!("`timeout_seconds` must be at most {MAX_SHELL_TIMEOUT_SEC}"),
            )),
            Self::WebFetch(args) if args.url.trim().is_empty() => blank("url"),
            Self::WebFetch(args) if args.max_chars < MIN_FETCH_CHARS => Err(ValidationError::new(
                kind,
                format!("`max_chars` must be at least {MIN_FETCH_CHARS}"),
            )),
            Self::WebFetch(args) if args.timeout_seconds == 0 => {
                Err(ValidationError::new(kind, "`timeout_seconds` must be at least 1"))
            }
            Self::WebFetch(args) if args.timeout_seconds > MAX_FETCH_TIMEOUT_SEC => {
                Err(ValidationError::new(
                    kind,
                    format!("`timeout_seconds` must be at most {MAX_FETCH_TIMEOUT_SEC}"),
                ))
            }
            Self::WalkDir(args) if args.max_files == 0 => {
                Err(ValidationError::new(kind, "`max_files` must be at least 1"))
            }
            Self::SearchText(args) if args.max_results == 0 => {
                Err(ValidationError::new(kind, "`max_results` must be at least 1"))
            }
            _ => Ok(()),
        }
    }
}

/// Display label for a raw tool call, e.g. `Reading src/main.rs`.
#[must_use]
pub fn action_label(name: &str, arguments: &Value) -> String {
    let field = |key: &str| {
        arguments
            .get(key)
            .and_then(Value::as_str)
            .map(collapse_whitespace)
    };
    let path = field("path").unwrap_or_else(|| ".".to_string());

    match ToolKind::from_name(name) {
        Some(ToolKind::ListDir) => format!("Listing {path}"),
        Some(ToolKind::WalkDir) => format!("Walking {path}"),
        Some(ToolKind::ReadFile) => format!("Reading {path}"),
        Some(ToolKind::SearchText) => format!(
            "Searching '{}' under {path}",
            field("query").unwrap_or_default()
        ),
        Some(ToolKind::WebFetch) => format!("Fetching: {}", field("url").unwrap_or_default()),
        Some(ToolKind::WriteFile) => format!("Writing {path}"),
        Some(ToolKind::DeleteFile) => format!("Deleting {path}"),
        Some(ToolKind::ApplyPatch) => format!("Patching {path}"),
        Some(ToolKind::Shell) => match field("command") {
            Some(command) if !command.is_empty() => format!("Running: {command}"),
            _ => "Running shell command".to_string(),
        },
        None => format!("Calling {name}"),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn str_schema(description: &str, default: Option<&str>) -> Value {
    let mut schema = json!({ "type": "string", "description": description });
    if let Some(default) = default {
        schema["default"] = json!(default);
    }
    schema
}

fn int_schema(description: &str, default: u64, minimum: u64) -> Value {
    json!({
        "type": "integer",
        "description": description,
        "default": default,
        "minimum": minimum,
    })
}

fn bool_schema(description: &str, default: bool) -> Value {
    json!({ "type": "boolean", "description": description, "default": default })
}

/// One registered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub kind: ToolKind,
    pub mutating: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(&'static str),
}

/// Set of tools offered to the model, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// Registry holding every built-in tool with its default mutating flag.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            specs: ToolKind::ALL
                .into_iter()
                .map(|kind| ToolSpec {
                    kind,
                    mutating: kind.default_mutating(),
                })
                .collect(),
        }
    }

    pub fn register(&mut self, kind: ToolKind) -> Result<(), RegistryError> {
        self.register_with(kind, kind.default_mutating())
    }

    /// Registers `kind`, fixing its mutating flag for the registry's lifetime.
    pub fn register_with(&mut self, kind: ToolKind, mutating: bool) -> Result<(), RegistryError> {
        if self.specs.iter().any(|spec| spec.kind == kind) {
            return Err(RegistryError::Duplicate(kind.name()));
        }
        self.specs.push(ToolSpec { kind, mutating });
        Ok(())
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ToolSpec> {
        self.specs
            .iter()
            .copied()
            .find(|spec| spec.kind.name() == name)
    }

    #[must_use]
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Tool definitions sent with every model request.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.specs
            .iter()
            .map(|spec| ToolDefinition {
                name: spec.kind.name().to_string(),
                description: spec.kind.description().to_string(),
                input_schema: spec.kind.input_schema(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = ToolRegistry::default();
        registry.register(ToolKind::ReadFile).expect("first registration");
        let error = registry
            .register(ToolKind::ReadFile)
            .expect_err("duplicate must fail");
        assert_eq!(error, RegistryError::Duplicate("read_file"));
        assert_eq!(registry.specs().len(), 1);
    }

    #[test]
    fn mutating_flag_is_fixed_at_registration() {
        let mut registry = ToolRegistry::default();
        registry
            .register_with(ToolKind::ListDir, true)
            .expect("register list_dir");
        assert!(matches!(
            registry.lookup("list_dir"),
            Some(ToolSpec { mutating: true, .. })
        ));
        assert!(registry.lookup("shell").is_none());

        let builtin = ToolRegistry::builtin();
        let mutating: Vec<_> = builtin
            .specs()
            .iter()
            .filter(|spec| spec.mutating)
            .map(|spec| spec.kind.name())
            .collect();
        assert_eq!(mutating, vec!["write_file", "delete_file", "apply_patch", "shell"]);
    }

    #[test]
    fn missing_required_field_is_named() {
        let error = ToolKind::ReadFile
            .parse_args(&json!({}))
            .expect_err("path is required");
        assert!(error.message.contains("missing field `path`"), "{error}");
        assert_eq!(error.to_string().split(':').next(), Some("invalid arguments for read_file"));
    }

    #[test]
    fn unknown_fields_and_wrong_types_are_rejected() {
        let unknown = ToolKind::ListDir
            .parse_args(&json!({ "path": ".", "recursive": true }))
            .expect_err("unknown field");
        assert!(unknown.message.contains("unknown field `recursive`"), "{unknown}");

        let wrong_type = ToolKind::WalkDir
            .parse_args(&json!({ "max_depth": "deep" }))
            .expect_err("wrong type");
        assert!(wrong_type.message.contains("invalid type"), "{wrong_type}");

        let raw = ToolKind::ReadFile
            .parse_args(&json!("{\"path\":"))
            .expect_err("malformed json");
        assert_eq!(raw.message, "arguments are not valid JSON");
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let args = ToolKind::WalkDir.parse_args(&Value::Null).expect("defaults");
        assert_eq!(
            args,
            ToolArgs::WalkDir(WalkDirArgs {
                path: ".".to_string(),
                max_depth: 6,
                max_files: 200,
            })
        );
        let args = ToolKind::Shell
            .parse_args(&json!({ "command": "ls   -la" }))
            .expect("shell args");
        assert_eq!(args.action(), "shell ls -la");
    }

    #[test]
    fn blank_required_values_are_rejected() {
        let error = ToolKind::Shell
            .parse_args(&json!({ "command": "  " }))
            .expect_err("blank command");
        assert_eq!(error.message, "`command` must not be empty");
    }

    #[test]
    fn shell_timeout_is_bounded() {
        let error = ToolKind::Shell
            .parse_args(&json!({ "command": "sleep 1", "timeout_seconds": u64::MAX }))
            .expect_err("huge timeout");
        assert_eq!(error.message, "`timeout_seconds` must be at most 3600");

        let args = ToolKind::Shell
            .parse_args(&json!({ "command": "sleep 1", "timeout_seconds": MAX_SHELL_TIMEOUT_SEC }))
            .expect("largest accepted timeout");
        assert!(matches!(args, ToolArgs::Shell(ShellArgs { timeout_seconds: Some(3600), .. })));
        assert_eq!(
            ToolKind::Shell.input_schema()["properties"]["timeout_seconds"]["maximum"],
            json!(MAX_SHELL_TIMEOUT_SEC)
        );
    }

    #[test]
    fn web_fetch_defaults_and_bounds() {
        let args = ToolKind::WebFetch
            .parse_args(&json!({ "url": "https://example.com" }))
            .expect("fetch args");
        assert_eq!(
            args,
            ToolArgs::WebFetch(WebFetchArgs {
                url: "https://example.com".to_string(),
                max_chars: 8000,
                timeout_seconds: 20,
            })
        );
        assert!(!ToolKind::WebFetch.default_mutating());

        let error = ToolKind::WebFetch
            .parse_args(&json!({ "url": "https://example.com", "max_chars": 10 }))
            .expect_err("too small");
        assert_eq!(error.message, "`max_chars` must be at least 200");
    }

    #[test]
    fn definitions_follow_registration_order() {
        let names: Vec<_> = ToolRegistry::builtin()
            .definitions()
            .into_iter()
            .map(|definition| definition.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "list_dir",
                "walk_dir",
                "read_file",
                "search_text",
                "web_fetch",
                "write_file",
                "delete_file",
                "apply_patch",
                "shell"
            ]
        );
    }

    #[test]
    fn action_labels_read_raw_arguments() {
        assert_eq!(action_label("read_file", &json!({ "path": "src/lib.rs" })), "Reading src/lib.rs");
        assert_eq!(action_label("list_dir", &json!({})), "Listing .");
        assert_eq!(
            action_label("search_text", &json!({ "query": "fn  main" })),
            "Searching 'fn main' under ."
        );
        assert_eq!(
            action_label("web_fetch", &json!({ "url": "https://example.com/a b" })),
            "Fetching: https://example.com/a b"
        );
        assert_eq!(action_label("web_search", &json!({})), "Calling web_search");
    }
}
