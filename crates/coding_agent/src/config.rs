//! Command-line and environment configuration.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::builder::{BoolishValueParser, TypedValueParser};
use clap::{ArgAction, Parser, ValueEnum};
use session_store::{SessionSettings, DEFAULT_MODEL, DEFAULT_TRUNCATE_LINES};

use crate::engine::{RunConfig, DEFAULT_MAX_ITERATIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Offline echo transport.
    Mock,
    /// OpenAI-compatible chat completions endpoint.
    ChatApi,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mock => agent_provider_mock::MOCK_PROVIDER_ID,
            Self::ChatApi => agent_provider_chat_api::CHAT_API_PROVIDER_ID,
        }
    }
}

/// Interactive coding agent working inside a single workspace directory.
#[derive(Debug, Clone, Parser)]
#[command(name = "coding-agent", version, about)]
pub struct Cli {
    /// Workspace directory.
    #[arg(short = 'C', long)]
    pub cwd: Option<PathBuf>,

    /// Model identifier.
    #[arg(short = 'm', long, env = "LLM_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Auto-approve file and shell changes.
    #[arg(
        short = 'y',
        long,
        env = "AUTO_APPROVE",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub auto_approve: bool,

    /// Require approval for file and shell changes.
    #[arg(short = 'n', long)]
    pub no_auto_approve: bool,

    /// API key for the chat-api provider.
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint.
    #[arg(long, env = "LLM_BASE_URL")]
    pub base_url: Option<String>,

    /// Model request timeout in seconds.
    #[arg(
        short = 't',
        long,
        env = "LLM_TIMEOUT",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub request_timeout: u64,

    /// Tool output line limit (0 = no truncation).
    #[arg(long, env = "TRUNCATE_LINES", default_value_t = DEFAULT_TRUNCATE_LINES)]
    pub truncate_lines: usize,

    /// Show full tool output instead of compact summaries.
    #[arg(
        long,
        env = "VERBOSE",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub verbose: bool,

    /// Show compact tool output.
    #[arg(long)]
    pub no_verbose: bool,

    /// Save the session after every turn.
    #[arg(
        long,
        env = "AUTOSAVE",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub autosave: bool,

    /// Only save on explicit /save.
    #[arg(long)]
    pub no_autosave: bool,

    /// Session name to load or create.
    #[arg(short = 's', long)]
    pub session: Option<String>,

    /// Absolute directory holding session files.
    #[arg(long, env = session_store::SESSIONS_DIR_ENV)]
    pub sessions_dir: Option<PathBuf>,

    /// Model transport.
    #[arg(long, value_enum, env = "CODING_AGENT_PROVIDER", default_value_t = ProviderKind::ChatApi)]
    pub provider: ProviderKind,

    /// Maximum model/tool rounds per turn.
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_ITERATIONS,
        value_parser = clap::value_parser!(u64)
            .range(1..)
            .map(|value| usize::try_from(value).unwrap_or(usize::MAX))
    )]
    pub max_iterations: usize,

    /// Log filter, e.g. `info` or `coding_agent=debug`. Overrides RUST_LOG.
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot determine current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
    #[error("Path does not exist: {0}")]
    MissingPath(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("model name must not be empty")]
    EmptyModel,
}

/// Resolved startup configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub workspace: PathBuf,
    pub model: String,
    pub auto_approve: bool,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout: Duration,
    pub truncate_lines: usize,
    pub verbose: bool,
    pub autosave: bool,
    pub session: Option<String>,
    pub sessions_dir: Option<PathBuf>,
    pub provider: ProviderKind,
    pub max_iterations: usize,
    pub log_level: Option<String>,
}

impl AgentConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let process_cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
        Self::from_cli_in(cli, &process_cwd)
    }

    /// Resolves `cli` with relative paths anchored at `process_cwd`.
    pub fn from_cli_in(cli: Cli, process_cwd: &Path) -> Result<Self, ConfigError> {
        let workspace = match &cli.cwd {
            Some(path) => resolve_workspace(process_cwd, path)?,
            None => resolve_workspace(process_cwd, Path::new("."))?,
        };

        let model = cli.model.trim().to_string();
        if model.is_empty() {
            return Err(ConfigError::EmptyModel);
        }

        Ok(Self {
            workspace,
            model,
            auto_approve: cli.auto_approve && !cli.no_auto_approve,
            api_key: cli.api_key.filter(|key| !key.trim().is_empty()),
            base_url: cli.base_url.filter(|url| !url.trim().is_empty()),
            request_timeout: Duration::from_secs(cli.request_timeout),
            truncate_lines: cli.truncate_lines,
            verbose: cli.verbose && !cli.no_verbose,
            autosave: cli.autosave && !cli.no_autosave,
            session: cli.session.filter(|name| !name.trim().is_empty()),
            sessions_dir: cli.sessions_dir,
            provider: cli.provider,
            max_iterations: cli.max_iterations,
            log_level: cli.log_level,
        })
    }

    /// Settings given to sessions created during this run.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            autosave: self.autosave,
            truncate_lines: self.truncate_lines,
            verbose: self.verbose,
            model: self.model.clone(),
        }
    }

    #[must_use]
    pub fn run_config(&self, model: &str) -> RunConfig {
        RunConfig::new(model)
            .with_timeout(self.request_timeout)
            .with_max_iterations(self.max_iterations)
    }

    /// Override for the session store root, if one was configured.
    #[must_use]
    pub fn sessions_dir_override(&self) -> Option<OsString> {
        self.sessions_dir.clone().map(PathBuf::into_os_string)
    }
}

/// Resolves a workspace path strictly: relative paths are joined to `base`
/// and the result must be an existing directory.
pub fn resolve_workspace(base: &Path, raw: &Path) -> Result<PathBuf, ConfigError> {
    let expanded = expand_home(raw);
    let candidate = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };

    if !candidate.exists() {
        return Err(ConfigError::MissingPath(candidate));
    }
    if !candidate.is_dir() {
        return Err(ConfigError::NotADirectory(candidate));
    }
    candidate
        .canonicalize()
        .map_err(|_| ConfigError::MissingPath(candidate))
}

fn expand_home(raw: &Path) -> PathBuf {
    let Ok(rest) = raw.strip_prefix("~") else {
        return raw.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => raw.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["coding-agent"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("arguments should parse")
    }

    #[test]
    fn relative_cwd_resolves_against_process_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("project")).expect("project dir");

        let config =
            AgentConfig::from_cli_in(cli(&["--cwd", "project"]), temp.path()).expect("config");

        let expected = temp.path().join("project").canonicalize().expect("canonical");
        assert_eq!(config.workspace, expected);
    }

    #[test]
    fn missing_cwd_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let error = AgentConfig::from_cli_in(cli(&["-C", "nope"]), temp.path())
            .expect_err("missing directory should fail");
        assert!(matches!(error, ConfigError::MissingPath(path) if path.ends_with("nope")));
    }

    #[test]
    fn file_cwd_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("file.txt"), "x").expect("write file");
        let error = AgentConfig::from_cli_in(cli(&["-C", "file.txt"]), temp.path())
            .expect_err("file should fail");
        assert!(matches!(error, ConfigError::NotADirectory(_)));
    }

    #[test]
    fn negative_flags_win_over_positive_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = AgentConfig::from_cli_in(
            cli(&["-y", "--no-autosave", "--verbose", "--truncate-lines", "0"]),
            temp.path(),
        )
        .expect("config");

        assert!(config.auto_approve);
        assert!(!config.autosave);
        assert!(config.verbose);
        assert_eq!(config.truncate_lines, 0);
        assert_eq!(
            config.session_settings(),
            SessionSettings {
                autosave: false,
                truncate_lines: 0,
                verbose: true,
                model: DEFAULT_MODEL.to_string(),
            }
        );
    }

    #[test]
    fn boolean_flags_accept_explicit_values() {
        let parsed = cli(&["--autosave=off", "--auto-approve=yes"]);
        assert!(!parsed.autosave);
        assert!(parsed.auto_approve);
    }

    #[test]
    fn zero_timeout_and_zero_iterations_are_rejected() {
        assert!(Cli::try_parse_from(["coding-agent", "-t", "0"]).is_err());
        assert!(Cli::try_parse_from(["coding-agent", "--max-iterations", "0"]).is_err());
    }

    #[test]
    fn iteration_cap_parses_as_usize() {
        assert_eq!(cli(&["--max-iterations", "12"]).max_iterations, 12);
        assert_eq!(cli(&[]).max_iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn run_config_carries_timeout_and_cap() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = AgentConfig::from_cli_in(
            cli(&["-t", "5", "--max-iterations", "3", "--provider", "mock"]),
            temp.path(),
        )
        .expect("config");

        let run = config.run_config("gpt-test");
        assert_eq!(run.model, "gpt-test");
        assert_eq!(run.timeout, Duration::from_secs(5));
        assert_eq!(run.max_iterations, 3);
        assert_eq!(config.provider, ProviderKind::Mock);
    }
}
