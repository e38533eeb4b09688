use std::ffi::OsString;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::error::SessionStoreError;

/// Environment variable that overrides the session store root.
pub const SESSIONS_DIR_ENV: &str = "CODING_AGENT_SESSIONS_DIR";

pub const SESSION_DIR_NAME: &str = "sessions";
pub const SESSION_FILE_EXTENSION: &str = "json";

const MAX_NAME_LEN: usize = 64;

/// Resolves the store root from the environment override or the running
/// executable's installation root. Never depends on the process cwd.
pub fn resolve_store_root() -> Result<PathBuf, SessionStoreError> {
    let exe = std::env::current_exe()
        .map_err(|error| SessionStoreError::UnresolvedRoot(error.to_string()))?;
    store_root_from(std::env::var_os(SESSIONS_DIR_ENV), &exe)
}

/// Pure form of [`resolve_store_root`].
///
/// The installation root is the directory holding the executable, or its
/// parent when that directory is named `bin`.
pub fn store_root_from(
    override_dir: Option<OsString>,
    exe: &Path,
) -> Result<PathBuf, SessionStoreError> {
    if let Some(dir) = override_dir.filter(|dir| !dir.is_empty()) {
        let dir = PathBuf::from(dir);
        if !dir.is_absolute() {
            return Err(SessionStoreError::UnresolvedRoot(format!(
                "{SESSIONS_DIR_ENV} must be an absolute path, got {}",
                dir.display()
            )));
        }
        return Ok(dir);
    }

    let exe_dir = exe.parent().ok_or_else(|| {
        SessionStoreError::UnresolvedRoot(format!(
            "executable path has no parent: {}",
            exe.display()
        ))
    })?;

    let install_root = match exe_dir.file_name() {
        Some(name) if name == "bin" => exe_dir.parent().unwrap_or(exe_dir),
        _ => exe_dir,
    };

    Ok(install_root.join(SESSION_DIR_NAME))
}

/// Normalizes a user-supplied session name into a filesystem-safe one.
///
/// Runs of characters outside `[A-Za-z0-9._-]` collapse to a single `-`,
/// surrounding dashes are stripped and the result is capped at 64 chars.
pub fn sanitize_name(raw: &str) -> Result<String, SessionStoreError> {
    let mut sanitized = String::with_capacity(raw.len());
    let mut in_replaced_run = false;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            sanitized.push(ch);
            in_replaced_run = false;
        } else if !in_replaced_run {
            sanitized.push('-');
            in_replaced_run = true;
        }
    }

    let trimmed: String = sanitized
        .trim_matches('-')
        .chars()
        .take(MAX_NAME_LEN)
        .collect();

    if trimmed.is_empty() || trimmed.chars().all(|ch| ch == '.') {
        return Err(SessionStoreError::InvalidName {
            raw: raw.to_string(),
        });
    }

    Ok(trimmed)
}

/// Timestamp-derived default name, `session-YYYY-MM-DD_HHMMSS`.
#[must_use]
pub fn default_session_name(now: OffsetDateTime) -> String {
    format!(
        "session-{:04}-{:02}-{:02}_{:02}{:02}{:02}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

#[must_use]
pub fn session_file_name(name: &str) -> String {
    format!("{name}.{SESSION_FILE_EXTENSION}")
}

#[must_use]
pub(crate) fn temp_file_name(name: &str) -> String {
    format!("{}.{}.tmp", session_file_name(name), uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn sanitize_collapses_unsafe_runs_and_strips_dashes() {
        assert_eq!(
            sanitize_name("  my cool/session!!  ").expect("valid"),
            "my-cool-session"
        );
        assert_eq!(sanitize_name("--a..b_c--").expect("valid"), "a..b_c");
        assert_eq!(sanitize_name("tab\tname").expect("valid"), "tab-name");
    }

    #[test]
    fn sanitize_truncates_to_64_chars() {
        let long = "x".repeat(100);
        assert_eq!(sanitize_name(&long).expect("valid").len(), 64);
    }

    #[test]
    fn sanitize_rejects_names_without_safe_characters() {
        for raw in ["", "   ", "///", "..", "."] {
            assert!(
                matches!(
                    sanitize_name(raw),
                    Err(SessionStoreError::InvalidName { .. })
                ),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn default_name_is_zero_padded() {
        let now = datetime!(2026-02-04 03:05:09 UTC);
        assert_eq!(default_session_name(now), "session-2026-02-04_030509");
    }

    #[test]
    fn store_root_prefers_absolute_override() {
        let root = store_root_from(
            Some(OsString::from("/var/lib/agent/sessions")),
            Path::new("/opt/agent/bin/coding_agent"),
        )
        .expect("override root");
        assert_eq!(root, PathBuf::from("/var/lib/agent/sessions"));
    }

    #[test]
    fn store_root_rejects_relative_override() {
        let result = store_root_from(
            Some(OsString::from("relative/sessions")),
            Path::new("/opt/agent/bin/coding_agent"),
        );
        assert!(matches!(result, Err(SessionStoreError::UnresolvedRoot(_))));
    }

    #[test]
    fn store_root_is_anchored_to_installation_root() {
        let from_bin = store_root_from(None, Path::new("/opt/agent/bin/coding_agent"))
            .expect("bin layout");
        assert_eq!(from_bin, PathBuf::from("/opt/agent/sessions"));

        let from_target = store_root_from(None, Path::new("/src/agent/target/debug/coding_agent"))
            .expect("target layout");
        assert_eq!(from_target, PathBuf::from("/src/agent/target/debug/sessions"));
    }

    #[test]
    fn temp_file_names_are_unique_siblings() {
        let first = temp_file_name("demo");
        let second = temp_file_name("demo");
        assert!(first.starts_with("demo.json."));
        assert!(first.ends_with(".tmp"));
        assert_ne!(first, second);
    }
}
