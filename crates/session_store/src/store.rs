use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::error::SessionStoreError;
use crate::paths::{
    default_session_name, resolve_store_root, sanitize_name, session_file_name, temp_file_name,
    SESSION_FILE_EXTENSION,
};
use crate::schema::{
    Session, SessionFile, SessionFileRef, SessionSettings, SessionSummary, SESSION_FORMAT_VERSION,
};

/// Clock used to stamp sessions; injectable for deterministic tests.
pub type Clock = fn() -> OffsetDateTime;

/// Named-session persistence rooted at a fixed directory.
///
/// Every session lives in `<root>/<name>.json`. Writes go to a sibling temp
/// file that is then renamed over the target, so a crash leaves either the
/// previous or the new file, never a partial one.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
    clock: Clock,
}

impl SessionStore {
    /// Store root anchored to the installation, independent of the workspace.
    pub fn resolve_store_root() -> Result<PathBuf, SessionStoreError> {
        resolve_store_root()
    }

    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SessionStoreError> {
        Self::with_clock(root, OffsetDateTime::now_utc)
    }

    pub fn with_clock(root: impl Into<PathBuf>, clock: Clock) -> Result<Self, SessionStoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|source| SessionStoreError::io("creating session root", &root, source))?;
        Ok(Self { root, clock })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true when a session file for the sanitized `name` exists.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        sanitize_name(name).is_ok_and(|name| self.session_path(&name).is_file())
    }

    /// Creates and persists a new session.
    ///
    /// An explicit name that is already taken fails with `AlreadyExists`; an
    /// omitted name is derived from the clock and suffixed until unique.
    pub fn create(
        &self,
        name: Option<&str>,
        settings: SessionSettings,
    ) -> Result<Session, SessionStoreError> {
        let now = (self.clock)();
        let name = match name {
            Some(raw) => {
                let name = sanitize_name(raw)?;
                if self.session_path(&name).exists() {
                    return Err(SessionStoreError::already_exists(name));
                }
                name
            }
            None => self.unique_name(&default_session_name(now)),
        };

        let session = Session::new(name, format_timestamp(now)?, settings);
        self.write_atomically(&session.name, &session.to_file())?;
        info!(session = %session.name, "created session");
        Ok(session)
    }

    pub fn load(&self, name: &str) -> Result<Session, SessionStoreError> {
        let name = sanitize_name(name)?;
        let path = self.session_path(&name);
        if !path.is_file() {
            return Err(SessionStoreError::not_found(name));
        }

        let session = read_session(&path, &name)?;
        debug!(session = %name, messages = session.messages.len(), "loaded session");
        Ok(session)
    }

    /// Persists `session`.
    ///
    /// Without `as_name` the session's own file is overwritten. With `as_name`
    /// the session is written under the new name, which must be free, and on
    /// success becomes the session's name. Nothing changes on failure.
    pub fn save(
        &self,
        session: &mut Session,
        as_name: Option<&str>,
    ) -> Result<(), SessionStoreError> {
        let target = match as_name {
            Some(raw) => {
                let target = sanitize_name(raw)?;
                if target != session.name && self.session_path(&target).exists() {
                    return Err(SessionStoreError::already_exists(target));
                }
                target
            }
            None => session.name.clone(),
        };

        let updated_at = format_timestamp((self.clock)())?;
        let mut file = session.to_file();
        file.name = &target;
        file.updated_at = &updated_at;
        self.write_atomically(&target, &file)?;

        if target != session.name {
            info!(from = %session.name, to = %target, "saved session under new name");
            session.name = target;
        } else {
            debug!(session = %target, messages = session.messages.len(), "saved session");
        }
        session.updated_at = updated_at;
        Ok(())
    }

    /// Renames a stored session.
    ///
    /// Fails without touching disk when `old` is missing or `new` is taken.
    /// When `active` is the renamed session its name follows the file.
    pub fn rename(
        &self,
        old: &str,
        new: &str,
        active: &mut Session,
    ) -> Result<String, SessionStoreError> {
        let old = sanitize_name(old)?;
        let new = sanitize_name(new)?;
        let old_path = self.session_path(&old);
        if !old_path.is_file() {
            return Err(SessionStoreError::not_found(old));
        }
        if self.session_path(&new).exists() {
            return Err(SessionStoreError::already_exists(new));
        }

        let mut record = read_session(&old_path, &old)?;
        record.name.clone_from(&new);
        record.updated_at = format_timestamp((self.clock)())?;
        self.write_atomically(&new, &record.to_file())?;

        if let Err(source) = fs::remove_file(&old_path) {
            let new_path = self.session_path(&new);
            if let Err(cleanup) = fs::remove_file(&new_path) {
                warn!(path = %new_path.display(), error = %cleanup, "failed to roll back renamed session");
            }
            return Err(SessionStoreError::io(
                "removing renamed session",
                old_path,
                source,
            ));
        }

        if active.name == old {
            active.name.clone_from(&new);
            active.updated_at = record.updated_at;
        }
        info!(from = %old, to = %new, "renamed session");
        Ok(new)
    }

    /// Deletes a stored session.
    ///
    /// When `active` is the deleted session it is replaced by a freshly
    /// created one carrying the same settings, and `true` is returned.
    pub fn delete(&self, name: &str, active: &mut Session) -> Result<bool, SessionStoreError> {
        let name = sanitize_name(name)?;
        let path = self.session_path(&name);
        if !path.is_file() {
            return Err(SessionStoreError::not_found(name));
        }

        fs::remove_file(&path)
            .map_err(|source| SessionStoreError::io("deleting session", &path, source))?;
        info!(session = %name, "deleted session");

        if active.name != name {
            return Ok(false);
        }

        let mut replacement = self.create(None, active.settings.clone())?;
        replacement.workspace = active.workspace.clone();
        *active = replacement;
        Ok(true)
    }

    /// Lists stored sessions, most recently updated first. Unreadable files
    /// are skipped with a warning.
    pub fn list_all(&self) -> Result<Vec<SessionSummary>, SessionStoreError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|source| SessionStoreError::io("listing sessions", &self.root, source))?;

        let mut summaries = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|source| SessionStoreError::io("listing sessions", &self.root, source))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SESSION_FILE_EXTENSION)
                || !path.is_file()
            {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            match read_session(&path, name) {
                Ok(session) => summaries.push(SessionSummary {
                    name: session.name,
                    created_at: session.created_at,
                    updated_at: session.updated_at,
                    message_count: session.messages.len(),
                }),
                Err(error) => warn!(path = %path.display(), %error, "skipping unreadable session"),
            }
        }

        summaries.sort_by(|left, right| {
            parse_timestamp(&right.updated_at)
                .cmp(&parse_timestamp(&left.updated_at))
                .then_with(|| left.name.cmp(&right.name))
        });
        Ok(summaries)
    }

    /// Picks the session to activate at startup.
    ///
    /// An explicit name is loaded, or created when absent. Otherwise the most
    /// recently updated session is loaded, or a new one created if none exist.
    pub fn autoload_on_startup(
        &self,
        explicit_name: Option<&str>,
        settings: SessionSettings,
    ) -> Result<Session, SessionStoreError> {
        if let Some(raw) = explicit_name {
            let name = sanitize_name(raw)?;
            return if self.session_path(&name).is_file() {
                self.load(&name)
            } else {
                self.create(Some(&name), settings)
            };
        }

        match self.list_all()?.into_iter().next() {
            Some(latest) => self.load(&latest.name),
            None => self.create(None, settings),
        }
    }

    fn session_path(&self, name: &str) -> PathBuf {
        self.root.join(session_file_name(name))
    }

    fn unique_name(&self, base: &str) -> String {
        if !self.session_path(base).exists() {
            return base.to_string();
        }

        (2..)
            .map(|suffix| format!("{base}-{suffix}"))
            .find(|candidate| !self.session_path(candidate).exists())
            .unwrap_or_else(|| base.to_string())
    }

    fn write_atomically(
        &self,
        name: &str,
        file: &SessionFileRef<'_>,
    ) -> Result<(), SessionStoreError> {
        let mut contents =
            serde_json::to_string_pretty(file).map_err(|source| SessionStoreError::Serialize {
                name: name.to_string(),
                source,
            })?;
        contents.push('\n');

        let target = self.session_path(name);
        let temp = self.root.join(temp_file_name(name));
        let result = write_temp(&temp, contents.as_bytes()).and_then(|()| {
            fs::rename(&temp, &target)
                .map_err(|source| SessionStoreError::io("replacing session file", &target, source))
        });

        if result.is_err() {
            let _ = fs::remove_file(&temp);
        }
        result
    }
}

fn write_temp(path: &Path, contents: &[u8]) -> Result<(), SessionStoreError> {
    let mut file = File::create(path)
        .map_err(|source| SessionStoreError::io("creating temp session file", path, source))?;
    file.write_all(contents)
        .map_err(|source| SessionStoreError::io("writing temp session file", path, source))?;
    file.sync_all()
        .map_err(|source| SessionStoreError::io("syncing temp session file", path, source))
}

pub(crate) fn read_session(path: &Path, expected_name: &str) -> Result<Session, SessionStoreError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| SessionStoreError::io("reading session file", path, source))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|source| SessionStoreError::parse(path, source))?;

    let version = value
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);
    if version != SESSION_FORMAT_VERSION {
        return Err(SessionStoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: version,
        });
    }

    let file: SessionFile =
        serde_json::from_value(value).map_err(|source| SessionStoreError::parse(path, source))?;
    if file.name != expected_name {
        return Err(SessionStoreError::NameMismatch {
            path: path.to_path_buf(),
            expected: expected_name.to_string(),
            found: file.name,
        });
    }
    validate_rfc3339(path, "created_at", &file.created_at)?;
    validate_rfc3339(path, "updated_at", &file.updated_at)?;

    Ok(Session::from_file(file))
}

fn validate_rfc3339(path: &Path, field: &'static str, value: &str) -> Result<(), SessionStoreError> {
    if OffsetDateTime::parse(value, &Rfc3339).is_err() {
        return Err(SessionStoreError::InvalidTimestamp {
            path: path.to_path_buf(),
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}

fn format_timestamp(now: OffsetDateTime) -> Result<String, SessionStoreError> {
    now.format(&Rfc3339).map_err(SessionStoreError::ClockFormat)
}

fn parse_timestamp(value: &str) -> OffsetDateTime {
    OffsetDateTime::parse(value, &Rfc3339).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
