use agent_provider::{Message, Role};
use serde::{Deserialize, Serialize};

pub const SESSION_FORMAT_VERSION: u64 = 1;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TRUNCATE_LINES: usize = 10;

/// Per-session settings snapshot persisted with the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSettings {
    pub autosave: bool,
    pub truncate_lines: usize,
    pub verbose: bool,
    pub model: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            autosave: true,
            truncate_lines: DEFAULT_TRUNCATE_LINES,
            verbose: false,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// In-memory conversation record.
///
/// The name is only changed through [`crate::SessionStore`] so that it always
/// refers to the file the session was loaded from or last saved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub(crate) name: String,
    pub created_at: String,
    pub updated_at: String,
    pub settings: SessionSettings,
    pub workspace: Option<String>,
    pub messages: Vec<Message>,
}

impl Session {
    /// Builds an unsaved session. Callers normally go through
    /// [`crate::SessionStore::create`], which also reserves the name on disk.
    #[must_use]
    pub fn new(name: impl Into<String>, created_at: impl Into<String>, settings: SessionSettings) -> Self {
        let created_at = created_at.into();
        Self {
            name: name.into(),
            updated_at: created_at.clone(),
            created_at,
            settings,
            workspace: None,
            messages: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drops every message except a leading system message.
    pub fn reset(&mut self) {
        let system = self
            .messages
            .first()
            .filter(|message| message.role == Role::System)
            .cloned();
        self.messages.clear();
        self.messages.extend(system);
    }

    /// Replaces the leading system message, inserting one if absent.
    pub fn set_system_message(&mut self, content: impl Into<String>) {
        let message = Message::system(content);
        match self.messages.first_mut() {
            Some(first) if first.role == Role::System => *first = message,
            _ => self.messages.insert(0, message),
        }
    }

    pub(crate) fn to_file(&self) -> SessionFileRef<'_> {
        SessionFileRef {
            version: SESSION_FORMAT_VERSION,
            name: &self.name,
            created_at: &self.created_at,
            updated_at: &self.updated_at,
            settings: &self.settings,
            workspace: self.workspace.as_deref(),
            messages: &self.messages,
        }
    }

    pub(crate) fn from_file(file: SessionFile) -> Self {
        Self {
            name: file.name,
            created_at: file.created_at,
            updated_at: file.updated_at,
            settings: file.settings,
            workspace: file.workspace,
            messages: file.messages,
        }
    }
}

/// Listing entry returned by [`crate::SessionStore::list_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionFileRef<'a> {
    pub version: u64,
    pub name: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
    pub settings: &'a SessionSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<&'a str>,
    pub messages: &'a [Message],
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SessionFile {
    #[allow(dead_code)]
    pub version: u64,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub settings: SessionSettings,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("demo", "2026-02-14T00:00:00Z", SessionSettings::default())
    }

    #[test]
    fn reset_keeps_only_leading_system_message() {
        let mut session = session();
        session.set_system_message("rules");
        session.messages.push(Message::user("hi"));
        session.messages.push(Message::assistant("hello", Vec::new()));

        session.reset();
        assert_eq!(session.messages, vec![Message::system("rules")]);
    }

    #[test]
    fn set_system_message_replaces_in_place() {
        let mut session = session();
        session.messages.push(Message::user("hi"));
        session.set_system_message("first");
        session.set_system_message("second");

        assert_eq!(
            session.messages,
            vec![Message::system("second"), Message::user("hi")]
        );
    }
}
