//! REPL command parsing.
//!
//! Commands start with `/` or `\`, and the command word is matched
//! case-insensitively. A handful of harmless commands (`help`, `tools`,
//! `clear`, `paste`, `exit`, `quit`, `reset`, `config`) are also recognized
//! without a prefix. Any other unprefixed input is a prompt for the model.

use thiserror::Error;

/// Line that terminates `/paste` mode.
pub const PASTE_TERMINATOR: &str = "end";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Tools,
    Config,
    Clear,
    Paste,
    Reset,
    Quit,
    Cwd(String),
    Model(String),
    Approve(bool),
    /// `None` reports the current limit.
    Truncate(Option<usize>),
    Verbose(Option<bool>),
    Session,
    Sessions,
    NewSession(Option<String>),
    Load(String),
    Save(Option<String>),
    Rename { old: String, new: String },
    Delete(String),
    Autosave(Option<bool>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("truncate must be >= 0")]
    NegativeTruncate,
}

const NO_PREFIX_COMMANDS: &[&str] = &[
    "help", "tools", "clear", "paste", "exit", "quit", "reset", "config",
];

/// Parses one input line.
///
/// Returns `None` when the line is a prompt rather than a command.
pub fn parse_command(input: &str) -> Option<Result<SlashCommand, CommandError>> {
    let trimmed = input.trim();
    let (prefixed, body) = match trimmed.strip_prefix(['/', '\\']) {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };

    let mut words = body.split_whitespace();
    let head = words.next()?.to_ascii_lowercase();
    let rest: Vec<&str> = words.collect();

    if !prefixed && !NO_PREFIX_COMMANDS.contains(&head.as_str()) {
        return None;
    }

    Some(parse_head(&head, &rest))
}

/// Returns true when `line` ends `/paste` input.
#[must_use]
pub fn is_paste_terminator(line: &str) -> bool {
    let trimmed = line.trim();
    let body = trimmed.strip_prefix(['/', '\\']).unwrap_or(trimmed);
    body.trim().eq_ignore_ascii_case(PASTE_TERMINATOR)
}

/// Parses an on/off style argument.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" | "y" => Some(true),
        "off" | "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn parse_head(head: &str, rest: &[&str]) -> Result<SlashCommand, CommandError> {
    let joined = rest.join(" ");
    let first = rest.first().copied();

    let command = match head {
        "help" | "h" | "?" | "commands" => SlashCommand::Help,
        "tools" | "tool" | "ls-tools" => SlashCommand::Tools,
        "config" => SlashCommand::Config,
        "clear" | "cls" => SlashCommand::Clear,
        "paste" | "multiline" | "ml" => SlashCommand::Paste,
        "reset" => SlashCommand::Reset,
        "quit" | "exit" | "q" => SlashCommand::Quit,
        "cwd" => {
            if joined.is_empty() {
                return Err(CommandError::Usage("/cwd <path>"));
            }
            SlashCommand::Cwd(joined)
        }
        "model" => {
            if joined.is_empty() {
                return Err(CommandError::Usage("/model <name>"));
            }
            SlashCommand::Model(joined)
        }
        "approve" => first
            .and_then(parse_bool)
            .map(SlashCommand::Approve)
            .ok_or(CommandError::Usage("/approve on|off"))?,
        "truncate" => match first {
            None => SlashCommand::Truncate(None),
            Some(raw) => SlashCommand::Truncate(Some(parse_truncate(raw)?)),
        },
        "verbose" => match first {
            None => SlashCommand::Verbose(None),
            Some(raw) => SlashCommand::Verbose(Some(
                parse_bool(raw).ok_or(CommandError::Usage("/verbose on|off"))?,
            )),
        },
        "autosave" => match first {
            None => SlashCommand::Autosave(None),
            Some(raw) => SlashCommand::Autosave(Some(
                parse_bool(raw).ok_or(CommandError::Usage("/autosave on|off"))?,
            )),
        },
        "session" => SlashCommand::Session,
        "sessions" => SlashCommand::Sessions,
        "new-session" | "newsession" => SlashCommand::NewSession(non_empty(joined)),
        "load" => SlashCommand::Load(
            first
                .map(str::to_string)
                .ok_or(CommandError::Usage("/load <name>"))?,
        ),
        "save" => SlashCommand::Save(non_empty(joined)),
        "delete" => SlashCommand::Delete(
            first
                .map(str::to_string)
                .ok_or(CommandError::Usage("/delete <name>"))?,
        ),
        "rename" => match rest {
            [old, new, ..] => SlashCommand::Rename {
                old: (*old).to_string(),
                new: (*new).to_string(),
            },
            _ => return Err(CommandError::Usage("/rename <old> <new>")),
        },
        other => return Err(CommandError::Unknown(other.to_string())),
    };

    Ok(command)
}

fn parse_truncate(raw: &str) -> Result<usize, CommandError> {
    let value: i64 = raw
        .parse()
        .map_err(|_| CommandError::Usage("/truncate <number> (0 = no truncation)"))?;
    usize::try_from(value).map_err(|_| CommandError::NegativeTruncate)
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(input: &str) -> SlashCommand {
        parse_command(input)
            .expect("input should be a command")
            .expect("command should parse")
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert_eq!(parse_command("list files in src"), None);
        assert_eq!(parse_command("   "), None);
        assert_eq!(parse_command("load my-session"), None);
    }

    #[test]
    fn prefix_and_case_are_flexible() {
        assert_eq!(parsed("/HELP"), SlashCommand::Help);
        assert_eq!(parsed("\\tools"), SlashCommand::Tools);
        assert_eq!(parsed("  / quit  "), SlashCommand::Quit);
    }

    #[test]
    fn safe_commands_work_without_prefix() {
        assert_eq!(parsed("help"), SlashCommand::Help);
        assert_eq!(parsed("Exit"), SlashCommand::Quit);
        assert_eq!(parsed("reset"), SlashCommand::Reset);
        assert_eq!(parsed("config"), SlashCommand::Config);
    }

    #[test]
    fn aliases_map_to_canonical_commands() {
        assert_eq!(parsed("/?"), SlashCommand::Help);
        assert_eq!(parsed("/ls-tools"), SlashCommand::Tools);
        assert_eq!(parsed("/cls"), SlashCommand::Clear);
        assert_eq!(parsed("/ml"), SlashCommand::Paste);
        assert_eq!(parsed("/q"), SlashCommand::Quit);
        assert_eq!(parsed("/newsession"), SlashCommand::NewSession(None));
    }

    #[test]
    fn arguments_keep_their_case() {
        assert_eq!(
            parsed("/cwd ../My Project"),
            SlashCommand::Cwd("../My Project".to_string())
        );
        assert_eq!(
            parsed("/model GPT-4o"),
            SlashCommand::Model("GPT-4o".to_string())
        );
        assert_eq!(
            parsed("/rename Old New"),
            SlashCommand::Rename {
                old: "Old".to_string(),
                new: "New".to_string(),
            }
        );
    }

    #[test]
    fn boolean_arguments_accept_common_spellings() {
        assert_eq!(parsed("/approve yes"), SlashCommand::Approve(true));
        assert_eq!(parsed("/approve OFF"), SlashCommand::Approve(false));
        assert_eq!(parsed("/verbose 1"), SlashCommand::Verbose(Some(true)));
        assert_eq!(parsed("/verbose"), SlashCommand::Verbose(None));
        assert_eq!(parsed("/autosave n"), SlashCommand::Autosave(Some(false)));
        assert_eq!(
            parse_command("/approve maybe"),
            Some(Err(CommandError::Usage("/approve on|off")))
        );
    }

    #[test]
    fn truncate_reports_or_sets_and_rejects_negative() {
        assert_eq!(parsed("/truncate"), SlashCommand::Truncate(None));
        assert_eq!(parsed("/truncate 0"), SlashCommand::Truncate(Some(0)));
        assert_eq!(parsed("/truncate 25"), SlashCommand::Truncate(Some(25)));
        assert_eq!(
            parse_command("/truncate -3"),
            Some(Err(CommandError::NegativeTruncate))
        );
        assert!(matches!(
            parse_command("/truncate lots"),
            Some(Err(CommandError::Usage(_)))
        ));
    }

    #[test]
    fn session_commands_require_their_arguments() {
        assert_eq!(
            parse_command("/load"),
            Some(Err(CommandError::Usage("/load <name>")))
        );
        assert_eq!(
            parse_command("/delete"),
            Some(Err(CommandError::Usage("/delete <name>")))
        );
        assert_eq!(
            parse_command("/rename only-one"),
            Some(Err(CommandError::Usage("/rename <old> <new>")))
        );
        assert_eq!(parsed("/save"), SlashCommand::Save(None));
        assert_eq!(
            parsed("/save backup"),
            SlashCommand::Save(Some("backup".to_string()))
        );
    }

    #[test]
    fn unknown_prefixed_command_is_an_error() {
        assert_eq!(
            parse_command("/frobnicate"),
            Some(Err(CommandError::Unknown("frobnicate".to_string())))
        );
    }

    #[test]
    fn paste_terminator_accepts_prefix_variants() {
        assert!(is_paste_terminator("/end"));
        assert!(is_paste_terminator(" \\END "));
        assert!(is_paste_terminator("end"));
        assert!(!is_paste_terminator("the end"));
    }
}
