mod support;

use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::Path;
use std::sync::mpsc;

use agent_provider::{ModelTransport, Role};
use agent_provider_mock::{MockTransport, ScriptedReply, ScriptedTransport};
use clap::Parser;
use coding_agent::config::{AgentConfig, Cli};
use coding_agent::repl::{Console, Repl};
use serde_json::json;
use session_store::{SessionSettings, SessionStore};
use support::{call, SharedBuffer};
use tempfile::TempDir;

struct Harness {
    workspace: TempDir,
    sessions: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self {
            workspace: tempfile::tempdir().expect("workspace dir"),
            sessions: tempfile::tempdir().expect("sessions dir"),
        }
    }

    fn store(&self) -> SessionStore {
        SessionStore::open(self.sessions.path()).expect("session store")
    }

    fn seed(&self, name: &str) {
        self.store()
            .create(Some(name), SessionSettings::default())
            .expect("seed session");
    }

    fn repl(
        &self,
        args: &[&str],
        transport: Box<dyn ModelTransport>,
        input: &str,
    ) -> (Repl, SharedBuffer) {
        self.repl_reading(
            args,
            transport,
            Box::new(Cursor::new(input.as_bytes().to_vec())),
        )
    }

    fn repl_reading(
        &self,
        args: &[&str],
        transport: Box<dyn ModelTransport>,
        input: Box<dyn BufRead + Send>,
    ) -> (Repl, SharedBuffer) {
        let mut argv = vec!["coding-agent", "--model", "test-model"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).expect("arguments should parse");
        let config = AgentConfig::from_cli_in(cli, self.workspace.path()).expect("config");

        let output = SharedBuffer::default();
        let repl = Repl::new(
            config,
            self.store(),
            transport,
            input,
            Console::new(output.clone()),
        )
        .expect("repl should start");
        (repl, output)
    }
}

/// Input that never yields a line until the sender side is dropped.
struct StalledInput {
    release: mpsc::Receiver<()>,
}

impl Read for StalledInput {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        let _ = self.release.recv();
        Ok(0)
    }
}

fn mock() -> Box<dyn ModelTransport> {
    Box::new(MockTransport::new("test-model"))
}

fn file_exists(root: &Path, name: &str) -> bool {
    root.join(name).exists()
}

#[test]
fn prompt_round_trip_streams_reply_and_autosaves() {
    let harness = Harness::new();
    let (mut repl, output) = harness.repl(&["-s", "chat"], mock(), "hello agent\n/quit\n");

    repl.run().expect("repl loop");

    let printed = output.contents();
    assert!(printed.contains("Mock reply to: hello agent"), "{printed}");
    assert!(printed.contains("--- chat"), "{printed}");

    let saved = harness.store().load("chat").expect("saved session");
    let roles: Vec<Role> = saved.messages.iter().map(|message| message.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
}

#[test]
fn rename_onto_existing_session_keeps_current_name() {
    let harness = Harness::new();
    harness.seed("alpha");
    harness.seed("beta");
    let (mut repl, output) = harness.repl(&["-s", "alpha"], mock(), "/rename alpha beta\n");

    repl.run().expect("repl loop");

    assert!(output.contents().contains("[error]"), "{}", output.contents());
    assert_eq!(repl.session().name(), "alpha");
    assert!(harness.store().exists("alpha"));
}

#[test]
fn save_under_taken_name_is_refused() {
    let harness = Harness::new();
    harness.seed("alpha");
    harness.seed("beta");
    let (mut repl, output) = harness.repl(&["-s", "alpha"], mock(), "/save beta\n");

    repl.run().expect("repl loop");

    assert!(output
        .contents()
        .contains("[error] Session already exists: beta (choose a new name)"));
    assert_eq!(repl.session().name(), "alpha");
}

#[test]
fn deleting_active_session_switches_to_a_fresh_one() {
    let harness = Harness::new();
    harness.seed("alpha");
    let (mut repl, output) = harness.repl(&["-s", "alpha"], mock(), "/delete alpha\n");

    repl.run().expect("repl loop");

    let printed = output.contents();
    assert!(printed.contains("Deleted session: alpha"), "{printed}");
    assert!(printed.contains("Switched to new session: "), "{printed}");
    assert_ne!(repl.session().name(), "alpha");
    assert!(!harness.store().exists("alpha"));
    assert_eq!(
        repl.session().workspace.as_deref(),
        Some(repl.workspace().root().display().to_string().as_str())
    );
}

#[test]
fn declined_write_prompt_leaves_workspace_unchanged() {
    let harness = Harness::new();
    let transport = ScriptedTransport::new([
        ScriptedReply::tool_calls(vec![call(
            "w1",
            "write_file",
            json!({"path": "a.txt", "content": "data"}),
        )]),
        ScriptedReply::text("Okay, not writing it."),
    ]);
    let (mut repl, output) = harness.repl(
        &["-s", "chat", "--no-auto-approve"],
        Box::new(transport),
        "create a.txt\nn\n",
    );

    repl.run().expect("repl loop");

    let printed = output.contents();
    assert!(printed.contains("Approve write_file a.txt? [y/N]: "), "{printed}");
    assert!(printed.contains("Okay, not writing it."), "{printed}");
    assert!(!file_exists(harness.workspace.path(), "a.txt"));
}

#[test]
fn settings_commands_report_their_state() {
    let harness = Harness::new();
    let (mut repl, output) = harness.repl(
        &["-s", "chat"],
        mock(),
        "/approve on\n/truncate 0\n/verbose\n/model other-model\n/frobnicate\n",
    );

    repl.run().expect("repl loop");

    let printed = output.contents();
    assert!(printed.contains("Auto-approve: ON"), "{printed}");
    assert!(printed.contains("Tool output truncation: OFF"), "{printed}");
    assert!(printed.contains("verbose = "), "{printed}");
    assert!(printed.contains("Model set: other-model"), "{printed}");
    assert!(printed.contains("[error] Unknown command: frobnicate"), "{printed}");
    assert!(repl.auto_approve());
    assert_eq!(repl.session().settings.truncate_lines, 0);
    assert_eq!(repl.session().settings.model, "other-model");
}

#[test]
fn cwd_command_rejects_missing_directory() {
    let harness = Harness::new();
    let (mut repl, output) = harness.repl(&["-s", "chat"], mock(), "/cwd does-not-exist\n");
    let before = repl.workspace().root().to_path_buf();

    repl.run().expect("repl loop");

    assert!(output.contents().contains("[error] Path does not exist"), "{}", output.contents());
    assert_eq!(repl.workspace().root(), before.as_path());
}

#[test]
fn interrupt_at_idle_prompt_ends_the_loop_cleanly() {
    let harness = Harness::new();
    let (_release, stalled) = mpsc::channel();
    let (mut repl, output) = harness.repl_reading(
        &["-s", "chat"],
        mock(),
        Box::new(BufReader::new(StalledInput { release: stalled })),
    );

    repl.interrupt_notifier().notify();
    repl.run().expect("interrupt should end the loop without an error");

    let printed = output.contents();
    assert!(printed.ends_with("[user]: \n"), "{printed}");
    assert_eq!(repl.session().name(), "chat");
}
