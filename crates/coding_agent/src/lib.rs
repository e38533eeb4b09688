//! Interactive coding agent.
//!
//! ## Turn engine
//!
//! [`engine::run_turn`] drives one user turn: it streams a model response
//! through the [`agent_provider::ModelTransport`] seam, runs requested tool
//! calls one at a time, and loops until the model answers in plain text or
//! the per-turn iteration cap is reached. Completed and capped turns are
//! autosaved when the session asks for it.
//!
//! ## Tools
//!
//! [`tools::ToolRuntime`] owns a closed registry of built-in tools. Mutating
//! tools (`write_file`, `delete_file`, `apply_patch`, `shell`) pass through an
//! approval gate unless auto-approve is on. Every failure inside a tool call
//! becomes a tool result the model can react to.
//!
//! ## Provider bootstrap
//!
//! - `--provider mock` (or `CODING_AGENT_PROVIDER=mock`) runs offline.
//! - `--provider chat-api` talks to an OpenAI-compatible endpoint and needs
//!   `LLM_API_KEY`; `LLM_BASE_URL` points it at another host.
//!
//! Sessions live under the installation root (`<root>/sessions`), or under
//! `CODING_AGENT_SESSIONS_DIR` when set, never under the workspace.

pub mod commands;
pub mod config;
pub mod engine;
pub mod logging;
pub mod prompts;
pub mod providers;
pub mod repl;
pub mod tools;
