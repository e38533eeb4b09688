use std::io::{self, BufReader};

use anyhow::Context;
use clap::Parser;
use coding_agent::config::{AgentConfig, Cli};
use coding_agent::repl::{install_interrupt_handler, Console, Repl};
use coding_agent::{logging, providers};
use session_store::SessionStore;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let config = AgentConfig::from_cli(Cli::parse()).context("invalid configuration")?;
    logging::init_logging(config.log_level.as_deref())?;

    let exe = std::env::current_exe().context("cannot locate the running executable")?;
    let store_root = session_store::store_root_from(config.sessions_dir_override(), &exe)
        .context("cannot resolve the session directory")?;
    let store = SessionStore::open(&store_root)
        .with_context(|| format!("cannot open session directory {}", store_root.display()))?;

    let transport = providers::transport_for(&config).context("cannot start model provider")?;
    info!(
        provider = %config.provider.as_str(),
        model = %config.model,
        workspace = %config.workspace.display(),
        "starting coding agent"
    );

    let input = Box::new(BufReader::new(io::stdin()));
    let mut repl = Repl::new(config, store, transport, input, Console::stdout())
        .context("cannot start session")?;
    let _interrupts = install_interrupt_handler(
        repl.cancel_signal(),
        repl.turn_active(),
        repl.interrupt_notifier(),
    )
    .context("cannot install Ctrl-C handler")?;

    repl.print_banner();
    repl.run()?;
    Ok(())
}
