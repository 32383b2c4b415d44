//! `apex-hud` - terminal host for the APEX HUD command and AI engine
//!
//! Hosts one terminal session, wires HTTP provider backends from the
//! configuration and renders the session's lines with `console` styles.

use anyhow::{Context, Result};
use clap::Parser;
use console::{Style, Term};
use std::path::Path;
use std::sync::Arc;

use apex_hud_core::config::{find_config_file, HudConfig};
use apex_hud_core::session::{FileStore, PersistenceManager, SessionStore, TerminalSession};

use crate::cli::{Cli, Commands, SessionCommand};
use crate::render::LineRenderer;

mod chat;
mod cli;
mod logging;
mod render;
mod repl;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        let blue = Style::new().blue();
        println!(
            "{} v{} ({})",
            blue.apply_to("apex-hud"),
            env!("CARGO_PKG_VERSION"),
            env!("GIT_HASH")
        );
        return Ok(());
    }

    let log_path = logging::init().context("Failed to initialize logging")?;
    tracing::info!("apex-hud {} starting, logging to {}", env!("CARGO_PKG_VERSION"), log_path.display());

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(id) = &cli.terminal_id {
        config.terminal.terminal_id = id.clone();
    }
    config.validate().context("Invalid configuration")?;

    let store: Arc<dyn SessionStore> = Arc::new(FileStore::default_location());

    match &cli.command {
        None => {
            let session = TerminalSession::from_config(&config, store, http_client()?);
            repl::run(session, cli.cmd.as_deref(), config.terminal.prewarm_on_start).await?;
        }

        Some(Commands::Chat) => {
            chat::run(&config, http_client()?).await?;
        }

        Some(Commands::Run { input }) => {
            let session = TerminalSession::from_config(&config, store, http_client()?);
            run_once(session, &input.join(" ")).await?;
        }

        Some(Commands::Session { cmd }) => {
            let manager = PersistenceManager::with_options(
                store,
                config.terminal.terminal_id.clone(),
                config.terminal.session_max_age(),
                config.terminal.history_cap,
                None,
            );
            match cmd {
                SessionCommand::Show => show_session(&manager)?,
                SessionCommand::Clear => {
                    manager.clear();
                    println!("Cleared stored session for {}", manager.terminal_id());
                }
            }
        }

        Some(Commands::Config { init }) => {
            show_config(cli.config.as_deref(), *init)?;
        }
    }

    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<HudConfig> {
    match explicit {
        Some(path) => HudConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(HudConfig::load_or_default()),
    }
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("apex-hud/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Submit one input and print what it produced
async fn run_once(mut session: TerminalSession, input: &str) -> Result<()> {
    let term = Term::stdout();
    let mut renderer = LineRenderer::new();

    session.start().await;
    // Only lines produced by this input are printed
    renderer.mark_printed(&session.visible_lines());

    session.submit(input).await;
    renderer.print_new(&term, &session.visible_lines())?;
    session.teardown();
    Ok(())
}

fn show_session(manager: &PersistenceManager) -> Result<()> {
    let Some(snapshot) = manager.load() else {
        println!("No stored session for {}", manager.terminal_id());
        return Ok(());
    };

    let term = Term::stdout();
    let renderer = LineRenderer::new();
    let dim = Style::new().dim();

    println!(
        "{}",
        dim.apply_to(format!(
            "Session {} ({} lines, {} history entries)",
            manager.session_id(),
            snapshot.lines.len(),
            snapshot.history.len()
        ))
    );
    for line in &snapshot.lines {
        term.write_line(&renderer.render(line))?;
    }
    Ok(())
}

fn show_config(explicit: Option<&Path>, init: bool) -> Result<()> {
    let found = explicit.map(Path::to_path_buf).or_else(find_config_file);
    match found {
        Some(path) => println!("Config: {}", path.display()),
        None => println!("Config: none found, using defaults"),
    }

    if init {
        let path = HudConfig::default_path().context("No config directory on this platform")?;
        if path.exists() {
            println!("{} already exists", path.display());
        } else {
            HudConfig::default()
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote default config to {}", path.display());
        }
    }
    Ok(())
}
