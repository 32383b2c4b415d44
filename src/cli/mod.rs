//! CLI argument parsing using clap 4.x derive macros

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Terminal host for the APEX HUD command and AI engine
///
/// Runs an interactive terminal session by default. Input that is not a
/// known command is answered by the configured AI providers, falling back
/// across tiers when one is unavailable.
#[derive(Parser, Debug)]
#[command(name = "apex-hud")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Submit this input right after the session starts
    #[arg(long)]
    pub cmd: Option<String>,

    /// Config file (default: ./apex-hud.toml, then the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Terminal id used as the persistence key
    #[arg(short, long)]
    pub terminal_id: Option<String>,

    /// Print version information
    #[arg(long)]
    pub version: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Talk to the companion chat panel
    Chat,

    /// Submit one input, print the resulting lines and exit
    Run {
        /// The input, as typed at the prompt
        #[arg(required = true, num_args = 1..)]
        input: Vec<String>,
    },

    /// Inspect or forget the stored session
    Session {
        #[command(subcommand)]
        cmd: SessionCommand,
    },

    /// Show where configuration is read from
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Print the stored session for this terminal id
    Show,
    /// Delete the stored session for this terminal id
    Clear,
}
