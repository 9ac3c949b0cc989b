//! CLI module for switchboard
//!
//! Argument parsing for the `switchboard` binary. Uses clap for parsing and
//! owo-colors (through [`output::Output`]) for terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// switchboard - routes requests to specialist assistants
///
/// A coordinator classifies each request and hands it to the calendar,
/// search or code assistant, keeping per-session history and state.
#[derive(Parser, Debug)]
#[command(
    name = "switchboard",
    version,
    about = "Routes requests to specialist assistants backed by a local model",
    after_help = "EXAMPLES:\n    \
                  switchboard init                          # Write switchboard.toml\n    \
                  switchboard ask \"what is on today?\"       # One-shot request\n    \
                  switchboard chat --session work           # Interactive session\n    \
                  switchboard health --json                 # Breaker and session report"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "switchboard.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Print results as JSON (ask, health, capabilities, session)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write switchboard.toml, .env.example and .gitignore
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// Ollama model to configure
        #[arg(long, default_value = "llama3.2:3b")]
        model: String,

        /// Persist sessions in a SQLite file under data/
        #[arg(long)]
        sqlite: bool,
    },

    /// Send a single request and print the reply
    Ask {
        /// Session to continue; a new one is created when omitted
        #[arg(short, long)]
        session: Option<String>,

        /// The request text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Start an interactive session
    Chat {
        /// Session to continue; a new one is created when omitted
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Show circuit breaker states and active sessions
    Health,

    /// List workers and what they can do
    Capabilities,

    /// Show the stored state of a session
    Session {
        /// Session id
        id: String,

        /// Delete the session instead of showing it
        #[arg(long)]
        clear: bool,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
