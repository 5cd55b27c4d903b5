//! Command definitions for the pomotick CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

// ============================================================================
// CLI Structure
// ============================================================================

/// pomotick - a minimal Pomodoro timer
#[derive(Parser, Debug)]
#[command(
    name = "pomotick",
    version,
    about = "A minimal Pomodoro timer",
    long_about = "Alternates focus intervals and breaks. A background daemon keeps time and\n\
                  remembers the timer across restarts; the CLI toggles and inspects it.",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Data directory holding the socket, state, and settings
    #[arg(long, global = true, env = "POMOTICK_HOME", value_name = "DIR")]
    pub home: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start a focus interval, or stop the running interval or break
    Toggle,

    /// Show current timer status
    Status,

    /// Reset the completed focus interval counter
    Reset,

    /// Make the daemon re-read its settings file
    Reload,

    /// Run the timer daemon in the foreground
    Daemon,

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Tests
// ============================================================================
