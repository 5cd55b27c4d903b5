//! pomotick - a minimal Pomodoro timer
//!
//! Alternates focus intervals and breaks:
//! - 25 minutes of focus
//! - 5 minutes of break
//! - stops after each break until toggled again

use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use pomotick::cli::{Cli, Commands, Display, IpcClient};
use pomotick::daemon::{run_daemon, SystemClock};
use pomotick::paths::AppPaths;

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` wins over the verbosity flag.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "info"
    } else {
        "warn"
    }
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    let command = match cli.command {
        Some(command) => command,
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
            return Ok(());
        }
    };

    if let Commands::Completions { shell } = command {
        generate_completions(shell);
        return Ok(());
    }

    let paths = AppPaths::resolve(cli.home.as_deref())?;
    tracing::info!(home = %paths.root().display(), "using data directory");

    match command {
        Commands::Toggle => {
            let response = IpcClient::new(&paths).toggle().await?;
            Display::show_toggle_success(&response);
        }
        Commands::Status => {
            let response = IpcClient::new(&paths).status().await?;
            Display::show_status(&response);
        }
        Commands::Reset => {
            let response = IpcClient::new(&paths).reset().await?;
            Display::show_reset_success(&response);
        }
        Commands::Reload => {
            let response = IpcClient::new(&paths).reload().await?;
            Display::show_reload_success(&response);
        }
        Commands::Daemon => {
            run_daemon(paths, Arc::new(SystemClock)).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
