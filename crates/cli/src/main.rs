//! slotbot CLI - Main Entry Point
//!
//! Operator commands around the booking automation: sign in by hand and
//! save the browser session that `fill-clients` reuses.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use slotbot_common::ProjectLayout;

mod commands;
mod output;

use commands::session;

/// slotbot - visa appointment booking helper
#[derive(Parser)]
#[command(name = "slotbot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory holding config.json and the saved session
    #[arg(long, env = "SLOTBOT_WORKDIR", global = true)]
    workdir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in by hand and save the session (auto-saves after login)
    Login(session::LoginArgs),

    /// Open any page, sign in by hand and save the session on ENTER
    Open(session::OpenArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let layout = match cli.workdir {
        Some(dir) => ProjectLayout::new(dir),
        None => ProjectLayout::current_dir()?,
    };

    match cli.command {
        Commands::Login(args) => session::execute_login(args, layout).await?,
        Commands::Open(args) => session::execute_open(args, layout).await?,
        Commands::Version => {
            println!("slotbot v{}", slotbot_common::VERSION);
        }
    }

    Ok(())
}
