//! fill-clients: run the booking flow for the configured clients.
//!
//! Reads `config.json`, `clients.json` and a saved session from the working
//! directory and writes one result per client under `bot-output/fill-runs/`.
//! Log lines go to stdout, where the control server picks them up.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{ArgAction, Parser};
use tracing::info;

use slotbot_common::config::{load_clients, load_site_config, PLAYWRIGHT_STORAGE_FILE};
use slotbot_common::{ClientRecord, ClientSelection, Error, ProjectLayout};
use slotbot_runner::capture::{capture_session, CaptureOptions};
use slotbot_runner::run::apply_session;
use slotbot_runner::{default_chrome_path, ChromiumSession, FillRun, LaunchOptions};

/// Fill the appointment form for one or all configured clients
#[derive(Parser)]
#[command(name = "fill-clients")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Process only the client at this zero-based index
    #[arg(long)]
    index: Option<usize>,

    /// Process every client in clients.json (wins over --index)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    all: Option<bool>,

    /// Run the browser without a window; anything but "true" opens one
    #[arg(
        long,
        env = "HEADLESS",
        default_value = "true",
        value_parser = parse_headless,
        action = ArgAction::Set
    )]
    headless: bool,

    /// Project directory holding config.json and clients.json
    #[arg(long, env = "SLOTBOT_WORKDIR")]
    workdir: Option<PathBuf>,

    /// Browser executable
    #[arg(long)]
    chrome_path: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn selection(&self) -> ClientSelection {
        match (self.all, self.index) {
            (Some(true), _) => ClientSelection::All,
            (_, Some(index)) => ClientSelection::Index(index),
            _ => ClientSelection::First,
        }
    }
}

fn parse_headless(value: &str) -> Result<bool, String> {
    Ok(value.trim() == "true")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stdout)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let layout = match &cli.workdir {
        Some(dir) => ProjectLayout::new(dir),
        None => ProjectLayout::current_dir()?,
    };

    let config = load_site_config(&layout.config_path())?;
    let clients = load_clients(&layout.clients_path())?;
    let selected = cli.selection().select(&clients)?;
    if config.target_url().is_none() {
        return Err(Error::InvalidConfig("config.json needs checkUrl or baseUrl".into()).into());
    }

    let executable = cli.chrome_path.clone().or_else(default_chrome_path);

    let storage = match layout.find_storage_state() {
        Some(path) => path,
        None if cli.headless => {
            return Err(Error::NoStorageState(
                "Run once with HEADLESS=false to login interactively so the session can be saved."
                    .into(),
            )
            .into());
        }
        None => {
            info!("No saved session; a browser window opens for a manual login");
            capture_session(CaptureOptions {
                launch: LaunchOptions {
                    headless: false,
                    executable: executable.clone(),
                    ..Default::default()
                },
                url: config.login_url().to_string(),
                state_file: layout.root().join(PLAYWRIGHT_STORAGE_FILE),
                auto_save: false,
                reload_before_save: false,
                then: None,
            })
            .await
            .context("interactive login failed")?
        }
    };

    let session = ChromiumSession::launch(LaunchOptions {
        headless: cli.headless,
        executable,
        ..Default::default()
    })
    .await?;

    let outcome = fill(&session, &storage, FillRun::new(config, layout), &selected).await;
    session.close().await?;
    outcome
}

async fn fill(
    session: &ChromiumSession,
    storage: &Path,
    run: FillRun,
    selected: &[(usize, ClientRecord)],
) -> anyhow::Result<()> {
    apply_session(session, storage).await?;
    run.run(session, selected).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("fill-clients").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn all_wins_over_index() {
        let cli = parse(&["--all=true", "--index=1"]);
        assert!(matches!(cli.selection(), ClientSelection::All));

        let cli = parse(&["--index=1", "--all"]);
        assert!(matches!(cli.selection(), ClientSelection::All));

        let cli = parse(&["--all=false", "--index=1"]);
        assert!(matches!(cli.selection(), ClientSelection::Index(1)));

        let cli = parse(&["--headless=true"]);
        assert!(matches!(cli.selection(), ClientSelection::First));
    }

    #[test]
    fn only_true_means_headless() {
        assert!(parse(&["--headless=true"]).headless);
        assert!(!parse(&["--headless=false"]).headless);
        assert!(!parse(&["--headless=1"]).headless);
        assert!(!parse(&["--headless=yes"]).headless);

        assert_eq!(parse_headless(" true "), Ok(true));
        assert_eq!(parse_headless("TRUE"), Ok(false));
        assert_eq!(parse_headless(""), Ok(false));
    }
}
