use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use slotbot_common::config::sibling_executable;
use slotbot_common::ProjectLayout;
use slotbot_web::{ControlServer, ServerConfig, Supervisor, SupervisorConfig};

/// HTTP control panel for the booking automation
#[derive(Parser)]
#[command(name = "slotbot-control")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Require this token on POST routes
    #[arg(long, env = "CONTROL_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Project directory holding config.json, clients.json and bot-output/
    #[arg(long, env = "SLOTBOT_WORKDIR")]
    workdir: Option<PathBuf>,

    /// Automation executable (defaults to fill-clients next to this binary)
    #[arg(long)]
    bot_program: Option<PathBuf>,

    /// Arguments passed to the automation
    #[arg(long = "bot-arg", allow_hyphen_values = true, default_value = "--all=true")]
    bot_args: Vec<String>,

    /// Static UI directory
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/web-ui"))]
    web_ui: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
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
        .with_writer(std::io::stderr)
        .init();

    let layout = match cli.workdir {
        Some(dir) => ProjectLayout::new(dir),
        None => ProjectLayout::current_dir()?,
    };

    let program = cli
        .bot_program
        .or_else(|| sibling_executable("fill-clients"))
        .ok_or_else(|| anyhow::anyhow!("cannot locate fill-clients, pass --bot-program"))?;
    if !program.exists() {
        warn!("Bot program {} not found; /start will fail", program.display());
    }

    let supervisor = Supervisor::new(SupervisorConfig::new(program, layout).with_args(cli.bot_args));
    let server = ControlServer::new(
        supervisor,
        ServerConfig {
            token: cli.token,
            web_ui: Some(cli.web_ui),
        },
    );

    let addr = SocketAddr::new(cli.host, cli.port);
    info!("Open http://{} to control the bot", addr);
    server.serve(addr).await
}
