//! Session capture commands: `login` and `open`

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use tracing::debug;

use slotbot_common::config::{load_site_config, sibling_executable, STATE_FILE};
use slotbot_common::ProjectLayout;
use slotbot_runner::capture::{capture_session, CaptureOptions, FollowUp, DEFAULT_LOGIN_URL};
use slotbot_runner::{default_chrome_path, LaunchOptions};

use crate::output::{print_info, print_success, print_warning};

/// Browser options shared by `login` and `open`
#[derive(Args, Debug, Clone)]
pub struct BrowserArgs {
    /// Persistent browser profile directory
    #[arg(long, default_value = "user-data")]
    pub user_data: PathBuf,

    /// Browser executable (defaults to the usual Chrome location)
    #[arg(long)]
    pub chrome_path: Option<PathBuf>,

    /// Run without a window
    #[arg(long)]
    pub headless: bool,

    /// Where to write the captured session
    #[arg(long, default_value = STATE_FILE)]
    pub state_file: PathBuf,
}

impl BrowserArgs {
    fn launch_options(&self, layout: &ProjectLayout) -> LaunchOptions {
        LaunchOptions {
            headless: self.headless,
            user_data_dir: Some(resolve(layout, &self.user_data)),
            executable: self.chrome_path.clone().or_else(default_chrome_path),
            ..Default::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    #[command(flatten)]
    pub browser: BrowserArgs,

    /// Login page (defaults to baseUrl from config.json)
    #[arg(long)]
    pub url: Option<String>,

    /// Start `fill-clients --all=true` once the session is saved
    #[arg(long)]
    pub then_fill: bool,
}

#[derive(Args, Debug)]
pub struct OpenArgs {
    #[command(flatten)]
    pub browser: BrowserArgs,

    /// Page to open; asked for on the terminal when omitted
    #[arg(long)]
    pub url: Option<String>,
}

fn resolve(layout: &ProjectLayout, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        layout.root().join(path)
    }
}

/// `baseUrl` from `config.json` when there is one, else the stock login page.
fn configured_login_url(layout: &ProjectLayout) -> String {
    let base = load_site_config(&layout.config_path())
        .map_err(|e| debug!("No usable config.json: {}", e))
        .ok()
        .and_then(|c| c.base_url)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    base.unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string())
}

/// Operator answer to the URL prompt; blank keeps the default.
fn choose_url(answer: &str, default: &str) -> String {
    match answer.trim() {
        "" => default.to_string(),
        url => url.to_string(),
    }
}

fn prompt_url(default: &str) -> Result<String> {
    print!("URL to open [{}]: ", default);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(choose_url(&answer, default))
}

pub async fn execute_login(args: LoginArgs, layout: ProjectLayout) -> Result<()> {
    let url = args.url.unwrap_or_else(|| configured_login_url(&layout));

    let then = if args.then_fill {
        match sibling_executable("fill-clients") {
            Some(program) => Some(FollowUp::fill_all(program, layout.root().to_path_buf())),
            None => {
                print_warning("fill-clients not found next to this binary; --then-fill ignored");
                None
            }
        }
    } else {
        None
    };

    print_info(&format!("Opening {}", url));
    let saved = capture_session(CaptureOptions {
        launch: args.browser.launch_options(&layout),
        url,
        state_file: resolve(&layout, &args.browser.state_file),
        auto_save: true,
        reload_before_save: false,
        then,
    })
    .await?;

    print_success(&format!("Session saved to {}", saved.display()));
    if args.then_fill {
        print_info("fill-clients started in the background");
    }
    Ok(())
}

pub async fn execute_open(args: OpenArgs, layout: ProjectLayout) -> Result<()> {
    let url = match args.url {
        Some(url) => url,
        None => prompt_url(&configured_login_url(&layout))?,
    };

    let saved = capture_session(CaptureOptions {
        launch: args.browser.launch_options(&layout),
        url,
        state_file: resolve(&layout, &args.browser.state_file),
        auto_save: false,
        reload_before_save: true,
        then: None,
    })
    .await?;

    print_success(&format!("Session saved to {}", saved.display()));
    Ok(())
}
