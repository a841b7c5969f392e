//! Interactive session capture
//!
//! Opens a visible browser on the login page, lets the operator sign in by
//! hand (captcha, 2FA, ...) and writes the resulting cookies and
//! localStorage to a storage-state file.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use slotbot_common::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::chromium::{ChromiumSession, LaunchOptions};
use crate::driver::BrowserPage;

/// Login page opened when nothing else is configured.
pub const DEFAULT_LOGIN_URL: &str = "https://visa.vfsglobal.com/ago/pt/bra/login";

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
const URL_WATCH_INTERVAL: Duration = Duration::from_secs(1);
const AUTO_SAVE_SETTLE: Duration = Duration::from_millis(1500);

/// Program launched once the session has been saved
#[derive(Debug, Clone)]
pub struct FollowUp {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

impl FollowUp {
    /// `fill-clients --all=true` headless in `workdir`.
    pub fn fill_all(program: PathBuf, workdir: PathBuf) -> Self {
        Self {
            program,
            args: vec!["--all=true".to_string()],
            workdir,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub launch: LaunchOptions,
    pub url: String,
    pub state_file: PathBuf,
    /// Save once, automatically, when the page leaves the login route.
    pub auto_save: bool,
    /// Reload the page right before the ENTER-triggered save.
    pub reload_before_save: bool,
    pub then: Option<FollowUp>,
}

/// Whether `url` looks like a page reached after signing in.
pub fn is_post_login_url(url: &str) -> bool {
    let url = url.to_lowercase();
    url.starts_with("http") && !url.contains("/login") && !url.contains("captcha")
}

/// Capture the page's storage state into `path`.
pub async fn save_session(page: &dyn BrowserPage, path: &Path) -> Result<()> {
    let state = page.storage_state().await?;
    if state.is_empty() {
        warn!("Captured session is empty; was the login completed?");
    }
    state.save(path)
}

/// Start the follow-up program without waiting for it. Its exit status is
/// only logged.
pub fn launch_follow_up(follow_up: &FollowUp) {
    let mut command = tokio::process::Command::new(&follow_up.program);
    command
        .args(&follow_up.args)
        .current_dir(&follow_up.workdir)
        .env("HEADLESS", "true")
        .stdin(Stdio::null());

    match command.spawn() {
        Ok(mut child) => {
            info!(
                "Launched {} {}",
                follow_up.program.display(),
                follow_up.args.join(" ")
            );
            let program = follow_up.program.display().to_string();
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) => info!("{} exited with {}", program, status),
                    Err(e) => warn!("Waiting on {} failed: {}", program, e),
                }
            });
        }
        Err(e) => warn!("Could not launch {}: {}", follow_up.program.display(), e),
    }
}

/// Run the interactive capture until the operator presses ENTER.
/// Returns the written state file.
pub async fn capture_session(options: CaptureOptions) -> Result<PathBuf> {
    let session = ChromiumSession::launch(options.launch.clone()).await?;

    if let Err(e) = session.goto(&options.url, NAVIGATION_TIMEOUT).await {
        warn!(
            "Could not open {} automatically ({}); navigate there in the browser window",
            options.url, e
        );
    }

    println!();
    println!("1) Sign in by hand in the browser window: {}", options.url);
    println!("   Solve any captcha or 2FA challenge there.");
    println!("2) Once on the dashboard, come back here and press ENTER to save the session.");
    if options.auto_save {
        println!("   The session is also saved once automatically when the browser leaves the login page.");
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(URL_WATCH_INTERVAL);
    let mut auto_saved = !options.auto_save;
    let mut follow_up_sent = false;

    loop {
        tokio::select! {
            _ = stdin.next_line() => break,
            _ = ticker.tick(), if !auto_saved => {
                let url = match session.current_url().await {
                    Ok(Some(url)) => url,
                    _ => continue,
                };
                if !is_post_login_url(&url) {
                    continue;
                }
                info!("Navigation detected to {}", url);
                tokio::time::sleep(AUTO_SAVE_SETTLE).await;
                auto_saved = true;
                match save_session(&session, &options.state_file).await {
                    Ok(()) => {
                        if let Some(follow_up) = &options.then {
                            launch_follow_up(follow_up);
                            follow_up_sent = true;
                        }
                    }
                    Err(e) => warn!("Automatic session save failed: {}", e),
                }
            }
        }
    }

    if options.reload_before_save {
        if let Err(e) = session.reload().await {
            warn!("Reload before save failed: {}", e);
        }
    }

    let saved = save_session(&session, &options.state_file).await;
    if saved.is_ok() && !follow_up_sent {
        if let Some(follow_up) = &options.then {
            launch_follow_up(follow_up);
        }
    }
    session.close().await?;
    saved?;
    Ok(options.state_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_and_captcha_pages_are_not_post_login() {
        assert!(!is_post_login_url("https://visa.example.test/ago/pt/bra/login"));
        assert!(!is_post_login_url("https://visa.example.test/LOGIN?next=/"));
        assert!(!is_post_login_url("https://challenge.example.test/captcha/1"));
        assert!(!is_post_login_url("about:blank"));
        assert!(!is_post_login_url(""));
        assert!(is_post_login_url("https://visa.example.test/ago/pt/bra/dashboard"));
    }

    #[test]
    fn fill_all_follow_up_args() {
        let f = FollowUp::fill_all("fill-clients".into(), ".".into());
        assert_eq!(f.args, vec!["--all=true".to_string()]);
    }
}
