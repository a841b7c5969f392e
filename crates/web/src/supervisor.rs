//! Supervision of the `fill-clients` child process.
//!
//! At most one child runs at a time. Its stdout and stderr are read line by
//! line, appended to the activity log and folded into a [`ProcessStatus`].

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use serde::Serialize;
use slotbot_common::ProjectLayout;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::classify::{
    classify_output, exit_message, CHECKING_MESSAGE, IDLE_MESSAGE, STARTING_MESSAGE,
    STOPPING_MESSAGE,
};
use crate::logbook::ActivityLog;
use crate::results::latest_screenshot_url;

pub const ALREADY_RUNNING: &str = "bot already running";
pub const NOT_RUNNING: &str = "bot is not running";

/// How long the waiter gives the output readers to drain after exit
const READER_DRAIN: Duration = Duration::from_secs(2);

/// What to launch and where
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub layout: ProjectLayout,
    /// Delay between SIGTERM and SIGKILL
    pub stop_grace: Duration,
}

impl SupervisorConfig {
    pub fn new(program: impl Into<PathBuf>, layout: ProjectLayout) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            layout,
            stop_grace: Duration::from_secs(5),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }
}

/// Body of `GET /status` (minus the envelope)
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStatus {
    pub running: bool,
    pub has_slot: bool,
    pub last_message: String,
    pub last_screenshot: Option<String>,
}

/// Result of a start/stop request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Outcome {
    pub ok: bool,
    pub message: String,
}

impl Outcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Running {
    pid: u32,
    generation: u64,
}

#[derive(Debug)]
struct State {
    running: Option<Running>,
    generation: u64,
    has_slot: bool,
    last_message: String,
    /// Screenshot resolved after the last child exited
    last_screenshot: Option<String>,
}

struct Inner {
    config: SupervisorConfig,
    log: ActivityLog,
    state: Mutex<State>,
}

/// Cheaply cloneable handle shared through the HTTP state
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let log = ActivityLog::new(config.layout.activity_log_path());
        Self {
            inner: Arc::new(Inner {
                config,
                log,
                state: Mutex::new(State {
                    running: None,
                    generation: 0,
                    has_slot: false,
                    last_message: IDLE_MESSAGE.to_string(),
                    last_screenshot: None,
                }),
            }),
        }
    }

    pub fn activity_log(&self) -> &ActivityLog {
        &self.inner.log
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.inner.config.layout
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running.is_some()
    }

    /// Snapshot of the child's state.
    ///
    /// While a child runs the screenshot is looked up on every call, so it
    /// follows `last_status.json` as the run moves on. The lookup happens
    /// outside the state lock.
    pub fn status(&self) -> ProcessStatus {
        let (running, has_slot, last_message, cached, generation) = {
            let state = self.inner.state.lock();
            let last_message = if !state.last_message.is_empty() {
                state.last_message.clone()
            } else if state.running.is_some() {
                CHECKING_MESSAGE.to_string()
            } else {
                IDLE_MESSAGE.to_string()
            };
            (
                state.running.is_some(),
                state.has_slot,
                last_message,
                state.last_screenshot.clone(),
                state.generation,
            )
        };

        let last_screenshot = match cached {
            Some(shot) if !running => Some(shot),
            _ => {
                let fresh = latest_screenshot_url(&self.inner.config.layout);
                if !running && fresh.is_some() {
                    let mut state = self.inner.state.lock();
                    if state.running.is_none() && state.generation == generation {
                        state.last_screenshot = fresh.clone();
                    }
                }
                fresh
            }
        };

        ProcessStatus {
            running,
            has_slot,
            last_message,
            last_screenshot,
        }
    }

    /// Launch the child unless one is already running.
    pub fn start(&self) -> anyhow::Result<Outcome> {
        let config = &self.inner.config;
        let mut state = self.inner.state.lock();
        if state.running.is_some() {
            return Ok(Outcome::rejected(ALREADY_RUNNING));
        }

        let mut child = Command::new(&config.program)
            .args(&config.args)
            .current_dir(config.layout.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(|e| {
                anyhow::anyhow!("failed to start {}: {}", config.program.display(), e)
            })?;

        let pid = child
            .id()
            .ok_or_else(|| anyhow::anyhow!("child exited before its pid was known"))?;
        state.generation += 1;
        let generation = state.generation;
        state.running = Some(Running { pid, generation });
        state.has_slot = false;
        state.last_screenshot = None;
        state.last_message = STARTING_MESSAGE.to_string();
        drop(state);

        self.inner.log.append("API start requested");
        info!("Started {} (pid {})", config.program.display(), pid);

        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(self.spawn_reader(stdout, Stream::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(self.spawn_reader(stderr, Stream::Stderr));
        }

        let this = self.clone();
        tokio::spawn(async move {
            let status = child.wait().await;
            for reader in readers {
                if tokio::time::timeout(READER_DRAIN, reader).await.is_err() {
                    debug!("Output reader still busy after exit");
                }
            }
            this.on_exit(generation, status);
        });

        Ok(Outcome::ok("bot started"))
    }

    /// SIGTERM the child, escalating to SIGKILL after the grace period.
    pub fn stop(&self) -> anyhow::Result<Outcome> {
        let running = {
            let mut state = self.inner.state.lock();
            let Some(running) = state.running else {
                return Ok(Outcome::rejected(NOT_RUNNING));
            };
            state.last_message = STOPPING_MESSAGE.to_string();
            running
        };

        self.inner.log.append("API stop requested");
        info!("Stopping bot (pid {})", running.pid);
        let pid = Pid::from_raw(running.pid as i32);
        kill(pid, Signal::SIGTERM).map_err(|e| anyhow::anyhow!("failed to stop bot: {}", e))?;

        let this = self.clone();
        let grace = self.inner.config.stop_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let same_child = this
                .inner
                .state
                .lock()
                .running
                .map(|r| r.generation == running.generation)
                .unwrap_or(false);
            if same_child && kill(pid, None).is_ok() && kill(pid, Signal::SIGKILL).is_ok() {
                warn!("Bot ignored SIGTERM, killed pid {}", running.pid);
                this.inner.log.append("Bot SIGKILL sent");
            }
        });

        Ok(Outcome::ok("stopping bot"))
    }

    fn spawn_reader<R>(&self, stream: R, kind: Stream) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => this.on_line(kind, &line),
                    Ok(None) => break,
                    Err(e) => {
                        debug!("Reading bot {} failed: {}", kind.label(), e);
                        break;
                    }
                }
            }
        })
    }

    fn on_line(&self, kind: Stream, line: &str) {
        let text = line.trim();
        if text.is_empty() {
            return;
        }
        self.inner
            .log
            .append(&format!("[bot {}] {}", kind.label(), text));

        match kind {
            Stream::Stderr => {
                self.inner.state.lock().last_message = text.to_string();
            }
            Stream::Stdout => {
                let classification = classify_output(text);
                let slot = classification.slot_detected();
                {
                    let mut state = self.inner.state.lock();
                    state.last_message = classification.message;
                    if let Some(has_slot) = classification.has_slot {
                        state.has_slot = has_slot;
                    }
                }
                if slot {
                    self.inner.log.append("Slot detected (heuristic)");
                }
            }
        }
    }

    fn on_exit(&self, generation: u64, status: std::io::Result<ExitStatus>) {
        let (code, signal) = match &status {
            Ok(status) => (status.code(), exit_signal(status)),
            Err(e) => {
                warn!("Waiting for bot failed: {}", e);
                (None, None)
            }
        };
        self.inner.log.append(&format!(
            "Bot exited code={} signal={}",
            code.map(|c| c.to_string()).unwrap_or_else(|| "null".into()),
            signal.as_deref().unwrap_or("null"),
        ));
        info!("Bot exited code={:?} signal={:?}", code, signal);

        let mut state = self.inner.state.lock();
        if state.running.map(|r| r.generation) == Some(generation) {
            state.running = None;
            state.last_screenshot = None;
            state.last_message = exit_message(code);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn label(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    status
        .signal()
        .map(|s| Signal::try_from(s).map(|s| s.to_string()).unwrap_or_else(|_| s.to_string()))
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<String> {
    None
}
