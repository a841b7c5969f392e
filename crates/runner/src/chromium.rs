//! Chromium-backed [`BrowserPage`] using chromiumoxide (CDP)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, CookieSameSite, TimeSinceEpoch};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::page::Page;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use slotbot_common::session::{NameValue, OriginState, SameSite, StorageCookie};
use slotbot_common::{Error, Result, StorageState};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::driver::{BrowserPage, SelectBy};

/// Launch options for a Chromium instance
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Persistent profile directory; a throwaway profile when `None`.
    pub user_data_dir: Option<PathBuf>,
    /// Browser binary; chromiumoxide's detection when `None`.
    pub executable: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

/// Platform's usual Google Chrome location, when it exists.
pub fn default_chrome_path() -> Option<PathBuf> {
    let candidate = if cfg!(target_os = "windows") {
        r"C:\Program Files\Google\Chrome\Application\chrome.exe"
    } else if cfg!(target_os = "macos") {
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"
    } else {
        "/usr/bin/google-chrome"
    };
    let path = PathBuf::from(candidate);
    path.exists().then_some(path)
}

fn browser_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Browser(format!("{}: {}", context, e))
}

/// Quote a string as a JavaScript literal.
fn js_str(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// A running browser with one page
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    console_task: Option<JoinHandle<()>>,
    console: Arc<Mutex<Vec<String>>>,
}

impl ChromiumSession {
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = &options.user_data_dir {
            std::fs::create_dir_all(dir)?;
            builder = builder.user_data_dir(dir);
        }
        if let Some(exe) = &options.executable {
            builder = builder.chrome_executable(exe);
        }
        for arg in &options.extra_args {
            builder = builder.arg(arg.as_str());
        }
        let config = builder
            .build()
            .map_err(|e| browser_err("invalid browser config", e))?;

        info!("Launching Chromium (headless={})", options.headless);
        debug!("Browser profile {:?}", options.user_data_dir);
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| browser_err("launch failed", e))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| browser_err("could not open page", e))?;

        let console = Arc::new(Mutex::new(Vec::new()));
        let console_task = match page.event_listener::<EventConsoleApiCalled>().await {
            Ok(mut events) => {
                let sink = console.clone();
                Some(tokio::spawn(async move {
                    while let Some(event) = events.next().await {
                        sink.lock().push(format_console(&event));
                    }
                }))
            }
            Err(e) => {
                warn!("Console capture unavailable");
                debug!("Console listener: {}", e);
                None
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
            console_task,
            console,
        })
    }

    pub async fn close(mut self) -> Result<()> {
        if let Some(task) = self.console_task.take() {
            task.abort();
        }
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed");
            debug!("Browser close: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        info!("Browser closed");
        Ok(())
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| browser_err("evaluate failed", e))?;
        result
            .into_value()
            .map_err(|e| browser_err("unexpected evaluate result", e))
    }
}

fn format_console(event: &EventConsoleApiCalled) -> String {
    let kind = format!("{:?}", event.r#type).to_lowercase();
    let text: Vec<String> = event
        .args
        .iter()
        .map(|arg| match (&arg.value, &arg.description) {
            (Some(Value::String(s)), _) => s.clone(),
            (Some(v), _) => v.to_string(),
            (None, Some(d)) => d.clone(),
            (None, None) => String::new(),
        })
        .collect();
    format!("{}: {}", kind, text.join(" "))
}

fn to_cookie_param(cookie: &StorageCookie) -> CookieParam {
    let mut param = CookieParam::new(cookie.name.clone(), cookie.value.clone());
    if !cookie.domain.is_empty() {
        param.domain = Some(cookie.domain.clone());
    }
    param.path = Some(cookie.path.clone());
    param.secure = Some(cookie.secure);
    param.http_only = Some(cookie.http_only);
    if !cookie.is_session() {
        param.expires = Some(TimeSinceEpoch::new(cookie.expires));
    }
    param.same_site = cookie.same_site.map(|s| match s {
        SameSite::Strict => CookieSameSite::Strict,
        SameSite::Lax => CookieSameSite::Lax,
        SameSite::None => CookieSameSite::None,
    });
    param
}

const INTERACTABLE_JS: &str = r#"(sel) => {
    const el = document.querySelector(sel);
    if (!el) return false;
    const style = window.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    if (el.getClientRects().length === 0) return false;
    return !el.disabled;
}"#;

const FILL_JS: &str = r#"(sel, value) => {
    const el = document.querySelector(sel);
    if (!el) return false;
    el.focus();
    const proto = Object.getPrototypeOf(el);
    const desc = Object.getOwnPropertyDescriptor(proto, 'value');
    if (desc && desc.set) { desc.set.call(el, value); } else { el.value = value; }
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return true;
}"#;

const SELECT_JS: &str = r#"(sel, by, wanted) => {
    const el = document.querySelector(sel);
    if (!el || !el.options) return 'missing';
    const opts = Array.from(el.options);
    const hit = by === 'label'
        ? opts.find(o => (o.label || o.textContent || '').trim() === wanted)
        : opts.find(o => o.value === wanted);
    if (!hit) return 'no-option';
    el.value = hit.value;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return 'ok';
}"#;

#[async_trait]
impl BrowserPage for ChromiumSession {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {
                debug!("Navigated to {}", url);
                Ok(())
            }
            Ok(Err(e)) => Err(browser_err(&format!("navigation to {} failed", url), e)),
            Err(_) => Err(Error::timeout(format!("navigation to {}", url), timeout)),
        }
    }

    async fn reload(&self) -> Result<()> {
        self.page
            .reload()
            .await
            .map_err(|e| browser_err("reload failed", e))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        self.page
            .url()
            .await
            .map_err(|e| browser_err("could not read url", e))
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        self.eval(format!(
            "document.querySelectorAll({}).length",
            js_str(selector)
        ))
        .await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| Error::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .await
            .map_err(|e| browser_err(&format!("click on {} failed", selector), e))?;
        debug!("Clicked {}", selector);
        Ok(())
    }

    async fn select_option(&self, selector: &str, by: SelectBy, value: &str) -> Result<()> {
        let outcome: String = self
            .eval(format!(
                "({})({}, {}, {})",
                SELECT_JS,
                js_str(selector),
                js_str(&by.to_string()),
                js_str(value)
            ))
            .await?;
        match outcome.as_str() {
            "ok" => Ok(()),
            "missing" => Err(Error::ElementNotFound(selector.to_string())),
            _ => Err(Error::ElementNotFound(format!(
                "option with {} {:?} in {}",
                by, value, selector
            ))),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        let script = format!("({})({})", INTERACTABLE_JS, js_str(selector));
        loop {
            if self.eval::<bool>(script.clone()).await.unwrap_or(false) {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(Error::timeout(selector, timeout));
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let done: bool = self
            .eval(format!(
                "({})({}, {})",
                FILL_JS,
                js_str(selector),
                js_str(value)
            ))
            .await?;
        if done {
            Ok(())
        } else {
            Err(Error::ElementNotFound(selector.to_string()))
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let data = self
            .page
            .screenshot(
                CaptureScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .map_err(|e| browser_err("screenshot failed", e))?;
        tokio::fs::write(path, data).await?;
        debug!("Saved screenshot {}", path.display());
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| browser_err("could not read page content", e))
    }

    async fn apply_storage_state(&self, state: &StorageState) -> Result<()> {
        if !state.cookies.is_empty() {
            let params: Vec<CookieParam> = state.cookies.iter().map(to_cookie_param).collect();
            self.page
                .set_cookies(params)
                .await
                .map_err(|e| browser_err("could not set cookies", e))?;
        }
        for origin in &state.origins {
            if origin.local_storage.is_empty() {
                continue;
            }
            let entries: Vec<(&str, &str)> = origin
                .local_storage
                .iter()
                .map(|kv| (kv.name.as_str(), kv.value.as_str()))
                .collect();
            let entries = serde_json::to_string(&entries)?;
            let script = format!(
                "if (location.origin === {}) {{ for (const [k, v] of {}) {{ try {{ localStorage.setItem(k, v); }} catch (e) {{}} }} }}",
                js_str(&origin.origin),
                entries
            );
            self.page
                .evaluate_on_new_document(script)
                .await
                .map_err(|e| browser_err("could not seed localStorage", e))?;
        }
        info!(
            "Applied storage state ({} cookies, {} origins)",
            state.cookies.len(),
            state.origins.len()
        );
        Ok(())
    }

    async fn storage_state(&self) -> Result<StorageState> {
        let cookies = self
            .page
            .get_cookies()
            .await
            .map_err(|e| browser_err("could not read cookies", e))?
            .into_iter()
            .map(|c| StorageCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                expires: if c.session { -1.0 } else { c.expires },
                http_only: c.http_only,
                secure: c.secure,
                same_site: c.same_site.map(|s| match s {
                    CookieSameSite::Strict => SameSite::Strict,
                    CookieSameSite::Lax => SameSite::Lax,
                    CookieSameSite::None => SameSite::None,
                }),
            })
            .collect();

        let snapshot: Value = self
            .eval(
                "(() => { try { return { origin: location.origin, items: Object.entries(localStorage) }; } catch (e) { return null; } })()"
                    .to_string(),
            )
            .await
            .unwrap_or(Value::Null);
        let mut origins = Vec::new();
        if let (Some(origin), Some(items)) = (
            snapshot.get("origin").and_then(Value::as_str),
            snapshot.get("items").and_then(Value::as_array),
        ) {
            let local_storage: Vec<NameValue> = items
                .iter()
                .filter_map(|pair| {
                    Some(NameValue {
                        name: pair.get(0)?.as_str()?.to_string(),
                        value: pair.get(1)?.as_str()?.to_string(),
                    })
                })
                .collect();
            if origin != "null" && !local_storage.is_empty() {
                origins.push(OriginState {
                    origin: origin.to_string(),
                    local_storage,
                });
            }
        }

        Ok(StorageState { cookies, origins })
    }

    fn drain_console(&self) -> Vec<String> {
        std::mem::take(&mut *self.console.lock())
    }
}
