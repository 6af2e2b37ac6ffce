//! Per-request browser session lifecycle.
//!
//! Every page fetch gets a fresh headless Chrome process with its own
//! throwaway profile directory; nothing is carried between requests. The
//! session is released on every exit path — success, navigation failure,
//! element-wait timeout, or fault — so no browser processes leak under
//! concurrent load.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::{Child, Command};
use toolgate_core::{Error, PageContent, Result, WaitTimeout};
use tracing::{debug, info, warn};

use super::cdp::CdpClient;
use super::extract::text_from_html;
use crate::dispatch::PageBackend;

const LAUNCH_TIMEOUT_SECS: u64 = 15;
const ELEMENT_POLL_INTERVAL_MS: u64 = 200;

/// Count of currently open browser sessions. Opens and closes must balance;
/// exposed so tests and the health endpoint can observe leaks.
#[derive(Clone, Default)]
pub struct SessionGauge(Arc<AtomicUsize>);

impl SessionGauge {
    fn opened(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn active(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct BrowserManager {
    gauge: SessionGauge,
    data_dir: PathBuf,
}

impl BrowserManager {
    pub fn new() -> Self {
        Self {
            gauge: SessionGauge::default(),
            data_dir: std::env::temp_dir().join("toolgate-browser"),
        }
    }

    pub fn gauge(&self) -> SessionGauge {
        self.gauge.clone()
    }

    /// Launch an isolated browser and connect to its page target.
    async fn open(&self) -> Result<PageSession> {
        let chrome = find_browser_binary().ok_or_else(|| {
            Error::Session("no Chrome/Chromium binary found on this system".to_string())
        })?;

        let user_data_dir = self
            .data_dir
            .join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&user_data_dir)?;

        let debug_port = find_free_port().await?;
        let args = build_browser_args(debug_port, &user_data_dir);

        debug!(port = debug_port, "launching browser session");
        let child = Command::new(&chrome)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Session(format!("failed to launch browser: {}", e)))?;

        match Self::connect(debug_port).await {
            Ok(cdp) => {
                self.gauge.opened();
                Ok(PageSession {
                    child,
                    cdp,
                    user_data_dir,
                    gauge: self.gauge.clone(),
                    released: false,
                })
            }
            Err(e) => {
                // The process spawned but CDP never came up; reap it here.
                let mut child = child;
                let _ = child.kill().await;
                let _ = std::fs::remove_dir_all(&user_data_dir);
                Err(e)
            }
        }
    }

    async fn connect(debug_port: u16) -> Result<CdpClient> {
        wait_for_cdp_ready(debug_port, LAUNCH_TIMEOUT_SECS).await?;
        let ws_url = get_page_ws_url(debug_port).await?;
        let cdp = CdpClient::connect(&ws_url).await?;
        cdp.enable_domain("Page").await?;
        cdp.enable_domain("Runtime").await?;
        Ok(cdp)
    }
}

impl Default for BrowserManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageBackend for BrowserManager {
    async fn fetch(
        &self,
        url: &str,
        wait_for_element: Option<&str>,
        wait_secs: u64,
    ) -> Result<PageContent> {
        // Reject malformed URLs before spending a browser launch on them.
        validate_url(url)?;

        let mut session = self.open().await?;
        let result = drive(&mut session, url, wait_for_element, wait_secs).await;
        session.close().await;

        match &result {
            Ok(page) => info!(
                url = %url,
                chars = page.text.len(),
                timed_out = page.wait_timed_out.is_some(),
                "page fetch finished"
            ),
            Err(e) => warn!(url = %url, error = %e, "page fetch failed"),
        }
        result
    }
}

/// Navigate, wait, extract. The caller owns teardown, so any early return
/// here still releases the session.
async fn drive(
    session: &mut PageSession,
    url: &str,
    wait_for_element: Option<&str>,
    wait_secs: u64,
) -> Result<PageContent> {
    let mut load_events = session.cdp.subscribe_event("Page.loadEventFired").await;

    let nav = session.cdp.navigate(url).await?;
    if let Some(error_text) = nav.get("errorText").and_then(|v| v.as_str()) {
        if !error_text.is_empty() {
            return Err(Error::NavigationError {
                url: url.to_string(),
                cause: error_text.to_string(),
            });
        }
    }

    // One deadline covers the load wait and the element wait together, so a
    // page that never fires load cannot stretch the fetch past wait_secs.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(wait_secs);
    let _ = tokio::time::timeout_at(deadline, load_events.recv()).await;

    let wait_timed_out = match wait_for_element {
        None => None,
        Some(selector) => {
            let escaped = serde_json::to_string(selector)?;
            let expression = format!("document.querySelector({}) !== null", escaped);
            let cdp = &session.cdp;
            wait_for_element_until(deadline, selector, wait_secs, || {
                let expression = expression.clone();
                async move {
                    let result = cdp.evaluate_js(&expression).await?;
                    Ok(result
                        .pointer("/result/value")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false))
                }
            })
            .await?
        }
    };

    let html = session.outer_html().await?;
    Ok(PageContent {
        text: text_from_html(&html),
        wait_timed_out,
    })
}

/// Poll `found` until it reports the element or the deadline passes. Expiry
/// is the soft-failure flag, not an error; probe failures propagate.
async fn wait_for_element_until<F, Fut>(
    deadline: tokio::time::Instant,
    selector: &str,
    wait_secs: u64,
    mut found: F,
) -> Result<Option<WaitTimeout>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool>>,
{
    let poll = async {
        loop {
            if found().await? {
                return Ok::<_, Error>(());
            }
            tokio::time::sleep(Duration::from_millis(ELEMENT_POLL_INTERVAL_MS)).await;
        }
    };
    match tokio::time::timeout_at(deadline, poll).await {
        Ok(result) => {
            result?;
            Ok(None)
        }
        Err(_) => Ok(Some(WaitTimeout {
            selector: selector.to_string(),
            wait_secs,
        })),
    }
}

fn validate_url(url: &str) -> Result<()> {
    let parsed = url::Url::parse(url).map_err(|e| Error::NavigationError {
        url: url.to_string(),
        cause: format!("invalid URL: {}", e),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::NavigationError {
            url: url.to_string(),
            cause: format!("unsupported scheme '{}'", scheme),
        }),
    }
}

/// One ephemeral browser process plus its CDP connection.
struct PageSession {
    child: Child,
    cdp: CdpClient,
    user_data_dir: PathBuf,
    gauge: SessionGauge,
    released: bool,
}

impl PageSession {
    async fn outer_html(&self) -> Result<String> {
        let result = self
            .cdp
            .evaluate_js("document.documentElement.outerHTML")
            .await?;
        result
            .pointer("/result/value")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Session("page returned no document HTML".to_string()))
    }

    /// Graceful close: ask the browser to exit, then make sure it did.
    async fn close(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Err(e) = self
            .cdp
            .send_command("Browser.close", serde_json::json!({}))
            .await
        {
            debug!("CDP Browser.close failed (may already be gone): {}", e);
        }
        let _ = self.child.kill().await;
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
        self.gauge.closed();
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        // Backstop for paths that never reached close(); kill_on_drop reaps
        // the process, this keeps the gauge honest.
        if !self.released {
            let _ = self.child.start_kill();
            let _ = std::fs::remove_dir_all(&self.user_data_dir);
            self.gauge.closed();
        }
    }
}

fn build_browser_args(debug_port: u16, user_data_dir: &std::path::Path) -> Vec<String> {
    vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", user_data_dir.display()),
        "--headless=new".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-extensions".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--metrics-recording-only".to_string(),
        "--password-store=basic".to_string(),
        "--window-size=1280,720".to_string(),
        "about:blank".to_string(),
    ]
}

/// Find a Chrome/Chromium binary on the system.
fn find_browser_binary() -> Option<String> {
    let candidates = if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else {
        vec![
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
        ]
    };

    for candidate in candidates {
        if std::path::Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && which::which(candidate).is_ok() {
            return Some(candidate.to_string());
        }
    }
    None
}

async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| Error::Session(format!("failed to bind to find free port: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::Session(format!("failed to get local addr: {}", e)))?
        .port();
    drop(listener);
    Ok(port)
}

/// Poll /json/version until the browser's CDP endpoint responds.
async fn wait_for_cdp_ready(port: u16, timeout_secs: u64) -> Result<()> {
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Session(format!(
                "browser CDP not ready after {}s on port {}",
                timeout_secs, port
            )));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if resp.status().is_success() {
                return Ok(());
            }
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// Resolve the first page target's WebSocket URL via /json/list. Retries a
/// few times since the page target may not appear immediately.
async fn get_page_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/list", port);

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }

        let resp = match reqwest::get(&url).await {
            Ok(r) => r,
            Err(_) => continue,
        };
        let targets: Vec<Value> = match resp.json().await {
            Ok(t) => t,
            Err(_) => continue,
        };

        for target in &targets {
            if target.get("type").and_then(|v| v.as_str()) == Some("page") {
                if let Some(ws_url) = target.get("webSocketDebuggerUrl").and_then(|v| v.as_str())
                {
                    return Ok(ws_url.to_string());
                }
            }
        }
    }

    Err(Error::Session(
        "no page target found after retries".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_balances_opens_and_closes() {
        let gauge = SessionGauge::default();
        assert_eq!(gauge.active(), 0);
        gauge.opened();
        gauge.opened();
        assert_eq!(gauge.active(), 2);
        gauge.closed();
        gauge.closed();
        assert_eq!(gauge.active(), 0);
    }

    #[test]
    fn gauge_clones_share_the_counter() {
        let gauge = SessionGauge::default();
        let view = gauge.clone();
        gauge.opened();
        assert_eq!(view.active(), 1);
        view.closed();
        assert_eq!(gauge.active(), 0);
    }

    #[test]
    fn malformed_url_rejected_before_launch() {
        let err = validate_url("not a url").unwrap_err();
        match err {
            Error::NavigationError { url, cause } => {
                assert_eq!(url, "not a url");
                assert!(cause.starts_with("invalid URL"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn non_http_scheme_rejected() {
        let err = validate_url("file:///etc/passwd").unwrap_err();
        match err {
            Error::NavigationError { cause, .. } => {
                assert!(cause.contains("unsupported scheme"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn https_url_accepted() {
        assert!(validate_url("https://example.com/path?q=1").is_ok());
    }

    #[tokio::test]
    async fn free_port_is_plausible() {
        let port = find_free_port().await.unwrap();
        assert!(port > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn element_wait_expires_at_deadline_when_selector_never_appears() {
        let start = tokio::time::Instant::now();
        let deadline = start + Duration::from_secs(1);
        let polls = AtomicUsize::new(0);

        let timed_out = wait_for_element_until(deadline, ".spinner", 1, || {
            polls.fetch_add(1, Ordering::SeqCst);
            async { Ok(false) }
        })
        .await
        .unwrap();

        let flag = timed_out.expect("wait should expire");
        assert_eq!(flag.selector, ".spinner");
        assert_eq!(flag.wait_secs, 1);
        assert!(polls.load(Ordering::SeqCst) >= 1);
        assert!(start.elapsed() <= Duration::from_millis(1000 + ELEMENT_POLL_INTERVAL_MS));
    }

    #[tokio::test(start_paused = true)]
    async fn element_wait_ends_as_soon_as_selector_appears() {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        let polls = AtomicUsize::new(0);

        let timed_out = wait_for_element_until(deadline, "#main", 10, || {
            let seen = polls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(seen >= 2) }
        })
        .await
        .unwrap();

        assert!(timed_out.is_none());
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_load_shrinks_the_element_wait_budget() {
        // The deadline is shared: time burned waiting for the load event is
        // no longer available to the element wait.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        tokio::time::advance(Duration::from_secs(9)).await;

        let start = tokio::time::Instant::now();
        let timed_out =
            wait_for_element_until(deadline, ".late", 10, || async { Ok(false) })
                .await
                .unwrap();

        assert!(timed_out.is_some());
        assert!(start.elapsed() <= Duration::from_millis(1000 + ELEMENT_POLL_INTERVAL_MS));
    }

    #[tokio::test(start_paused = true)]
    async fn element_probe_failure_propagates() {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        let err = wait_for_element_until(deadline, "#gone", 10, || async {
            Err(Error::Session("page target went away".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Session(_)));
    }

    #[tokio::test]
    async fn rejected_fetches_leave_no_open_sessions() {
        let manager = BrowserManager::new();
        let gauge = manager.gauge();

        let manager = &manager;
        let fetches = (0..20).map(|i| {
            let url = format!("ftp://blocked.example/{}", i);
            async move { manager.fetch(&url, None, 1).await }
        });
        for result in futures::future::join_all(fetches).await {
            assert!(matches!(result, Err(Error::NavigationError { .. })));
        }
        assert_eq!(gauge.active(), 0);
    }
}
