//! Chromium-based page driver using chromiumoxide.
//!
//! Link queries and clicks run as injected JavaScript against the live
//! DOM, so nothing is held across navigations. Downloads are intercepted
//! by pointing CDP download behavior at a per-download staging directory
//! and polling until the payload stops growing.

use super::{LinkQuery, LinkScope, PageDriver, TextMatch};
use crate::errors::{HarvestError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. DCMR_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("DCMR_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.dcmr/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".dcmr/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".dcmr/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".dcmr/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".dcmr/chromium/chrome-linux64/chrome"),
                home.join(".dcmr/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS location
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// A headless Chromium instance owning the event handler task.
pub struct ChromiumSession {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
}

impl ChromiumSession {
    /// Launch a headless Chromium.
    pub async fn launch() -> Result<Self> {
        let chrome_path = find_chromium().ok_or_else(|| {
            HarvestError::Navigation(
                "Chromium not found (set DCMR_CHROMIUM_PATH or install google-chrome)".to_string(),
            )
        })?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .build()
            .map_err(|e| HarvestError::Navigation(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarvestError::Navigation(format!("failed to launch Chromium: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self { browser, handler_task })
    }

    /// Open a new page with a dedicated download staging directory.
    pub async fn new_page(&self) -> Result<ChromiumPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| HarvestError::Navigation(format!("failed to create page: {e}")))?;
        let staging = tempfile::tempdir()?;
        Ok(ChromiumPage { page, staging, download_seq: 0 })
    }

    /// Close the browser and stop the event handler.
    pub async fn close(mut self) -> Result<()> {
        let _ = self.browser.close().await;
        self.handler_task.abort();
        Ok(())
    }
}

/// A single Chromium page plus its download staging area.
pub struct ChromiumPage {
    page: Page,
    staging: tempfile::TempDir,
    download_seq: usize,
}

impl ChromiumPage {
    /// Evaluate JS and deserialize the result.
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| HarvestError::Navigation(format!("JS evaluation failed: {e}")))?;
        result
            .into_value()
            .map_err(|e| HarvestError::Navigation(format!("bad JS result: {e:?}")))
    }

    /// JS expression yielding the array of elements matching `query`.
    ///
    /// Text filters compare against the trimmed visible text, mirroring
    /// how a human reads the link list.
    fn collect_script(query: &LinkQuery) -> String {
        let selector = match query.scope {
            LinkScope::AnyAnchor => "a",
            LinkScope::TableCell => "table tr td a",
        };
        let filter = match &query.text {
            None => "true".to_string(),
            Some(TextMatch::Contains(s)) => {
                format!("t.includes('{}')", sanitize_js_string(s))
            }
            Some(TextMatch::StartsWith(s)) => {
                format!("t.startsWith('{}')", sanitize_js_string(s))
            }
            Some(TextMatch::Equals(s)) => format!("t === '{}'", sanitize_js_string(s)),
        };
        format!(
            "[...document.querySelectorAll('{selector}')].filter(el => {{ \
               const t = (el.innerText || '').trim(); return {filter}; }})"
        )
    }

    /// Wait until a staged download stops growing, or the deadline passes.
    async fn wait_for_payload(&self, dir: &std::path::Path, timeout_ms: u64) -> Result<PathBuf> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Some((path, size)) = first_complete_file(dir)? {
                // Size must hold still across one more poll interval.
                tokio::time::sleep(Duration::from_millis(300)).await;
                let now = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                if now == size && size > 0 {
                    return Ok(path);
                }
            }
            if Instant::now() >= deadline {
                return Err(HarvestError::DownloadTimeout(timeout_ms));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

/// First fully written file in `dir`, skipping in-progress markers.
fn first_complete_file(dir: &std::path::Path) -> Result<Option<(PathBuf, u64)>> {
    if !dir.exists() {
        return Ok(None);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(".crdownload") || name.ends_with(".tmp") {
            continue;
        }
        let size = entry.metadata()?.len();
        return Ok(Some((path, size)));
    }
    Ok(None)
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&mut self, url: &str, timeout_ms: u64) -> Result<()> {
        let result =
            tokio::time::timeout(Duration::from_millis(timeout_ms), self.page.goto(url)).await;

        match result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(HarvestError::Navigation(format!("{url}: {e}"))),
            Err(_) => {
                return Err(HarvestError::Navigation(format!(
                    "{url}: load did not settle within {timeout_ms}ms"
                )))
            }
        }

        // The original flow waits for anchors to exist before reading
        // anything; keep that as a bounded poll instead of a blind sleep.
        self.wait_for_links(&LinkQuery::any(), timeout_ms)
            .await
            .map_err(|_| {
                HarvestError::Navigation(format!("{url}: no content within {timeout_ms}ms"))
            })
    }

    async fn find_links(&mut self, query: &LinkQuery) -> Result<Vec<String>> {
        let script = format!(
            "{}.map(el => (el.innerText || '').trim())",
            Self::collect_script(query)
        );
        self.eval(&script).await
    }

    async fn click_link(&mut self, query: &LinkQuery, index: usize) -> Result<()> {
        let script = format!(
            "(() => {{ const els = {}; \
               if (els.length > {index}) {{ els[{index}].click(); return true; }} \
               return false; }})()",
            Self::collect_script(query)
        );
        let clicked: bool = self.eval(&script).await?;
        if clicked {
            Ok(())
        } else {
            Err(HarvestError::ElementNotFound(format!(
                "link {index} for {query:?}"
            )))
        }
    }

    async fn wait_for_links(&mut self, query: &LinkQuery, timeout_ms: u64) -> Result<()> {
        let script = format!("{}.length", Self::collect_script(query));
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let count: u64 = self.eval(&script).await.unwrap_or(0);
            if count > 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(HarvestError::ElementNotFound(format!(
                    "no links for {query:?} within {timeout_ms}ms"
                )));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn cell_text(&mut self, column: usize, row: usize) -> Result<String> {
        let script = format!(
            "(() => {{ const cells = \
               [...document.querySelectorAll('table tr td:nth-child({column})')]; \
               return cells.length > {row} ? (cells[{row}].innerText || '').trim() : ''; }})()"
        );
        self.eval(&script).await
    }

    async fn settle(&mut self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    async fn go_back(&mut self) -> Result<()> {
        // The site has no stable deep-link URLs in the default flow, so
        // history navigation is the only way back to the chapter list.
        self.eval::<serde_json::Value>("history.back(); true")
            .await
            .map(|_| ())
            .map_err(|e| HarvestError::Navigation(format!("history.back failed: {e}")))
    }

    async fn expect_download(
        &mut self,
        query: &LinkQuery,
        index: usize,
        timeout_ms: u64,
    ) -> Result<PathBuf> {
        self.download_seq += 1;
        let dir = self.staging.path().join(format!("dl-{}", self.download_seq));
        std::fs::create_dir_all(&dir)?;

        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().to_string())
            .build()
            .map_err(|e| HarvestError::Navigation(format!("download behavior: {e}")))?;
        self.page
            .execute(params)
            .await
            .map_err(|e| HarvestError::Navigation(format!("failed to arm download: {e}")))?;

        self.click_link(query, index).await?;
        debug!(?dir, "download armed, polling for payload");
        self.wait_for_payload(&dir, timeout_ms).await
    }
}

/// Escape a string for safe injection into a JS string literal.
fn sanitize_js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}
