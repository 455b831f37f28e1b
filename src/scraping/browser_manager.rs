//! Native browser management using `chromiumoxide`.
//!
//! * Finding a usable browser executable (Brave → Chrome → Chromium, cross-platform).
//! * Launching a headless browser, or connecting to a remote one.
//! * `BrowserPool`: one shared browser *engine* per process, handed out as
//!   request-scoped incognito contexts (see `session.rs`).
//!
//! The pool is passed explicitly through `AppState`; there is no
//! module-level browser.

use crate::core::config::ScoutConfig;
use anyhow::{anyhow, Context, Result};
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Browser;
use futures::StreamExt;
use rand::seq::IndexedRandom;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::session::ChromiumSession;

const DESKTOP_USER_AGENTS: &[&str] = &[
    // Chrome 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 132 – macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 131 – Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Edge 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
];

/// Returns a randomly-chosen Chromium desktop User-Agent string.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    DESKTOP_USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0])
}

// ── Browser executable discovery ─────────────────────────────────────────────

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. explicit override (config file or `CHROME_EXECUTABLE`)
/// 2. PATH scan
/// 3. OS-specific well-known install paths
pub fn find_chrome_executable(override_path: Option<&str>) -> Option<String> {
    if let Some(p) = override_path {
        if Path::new(p).exists() {
            return Some(p.to_string());
        }
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "google-chrome",
            "chromium",
            "chromium-browser",
            "brave-browser",
            "brave",
            "chrome",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/local/bin/chromium",
            "/usr/bin/brave-browser",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

/// Build a `BrowserConfig` with CI-friendly flags.
pub fn build_browser_config(exe: &str, headless: bool, width: u32, height: u32) -> Result<BrowserConfig> {
    let ua = random_user_agent();

    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(width, height)
        .arg("--disable-gpu")
        .arg("--no-sandbox") // often required in CI / containers
        .arg("--disable-setuid-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--disable-translate")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--mute-audio")
        .arg("--disable-blink-features=AutomationControlled")
        .arg(format!("--user-agent={}", ua));

    if !headless {
        builder = builder.with_head();
    }

    builder
        .build()
        .map_err(|e| anyhow!("Failed to build browser config: {}", e))
}

// ── Browser Pool ─────────────────────────────────────────────────────────────

/// One long-lived browser engine shared by all lookups.
///
/// Each lookup gets its own incognito browser context, so cookies, storage
/// and navigation state never leak between concurrent requests. The engine
/// is started lazily and restarted if a liveness probe fails.
pub struct BrowserPool {
    exe: Option<String>,
    ws_endpoint: Option<String>,
    headless: bool,
    inner: Mutex<Option<Arc<Browser>>>,
    open_contexts: Arc<AtomicUsize>,
}

impl BrowserPool {
    pub fn new(exe: Option<String>, ws_endpoint: Option<String>, headless: bool) -> Arc<Self> {
        Arc::new(Self {
            exe,
            ws_endpoint,
            headless,
            inner: Mutex::new(None),
            open_contexts: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn from_config(cfg: &ScoutConfig) -> Arc<Self> {
        let exe = find_chrome_executable(cfg.resolve_chrome_executable().as_deref());
        Self::new(exe, cfg.resolve_browser_ws_endpoint(), cfg.resolve_headless())
    }

    /// Whether a browser could be obtained at all (remote endpoint or local binary).
    pub fn available(&self) -> bool {
        self.ws_endpoint.is_some() || self.exe.is_some()
    }

    pub fn executable(&self) -> Option<&str> {
        self.exe.as_deref()
    }

    /// Contexts handed out and not yet released.
    pub fn open_contexts(&self) -> usize {
        self.open_contexts.load(Ordering::Relaxed)
    }

    async fn start(&self) -> Result<Browser> {
        let (browser, mut handler) = if let Some(ws) = self.ws_endpoint.as_deref() {
            info!("browser pool: connecting to {}", ws);
            Browser::connect(ws)
                .await
                .map_err(|e| anyhow!("connect to {} failed: {}", ws, e))?
        } else {
            let exe = self.exe.as_deref().ok_or_else(|| {
                anyhow!("No browser found. Install Chrome or Chromium, or set CHROME_EXECUTABLE / BROWSER_WS_ENDPOINT.")
            })?;
            info!("browser pool: launching {} (headless={})", exe, self.headless);
            let config = build_browser_config(exe, self.headless, 1366, 900)?;
            Browser::launch(config)
                .await
                .map_err(|e| anyhow!("launch ({}) failed: {}", exe, e))?
        };

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
        });
        Ok(browser)
    }

    /// Shared engine handle; lazy-starts and restarts a dead instance.
    async fn browser(&self) -> Result<Arc<Browser>> {
        let mut guard = self.inner.lock().await;

        if let Some(b) = guard.as_ref() {
            if b.version().await.is_ok() {
                return Ok(Arc::clone(b));
            }
            warn!("browser pool: instance dead, restarting");
            if let Some(old) = guard.take() {
                if let Ok(mut b) = Arc::try_unwrap(old) {
                    let _ = b.close().await;
                }
            }
        }

        let browser = Arc::new(self.start().await?);
        *guard = Some(Arc::clone(&browser));
        Ok(browser)
    }

    /// Open a fresh incognito context with one blank page.
    pub async fn open_context(&self) -> Result<ChromiumSession> {
        let browser = self.browser().await?;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .context("create browser context")?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(|e| anyhow!("target params: {}", e))?;

        let page = match browser.new_page(target).await {
            Ok(page) => page,
            Err(e) => {
                ChromiumSession::dispose_context(&browser, context_id).await;
                return Err(anyhow!("open page in context: {}", e));
            }
        };

        self.open_contexts.fetch_add(1, Ordering::Relaxed);
        debug!("browser pool: {} open contexts", self.open_contexts());
        Ok(ChromiumSession::new(
            page,
            browser,
            context_id,
            Arc::clone(&self.open_contexts),
        ))
    }

    /// Gracefully close the pooled browser instance.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(browser) = guard.take() {
            match Arc::try_unwrap(browser) {
                Ok(mut b) => {
                    if let Err(e) = b.close().await {
                        warn!("browser close error: {}", e);
                    }
                    info!("browser pool shut down");
                }
                Err(_) => warn!("browser pool: engine still in use at shutdown"),
            }
        }
    }
}

impl Drop for BrowserPool {
    fn drop(&mut self) {
        // Drop cannot await; close from a spawned task if a runtime is still around.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        if let Ok(mut guard) = self.inner.try_lock() {
            if let Some(browser) = guard.take() {
                if let Ok(mut b) = Arc::try_unwrap(browser) {
                    handle.spawn(async move {
                        let _ = b.close().await;
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_override_falls_through() {
        // a bogus override must not be returned
        let found = find_chrome_executable(Some("/definitely/not/chrome"));
        assert_ne!(found.as_deref(), Some("/definitely/not/chrome"));
    }

    #[test]
    fn pool_without_browser_is_unavailable() {
        let pool = BrowserPool::new(None, None, true);
        assert!(!pool.available());
        assert_eq!(pool.open_contexts(), 0);
        let remote = BrowserPool::new(None, Some("ws://127.0.0.1:9222/devtools/browser/x".into()), true);
        assert!(remote.available());
    }

    #[tokio::test]
    async fn open_context_without_browser_fails() {
        let pool = BrowserPool::new(None, None, true);
        let err = pool.open_context().await.err().unwrap();
        assert!(err.to_string().contains("No browser found"));
    }
}
