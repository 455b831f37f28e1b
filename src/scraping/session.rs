//! Request-scoped browser sessions.
//!
//! The driver only talks to [`PageSession`]; [`ChromiumSession`] is the real
//! implementation (one incognito context + one page), and the integration
//! tests substitute a scripted in-memory site.

use crate::core::error::LookupError;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::DisposeBrowserContextParams;
use chromiumoxide::{Browser, Page};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::browser_manager::BrowserPool;

/// One isolated browser tab, owned by a single lookup.
#[async_trait]
pub trait PageSession: Send + Sync {
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Wait for a navigation triggered by the last interaction to settle.
    async fn wait_for_navigation(&mut self) -> Result<()>;

    async fn content(&self) -> Result<String>;

    async fn current_url(&self) -> Result<String>;

    async fn exists(&self, selector: &str) -> Result<bool>;

    /// Set an input's value and fire the events a user edit would.
    async fn fill(&mut self, selector: &str, value: &str) -> Result<()>;

    async fn click(&mut self, selector: &str) -> Result<()>;

    /// Outer HTML of the first element matching `selector`.
    async fn outer_html(&self, selector: &str) -> Result<Option<String>>;

    /// True when the tab is already selected or cannot be clicked.
    async fn is_tab_active(&self, selector: &str, active_class: &str) -> Result<bool>;

    /// Release the session. Implementations must also release on drop.
    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, LookupError>;

    /// Whether a browser is obtainable at all, for health reporting.
    fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
impl SessionProvider for BrowserPool {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, LookupError> {
        let session = self
            .open_context()
            .await
            .map_err(|e| LookupError::BrowserLaunchFailed {
                reason: format!("{:#}", e),
            })?;
        Ok(Box::new(session))
    }

    fn is_available(&self) -> bool {
        self.available()
    }
}

fn js(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Incognito context + page. Disposes the context on `close`, or from a
/// spawned task if dropped without closing (abandoned lookup).
pub struct ChromiumSession {
    page: Page,
    browser: Arc<Browser>,
    context_id: Option<BrowserContextId>,
    open_contexts: Arc<AtomicUsize>,
}

impl ChromiumSession {
    pub(crate) fn new(
        page: Page,
        browser: Arc<Browser>,
        context_id: BrowserContextId,
        open_contexts: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            page,
            browser,
            context_id: Some(context_id),
            open_contexts,
        }
    }

    pub(crate) async fn dispose_context(browser: &Browser, context_id: BrowserContextId) {
        if let Err(e) = browser
            .execute(DisposeBrowserContextParams::new(context_id))
            .await
        {
            debug!("dispose browser context failed: {}", e);
        }
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        let value = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| anyhow!("script failed: {}", e))?;
        value
            .into_value::<T>()
            .map_err(|e| anyhow!("unexpected script result: {}", e))
    }

    fn release(&mut self) -> Option<BrowserContextId> {
        let id = self.context_id.take()?;
        self.open_contexts.fetch_sub(1, Ordering::Relaxed);
        Some(id)
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| anyhow!("goto {}: {}", url, e))?;
        Ok(())
    }

    async fn wait_for_navigation(&mut self) -> Result<()> {
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| anyhow!("wait for navigation: {}", e))?;
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| anyhow!("page content: {}", e))
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(|e| anyhow!("page url: {}", e))?
            .unwrap_or_default())
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        self.eval(format!("document.querySelector({}) !== null", js(selector)))
            .await
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.focus();
                el.value = {val};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            sel = js(selector),
            val = js(value)
        );
        if !self.eval::<bool>(script).await? {
            bail!("field {} not found", selector);
        }
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| anyhow!("element {} not found: {}", selector, e))?
            .click()
            .await
            .map_err(|e| anyhow!("click {}: {}", selector, e))?;
        Ok(())
    }

    async fn outer_html(&self, selector: &str) -> Result<Option<String>> {
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.outerHTML : null; }})()",
            js(selector)
        ))
        .await
    }

    async fn is_tab_active(&self, selector: &str, active_class: &str) -> Result<bool> {
        self.eval(format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const item = el.closest('li') || el;
                return el.classList.contains({cls}) || item.classList.contains({cls})
                    || el.getAttribute('aria-selected') === 'true'
                    || el.disabled === true || el.classList.contains('disabled');
            }})()"#,
            sel = js(selector),
            cls = js(active_class)
        ))
        .await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = self;
        let Some(context_id) = this.release() else {
            return Ok(());
        };
        if let Err(e) = this.page.clone().close().await {
            debug!("page close error: {}", e);
        }
        Self::dispose_context(&this.browser, context_id).await;
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        let Some(context_id) = self.release() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let page = self.page.clone();
        let browser = Arc::clone(&self.browser);
        handle.spawn(async move {
            if let Err(e) = page.close().await {
                debug!("page close in drop failed: {}", e);
            }
            ChromiumSession::dispose_context(&browser, context_id).await;
        });
    }
}
