//! Scripted in-memory appraiser site for driving the lookup pipeline
//! without a browser.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use parcel_scout::core::error::LookupError;
use parcel_scout::fallback::{FallbackResolver, SearchDocument, SemanticSearch};
use parcel_scout::features::antibot::RequestDelay;
use parcel_scout::lookup::{LookupSettings, PropertyLookup};
use parcel_scout::scraping::driver::DriverSettings;
use parcel_scout::scraping::selectors::SiteProfile;
use parcel_scout::scraping::session::{PageSession, SessionProvider};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "https://pao.test";

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn site_profile() -> SiteProfile {
    SiteProfile::manatee().with_base_url(BASE_URL)
}

pub const SEARCH_FORM: &str = r#"
    <form id="search">
      <input id="OwnerName"><input id="ParcelId"><input id="Address"><input id="Zip">
      <button id="btnSearch">Search</button>
    </form>"#;

pub const TAB_BAR: &str = r##"
    <ul class="nav-tabs">
      <li><a id="valuesTab" href="#">Values</a></li>
      <li><a id="salesTab" href="#">Sales</a></li>
      <li><a id="buildingsTab" href="#">Buildings</a></li>
      <li><a id="landTab" href="#">Land</a></li>
    </ul>"##;

pub fn owner_block(situs: &str) -> String {
    format!(
        r#"<div id="ownerContent">
             <div><b>Owner:</b> DOE JANE<br></div>
             <div><b>Situs Address:</b> {situs}<br></div>
             <div><b>Land Use:</b> 0100 SINGLE FAMILY RESIDENTIAL<br></div>
             <div><b>Subdivision:</b> PALMA SOLA PARK<br></div>
           </div>"#
    )
}

pub const VALUES_TABLE: &str = r#"
    <div id="tableValue"><table>
      <tr><th>Year</th><th>Land</th><th>Building</th><th>Just/Market</th><th>Assessed</th><th>Taxable</th></tr>
      <tr><td>2023</td><td>$80,000</td><td>$210,500</td><td>$290,500</td><td>$250,000</td><td>$200,000</td></tr>
      <tr><td>2024</td><td>$85,000</td><td>$220,000</td><td>$305,000</td><td>$257,500</td><td>$207,500</td></tr>
    </table></div>"#;

pub const SALES_TABLE: &str = r#"
    <div id="tableSales"><table>
      <tr><td>06/01/2015</td><td>2590/4411</td><td>WD</td><td>I</td><td>01</td><td>$189,900</td><td>DOE JANE</td></tr>
      <tr><td>03/15/2021</td><td>2890/1234</td><td>QC</td><td>I</td><td>11</td><td>$0</td><td>DOE JANE</td></tr>
    </table></div>"#;

/// One page the fake browser can show: a body fragment at a URL.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub body: String,
}

impl Page {
    pub fn new(url: &str, body: &str) -> Self {
        Self {
            url: url.to_string(),
            body: body.to_string(),
        }
    }
}

/// Site script: what each navigation and click produces.
#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    /// Pages reachable by direct navigation, keyed by URL.
    pub pages: HashMap<String, String>,
    /// Where the submit button leads.
    pub after_submit: Option<Page>,
    /// Tab selector → fragment rendered once the tab is clicked.
    pub tabs: HashMap<String, String>,
    /// Artificial latency on every `goto`.
    pub goto_delay: Option<Duration>,
    /// Latency on a `goto` to one URL only.
    pub slow_pages: HashMap<String, Duration>,
}

impl FakeSite {
    pub fn new() -> Self {
        let mut site = Self::default();
        site.pages
            .insert(format!("{}/search/", BASE_URL), SEARCH_FORM.to_string());
        site
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn submit_to(mut self, url: &str, body: &str) -> Self {
        self.after_submit = Some(Page::new(url, body));
        self
    }

    pub fn tab(mut self, selector: &str, fragment: &str) -> Self {
        self.tabs.insert(selector.to_string(), fragment.to_string());
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.goto_delay = Some(delay);
        self
    }

    pub fn slow_at(mut self, url: &str, delay: Duration) -> Self {
        self.slow_pages.insert(url.to_string(), delay);
        self
    }
}

/// Shared observation log for one fake browser.
#[derive(Debug, Default)]
pub struct Recorder {
    pub opened: AtomicUsize,
    pub released: AtomicUsize,
    pub visited: Mutex<Vec<String>>,
    pub filled: Mutex<Vec<(String, String)>>,
    pub clicked: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    pub fn filled(&self) -> Vec<(String, String)> {
        self.filled.lock().unwrap().clone()
    }

    pub fn clicked(&self) -> Vec<String> {
        self.clicked.lock().unwrap().clone()
    }
}

pub struct FakeSession {
    site: Arc<FakeSite>,
    recorder: Arc<Recorder>,
    url: String,
    body: String,
    revealed: Vec<String>,
    pending: Option<Page>,
}

impl FakeSession {
    fn snapshot(&self) -> String {
        format!(
            "<html><head><title>Property Appraiser</title></head><body>{}{}</body></html>",
            self.body,
            self.revealed.join("")
        )
    }

    fn select_html(&self, selector: &str) -> Result<Option<String>> {
        let sel = Selector::parse(selector).map_err(|e| anyhow!("bad selector {}: {:?}", selector, e))?;
        let doc = Html::parse_document(&self.snapshot());
        let found = doc.select(&sel).next().map(|el| el.html());
        Ok(found)
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        if let Some(delay) = self.site.goto_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(delay) = self.site.slow_pages.get(url) {
            tokio::time::sleep(*delay).await;
        }
        self.recorder.visited.lock().unwrap().push(url.to_string());
        let body = self
            .site
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("404 {}", url))?;
        self.url = url.to_string();
        self.body = body;
        self.revealed.clear();
        Ok(())
    }

    async fn wait_for_navigation(&mut self) -> Result<()> {
        if let Some(page) = self.pending.take() {
            self.recorder.visited.lock().unwrap().push(page.url.clone());
            self.url = page.url;
            self.body = page.body;
            self.revealed.clear();
        }
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.snapshot())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        Ok(self.select_html(selector)?.is_some())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
        if self.select_html(selector)?.is_none() {
            bail!("field {} not found", selector);
        }
        self.recorder
            .filled
            .lock()
            .unwrap()
            .push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        if self.select_html(selector)?.is_none() {
            bail!("element {} not found", selector);
        }
        self.recorder
            .clicked
            .lock()
            .unwrap()
            .push(selector.to_string());
        if selector == "#btnSearch" {
            self.pending = self.site.after_submit.clone();
        } else if let Some(fragment) = self.site.tabs.get(selector) {
            self.revealed.push(fragment.clone());
        }
        Ok(())
    }

    async fn outer_html(&self, selector: &str) -> Result<Option<String>> {
        self.select_html(selector)
    }

    async fn is_tab_active(&self, _selector: &str, _active_class: &str) -> Result<bool> {
        Ok(false)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.recorder.released.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeBrowser {
    pub site: Arc<FakeSite>,
    pub recorder: Arc<Recorder>,
    pub available: bool,
}

impl FakeBrowser {
    pub fn new(site: FakeSite) -> Arc<Self> {
        Arc::new(Self {
            site: Arc::new(site),
            recorder: Arc::new(Recorder::default()),
            available: true,
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            site: Arc::new(FakeSite::new()),
            recorder: Arc::new(Recorder::default()),
            available: false,
        })
    }
}

#[async_trait]
impl SessionProvider for FakeBrowser {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, LookupError> {
        if !self.available {
            return Err(LookupError::BrowserLaunchFailed {
                reason: "No browser found".to_string(),
            });
        }
        self.recorder.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            site: Arc::clone(&self.site),
            recorder: Arc::clone(&self.recorder),
            url: "about:blank".to_string(),
            body: String::new(),
            revealed: Vec::new(),
            pending: None,
        }))
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// Semantic index that records every query and returns canned documents.
#[derive(Default)]
pub struct RecordingSearch {
    pub docs: Vec<SearchDocument>,
    pub queries: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingSearch {
    pub fn returning(docs: Vec<SearchDocument>) -> Arc<Self> {
        Arc::new(Self {
            docs,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl SemanticSearch for RecordingSearch {
    async fn search(
        &self,
        query: &str,
        include_domains: &[String],
        max_results: usize,
    ) -> Result<Vec<SearchDocument>> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), include_domains.to_vec()));
        Ok(self.docs.iter().take(max_results).cloned().collect())
    }
}

pub fn test_settings() -> LookupSettings {
    LookupSettings {
        driver: DriverSettings {
            navigation_timeout: Duration::from_secs(2),
            tab_wait: Duration::from_millis(200),
            delay: RequestDelay::none(),
        },
        operation_timeout: Duration::from_secs(10),
        max_concurrent: 2,
    }
}

pub fn build_lookup(
    browser: Arc<FakeBrowser>,
    search: Arc<RecordingSearch>,
    settings: LookupSettings,
) -> PropertyLookup {
    let site = Arc::new(site_profile());
    let resolver = FallbackResolver::new(search, Arc::clone(&site), 8);
    PropertyLookup::new(browser, resolver, site, settings)
}
