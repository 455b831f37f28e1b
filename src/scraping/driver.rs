//! Browser automation protocol for the appraiser site.
//!
//! search form → submit → classify → (detail page) → reveal each section.
//! Every navigation is bounded by the navigation timeout and every page
//! snapshot passes through the blocking detector before it is used.

use crate::core::error::{ErrorContext, LookupError};
use crate::features::address::NormalizedAddress;
use crate::features::antibot::{detect_block, RequestDelay};
use crate::parsers::{classify_page, PageKind};
use crate::scraping::selectors::{SectionSpec, SiteProfile};
use crate::scraping::session::PageSession;
use crate::types::{Section, TraceStep};
use scraper::{Html, Selector};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub navigation_timeout: Duration,
    /// Upper bound for a tab's table to populate after its click.
    pub tab_wait: Duration,
    pub delay: RequestDelay,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            tab_wait: Duration::from_secs(8),
            delay: RequestDelay::default_polite(),
        }
    }
}

/// Per-section reveal state.
///
/// `Pending → Revealing → Extracted | Unavailable`. Only the two terminal
/// states leave the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionState {
    Pending,
    Revealing,
    Extracted(String),
    Unavailable(String),
}

impl SectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionState::Pending => "pending",
            SectionState::Revealing => "revealing",
            SectionState::Extracted(_) => "extracted",
            SectionState::Unavailable(_) => "unavailable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SectionCapture {
    pub section: Section,
    pub state: SectionState,
}

/// Where the search submission landed.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub url: String,
    pub html: String,
    pub kind: PageKind,
}

pub struct Driver<'a> {
    session: &'a mut dyn PageSession,
    site: &'a SiteProfile,
    settings: &'a DriverSettings,
    address: String,
    current_url: Option<String>,
    started: Instant,
    steps: Vec<TraceStep>,
}

impl<'a> Driver<'a> {
    pub fn new(
        session: &'a mut dyn PageSession,
        site: &'a SiteProfile,
        settings: &'a DriverSettings,
        address: &str,
        started: Instant,
    ) -> Self {
        Self {
            session,
            site,
            settings,
            address: address.to_string(),
            current_url: None,
            started,
            steps: Vec::new(),
        }
    }

    pub fn take_steps(&mut self) -> Vec<TraceStep> {
        std::mem::take(&mut self.steps)
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    fn step(&mut self, step: &str, detail: impl Into<String>) {
        let detail = detail.into();
        debug!("step {}: {}", step, detail);
        self.steps.push(TraceStep {
            step: step.to_string(),
            detail,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        });
    }

    fn ctx(&self, step: &str) -> ErrorContext {
        ErrorContext::new(&self.address, step).at(self.current_url.clone())
    }

    fn nav_budget_ms(&self) -> u64 {
        self.settings.navigation_timeout.as_millis() as u64
    }

    async fn navigate(&mut self, url: &str, step: &str) -> Result<(), LookupError> {
        self.current_url = Some(url.to_string());
        match tokio::time::timeout(self.settings.navigation_timeout, self.session.goto(url)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(LookupError::NavigationFailed {
                    ctx: self.ctx(step),
                    reason: format!("{:#}", e),
                })
            }
            Err(_) => {
                return Err(LookupError::Timeout {
                    ctx: self.ctx(step),
                    budget_ms: self.nav_budget_ms(),
                })
            }
        }
        self.refresh_url().await;
        self.step(step, url);
        Ok(())
    }

    async fn refresh_url(&mut self) {
        if let Ok(url) = self.session.current_url().await {
            if !url.is_empty() {
                self.current_url = Some(url);
            }
        }
    }

    /// Snapshot the page and run the blocking detector on it.
    async fn checkpoint(&mut self, step: &str) -> Result<String, LookupError> {
        let html = self
            .session
            .content()
            .await
            .map_err(|e| LookupError::NavigationFailed {
                ctx: self.ctx(step),
                reason: format!("read page content: {:#}", e),
            })?;
        if let Some(signal) = detect_block(&html) {
            warn!("blocked at {} ({}): {}", step, self.current_url().unwrap_or("-"), signal);
            return Err(LookupError::Blocked {
                ctx: self.ctx(step),
                signal: signal.to_string(),
            });
        }
        Ok(html)
    }

    /// Poll for `selector` with a doubling interval until `budget` runs out.
    async fn wait_for(&self, selector: &str, budget: Duration) -> bool {
        let start = Instant::now();
        let mut delay = Duration::from_millis(50);
        loop {
            if matches!(self.session.exists(selector).await, Ok(true)) {
                return true;
            }
            if start.elapsed() >= budget {
                return false;
            }
            tokio::time::sleep(delay.min(budget.saturating_sub(start.elapsed()))).await;
            delay = (delay * 2).min(Duration::from_millis(500));
        }
    }

    /// Steps 1-5: load the form, fill it, submit, classify the landing page.
    pub async fn search(&mut self, address: &NormalizedAddress) -> Result<SearchOutcome, LookupError> {
        let site = self.site;
        self.navigate(&site.search_url(), "open_search").await?;
        self.checkpoint("open_search").await?;

        if !self.wait_for(&site.address_field, self.settings.navigation_timeout).await {
            // the form may have been replaced by a challenge after load
            self.checkpoint("await_form").await?;
            return Err(LookupError::Timeout {
                ctx: self.ctx("await_form"),
                budget_ms: self.nav_budget_ms(),
            });
        }

        for (field, value) in [
            (&site.owner_field, site.wildcard.as_str()),
            (&site.parcel_field, site.wildcard.as_str()),
            (&site.address_field, address.street.as_str()),
        ] {
            self.session
                .fill(field, value)
                .await
                .map_err(|e| LookupError::Parse {
                    ctx: self.ctx("fill_form"),
                    reason: format!("{:#}", e),
                })?;
        }
        if let (Some(zip_field), Some(zip)) = (site.zip_field.as_deref(), address.zip.as_deref()) {
            if matches!(self.session.exists(zip_field).await, Ok(true)) {
                if let Err(e) = self.session.fill(zip_field, zip).await {
                    debug!("zip field not filled: {:#}", e);
                }
            }
        }
        self.step("fill_form", address.street.clone());

        if !matches!(self.session.exists(&site.submit).await, Ok(true)) {
            return Err(LookupError::NavigationFailed {
                ctx: self.ctx("submit"),
                reason: format!("submit control {} not found", site.submit),
            });
        }
        self.settings.delay.pause().await;
        self.session
            .click(&site.submit)
            .await
            .map_err(|e| LookupError::NavigationFailed {
                ctx: self.ctx("submit"),
                reason: format!("{:#}", e),
            })?;
        match tokio::time::timeout(self.settings.navigation_timeout, self.session.wait_for_navigation()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(LookupError::NavigationFailed {
                    ctx: self.ctx("submit"),
                    reason: format!("{:#}", e),
                })
            }
            Err(_) => {
                return Err(LookupError::Timeout {
                    ctx: self.ctx("submit"),
                    budget_ms: self.nav_budget_ms(),
                })
            }
        }
        self.refresh_url().await;

        let html = self.checkpoint("results").await?;
        let url = self.current_url.clone().unwrap_or_default();
        let kind = classify_page(&url, &html, site);
        let label = match &kind {
            PageKind::DirectDetail { parcel_id } => format!("direct redirect to parcel {}", parcel_id),
            PageKind::Results(rows) => format!("{} result rows", rows.len()),
            PageKind::NoResults => "no results".to_string(),
            PageKind::Unrecognized => "unrecognized page".to_string(),
        };
        info!("search for {:?}: {}", address.street, label);
        self.step("classify", label);

        if kind == PageKind::Unrecognized {
            return Err(LookupError::Parse {
                ctx: self.ctx("classify"),
                reason: "page is neither a detail page, a results list nor an empty result".to_string(),
            });
        }
        Ok(SearchOutcome { url, html, kind })
    }

    /// Navigate to a detail page and return its first-rendered HTML.
    pub async fn open_detail(&mut self, url: &str) -> Result<String, LookupError> {
        self.settings.delay.pause().await;
        self.navigate(url, "open_detail").await?;
        self.checkpoint("open_detail").await
    }

    /// Step 6: reveal and read every section. A section that cannot be
    /// revealed is reported unavailable; only a block aborts.
    pub async fn reveal_sections(&mut self) -> Result<Vec<SectionCapture>, LookupError> {
        let specs = self.site.sections.clone();
        let mut out = Vec::with_capacity(specs.len());
        for spec in &specs {
            let state = self.reveal(spec).await?;
            match &state {
                SectionState::Extracted(html) => {
                    self.step("section", format!("{} extracted ({} chars)", spec.section.as_str(), html.len()))
                }
                SectionState::Unavailable(reason) => {
                    warn!("section {} unavailable: {}", spec.section.as_str(), reason);
                    self.step("section", format!("{} unavailable: {}", spec.section.as_str(), reason));
                }
                _ => {}
            }
            out.push(SectionCapture {
                section: spec.section,
                state,
            });
        }
        Ok(out)
    }

    async fn reveal(&mut self, spec: &SectionSpec) -> Result<SectionState, LookupError> {
        let mut state = SectionState::Pending;
        loop {
            state = match state {
                SectionState::Pending => match spec.tab.as_deref() {
                    None => SectionState::Revealing,
                    Some(tab) => {
                        let active = self
                            .session
                            .is_tab_active(tab, &self.site.active_tab_class)
                            .await
                            .unwrap_or(false);
                        if active {
                            SectionState::Revealing
                        } else if !matches!(self.session.exists(tab).await, Ok(true)) {
                            SectionState::Unavailable(format!("tab {} not present", tab))
                        } else {
                            match self.session.click(tab).await {
                                Ok(()) => SectionState::Revealing,
                                Err(e) => SectionState::Unavailable(format!("tab click failed: {:#}", e)),
                            }
                        }
                    }
                },
                SectionState::Revealing => {
                    if !self.wait_for(&spec.populated, self.settings.tab_wait).await {
                        SectionState::Unavailable(format!(
                            "content did not load within {}ms",
                            self.settings.tab_wait.as_millis()
                        ))
                    } else {
                        match self.session.outer_html(&spec.content).await {
                            Ok(Some(html)) => {
                                if let Some(signal) = detect_block(&html) {
                                    return Err(LookupError::Blocked {
                                        ctx: self.ctx(spec.section.as_str()),
                                        signal: signal.to_string(),
                                    });
                                }
                                SectionState::Extracted(html)
                            }
                            Ok(None) => SectionState::Unavailable("content container missing".to_string()),
                            Err(e) => SectionState::Unavailable(format!("read failed: {:#}", e)),
                        }
                    }
                }
                done @ (SectionState::Extracted(_) | SectionState::Unavailable(_)) => return Ok(done),
            };
        }
    }
}

/// Sections already rendered in a page snapshot (the "basic" pass). Only
/// containers that hold populated table cells, or have no tab, count.
pub fn visible_sections(page_html: &str, site: &SiteProfile) -> Vec<(Section, String)> {
    let doc = Html::parse_document(page_html);
    let mut out = Vec::new();
    for spec in &site.sections {
        let (Ok(content), Ok(populated)) = (
            Selector::parse(&spec.content),
            Selector::parse(&spec.populated),
        ) else {
            continue;
        };
        if doc.select(&populated).next().is_none() {
            continue;
        }
        if let Some(el) = doc.select(&content).next() {
            out.push((spec.section, el.html()));
        }
    }
    out
}
