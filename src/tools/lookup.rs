//! End-to-end property lookup.
//!
//! normalize → search → match → (fallback) → open detail → confirm address
//! → basic pass + full pass → merge → derive summary.
//!
//! The whole browser sequence runs under the operation timeout, and the
//! session is closed on every exit path. If the future itself is dropped the
//! session's own drop guard releases the browser context.

use crate::core::config::ScoutConfig;
use crate::core::error::{ErrorContext, LookupError};
use crate::features::address::{normalize_address, NormalizedAddress};
use crate::features::antibot::request_delay_from_env;
use crate::features::matcher::{select_match, AddressKey};
use crate::features::merge::{derive_summary, merge_records};
use crate::parsers::{apply_section, document_text, PageKind};
use crate::scraping::driver::{visible_sections, Driver, DriverSettings, SectionState};
use crate::scraping::selectors::SiteProfile;
use crate::scraping::session::{PageSession, SessionProvider};
use crate::tools::fallback::FallbackResolver;
use crate::types::{DebugTrace, LookupResponse, MatchPath, PropertyRecord, SectionTrace};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// URL the abandoned run had reached, read back from the still-open session.
async fn last_page_url(session: &dyn PageSession) -> Option<String> {
    match tokio::time::timeout(Duration::from_secs(2), session.current_url()).await {
        Ok(Ok(url)) if !url.is_empty() && url != "about:blank" => Some(url),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct LookupSettings {
    pub driver: DriverSettings,
    pub operation_timeout: Duration,
    pub max_concurrent: usize,
}

impl LookupSettings {
    pub fn from_config(cfg: &ScoutConfig) -> Self {
        Self {
            driver: DriverSettings {
                navigation_timeout: cfg.resolve_navigation_timeout(),
                tab_wait: cfg.resolve_tab_wait(),
                delay: request_delay_from_env(),
            },
            operation_timeout: cfg.resolve_operation_timeout(),
            max_concurrent: cfg.resolve_max_concurrent_lookups(),
        }
    }
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            driver: DriverSettings::default(),
            operation_timeout: Duration::from_secs(120),
            max_concurrent: 4,
        }
    }
}

/// What the browser sequence concluded, before the trace is attached.
struct Resolution {
    detail_url: Option<String>,
    record: PropertyRecord,
    not_found_reason: Option<String>,
}

impl Resolution {
    fn not_found(address: &NormalizedAddress, reason: impl Into<String>) -> Self {
        let mut record = PropertyRecord::default();
        fill_address_parts(&mut record, address);
        Self {
            detail_url: None,
            record,
            not_found_reason: Some(reason.into()),
        }
    }
}

fn fill_address_parts(record: &mut PropertyRecord, address: &NormalizedAddress) {
    if record.address.is_none() && !address.street.is_empty() {
        record.address = Some(address.street.clone());
    }
    if record.city.is_none() {
        record.city = address.city.clone();
    }
    if record.state.is_none() {
        record.state = address.state.clone();
    }
    if record.zip.is_none() {
        record.zip = address.zip.clone();
    }
}

pub struct PropertyLookup {
    sessions: Arc<dyn SessionProvider>,
    resolver: FallbackResolver,
    site: Arc<SiteProfile>,
    settings: LookupSettings,
    limit: Arc<Semaphore>,
}

impl PropertyLookup {
    pub fn new(
        sessions: Arc<dyn SessionProvider>,
        resolver: FallbackResolver,
        site: Arc<SiteProfile>,
        settings: LookupSettings,
    ) -> Self {
        let limit = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        Self {
            sessions,
            resolver,
            site,
            settings,
            limit,
        }
    }

    pub fn site(&self) -> &SiteProfile {
        &self.site
    }

    pub fn browser_available(&self) -> bool {
        self.sessions.is_available()
    }

    pub fn fallback_configured(&self) -> bool {
        self.resolver.is_configured()
    }

    /// Look up one free-text address.
    ///
    /// `Ok` with `detail_url == None` means no confident match; `Err` is one
    /// of the failure kinds in [`LookupError`].
    pub async fn lookup(&self, raw: &str) -> Result<LookupResponse, LookupError> {
        let started = Instant::now();
        let mut trace = DebugTrace::new(raw);
        let address = normalize_address(raw);
        trace.normalized_address = address.full.clone();
        trace.normalization_changes = address.changes.clone();
        info!(
            "lookup {}: {:?} -> {:?}",
            trace.request_id, raw, address.full
        );

        let resolution = if address.street.is_empty() {
            Resolution::not_found(&address, "address has no street component")
        } else {
            self.run_bounded(raw, &address, &mut trace, started).await?
        };

        trace.total_duration_ms = started.elapsed().as_millis() as u64;
        match &resolution.not_found_reason {
            Some(reason) => info!("lookup {}: not found ({})", trace.request_id, reason),
            None => info!(
                "lookup {}: found {} in {}ms",
                trace.request_id,
                resolution.detail_url.as_deref().unwrap_or("-"),
                trace.total_duration_ms
            ),
        }
        Ok(LookupResponse {
            detail_url: resolution.detail_url,
            record: resolution.record,
            not_found_reason: resolution.not_found_reason,
            debug: trace,
        })
    }

    async fn run_bounded(
        &self,
        raw: &str,
        address: &NormalizedAddress,
        trace: &mut DebugTrace,
        started: Instant,
    ) -> Result<Resolution, LookupError> {
        let _permit = self
            .limit
            .acquire()
            .await
            .map_err(|_| LookupError::BrowserLaunchFailed {
                reason: "lookup limiter closed".to_string(),
            })?;

        let mut session = self.sessions.open_session().await?;
        let outcome = tokio::time::timeout(
            self.settings.operation_timeout,
            self.run(session.as_mut(), raw, address, trace, started),
        )
        .await;
        let last_url = match &outcome {
            Ok(_) => None,
            Err(_) => last_page_url(session.as_ref()).await,
        };
        if let Err(e) = session.close().await {
            debug!("session close failed: {:#}", e);
        }

        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "lookup {}: operation budget of {}ms exhausted at {}",
                    trace.request_id,
                    self.settings.operation_timeout.as_millis(),
                    last_url.as_deref().unwrap_or("-")
                );
                Err(LookupError::Timeout {
                    ctx: ErrorContext::new(raw, "operation").at(last_url),
                    budget_ms: self.settings.operation_timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn run(
        &self,
        session: &mut dyn PageSession,
        raw: &str,
        address: &NormalizedAddress,
        trace: &mut DebugTrace,
        started: Instant,
    ) -> Result<Resolution, LookupError> {
        let mut driver = Driver::new(session, &self.site, &self.settings.driver, raw, started);
        let result = self.drive(&mut driver, address, trace).await;
        trace.steps.extend(driver.take_steps());
        result
    }

    async fn drive(
        &self,
        driver: &mut Driver<'_>,
        address: &NormalizedAddress,
        trace: &mut DebugTrace,
    ) -> Result<Resolution, LookupError> {
        let key = AddressKey::from_address(address);
        let outcome = driver.search(address).await?;

        let (mut target, mut landed_html) = match outcome.kind {
            PageKind::DirectDetail { parcel_id } => {
                info!("direct redirect to parcel {}", parcel_id);
                trace.match_path = MatchPath::DirectRedirect;
                (Some(outcome.url), Some(outcome.html))
            }
            PageKind::Results(rows) => match select_match(&rows, address) {
                Some(m) if m.confirmed => {
                    trace.match_path = MatchPath::ResultsList;
                    let url = m
                        .row
                        .href
                        .clone()
                        .or_else(|| m.row.parcel_id.as_deref().map(|p| self.site.detail_url(p)));
                    (url, None)
                }
                Some(m) => {
                    trace
                        .warnings
                        .push(format!("first result row left unconfirmed: {}", m.row.row_text));
                    (None, None)
                }
                None => (None, None),
            },
            PageKind::NoResults | PageKind::Unrecognized => (None, None),
        };

        if target.is_none() {
            trace.fallback_attempted = true;
            if let Some(hit) = self.resolver.resolve(address).await {
                trace.match_path = MatchPath::Fallback;
                target = Some(self.site.detail_url(&hit.parcel_id));
                landed_html = None;
            }
        }
        let Some(detail_url) = target else {
            trace.match_path = MatchPath::None;
            return Ok(Resolution::not_found(
                address,
                format!("no confirmed match for {:?}", address.street),
            ));
        };

        let html = match landed_html {
            Some(html) => html,
            None => driver.open_detail(&detail_url).await?,
        };

        if !key.matches_text(&document_text(&html)) {
            warn!("detail page {} does not mention {:?}", detail_url, address.street);
            return Ok(Resolution::not_found(
                address,
                format!(
                    "detail page {} does not correspond to the searched address {:?}",
                    detail_url, address.street
                ),
            ));
        }
        trace.match_confirmed = true;

        let mut basic = PropertyRecord::default();
        for (section, fragment) in visible_sections(&html, &self.site) {
            apply_section(&mut basic, section, &fragment);
        }

        let mut record = PropertyRecord::default();
        for capture in driver.reveal_sections().await? {
            match capture.state {
                SectionState::Extracted(fragment) => {
                    let found = apply_section(&mut record, capture.section, &fragment);
                    trace.sections.push(SectionTrace {
                        section: capture.section,
                        state: (if found { "extracted" } else { "empty" }).to_string(),
                        reason: None,
                        html_chars: fragment.len(),
                    });
                }
                SectionState::Unavailable(reason) => {
                    trace
                        .warnings
                        .push(format!("{} unavailable: {}", capture.section.as_str(), reason));
                    trace.sections.push(SectionTrace {
                        section: capture.section,
                        state: "unavailable".to_string(),
                        reason: Some(reason),
                        html_chars: 0,
                    });
                }
                SectionState::Pending | SectionState::Revealing => {}
            }
        }
        merge_records(&mut record, basic);

        let parcel = self
            .site
            .parcel_from_url(&detail_url)
            .or_else(|| driver.current_url().and_then(|u| self.site.parcel_from_url(u)));
        if parcel.is_some() {
            record.parcel_id = parcel;
        }
        derive_summary(&mut record);
        fill_address_parts(&mut record, address);

        Ok(Resolution {
            detail_url: Some(detail_url),
            record,
            not_found_reason: None,
        })
    }
}
