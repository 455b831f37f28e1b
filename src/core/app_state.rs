use crate::core::config::{load_scout_config, ScoutConfig};
use crate::scraping::browser_manager::BrowserPool;
use crate::scraping::selectors::SiteProfile;
use crate::scraping::session::SessionProvider;
use crate::tools::fallback::{ExaSearch, FallbackResolver, SemanticSearch};
use crate::tools::lookup::{LookupSettings, PropertyLookup};
use std::sync::Arc;

/// Process-wide handles shared by the HTTP service and the CLI.
///
/// The browser engine is pooled here and handed to each lookup explicitly;
/// every lookup still gets its own request-scoped browser context.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ScoutConfig>,
    pub browser_pool: Arc<BrowserPool>,
    pub search: Arc<dyn SemanticSearch>,
    pub lookup: Arc<PropertyLookup>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("browser_available", &self.browser_pool.available())
            .field("open_contexts", &self.browser_pool.open_contexts())
            .field("fallback_configured", &self.search.is_configured())
            .finish()
    }
}

impl AppState {
    /// Build from `parcel-scout.json` / environment.
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::from_config(http_client, load_scout_config())
    }

    pub fn from_config(http_client: reqwest::Client, config: ScoutConfig) -> Self {
        let site = Arc::new(SiteProfile::manatee());
        let browser_pool = BrowserPool::from_config(&config);
        let search: Arc<dyn SemanticSearch> = Arc::new(ExaSearch::new(
            http_client,
            &config.resolve_search_base_url(),
            config.resolve_search_api_key(),
        ));
        let resolver = FallbackResolver::new(
            Arc::clone(&search),
            Arc::clone(&site),
            config.resolve_fallback_max_results(),
        );
        let sessions: Arc<dyn SessionProvider> = browser_pool.clone();
        let lookup = Arc::new(PropertyLookup::new(
            sessions,
            resolver,
            site,
            LookupSettings::from_config(&config),
        ));
        Self {
            config: Arc::new(config),
            browser_pool,
            search,
            lookup,
        }
    }
}
