//! Fallback resolver: find a parcel id through an external semantic index
//! when the site's own search produced no confirmed match.

use crate::features::address::NormalizedAddress;
use crate::features::matcher::AddressKey;
use crate::scraping::selectors::SiteProfile;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Characters of context on either side of a parcel token that must mention
/// the searched address.
const CONTEXT_WINDOW: usize = 200;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: String,
}

#[async_trait]
pub trait SemanticSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        include_domains: &[String],
        max_results: usize,
    ) -> Result<Vec<SearchDocument>>;

    /// False when the index cannot be queried (no credentials).
    fn is_configured(&self) -> bool {
        true
    }
}

/// Exa-compatible `/search` client.
pub struct ExaSearch {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<SearchDocument>,
}

impl ExaSearch {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn search_once(&self, body: &serde_json::Value, api_key: &str) -> Result<Vec<SearchDocument>, backoff::Error<anyhow::Error>> {
        let resp = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| backoff::Error::transient(anyhow!("semantic search request: {}", e)))?;

        let status = resp.status();
        if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(backoff::Error::permanent(anyhow!(
                "semantic search rejected: HTTP {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(backoff::Error::transient(anyhow!(
                "semantic search failed: HTTP {}",
                status
            )));
        }
        let parsed: ExaResponse = resp
            .json()
            .await
            .map_err(|e| backoff::Error::permanent(anyhow!("semantic search response: {}", e)))?;
        Ok(parsed.results)
    }
}

#[async_trait]
impl SemanticSearch for ExaSearch {
    async fn search(
        &self,
        query: &str,
        include_domains: &[String],
        max_results: usize,
    ) -> Result<Vec<SearchDocument>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("semantic search API key not configured"))?;
        let body = serde_json::json!({
            "query": query,
            "numResults": max_results,
            "includeDomains": include_domains,
            "contents": { "text": { "maxCharacters": 2000 } },
        });

        retry(
            ExponentialBackoffBuilder::new()
                .with_initial_interval(Duration::from_millis(200))
                .with_max_interval(Duration::from_secs(2))
                .with_max_elapsed_time(Some(Duration::from_secs(6)))
                .build(),
            || async { self.search_once(&body, api_key).await },
        )
        .await
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackHit {
    pub parcel_id: String,
    pub source_url: String,
}

pub struct FallbackResolver {
    search: Arc<dyn SemanticSearch>,
    site: Arc<SiteProfile>,
    max_results: usize,
}

impl FallbackResolver {
    pub fn new(search: Arc<dyn SemanticSearch>, site: Arc<SiteProfile>, max_results: usize) -> Self {
        Self {
            search,
            site,
            max_results,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.search.is_configured() && self.max_results > 0
    }

    /// Never fails: index errors are logged and treated as "no hit".
    pub async fn resolve(&self, address: &NormalizedAddress) -> Option<FallbackHit> {
        if !self.is_configured() {
            warn!("fallback resolver not configured; skipping semantic search");
            return None;
        }
        let key = AddressKey::from_address(address);
        if !key.is_usable() {
            debug!("fallback: address {:?} has no usable number/name", address.street);
            return None;
        }

        let query = format!("{} property appraiser parcel", address.full);
        let domains = vec![self.site.domain.clone()];
        let docs = match self.search.search(&query, &domains, self.max_results).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!("fallback semantic search failed: {:#}", e);
                return None;
            }
        };
        info!("fallback: {} documents for {:?}", docs.len(), query);
        let hit = find_parcel(&docs, &key, &self.site);
        if let Some(h) = &hit {
            info!("fallback: parcel {} from {}", h.parcel_id, h.source_url);
        }
        hit
    }
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// First parcel id, in document order, whose surroundings mention the
/// searched address. A URL carrying the parcel parameter is checked against
/// the whole document text.
pub fn find_parcel(docs: &[SearchDocument], key: &AddressKey, site: &SiteProfile) -> Option<FallbackHit> {
    for doc in docs {
        let haystack = match &doc.title {
            Some(t) => format!("{} {}", t, doc.text),
            None => doc.text.clone(),
        };

        if let Some(parcel) = site.parcel_from_url(&doc.url) {
            if key.matches_text(&haystack) {
                return Some(FallbackHit {
                    parcel_id: parcel,
                    source_url: doc.url.clone(),
                });
            }
        }

        for m in site.parcel_pattern.find_iter(&haystack) {
            let start = floor_char_boundary(&haystack, m.start().saturating_sub(CONTEXT_WINDOW));
            let end = ceil_char_boundary(&haystack, m.end() + CONTEXT_WINDOW);
            if key.matches_text(&haystack[start..end]) {
                return Some(FallbackHit {
                    parcel_id: m.as_str().to_string(),
                    source_url: doc.url.clone(),
                });
            }
        }
    }
    None
}
