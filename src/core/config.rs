use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ScoutConfig — file-based config loader (parcel-scout.json) with env-var fallback
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "PARCEL_SCOUT_CONFIG";
pub const ENV_NAV_TIMEOUT_MS: &str = "PARCEL_SCOUT_NAV_TIMEOUT_MS";
pub const ENV_OPERATION_TIMEOUT_MS: &str = "PARCEL_SCOUT_OPERATION_TIMEOUT_MS";
pub const ENV_TAB_WAIT_MS: &str = "PARCEL_SCOUT_TAB_WAIT_MS";
pub const ENV_HEADLESS: &str = "PARCEL_SCOUT_HEADLESS";
pub const ENV_BROWSER_WS_ENDPOINT: &str = "BROWSER_WS_ENDPOINT";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";
pub const ENV_SEARCH_API_KEY: &str = "EXA_API_KEY";
pub const ENV_SEARCH_BASE_URL: &str = "EXA_BASE_URL";
pub const ENV_FALLBACK_RESULTS: &str = "PARCEL_SCOUT_FALLBACK_RESULTS";
pub const ENV_MAX_CONCURRENT: &str = "PARCEL_SCOUT_MAX_CONCURRENT";

/// Top-level config loaded from `parcel-scout.json`.
///
/// Every field is optional in the file; the `resolve_*` accessors apply
/// JSON field → env var → default.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct ScoutConfig {
    /// Bounds a single page load / navigation.
    pub navigation_timeout_ms: Option<u64>,
    /// Bounds the whole search-through-extraction sequence.
    pub operation_timeout_ms: Option<u64>,
    /// Upper bound for a tab's table to populate after its click.
    pub tab_wait_ms: Option<u64>,
    pub headless: Option<bool>,
    /// Connect to an already-running browser instead of launching one.
    pub browser_ws_endpoint: Option<String>,
    pub chrome_executable: Option<String>,
    /// Key for the semantic search index used by the fallback resolver. Never logged.
    pub search_api_key: Option<String>,
    pub search_base_url: Option<String>,
    pub fallback_max_results: Option<usize>,
    pub max_concurrent_lookups: Option<usize>,
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ScoutConfig {
    pub fn resolve_navigation_timeout(&self) -> Duration {
        Duration::from_millis(
            self.navigation_timeout_ms
                .or_else(|| env_u64(ENV_NAV_TIMEOUT_MS))
                .unwrap_or(30_000),
        )
    }

    pub fn resolve_operation_timeout(&self) -> Duration {
        Duration::from_millis(
            self.operation_timeout_ms
                .or_else(|| env_u64(ENV_OPERATION_TIMEOUT_MS))
                .unwrap_or(120_000),
        )
    }

    pub fn resolve_tab_wait(&self) -> Duration {
        Duration::from_millis(
            self.tab_wait_ms
                .or_else(|| env_u64(ENV_TAB_WAIT_MS))
                .unwrap_or(8_000),
        )
    }

    /// JSON field → `PARCEL_SCOUT_HEADLESS` ("0"/"false" disables) → `true`.
    pub fn resolve_headless(&self) -> bool {
        if let Some(b) = self.headless {
            return b;
        }
        std::env::var(ENV_HEADLESS)
            .map(|v| {
                let v = v.trim().to_ascii_lowercase();
                !(v == "0" || v == "false" || v == "no")
            })
            .unwrap_or(true)
    }

    pub fn resolve_browser_ws_endpoint(&self) -> Option<String> {
        self.browser_ws_endpoint
            .clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env_string(ENV_BROWSER_WS_ENDPOINT))
    }

    /// Explicit executable override. Only returned when the path exists;
    /// otherwise the browser manager falls back to auto-discovery.
    pub fn resolve_chrome_executable(&self) -> Option<String> {
        let p = self
            .chrome_executable
            .clone()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env_string(ENV_CHROME_EXECUTABLE))?;
        if Path::new(&p).exists() {
            Some(p)
        } else {
            None
        }
    }

    pub fn resolve_search_api_key(&self) -> Option<String> {
        self.search_api_key
            .clone()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .or_else(|| env_string(ENV_SEARCH_API_KEY))
    }

    pub fn resolve_search_base_url(&self) -> String {
        self.search_base_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| env_string(ENV_SEARCH_BASE_URL))
            .unwrap_or_else(|| "https://api.exa.ai".to_string())
    }

    pub fn resolve_fallback_max_results(&self) -> usize {
        self.fallback_max_results
            .or_else(|| env_u64(ENV_FALLBACK_RESULTS).map(|n| n as usize))
            .unwrap_or(8)
            .max(1)
    }

    pub fn resolve_max_concurrent_lookups(&self) -> usize {
        self.max_concurrent_lookups
            .or_else(|| env_u64(ENV_MAX_CONCURRENT).map(|n| n as usize))
            .unwrap_or(4)
            .max(1)
    }
}

/// Load `parcel-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `PARCEL_SCOUT_CONFIG` env var path
/// 2. `./parcel-scout.json`
/// 3. `../parcel-scout.json`
///
/// Missing file → `ScoutConfig::default()` (all env-var fallbacks apply).
/// Parse error → log a warning, return `ScoutConfig::default()`.
pub fn load_scout_config() -> ScoutConfig {
    let mut candidates = vec![
        std::path::PathBuf::from("parcel-scout.json"),
        std::path::PathBuf::from("../parcel-scout.json"),
    ];
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        candidates.insert(0, std::path::PathBuf::from(env_path));
    }

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        return match serde_json::from_str::<ScoutConfig>(&contents) {
            Ok(cfg) => {
                tracing::info!("parcel-scout.json loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    "parcel-scout.json parse error at {}: {}, using defaults",
                    path.display(),
                    e
                );
                ScoutConfig::default()
            }
        };
    }

    ScoutConfig::default()
}
