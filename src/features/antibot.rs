//! Bot-challenge detection and polite pacing between browser steps.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use std::env;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Why a page was classified as a block / challenge page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSignal {
    Captcha,
    HumanVerification,
    ChallengePage,
    AccessDenied,
    RateLimited,
}

impl BlockSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockSignal::Captcha => "captcha",
            BlockSignal::HumanVerification => "human_verification",
            BlockSignal::ChallengePage => "challenge_page",
            BlockSignal::AccessDenied => "access_denied",
            BlockSignal::RateLimited => "rate_limited",
        }
    }
}

impl std::fmt::Display for BlockSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markers that identify a challenge regardless of page size.
const STRONG_MARKERS: &[(&str, BlockSignal)] = &[
    ("g-recaptcha", BlockSignal::Captcha),
    ("www.google.com/recaptcha", BlockSignal::Captcha),
    ("hcaptcha.com", BlockSignal::Captcha),
    ("h-captcha", BlockSignal::Captcha),
    ("captcha-container", BlockSignal::Captcha),
    ("challenges.cloudflare.com", BlockSignal::ChallengePage),
    ("cf-challenge", BlockSignal::ChallengePage),
    ("cf-browser-verification", BlockSignal::ChallengePage),
    ("_incapsula_resource", BlockSignal::ChallengePage),
    ("perimeterx", BlockSignal::ChallengePage),
    ("datadome.co", BlockSignal::ChallengePage),
    ("verify you are human", BlockSignal::HumanVerification),
    ("please verify you are a human", BlockSignal::HumanVerification),
    ("are you a robot", BlockSignal::HumanVerification),
    ("pardon our interruption", BlockSignal::HumanVerification),
];

/// Markers that only count on small pages; a full appraiser detail page can
/// legitimately mention them (footer links, help text).
const WEAK_MARKERS: &[(&str, BlockSignal)] = &[
    ("captcha", BlockSignal::Captcha),
    ("access denied", BlockSignal::AccessDenied),
    ("access to this page has been denied", BlockSignal::AccessDenied),
    ("request unsuccessful", BlockSignal::AccessDenied),
    ("too many requests", BlockSignal::RateLimited),
    ("unusual traffic", BlockSignal::RateLimited),
];

/// Pages above this size are never judged on weak markers alone.
const SMALL_PAGE_BYTES: usize = 50_000;

fn build_matcher(markers: &[(&str, BlockSignal)]) -> AhoCorasick {
    AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .build(markers.iter().map(|(p, _)| *p))
        .expect("valid block markers")
}

fn strong_matcher() -> &'static AhoCorasick {
    static M: OnceLock<AhoCorasick> = OnceLock::new();
    M.get_or_init(|| build_matcher(STRONG_MARKERS))
}

fn weak_matcher() -> &'static AhoCorasick {
    static M: OnceLock<AhoCorasick> = OnceLock::new();
    M.get_or_init(|| build_matcher(WEAK_MARKERS))
}

/// Classify page content as a bot challenge / block page.
///
/// Returns `None` for normal content.
pub fn detect_block(html: &str) -> Option<BlockSignal> {
    if let Some(m) = strong_matcher().find(html) {
        let signal = STRONG_MARKERS[m.pattern().as_usize()].1;
        debug!("block marker {:?} at byte {}", STRONG_MARKERS[m.pattern().as_usize()].0, m.start());
        return Some(signal);
    }

    if html.len() < SMALL_PAGE_BYTES {
        if let Some(m) = weak_matcher().find(html) {
            let signal = WEAK_MARKERS[m.pattern().as_usize()].1;
            debug!(
                "weak block marker {:?} on {}-byte page",
                WEAK_MARKERS[m.pattern().as_usize()].0,
                html.len()
            );
            return Some(signal);
        }
    }

    None
}

/// Delay configuration between browser steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDelay {
    /// Minimum delay in milliseconds between steps
    pub min_ms: u64,
    /// Maximum delay in milliseconds between steps
    pub max_ms: u64,
}

impl RequestDelay {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        let (min_ms, max_ms) = if min_ms > max_ms {
            (max_ms, min_ms)
        } else {
            (min_ms, max_ms)
        };
        Self { min_ms, max_ms }
    }

    /// No pacing at all (tests, local fixtures).
    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    /// Random delay within the configured range with ±20% jitter.
    pub fn random_delay(&self) -> u64 {
        use rand::prelude::*;
        if self.max_ms == 0 {
            return 0;
        }
        let mut rng = rand::rng();
        let base_delay = rng.random_range(self.min_ms..=self.max_ms);

        let jitter_range = (base_delay as f64 * 0.2) as i64;
        let jitter = if jitter_range > 0 {
            rng.random_range(-jitter_range..=jitter_range)
        } else {
            0
        };

        (base_delay as i64 + jitter).max(self.min_ms as i64) as u64
    }

    /// Default polite delay: 500ms-1500ms
    pub fn default_polite() -> Self {
        Self {
            min_ms: 500,
            max_ms: 1500,
        }
    }

    /// Fast delay: 100ms-500ms
    pub fn fast() -> Self {
        Self {
            min_ms: 100,
            max_ms: 500,
        }
    }

    /// Conservative delay: 1000ms-3000ms (after a block, or for slow days)
    pub fn conservative() -> Self {
        Self {
            min_ms: 1000,
            max_ms: 3000,
        }
    }

    pub async fn pause(&self) {
        let delay = self.random_delay();
        if delay > 0 {
            debug!("step delay: {}ms", delay);
            tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
        }
    }
}

/// Named `SCRAPE_DELAY_PRESET` value; anything unknown is the polite default.
pub fn preset_delay(preset: Option<&str>) -> RequestDelay {
    match preset {
        Some("none") => RequestDelay::none(),
        Some("fast") => RequestDelay::fast(),
        Some("conservative") => RequestDelay::conservative(),
        _ => RequestDelay::default_polite(),
    }
}

pub fn request_delay_from_env() -> RequestDelay {
    let preset = env::var("SCRAPE_DELAY_PRESET")
        .ok()
        .map(|v| v.to_lowercase());
    let base = preset_delay(preset.as_deref());
    let min_ms = env::var("SCRAPE_DELAY_MIN_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(base.min_ms);
    let max_ms = env::var("SCRAPE_DELAY_MAX_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(base.max_ms);
    let delay = RequestDelay::new(min_ms, max_ms);
    info!("step delay {}-{}ms", delay.min_ms, delay.max_ms);
    delay
}
