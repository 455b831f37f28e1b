use std::fmt;
use thiserror::Error;

/// Where in the pipeline an error happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub address: String,
    pub url: Option<String>,
    pub step: String,
}

impl ErrorContext {
    pub fn new(address: &str, step: &str) -> Self {
        Self {
            address: address.to_string(),
            url: None,
            step: step.to_string(),
        }
    }

    pub fn at(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step={} address={:?} url={}",
            self.step,
            self.address,
            self.url.as_deref().unwrap_or("-")
        )
    }
}

#[derive(Debug, Error)]
pub enum LookupError {
    /// Browser engine unavailable. Fatal for the request and never retried here.
    #[error("browser launch failed: {reason}")]
    BrowserLaunchFailed { reason: String },

    #[error("navigation failed ({ctx}): {reason}")]
    NavigationFailed { ctx: ErrorContext, reason: String },

    #[error("timed out after {budget_ms}ms ({ctx})")]
    Timeout { ctx: ErrorContext, budget_ms: u64 },

    /// Site-side bot detection. Callers should back off rather than retry.
    #[error("blocked by site: {signal} ({ctx})")]
    Blocked { ctx: ErrorContext, signal: String },

    #[error("unexpected page structure ({ctx}): {reason}")]
    Parse { ctx: ErrorContext, reason: String },
}

impl LookupError {
    pub fn code(&self) -> &'static str {
        match self {
            LookupError::BrowserLaunchFailed { .. } => "BROWSER_LAUNCH_FAILED",
            LookupError::NavigationFailed { .. } => "NAVIGATION_FAILED",
            LookupError::Timeout { .. } => "TIMEOUT",
            LookupError::Blocked { .. } => "BLOCKED",
            LookupError::Parse { .. } => "PARSE_ERROR",
        }
    }

    /// Whether retrying the whole request later is reasonable.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LookupError::NavigationFailed { .. } | LookupError::Timeout { .. }
        )
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            LookupError::BrowserLaunchFailed { .. } => None,
            LookupError::NavigationFailed { ctx, .. }
            | LookupError::Timeout { ctx, .. }
            | LookupError::Blocked { ctx, .. }
            | LookupError::Parse { ctx, .. } => Some(ctx),
        }
    }

    pub fn to_response(&self) -> crate::types::ErrorResponse {
        crate::types::ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            transient: self.is_transient(),
        }
    }
}
