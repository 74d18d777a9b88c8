use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::core::types::Strategy;

/// Per-attempt record the strategy selector attaches to every failure
/// (and to successes, for observability): ordered attempt tags, per-tag
/// error text, per-tag elapsed milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchDiagnostics {
    pub strategies_attempted: Vec<Strategy>,
    pub strategy_errors: BTreeMap<String, String>,
    pub timing_ms: BTreeMap<String, u64>,
}

impl FetchDiagnostics {
    pub fn record_attempt(&mut self, strategy: Strategy, elapsed_ms: u64) {
        self.strategies_attempted.push(strategy);
        self.timing_ms.insert(strategy.as_str().to_string(), elapsed_ms);
    }

    pub fn record_error(&mut self, strategy: Strategy, message: impl Into<String>) {
        self.strategy_errors
            .insert(strategy.as_str().to_string(), message.into());
    }
}

/// Composite failure returned when the selector ran out of strategies, or
/// when the vendor signalled an authentication error and fallback stopped.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub diagnostics: FetchDiagnostics,
    pub is_auth_error: bool,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attempted = self
            .diagnostics
            .strategies_attempted
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        if self.is_auth_error {
            let detail = self
                .diagnostics
                .strategies_attempted
                .last()
                .and_then(|s| self.diagnostics.strategy_errors.get(s.as_str()))
                .map(String::as_str)
                .unwrap_or("authentication rejected");
            return write!(
                f,
                "Vendor authentication error: {} — check your API key (VENDOR_API_KEY). Attempted: {}",
                detail, attempted
            );
        }

        let reasons = self
            .diagnostics
            .strategies_attempted
            .iter()
            .filter_map(|s| {
                self.diagnostics
                    .strategy_errors
                    .get(s.as_str())
                    .map(|e| format!("{}: {}", s.as_str(), e))
            })
            .collect::<Vec<_>>()
            .join("; ");

        write!(f, "All strategies failed. Attempted: {}. {}", attempted, reasons)
    }
}

impl std::error::Error for FetchFailure {}

/// Which taxonomy bucket an upstream vendor response falls into. Drives
/// both the rendered message and the retryability advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorErrorKind {
    BadRequest,
    NotFound,
    Auth,
    Quota,
    RateLimit,
    Server,
    Network,
}

impl VendorErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            404 => Self::NotFound,
            401 | 403 => Self::Auth,
            402 => Self::Quota,
            429 => Self::RateLimit,
            s if s >= 500 => Self::Server,
            _ => Self::BadRequest,
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            Self::BadRequest => "Invalid request",
            Self::NotFound => "Not found",
            Self::Auth => "Authentication failed — check your API key",
            Self::Quota => "Payment required — quota exceeded, check your plan and billing",
            Self::RateLimit => "Rate limit exceeded",
            Self::Server => "Upstream server error",
            Self::Network => "Network error reaching the API",
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Server | Self::Network)
    }
}

/// A classified upstream API error, rendered verbatim to the caller:
/// `<op> API Error (<status>): <headline>. Details: <detail>. Retryable: <bool>`
/// plus an advisory wait for rate limits and a backoff hint for 5xx/network.
#[derive(Debug, Clone)]
pub struct VendorApiError {
    pub operation: &'static str,
    pub status: Option<u16>,
    pub kind: VendorErrorKind,
    pub detail: String,
    pub retry_after_ms: Option<u64>,
}

impl VendorApiError {
    pub fn new(operation: &'static str, status: u16, detail: impl Into<String>) -> Self {
        let kind = VendorErrorKind::from_status(status);
        Self {
            operation,
            status: Some(status),
            kind,
            detail: detail.into(),
            retry_after_ms: match kind {
                VendorErrorKind::RateLimit => Some(60_000),
                _ => None,
            },
        }
    }

    pub fn network(operation: &'static str, detail: impl Into<String>) -> Self {
        Self {
            operation,
            status: None,
            kind: VendorErrorKind::Network,
            detail: detail.into(),
            retry_after_ms: None,
        }
    }

    pub fn retryable(&self) -> bool {
        self.kind.retryable()
    }
}

impl fmt::Display for VendorApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} API Error ({}): ", self.operation, status)?,
            None => write!(f, "{} API Error (network): ", self.operation)?,
        }
        write!(
            f,
            "{}. Details: {}. Retryable: {}",
            self.kind.headline(),
            self.detail,
            self.retryable()
        )?;
        if let Some(ms) = self.retry_after_ms {
            write!(f, " (retry after {}ms)", ms)?;
        } else if matches!(self.kind, VendorErrorKind::Server | VendorErrorKind::Network) {
            write!(f, " (retry with backoff)")?;
        }
        Ok(())
    }
}

impl std::error::Error for VendorApiError {}

/// Unified error type crossing component boundaries. Handlers turn any of
/// these into an `isError` content block; nothing is thrown past the tool
/// surface.
#[derive(Debug, Error)]
pub enum PulseError {
    /// Malformed URL, out-of-range option, mutually exclusive inputs.
    #[error("{0}")]
    Input(String),

    /// Every fetch strategy failed (or the vendor aborted fallback).
    #[error(transparent)]
    Fetch(#[from] FetchFailure),

    /// Classified upstream API error (map / crawl / vendor scrape plumbing).
    #[error(transparent)]
    Vendor(#[from] VendorApiError),

    /// Content cleaning failed. Callers recover by keeping raw content.
    #[error("content cleaning failed: {0}")]
    Clean(String),

    /// LLM extraction failed. Callers recover by keeping cleaned content.
    #[error("extraction failed: {0}")]
    Extract(String),

    /// Every storage tier failed to persist. Callers return the in-memory
    /// result and omit resource URIs.
    #[error("storage failed for every tier: {0}")]
    Storage(String),

    /// Unknown crawl job id or a crawl lifecycle call that cannot proceed.
    #[error("{0}")]
    Job(String),
}

impl PulseError {
    pub fn retryable(&self) -> bool {
        match self {
            Self::Vendor(e) => e.retryable(),
            _ => false,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::Fetch(f) => f.is_auth_error,
            Self::Vendor(v) => v.kind == VendorErrorKind::Auth,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_rate_limit_renders_taxonomy_line() {
        let err = VendorApiError::new("Map", 429, "Too many requests");
        let msg = err.to_string();
        assert!(msg.contains("Map API Error (429)"), "{}", msg);
        assert!(msg.contains("Rate limit exceeded"), "{}", msg);
        assert!(msg.contains("Details: Too many requests"), "{}", msg);
        assert!(msg.contains("Retryable: true"), "{}", msg);
        assert!(msg.contains("retry after 60000ms"), "{}", msg);
    }

    #[test]
    fn vendor_quota_mentions_billing_and_is_final() {
        let err = VendorApiError::new("Scrape", 402, "Insufficient credits");
        let msg = err.to_string();
        assert!(msg.contains("billing"), "{}", msg);
        assert!(msg.contains("Retryable: false"), "{}", msg);
        assert!(!err.retryable());
    }

    #[test]
    fn vendor_5xx_is_retryable_with_backoff_advice() {
        let err = VendorApiError::new("Crawl", 503, "upstream unavailable");
        assert!(err.retryable());
        assert!(err.to_string().contains("retry with backoff"));
    }

    #[test]
    fn fetch_failure_lists_all_attempts() {
        let mut diag = FetchDiagnostics::default();
        diag.record_attempt(Strategy::Native, 12);
        diag.record_error(Strategy::Native, "HTTP 403");
        diag.record_attempt(Strategy::Vendor, 30);
        diag.record_error(Strategy::Vendor, "Rate limited");
        let failure = FetchFailure { diagnostics: diag, is_auth_error: false };
        let msg = failure.to_string();
        assert!(msg.contains("All strategies failed"), "{}", msg);
        assert!(msg.contains("Attempted: native, vendor"), "{}", msg);
        assert!(msg.contains("native: HTTP 403"), "{}", msg);
        assert!(msg.contains("vendor: Rate limited"), "{}", msg);
    }

    #[test]
    fn auth_failure_names_the_vendor_and_the_fix() {
        let mut diag = FetchDiagnostics::default();
        diag.record_attempt(Strategy::Vendor, 5);
        diag.record_error(Strategy::Vendor, "Unauthorized: Invalid API key");
        let failure = FetchFailure { diagnostics: diag, is_auth_error: true };
        let msg = failure.to_string();
        assert!(msg.contains("Vendor authentication error"), "{}", msg);
        assert!(msg.contains("API key"), "{}", msg);
    }
}
