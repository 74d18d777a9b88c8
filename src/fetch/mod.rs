//! Fetch strategies.
//!
//! Two concrete clients sit behind one trait: a direct HTTP fetcher and an
//! adapter to the JS-rendering vendor API. The selector decides which to
//! run, learns which one wins per site, and reports per-attempt
//! diagnostics when everything fails.

pub mod learning;
pub mod native;
pub mod selector;
pub mod vendor;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::core::types::{BrowserAction, Location, ProxyMode, ScrapeFormat, Strategy};

pub use learning::StrategyTable;
pub use native::NativeClient;
pub use selector::{SelectedFetch, StrategySelector};
pub use vendor::VendorClient;

/// Per-request knobs shared by both strategies. The native client ignores
/// anything that requires a browser; the vendor forwards all of it.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout_ms: u64,
    pub headers: BTreeMap<String, String>,
    pub wait_for_ms: Option<u64>,
    pub proxy_mode: ProxyMode,
    pub block_ads: bool,
    pub actions: Vec<BrowserAction>,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub formats: Vec<ScrapeFormat>,
    pub only_main_content: bool,
    pub location: Option<Location>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            headers: BTreeMap::new(),
            wait_for_ms: None,
            proxy_mode: ProxyMode::Auto,
            block_ads: true,
            actions: Vec::new(),
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            formats: crate::core::types::default_formats(),
            only_main_content: true,
            location: None,
        }
    }
}

/// Everything the vendor returned beyond the raw content. All optional;
/// populated according to the requested formats.
#[derive(Debug, Clone, Default)]
pub struct VendorMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub source_url: Option<String>,
    pub status_code: Option<u16>,
    /// Base64 screenshot bytes or a hosted screenshot URL, as returned.
    pub screenshot: Option<String>,
    pub links: Vec<String>,
    pub images: Vec<String>,
    pub summary: Option<String>,
    pub markdown: Option<String>,
}

/// Outcome of one strategy attempt. Failures are values, not errors: the
/// selector decides whether to fall back, and `is_auth_error` stops it.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub success: bool,
    pub content: String,
    pub source: Strategy,
    pub status: Option<u16>,
    pub metadata: Option<VendorMetadata>,
    pub error: Option<String>,
    pub is_auth_error: bool,
}

impl FetchResult {
    pub fn ok(source: Strategy, content: String, status: Option<u16>) -> Self {
        Self {
            success: true,
            content,
            source,
            status,
            metadata: None,
            error: None,
            is_auth_error: false,
        }
    }

    pub fn failed(source: Strategy, status: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            source,
            status,
            metadata: None,
            error: Some(error.into()),
            is_auth_error: false,
        }
    }

    pub fn auth_failed(source: Strategy, status: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            is_auth_error: true,
            ..Self::failed(source, status, error)
        }
    }

    /// The message recorded in selector diagnostics for a failed attempt.
    pub fn failure_reason(&self) -> String {
        match (&self.error, self.status) {
            (Some(e), _) => e.clone(),
            (None, Some(status)) => format!("HTTP {}", status),
            (None, None) => "unknown error".to_string(),
        }
    }
}

/// One fetch mechanism. Implementations never panic and never return
/// `Err`; all failure modes are encoded in the result.
#[async_trait]
pub trait FetchClient: Send + Sync {
    fn strategy(&self) -> Strategy;

    async fn fetch(&self, url: &str, options: &FetchOptions) -> FetchResult;
}
