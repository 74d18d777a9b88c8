use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Shared enums
// ---------------------------------------------------------------------------

/// A fetch mechanism. Native is a plain HTTP GET; Vendor is the external
/// JS-rendering scrape API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Native,
    Vendor,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Vendor => "vendor",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selector optimization mode. `cost` tries the free native fetch first;
/// `speed` goes straight to the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeFor {
    #[default]
    Cost,
    Speed,
}

/// What the tool returns versus persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultHandling {
    SaveOnly,
    #[default]
    SaveAndReturn,
    ReturnOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    Basic,
    Stealth,
    #[default]
    Auto,
}

/// Sitemap participation for URL discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SitemapMode {
    Skip,
    #[default]
    Include,
    Only,
}

/// Output formats the vendor can produce for a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScrapeFormat {
    Markdown,
    Html,
    RawHtml,
    Links,
    Images,
    Screenshot,
    Summary,
    Branding,
}

impl ScrapeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::RawHtml => "rawHtml",
            Self::Links => "links",
            Self::Images => "images",
            Self::Screenshot => "screenshot",
            Self::Summary => "summary",
            Self::Branding => "branding",
        }
    }
}

pub fn default_formats() -> Vec<ScrapeFormat> {
    vec![ScrapeFormat::Markdown, ScrapeFormat::Html]
}

/// An opaque browser action forwarded to the vendor. Only its presence and
/// serialized form matter locally: action lists participate in cache
/// identity and force the vendor strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub params: BTreeMap<String, serde_json::Value>,
}

/// Geo hint forwarded to the vendor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
}

// ---------------------------------------------------------------------------
// Tool option records
// ---------------------------------------------------------------------------

fn default_timeout_ms() -> u64 {
    60_000
}
fn default_max_chars() -> usize {
    100_000
}
fn default_true() -> bool {
    true
}
fn default_max_age_ms() -> u64 {
    172_800_000
}
fn default_map_limit() -> usize {
    5_000
}

/// Options for a single-page scrape. Unknown fields are rejected at the
/// boundary so typos surface as input errors instead of silent defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScrapeOptions {
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub result_handling: ResultHandling,
    #[serde(default)]
    pub force_rescrape: bool,
    #[serde(default = "default_true")]
    pub clean_scrape: bool,
    #[serde(default = "default_max_age_ms")]
    pub max_age: u64,
    #[serde(default)]
    pub proxy: ProxyMode,
    #[serde(default = "default_true")]
    pub block_ads: bool,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub wait_for: Option<u64>,
    #[serde(default)]
    pub include_tags: Vec<String>,
    #[serde(default)]
    pub exclude_tags: Vec<String>,
    #[serde(default = "default_formats")]
    pub formats: Vec<ScrapeFormat>,
    #[serde(default = "default_true")]
    pub only_main_content: bool,
    #[serde(default)]
    pub actions: Vec<BrowserAction>,
    #[serde(default)]
    pub extract: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

impl ScrapeOptions {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: default_timeout_ms(),
            max_chars: default_max_chars(),
            start_index: 0,
            result_handling: ResultHandling::default(),
            force_rescrape: false,
            clean_scrape: true,
            max_age: default_max_age_ms(),
            proxy: ProxyMode::default(),
            block_ads: true,
            headers: BTreeMap::new(),
            wait_for: None,
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
            formats: default_formats(),
            only_main_content: true,
            actions: Vec::new(),
            extract: None,
            location: None,
        }
    }

    pub fn extract_query(&self) -> Option<&str> {
        self.extract.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    pub fn wants_screenshot(&self) -> bool {
        self.formats.contains(&ScrapeFormat::Screenshot)
    }
}

/// Options for URL discovery from a seed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MapOptions {
    pub url: String,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_map_limit")]
    pub limit: usize,
    #[serde(default)]
    pub sitemap: SitemapMode,
    #[serde(default)]
    pub include_subdomains: bool,
    #[serde(default)]
    pub ignore_query_parameters: bool,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub result_handling: ResultHandling,
}

/// Options to start an upstream crawl job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CrawlStartOptions {
    pub url: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub max_discovery_depth: Option<usize>,
    #[serde(default)]
    pub include_paths: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(default)]
    pub allow_subdomains: bool,
    #[serde(default)]
    pub crawl_entire_domain: bool,
}

// ---------------------------------------------------------------------------
// Result records
// ---------------------------------------------------------------------------

/// One discovered URL with whatever metadata discovery produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapLink {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Upstream crawl job states. `completed`, `failed` and `cancelled` are
/// terminal; a snapshot never leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlState {
    Scraping,
    Completed,
    Failed,
    Cancelled,
}

impl CrawlState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Scraping)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scraping => "scraping",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Last-known snapshot of an upstream-owned crawl job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSnapshot {
    pub job_id: String,
    pub status: CrawlState,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub credits_used: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}
